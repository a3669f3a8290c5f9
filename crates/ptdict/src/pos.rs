//! Dictionary positions

use std::fmt;

use crate::error::{DictError, Result};

/// On-disk encoding of "no position"
pub const NOT_A_DICT_POS: u32 = 0xFF_FFFF;

/// Width in bytes of every position field
pub const DICT_POS_FIELD_SIZE: usize = 3;

/// Largest buffer a position field can address
pub const MAX_BUFFER_SIZE: usize = NOT_A_DICT_POS as usize;

/// Byte offset into a dictionary buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DictPos(u32);

impl DictPos {
    /// Position of the first byte of a buffer
    pub const ZERO: DictPos = DictPos(0);

    /// Create a position, rejecting the "no position" sentinel
    #[inline]
    pub fn new(offset: usize) -> Result<Self> {
        if offset >= MAX_BUFFER_SIZE {
            return Err(DictError::OutOfBounds {
                pos: offset,
                size: MAX_BUFFER_SIZE,
            });
        }
        Ok(Self(offset as u32))
    }

    /// Get the byte offset
    #[inline]
    pub const fn offset(self) -> usize {
        self.0 as usize
    }

    /// Position `delta` bytes further on
    #[inline]
    pub fn advance(self, delta: usize) -> Result<Self> {
        Self::new(self.offset() + delta)
    }

    /// Decode a raw position field
    #[inline]
    pub const fn decode(raw: u32) -> Option<Self> {
        if raw == NOT_A_DICT_POS {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Encode an optional position as a raw field value
    #[inline]
    pub const fn encode(pos: Option<Self>) -> u32 {
        match pos {
            Some(p) => p.0,
            None => NOT_A_DICT_POS,
        }
    }
}

impl fmt::Display for DictPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#08x}", self.0)
    }
}
