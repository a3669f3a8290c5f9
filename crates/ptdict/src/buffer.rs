//! Growable, position-addressed byte storage
//!
//! Every multi-byte field is big-endian. Writing at exactly the tail position
//! appends; writing past the tail is an error, so the buffer never contains
//! holes of unwritten bytes.

use crate::error::{DictError, Result};
use crate::pos::{DICT_POS_FIELD_SIZE, DictPos, MAX_BUFFER_SIZE};

/// Extendable dictionary buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendableBuffer {
    data: Vec<u8>,
    max_size: usize,
}

impl Default for ExtendableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtendableBuffer {
    /// Create an empty buffer that may grow up to [`MAX_BUFFER_SIZE`]
    pub fn new() -> Self {
        Self::with_limit(MAX_BUFFER_SIZE)
    }

    /// Create an empty buffer with a custom size limit
    pub fn with_limit(max_size: usize) -> Self {
        Self {
            data: Vec::new(),
            max_size: max_size.min(MAX_BUFFER_SIZE),
        }
    }

    /// Create an empty buffer with pre-allocated capacity and a size limit
    pub fn with_capacity_and_limit(capacity: usize, max_size: usize) -> Self {
        let max_size = max_size.min(MAX_BUFFER_SIZE);
        Self {
            data: Vec::with_capacity(capacity.min(max_size)),
            max_size,
        }
    }

    /// Wrap existing bytes
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.len() > MAX_BUFFER_SIZE {
            return Err(DictError::CapacityExhausted {
                required: data.len(),
                limit: MAX_BUFFER_SIZE,
            });
        }
        Ok(Self {
            data,
            max_size: MAX_BUFFER_SIZE,
        })
    }

    /// Number of bytes written
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if nothing has been written
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size limit
    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Position the next appended byte will land at
    #[inline]
    pub fn tail_position(&self) -> Result<DictPos> {
        DictPos::new(self.data.len())
    }

    /// Raw contents
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the raw contents
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Drop everything from `pos` onward
    pub fn truncate(&mut self, pos: DictPos) {
        self.data.truncate(pos.offset());
    }

    /// Read an unsigned big-endian integer of `width` bytes (1..=4)
    pub fn read_uint(&self, pos: DictPos, width: usize) -> Result<u32> {
        debug_assert!((1..=4).contains(&width));
        let start = pos.offset();
        let bytes = self
            .data
            .get(start..start + width)
            .ok_or(DictError::OutOfBounds {
                pos: start,
                size: self.data.len(),
            })?;
        Ok(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
    }

    /// Read an integer and move `pos` past it
    pub fn read_uint_and_advance(&self, pos: &mut DictPos, width: usize) -> Result<u32> {
        let value = self.read_uint(*pos, width)?;
        *pos = pos.advance(width)?;
        Ok(value)
    }

    /// Read a position field and move `pos` past it
    pub fn read_pos_and_advance(&self, pos: &mut DictPos) -> Result<Option<DictPos>> {
        let raw = self.read_uint_and_advance(pos, DICT_POS_FIELD_SIZE)?;
        Ok(DictPos::decode(raw))
    }

    /// Write an unsigned big-endian integer of `width` bytes (1..=4)
    ///
    /// The write may overlap the current tail, in which case the buffer grows.
    pub fn write_uint(&mut self, pos: DictPos, value: u32, width: usize) -> Result<()> {
        debug_assert!((1..=4).contains(&width));
        let start = pos.offset();
        if start > self.data.len() {
            return Err(DictError::OutOfBounds {
                pos: start,
                size: self.data.len(),
            });
        }
        let end = start + width;
        if end > self.max_size {
            return Err(DictError::CapacityExhausted {
                required: end,
                limit: self.max_size,
            });
        }
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        for (i, byte) in self.data[start..end].iter_mut().enumerate() {
            *byte = (value >> (8 * (width - 1 - i))) as u8;
        }
        Ok(())
    }

    /// Write an integer and move `pos` past it
    pub fn write_uint_and_advance(
        &mut self,
        pos: &mut DictPos,
        value: u32,
        width: usize,
    ) -> Result<()> {
        self.write_uint(*pos, value, width)?;
        *pos = pos.advance(width)?;
        Ok(())
    }

    /// Write a position field and move `pos` past it
    pub fn write_pos_and_advance(
        &mut self,
        pos: &mut DictPos,
        value: Option<DictPos>,
    ) -> Result<()> {
        self.write_uint_and_advance(pos, DictPos::encode(value), DICT_POS_FIELD_SIZE)
    }

    /// Append an integer at the tail and return where it was written
    pub fn append_uint(&mut self, value: u32, width: usize) -> Result<DictPos> {
        let pos = self.tail_position()?;
        self.write_uint(pos, value, width)?;
        Ok(pos)
    }
}
