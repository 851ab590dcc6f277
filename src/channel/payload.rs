//! Cached value buffer of a channel
//!
//! Small payloads (up to one string element) are copied inline; larger ones
//! keep the buffer delivered with the update. Installing a new payload
//! replaces the old one in a single move and only then drops it, so a
//! reader never observes a half-installed buffer.

use crate::types::STRING_SIZE;

/// Largest payload stored inline.
pub const INLINE_CAPACITY: usize = STRING_SIZE;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PayloadBuffer {
    #[default]
    Empty,
    Inline {
        bytes: [u8; INLINE_CAPACITY],
        len: usize,
    },
    Heap(Vec<u8>),
}

impl PayloadBuffer {
    /// Build a buffer for `values`, copying it inline when it fits.
    pub fn from_values(values: Vec<u8>) -> Self {
        if values.is_empty() {
            PayloadBuffer::Empty
        } else if values.len() <= INLINE_CAPACITY {
            let mut bytes = [0u8; INLINE_CAPACITY];
            bytes[..values.len()].copy_from_slice(&values);
            PayloadBuffer::Inline {
                bytes,
                len: values.len(),
            }
        } else {
            PayloadBuffer::Heap(values)
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PayloadBuffer::Empty => &[],
            PayloadBuffer::Inline { bytes, len } => &bytes[..*len],
            PayloadBuffer::Heap(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, PayloadBuffer::Inline { .. })
    }

    /// Publish `values` as the current payload, then release the previous
    /// buffer.
    pub fn install(&mut self, values: Vec<u8>) {
        let previous = std::mem::replace(self, PayloadBuffer::from_values(values));
        drop(previous);
    }

    pub fn clear(&mut self) {
        let previous = std::mem::take(self);
        drop(previous);
    }
}
