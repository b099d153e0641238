//! ArrayBuffer
//!
//! Owned, fixed-size byte storage shared by typed arrays and DataViews.
//! Detaching drops the bytes; every accessor then behaves as if the buffer
//! were empty.

use parking_lot::RwLock;
use std::fmt;
use std::ops::Range;

/// Raw byte storage behind typed arrays and DataViews
pub struct JsArrayBuffer {
    /// `None` once detached
    bytes: RwLock<Option<Vec<u8>>>,
}

fn span(offset: usize, len: usize) -> Option<Range<usize>> {
    Some(offset..offset.checked_add(len)?)
}

impl JsArrayBuffer {
    /// Zero-filled buffer of `byte_length` bytes
    pub fn new(byte_length: usize) -> Self {
        Self::from_bytes(vec![0; byte_length])
    }

    /// Buffer owning `bytes`
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: RwLock::new(Some(bytes)),
        }
    }

    /// Whether the bytes have been released
    pub fn is_detached(&self) -> bool {
        self.bytes.read().is_none()
    }

    /// Release the bytes
    pub fn detach(&self) {
        self.bytes.write().take();
    }

    /// Length in bytes; 0 when detached
    pub fn byte_length(&self) -> usize {
        self.bytes.read().as_ref().map_or(0, Vec::len)
    }

    /// Move the bytes into a new buffer, detaching this one
    pub fn transfer(&self) -> Option<JsArrayBuffer> {
        self.bytes.write().take().map(JsArrayBuffer::from_bytes)
    }

    /// Independent copy of `[start, end)`. Both ends are clamped to the
    /// length and an inverted range yields an empty buffer.
    pub fn slice(&self, start: usize, end: usize) -> Option<JsArrayBuffer> {
        let guard = self.bytes.read();
        let bytes = guard.as_deref()?;
        let from = start.min(bytes.len());
        let to = end.clamp(from, bytes.len());
        Some(JsArrayBuffer::from_bytes(bytes[from..to].to_vec()))
    }

    /// Byte at `index`
    pub fn get(&self, index: usize) -> Option<u8> {
        self.bytes.read().as_deref()?.get(index).copied()
    }

    /// Overwrite the byte at `index`; false when out of range or detached
    pub fn set(&self, index: usize, value: u8) -> bool {
        let mut guard = self.bytes.write();
        match guard.as_deref_mut().and_then(|b| b.get_mut(index)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Fill `dest` from `offset`; false when the range does not fit
    pub fn read_bytes(&self, offset: usize, dest: &mut [u8]) -> bool {
        let Some(range) = span(offset, dest.len()) else {
            return false;
        };
        let guard = self.bytes.read();
        match guard.as_deref().and_then(|bytes| bytes.get(range)) {
            Some(src) => {
                dest.copy_from_slice(src);
                true
            }
            None => false,
        }
    }

    /// Copy `src` in at `offset`; false when the range does not fit
    pub fn write_bytes(&self, offset: usize, src: &[u8]) -> bool {
        let Some(range) = span(offset, src.len()) else {
            return false;
        };
        let mut guard = self.bytes.write();
        match guard.as_deref_mut().and_then(|bytes| bytes.get_mut(range)) {
            Some(dest) => {
                dest.copy_from_slice(src);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the contents; `None` when detached
    pub fn to_vec(&self) -> Option<Vec<u8>> {
        self.bytes.read().clone()
    }
}

impl fmt::Debug for JsArrayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bytes.read().as_deref() {
            Some(data) => write!(f, "ArrayBuffer {{ byteLength: {} }}", data.len()),
            None => write!(f, "ArrayBuffer {{ (detached) }}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zero_filled() {
        let ab = JsArrayBuffer::new(4);
        assert_eq!(ab.byte_length(), 4);
        assert_eq!(ab.to_vec(), Some(vec![0, 0, 0, 0]));
    }

    #[test]
    fn test_slice_copies() {
        let ab = JsArrayBuffer::from_bytes(vec![1, 2, 3, 4, 5]);
        let sliced = ab.slice(1, 4).unwrap();
        assert_eq!(sliced.to_vec(), Some(vec![2, 3, 4]));

        assert!(sliced.set(0, 99));
        assert_eq!(ab.get(1), Some(2));
    }

    #[test]
    fn test_slice_clamps_bounds() {
        let ab = JsArrayBuffer::from_bytes(vec![1, 2, 3]);
        assert_eq!(ab.slice(2, 100).unwrap().to_vec(), Some(vec![3]));
        assert_eq!(ab.slice(5, 1).unwrap().byte_length(), 0);
    }

    #[test]
    fn test_transfer_detaches_source() {
        let ab = JsArrayBuffer::from_bytes(vec![1, 2, 3]);
        let moved = ab.transfer().unwrap();
        assert!(ab.is_detached());
        assert_eq!(ab.get(0), None);
        assert!(ab.slice(0, 1).is_none());
        assert_eq!(moved.to_vec(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_read_write_bytes_bounds() {
        let ab = JsArrayBuffer::new(4);
        assert!(ab.write_bytes(2, &[7, 8]));
        assert!(!ab.write_bytes(3, &[7, 8]));
        assert!(!ab.write_bytes(usize::MAX, &[1]));
        let mut out = [0u8; 2];
        assert!(ab.read_bytes(2, &mut out));
        assert_eq!(out, [7, 8]);
    }
}
