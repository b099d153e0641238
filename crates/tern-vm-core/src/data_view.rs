//! DataView
//!
//! Byte-addressed reads and writes of any numeric type over an ArrayBuffer,
//! with the byte order chosen per access.

use std::fmt;
use std::sync::Arc;

use crate::array_buffer::JsArrayBuffer;

/// A number type a [`JsDataView`] can read and write
pub trait ViewElement: Sized + Copy {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes
    fn from_bytes(bytes: &[u8], little_endian: bool) -> Self;

    /// Encode into exactly `SIZE` bytes
    fn write_bytes(self, out: &mut [u8], little_endian: bool);
}

macro_rules! view_element {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ViewElement for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_bytes(bytes: &[u8], little_endian: bool) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    if little_endian {
                        <$ty>::from_le_bytes(raw)
                    } else {
                        <$ty>::from_be_bytes(raw)
                    }
                }

                fn write_bytes(self, out: &mut [u8], little_endian: bool) {
                    let raw = if little_endian {
                        self.to_le_bytes()
                    } else {
                        self.to_be_bytes()
                    };
                    out.copy_from_slice(&raw);
                }
            }
        )*
    };
}

view_element!(i8, u8, i16, u16, i32, u32, f32, f64, i64, u64);

/// Failure of a DataView access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataViewError {
    /// The backing buffer was detached
    Detached,
    /// The access falls outside the view
    OutOfBounds,
}

/// A byte window over an ArrayBuffer. Unlike a typed array, its length is
/// counted in bytes.
pub struct JsDataView {
    buffer: Arc<JsArrayBuffer>,
    byte_offset: usize,
    byte_length: usize,
}

impl JsDataView {
    /// View `byte_length` bytes of `buffer` from `byte_offset`, or the rest
    /// of the buffer when no length is given.
    pub fn new(
        buffer: Arc<JsArrayBuffer>,
        byte_offset: usize,
        byte_length: Option<usize>,
    ) -> Result<Self, &'static str> {
        if buffer.is_detached() {
            return Err("cannot create DataView on detached buffer");
        }
        let available = buffer
            .byte_length()
            .checked_sub(byte_offset)
            .ok_or("start offset is outside the bounds of the buffer")?;
        let byte_length = match byte_length {
            Some(len) if len > available => return Err("invalid DataView length"),
            Some(len) => len,
            None => available,
        };
        Ok(Self {
            buffer,
            byte_offset,
            byte_length,
        })
    }

    /// Backing buffer
    pub fn buffer(&self) -> &Arc<JsArrayBuffer> {
        &self.buffer
    }

    /// Offset of the window in the buffer
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// Window size in bytes (0 once the buffer is detached)
    pub fn byte_length(&self) -> usize {
        if self.buffer.is_detached() { 0 } else { self.byte_length }
    }

    /// Whether the backing buffer is detached
    pub fn is_detached(&self) -> bool {
        self.buffer.is_detached()
    }

    fn window(&self, offset: usize, size: usize) -> Result<usize, DataViewError> {
        if self.buffer.is_detached() {
            return Err(DataViewError::Detached);
        }
        match offset.checked_add(size) {
            Some(end) if end <= self.byte_length => Ok(self.byte_offset + offset),
            _ => Err(DataViewError::OutOfBounds),
        }
    }

    /// Read a `T` at `offset` (relative to the view)
    pub fn get<T: ViewElement>(&self, offset: usize, little_endian: bool) -> Result<T, DataViewError> {
        let start = self.window(offset, T::SIZE)?;
        let mut raw = [0u8; 8];
        if !self.buffer.read_bytes(start, &mut raw[..T::SIZE]) {
            return Err(DataViewError::OutOfBounds);
        }
        Ok(T::from_bytes(&raw[..T::SIZE], little_endian))
    }

    /// Write `value` at `offset` (relative to the view)
    pub fn set<T: ViewElement>(
        &self,
        offset: usize,
        value: T,
        little_endian: bool,
    ) -> Result<(), DataViewError> {
        let start = self.window(offset, T::SIZE)?;
        let mut raw = [0u8; 8];
        value.write_bytes(&mut raw[..T::SIZE], little_endian);
        if self.buffer.write_bytes(start, &raw[..T::SIZE]) {
            Ok(())
        } else {
            Err(DataViewError::OutOfBounds)
        }
    }
}

impl fmt::Debug for JsDataView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataView({} @ {})", self.byte_length(), self.byte_offset)
    }
}
