//! Typed arrays
//!
//! A typed array is a window of fixed-size elements over an ArrayBuffer.
//! Elements are stored little-endian. The eleven element kinds share one
//! view type; [`TypedArrayKind`] carries the per-kind encoding.

use std::fmt;
use std::sync::Arc;

use crate::array_buffer::JsArrayBuffer;

/// Element type of a typed array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedArrayKind {
    /// `Int8Array`
    Int8,
    /// `Uint8Array`
    Uint8,
    /// `Uint8ClampedArray`
    Uint8Clamped,
    /// `Int16Array`
    Int16,
    /// `Uint16Array`
    Uint16,
    /// `Int32Array`
    Int32,
    /// `Uint32Array`
    Uint32,
    /// `Float32Array`
    Float32,
    /// `Float64Array`
    Float64,
    /// `BigInt64Array`
    BigInt64,
    /// `BigUint64Array`
    BigUint64,
}

impl TypedArrayKind {
    /// All kinds, indexed by [`TypedArrayKind::code`]
    pub const ALL: [TypedArrayKind; 11] = [
        Self::Int8,
        Self::Uint8,
        Self::Uint8Clamped,
        Self::Int16,
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
        Self::Float32,
        Self::Float64,
        Self::BigInt64,
        Self::BigUint64,
    ];

    /// Bytes per element
    pub fn element_size(&self) -> usize {
        use TypedArrayKind::*;
        match self {
            Int8 | Uint8 | Uint8Clamped => 1,
            Int16 | Uint16 => 2,
            Int32 | Uint32 | Float32 => 4,
            Float64 | BigInt64 | BigUint64 => 8,
        }
    }

    /// Constructor name as seen by script
    pub fn name(&self) -> &'static str {
        use TypedArrayKind::*;
        match self {
            Int8 => "Int8Array",
            Uint8 => "Uint8Array",
            Uint8Clamped => "Uint8ClampedArray",
            Int16 => "Int16Array",
            Uint16 => "Uint16Array",
            Int32 => "Int32Array",
            Uint32 => "Uint32Array",
            Float32 => "Float32Array",
            Float64 => "Float64Array",
            BigInt64 => "BigInt64Array",
            BigUint64 => "BigUint64Array",
        }
    }

    /// Whether elements are BigInts rather than Numbers
    pub fn is_bigint(&self) -> bool {
        matches!(self, Self::BigInt64 | Self::BigUint64)
    }

    /// Stable one-byte code used by the serializer
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Inverse of [`TypedArrayKind::code`]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Number stored in `bytes` (exactly one element). BigInt kinds yield NaN.
    fn decode(&self, bytes: &[u8]) -> f64 {
        use TypedArrayKind::*;
        let mut raw = [0u8; 8];
        raw[..bytes.len()].copy_from_slice(bytes);
        match self {
            Int8 => raw[0] as i8 as f64,
            Uint8 | Uint8Clamped => raw[0] as f64,
            Int16 => i16::from_le_bytes([raw[0], raw[1]]) as f64,
            Uint16 => u16::from_le_bytes([raw[0], raw[1]]) as f64,
            Int32 => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
            Uint32 => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
            Float32 => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
            Float64 => f64::from_le_bytes(raw),
            BigInt64 | BigUint64 => f64::NAN,
        }
    }

    /// Little-endian encoding of `value`; the first `element_size` bytes are
    /// meaningful. `None` for BigInt kinds.
    fn encode(&self, value: f64) -> Option<[u8; 8]> {
        use TypedArrayKind::*;
        let mut raw = [0u8; 8];
        match self {
            Int8 => raw[0] = value as i8 as u8,
            Uint8 => raw[0] = value as u8,
            Uint8Clamped => {
                raw[0] = if value.is_nan() {
                    0
                } else {
                    value.clamp(0.0, 255.0).round() as u8
                }
            }
            Int16 => raw[..2].copy_from_slice(&(value as i16).to_le_bytes()),
            Uint16 => raw[..2].copy_from_slice(&(value as u16).to_le_bytes()),
            Int32 => raw[..4].copy_from_slice(&(value as i32).to_le_bytes()),
            Uint32 => raw[..4].copy_from_slice(&(value as u32).to_le_bytes()),
            Float32 => raw[..4].copy_from_slice(&(value as f32).to_le_bytes()),
            Float64 => raw = value.to_le_bytes(),
            BigInt64 | BigUint64 => return None,
        }
        Some(raw)
    }
}

/// A typed window over an ArrayBuffer. Views never own their bytes.
pub struct JsTypedArray {
    buffer: Arc<JsArrayBuffer>,
    byte_offset: usize,
    /// Element count
    length: usize,
    kind: TypedArrayKind,
}

impl JsTypedArray {
    /// View `length` elements of `buffer` starting at `byte_offset`.
    ///
    /// The offset must be a multiple of the element size and the window must
    /// lie inside the buffer.
    pub fn new(
        buffer: Arc<JsArrayBuffer>,
        kind: TypedArrayKind,
        byte_offset: usize,
        length: usize,
    ) -> Result<Self, &'static str> {
        if buffer.is_detached() {
            return Err("cannot create TypedArray on detached buffer");
        }
        let size = kind.element_size();
        if byte_offset % size != 0 {
            return Err("start offset must be a multiple of the element size");
        }
        let end = length
            .checked_mul(size)
            .and_then(|bytes| bytes.checked_add(byte_offset))
            .ok_or("invalid typed array length")?;
        if end > buffer.byte_length() {
            return Err("typed array extends past the end of its buffer");
        }
        Ok(Self {
            buffer,
            byte_offset,
            length,
            kind,
        })
    }

    /// A view over a fresh zero-filled buffer of `length` elements
    pub fn with_length(kind: TypedArrayKind, length: usize) -> Self {
        Self {
            buffer: Arc::new(JsArrayBuffer::new(length * kind.element_size())),
            byte_offset: 0,
            length,
            kind,
        }
    }

    /// Element kind
    pub fn kind(&self) -> TypedArrayKind {
        self.kind
    }

    /// Backing buffer
    pub fn buffer(&self) -> &Arc<JsArrayBuffer> {
        &self.buffer
    }

    /// Offset of the first element in the buffer
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// Size of the window in bytes (0 once the buffer is detached)
    pub fn byte_length(&self) -> usize {
        self.length() * self.kind.element_size()
    }

    /// Element count (0 once the buffer is detached)
    pub fn length(&self) -> usize {
        if self.buffer.is_detached() { 0 } else { self.length }
    }

    /// Whether the backing buffer is detached
    pub fn is_detached(&self) -> bool {
        self.buffer.is_detached()
    }

    fn element_offset(&self, index: usize) -> Option<usize> {
        (index < self.length).then(|| self.byte_offset + index * self.kind.element_size())
    }

    fn read_element(&self, index: usize) -> Option<[u8; 8]> {
        let offset = self.element_offset(index)?;
        let mut raw = [0u8; 8];
        let size = self.kind.element_size();
        self.buffer
            .read_bytes(offset, &mut raw[..size])
            .then_some(raw)
    }

    /// Element at `index` as a Number. BigInt kinds yield NaN.
    pub fn get(&self, index: usize) -> Option<f64> {
        let raw = self.read_element(index)?;
        Some(self.kind.decode(&raw[..self.kind.element_size()]))
    }

    /// Element at `index` of a BigInt kind
    pub fn get_bigint(&self, index: usize) -> Option<i64> {
        if !self.kind.is_bigint() {
            return None;
        }
        self.read_element(index).map(i64::from_le_bytes)
    }

    /// Store a Number at `index`; false when out of range, detached or BigInt
    pub fn set(&self, index: usize, value: f64) -> bool {
        let (Some(offset), Some(raw)) = (self.element_offset(index), self.kind.encode(value))
        else {
            return false;
        };
        self.buffer
            .write_bytes(offset, &raw[..self.kind.element_size()])
    }

    /// Store a BigInt at `index` of a BigInt kind
    pub fn set_bigint(&self, index: usize, value: i64) -> bool {
        match self.element_offset(index) {
            Some(offset) if self.kind.is_bigint() => {
                self.buffer.write_bytes(offset, &value.to_le_bytes())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for JsTypedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) @ {}",
            self.kind.name(),
            self.length(),
            self.byte_offset
        )
    }
}
