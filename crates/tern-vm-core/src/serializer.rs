//! Structured serialization
//!
//! Turns a value graph into a self-contained byte string and back. This is
//! the generic half of the structured clone algorithm: it knows the full
//! catalog of cloneable kinds, keeps shared references shared and survives
//! cycles. Values outside the catalog (functions, symbols) fail with a
//! `TypeError`.
//!
//! ## Format
//!
//! ```text
//! header   := 0xFF VERSION
//! value    := tag payload
//!   '_'                      undefined
//!   '0'                      null
//!   'T' | 'F'                true / false
//!   'I' zigzag-varint        int32
//!   'N' f64 (LE)             double
//!   '"' varint utf8-bytes    string
//!   'Z' varint signed-LE     bigint
//!   'o' varint (key value)*  object (keys are strings)
//!   'A' varint value*        dense array
//!   'B' varint bytes         ArrayBuffer, inline contents
//!   'b' varint               ArrayBuffer, host id (see HostBufferDelegate)
//!   'V' kind value varint varint
//!                            view: kind code, buffer, byte offset, length
//!   '^' varint               back-reference to an earlier object
//! ```
//!
//! Objects, arrays, buffers and views are numbered in the order they are
//! first written; a back-reference names that number. View lengths are
//! element counts for typed arrays and byte counts for DataViews.

use std::sync::Arc;

use num_bigint::BigInt;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::array_buffer::JsArrayBuffer;
use crate::data_view::JsDataView;
use crate::error::{VmError, VmResult};
use crate::object::{JsObject, PropertyKey};
use crate::typed_array::{JsTypedArray, TypedArrayKind};
use crate::value::Value;

const HEADER: u8 = 0xFF;
/// Current wire version
pub const VERSION: u8 = 1;

const TAG_UNDEFINED: u8 = b'_';
const TAG_NULL: u8 = b'0';
const TAG_TRUE: u8 = b'T';
const TAG_FALSE: u8 = b'F';
const TAG_INT32: u8 = b'I';
const TAG_DOUBLE: u8 = b'N';
const TAG_STRING: u8 = b'"';
const TAG_BIGINT: u8 = b'Z';
const TAG_OBJECT: u8 = b'o';
const TAG_ARRAY: u8 = b'A';
const TAG_ARRAY_BUFFER: u8 = b'B';
const TAG_HOST_BUFFER: u8 = b'b';
const TAG_VIEW: u8 = b'V';
const TAG_BACK_REFERENCE: u8 = b'^';

/// View kind code for DataView; typed array kinds use their own codes
const DATA_VIEW_CODE: u8 = 0x40;

/// Serializer limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Maximum nesting of objects, arrays and views
    pub max_depth: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self { max_depth: 1000 }
    }
}

/// Hook for substituting ArrayBuffers with host-side handles.
///
/// When installed, buffers are not copied into the byte stream. The
/// serializer asks for an id and the deserializer asks for the buffer that id
/// stands for. Returning `None` from `write_buffer` falls back to writing the
/// contents inline.
pub trait HostBufferDelegate {
    /// Map a source buffer to a host id
    fn write_buffer(&mut self, buffer: &Arc<JsArrayBuffer>) -> VmResult<Option<u32>>;

    /// Resolve a host id written by `write_buffer`
    fn read_buffer(&mut self, id: u32) -> VmResult<Arc<JsArrayBuffer>>;
}

fn identity<T>(ptr: &Arc<T>) -> usize {
    Arc::as_ptr(ptr) as *const () as usize
}

/// Writes values into the structured byte format
pub struct ValueSerializer<'d> {
    buffer: Vec<u8>,
    /// Identity to id. The value is held so its address stays unique until
    /// the serializer is dropped.
    ids: FxHashMap<usize, (u32, Value)>,
    next_id: u32,
    depth: usize,
    config: SerializerConfig,
    delegate: Option<&'d mut dyn HostBufferDelegate>,
}

impl<'d> ValueSerializer<'d> {
    /// Create a serializer and write the header
    pub fn new(config: SerializerConfig) -> Self {
        Self {
            buffer: vec![HEADER, VERSION],
            ids: FxHashMap::default(),
            next_id: 0,
            depth: 0,
            config,
            delegate: None,
        }
    }

    /// Route ArrayBuffers through `delegate`
    pub fn with_delegate(mut self, delegate: &'d mut dyn HostBufferDelegate) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Consume the serializer, returning the bytes written
    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }

    /// Write one value (and everything reachable from it)
    pub fn write_value(&mut self, value: &Value) -> VmResult<()> {
        match value {
            Value::Undefined => self.buffer.push(TAG_UNDEFINED),
            Value::Null => self.buffer.push(TAG_NULL),
            Value::Boolean(true) => self.buffer.push(TAG_TRUE),
            Value::Boolean(false) => self.buffer.push(TAG_FALSE),
            Value::Number(n) => self.write_number(*n),
            Value::String(s) => {
                self.buffer.push(TAG_STRING);
                self.write_bytes(s.as_bytes());
            }
            Value::BigInt(b) => {
                self.buffer.push(TAG_BIGINT);
                self.write_bytes(&b.to_signed_bytes_le());
            }
            Value::Symbol(_) => {
                return Err(VmError::type_error("Symbol() could not be cloned"));
            }
            Value::Function(f) => {
                return Err(VmError::type_error(format!("{f:?} could not be cloned")));
            }
            Value::Object(obj) => {
                if !self.write_back_reference(value, identity(obj)) {
                    self.write_object(obj)?;
                }
            }
            Value::Array(arr) => {
                if !self.write_back_reference(value, identity(arr)) {
                    self.write_array(arr)?;
                }
            }
            Value::ArrayBuffer(buf) => {
                if !self.write_back_reference(value, identity(buf)) {
                    self.write_array_buffer(buf)?;
                }
            }
            Value::TypedArray(ta) => {
                if !self.write_back_reference(value, identity(ta)) {
                    self.write_view(ta.kind().code(), ta.buffer(), ta.byte_offset(), ta.length())?;
                }
            }
            Value::DataView(dv) => {
                if !self.write_back_reference(value, identity(dv)) {
                    self.write_view(DATA_VIEW_CODE, dv.buffer(), dv.byte_offset(), dv.byte_length())?;
                }
            }
        }
        Ok(())
    }

    fn write_number(&mut self, n: f64) {
        let is_int32 = n.fract() == 0.0
            && n >= i32::MIN as f64
            && n <= i32::MAX as f64
            && !(n == 0.0 && n.is_sign_negative());
        if is_int32 {
            self.buffer.push(TAG_INT32);
            let i = n as i32;
            self.write_varint(((i << 1) ^ (i >> 31)) as u32 as u64);
        } else {
            self.buffer.push(TAG_DOUBLE);
            self.buffer.extend_from_slice(&n.to_le_bytes());
        }
    }

    fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buffer.push(byte);
                return;
            }
            self.buffer.push(byte | 0x80);
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    /// Emit a back-reference if `value` was seen before; otherwise number it
    fn write_back_reference(&mut self, value: &Value, key: usize) -> bool {
        if let Some((id, _)) = self.ids.get(&key) {
            let id = *id;
            self.buffer.push(TAG_BACK_REFERENCE);
            self.write_varint(id as u64);
            return true;
        }
        self.ids.insert(key, (self.next_id, value.clone()));
        self.next_id += 1;
        false
    }

    fn enter(&mut self) -> VmResult<()> {
        if self.depth >= self.config.max_depth {
            return Err(VmError::StackOverflow);
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn write_object(&mut self, obj: &Arc<JsObject>) -> VmResult<()> {
        self.enter()?;
        let receiver = Value::object(obj.clone());
        let mut entries = Vec::new();
        for key in obj.own_keys() {
            let Some(name) = key.to_key_string() else {
                continue;
            };
            match obj.get_own_property(&key) {
                Some(desc) if desc.attributes().enumerable => {
                    entries.push((name, receiver.get(&key)?));
                }
                _ => {}
            }
        }
        self.buffer.push(TAG_OBJECT);
        self.write_varint(entries.len() as u64);
        for (name, value) in &entries {
            self.write_bytes(name.as_bytes());
            self.write_value(value)?;
        }
        self.leave();
        Ok(())
    }

    fn write_array(&mut self, arr: &Arc<JsObject>) -> VmResult<()> {
        self.enter()?;
        let elements = arr.array_elements();
        self.buffer.push(TAG_ARRAY);
        self.write_varint(elements.len() as u64);
        for element in &elements {
            self.write_value(element)?;
        }
        self.leave();
        Ok(())
    }

    fn write_array_buffer(&mut self, buf: &Arc<JsArrayBuffer>) -> VmResult<()> {
        if buf.is_detached() {
            return Err(VmError::type_error(
                "An ArrayBuffer is detached and could not be cloned",
            ));
        }
        if let Some(delegate) = self.delegate.as_mut()
            && let Some(id) = delegate.write_buffer(buf)?
        {
            self.buffer.push(TAG_HOST_BUFFER);
            self.write_varint(id as u64);
            return Ok(());
        }
        let contents = buf.to_vec().unwrap_or_default();
        self.buffer.push(TAG_ARRAY_BUFFER);
        self.write_bytes(&contents);
        Ok(())
    }

    fn write_view(
        &mut self,
        code: u8,
        buffer: &Arc<JsArrayBuffer>,
        byte_offset: usize,
        length: usize,
    ) -> VmResult<()> {
        self.enter()?;
        self.buffer.push(TAG_VIEW);
        self.buffer.push(code);
        self.write_value(&Value::array_buffer(buffer.clone()))?;
        self.write_varint(byte_offset as u64);
        self.write_varint(length as u64);
        self.leave();
        Ok(())
    }
}

fn malformed() -> VmError {
    VmError::internal("Unable to deserialize cloned data")
}

/// Reads values back out of the structured byte format
pub struct ValueDeserializer<'a, 'd> {
    data: &'a [u8],
    position: usize,
    objects: Vec<Value>,
    depth: usize,
    config: SerializerConfig,
    delegate: Option<&'d mut dyn HostBufferDelegate>,
}

impl<'a, 'd> ValueDeserializer<'a, 'd> {
    /// Create a deserializer over `data`
    pub fn new(data: &'a [u8], config: SerializerConfig) -> Self {
        Self {
            data,
            position: 0,
            objects: Vec::new(),
            depth: 0,
            config,
            delegate: None,
        }
    }

    /// Resolve host buffer ids through `delegate`
    pub fn with_delegate(mut self, delegate: &'d mut dyn HostBufferDelegate) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Check the header
    pub fn read_header(&mut self) -> VmResult<()> {
        if self.read_byte()? != HEADER {
            return Err(malformed());
        }
        let version = self.read_byte()?;
        if version != VERSION {
            return Err(VmError::internal(format!(
                "Unsupported structured clone version {version}"
            )));
        }
        Ok(())
    }

    /// Check that the whole input was consumed
    pub fn finish(&self) -> VmResult<()> {
        if self.position == self.data.len() {
            Ok(())
        } else {
            Err(malformed())
        }
    }

    fn read_byte(&mut self) -> VmResult<u8> {
        let byte = *self.data.get(self.position).ok_or_else(malformed)?;
        self.position += 1;
        Ok(byte)
    }

    fn read_varint(&mut self) -> VmResult<u64> {
        let mut result = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            if shift >= 64 {
                return Err(malformed());
            }
            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    fn read_usize(&mut self) -> VmResult<usize> {
        usize::try_from(self.read_varint()?).map_err(|_| malformed())
    }

    fn read_raw(&mut self, len: usize) -> VmResult<&'a [u8]> {
        let end = self.position.checked_add(len).ok_or_else(malformed)?;
        let bytes = self.data.get(self.position..end).ok_or_else(malformed)?;
        self.position = end;
        Ok(bytes)
    }

    fn read_string(&mut self) -> VmResult<String> {
        let len = self.read_usize()?;
        let bytes = self.read_raw(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| malformed())
    }

    fn enter(&mut self) -> VmResult<()> {
        if self.depth >= self.config.max_depth {
            return Err(VmError::StackOverflow);
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Read one value
    pub fn read_value(&mut self) -> VmResult<Value> {
        match self.read_byte()? {
            TAG_UNDEFINED => Ok(Value::undefined()),
            TAG_NULL => Ok(Value::null()),
            TAG_TRUE => Ok(Value::boolean(true)),
            TAG_FALSE => Ok(Value::boolean(false)),
            TAG_INT32 => {
                let raw = u32::try_from(self.read_varint()?).map_err(|_| malformed())?;
                let i = ((raw >> 1) as i32) ^ -((raw & 1) as i32);
                Ok(Value::int32(i))
            }
            TAG_DOUBLE => {
                let bytes: [u8; 8] = self.read_raw(8)?.try_into().map_err(|_| malformed())?;
                Ok(Value::number(f64::from_le_bytes(bytes)))
            }
            TAG_STRING => {
                let s = self.read_string()?;
                Ok(Value::string(&s))
            }
            TAG_BIGINT => {
                let len = self.read_usize()?;
                let bytes = self.read_raw(len)?;
                Ok(Value::bigint(BigInt::from_signed_bytes_le(bytes)))
            }
            TAG_OBJECT => self.read_object(),
            TAG_ARRAY => self.read_array(),
            TAG_ARRAY_BUFFER => {
                let len = self.read_usize()?;
                let bytes = self.read_raw(len)?;
                let value = Value::array_buffer(Arc::new(JsArrayBuffer::from_bytes(bytes.to_vec())));
                self.objects.push(value.clone());
                Ok(value)
            }
            TAG_HOST_BUFFER => {
                let id = u32::try_from(self.read_varint()?).map_err(|_| malformed())?;
                let delegate = self.delegate.as_mut().ok_or_else(malformed)?;
                let value = Value::array_buffer(delegate.read_buffer(id)?);
                self.objects.push(value.clone());
                Ok(value)
            }
            TAG_VIEW => self.read_view(),
            TAG_BACK_REFERENCE => {
                let id = self.read_usize()?;
                self.objects.get(id).cloned().ok_or_else(malformed)
            }
            _ => Err(malformed()),
        }
    }

    fn read_object(&mut self) -> VmResult<Value> {
        self.enter()?;
        let obj = Arc::new(JsObject::new(None));
        let value = Value::object(obj.clone());
        // Registered before the properties so cycles resolve to it
        self.objects.push(value.clone());
        let count = self.read_usize()?;
        for _ in 0..count {
            let name = self.read_string()?;
            let property = self.read_value()?;
            obj.set(PropertyKey::string(&name), property);
        }
        self.leave();
        Ok(value)
    }

    fn read_array(&mut self) -> VmResult<Value> {
        self.enter()?;
        let len = self.read_usize()?;
        let arr = Arc::new(JsObject::array(0));
        let value = Value::array(arr.clone());
        self.objects.push(value.clone());
        for _ in 0..len {
            arr.array_push(self.read_value()?);
        }
        self.leave();
        Ok(value)
    }

    fn read_view(&mut self) -> VmResult<Value> {
        self.enter()?;
        let code = self.read_byte()?;
        // The view is numbered before its buffer
        let slot = self.objects.len();
        self.objects.push(Value::undefined());

        let buffer = self
            .read_value()?
            .as_array_buffer()
            .cloned()
            .ok_or_else(malformed)?;
        let byte_offset = self.read_usize()?;
        let length = self.read_usize()?;

        let value = if code == DATA_VIEW_CODE {
            let dv = JsDataView::new(buffer, byte_offset, Some(length)).map_err(VmError::range_error)?;
            Value::data_view(Arc::new(dv))
        } else {
            let kind = TypedArrayKind::from_code(code).ok_or_else(malformed)?;
            let ta = JsTypedArray::new(buffer, kind, byte_offset, length).map_err(VmError::range_error)?;
            Value::typed_array(Arc::new(ta))
        };
        self.objects[slot] = value.clone();
        self.leave();
        Ok(value)
    }
}

/// Serialize `value` with default limits and no delegate
pub fn serialize(value: &Value) -> VmResult<Vec<u8>> {
    let mut serializer = ValueSerializer::new(SerializerConfig::default());
    serializer.write_value(value)?;
    let bytes = serializer.finish();
    tracing::trace!(len = bytes.len(), "serialized value");
    Ok(bytes)
}

/// Deserialize bytes produced by [`serialize`]
pub fn deserialize(data: &[u8]) -> VmResult<Value> {
    let mut deserializer = ValueDeserializer::new(data, SerializerConfig::default());
    deserializer.read_header()?;
    let value = deserializer.read_value().inspect_err(|err| {
        tracing::debug!(error = %err, "failed to deserialize value");
    })?;
    deserializer.finish()?;
    Ok(value)
}
