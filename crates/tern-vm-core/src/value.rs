//! JavaScript values
//!
//! Primitives are stored inline. Everything with identity (objects, arrays,
//! functions, buffers and their views) lives behind an `Arc`, so cloning a
//! `Value` copies a reference, never the referent. Equality on those variants
//! is identity equality, which is what the clone machinery relies on.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use num_bigint::BigInt;

use crate::array_buffer::JsArrayBuffer;
use crate::data_view::JsDataView;
use crate::error::{VmError, VmResult};
use crate::object::{JsObject, PropertyDescriptor, PropertyKey};
use crate::typed_array::JsTypedArray;

/// A JavaScript value
#[derive(Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean primitive
    Boolean(bool),
    /// Number primitive
    Number(f64),
    /// String primitive
    String(Arc<str>),
    /// BigInt primitive
    BigInt(Arc<BigInt>),
    /// Symbol primitive (unique by identity)
    Symbol(Arc<Symbol>),
    /// Ordinary object
    Object(Arc<JsObject>),
    /// Array exotic object
    Array(Arc<JsObject>),
    /// Callable function
    Function(Arc<JsFunction>),
    /// ArrayBuffer
    ArrayBuffer(Arc<JsArrayBuffer>),
    /// TypedArray (view over an ArrayBuffer)
    TypedArray(Arc<JsTypedArray>),
    /// DataView (byte-addressable view over an ArrayBuffer)
    DataView(Arc<JsDataView>),
}

/// A JavaScript Symbol
#[derive(Debug)]
pub struct Symbol {
    /// Symbol description
    pub description: Option<String>,
    /// Unique ID
    pub id: u64,
}

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

impl Symbol {
    /// Allocate a fresh, unique symbol
    pub fn new(description: Option<&str>) -> Self {
        Self {
            description: description.map(str::to_string),
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// Native call interface.
///
/// Every callable value bottoms out here: one method that receives the
/// receiver and the argument list.
pub trait NativeCall: Send + Sync {
    /// Invoke with `this` and `args`
    fn call(&self, this: &Value, args: &[Value]) -> VmResult<Value>;
}

struct ClosureCall<F>(F);

impl<F> NativeCall for ClosureCall<F>
where
    F: Fn(&Value, &[Value]) -> VmResult<Value> + Send + Sync,
{
    fn call(&self, this: &Value, args: &[Value]) -> VmResult<Value> {
        (self.0)(this, args)
    }
}

/// A function object
pub struct JsFunction {
    name: Arc<str>,
    length: u32,
    body: Arc<dyn NativeCall>,
}

impl JsFunction {
    /// Wrap a Rust closure
    pub fn native<F>(name: &str, length: u32, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
    {
        Self::from_call(name, length, Arc::new(ClosureCall(f)))
    }

    /// Wrap an existing [`NativeCall`] implementation
    pub fn from_call(name: &str, length: u32, body: Arc<dyn NativeCall>) -> Self {
        Self {
            name: Arc::from(name),
            length,
            body,
        }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter count
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Call the function
    pub fn call(&self, this: &Value, args: &[Value]) -> VmResult<Value> {
        self.body.call(this, args)
    }
}

impl fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name)
    }
}

impl Value {
    /// Create undefined value
    #[inline]
    pub const fn undefined() -> Self {
        Self::Undefined
    }

    /// Create null value
    #[inline]
    pub const fn null() -> Self {
        Self::Null
    }

    /// Create boolean value
    #[inline]
    pub const fn boolean(b: bool) -> Self {
        Self::Boolean(b)
    }

    /// Create number value
    #[inline]
    pub const fn number(n: f64) -> Self {
        Self::Number(n)
    }

    /// Create number value from an integer
    #[inline]
    pub const fn int32(n: i32) -> Self {
        Self::Number(n as f64)
    }

    /// Create string value
    pub fn string(s: &str) -> Self {
        Self::String(Arc::from(s))
    }

    /// Create bigint value
    pub fn bigint(n: BigInt) -> Self {
        Self::BigInt(Arc::new(n))
    }

    /// Create a fresh symbol value
    pub fn symbol(description: Option<&str>) -> Self {
        Self::Symbol(Arc::new(Symbol::new(description)))
    }

    /// Create object value
    pub fn object(obj: Arc<JsObject>) -> Self {
        Self::Object(obj)
    }

    /// Create array value
    pub fn array(arr: Arc<JsObject>) -> Self {
        Self::Array(arr)
    }

    /// Create an array value holding `elements`
    pub fn array_from(elements: Vec<Value>) -> Self {
        Self::Array(Arc::new(JsObject::array_from(elements)))
    }

    /// Create function value
    pub fn function(f: Arc<JsFunction>) -> Self {
        Self::Function(f)
    }

    /// Create a native function value from a closure
    pub fn native_function<F>(name: &str, length: u32, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(JsFunction::native(name, length, f)))
    }

    /// Create ArrayBuffer value
    pub fn array_buffer(ab: Arc<JsArrayBuffer>) -> Self {
        Self::ArrayBuffer(ab)
    }

    /// Create TypedArray value
    pub fn typed_array(ta: Arc<JsTypedArray>) -> Self {
        Self::TypedArray(ta)
    }

    /// Create DataView value
    pub fn data_view(dv: Arc<JsDataView>) -> Self {
        Self::DataView(dv)
    }

    /// Check if null or undefined
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Check if this is an array
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Check if this value can be called
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    /// Get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Get the property-bearing object (ordinary object or array)
    pub fn as_object(&self) -> Option<&Arc<JsObject>> {
        match self {
            Self::Object(o) | Self::Array(o) => Some(o),
            _ => None,
        }
    }

    /// Get as ArrayBuffer
    pub fn as_array_buffer(&self) -> Option<&Arc<JsArrayBuffer>> {
        match self {
            Self::ArrayBuffer(b) => Some(b),
            _ => None,
        }
    }

    /// Get as TypedArray
    pub fn as_typed_array(&self) -> Option<&Arc<JsTypedArray>> {
        match self {
            Self::TypedArray(t) => Some(t),
            _ => None,
        }
    }

    /// Get as DataView
    pub fn as_data_view(&self) -> Option<&Arc<JsDataView>> {
        match self {
            Self::DataView(d) => Some(d),
            _ => None,
        }
    }

    /// The `typeof` string
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::BigInt(_) => "bigint",
            Self::Symbol(_) => "symbol",
            Self::Function(_) => "function",
            _ => "object",
        }
    }

    /// Call this value as a function
    pub fn call(&self, this: &Value, args: &[Value]) -> VmResult<Value> {
        match self {
            Self::Function(f) => f.call(this, args),
            other => Err(VmError::type_error(format!(
                "{} is not a function",
                other.type_of()
            ))),
        }
    }

    /// `[[Get]]`: walks the prototype chain and runs getters with `self` as receiver
    pub fn get(&self, key: &PropertyKey) -> VmResult<Value> {
        let Some(obj) = self.as_object() else {
            return Ok(Value::undefined());
        };
        match obj.lookup_property(key) {
            Some(PropertyDescriptor::Data { value, .. }) => Ok(value),
            Some(PropertyDescriptor::Accessor { get: Some(getter), .. }) => getter.call(self, &[]),
            Some(PropertyDescriptor::Accessor { get: None, .. }) | None => {
                Ok(Value::undefined())
            }
        }
    }

    /// `[[Set]]`: runs setters found on the prototype chain with `self` as receiver
    pub fn set(&self, key: PropertyKey, value: Value) -> VmResult<bool> {
        let Some(obj) = self.as_object() else {
            return Err(VmError::type_error(format!(
                "Cannot set properties of {}",
                self.type_of()
            )));
        };
        match obj.lookup_property(&key) {
            Some(PropertyDescriptor::Accessor { set: Some(setter), .. }) => {
                setter.call(self, &[value])?;
                Ok(true)
            }
            Some(PropertyDescriptor::Accessor { set: None, .. }) => Ok(false),
            _ => Ok(obj.set(key, value)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) | (Self::Array(a), Self::Array(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            (Self::ArrayBuffer(a), Self::ArrayBuffer(b)) => Arc::ptr_eq(a, b),
            (Self::TypedArray(a), Self::TypedArray(b)) => Arc::ptr_eq(a, b),
            (Self::DataView(a), Self::DataView(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::BigInt(b) => write!(f, "{b}n"),
            Self::Symbol(s) => match &s.description {
                Some(d) => write!(f, "Symbol({d})"),
                None => write!(f, "Symbol()"),
            },
            Self::Object(o) => fmt::Debug::fmt(o, f),
            Self::Array(a) => fmt::Debug::fmt(a, f),
            Self::Function(func) => fmt::Debug::fmt(func, f),
            Self::ArrayBuffer(b) => fmt::Debug::fmt(b, f),
            Self::TypedArray(t) => fmt::Debug::fmt(t, f),
            Self::DataView(d) => fmt::Debug::fmt(d, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::int32(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}
