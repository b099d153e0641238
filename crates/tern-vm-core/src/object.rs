//! JavaScript objects
//!
//! Own properties are kept in insertion order, which is the enumeration
//! order scripts observe for string keys. Integer-indexed elements of arrays
//! live in a separate dense vector.
//!
//! Besides script-visible properties every object carries host data: private
//! slots keyed by Rust type that scripts can neither see nor forge. Web APIs
//! hang their internal state (listener lists, handler tables) there.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::value::{Symbol, Value};

/// Key of an own property
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Non-index string
    String(Arc<str>),
    /// Symbol, by id
    Symbol(u64),
    /// Canonical array index (`0` to `2^32 - 2`)
    Index(u32),
}

impl PropertyKey {
    /// Key for `s`; canonical index strings such as `"3"` become [`PropertyKey::Index`]
    pub fn string(s: &str) -> Self {
        match s.parse::<u32>() {
            Ok(i) if i != u32::MAX && i.to_string() == s => Self::Index(i),
            _ => Self::String(Arc::from(s)),
        }
    }

    /// Key for a symbol
    pub fn symbol(sym: &Symbol) -> Self {
        Self::Symbol(sym.id)
    }

    /// String form of the key; `None` for symbols
    pub fn to_key_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.to_string()),
            Self::Index(i) => Some(i.to_string()),
            Self::Symbol(_) => None,
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

/// `[[Writable]]`, `[[Enumerable]]` and `[[Configurable]]`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PropertyAttributes {
    /// Assignment allowed (data properties only)
    pub writable: bool,
    /// Visible to enumeration and cloning
    pub enumerable: bool,
    /// May be deleted or redefined
    pub configurable: bool,
}

impl PropertyAttributes {
    /// What plain assignment creates: all flags set
    pub const fn data() -> Self {
        Self {
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Web IDL attribute shape: enumerable and configurable
    pub const fn accessor() -> Self {
        Self {
            writable: false,
            enumerable: true,
            configurable: true,
        }
    }

    /// All flags cleared
    pub const fn frozen() -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }
}

/// Own property: a stored value or a getter/setter pair
#[derive(Clone, Debug)]
pub enum PropertyDescriptor {
    /// Stored value
    Data {
        /// Current value
        value: Value,
        /// Flags
        attributes: PropertyAttributes,
    },
    /// Getter/setter pair; either half may be missing
    Accessor {
        /// Called on read with the receiver as `this`
        get: Option<Value>,
        /// Called on write with the receiver as `this`
        set: Option<Value>,
        /// Flags (`writable` is ignored)
        attributes: PropertyAttributes,
    },
}

impl PropertyDescriptor {
    /// Data property with [`PropertyAttributes::data`]
    pub fn data(value: Value) -> Self {
        Self::data_with_attrs(value, PropertyAttributes::data())
    }

    /// Data property with explicit flags
    pub fn data_with_attrs(value: Value, attributes: PropertyAttributes) -> Self {
        Self::Data { value, attributes }
    }

    /// Accessor property
    pub fn accessor(get: Option<Value>, set: Option<Value>, attributes: PropertyAttributes) -> Self {
        Self::Accessor {
            get,
            set,
            attributes,
        }
    }

    /// Stored value, if this is a data property
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }

    /// Flags of either kind
    pub fn attributes(&self) -> PropertyAttributes {
        match self {
            Self::Data { attributes, .. } | Self::Accessor { attributes, .. } => *attributes,
        }
    }

    /// Whether this is a getter/setter pair
    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }
}

type HostSlot = Arc<dyn Any + Send + Sync>;

struct Slots {
    named: IndexMap<PropertyKey, PropertyDescriptor>,
    elements: Vec<Value>,
    extensible: bool,
}

/// A JavaScript object (ordinary or array)
///
/// All state sits behind locks, so objects can be shared through `Arc`.
pub struct JsObject {
    slots: RwLock<Slots>,
    prototype: Option<Arc<JsObject>>,
    host_data: RwLock<FxHashMap<TypeId, HostSlot>>,
    is_array: bool,
}

impl JsObject {
    /// Ordinary object with `prototype`
    pub fn new(prototype: Option<Arc<JsObject>>) -> Self {
        Self::with_elements(prototype, Vec::new(), false)
    }

    /// Array of `length` holes (read as `undefined`)
    pub fn array(length: usize) -> Self {
        Self::array_from(vec![Value::undefined(); length])
    }

    /// Array holding `elements`
    pub fn array_from(elements: Vec<Value>) -> Self {
        Self::with_elements(None, elements, true)
    }

    fn with_elements(prototype: Option<Arc<JsObject>>, elements: Vec<Value>, is_array: bool) -> Self {
        Self {
            slots: RwLock::new(Slots {
                named: IndexMap::new(),
                elements,
                extensible: true,
            }),
            prototype,
            host_data: RwLock::new(FxHashMap::default()),
            is_array,
        }
    }

    /// Own property, array elements included
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        let slots = self.slots.read();
        if let PropertyKey::Index(i) = key
            && let Some(value) = slots.elements.get(*i as usize)
        {
            return Some(PropertyDescriptor::data(value.clone()));
        }
        slots.named.get(key).cloned()
    }

    /// Own property or the nearest one up the prototype chain
    pub fn lookup_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        if let Some(desc) = self.get_own_property(key) {
            return Some(desc);
        }
        self.prototype()?.lookup_property(key)
    }

    /// Value of a data property found via [`JsObject::lookup_property`].
    /// Getters are not run here; [`Value::get`] runs them.
    pub fn get(&self, key: &PropertyKey) -> Option<Value> {
        self.lookup_property(key)?.value().cloned()
    }

    /// Write an own data property, creating it if needed.
    ///
    /// Returns false for read-only or accessor properties and for new keys
    /// on a non-extensible object.
    pub fn set(&self, key: PropertyKey, value: Value) -> bool {
        let mut guard = self.slots.write();
        let slots = &mut *guard;
        let extensible = slots.extensible;

        if let PropertyKey::Index(i) = key {
            let idx = i as usize;
            if idx < slots.elements.len() {
                slots.elements[idx] = value;
                return true;
            }
            if self.is_array {
                if !extensible {
                    return false;
                }
                slots.elements.resize(idx, Value::undefined());
                slots.elements.push(value);
                return true;
            }
        }

        match slots.named.get_mut(&key) {
            Some(PropertyDescriptor::Data { value: slot, attributes }) if attributes.writable => {
                *slot = value;
                true
            }
            Some(_) => false,
            None if extensible => {
                slots.named.insert(key, PropertyDescriptor::data(value));
                true
            }
            None => false,
        }
    }

    /// Remove an own named property; false if it is non-configurable
    pub fn delete(&self, key: &PropertyKey) -> bool {
        let mut slots = self.slots.write();
        match slots.named.get(key).map(|desc| desc.attributes().configurable) {
            Some(false) => false,
            Some(true) => {
                slots.named.shift_remove(key);
                true
            }
            None => true,
        }
    }

    /// Whether `key` is an own property
    pub fn has_own(&self, key: &PropertyKey) -> bool {
        self.get_own_property(key).is_some()
    }

    /// Own keys: element indices ascending, then named keys in insertion order
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let slots = self.slots.read();
        (0..slots.elements.len() as u32)
            .map(PropertyKey::Index)
            .chain(slots.named.keys().cloned())
            .collect()
    }

    /// Install `desc` under `key`.
    ///
    /// Fails when an existing property is non-configurable or when adding a
    /// new key to a non-extensible object.
    pub fn define_property(&self, key: PropertyKey, desc: PropertyDescriptor) -> bool {
        let mut slots = self.slots.write();
        let allowed = match slots.named.get(&key) {
            Some(existing) => existing.attributes().configurable,
            None => slots.extensible,
        };
        if allowed {
            slots.named.insert(key, desc);
        }
        allowed
    }

    /// Forbid new properties
    pub fn prevent_extensions(&self) {
        self.slots.write().extensible = false;
    }

    /// Whether new properties may be added
    pub fn is_extensible(&self) -> bool {
        self.slots.read().extensible
    }

    /// `[[Prototype]]`
    pub fn prototype(&self) -> Option<Arc<JsObject>> {
        self.prototype.clone()
    }

    /// Whether this is an array exotic object
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Element count
    pub fn array_length(&self) -> usize {
        self.slots.read().elements.len()
    }

    /// Append an element
    pub fn array_push(&self, value: Value) {
        self.slots.write().elements.push(value);
    }

    /// Copy of the elements
    pub fn array_elements(&self) -> Vec<Value> {
        self.slots.read().elements.clone()
    }

    /// Host data of type `T`, if present
    pub fn host_data<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let slot = self.host_data.read().get(&TypeId::of::<T>()).cloned()?;
        slot.downcast::<T>().ok()
    }

    /// Host data of type `T`, installing `init()` first when absent
    pub fn host_data_or_insert_with<T, F>(&self, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.host_data::<T>() {
            return existing;
        }
        let mut slots = self.host_data.write();
        if let Some(existing) = slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.clone().downcast::<T>().ok())
        {
            return existing;
        }
        let data = Arc::new(init());
        slots.insert(TypeId::of::<T>(), data.clone() as HostSlot);
        data
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        if self.is_array {
            write!(f, "Array({})", slots.elements.len())
        } else {
            write!(f, "Object {{ {} properties }}", slots.named.len())
        }
    }
}
