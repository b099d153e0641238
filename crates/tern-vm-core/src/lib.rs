//! # Tern VM Core
//!
//! Value model for the Tern runtime support layer.
//!
//! ## Design Principles
//!
//! - **Thread-safe**: Values are `Send + Sync` (`Arc` plus `parking_lot` locks)
//! - **Identity**: Heap values compare by reference, primitives by value
//! - **Host slots**: Objects carry private host data keyed by Rust type

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod array_buffer;
pub mod data_view;
pub mod error;
pub mod object;
pub mod serializer;
pub mod typed_array;
pub mod value;
pub mod weak_map;

pub use array_buffer::JsArrayBuffer;
pub use data_view::{DataViewError, JsDataView};
pub use error::{VmError, VmResult};
pub use object::{JsObject, PropertyAttributes, PropertyDescriptor, PropertyKey};
pub use serializer::{HostBufferDelegate, SerializerConfig, deserialize, serialize};
pub use typed_array::{JsTypedArray, TypedArrayKind};
pub use value::{JsFunction, NativeCall, Value};
pub use weak_map::IdentityWeakMap;
