//! Minimal `Event` objects
//!
//! An event is a plain object with `type`, `target` and `cancelable` data
//! properties, a `preventDefault` method and a `defaultPrevented` getter.
//! Cancellation state lives in a private host slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tern_vm_core::{
    JsObject, PropertyAttributes, PropertyDescriptor, PropertyKey, Value, VmError, VmResult,
};

/// Event construction options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventInit {
    /// Whether `preventDefault` has an effect
    pub cancelable: bool,
}

#[derive(Debug)]
struct EventState {
    cancelable: bool,
    canceled: AtomicBool,
}

fn state(event: &Value) -> Option<Arc<EventState>> {
    event.as_object()?.host_data::<EventState>()
}

/// Create an event object of type `event_type`
pub fn create_event(event_type: &str, init: EventInit) -> Value {
    let obj = Arc::new(JsObject::new(None));
    obj.host_data_or_insert_with(|| EventState {
        cancelable: init.cancelable,
        canceled: AtomicBool::new(false),
    });

    let readonly = PropertyAttributes {
        writable: false,
        enumerable: true,
        configurable: true,
    };
    obj.define_property(
        PropertyKey::string("type"),
        PropertyDescriptor::data_with_attrs(Value::string(event_type), readonly),
    );
    obj.define_property(
        PropertyKey::string("cancelable"),
        PropertyDescriptor::data_with_attrs(Value::boolean(init.cancelable), readonly),
    );
    obj.set(PropertyKey::string("target"), Value::null());

    obj.set(
        PropertyKey::string("preventDefault"),
        Value::native_function("preventDefault", 0, |this, _| {
            prevent_default(this)?;
            Ok(Value::undefined())
        }),
    );
    let getter = Value::native_function("get defaultPrevented", 0, |this, _| {
        Ok(Value::boolean(default_prevented(this)))
    });
    obj.define_property(
        PropertyKey::string("defaultPrevented"),
        PropertyDescriptor::accessor(Some(getter), None, PropertyAttributes::accessor()),
    );

    Value::object(obj)
}

/// Mark a cancelable event as canceled; no effect on other events
pub fn prevent_default(event: &Value) -> VmResult<()> {
    let state = state(event).ok_or_else(|| VmError::type_error("Illegal invocation"))?;
    if state.cancelable {
        state.canceled.store(true, Ordering::Relaxed);
    }
    Ok(())
}

/// Whether `prevent_default` took effect
pub fn default_prevented(event: &Value) -> bool {
    state(event).is_some_and(|s| s.canceled.load(Ordering::Relaxed))
}

/// The event's `type`, if it is a string
pub fn event_type(event: &Value) -> Option<String> {
    event
        .as_object()?
        .get(&PropertyKey::string("type"))?
        .as_str()
        .map(str::to_string)
}
