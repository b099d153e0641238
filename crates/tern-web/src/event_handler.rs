//! `on<event>` handler attributes
//!
//! [`define_event_handler`] installs an accessor that exposes one handler
//! per receiver and event name. The first assignment registers a
//! [`HandlerWrapper`] as an ordinary event listener; later assignments swap
//! the handler inside that wrapper, so the listener keeps its place in the
//! dispatch order.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tern_vm_core::{
    JsFunction, JsObject, NativeCall, PropertyAttributes, PropertyDescriptor, PropertyKey, Value,
    VmError, VmResult,
};

use crate::event_target::{AddEventListenerOptions, add_event_listener};

/// Listener registered on behalf of an `on<event>` attribute
#[derive(Debug)]
pub struct HandlerWrapper {
    handler: RwLock<Value>,
}

impl HandlerWrapper {
    /// Create a wrapper around `handler`
    pub fn new(handler: Value) -> Self {
        Self {
            handler: RwLock::new(handler),
        }
    }

    /// Current handler
    pub fn handler(&self) -> Value {
        self.handler.read().clone()
    }

    /// Replace the handler in place
    pub fn set_handler(&self, handler: Value) {
        *self.handler.write() = handler;
    }
}

impl NativeCall for HandlerWrapper {
    fn call(&self, this: &Value, args: &[Value]) -> VmResult<Value> {
        let handler = self.handler();
        if !handler.is_callable() {
            return Ok(Value::undefined());
        }
        handler.call(this, args)
    }
}

/// Event name to wrapper, stored on each receiver
#[derive(Debug, Default)]
struct HandlerTable {
    wrappers: Mutex<FxHashMap<String, Arc<HandlerWrapper>>>,
}

fn stored_handler(receiver: &Value, name: &str) -> Option<Value> {
    let table = receiver.as_object()?.host_data::<HandlerTable>()?;
    let wrappers = table.wrappers.lock();
    wrappers.get(name).map(|wrapper| wrapper.handler())
}

fn assign_handler(receiver: &Value, name: &str, handler: Value) -> VmResult<()> {
    let obj = receiver
        .as_object()
        .ok_or_else(|| VmError::type_error("Illegal invocation"))?;
    let table = obj.host_data_or_insert_with(HandlerTable::default);

    let wrapper = {
        let mut wrappers = table.wrappers.lock();
        if let Some(existing) = wrappers.get(name) {
            existing.set_handler(handler);
            return Ok(());
        }
        let wrapper = Arc::new(HandlerWrapper::new(handler));
        wrappers.insert(name.to_string(), wrapper.clone());
        wrapper
    };

    tracing::debug!(event = name, "registering event handler wrapper");
    let listener = Value::function(Arc::new(JsFunction::from_call(
        &format!("on{name}"),
        1,
        wrapper,
    )));
    add_event_listener(receiver, name, listener, AddEventListenerOptions::default())
}

/// Define the `on<name>` accessor on `target`.
///
/// Reading yields the receiver's handler, or `default_value` when nothing
/// (or `null`/`undefined`) was assigned. State is kept per receiver, so
/// `target` may be a prototype shared by many objects.
pub fn define_event_handler(target: &Arc<JsObject>, name: &str, default_value: Value) -> VmResult<()> {
    let property = format!("on{name}");

    let getter = {
        let name = name.to_string();
        Value::native_function(&format!("get {property}"), 0, move |this, _| {
            match stored_handler(this, &name) {
                Some(handler) if !handler.is_nullish() => Ok(handler),
                _ => Ok(default_value.clone()),
            }
        })
    };
    let setter = {
        let name = name.to_string();
        Value::native_function(&format!("set {property}"), 1, move |this, args| {
            let handler = args.first().cloned().unwrap_or_default();
            assign_handler(this, &name, handler)?;
            Ok(Value::undefined())
        })
    };

    let defined = target.define_property(
        PropertyKey::string(&property),
        PropertyDescriptor::accessor(Some(getter), Some(setter), PropertyAttributes::accessor()),
    );
    if !defined {
        return Err(VmError::type_error(format!("Cannot redefine property: {property}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapper_skips_non_callable() {
        let wrapper = HandlerWrapper::new(Value::int32(5));
        assert_eq!(wrapper.call(&Value::null(), &[]).unwrap(), Value::undefined());

        wrapper.set_handler(Value::native_function("h", 0, |this, args| {
            assert_eq!(*this, Value::int32(1));
            Ok(args[0].clone())
        }));
        let out = wrapper
            .call(&Value::int32(1), &[Value::string("arg")])
            .unwrap();
        assert_eq!(out, Value::string("arg"));
    }

    #[test]
    fn test_accessor_attributes() {
        let target = Arc::new(JsObject::new(None));
        define_event_handler(&target, "message", Value::null()).unwrap();
        let desc = target
            .get_own_property(&PropertyKey::string("onmessage"))
            .expect("accessor should be defined");
        assert!(desc.is_accessor());
        assert!(desc.attributes().enumerable);
        assert!(desc.attributes().configurable);
    }
}
