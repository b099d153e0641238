//! Listener registration and dispatch on a single target
//!
//! Listeners live in a private host slot on the target object, one ordered
//! list per event type. There is no propagation path: dispatch runs the
//! target's own listeners and nothing else.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tern_vm_core::{JsObject, PropertyKey, Value, VmError, VmResult};

use crate::event::{default_prevented, event_type};

/// Options accepted by [`add_event_listener`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddEventListenerOptions {
    /// Register for the capture phase
    pub capture: bool,
    /// Remove the listener after its first invocation
    pub once: bool,
}

#[derive(Debug)]
struct ListenerEntry {
    callback: Value,
    capture: bool,
    once: bool,
    removed: AtomicBool,
}

#[derive(Debug, Default)]
struct EventListeners {
    by_type: Mutex<FxHashMap<String, Vec<Arc<ListenerEntry>>>>,
}

impl EventListeners {
    fn remove(&self, event_type: &str, callback: &Value, capture: bool) -> bool {
        let mut by_type = self.by_type.lock();
        let Some(list) = by_type.get_mut(event_type) else {
            return false;
        };
        let Some(pos) = list
            .iter()
            .position(|entry| entry.callback == *callback && entry.capture == capture)
        else {
            return false;
        };
        let entry = list.remove(pos);
        entry.removed.store(true, Ordering::Relaxed);
        if list.is_empty() {
            by_type.remove(event_type);
        }
        true
    }

    fn snapshot(&self, event_type: &str) -> Vec<Arc<ListenerEntry>> {
        self.by_type
            .lock()
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }
}

fn target_object(target: &Value) -> VmResult<&Arc<JsObject>> {
    target
        .as_object()
        .ok_or_else(|| VmError::type_error("Illegal invocation"))
}

/// Register `callback` for `event_type` on `target`.
///
/// A callback already registered with the same capture flag is ignored, as
/// is a `null` or `undefined` callback.
pub fn add_event_listener(
    target: &Value,
    event_type: &str,
    callback: Value,
    options: AddEventListenerOptions,
) -> VmResult<()> {
    let obj = target_object(target)?;
    if callback.is_nullish() {
        return Ok(());
    }
    let listeners = obj.host_data_or_insert_with(EventListeners::default);
    let mut by_type = listeners.by_type.lock();
    let list = by_type.entry(event_type.to_string()).or_default();
    if list
        .iter()
        .any(|entry| entry.callback == callback && entry.capture == options.capture)
    {
        return Ok(());
    }
    list.push(Arc::new(ListenerEntry {
        callback,
        capture: options.capture,
        once: options.once,
        removed: AtomicBool::new(false),
    }));
    Ok(())
}

/// Unregister `callback` for `event_type`; returns whether it was registered
pub fn remove_event_listener(
    target: &Value,
    event_type: &str,
    callback: &Value,
    capture: bool,
) -> VmResult<bool> {
    let obj = target_object(target)?;
    Ok(obj
        .host_data::<EventListeners>()
        .is_some_and(|listeners| listeners.remove(event_type, callback, capture)))
}

/// Number of listeners registered for `event_type`
pub fn listener_count(target: &Value, event_type: &str) -> usize {
    target
        .as_object()
        .and_then(|obj| obj.host_data::<EventListeners>())
        .map_or(0, |listeners| {
            listeners.by_type.lock().get(event_type).map_or(0, Vec::len)
        })
}

/// Run the listeners of `target` registered for the event's type.
///
/// Listeners added during dispatch do not run; listeners removed during
/// dispatch are skipped. A listener error is logged and does not stop the
/// remaining listeners. Returns `false` if the event was canceled.
pub fn dispatch_event(target: &Value, event: &Value) -> VmResult<bool> {
    let obj = target_object(target)?;
    let event_obj = event
        .as_object()
        .ok_or_else(|| VmError::type_error("parameter 1 is not of type 'Event'"))?;
    let ty = event_type(event).ok_or_else(|| VmError::type_error("Event type must be a string"))?;
    event_obj.set(PropertyKey::string("target"), target.clone());

    let Some(listeners) = obj.host_data::<EventListeners>() else {
        return Ok(!default_prevented(event));
    };

    for entry in listeners.snapshot(&ty) {
        if entry.removed.load(Ordering::Relaxed) {
            continue;
        }
        if entry.once {
            listeners.remove(&ty, &entry.callback, entry.capture);
        }
        if let Err(err) = invoke_listener(&entry.callback, target, event) {
            tracing::warn!(event = %ty, error = %err, "uncaught error in event listener");
        }
    }

    Ok(!default_prevented(event))
}

fn invoke_listener(callback: &Value, target: &Value, event: &Value) -> VmResult<Value> {
    if callback.is_callable() {
        return callback.call(target, std::slice::from_ref(event));
    }
    let handle_event = callback.get(&PropertyKey::string("handleEvent"))?;
    if handle_event.is_callable() {
        return handle_event.call(callback, std::slice::from_ref(event));
    }
    Err(VmError::type_error("handleEvent is not a function"))
}
