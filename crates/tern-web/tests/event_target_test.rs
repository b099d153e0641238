use std::sync::Arc;

use parking_lot::Mutex;
use tern_vm_core::{JsObject, PropertyKey, Value, VmError};
use tern_web::event_target::listener_count;
use tern_web::{
    AddEventListenerOptions, EventInit, add_event_listener, create_event, dispatch_event,
    remove_event_listener,
};
use tracing_subscriber::filter::EnvFilter;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn new_target() -> Value {
    Value::object(Arc::new(JsObject::new(None)))
}

fn recorder(log: &Log, label: &'static str) -> Value {
    let log = log.clone();
    Value::native_function(label, 1, move |_, _| {
        log.lock().push(label);
        Ok(Value::undefined())
    })
}

fn fire(target: &Value, event_type: &str) -> bool {
    dispatch_event(target, &create_event(event_type, EventInit { cancelable: true })).unwrap()
}

#[test]
fn listeners_run_in_registration_order() {
    let log = Log::default();
    let target = new_target();
    for label in ["first", "second", "third"] {
        add_event_listener(&target, "tick", recorder(&log, label), Default::default()).unwrap();
    }
    assert!(fire(&target, "tick"));
    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
}

#[test]
fn only_matching_type_runs() {
    let log = Log::default();
    let target = new_target();
    add_event_listener(&target, "a", recorder(&log, "a"), Default::default()).unwrap();
    add_event_listener(&target, "b", recorder(&log, "b"), Default::default()).unwrap();
    fire(&target, "b");
    assert_eq!(*log.lock(), vec!["b"]);
}

#[test]
fn once_listener_runs_once() {
    let log = Log::default();
    let target = new_target();
    let once = AddEventListenerOptions {
        once: true,
        ..Default::default()
    };
    add_event_listener(&target, "tick", recorder(&log, "once"), once).unwrap();
    fire(&target, "tick");
    fire(&target, "tick");
    assert_eq!(*log.lock(), vec!["once"]);
    assert_eq!(listener_count(&target, "tick"), 0);
}

#[test]
fn removed_listener_does_not_run() {
    let log = Log::default();
    let target = new_target();
    let listener = recorder(&log, "gone");
    add_event_listener(&target, "tick", listener.clone(), Default::default()).unwrap();
    assert!(remove_event_listener(&target, "tick", &listener, false).unwrap());
    fire(&target, "tick");
    assert!(log.lock().is_empty());
}

#[test]
fn listener_removed_during_dispatch_is_skipped() {
    let log = Log::default();
    let target = new_target();
    let second = recorder(&log, "second");

    let remover = {
        let target = target.clone();
        let second = second.clone();
        let log = log.clone();
        Value::native_function("remover", 1, move |_, _| {
            log.lock().push("remover");
            remove_event_listener(&target, "tick", &second, false)?;
            Ok(Value::undefined())
        })
    };
    add_event_listener(&target, "tick", remover, Default::default()).unwrap();
    add_event_listener(&target, "tick", second, Default::default()).unwrap();

    fire(&target, "tick");
    assert_eq!(*log.lock(), vec!["remover"]);
}

#[test]
fn listener_error_does_not_stop_dispatch() {
    init_tracing();
    let log = Log::default();
    let target = new_target();
    let failing = Value::native_function("failing", 1, |_, _| {
        Err(VmError::type_error("listener failed"))
    });
    add_event_listener(&target, "tick", failing, Default::default()).unwrap();
    add_event_listener(&target, "tick", recorder(&log, "after"), Default::default()).unwrap();

    assert!(fire(&target, "tick"));
    assert_eq!(*log.lock(), vec!["after"]);
}

#[test]
fn handle_event_objects_are_called() {
    let log = Log::default();
    let target = new_target();
    let listener = Arc::new(JsObject::new(None));
    listener.set(PropertyKey::string("handleEvent"), recorder(&log, "handleEvent"));
    add_event_listener(&target, "tick", Value::object(listener), Default::default()).unwrap();

    fire(&target, "tick");
    assert_eq!(*log.lock(), vec!["handleEvent"]);
}

#[test]
fn cancel_is_reported() {
    let target = new_target();
    let canceler = Value::native_function("cancel", 1, |_, args| {
        let prevent = args[0].get(&PropertyKey::string("preventDefault"))?;
        prevent.call(&args[0], &[])
    });
    add_event_listener(&target, "tick", canceler, Default::default()).unwrap();
    assert!(!fire(&target, "tick"));
}

#[test]
fn dispatch_rejects_non_event() {
    let target = new_target();
    assert!(dispatch_event(&target, &Value::string("tick")).is_err());
}
