use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use num_bigint::BigInt;
use tern_vm_core::serializer::{ValueDeserializer, ValueSerializer};
use tern_vm_core::{
    HostBufferDelegate, JsArrayBuffer, JsDataView, JsObject, JsTypedArray, PropertyAttributes,
    PropertyDescriptor, PropertyKey, SerializerConfig, TypedArrayKind, Value, VmError, VmResult,
    deserialize, serialize,
};

fn round_trip(value: &Value) -> Value {
    let bytes = serialize(value).expect("serialize should succeed");
    deserialize(&bytes).expect("deserialize should succeed")
}

fn plain_object(entries: &[(&str, Value)]) -> Arc<JsObject> {
    let obj = Arc::new(JsObject::new(None));
    for (key, value) in entries {
        obj.set(PropertyKey::string(key), value.clone());
    }
    obj
}

fn prop(value: &Value, key: &str) -> Value {
    value.get(&PropertyKey::string(key)).expect("get should succeed")
}

#[test]
fn primitives_survive() {
    for value in [
        Value::undefined(),
        Value::null(),
        Value::boolean(true),
        Value::boolean(false),
        Value::int32(0),
        Value::int32(i32::MIN),
        Value::number(1.5),
        Value::number(f64::NAN),
        Value::number(f64::INFINITY),
        Value::string(""),
        Value::string("héllo"),
        Value::bigint(BigInt::from(-1234567890123456789i64)),
    ] {
        assert_eq!(round_trip(&value), value, "{value:?} should survive");
    }
}

#[test]
fn nested_object_is_copied() {
    let inner = plain_object(&[("n", Value::int32(1))]);
    let outer = Value::object(plain_object(&[
        ("name", Value::string("outer")),
        ("inner", Value::object(inner.clone())),
        ("list", Value::array_from(vec![Value::int32(1), Value::string("two")])),
    ]));

    let copy = round_trip(&outer);
    assert_ne!(copy, outer, "result must be a new object");
    assert_eq!(prop(&copy, "name"), Value::string("outer"));

    let inner_copy = prop(&copy, "inner");
    assert_ne!(inner_copy, Value::object(inner.clone()));
    assert_eq!(prop(&inner_copy, "n"), Value::int32(1));

    inner.set(PropertyKey::string("n"), Value::int32(2));
    assert_eq!(prop(&inner_copy, "n"), Value::int32(1), "copy must not observe source writes");

    let list = prop(&copy, "list");
    assert!(list.is_array());
    assert_eq!(
        list.as_object().unwrap().array_elements(),
        vec![Value::int32(1), Value::string("two")]
    );
}

#[test]
fn property_order_is_kept() {
    let obj = Value::object(plain_object(&[
        ("b", Value::int32(1)),
        ("a", Value::int32(2)),
        ("c", Value::int32(3)),
    ]));
    let copy = round_trip(&obj);
    let keys: Vec<_> = copy
        .as_object()
        .unwrap()
        .own_keys()
        .iter()
        .filter_map(|k| k.to_key_string())
        .collect();
    assert_eq!(keys, vec!["b", "a", "c"]);
}

#[test]
fn shared_references_stay_shared() {
    let shared = Value::object(plain_object(&[("x", Value::int32(1))]));
    let arr = Value::array_from(vec![shared.clone(), shared]);

    let copy = round_trip(&arr);
    let elements = copy.as_object().unwrap().array_elements();
    assert_eq!(elements.len(), 2);
    assert_eq!(elements[0], elements[1], "both slots should hold one object");
}

#[test]
fn cycles_survive() {
    let obj = plain_object(&[("name", Value::string("loop"))]);
    obj.set(PropertyKey::string("self"), Value::object(obj.clone()));

    let copy = round_trip(&Value::object(obj.clone()));
    assert_eq!(prop(&copy, "self"), copy);
    assert_ne!(copy, Value::object(obj.clone()));

    // Break the source cycle so the test does not leak it
    obj.delete(&PropertyKey::string("self"));
    copy.as_object().unwrap().delete(&PropertyKey::string("self"));
}

#[test]
fn non_enumerable_and_symbol_keys_skipped() {
    let obj = plain_object(&[("visible", Value::int32(1))]);
    obj.define_property(
        PropertyKey::string("hidden"),
        PropertyDescriptor::data_with_attrs(
            Value::int32(2),
            PropertyAttributes {
                writable: true,
                enumerable: false,
                configurable: true,
            },
        ),
    );
    let copy = round_trip(&Value::object(obj));
    let copy_obj = copy.as_object().unwrap();
    assert!(copy_obj.has_own(&PropertyKey::string("visible")));
    assert!(!copy_obj.has_own(&PropertyKey::string("hidden")));
}

#[test]
fn getters_are_read() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let getter = Value::native_function("get computed", 0, move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::int32(42))
    });
    let obj = Arc::new(JsObject::new(None));
    obj.define_property(
        PropertyKey::string("computed"),
        PropertyDescriptor::accessor(Some(getter), None, PropertyAttributes::accessor()),
    );

    let copy = round_trip(&Value::object(obj));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let desc = copy
        .as_object()
        .unwrap()
        .get_own_property(&PropertyKey::string("computed"))
        .expect("property should be copied");
    assert_eq!(desc.value(), Some(&Value::int32(42)), "getter result becomes data");
}

fn object_with_fresh_getters(i: u8) -> Value {
    let bytes = Value::native_function("get bytes", 0, move |_, _| {
        Ok(Value::array_buffer(Arc::new(JsArrayBuffer::from_bytes(vec![i; 4]))))
    });
    let inner = Value::native_function("get inner", 0, move |_, _| {
        Ok(Value::object(plain_object(&[("n", Value::int32(i32::from(i)))])))
    });
    let obj = Arc::new(JsObject::new(None));
    for (name, getter) in [("bytes", bytes), ("inner", inner)] {
        obj.define_property(
            PropertyKey::string(name),
            PropertyDescriptor::accessor(Some(getter), None, PropertyAttributes::accessor()),
        );
    }
    Value::object(obj)
}

#[test]
fn getter_results_on_siblings_stay_distinct() {
    let source = Value::array_from((0..50u8).map(object_with_fresh_getters).collect());
    let copy = round_trip(&source);
    let elements = copy.as_object().unwrap().array_elements();
    assert_eq!(elements.len(), 50);

    let mut buffers = Vec::new();
    let mut inners = Vec::new();
    for (i, element) in elements.iter().enumerate() {
        let bytes = prop(element, "bytes");
        let buffer = bytes.as_array_buffer().expect("bytes should be an ArrayBuffer");
        assert_eq!(buffer.to_vec(), Some(vec![i as u8; 4]), "bytes of element {i}");
        let inner = prop(element, "inner");
        assert_eq!(prop(&inner, "n"), Value::int32(i as i32), "inner of element {i}");
        buffers.push(bytes);
        inners.push(inner);
    }
    for i in 0..elements.len() {
        assert!(buffers[i + 1..].iter().all(|b| *b != buffers[i]), "buffer {i} is aliased");
        assert!(inners[i + 1..].iter().all(|o| *o != inners[i]), "object {i} is aliased");
    }
}

#[test]
fn functions_and_symbols_are_type_errors() {
    let func = Value::native_function("f", 0, |_, _| Ok(Value::undefined()));
    let err = serialize(&func).unwrap_err();
    assert!(err.is_type_error(), "got {err:?}");

    let nested = Value::object(plain_object(&[("sym", Value::symbol(Some("s")))]));
    let err = serialize(&nested).unwrap_err();
    assert!(err.is_type_error(), "got {err:?}");
}

#[test]
fn buffers_and_views_survive() {
    let buffer = Arc::new(JsArrayBuffer::from_bytes((0u8..16).collect()));
    let ta = Arc::new(JsTypedArray::new(buffer.clone(), TypedArrayKind::Uint16, 4, 3).unwrap());
    let dv = Arc::new(JsDataView::new(buffer.clone(), 2, Some(5)).unwrap());
    let graph = Value::array_from(vec![
        Value::array_buffer(buffer.clone()),
        Value::typed_array(ta),
        Value::data_view(dv),
    ]);

    let copy = round_trip(&graph);
    let elements = copy.as_object().unwrap().array_elements();

    let buf_copy = elements[0].as_array_buffer().unwrap();
    assert!(!Arc::ptr_eq(buf_copy, &buffer));
    assert_eq!(buf_copy.to_vec(), buffer.to_vec());

    let ta_copy = elements[1].as_typed_array().unwrap();
    assert_eq!(ta_copy.kind(), TypedArrayKind::Uint16);
    assert_eq!(ta_copy.byte_offset(), 4);
    assert_eq!(ta_copy.length(), 3);
    assert!(Arc::ptr_eq(ta_copy.buffer(), buf_copy), "views share the copied buffer");

    let dv_copy = elements[2].as_data_view().unwrap();
    assert_eq!(dv_copy.byte_offset(), 2);
    assert_eq!(dv_copy.byte_length(), 5);
    assert!(Arc::ptr_eq(dv_copy.buffer(), buf_copy));
}

#[test]
fn detached_buffer_is_type_error() {
    let buffer = Arc::new(JsArrayBuffer::new(4));
    buffer.detach();
    let err = serialize(&Value::array_buffer(buffer)).unwrap_err();
    assert!(err.is_type_error(), "got {err:?}");
}

#[test]
fn depth_limit_is_stack_overflow() {
    let mut value = Value::int32(0);
    for _ in 0..10 {
        value = Value::array_from(vec![value]);
    }
    let mut serializer = ValueSerializer::new(SerializerConfig { max_depth: 5 });
    let err = serializer.write_value(&value).unwrap_err();
    assert!(matches!(err, VmError::StackOverflow), "got {err:?}");

    let mut serializer = ValueSerializer::new(SerializerConfig { max_depth: 11 });
    assert!(serializer.write_value(&value).is_ok());
}

#[test]
fn malformed_input_is_internal_error() {
    for input in [&[][..], &[0xFF][..], &[0xFF, 1, b'?'][..], &[0xFF, 1, b'^', 0][..]] {
        match deserialize(input) {
            Err(VmError::InternalError(msg)) => {
                assert_eq!(msg, "Unable to deserialize cloned data")
            }
            other => panic!("expected InternalError for {input:?}, got {other:?}"),
        }
    }
}

#[derive(Default)]
struct RecordingDelegate {
    written: Vec<Arc<JsArrayBuffer>>,
}

impl HostBufferDelegate for RecordingDelegate {
    fn write_buffer(&mut self, buffer: &Arc<JsArrayBuffer>) -> VmResult<Option<u32>> {
        self.written.push(buffer.clone());
        Ok(Some(self.written.len() as u32 - 1))
    }

    fn read_buffer(&mut self, id: u32) -> VmResult<Arc<JsArrayBuffer>> {
        self.written
            .get(id as usize)
            .cloned()
            .ok_or_else(|| VmError::internal("unknown buffer id"))
    }
}

#[test]
fn delegate_substitutes_buffers() {
    let buffer = Arc::new(JsArrayBuffer::from_bytes(vec![9; 1024]));
    let value = Value::array_from(vec![
        Value::array_buffer(buffer.clone()),
        Value::array_buffer(buffer.clone()),
    ]);

    let mut delegate = RecordingDelegate::default();
    let mut serializer =
        ValueSerializer::new(SerializerConfig::default()).with_delegate(&mut delegate);
    serializer.write_value(&value).unwrap();
    let bytes = serializer.finish();
    assert!(bytes.len() < 32, "buffer contents should not be inlined");
    assert_eq!(delegate.written.len(), 1, "second reference is a back-reference");

    let mut deserializer =
        ValueDeserializer::new(&bytes, SerializerConfig::default()).with_delegate(&mut delegate);
    deserializer.read_header().unwrap();
    let copy = deserializer.read_value().unwrap();
    deserializer.finish().unwrap();

    let elements = copy.as_object().unwrap().array_elements();
    assert!(Arc::ptr_eq(elements[0].as_array_buffer().unwrap(), &buffer));
    assert_eq!(elements[0], elements[1]);
}
