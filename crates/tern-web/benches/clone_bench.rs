//! Structured clone benchmarks
//!
//! Compares the buffer fast path against the generic serializer path.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use tern_vm_core::{JsArrayBuffer, JsObject, JsTypedArray, PropertyKey, TypedArrayKind, Value};
use tern_web::clone_value;

fn bench_buffer_fast_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("clone_buffer");
    for size in [64usize, 4096, 65536] {
        let buffer = Value::array_buffer(Arc::new(JsArrayBuffer::new(size)));
        group.bench_with_input(BenchmarkId::new("fast_path", size), &buffer, |b, value| {
            b.iter(|| black_box(clone_value(value)))
        });

        // Wrapping the buffer forces the serializer round trip
        let wrapped = Value::array_from(vec![buffer.clone()]);
        group.bench_with_input(BenchmarkId::new("nested", size), &wrapped, |b, value| {
            b.iter(|| black_box(clone_value(value)))
        });
    }
    group.finish();
}

fn bench_typed_array(c: &mut Criterion) {
    let view = Value::typed_array(Arc::new(JsTypedArray::with_length(TypedArrayKind::Float64, 1024)));
    c.bench_function("clone_float64_array_1024", |b| {
        b.iter(|| black_box(clone_value(&view)))
    });
}

fn bench_object_graph(c: &mut Criterion) {
    let root = Arc::new(JsObject::new(None));
    for i in 0..50 {
        let child = Arc::new(JsObject::new(None));
        child.set(PropertyKey::string("index"), Value::int32(i));
        child.set(PropertyKey::string("label"), Value::string(&format!("item{i}")));
        root.set(PropertyKey::string(&format!("child{i}")), Value::object(child));
    }
    let root = Value::object(root);
    c.bench_function("clone_object_50_children", |b| {
        b.iter(|| black_box(clone_value(&root)))
    });
}

criterion_group!(
    benches,
    bench_buffer_fast_path,
    bench_typed_array,
    bench_object_graph
);
criterion_main!(benches);
