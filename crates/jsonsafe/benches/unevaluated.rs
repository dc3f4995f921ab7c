use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

fn instance(size: usize) -> Value {
    let mut object = serde_json::Map::new();
    object.insert("kind".to_string(), json!("a"));
    for idx in 0..size {
        object.insert(format!("x-{idx}"), json!(idx));
    }
    Value::Object(object)
}

fn bench_unevaluated(c: &mut Criterion) {
    let schemas = [
        (
            "static",
            json!({
                "allOf": [{"properties": {"kind": {"type": "string"}}}],
                "patternProperties": {"^x-": {"type": "integer"}},
                "unevaluatedProperties": false
            }),
        ),
        (
            "dynamic",
            json!({
                "if": {"properties": {"kind": {"const": "a"}}},
                "then": {"patternProperties": {"^x-": {"type": "integer"}}},
                "else": {"properties": {"other": true}},
                "unevaluatedProperties": false
            }),
        ),
    ];
    for (name, schema) in &schemas {
        let validator = jsonsafe::validator_for(schema).expect("Valid schema");
        for size in [10, 100] {
            let instance = instance(size);
            c.bench_with_input(
                BenchmarkId::new(*name, size),
                &instance,
                |b, instance| {
                    b.iter(|| {
                        let _ = validator.is_valid(instance);
                    });
                },
            );
        }
    }
}

criterion_group!(benches, bench_unevaluated);
criterion_main!(benches);
