use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

fn schemas() -> Vec<(&'static str, Value, Value)> {
    vec![
        (
            "flat object",
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer", "minimum": 1},
                    "name": {"type": "string", "maxLength": 64},
                    "email": {"type": "string", "format": "email"},
                    "tags": {"type": "array", "items": {"type": "string"}, "uniqueItems": true}
                },
                "required": ["id", "name"],
                "additionalProperties": false
            }),
            json!({
                "id": 42,
                "name": "Ferris",
                "email": "ferris@example.com",
                "tags": ["crab", "rust"]
            }),
        ),
        (
            "recursive tree",
            json!({
                "$defs": {
                    "node": {
                        "type": "object",
                        "properties": {
                            "value": {"type": "number"},
                            "children": {"type": "array", "items": {"$ref": "#/$defs/node"}}
                        },
                        "required": ["value"]
                    }
                },
                "$ref": "#/$defs/node"
            }),
            json!({"value": 1, "children": [
                {"value": 2, "children": [{"value": 3}, {"value": 4}]},
                {"value": 5, "children": [{"value": 6, "children": [{"value": 7}]}]}
            ]}),
        ),
        (
            "alternatives",
            json!({
                "oneOf": [
                    {"type": "string", "pattern": "^[a-z]+$"},
                    {"type": "integer", "multipleOf": 3},
                    {"type": "array", "minItems": 2}
                ]
            }),
            json!([1, 2, 3]),
        ),
    ]
}

fn bench_build(c: &mut Criterion, name: &str, schema: &Value) {
    c.bench_with_input(BenchmarkId::new("build", name), schema, |b, schema| {
        b.iter_with_large_drop(|| jsonsafe::validator_for(schema).expect("Valid schema"));
    });
}

fn bench_is_valid(c: &mut Criterion, name: &str, schema: &Value, instance: &Value) {
    let validator = jsonsafe::validator_for(schema).expect("Valid schema");
    c.bench_with_input(BenchmarkId::new("is_valid", name), instance, |b, instance| {
        b.iter(|| {
            let _ = validator.is_valid(instance);
        });
    });
}

fn bench_validate(c: &mut Criterion, name: &str, schema: &Value, instance: &Value) {
    let validator = jsonsafe::options()
        .should_collect_all_errors(true)
        .build(schema)
        .expect("Valid schema");
    c.bench_with_input(BenchmarkId::new("validate", name), instance, |b, instance| {
        b.iter(|| {
            let _ = validator.validate(instance);
        });
    });
}

fn run_benchmarks(c: &mut Criterion) {
    for (name, schema, instance) in schemas() {
        bench_build(c, name, &schema);
        bench_is_valid(c, name, &schema, &instance);
        bench_validate(c, name, &schema, &instance);
    }
}

criterion_group!(benches, run_benchmarks);
criterion_main!(benches);
