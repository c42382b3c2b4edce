#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde::Serialize;

#[derive(Debug, Serialize, Arbitrary)]
#[serde(untagged)]
enum Value {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

fuzz_target!(|data: (&str, BTreeMap<String, Value>)| {
    let (source, state) = data;
    let engine = strand::Engine::new();
    let Ok(template) = engine.compile(source) else {
        return;
    };
    let Ok(state) = strand::to_value(&state) else {
        return;
    };
    let Ok(mut ctx) = strand::Context::new(state, strand::Value::None) else {
        return;
    };
    let _ = template.render(&mut ctx).to_html();
});
