#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op<'a> {
    Set(&'a str, i64),
    SetText(&'a str, &'a str),
    Dispatch(usize),
}

fuzz_target!(|data: (&str, Vec<Op>)| {
    let (source, ops) = data;
    let engine = strand::Engine::new();
    let Ok(template) = engine.compile(source) else {
        return;
    };
    let Ok(ctx) = strand::Context::new(strand::Value::new_map(), strand::Value::None) else {
        return;
    };
    let mut component = strand::Component::new(template, ctx);
    for op in ops {
        match op {
            Op::Set(path, n) => {
                let _ = component.set(path, n);
            }
            Op::SetText(path, s) => {
                let _ = component.set(path, s);
            }
            Op::Dispatch(i) => {
                let events = component.tree().events();
                if events.is_empty() {
                    continue;
                }
                let handler = events[i % events.len()].handler.clone();
                let _ = component.dispatch(&handler, strand::Value::None);
            }
        }
    }
    let _ = component.html();
});
