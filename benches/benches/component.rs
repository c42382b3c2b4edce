//! Benchmark template compilation, rendering and incremental updates.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use benches::{context, from_json, repeat, STATE_JSON, TODOS, TODOS_LEGACY};
use strand::{Component, Engine, Options, Value};

criterion_main! { benches }
criterion_group! { benches, bench_compile, bench_render, bench_update, bench_dispatch }

/// Benchmarks the time taken to compile a template.
fn bench_compile(c: &mut Criterion) {
    let mut g = c.benchmark_group("compile");
    let engine = Engine::new();
    let options = Options::default();

    let source = repeat(TODOS, 50);
    g.bench_function("primary", |b| {
        b.iter(|| engine.compile_uncached(&source, &options).unwrap());
    });

    let source = repeat(TODOS_LEGACY, 50);
    g.bench_function("legacy", |b| {
        b.iter(|| engine.compile_uncached(&source, &options).unwrap());
    });

    g.bench_function("cached", |b| {
        b.iter(|| engine.compile(TODOS).unwrap());
    });
}

/// Benchmarks the time taken to render a whole component.
fn bench_render(c: &mut Criterion) {
    let mut g = c.benchmark_group("render");
    let template = Engine::new().compile(TODOS).unwrap();
    let state = context::random(150);

    g.bench_function("tree", |b| {
        let mut ctx = benches::context(&state);
        b.iter(|| template.render(&mut ctx));
    });

    g.bench_function("html", |b| {
        let mut ctx = benches::context(&state);
        b.iter(|| template.render(&mut ctx).to_html());
    });

    g.bench_function("json", |b| {
        b.iter(|| {
            let mut ctx = benches::with_methods(from_json(STATE_JSON));
            template.render(&mut ctx)
        });
    });
}

/// Benchmarks re-running only the actions that read a changed field.
fn bench_update(c: &mut Criterion) {
    let mut g = c.benchmark_group("update");
    let template = Engine::new().compile(TODOS).unwrap();
    let state = context::random(150);

    g.bench_function("title", |b| {
        b.iter_batched(
            || Component::new(template.clone(), benches::context(&state)),
            |mut component| component.set("title", "changed").unwrap(),
            BatchSize::SmallInput,
        );
    });

    g.bench_function("todos", |b| {
        b.iter_batched(
            || Component::new(template.clone(), benches::context(&state)),
            |mut component| component.set("todos.0.done", true).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

/// Benchmarks dispatching an event handler and flushing the update.
fn bench_dispatch(c: &mut Criterion) {
    let mut g = c.benchmark_group("dispatch");
    let template = Engine::new().compile(TODOS).unwrap();
    let state = context::random(150);

    g.bench_function("inline", |b| {
        b.iter_batched(
            || Component::new(template.clone(), benches::context(&state)),
            |mut component| {
                let handler = component.tree().find_all("input")[1].events[0]
                    .handler
                    .clone();
                component.dispatch(&handler, Value::None).unwrap()
            },
            BatchSize::SmallInput,
        );
    });

    g.bench_function("captured", |b| {
        b.iter_batched(
            || Component::new(template.clone(), benches::context(&state)),
            |mut component| {
                let handler = component.tree().events().last().unwrap().handler.clone();
                component.dispatch(&handler, Value::None).unwrap()
            },
            BatchSize::SmallInput,
        );
    });
}
