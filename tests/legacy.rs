use strand::{value, Context, Engine, ErrorKind, LegacySyntax, Options, Value};

fn html(engine: &Engine, source: &str, state: Value) -> String {
    let template = engine.compile(source).unwrap();
    let mut ctx = Context::new(state, Value::None).unwrap();
    template.render(&mut ctx).to_html()
}

fn state() -> Value {
    value! {
        title: "Todos",
        done: false,
        note: "<em>soon</em>",
        todos: [
            { text: "Write docs", done: true },
            { text: "Ship it", done: false },
        ],
    }
}

#[test]
fn legacy_equivalent_to_primary() {
    let engine = Engine::new();
    let legacy = "<h1>{{ title }}</h1>\
        <ul>{{#each todos as |todo, i|}}<li class={{ todo.done ? 'done' : '' }}>{{i}} {{todo.text}}</li>{{/each}}</ul>\
        {{#if done}}<p>{{{ note }}}</p>{{else}}<p>{{& note }}</p>{{/if}}\
        {{#unless done}}<b>open</b>{{/unless}}";
    let primary = "<h1>{title}</h1>\
        <ul>{#each todos as todo, i}<li class={todo.done ? 'done' : ''}>{i} {todo.text}</li>{/each}</ul>\
        {#if done}<p>{@html note}</p>{:else}<p>{@html note}</p>{/if}\
        {#unless done}<b>open</b>{/unless}";

    let expected = html(&engine, primary, state());
    assert_eq!(html(&engine, legacy, state()), expected);
    assert_eq!(
        expected,
        r#"<h1>Todos</h1><ul><li class="done">0 Write docs</li><li class="">1 Ship it</li></ul><p><em>soon</em></p><b>open</b>"#
    );
}

#[test]
fn legacy_each_default_item() {
    let engine = Engine::new();
    let result = html(
        &engine,
        "{{#each todos}}<i>{{item.text}}</i>{{/each}}",
        state(),
    );
    assert_eq!(result, "<i>Write docs</i><i>Ship it</i>");
}

#[test]
fn legacy_alternate_brackets() {
    let engine = Engine::new();
    let result = html(
        &engine,
        "{% #for todo in todos %}<i>{{ todo.text }}</i>{% /for %}",
        state(),
    );
    assert_eq!(result, "<i>Write docs</i><i>Ship it</i>");
}

#[test]
fn legacy_fragments() {
    let engine = Engine::new();
    let result = html(
        &engine,
        "{{#block row}}<li>{{ todo.text }}</li>{{/block}}\
         <ul>{{#each todos as todo}}{{> row}}{{/each}}</ul>",
        state(),
    );
    assert_eq!(result, "<ul><li>Write docs</li><li>Ship it</li></ul>");
}

#[test]
fn legacy_single_brace_is_text() {
    let engine = Engine::new();
    let result = html(&engine, "<p>{{ title }} { not an expression }</p>", state());
    assert_eq!(result, "<p>Todos { not an expression }</p>");
}

#[test]
fn legacy_json() {
    let engine = Engine::new();
    let result = html(&engine, "{{json done}}", state());
    assert_eq!(result, "<pre>false</pre>");
}

#[test]
fn legacy_dependencies_match_primary() {
    let engine = Engine::new();
    let legacy = engine
        .compile("{{#if done}}{{title}}{{/if}}{{#each todos as |t|}}{{t.text}}{{/each}}")
        .unwrap();
    let primary = engine
        .compile("{#if done}{title}{/if}{#each todos as t}{t.text}{/each}")
        .unwrap();
    assert_eq!(legacy.source(), primary.source());
    for field in ["done", "title", "todos"] {
        assert_eq!(
            legacy.dependencies().get(field),
            primary.dependencies().get(field),
        );
    }
}

#[test]
fn legacy_err_unknown_fragment() {
    let options = Options {
        name: Some("todo-list".into()),
    };
    let err = Engine::new()
        .compile_with("<ul>{{> missing}}</ul>", &options)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.msg(), "unknown fragment `missing`");
    assert_eq!(err.name(), Some("todo-list"));
}

#[test]
fn legacy_err_unclosed_block() {
    let err = Engine::new().compile("{{#if done}}x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BlockMismatch);
}

#[test]
fn legacy_disabled() {
    let mut engine = Engine::new();
    engine.set_legacy_syntax(LegacySyntax::Disabled);
    let template = engine.compile("<p>{{ title }}</p>").unwrap();
    assert_eq!(template.source(), "<p>{{ title }}</p>");
}
