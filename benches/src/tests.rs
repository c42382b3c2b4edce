use strand::{Component, Engine};

use crate::context::{State, Todo};
use crate::{context, from_json, with_methods, STATE_JSON, TODOS, TODOS_LEGACY};

fn state() -> State {
    State {
        title: "My todos".to_owned(),
        draft: String::new(),
        remaining: 2,
        todos: vec![
            Todo {
                text: "Write docs".to_owned(),
                done: false,
            },
            Todo {
                text: "Ship it".to_owned(),
                done: true,
            },
            Todo {
                text: "Celebrate".to_owned(),
                done: false,
            },
        ],
    }
}

#[test]
fn todos() {
    let template = Engine::new().compile(TODOS).unwrap();
    let component = Component::new(template, context(&state()));
    assert!(component.context().diagnostics().is_empty());

    let tree = component.tree();
    let labels: Vec<_> = tree.find_all("label").iter().map(|el| el.text()).collect();
    assert_eq!(labels, ["Write docs", "Ship it", "Celebrate"]);
    assert_eq!(tree.find_all("li")[1].attr("class"), Some(Some("completed")));
    assert_eq!(tree.find_all("button").len(), 3);
    assert!(component.html().contains("2 items left"));
}

#[test]
fn todos_legacy() {
    let engine = Engine::new();
    let primary = Component::new(engine.compile(TODOS).unwrap(), context(&state()));
    let legacy = Component::new(engine.compile(TODOS_LEGACY).unwrap(), context(&state()));
    assert_eq!(legacy.html(), primary.html());
}

#[test]
fn todos_dispatch() {
    let template = Engine::new().compile(TODOS).unwrap();
    let mut component = Component::new(template, context(&state()));

    let toggle = component.tree().find_all("input")[1]
        .events
        .first()
        .map(|event| event.handler.clone())
        .unwrap();
    component
        .dispatch(&toggle, strand::Value::None)
        .unwrap();
    assert_eq!(
        component.tree().find_all("li")[0].attr("class"),
        Some(Some("completed"))
    );

    let remove = component.tree().events().last().unwrap().handler.clone();
    component.dispatch(&remove, strand::Value::None).unwrap();
    assert_eq!(component.tree().find_all("li").len(), 2);
}

#[test]
fn todos_json_state() {
    let engine = Engine::new();
    let serialized = Component::new(engine.compile(TODOS).unwrap(), context(&state()));
    let parsed = Component::new(
        engine.compile(TODOS).unwrap(),
        with_methods(from_json(STATE_JSON)),
    );
    assert_eq!(parsed.html(), serialized.html());
    assert_eq!(strand::to_value(&state()).unwrap(), from_json(STATE_JSON));
}
