use rand::Rng;

#[derive(serde::Serialize)]
pub struct State {
    pub title: String,
    pub draft: String,
    pub remaining: usize,
    pub todos: Vec<Todo>,
}

#[derive(serde::Serialize)]
pub struct Todo {
    pub text: String,
    pub done: bool,
}

pub fn random(n: usize) -> State {
    let mut rng = rand::thread_rng();
    let title = (0..20).map(|_| rng.gen_range('a'..='z')).collect();
    let todos: Vec<Todo> = (0..n)
        .map(|_| Todo {
            text: (0..20).map(|_| rng.gen_range('a'..='z')).collect(),
            done: rng.gen_ratio(1, 4),
        })
        .collect();
    let remaining = todos.iter().filter(|todo| !todo.done).count();
    State {
        title,
        draft: String::new(),
        remaining,
        todos,
    }
}
