use crate::Value;

/// The loop variables in scope while rendering, innermost last.
///
/// A scope is captured by every rendered block so that the block can be
/// rendered again later with the same variables.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: Vec<Var>,
}

#[derive(Debug, Clone)]
pub struct Var {
    pub name: String,
    pub value: Value,
    /// Whether the variable holds the position of the current iteration.
    pub is_index: bool,
}

impl Scope {
    /// Resolves a variable, inner variables shadow outer ones.
    pub fn lookup(&self, name: &str) -> Option<&Var> {
        self.vars.iter().rev().find(|var| var.name == name)
    }

    pub fn push(&mut self, name: &str, value: Value, is_index: bool) {
        self.vars.push(Var {
            name: name.to_owned(),
            value,
            is_index,
        });
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn truncate(&mut self, len: usize) {
        self.vars.truncate(len);
    }
}
