//! Event handlers attached to rendered elements.
//!
//! A handler that only reads the instance is written into the markup as
//! code. A handler that captures a loop item is stored in a
//! [`HandlerRegistry`] and the markup refers to it by token, so the item is
//! passed back exactly as it was iterated.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::types::program::HandlerSource;
use crate::Value;

/// The number of handlers a registry holds before evicting the oldest.
pub const DEFAULT_CAPACITY: usize = 4096;

/// The handler bound to an event on a rendered element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handler {
    /// Expression code that needs no captured values, e.g.
    /// `this.remove(2)`.
    Inline(String),
    /// A handler stored in the context's registry.
    Token(HandlerToken),
}

/// Identifies an entry in a [`HandlerRegistry`].
///
/// Tokens increase monotonically and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerToken(u64);

/// A handler together with the loop variables it captured.
#[derive(Debug, Clone)]
pub struct CapturedHandler {
    pub(crate) source: Rc<HandlerSource>,
    pub(crate) locals: BTreeMap<String, Value>,
}

/// Stores values that rendered markup refers to by token.
pub struct HandlerRegistry<T> {
    entries: BTreeMap<u64, Entry<T>>,
    next: u64,
    capacity: usize,
}

struct Entry<T> {
    value: T,
    persistent: bool,
}

impl HandlerToken {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl CapturedHandler {
    /// The captured value of a loop variable.
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    /// The handler code as written after name resolution.
    pub fn code(&self) -> String {
        self.source.expr.to_string()
    }
}

impl fmt::Display for Handler {
    /// Writes the code that goes into an `on<event>` attribute.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(code) => f.write_str(code),
            Self::Token(token) => write!(f, "handlers.invoke({token}, event)"),
        }
    }
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandlerRegistry<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Construct a registry that evicts its oldest entries once it holds
    /// more than `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            next: 1,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.evict();
    }

    /// Stores a value that is removed when it is taken.
    pub fn register(&mut self, value: T) -> HandlerToken {
        self.insert(value, false)
    }

    /// Stores a value that stays until it is released.
    pub fn register_persistent(&mut self, value: T) -> HandlerToken {
        self.insert(value, true)
    }

    /// Returns the value without removing it.
    pub fn get(&self, token: HandlerToken) -> Option<&T> {
        self.entries.get(&token.0).map(|e| &e.value)
    }

    /// Removes a value, returns false if the token is unknown.
    pub fn release(&mut self, token: HandlerToken) -> bool {
        self.entries.remove(&token.0).is_some()
    }

    /// Removes every value. Tokens issued later still never collide with
    /// earlier ones.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, value: T, persistent: bool) -> HandlerToken {
        let token = HandlerToken(self.next);
        self.next += 1;
        self.entries.insert(token.0, Entry { value, persistent });
        self.evict();
        token
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            if let Some((token, _)) = self.entries.pop_first() {
                tracing::trace!(token, "evicted handler");
            }
        }
    }
}

impl<T: Clone> HandlerRegistry<T> {
    /// Returns the value for a token.
    ///
    /// Single use values are removed, persistent ones are cloned.
    pub fn take(&mut self, token: HandlerToken) -> Option<T> {
        match self.entries.get(&token.0) {
            Some(entry) if entry.persistent => Some(entry.value.clone()),
            Some(_) => self.entries.remove(&token.0).map(|e| e.value),
            None => None,
        }
    }
}

impl<T> fmt::Debug for HandlerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("len", &self.entries.len())
            .field("next", &self.next)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_take_single_use() {
        let mut registry = HandlerRegistry::new();
        let token = registry.register("a");
        assert_eq!(registry.take(token), Some("a"));
        assert_eq!(registry.take(token), None);
    }

    #[test]
    fn registry_take_persistent() {
        let mut registry = HandlerRegistry::new();
        let token = registry.register_persistent("a");
        assert_eq!(registry.take(token), Some("a"));
        assert_eq!(registry.take(token), Some("a"));
        assert!(registry.release(token));
        assert_eq!(registry.take(token), None);
        assert!(!registry.release(token));
    }

    #[test]
    fn registry_tokens_are_monotonic() {
        let mut registry = HandlerRegistry::new();
        let a = registry.register(1);
        registry.clear();
        let b = registry.register(2);
        assert!(b > a);
        assert_eq!(registry.get(a), None);
        assert_eq!(registry.get(b), Some(&2));
    }

    #[test]
    fn registry_evicts_oldest() {
        let mut registry = HandlerRegistry::with_capacity(2);
        let a = registry.register_persistent('a');
        let b = registry.register_persistent('b');
        let c = registry.register_persistent('c');
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a), None);
        assert_eq!(registry.get(b), Some(&'b'));
        assert_eq!(registry.get(c), Some(&'c'));

        registry.set_capacity(1);
        assert_eq!(registry.get(b), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn handler_display() {
        assert_eq!(Handler::Inline("this.remove(2)".into()).to_string(), "this.remove(2)");
        assert_eq!(
            Handler::Token(HandlerToken(17)).to_string(),
            "handlers.invoke(17, event)"
        );
    }
}
