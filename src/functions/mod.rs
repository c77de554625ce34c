//! A ready-made [`NameResolver`] backed by a table of registered callbacks.
//!
//! Callers with richer needs (database-backed lookups, row-shortcut names
//! such as `A1`) implement [`NameResolver`] themselves; this registry covers
//! the common case of a fixed function set.

use std::sync::Arc;

use crate::eval::{Arity, Callback, CallContext, NameResolver};

struct Entry {
    /// Stored uppercase; lookup is case-insensitive.
    name: String,
    arity: Arity,
    callback: Callback,
}

/// Ordered name → callback table with unambiguous-prefix resolution: an
/// exact name wins, otherwise a prefix selecting exactly one entry resolves
/// to it. Ambiguous prefixes resolve to nothing, which the engine reports as
/// an unknown name.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: Vec<Entry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function (or zero-argument macro) under `name`.
    pub fn register<F>(&mut self, name: &str, arity: Arity, callback: F)
    where
        F: Fn(&mut CallContext<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.entries.push(Entry {
            name: name.to_ascii_uppercase(),
            arity,
            callback: Arc::new(callback),
        });
    }
}

impl NameResolver for FunctionRegistry {
    fn resolve(&self, name: &str) -> Option<(Callback, Arity)> {
        let wanted = name.to_ascii_uppercase();
        if let Some(entry) = self.entries.iter().find(|e| e.name == wanted) {
            return Some((Arc::clone(&entry.callback), entry.arity));
        }
        let mut candidates = self.entries.iter().filter(|e| e.name.starts_with(&wanted));
        match (candidates.next(), candidates.next()) {
            (Some(entry), None) => Some((Arc::clone(&entry.callback), entry.arity)),
            _ => None,
        }
    }
}
