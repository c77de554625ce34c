use std::fmt::Display;
use std::sync::Arc;

use crate::eval::{Diagnostics, NumberFormat};

/// Evaluation callback bound to a resolved macro/function name.
///
/// The returned string replaces the matched occurrence; `None` substitutes
/// the empty string.
pub type Callback = Arc<dyn Fn(&mut CallContext<'_>) -> Option<String> + Send + Sync>;

/// Argument-count contract a resolver attaches to a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// The callback must receive exactly this many arguments.
    Exact(usize),
    /// No check; the callback sorts out whatever it gets.
    Unchecked,
}

/// Maps a bare macro/function name to an evaluation callback.
///
/// Implementations own the name-matching policy (exact, case-insensitive,
/// unambiguous prefix); the engine treats resolution as opaque and expects
/// it to be deterministic within one evaluation. Any caller context the
/// callbacks need is captured by the implementation itself.
pub trait NameResolver {
    fn resolve(&self, name: &str) -> Option<(Callback, Arity)>;
}

/// Everything a callback may see about the occurrence it is replacing.
///
/// Lives only for the duration of one callback invocation.
pub struct CallContext<'a> {
    pub(crate) name: &'a str,
    pub(crate) matched: &'a str,
    pub(crate) args: &'a [String],
    pub(crate) format: &'a NumberFormat,
    pub(crate) diagnostics: &'a mut Diagnostics,
}

impl CallContext<'_> {
    /// Name as written in the formula (case preserved).
    pub fn name(&self) -> &str {
        self.name
    }

    /// The full matched text, `%NAME(...)` included.
    pub fn matched_text(&self) -> &str {
        self.matched
    }

    /// The `i`-th already-evaluated argument.
    pub fn argument(&self, i: usize) -> Option<&str> {
        self.args.get(i).map(String::as_str)
    }

    pub fn argument_count(&self) -> usize {
        self.args.len()
    }

    /// Engine display configuration, for callbacks that render numbers.
    pub fn format(&self) -> &NumberFormat {
        self.format
    }

    /// Appends a message to the evaluation's diagnostic trail.
    pub fn report(&mut self, message: impl Display) {
        self.diagnostics.report(message);
    }
}
