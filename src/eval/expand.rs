use log::debug;

use crate::eval::matcher::{self, Reference};
use crate::eval::resolver::{Arity, Callback, CallContext, NameResolver};
use crate::eval::{Diagnostics, Engine, Issue, MAX_PASSES};

/// Separator between function arguments inside `%NAME(...)`.
pub(crate) const ARGUMENT_SEPARATOR: char = ';';

enum Binding {
    BuiltinIf,
    External(Callback),
}

impl Engine {
    /// Replaces every `%NAME`/`%NAME(args)` occurrence, re-scanning until the
    /// text settles. The pass cap turns resolver-induced oscillation into a
    /// diagnostic instead of a hang.
    pub(crate) fn expand_references(
        &self,
        input: &str,
        resolver: &dyn NameResolver,
        diagnostics: &mut Diagnostics,
    ) -> String {
        let mut current = input.to_owned();
        for pass in 0..MAX_PASSES {
            let next = self.expand_pass(&current, resolver, diagnostics);
            if next == current {
                debug!("expansion settled after {pass} pass(es)");
                return next;
            }
            current = next;
        }
        diagnostics.report(Issue::PassLimit(MAX_PASSES));
        current
    }

    /// One left-to-right substitution sweep over `input`.
    fn expand_pass(
        &self,
        input: &str,
        resolver: &dyn NameResolver,
        diagnostics: &mut Diagnostics,
    ) -> String {
        let mut out = String::with_capacity(input.len());
        let mut at = 0;
        while at < input.len() {
            let ch = match input[at..].chars().next() {
                Some(ch) => ch,
                None => break,
            };
            if ch == '\\' {
                // escaped text is copied through untouched, `\%` included
                out.push(ch);
                at += 1;
                if let Some(next) = input[at..].chars().next() {
                    out.push(next);
                    at += next.len_utf8();
                }
                continue;
            }
            if ch == '%' {
                if let Some(reference) = matcher::reference_at(&input[at..]) {
                    let replacement = self.substitute(&reference, resolver, diagnostics);
                    out.push_str(&replacement);
                    at += reference.matched.len();
                    continue;
                }
            }
            out.push(ch);
            at += ch.len_utf8();
        }
        out
    }

    /// Resolves one matched occurrence and produces its replacement text.
    fn substitute(
        &self,
        reference: &Reference<'_>,
        resolver: &dyn NameResolver,
        diagnostics: &mut Diagnostics,
    ) -> String {
        debug!("expanding {}", reference.matched);
        let (binding, arity) = if reference.name.eq_ignore_ascii_case("IF") {
            (Binding::BuiltinIf, Arity::Exact(3))
        } else {
            match resolver.resolve(reference.name) {
                Some((callback, arity)) => (Binding::External(callback), arity),
                None => {
                    diagnostics.report(Issue::UnknownName(reference.name.to_owned()));
                    return String::new();
                }
            }
        };
        let arguments = match reference.raw_args {
            Some(raw) => self.evaluate_arguments(raw, resolver, diagnostics),
            None => Vec::new(),
        };
        if let Arity::Exact(expected) = arity {
            if arguments.len() != expected {
                diagnostics.report(Issue::ArityMismatch {
                    name: reference.name.to_owned(),
                    expected,
                    got: arguments.len(),
                });
                return String::new();
            }
        }
        match binding {
            Binding::BuiltinIf => self.eval_if(&arguments, diagnostics),
            Binding::External(callback) => {
                let mut ctx = CallContext {
                    name: reference.name,
                    matched: reference.matched,
                    args: &arguments,
                    format: self.format(),
                    diagnostics,
                };
                callback(&mut ctx).unwrap_or_default()
            }
        }
    }

    /// Splits raw argument text and evaluates each argument in isolation:
    /// expansion to a fixed point, group collapsing, then the expression
    /// evaluator. Same phase order as a whole formula body.
    fn evaluate_arguments(
        &self,
        raw: &str,
        resolver: &dyn NameResolver,
        diagnostics: &mut Diagnostics,
    ) -> Vec<String> {
        split_arguments(raw)
            .into_iter()
            .map(|argument| {
                let expanded = self.expand_references(argument, resolver, diagnostics);
                let flattened = self.collapse_groups(&expanded, diagnostics);
                self.eval_expression(&flattened, diagnostics)
            })
            .collect()
    }
}

/// Splits on top-level separators only; parentheses nest and a backslash
/// escapes the character after it. Empty raw text is an empty argument list.
fn split_arguments(raw: &str) -> Vec<&str> {
    if raw.is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut escaped = false;
    for (at, ch) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ARGUMENT_SEPARATOR if depth == 0 => {
                parts.push(&raw[start..at]);
                start = at + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}
