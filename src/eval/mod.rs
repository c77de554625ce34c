//! Formula/macro evaluation for accounting templates.
//!
//! Templates hold strings such as `=%AMOUNT(%CODE(08))+21`. Evaluation
//! expands `%NAME` macro and `%NAME(args)` function references through a
//! caller-supplied [`NameResolver`], collapses parenthesized groups, reduces
//! the remaining arithmetic with conventional precedence, and restores
//! escaped operator characters. It never aborts: problems are appended to an
//! ordered diagnostic trail and evaluation produces a best-effort string.

mod arith;
mod compare;
mod expand;
mod matcher;
mod resolver;

pub use resolver::{Arity, Callback, CallContext, NameResolver};

use log::debug;
use rayon::prelude::*;
use thiserror::Error;

/// Upper bound on both fixed-point loops (reference expansion and group
/// collapsing). A resolver returning oscillating substitutions produces a
/// diagnostic instead of a hang.
pub(crate) const MAX_PASSES: usize = 64;

/// Display configuration for rendered numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub thousand_sep: Option<char>,
    pub decimal_sep: char,
    pub digits: usize,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            thousand_sep: None,
            decimal_sep: '.',
            digits: 2,
        }
    }
}

/// Result of one [`Engine::evaluate`] call: the display string plus every
/// diagnostic collected along the way, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub result: String,
    pub diagnostics: Vec<String>,
}

/// Ordered, append-only diagnostic trail of one evaluation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    pub(crate) fn report(&mut self, message: impl std::fmt::Display) {
        let message = message.to_string();
        debug!("diagnostic: {message}");
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

/// Non-fatal conditions reported into the diagnostic trail. The trail keeps
/// plain strings; this enum only pins the wording down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum Issue {
    #[error("unknown function name '{0}'")]
    UnknownName(String),
    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("'{0}' is not a valid condition")]
    MalformedCondition(String),
    #[error("missing operand in condition '{0}'")]
    MissingOperand(String),
    #[error("evaluation did not settle after {0} passes")]
    PassLimit(usize),
}

/// The evaluation engine. Holds only immutable display configuration; the
/// pattern matchers are compiled into the binary by `pest_derive`, so a
/// single engine is safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    format: NumberFormat,
}

/// What kind of text arrived at the top level.
enum Input<'a> {
    /// Not a formula (including the empty string); returned unchanged.
    Verbatim,
    /// `'=`-escaped literal; the text after the escape is not evaluated.
    Quoted(&'a str),
    /// Leading `=` stripped; the body runs the full pipeline.
    Formula(&'a str),
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the separators and digit count used when rendering numbers.
    /// Affects only subsequent formatting, never the parsing rules of text
    /// already substituted into a formula.
    pub fn set_format(&mut self, thousand_sep: Option<char>, decimal_sep: char, digits: usize) {
        self.format = NumberFormat {
            thousand_sep,
            decimal_sep,
            digits,
        };
    }

    pub fn format(&self) -> &NumberFormat {
        &self.format
    }

    /// Evaluates one template string. Non-formula input comes back unchanged
    /// with an empty trail; formula input always yields a best-effort result
    /// string, with problems appended to `diagnostics` in evaluation order.
    pub fn evaluate(&self, formula: &str, resolver: &dyn NameResolver) -> Evaluation {
        let mut diagnostics = Diagnostics::default();
        let result = match classify(formula) {
            Input::Verbatim => formula.to_owned(),
            Input::Quoted(text) => text.to_owned(),
            Input::Formula(body) => {
                debug!("evaluating formula body {body:?}");
                let expanded = self.expand_references(body, resolver, &mut diagnostics);
                let flattened = self.collapse_groups(&expanded, &mut diagnostics);
                let value = self.eval_expression(&flattened, &mut diagnostics);
                clean_escapes(&value)
            }
        };
        Evaluation {
            result,
            diagnostics: diagnostics.into_messages(),
        }
    }

    /// Evaluates a batch of templates in parallel. Output order matches the
    /// input slice; every entry carries its own diagnostic trail.
    pub fn evaluate_batch(
        &self,
        formulas: &[&str],
        resolver: &(dyn NameResolver + Sync),
    ) -> Vec<Evaluation> {
        formulas
            .par_iter()
            .map(|formula| self.evaluate(formula, resolver))
            .collect()
    }

    /// Routes a flat (paren-free) string. Comparison-shaped text keeps its
    /// shape with each side reduced independently; the comparison itself is
    /// settled only inside `IF`. Text with an unescaped arithmetic operator
    /// is reduced to a rendered number. Anything else passes through.
    pub(crate) fn eval_expression(&self, input: &str, diagnostics: &mut Diagnostics) -> String {
        if let Some(cmp) = matcher::comparison(input) {
            let left = self.eval_expression(cmp.left, diagnostics);
            let right = self.eval_expression(cmp.right, diagnostics);
            return format!("{left}{}{right}", cmp.op);
        }
        if arith::contains_operator(input) {
            return arith::evaluate(&arith::collapse_signs(input), &self.format);
        }
        input.to_owned()
    }

    /// Collapses innermost parenthesized groups until none remain, replacing
    /// each group (parentheses included) with its evaluated content. A
    /// collapse drops a pair of parentheses, so the text normally shrinks;
    /// only substitutions that keep it from shrinking count against the cap.
    pub(crate) fn collapse_groups(&self, input: &str, diagnostics: &mut Diagnostics) -> String {
        let mut current = input.to_owned();
        let mut stale = 0;
        while let Some((start, end)) = matcher::innermost_group(&current) {
            let before = current.len();
            let value = self.eval_expression(&current[start + 1..end - 1], diagnostics);
            current.replace_range(start..end, &value);
            if current.len() >= before {
                stale += 1;
                if stale > MAX_PASSES {
                    diagnostics.report(Issue::PassLimit(MAX_PASSES));
                    break;
                }
            }
        }
        current
    }
}

fn classify(formula: &str) -> Input<'_> {
    if formula.is_empty() {
        return Input::Verbatim;
    }
    if let Some(text) = formula.strip_prefix("'=") {
        return Input::Quoted(text);
    }
    match formula.strip_prefix('=') {
        Some(body) => Input::Formula(body),
        None => Input::Verbatim,
    }
}

/// Final pass: every backslash directly before one of `+ - * / %` becomes
/// that bare character. Runs last so escaped operators survive the earlier
/// phases as literal text.
fn clean_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '+' | '-' | '*' | '/' | '%') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;
    use pretty_assertions::assert_eq;

    fn none() -> FunctionRegistry {
        FunctionRegistry::new()
    }

    #[test]
    fn non_formula_text_is_returned_unchanged() {
        let engine = Engine::new();
        for text in ["", "hello", "100.50", "a=b", "'quoted but not a formula"] {
            let out = engine.evaluate(text, &none());
            assert_eq!(out.result, text);
            assert!(out.diagnostics.is_empty());
        }
    }

    #[test]
    fn quote_escaped_formula_is_returned_unevaluated() {
        let engine = Engine::new();
        let out = engine.evaluate("'=X", &none());
        assert_eq!(out.result, "X");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn escaped_operators_survive_to_the_final_cleanup() {
        let engine = Engine::new();
        let out = engine.evaluate(r"=A \- B", &none());
        assert_eq!(out.result, "A - B");
        assert!(out.diagnostics.is_empty());
        assert_eq!(engine.evaluate(r"=\%X", &none()).result, "%X");
    }

    #[test]
    fn precedence_and_grouping() {
        let engine = Engine::new();
        assert_eq!(engine.evaluate("=2+3*4", &none()).result, "14");
        assert_eq!(engine.evaluate("=(2+3)*4", &none()).result, "20");
        assert_eq!(engine.evaluate("=12+((2+3)*4)", &none()).result, "32");
    }

    #[test]
    fn chained_operations_keep_full_precision() {
        let engine = Engine::new();
        let out = engine.evaluate("=10/3*3", &none());
        assert_eq!(out.result, "10");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn grouped_condition_sides_collapse_before_comparison() {
        let engine = Engine::new();
        assert_eq!(engine.evaluate("=%IF((1+1)>1;a;b)", &none()).result, "a");
        assert_eq!(engine.evaluate("=%IF((2-1)*2<2;a;b)", &none()).result, "b");
    }

    #[test]
    fn many_groups_collapse_without_tripping_the_cap() {
        let engine = Engine::new();
        let formula = format!("={}", vec!["(1)"; 70].join("+"));
        let out = engine.evaluate(&formula, &none());
        assert_eq!(out.result, "70");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn division_by_zero_keeps_the_historical_zero() {
        let engine = Engine::new();
        let out = engine.evaluate("=5/0", &none());
        assert_eq!(out.result, "0");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn builtin_conditional_selects_branches() {
        let engine = Engine::new();
        assert_eq!(engine.evaluate("=%IF(3>2;10;20)", &none()).result, "10");
        assert_eq!(engine.evaluate("=%IF(3<2;10;20)", &none()).result, "20");
        assert_eq!(engine.evaluate("=%IF(3!=3;10;20)", &none()).result, "20");
        assert!(engine
            .evaluate("=%IF(3>2;10;20)", &none())
            .diagnostics
            .is_empty());
    }

    #[test]
    fn unknown_function_reports_once_and_substitutes_empty() {
        let engine = Engine::new();
        let out = engine.evaluate("=%FOO(1)", &none());
        assert_eq!(out.result, "");
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].contains("FOO"));
    }

    #[test]
    fn macro_results_are_re_expanded_to_a_fixed_point() {
        let mut registry = FunctionRegistry::new();
        registry.register("X", Arity::Exact(0), |_| Some("%Y".to_string()));
        registry.register("Y", Arity::Exact(0), |_| Some("5".to_string()));
        let engine = Engine::new();
        let out = engine.evaluate("=%X", &registry);
        assert_eq!(out.result, "5");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn oscillating_resolvers_hit_the_pass_cap() {
        let mut registry = FunctionRegistry::new();
        registry.register("PING", Arity::Exact(0), |_| Some("%PONG".to_string()));
        registry.register("PONG", Arity::Exact(0), |_| Some("%PING".to_string()));
        let engine = Engine::new();
        let out = engine.evaluate("=%PING", &registry);
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].contains("did not settle"));
    }

    #[test]
    fn separators_shape_only_the_rendering() {
        let mut engine = Engine::new();
        engine.set_format(Some(','), '.', 2);
        assert_eq!(engine.evaluate("=1000.5+1", &none()).result, "1,001.5");

        let mut engine = Engine::new();
        engine.set_format(Some(' '), ',', 2);
        assert_eq!(engine.evaluate("=1000,5+1", &none()).result, "1 001,5");
    }

    #[test]
    fn comparisons_outside_if_keep_their_shape() {
        let engine = Engine::new();
        let out = engine.evaluate("=1+1>1*3", &none());
        assert_eq!(out.result, "2>3");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn nested_function_formula_end_to_end() {
        let mut registry = FunctionRegistry::new();
        registry.register("CODE", Arity::Exact(1), |_| Some("6110".to_string()));
        registry.register("AMOUNT", Arity::Exact(1), |_| Some("123.45".to_string()));
        let engine = Engine::new();
        let out = engine.evaluate("=%AMOUNT(%CODE(08))+21", &registry);
        assert_eq!(out.result, "144.45");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn batch_evaluation_preserves_order() {
        let engine = Engine::new();
        let out = engine.evaluate_batch(&["=1+1", "plain", "=2*3"], &none());
        let results: Vec<&str> = out.iter().map(|e| e.result.as_str()).collect();
        assert_eq!(results, ["2", "plain", "6"]);
    }

    #[test]
    fn escape_cleanup_handles_trailing_backslash() {
        assert_eq!(clean_escapes(r"a\"), r"a\");
        assert_eq!(clean_escapes(r"\x"), r"\x");
        assert_eq!(clean_escapes(r"\+\-\*\/\%"), "+-*/%");
    }
}
