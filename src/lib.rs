pub mod eval;
pub mod functions;

use eval::{Engine, Evaluation};
use functions::FunctionRegistry;

/// Evaluates one template string against a registry, using an engine with
/// default number formatting.
///
/// ```
/// use ledgerform_rs::functions::FunctionRegistry;
///
/// let registry = FunctionRegistry::new();
/// let out = ledgerform_rs::evaluate_formula("=2+3*4", &registry);
/// assert_eq!(out.result, "14");
/// assert!(out.diagnostics.is_empty());
/// ```
pub fn evaluate_formula(formula: &str, registry: &FunctionRegistry) -> Evaluation {
    let engine = Engine::new();
    engine.evaluate(formula, registry)
}
