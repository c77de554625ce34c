use ledgerform_rs::eval::{Arity, Engine};
use ledgerform_rs::functions::FunctionRegistry;

fn main() {
    pretty_env_logger::init();

    // A toy stand-in for the accounting layer: a two-entry chart of
    // accounts plus a flat rate.
    let mut registry = FunctionRegistry::new();
    registry.register("CODE", Arity::Exact(1), |ctx| {
        let code = ctx.argument(0).unwrap_or("").to_string();
        match code.as_str() {
            "08" => Some("6110".to_string()),
            "12" => Some("7050".to_string()),
            _ => {
                ctx.report(format!("no account under code '{code}'"));
                None
            }
        }
    });
    registry.register("AMOUNT", Arity::Exact(1), |ctx| {
        match ctx.argument(0) {
            Some("6110") => Some("123.45".to_string()),
            Some("7050") => Some("1890.10".to_string()),
            _ => Some("0".to_string()),
        }
    });
    registry.register("RATE", Arity::Exact(0), |_| Some("19.6".to_string()));

    let mut engine = Engine::new();
    engine.set_format(Some(' '), '.', 2);

    for formula in [
        "=%AMOUNT(%CODE(08))+21",
        "=%AMOUNT(%CODE(12))*%RATE/100",
        "=%IF(%RATE>10;high;low)",
        "=(2+3)*4",
        "=%AMOUNT(%CODE(99))",
        "plain text stays as it is",
    ] {
        let out = engine.evaluate(formula, &registry);
        println!("{formula:<32} -> {:?}", out.result);
        for message in &out.diagnostics {
            println!("{:>35} {message}", "!");
        }
    }
}
