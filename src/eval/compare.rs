use log::debug;

use crate::eval::{arith, matcher, Diagnostics, Engine, Issue};

/// Relation decoded from a comparison operator cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
}

impl Relation {
    /// Decodes a cluster of `< = > !`; any `!` negates the relation. Returns
    /// the relation and the negation flag, or `None` for clusters carrying
    /// no relation at all (a bare `!`).
    fn from_cluster(op: &str) -> Option<(Relation, bool)> {
        let negated = op.contains('!');
        let lt = op.contains('<');
        let gt = op.contains('>');
        let eq = op.contains('=');
        let relation = if lt && gt {
            Relation::NotEqual
        } else if lt && eq {
            Relation::LessOrEqual
        } else if gt && eq {
            Relation::GreaterOrEqual
        } else if lt {
            Relation::Less
        } else if gt {
            Relation::Greater
        } else if eq {
            Relation::Equal
        } else {
            return None;
        };
        Some((relation, negated))
    }

    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Relation::Less => left < right,
            Relation::LessOrEqual => left <= right,
            Relation::Greater => left > right,
            Relation::GreaterOrEqual => left >= right,
            Relation::Equal => left == right,
            Relation::NotEqual => left != right,
        }
    }
}

impl Engine {
    /// Built-in `IF(condition; if_true; if_false)`. The branch arguments are
    /// returned literally; they were already evaluated, if at all, by the
    /// expansion pass that built the argument list.
    pub(crate) fn eval_if(&self, args: &[String], diagnostics: &mut Diagnostics) -> String {
        if self.eval_condition(&args[0], diagnostics) {
            args[1].clone()
        } else {
            args[2].clone()
        }
    }

    /// Evaluates a comparison-shaped condition. Conditions that do not match
    /// the comparison pattern, or with an empty side, report a diagnostic
    /// and count as false.
    pub(crate) fn eval_condition(&self, condition: &str, diagnostics: &mut Diagnostics) -> bool {
        let Some(cmp) = matcher::comparison(condition) else {
            diagnostics.report(Issue::MalformedCondition(condition.to_owned()));
            return false;
        };
        let left = self.eval_expression(cmp.left, diagnostics);
        let right = self.eval_expression(cmp.right, diagnostics);
        if left.trim().is_empty() || right.trim().is_empty() {
            diagnostics.report(Issue::MissingOperand(condition.to_owned()));
            return false;
        }
        let Some((relation, negated)) = Relation::from_cluster(cmp.op) else {
            diagnostics.report(Issue::MalformedCondition(condition.to_owned()));
            return false;
        };
        let left = arith::parse_number(&left, self.format());
        let right = arith::parse_number(&right, self.format());
        let holds = relation.holds(left, right) != negated;
        debug!("condition {condition:?} -> {holds}");
        holds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clusters_decode_to_relations() {
        assert_eq!(Relation::from_cluster("<"), Some((Relation::Less, false)));
        assert_eq!(
            Relation::from_cluster("<="),
            Some((Relation::LessOrEqual, false))
        );
        assert_eq!(
            Relation::from_cluster(">="),
            Some((Relation::GreaterOrEqual, false))
        );
        assert_eq!(Relation::from_cluster("="), Some((Relation::Equal, false)));
        assert_eq!(
            Relation::from_cluster("<>"),
            Some((Relation::NotEqual, false))
        );
        assert_eq!(Relation::from_cluster("!="), Some((Relation::Equal, true)));
        assert_eq!(Relation::from_cluster("!"), None);
    }

    #[test]
    fn conditions_compare_numerically() {
        let engine = Engine::new();
        let mut diagnostics = Diagnostics::default();
        assert!(engine.eval_condition("3>2", &mut diagnostics));
        assert!(!engine.eval_condition("3<2", &mut diagnostics));
        assert!(engine.eval_condition("3<=3", &mut diagnostics));
        assert!(engine.eval_condition("2<>3", &mut diagnostics));
        assert!(!engine.eval_condition("3!=3", &mut diagnostics));
        assert!(engine.eval_condition("3!=4", &mut diagnostics));
        assert!(diagnostics.messages().is_empty());
    }

    #[test]
    fn condition_sides_may_be_arithmetic() {
        let engine = Engine::new();
        let mut diagnostics = Diagnostics::default();
        assert!(engine.eval_condition("2+2>3", &mut diagnostics));
        assert!(!engine.eval_condition("2*2=5", &mut diagnostics));
        assert!(diagnostics.messages().is_empty());
    }

    #[test]
    fn malformed_conditions_are_false_with_a_report() {
        let engine = Engine::new();
        let mut diagnostics = Diagnostics::default();
        assert!(!engine.eval_condition("just text", &mut diagnostics));
        assert_eq!(diagnostics.messages().len(), 1);
    }

    #[test]
    fn empty_sides_are_false_with_a_report() {
        let engine = Engine::new();
        let mut diagnostics = Diagnostics::default();
        assert!(!engine.eval_condition(">3", &mut diagnostics));
        assert!(!engine.eval_condition("3>", &mut diagnostics));
        assert_eq!(diagnostics.messages().len(), 2);
    }

    #[test]
    fn branch_selection_returns_the_literal_argument() {
        let engine = Engine::new();
        let mut diagnostics = Diagnostics::default();
        let args = vec!["3>2".to_string(), "yes".to_string(), "no".to_string()];
        assert_eq!(engine.eval_if(&args, &mut diagnostics), "yes");
        let args = vec!["3<2".to_string(), "yes".to_string(), "no".to_string()];
        assert_eq!(engine.eval_if(&args, &mut diagnostics), "no");
    }
}
