use rulehunter_rules::expr::{Expr, ExprError, Vars};
use serde::{Deserialize, Serialize};

/// A boolean condition over one rule's aggregator values and `numRecords`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Goal {
    expr: Expr,
}

impl Goal {
    pub fn new(src: &str) -> Result<Self, ExprError> {
        Ok(Self {
            expr: Expr::compile(src)?,
        })
    }

    pub fn src(&self) -> &str {
        self.expr.src()
    }

    pub fn assess(&self, vars: &dyn Vars) -> Result<bool, ExprError> {
        self.expr.eval_bool(vars)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalAssessment {
    pub expr: String,
    pub passed: bool,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rulehunter_core::Value;

    use super::*;

    #[test]
    fn assess_against_aggregators() {
        let goal = Goal::new("helpedMcc > 0").unwrap();
        let mut vars = BTreeMap::new();
        vars.insert("helpedMcc".to_string(), Value::Float(0.2));
        assert!(goal.assess(&vars).unwrap());
        vars.insert("helpedMcc".to_string(), Value::Int(0));
        assert!(!goal.assess(&vars).unwrap());
    }

    #[test]
    fn non_bool_goal_is_an_error() {
        let goal = Goal::new("numRecords + 1").unwrap();
        let mut vars = BTreeMap::new();
        vars.insert("numRecords".to_string(), Value::Int(3));
        let err = goal.assess(&vars).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid expression: numRecords + 1 (expression doesn't return a bool)"
        );
    }

    #[test]
    fn serializes_as_source() {
        let goal = Goal::new("a > 1").unwrap();
        assert_eq!(serde_json::to_string(&goal).unwrap(), "\"a > 1\"");
        let back: Goal = serde_json::from_str("\"a > 1\"").unwrap();
        assert_eq!(back, goal);
    }
}
