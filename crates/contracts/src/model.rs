//! Contract data model: one contract per governed tool, each holding rules
//! in evaluation order.

use crate::EvalError;
use crate::parser::{Expr, parse_expression};
use crate::sandbox::EvalLimits;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// On-disk shape of a contract file. Every field is required.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContractSpec {
    pub tool_name: String,
    pub description: String,
    pub rules: Vec<RuleSpec>,
}

/// On-disk shape of a single rule.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RuleSpec {
    pub name: String,
    pub description: String,
    pub trigger_condition: String,
    pub instruction: String,
    pub priority: i64,
}

impl ContractSpec {
    /// Checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.tool_name.trim().is_empty() {
            return Err("tool_name cannot be empty".into());
        }
        Ok(())
    }

    pub fn into_contract(self, limits: &EvalLimits) -> Contract {
        let rules = self
            .rules
            .into_iter()
            .map(|r| {
                Rule::with_limits(
                    r.name,
                    r.description,
                    r.trigger_condition,
                    r.instruction,
                    r.priority,
                    limits,
                )
            })
            .collect();
        Contract::new(self.tool_name, self.description, rules)
    }
}

/// A single governance rule.
///
/// The trigger condition is parsed once when the rule is built. A condition
/// that fails to parse keeps its error, so the rule simply never fires.
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    /// Identifier used in diagnostics
    pub name: String,
    /// The policy this rule enforces; embedded in the directive
    pub description: String,
    /// Boolean expression over `tool_output`
    pub trigger_condition: String,
    /// Directive text delivered to the agent when the rule fires
    pub instruction: String,
    /// Lower values are evaluated first
    pub priority: i64,
    #[serde(skip)]
    condition: Result<Arc<Expr>, EvalError>,
}

impl Rule {
    /// Build a rule, compiling its condition with default limits.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        trigger_condition: impl Into<String>,
        instruction: impl Into<String>,
        priority: i64,
    ) -> Self {
        Self::with_limits(
            name,
            description,
            trigger_condition,
            instruction,
            priority,
            &EvalLimits::default(),
        )
    }

    /// Build a rule, compiling its condition with explicit limits.
    pub fn with_limits(
        name: impl Into<String>,
        description: impl Into<String>,
        trigger_condition: impl Into<String>,
        instruction: impl Into<String>,
        priority: i64,
        limits: &EvalLimits,
    ) -> Self {
        let trigger_condition = trigger_condition.into();
        let condition = parse_expression(&trigger_condition, limits).map(Arc::new);
        Self {
            name: name.into(),
            description: description.into(),
            trigger_condition,
            instruction: instruction.into(),
            priority,
            condition,
        }
    }

    /// The compiled trigger condition, or the error that prevented compiling it.
    pub fn condition(&self) -> Result<&Expr, &EvalError> {
        self.condition.as_ref().map(Arc::as_ref)
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.trigger_condition == other.trigger_condition
            && self.instruction == other.instruction
            && self.priority == other.priority
    }
}

/// The rules governing one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contract {
    pub tool_name: String,
    pub description: String,
    rules: Vec<Rule>,
}

impl Contract {
    /// Build a contract. Rules are stably sorted by ascending priority, so
    /// rules sharing a priority keep their authored order.
    pub fn new(
        tool_name: impl Into<String>,
        description: impl Into<String>,
        mut rules: Vec<Rule>,
    ) -> Self {
        rules.sort_by_key(|r| r.priority);
        Self {
            tool_name: tool_name.into(),
            description: description.into(),
            rules,
        }
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, priority: i64) -> Rule {
        Rule::new(name, "desc", "True", "do something", priority)
    }

    #[test]
    fn rules_sorted_by_priority() {
        let contract = Contract::new(
            "search",
            "Search tool",
            vec![rule("c", 3), rule("a", 1), rule("b", 2)],
        );
        let names: Vec<&str> = contract.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn equal_priorities_keep_authored_order() {
        let contract = Contract::new(
            "search",
            "Search tool",
            vec![rule("first", 5), rule("early", 1), rule("second", 5), rule("third", 5)],
        );
        let names: Vec<&str> = contract.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["early", "first", "second", "third"]);
    }

    #[test]
    fn condition_compiled_once() {
        let ok = Rule::new("r", "d", "len(tool_output) > 0", "i", 1);
        assert!(ok.condition().is_ok());

        let broken = Rule::new("r", "d", "invalid syntax here", "i", 1);
        assert!(matches!(broken.condition(), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn spec_requires_every_rule_field() {
        let yaml = r#"
tool_name: search
description: Search tool
rules:
  - name: r1
    description: missing trigger
    instruction: do it
    priority: 1
"#;
        let err = serde_yaml::from_str::<ContractSpec>(yaml).unwrap_err();
        assert!(err.to_string().contains("trigger_condition"));
    }

    #[test]
    fn spec_rejects_non_integer_priority() {
        let yaml = r#"
tool_name: search
description: Search tool
rules:
  - name: r1
    description: d
    trigger_condition: "True"
    instruction: i
    priority: high
"#;
        assert!(serde_yaml::from_str::<ContractSpec>(yaml).is_err());
    }

    #[test]
    fn spec_ignores_unknown_keys() {
        let yaml = r#"
tool_name: search
description: Search tool
owner: data-team
rules: []
"#;
        let spec: ContractSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(spec.validate().is_ok());
        let contract = spec.into_contract(&EvalLimits::default());
        assert!(contract.rules().is_empty());
    }

    #[test]
    fn blank_tool_name_is_invalid() {
        let spec = ContractSpec {
            tool_name: "  ".into(),
            description: String::new(),
            rules: Vec::new(),
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn rule_serializes_without_compiled_condition() {
        let json = serde_json::to_value(rule("r", 1)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "r",
                "description": "desc",
                "trigger_condition": "True",
                "instruction": "do something",
                "priority": 1
            })
        );
    }
}
