//! Contract evaluation service.
//!
//! [`ControlLayer`] looks up the contract for a tool and walks its rules in
//! priority order, returning the first rule whose condition holds.

use crate::model::{Contract, Rule};
use crate::sandbox::{EvalLimits, evaluate_expr};
use crate::store::ContractStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The outcome of evaluating a contract: the matched rule, if any.
///
/// The instruction is read from the rule, so the two are always present or
/// absent together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationResult<'a> {
    rule: Option<&'a Rule>,
}

impl<'a> EvaluationResult<'a> {
    pub fn no_match() -> Self {
        Self { rule: None }
    }

    pub fn matched(rule: &'a Rule) -> Self {
        Self { rule: Some(rule) }
    }

    pub fn is_match(&self) -> bool {
        self.rule.is_some()
    }

    pub fn rule(&self) -> Option<&'a Rule> {
        self.rule
    }

    pub fn instruction(&self) -> Option<&'a str> {
        self.rule.map(|r| r.instruction.as_str())
    }
}

/// Decides whether a rule's trigger condition holds for a tool output.
pub trait ConditionEvaluator {
    /// Must not panic; failures count as "not triggered".
    fn is_triggered(&self, rule: &Rule, output: &serde_json::Value) -> bool;
}

/// Evaluates the rule's precompiled condition in the sandbox.
#[derive(Debug, Clone, Default)]
pub struct SandboxEvaluator {
    limits: EvalLimits,
}

impl SandboxEvaluator {
    pub fn new(limits: EvalLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &EvalLimits {
        &self.limits
    }
}

impl ConditionEvaluator for SandboxEvaluator {
    fn is_triggered(&self, rule: &Rule, output: &serde_json::Value) -> bool {
        let result = match rule.condition() {
            Ok(expr) => evaluate_expr(expr, output, &self.limits),
            Err(e) => Err(e.clone()),
        };
        match result {
            Ok(triggered) => triggered,
            Err(e) => {
                warn!(rule = %rule.name, "error evaluating expression: {e}");
                false
            }
        }
    }
}

/// The single entry point the integration layer depends on.
///
/// Stateless apart from the shared, read-only [`ContractStore`]; safe to call
/// from any number of threads.
#[derive(Debug, Clone)]
pub struct ControlLayer<E = SandboxEvaluator> {
    store: Arc<ContractStore>,
    evaluator: E,
}

impl ControlLayer<SandboxEvaluator> {
    /// A control layer using the sandbox with default limits.
    pub fn new(store: Arc<ContractStore>) -> Self {
        Self::with_evaluator(store, SandboxEvaluator::default())
    }
}

impl<E: ConditionEvaluator> ControlLayer<E> {
    pub fn with_evaluator(store: Arc<ContractStore>, evaluator: E) -> Self {
        Self { store, evaluator }
    }

    /// Walk `contract`'s rules in order and return the first that triggers.
    /// Rules after the match are never evaluated.
    pub fn evaluate_contract<'c>(
        &self,
        contract: &'c Contract,
        output: &serde_json::Value,
    ) -> EvaluationResult<'c> {
        for rule in contract.rules() {
            if self.evaluator.is_triggered(rule, output) {
                info!(
                    tool = %contract.tool_name,
                    rule = %rule.name,
                    priority = rule.priority,
                    "Rule triggered"
                );
                return EvaluationResult::matched(rule);
            }
        }
        debug!(tool = %contract.tool_name, "No rule triggered");
        EvaluationResult::no_match()
    }

    /// Evaluate `output` against the contract governing `tool_name`.
    /// Unknown tools never reach the evaluator.
    pub fn evaluate(&self, tool_name: &str, output: &serde_json::Value) -> EvaluationResult<'_> {
        match self.store.get(tool_name) {
            Some(contract) => self.evaluate_contract(contract, output),
            None => {
                debug!(tool = %tool_name, "No contract configured");
                EvaluationResult::no_match()
            }
        }
    }

    pub fn store(&self) -> &ContractStore {
        &self.store
    }

    /// Names of every governed tool, sorted.
    pub fn governed_tools(&self) -> Vec<String> {
        self.store.tool_names().into_iter().map(String::from).collect()
    }
}
