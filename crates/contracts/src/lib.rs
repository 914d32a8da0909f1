//! Tool-output contracts: per-tool governance rules evaluated after every
//! tool call.
//!
//! A contract names a tool and lists rules. Each rule carries a trigger
//! condition (a small boolean expression over `tool_output`) and an
//! instruction. After the tool runs, rules are tried in ascending priority
//! order and the first one whose condition holds supplies the instruction
//! handed back to the agent.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │  Tool result  │───▶│ ControlLayer │───▶│   Sandbox    │
//! │ (name, JSON)  │    │  (first hit) │    │  evaluator   │
//! └──────────────┘    └──────┬───────┘    └──────────────┘
//!                            │
//!                    ┌───────┴────────┐
//!                    │ ContractStore  │
//!                    │ (loaded once)  │
//!                    └────────────────┘
//! ```
//!
//! # Example Contract
//!
//! ```yaml
//! tool_name: search
//! description: Web search results
//! rules:
//!   - name: pii_in_results
//!     description: Search results must not expose personal email addresses
//!     trigger_condition: "any('@' in str(r) for r in tool_output)"
//!     instruction: Redact email addresses before using these results.
//!     priority: 1
//! ```

mod engine;
mod model;
mod parser;
mod sandbox;
mod store;
mod value;

pub use engine::{ConditionEvaluator, ControlLayer, EvaluationResult, SandboxEvaluator};
pub use model::{Contract, Rule};
pub use parser::{BinaryOp, CompareOp, Expr, LogicalOp, Method, UnaryOp, parse_expression};
pub use sandbox::{
    EvalLimits, SAFE_BUILTINS, TOOL_OUTPUT, evaluate_condition, evaluate_expr, try_evaluate,
};
pub use store::{CONTRACT_EXTENSIONS, ContractStore, LoadReport, LoadedFile};
pub use value::{Builtin, Value};

use std::path::PathBuf;

/// Re-export for convenience.
pub type ContractResult<T> = std::result::Result<T, ContractError>;

/// Problems found while loading contract files. None of these are fatal:
/// the offending file is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("no config directory found at {}", .0.display())]
    NoConfigDirectory(PathBuf),

    #[error("no config files found in {}", .0.display())]
    NoConfigFiles(PathBuf),

    #[error("error loading config file: {}: {detail}", .path.display())]
    LoadFailed { path: PathBuf, detail: String },

    #[error("invalid config file: {}: {detail}", .path.display())]
    InvalidConfig { path: PathBuf, detail: String },

    #[error(
        "duplicate contract for tool '{tool_name}': {} replaces {}",
        .path.display(),
        .previous.display()
    )]
    DuplicateTool {
        tool_name: String,
        path: PathBuf,
        previous: PathBuf,
    },

    #[error("cannot read config directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Why a trigger condition could not be evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("no expression provided")]
    MissingExpression,

    #[error("expression is {len} bytes long, limit is {limit}")]
    TooLong { len: usize, limit: usize },

    #[error("invalid syntax at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("evaluation exceeded {0} steps")]
    BudgetExhausted(u64),

    #[error("result would exceed {0} elements")]
    TooLarge(usize),

    #[error("name '{0}' is not defined")]
    UndefinedName(String),

    #[error("access to '{0}' is not allowed")]
    Forbidden(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("value error: {0}")]
    Value(String),

    #[error("key not found: {0}")]
    Key(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("division by zero")]
    ZeroDivision,

    #[error("integer overflow")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_texts_lead_with_expected_phrases() {
        let path = PathBuf::from("contracts/search.yaml");
        let cases = [
            (ContractError::NoConfigDirectory(path.clone()), "no config directory found"),
            (ContractError::NoConfigFiles(path.clone()), "no config files found"),
            (
                ContractError::LoadFailed {
                    path: path.clone(),
                    detail: "bad indent".into(),
                },
                "error loading config file: ",
            ),
            (
                ContractError::InvalidConfig {
                    path,
                    detail: "missing field `rules`".into(),
                },
                "invalid config file: ",
            ),
        ];
        for (error, prefix) in cases {
            assert!(error.to_string().starts_with(prefix), "{error}");
        }
    }

    #[test]
    fn eval_error_messages() {
        assert_eq!(
            EvalError::UndefinedName("exec".into()).to_string(),
            "name 'exec' is not defined"
        );
        assert_eq!(EvalError::ZeroDivision.to_string(), "division by zero");
    }
}
