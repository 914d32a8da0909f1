//! Subcommand implementations.

pub mod config_cmd;
pub mod contract;
pub mod hooks;

use controlgate_config::{AppConfig, ConfigError};
use controlgate_contracts::{ContractStore, ControlLayer, EvalLimits, LoadReport, SandboxEvaluator};
use controlgate_hooks::ControlLayerHooks;
use std::path::Path;
use std::sync::Arc;

/// Load the configuration from `path` when given, otherwise from the default
/// location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_at(path),
        None => AppConfig::load(),
    }
}

pub fn eval_limits(config: &AppConfig) -> EvalLimits {
    EvalLimits {
        max_expression_len: config.limits.max_expression_len,
        max_depth: config.limits.max_depth,
        max_steps: config.limits.max_steps,
        max_collection_len: config.limits.max_collection_len,
    }
}

pub fn load_store(config: &AppConfig) -> (ContractStore, LoadReport) {
    ContractStore::load_with_report(&config.contracts_dir, &eval_limits(config))
}

pub fn build_layer(config: &AppConfig) -> ControlLayer {
    let (store, _) = load_store(config);
    ControlLayer::with_evaluator(Arc::new(store), SandboxEvaluator::new(eval_limits(config)))
}

pub fn build_hooks(config: &AppConfig) -> ControlLayerHooks {
    ControlLayerHooks::new(build_layer(config), config.product_label.clone())
}
