//! Contract store: the process-wide, read-only mapping from tool name to
//! contract.
//!
//! Built once from a directory of `*.yaml` / `*.yml` files. Every problem
//! with the directory or an individual file is a warning: the offending file
//! is skipped and the rest still load.

use crate::model::{Contract, ContractSpec};
use crate::sandbox::EvalLimits;
use crate::{ContractError, ContractResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Recognized contract file extensions.
pub const CONTRACT_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Immutable tool-name → contract mapping.
#[derive(Debug, Clone, Default)]
pub struct ContractStore {
    contracts: BTreeMap<String, Contract>,
}

/// A file that loaded successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub tool_name: String,
    pub rule_count: usize,
}

/// What happened during a load pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub dir: PathBuf,
    pub loaded: Vec<LoadedFile>,
    pub issues: Vec<ContractError>,
}

impl LoadReport {
    /// `true` when every discovered file loaded and nothing was replaced.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl ContractStore {
    /// Load every contract file in `dir` with default evaluation limits.
    pub fn load(dir: &Path) -> Self {
        Self::load_with_report(dir, &EvalLimits::default()).0
    }

    /// Load every contract file in `dir`, returning the store together with
    /// a report of what loaded and what was skipped.
    pub fn load_with_report(dir: &Path, limits: &EvalLimits) -> (Self, LoadReport) {
        let mut report = LoadReport {
            dir: dir.to_path_buf(),
            ..LoadReport::default()
        };
        let mut store = Self::default();

        if !dir.is_dir() {
            let issue = ContractError::NoConfigDirectory(dir.to_path_buf());
            warn!(path = %dir.display(), "{issue}");
            report.issues.push(issue);
            return (store, report);
        }

        let files = match discover(dir) {
            Ok(files) => files,
            Err(source) => {
                let issue = ContractError::Io {
                    path: dir.to_path_buf(),
                    source,
                };
                warn!(path = %dir.display(), "{issue}");
                report.issues.push(issue);
                return (store, report);
            }
        };

        if files.is_empty() {
            let issue = ContractError::NoConfigFiles(dir.to_path_buf());
            warn!(path = %dir.display(), "{issue}");
            report.issues.push(issue);
            return (store, report);
        }

        let mut sources: BTreeMap<String, PathBuf> = BTreeMap::new();
        for path in files {
            let contract = match load_file(&path, limits) {
                Ok(contract) => contract,
                Err(issue) => {
                    warn!(path = %path.display(), "{issue}");
                    report.issues.push(issue);
                    continue;
                }
            };

            let tool_name = contract.tool_name.clone();
            debug!(
                path = %path.display(),
                tool = %tool_name,
                rules = contract.rules().len(),
                "Loaded contract"
            );
            report.loaded.push(LoadedFile {
                path: path.clone(),
                tool_name: tool_name.clone(),
                rule_count: contract.rules().len(),
            });

            if let Some(previous) = sources.insert(tool_name.clone(), path.clone()) {
                let issue = ContractError::DuplicateTool {
                    tool_name: tool_name.clone(),
                    path,
                    previous,
                };
                warn!(tool = %tool_name, "{issue}");
                report.issues.push(issue);
            }
            store.contracts.insert(tool_name, contract);
        }

        info!(
            path = %dir.display(),
            contracts = store.len(),
            skipped = report.issues.len(),
            "Contract store loaded"
        );
        (store, report)
    }

    /// Build a store from in-memory contracts. A later contract for the same
    /// tool replaces an earlier one.
    pub fn from_contracts(contracts: impl IntoIterator<Item = Contract>) -> Self {
        Self {
            contracts: contracts
                .into_iter()
                .map(|c| (c.tool_name.clone(), c))
                .collect(),
        }
    }

    /// The contract governing `tool_name`, if any.
    pub fn get(&self, tool_name: &str) -> Option<&Contract> {
        self.contracts.get(tool_name)
    }

    /// Governed tool names, sorted.
    pub fn tool_names(&self) -> Vec<&str> {
        self.contracts.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Contracts in tool-name order.
    pub fn iter(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.values()
    }
}

/// Non-recursive listing of contract files in `dir`, sorted by path.
fn discover(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| CONTRACT_EXTENSIONS.contains(&ext))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Parse one contract file. Syntax errors and schema errors are reported
/// separately.
fn load_file(path: &Path, limits: &EvalLimits) -> ContractResult<Contract> {
    let text = std::fs::read_to_string(path).map_err(|e| ContractError::LoadFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let document: serde_yaml::Value =
        serde_yaml::from_str(&text).map_err(|e| ContractError::LoadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let spec: ContractSpec =
        serde_yaml::from_value(document).map_err(|e| ContractError::InvalidConfig {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    spec.validate()
        .map_err(|detail| ContractError::InvalidConfig {
            path: path.to_path_buf(),
            detail,
        })?;

    Ok(spec.into_contract(limits))
}
