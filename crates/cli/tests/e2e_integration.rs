//! End-to-end integration tests for controlgate.
//!
//! These tests exercise the full pipeline from contract files on disk to the
//! directive handed back to the agent, both through the library crates and
//! through the `controlgate` binary.

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Arc;

use controlgate_contracts::{ContractStore, ControlLayer, EvalLimits, evaluate_condition};
use controlgate_core::{Conversation, Message};
use controlgate_hooks::{ControlLayerHooks, INIT_INSTRUCTION, NO_FURTHER_INSTRUCTION};
use serde_json::json;

// ── Fixtures ─────────────────────────────────────────────────────────────

const SEARCH_CONTRACT: &str = r#"
tool_name: search
description: Web search results
rules:
  - name: non_empty
    description: Search results must be reviewed
    trigger_condition: "len(tool_output) > 0"
    instruction: I1
    priority: 1
"#;

const MAIL_CONTRACT: &str = r#"
tool_name: send_email
description: Outbound mail
rules:
  - name: catch_all
    description: Every outbound mail is logged
    trigger_condition: "True"
    instruction: Log the message id.
    priority: 10
  - name: external_recipient
    description: Mail must stay inside the company
    trigger_condition: "not tool_output['to'].endswith('@example.com')"
    instruction: Ask the user before sending mail outside example.com.
    priority: 1
"#;

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("contracts")).unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            format!(
                "contracts_dir = {}\nproduct_label = \"ACME\"\n",
                toml::Value::String(dir.path().join("contracts").display().to_string())
            ),
        )
        .unwrap();
        Self { dir }
    }

    fn contract(self, name: &str, content: &str) -> Self {
        std::fs::write(self.contracts_dir().join(name), content).unwrap();
        self
    }

    fn contracts_dir(&self) -> PathBuf {
        self.dir.path().join("contracts")
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn hooks(&self) -> ControlLayerHooks {
        let store = ContractStore::load(&self.contracts_dir());
        ControlLayerHooks::new(ControlLayer::new(Arc::new(store)), "ACME")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_controlgate"))
            .args(args)
            .current_dir(self.dir.path())
            .env("CONTROLGATE_CONFIG", self.config_path())
            .env_remove("CONTROLGATE_CONTRACTS_DIR")
            .env_remove("CONTROLGATE_PRODUCT_LABEL")
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ── Library pipeline ─────────────────────────────────────────────────────

#[test]
fn e2e_search_scenario() {
    let ws = Workspace::new().contract("search.yaml", SEARCH_CONTRACT);
    let layer = ControlLayer::new(Arc::new(ContractStore::load(&ws.contracts_dir())));

    let hit = layer.evaluate("search", &json!("x"));
    assert_eq!(hit.instruction(), Some("I1"));

    let miss = layer.evaluate("search", &json!(""));
    assert!(miss.instruction().is_none() && miss.rule().is_none());

    let unknown = layer.evaluate("unknown", &json!("x"));
    assert!(unknown.instruction().is_none() && unknown.rule().is_none());
}

#[test]
fn e2e_priority_order_across_files() {
    let ws = Workspace::new()
        .contract("mail.yml", MAIL_CONTRACT)
        .contract("search.yaml", SEARCH_CONTRACT);
    let store = ContractStore::load(&ws.contracts_dir());

    let mail = store.get("send_email").unwrap();
    let priorities: Vec<i64> = mail.rules().iter().map(|r| r.priority).collect();
    assert_eq!(priorities, [1, 10]);

    let layer = ControlLayer::new(Arc::new(store));
    let external = layer.evaluate("send_email", &json!({"to": "eve@elsewhere.org"}));
    assert_eq!(external.rule().unwrap().name, "external_recipient");

    let internal = layer.evaluate("send_email", &json!({"to": "bob@example.com"}));
    assert_eq!(internal.rule().unwrap().name, "catch_all");
}

#[test]
fn e2e_broken_files_are_isolated() {
    let ws = Workspace::new()
        .contract("a_broken.yaml", "tool_name: [unclosed")
        .contract("b_invalid.yaml", "tool_name: shell\ndescription: no rules\n")
        .contract("search.yaml", SEARCH_CONTRACT);

    let (store, report) =
        ContractStore::load_with_report(&ws.contracts_dir(), &EvalLimits::default());
    assert_eq!(store.tool_names(), ["search"]);
    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.issues.len(), 2);
    assert!(report.issues[0].to_string().starts_with("error loading config file"));
    assert!(report.issues[1].to_string().starts_with("invalid config file"));
}

#[test]
fn e2e_sandbox_blocks_escapes() {
    let output = json!({"path": "/etc/passwd"});
    for expression in [
        "__import__('os').system('id')",
        "open(tool_output['path'])",
        "exec('1')",
        "tool_output.__class__",
        "getattr(tool_output, 'keys')",
        "tool_output.pop('path')",
        "tool_output['missing'] or True",
    ] {
        assert!(!evaluate_condition(Some(expression), &output), "{expression}");
    }
    assert!(!evaluate_condition(None, &output));
    assert_eq!(output, json!({"path": "/etc/passwd"}));
}

#[test]
fn e2e_hooks_over_recorded_conversation() {
    let ws = Workspace::new()
        .contract("search.yaml", SEARCH_CONTRACT)
        .contract("mail.yml", MAIL_CONTRACT);
    let hooks = ws.hooks();

    let mut conversation = Conversation::new();
    let init = hooks.init(&conversation);
    assert_eq!(init.additional_instruction, INIT_INSTRUCTION);
    assert_eq!(init.target_tool_list, ["search", "send_email"]);

    conversation.push(Message::user("email the report to eve"));
    assert_eq!(hooks.post_hook(&conversation).additional_instruction, NO_FURTHER_INSTRUCTION);

    conversation.push(Message::tool_result("c1", "search", "[]"));
    assert!(hooks.post_hook(&conversation).triggered_rule.is_none());

    conversation.push(Message::tool_result(
        "c2",
        "send_email",
        r#"{"to": "eve@elsewhere.org", "id": 7}"#,
    ));
    let output = hooks.post_hook(&conversation);
    assert_eq!(
        output.additional_instruction,
        "[ACME CONTROL LAYER DIRECTIVE] The tool send_email's output does not satisfy the following policy: Mail must stay inside the company. Please follow the instruction: Ask the user before sending mail outside example.com."
    );
    assert_eq!(output.triggered_rule.unwrap().name, "external_recipient");
}

// ── Binary ───────────────────────────────────────────────────────────────

#[test]
fn cli_validate_clean() {
    let ws = Workspace::new().contract("search.yaml", SEARCH_CONTRACT);
    let output = ws.run(&["validate"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("All 1 contract files are valid."));
}

#[test]
fn cli_validate_reports_skipped_files() {
    let ws = Workspace::new()
        .contract("broken.yaml", "rules: {")
        .contract("search.yaml", SEARCH_CONTRACT);
    let output = ws.run(&["validate"]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("OK   "));
    assert!(text.contains("FAIL error loading config file"));
}

#[test]
fn cli_test_prints_directive() {
    let ws = Workspace::new().contract("search.yaml", SEARCH_CONTRACT);

    let hit = stdout(&ws.run(&["test", "search", "x"]));
    assert!(hit.starts_with("MATCH (rule: non_empty, priority: 1)"));
    assert!(hit.contains("[ACME CONTROL LAYER DIRECTIVE] The tool search's output"));

    assert_eq!(stdout(&ws.run(&["test", "search", ""])).trim(), "NO MATCH");
    assert!(stdout(&ws.run(&["test", "unknown", "x"])).starts_with("NO CONTRACT"));
}

#[test]
fn cli_eval() {
    let ws = Workspace::new();

    let output = ws.run(&["eval", "len(tool_output) > 2", "[1, 2, 3]"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "true");

    let output = ws.run(&["eval", "undefined_name", "1"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("name 'undefined_name' is not defined"));
}

#[test]
fn cli_init_and_check() {
    let ws = Workspace::new().contract("mail.yml", MAIL_CONTRACT);

    let init: serde_json::Value = serde_json::from_str(&stdout(&ws.run(&["init"]))).unwrap();
    assert_eq!(init["target_tool_list"], json!(["send_email"]));

    let conversation = ws.file(
        "conversation.json",
        &json!({
            "messages": [
                {"role": "user", "content": "send it"},
                {"role": "tool", "name": "send_email", "tool_call_id": "c1", "content": "{\"to\": \"bob@example.com\"}"}
            ]
        })
        .to_string(),
    );
    let output = ws.run(&["check", conversation.to_str().unwrap()]);
    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["triggered_rule"]["name"], "catch_all");
    assert!(
        result["additional_instruction"]
            .as_str()
            .unwrap()
            .ends_with("Please follow the instruction: Log the message id.")
    );
}

#[test]
fn cli_config_show() {
    let ws = Workspace::new();
    let output = ws.run(&["config", "show"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("product_label = \"ACME\""));
}
