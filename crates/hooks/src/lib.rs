//! Agent lifecycle hooks for the control layer.
//!
//! A host agent runtime wires two callbacks into its tool-call graph:
//!
//! - `control_layer_init` runs once before the first tool call and tells the
//!   agent which tools are governed.
//! - `control_layer_post_hook` runs after every tool call. It finds the most
//!   recent tool result in the conversation, evaluates it against that
//!   tool's contract and, on a match, hands back a directive for the agent.
//!
//! Hooks only read the host's state through [`AgentState`].

use controlgate_contracts::{ConditionEvaluator, ControlLayer, Rule, SandboxEvaluator};
use controlgate_core::{AgentState, Message, ToolDefinition};
use serde::Serialize;
use tracing::{debug, info};

/// Name under which the init hook is advertised.
pub const INIT_HOOK_NAME: &str = "control_layer_init";
/// Name under which the post hook is advertised.
pub const POST_HOOK_NAME: &str = "control_layer_post_hook";

/// Instruction returned by the init hook.
pub const INIT_INSTRUCTION: &str = "control_layer_post_hook must be invoked after every tool \
                                    execution to ensure data governance compliance.";
/// Instruction returned when no rule fires.
pub const NO_FURTHER_INSTRUCTION: &str = "No further instruction.";

/// Result of the init hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitOutput {
    pub additional_instruction: String,
    pub target_tool_list: Vec<String>,
}

/// Result of the post hook. `triggered_rule` is set exactly when
/// `additional_instruction` carries a directive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostHookOutput {
    pub additional_instruction: String,
    pub triggered_rule: Option<Rule>,
}

impl PostHookOutput {
    fn no_instruction() -> Self {
        Self {
            additional_instruction: NO_FURTHER_INSTRUCTION.into(),
            triggered_rule: None,
        }
    }
}

/// The most recent tool result in `messages`, scanning from the end.
pub fn find_latest_tool_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.is_tool_result())
}

/// Build the directive surfaced to the agent when `rule` fires for `tool_name`.
pub fn format_directive(product_label: &str, tool_name: &str, rule: &Rule) -> String {
    format!(
        "[{product_label} CONTROL LAYER DIRECTIVE] The tool {tool_name}'s output does not satisfy the following policy: {}. Please follow the instruction: {}",
        rule.description, rule.instruction
    )
}

/// Tool output as the evaluator sees it: parsed JSON when the content is
/// valid JSON, otherwise the raw text.
pub fn parse_tool_output(content: &str) -> serde_json::Value {
    serde_json::from_str(content).unwrap_or_else(|_| serde_json::Value::String(content.to_owned()))
}

/// The init and post-tool-call callbacks bound to one [`ControlLayer`].
#[derive(Debug, Clone)]
pub struct ControlLayerHooks<E = SandboxEvaluator> {
    layer: ControlLayer<E>,
    product_label: String,
}

impl<E: ConditionEvaluator> ControlLayerHooks<E> {
    pub fn new(layer: ControlLayer<E>, product_label: impl Into<String>) -> Self {
        Self {
            layer,
            product_label: product_label.into(),
        }
    }

    pub fn layer(&self) -> &ControlLayer<E> {
        &self.layer
    }

    pub fn product_label(&self) -> &str {
        &self.product_label
    }

    /// Tell the agent that the post hook is mandatory and which tools are
    /// governed. The state's content is not consulted.
    pub fn init<S: AgentState + ?Sized>(&self, _state: &S) -> InitOutput {
        let target_tool_list = self.layer.governed_tools();
        debug!(tools = target_tool_list.len(), "Control layer initialized");
        InitOutput {
            additional_instruction: INIT_INSTRUCTION.into(),
            target_tool_list,
        }
    }

    /// Evaluate the latest tool result in `state` against its contract.
    pub fn post_hook<S: AgentState + ?Sized>(&self, state: &S) -> PostHookOutput {
        let Some(message) = find_latest_tool_message(state.messages()) else {
            debug!("No tool message in state");
            return PostHookOutput::no_instruction();
        };

        let tool_name = message.name.as_deref().unwrap_or_default();
        let output = parse_tool_output(&message.content);

        match self.layer.evaluate(tool_name, &output).rule() {
            Some(rule) => {
                info!(tool = %tool_name, rule = %rule.name, "Issuing control layer directive");
                PostHookOutput {
                    additional_instruction: format_directive(&self.product_label, tool_name, rule),
                    triggered_rule: Some(rule.clone()),
                }
            }
            None => PostHookOutput::no_instruction(),
        }
    }

    /// Definitions for both hooks, for hosts that advertise them to the model
    /// as callable tools.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let no_arguments = serde_json::json!({
            "type": "object",
            "properties": {}
        });
        vec![
            ToolDefinition {
                name: INIT_HOOK_NAME.into(),
                description: format!(
                    "MANDATORY: call {INIT_HOOK_NAME} once before using any other tool. \
                     Returns the list of governed tools and the rule for invoking \
                     {POST_HOOK_NAME}."
                ),
                parameters: no_arguments.clone(),
            },
            ToolDefinition {
                name: POST_HOOK_NAME.into(),
                description: format!(
                    "MANDATORY: call {POST_HOOK_NAME} after every tool execution. \
                     Checks the latest tool output against its governance contract \
                     and returns any instruction that must be followed."
                ),
                parameters: no_arguments,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use controlgate_contracts::{Contract, ContractStore};
    use controlgate_core::Conversation;
    use std::sync::Arc;

    fn hooks(contracts: Vec<Contract>) -> ControlLayerHooks {
        let store = Arc::new(ContractStore::from_contracts(contracts));
        ControlLayerHooks::new(ControlLayer::new(store), "DATAGUSTO")
    }

    fn always(tool: &str, description: &str, instruction: &str) -> Contract {
        Contract::new(
            tool,
            "d",
            vec![Rule::new("r", description, "True", instruction, 1)],
        )
    }

    #[test]
    fn latest_tool_message_found_from_end() {
        let messages = vec![
            Message::user("hi"),
            Message::tool_result("t1", "tool1", "first_tool"),
            Message::assistant("AI says hi"),
            Message::tool_result("t2", "tool2", "second_tool"),
            Message::user("another"),
        ];
        let latest = find_latest_tool_message(&messages).unwrap();
        assert_eq!(latest.name.as_deref(), Some("tool2"));
        assert_eq!(latest.content, "second_tool");
    }

    #[test]
    fn no_tool_message() {
        assert!(find_latest_tool_message(&[]).is_none());
        let chat = [Message::user("hi"), Message::assistant("hello")];
        assert!(find_latest_tool_message(&chat).is_none());
    }

    #[test]
    fn init_lists_governed_tools() {
        let hooks = hooks(vec![always("tool2", "d", "i"), always("tool1", "d", "i")]);
        let output = hooks.init(&Conversation::new());
        assert_eq!(output.additional_instruction, INIT_INSTRUCTION);
        assert_eq!(output.target_tool_list, ["tool1", "tool2"]);
    }

    #[test]
    fn post_hook_without_tool_message() {
        let hooks = hooks(vec![always("search", "d", "i")]);
        let state = vec![Message::user("hi")];
        assert_eq!(hooks.post_hook(&state), PostHookOutput::no_instruction());
    }

    #[test]
    fn post_hook_issues_directive() {
        let hooks = hooks(vec![always("test_tool", "test rule description", "test_instruction")]);
        let state = vec![Message::tool_result("t1", "test_tool", "tool output")];

        let output = hooks.post_hook(&state);
        assert_eq!(
            output.additional_instruction,
            "[DATAGUSTO CONTROL LAYER DIRECTIVE] The tool test_tool's output does not satisfy the following policy: test rule description. Please follow the instruction: test_instruction"
        );
        assert_eq!(output.triggered_rule.unwrap().name, "r");
    }

    #[test]
    fn post_hook_without_match() {
        let contract = Contract::new(
            "search",
            "d",
            vec![Rule::new("r", "d", "len(tool_output) > 100", "i", 1)],
        );
        let hooks = hooks(vec![contract]);
        let state = vec![Message::tool_result("t1", "search", "short")];
        assert_eq!(hooks.post_hook(&state), PostHookOutput::no_instruction());
    }

    #[test]
    fn json_content_is_parsed() {
        let contract = Contract::new(
            "json_tool",
            "d",
            vec![Rule::new(
                "r",
                "json rule",
                "tool_output['key'] == 'value'",
                "json_instruction",
                1,
            )],
        );
        let hooks = hooks(vec![contract]);
        let state = vec![Message::tool_result("t1", "json_tool", r#"{"key": "value"}"#)];
        let output = hooks.post_hook(&state);
        assert!(output.additional_instruction.ends_with("json_instruction"));
    }

    #[test]
    fn invalid_json_is_passed_as_text() {
        assert_eq!(parse_tool_output("{key: 'value'}"), serde_json::json!("{key: 'value'}"));
        assert_eq!(parse_tool_output("[1, 2]"), serde_json::json!([1, 2]));

        let contract = Contract::new(
            "invalid_json_tool",
            "d",
            vec![Rule::new("r", "d", "isinstance(tool_output, str)", "text", 1)],
        );
        let hooks = hooks(vec![contract]);
        let state = vec![Message::tool_result("t1", "invalid_json_tool", "{key: 'value'}")];
        assert!(hooks.post_hook(&state).triggered_rule.is_some());
    }

    #[test]
    fn only_latest_tool_result_is_checked() {
        let hooks = hooks(vec![always("tool1", "d", "stale")]);
        let state = vec![
            Message::tool_result("t1", "tool1", "first"),
            Message::tool_result("t2", "tool2", "second"),
        ];
        assert!(hooks.post_hook(&state).triggered_rule.is_none());
    }

    #[test]
    fn tool_definitions_are_mandatory() {
        let definitions = hooks(vec![]).tool_definitions();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].name, INIT_HOOK_NAME);
        assert_eq!(definitions[1].name, POST_HOOK_NAME);
        for definition in &definitions {
            assert!(definition.description.contains("MANDATORY"));
            assert!(definition.description.contains(&definition.name));
        }
    }

    #[test]
    fn outputs_serialize_with_snake_case_keys() {
        let json = serde_json::to_value(PostHookOutput::no_instruction()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "additional_instruction": "No further instruction.",
                "triggered_rule": null
            })
        );
    }
}
