//! `controlgate init | check`: run the agent hooks from the command line.

use super::{build_hooks, load_config};
use controlgate_core::Conversation;
use std::path::Path;

/// Print the init hook output.
pub fn init(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let hooks = build_hooks(&config);

    let output = hooks.init(&Conversation::new());
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Run the post hook over a recorded conversation.
pub fn check(
    config_path: Option<&Path>,
    conversation: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let hooks = build_hooks(&config);

    let json = std::fs::read_to_string(conversation)
        .map_err(|e| format!("Failed to read {}: {e}", conversation.display()))?;
    let conversation = Conversation::from_json(&json)?;

    let output = hooks.post_hook(&conversation);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
