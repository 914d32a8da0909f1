//! Read-only view of an agent's conversation state.

use crate::message::{Conversation, Message};

/// Anything that exposes an ordered, append-only message history.
///
/// Hooks only ever read through this trait; they never mutate the host's
/// state.
pub trait AgentState {
    /// Messages in the order they were appended.
    fn messages(&self) -> &[Message];
}

impl AgentState for Conversation {
    fn messages(&self) -> &[Message] {
        &self.messages
    }
}

impl AgentState for [Message] {
    fn messages(&self) -> &[Message] {
        self
    }
}

impl AgentState for Vec<Message> {
    fn messages(&self) -> &[Message] {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_exposes_messages_in_order() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        conv.push(Message::tool_result("t1", "search", "found"));

        let messages = conv.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "found");
    }

    #[test]
    fn vec_and_slice_are_states() {
        let history = vec![Message::assistant("hello")];
        assert_eq!(AgentState::messages(&history).len(), 1);
        assert_eq!(AgentState::messages(history.as_slice()).len(), 1);
    }
}
