use serde::{Deserialize, Serialize};

use super::tool::{ToolCallRequest, ToolCallResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool_result(call: &ToolCallRequest, result: &ToolCallResult) -> Self {
        Self {
            role: Role::Tool,
            content: result.to_message_content(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call.id.clone()),
            tool_name: Some(call.name.clone()),
        }
    }
}

/// Append-only message history of one conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Every assistant tool call is answered by exactly one `tool` message,
    /// immediately after it and in request order, and no `tool` message
    /// appears without such a call.
    pub fn is_well_formed(&self) -> bool {
        let messages = &self.messages;
        let mut index = 0;

        while index < messages.len() {
            let message = &messages[index];
            match message.role {
                Role::Tool => return false,
                Role::Assistant if !message.tool_calls.is_empty() => {
                    for (offset, call) in message.tool_calls.iter().enumerate() {
                        match messages.get(index + 1 + offset) {
                            Some(reply)
                                if reply.role == Role::Tool
                                    && reply.tool_call_id.as_deref() == Some(call.id.as_str()) => {}
                            _ => return false,
                        }
                    }
                    index += 1 + message.tool_calls.len();
                    continue;
                }
                _ => {}
            }
            index += 1;
        }

        true
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
