use serde::Serialize;

use crate::agent::AgentStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Agent trace of the turn; only assistant messages carry one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<AgentStep>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            steps: Vec::new(),
            is_error: false,
        }
    }

    pub fn assistant(content: impl Into<String>, steps: Vec<AgentStep>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            steps,
            is_error: false,
        }
    }

    pub fn assistant_error(content: impl Into<String>, steps: Vec<AgentStep>) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(content, steps)
        }
    }
}
