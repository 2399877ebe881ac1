//! SQL agent: turns a question into read-only SQL, runs it and narrates the result.
//!
//! The agent reports its progress through a [`StepSink`]; callers usually pass a
//! [`StepRecorder`] and read it back once the invocation returns.

pub mod events;
pub mod memory;
pub mod prompt;
pub mod recorder;
pub mod sql_agent;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::rchain::provider::ProviderError;

pub use events::{AgentStep, StepSink};
pub use memory::ConversationMemory;
pub use recorder::{DEFAULT_TOOL_OUTPUT_LIMIT, StepRecorder};
pub use sql_agent::{AgentSettings, ToolCallingSqlAgent};

/// One question for the agent.
#[derive(Debug, Clone, Copy)]
pub struct AgentRequest<'a> {
    pub input: &'a str,
    /// Groups the turns of one conversation for the agent's memory.
    pub conversation_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentOutput {
    pub output: String,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ProviderError),
    #[error("agent stopped after {0} iterations without a final answer")]
    IterationLimit(usize),
}

/// Answers natural-language questions about a database.
#[async_trait]
pub trait SqlAgent: Send + Sync {
    async fn invoke(
        &self,
        request: AgentRequest<'_>,
        sink: &dyn StepSink,
    ) -> Result<AgentOutput, AgentError>;

    /// Drops whatever the agent remembers about a conversation.
    fn forget(&self, _conversation_id: Uuid) {}
}
