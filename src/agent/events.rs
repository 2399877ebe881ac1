use std::fmt;

use serde::{Deserialize, Serialize};

/// One observable event during a single agent invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentStep {
    ChainStarted { input: String },
    ChainEnded { output: String },
    ToolInvoked { tool: String, input: String },
    ToolResult { tool: String, output: String },
    Error { message: String },
}

impl fmt::Display for AgentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChainStarted { input } => write!(f, "chain started: {input}"),
            Self::ChainEnded { .. } => f.write_str("chain ended"),
            Self::ToolInvoked { tool, input } => write!(f, "tool {tool} <- {input}"),
            Self::ToolResult { tool, output } => write!(f, "tool {tool} -> {output}"),
            Self::Error { message } => write!(f, "error: {message}"),
        }
    }
}

/// Receiver for the agent's progress notifications.
///
/// Implementations must accept calls from any task; the agent never looks at
/// what the sink does with a step.
pub trait StepSink: Send + Sync {
    fn record(&self, step: AgentStep);
}
