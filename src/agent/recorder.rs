use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::agent::events::{AgentStep, StepSink};

/// Display cutoff for tool output kept in a trace, in characters.
pub const DEFAULT_TOOL_OUTPUT_LIMIT: usize = 500;

const TRUNCATION_MARKER: &str = "...";

/// Collects the steps of one agent invocation in emission order.
#[derive(Debug)]
pub struct StepRecorder {
    steps: Mutex<Vec<AgentStep>>,
    output_limit: usize,
}

impl Default for StepRecorder {
    fn default() -> Self {
        Self::with_output_limit(DEFAULT_TOOL_OUTPUT_LIMIT)
    }
}

impl StepRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_limit(output_limit: usize) -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            output_limit,
        }
    }

    /// Copy of the buffer; the buffer itself is left untouched.
    pub fn snapshot(&self) -> Vec<AgentStep> {
        self.lock().clone()
    }

    /// Must run before every invocation so earlier steps cannot leak into the next trace.
    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // pushes and clears are single calls, a poisoned buffer is still consistent
    fn lock(&self) -> MutexGuard<'_, Vec<AgentStep>> {
        self.steps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StepSink for StepRecorder {
    fn record(&self, step: AgentStep) {
        let step = match step {
            AgentStep::ToolResult { tool, output } => AgentStep::ToolResult {
                tool,
                output: truncate_chars(output, self.output_limit),
            },
            other => other,
        };
        debug!(step = %step, "agent step");
        self.lock().push(step);
    }
}

fn truncate_chars(text: String, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => {
            let mut truncated = text[..cut].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => text,
    }
}
