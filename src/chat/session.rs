use std::fmt;

use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::{AgentRequest, SqlAgent, StepRecorder};
use crate::chat::message::{ChatMessage, Role};
use crate::rchain::provider::Provider;

/// User-editable settings of one session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub provider: Provider,
    pub model: String,
    pub credential: Option<String>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("credential", &self.credential.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Everything one conversation owns: transcript, trace recorder, correlation id
/// and settings. Handlers receive it explicitly; nothing here is global.
#[derive(Debug)]
pub struct Session {
    conversation_id: Uuid,
    transcript: Vec<ChatMessage>,
    recorder: StepRecorder,
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig, tool_output_limit: usize) -> Self {
        Self {
            conversation_id: Uuid::new_v4(),
            transcript: Vec::new(),
            recorder: StepRecorder::with_output_limit(tool_output_limit),
            config,
        }
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    /// Most recent assistant reply, if any.
    pub fn last_reply(&self) -> Option<&ChatMessage> {
        self.transcript
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }

    /// Runs one turn: the question and exactly one reply are appended.
    ///
    /// Agent failures become an error reply so the session stays usable.
    /// `&mut self` keeps two turns of the same session from overlapping, which
    /// would mix their traces in the shared recorder.
    pub async fn ask(&mut self, agent: &dyn SqlAgent, query: &str) -> &ChatMessage {
        self.transcript.push(ChatMessage::user(query));
        self.recorder.reset();

        let request = AgentRequest {
            input: query,
            conversation_id: self.conversation_id,
        };
        let result = agent.invoke(request, &self.recorder).await;
        let steps = self.recorder.snapshot();

        let reply = match result {
            Ok(output) => ChatMessage::assistant(output.output, steps),
            Err(err) => {
                warn!(conversation_id = %self.conversation_id, error = %err, "agent invocation failed");
                ChatMessage::assistant_error(format!("Error processing request: {err}"), steps)
            }
        };
        self.transcript.push(reply);
        &self.transcript[self.transcript.len() - 1]
    }

    /// Empties the transcript and starts a new conversation id. Returns the old id.
    pub fn clear(&mut self) -> Uuid {
        let previous = self.conversation_id;
        self.transcript.clear();
        self.recorder.reset();
        while self.conversation_id == previous {
            self.conversation_id = Uuid::new_v4();
        }
        info!(%previous, current = %self.conversation_id, "conversation cleared");
        previous
    }
}
