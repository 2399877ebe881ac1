use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::rchain::chat_models::ModelMessage;

const DEFAULT_MAX_TURNS: usize = 20;

/// Question/answer history per conversation, keyed by correlation id.
#[derive(Debug)]
pub struct ConversationMemory {
    turns: Mutex<HashMap<Uuid, Vec<(String, String)>>>,
    max_turns: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::with_max_turns(DEFAULT_MAX_TURNS)
    }
}

impl ConversationMemory {
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            turns: Mutex::new(HashMap::new()),
            max_turns,
        }
    }

    /// Earlier turns of the conversation as alternating user/assistant messages.
    pub fn history(&self, conversation: Uuid) -> Vec<ModelMessage> {
        self.lock()
            .get(&conversation)
            .map(|turns| {
                turns
                    .iter()
                    .flat_map(|(question, answer)| {
                        [ModelMessage::user(question), ModelMessage::assistant(answer)]
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn remember(&self, conversation: Uuid, question: &str, answer: &str) {
        let mut turns = self.lock();
        let entry = turns.entry(conversation).or_default();
        entry.push((question.to_string(), answer.to_string()));
        if entry.len() > self.max_turns {
            let excess = entry.len() - self.max_turns;
            entry.drain(..excess);
        }
    }

    pub fn forget(&self, conversation: Uuid) {
        self.lock().remove(&conversation);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Vec<(String, String)>>> {
        self.turns.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
