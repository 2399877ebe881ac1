use std::env;
use std::fmt;
use std::str::FromStr;

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Hosted chat-completions providers the agent can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openai,
    Fireworks,
    Gemini,
}

impl Provider {
    pub const SUPPORTED: &'static str = "openai, fireworks, gemini";

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Fireworks => "fireworks",
            Self::Gemini => "gemini",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Openai => "gpt-4o-mini",
            Self::Fireworks => "accounts/fireworks/models/kimi-k2-instruct-0905",
            Self::Gemini => "gemini-2.0-flash",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "fireworks" => Ok(Self::Fireworks),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(format!(
                "Unknown provider '{other}'. Supported values: {}.",
                Self::SUPPORTED
            )),
        }
    }
}

pub fn endpoint(provider: Provider) -> &'static str {
    match provider {
        Provider::Openai => "https://api.openai.com/v1/chat/completions",
        Provider::Fireworks => "https://api.fireworks.ai/inference/v1/chat/completions",
        Provider::Gemini => {
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        }
    }
}

pub fn api_key_env(provider: Provider) -> &'static str {
    match provider {
        Provider::Openai => "OPENAI_API_KEY",
        Provider::Fireworks => "FIREWORKS_API_KEY",
        Provider::Gemini => "GOOGLE_API_KEY",
    }
}

pub fn is_api_key_present(provider: Provider, credential: Option<&str>) -> bool {
    resolve_api_key(provider, credential).is_ok()
}

/// Picks the session credential when one was entered, else the provider's env var.
pub fn resolve_api_key(provider: Provider, credential: Option<&str>) -> Result<String, ProviderError> {
    if let Some(value) = credential.map(str::trim).filter(|value| !value.is_empty()) {
        return Ok(value.to_string());
    }

    let key_env = api_key_env(provider);
    env::var(key_env)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ProviderError::MissingApiKey { provider, key_env })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl Usage {
    /// Adds the counts of another reply; a count only one side reports is kept as is.
    pub fn accumulate(&mut self, other: &Usage) {
        self.prompt_tokens = add_counts(self.prompt_tokens, other.prompt_tokens);
        self.completion_tokens = add_counts(self.completion_tokens, other.completion_tokens);
        self.total_tokens = add_counts(self.total_tokens, other.total_tokens);
    }
}

fn add_counts(left: Option<u32>, right: Option<u32>) -> Option<u32> {
    match (left, right) {
        (Some(left), Some(right)) => Some(left.saturating_add(right)),
        (left, right) => left.or(right),
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{key_env} is not set in the environment and no credential was entered")]
    MissingApiKey {
        provider: Provider,
        key_env: &'static str,
    },
    #[error("{provider} request failed: {source}")]
    Request {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: Provider,
        status: StatusCode,
        body: String,
    },
    #[error("{provider} response did not contain message content")]
    EmptyResponse { provider: Provider },
}
