use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::rchain::ai::AIMessage;
use crate::rchain::chat_runtime::{RequestFailure, RetryPolicy, post_with_retry};
use crate::rchain::provider::{Provider, ProviderError, Usage, endpoint, resolve_api_key};
use crate::rchain::tools::{ToolCall, ToolDefinition};

/// Anything that can complete a tool-calling chat turn.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolDefinition],
    ) -> Result<AIMessage, ProviderError>;
}

/// Supported role values in chat requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// One message of the request sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMessage {
    pub role: MessageRole,
    pub content: String,
    pub tool_call_id: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelMessage {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, content)
    }

    /// Echoes a model reply back into the request so tool results can follow it.
    pub fn assistant_from_ai(message: &AIMessage) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: message.content.clone(),
            tool_call_id: None,
            tool_calls: message.tool_calls.clone(),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("role".to_string(), json!(self.role.as_str()));
        let content = if self.content.is_empty() && !self.tool_calls.is_empty() {
            Value::Null
        } else {
            Value::String(self.content.clone())
        };
        map.insert("content".to_string(), content);
        if let Some(tool_call_id) = &self.tool_call_id {
            map.insert("tool_call_id".to_string(), json!(tool_call_id));
        }
        if !self.tool_calls.is_empty() {
            map.insert(
                "tool_calls".to_string(),
                Value::Array(self.tool_calls.iter().map(ToolCall::to_json).collect()),
            );
        }
        Value::Object(map)
    }
}

/// Sampling and transport knobs for [`ChatModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub retry: RetryPolicy,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Chat-completions client for any supported provider.
#[derive(Clone)]
pub struct ChatModel {
    provider: Provider,
    model: String,
    api_key: String,
    options: ModelOptions,
    client: reqwest::Client,
}

impl fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatModel")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ChatModel {
    /// Creates a client; `credential` overrides the provider's API key env var.
    pub fn new(
        provider: Provider,
        model: impl Into<String>,
        credential: Option<&str>,
        options: ModelOptions,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            provider,
            model: model.into(),
            api_key: resolve_api_key(provider, credential)?,
            options,
            client: reqwest::Client::new(),
        })
    }

    /// Builds the request body without sending it.
    pub fn request_payload(&self, messages: &[ModelMessage], tools: &[ToolDefinition]) -> Value {
        build_payload(&self.model, self.options, messages, tools)
    }
}

pub fn build_payload(
    model: &str,
    options: ModelOptions,
    messages: &[ModelMessage],
    tools: &[ToolDefinition],
) -> Value {
    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(model));
    payload.insert(
        "messages".to_string(),
        Value::Array(messages.iter().map(ModelMessage::to_json).collect()),
    );
    payload.insert("temperature".to_string(), json!(options.temperature));
    if let Some(max_tokens) = options.max_tokens {
        payload.insert("max_tokens".to_string(), json!(max_tokens));
    }
    if !tools.is_empty() {
        payload.insert(
            "tools".to_string(),
            Value::Array(tools.iter().map(ToolDefinition::to_json).collect()),
        );
    }
    Value::Object(payload)
}

#[async_trait]
impl ChatBackend for ChatModel {
    async fn complete(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolDefinition],
    ) -> Result<AIMessage, ProviderError> {
        let provider = self.provider;
        let payload = self.request_payload(messages, tools);
        debug!(%provider, model = %self.model, messages = messages.len(), "chat completion");

        let response = post_with_retry(
            &self.client,
            endpoint(provider),
            &self.api_key,
            &payload,
            self.options.retry,
        )
        .await
        .map_err(|failure| match failure {
            RequestFailure::Request(source) => ProviderError::Request { provider, source },
            RequestFailure::Api { status, body } => ProviderError::Api {
                provider,
                status,
                body,
            },
        })?;

        let body: Value = response
            .json()
            .await
            .map_err(|source| ProviderError::Request { provider, source })?;
        parse_completion(provider, &body)
    }
}

fn parse_completion(provider: Provider, body: &Value) -> Result<AIMessage, ProviderError> {
    let message = &body["choices"][0]["message"];
    let content = message["content"].as_str().unwrap_or("").to_string();
    let tool_calls = ToolCall::parse_all(message);
    if content.trim().is_empty() && tool_calls.is_empty() {
        return Err(ProviderError::EmptyResponse { provider });
    }

    let usage = body.get("usage").filter(|usage| usage.is_object()).map(|usage| Usage {
        prompt_tokens: read_u32(&usage["prompt_tokens"]),
        completion_tokens: read_u32(&usage["completion_tokens"]),
        total_tokens: read_u32(&usage["total_tokens"]),
    });

    Ok(AIMessage {
        content,
        tool_calls,
        usage,
    })
}

fn read_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|value| u32::try_from(value).ok())
}
