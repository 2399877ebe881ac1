use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::events::{AgentStep, StepSink};
use crate::agent::memory::ConversationMemory;
use crate::agent::prompt::tool_instructions;
use crate::agent::{AgentError, AgentOutput, AgentRequest, SqlAgent};
use crate::rchain::chat_models::{ChatBackend, ModelMessage};
use crate::rchain::provider::Usage;
use crate::rchain::tools::{ToolCall, ToolDefinition, ToolParam};
use crate::sql::SqlDatabase;

const LIST_TABLES: &str = "list_tables";
const DESCRIBE_TABLES: &str = "describe_tables";
const QUERY_SQL: &str = "query_sql";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSettings {
    /// Model round-trips allowed before the invocation fails.
    pub max_iterations: usize,
    /// Rows of a query result shown to the model.
    pub max_rows: usize,
    /// Log every step at info level instead of debug.
    pub verbose: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_rows: 50,
            verbose: false,
        }
    }
}

/// SQL agent driving a tool-calling chat model against one database.
pub struct ToolCallingSqlAgent {
    backend: Arc<dyn ChatBackend>,
    database: SqlDatabase,
    system_prompt: String,
    memory: Arc<ConversationMemory>,
    settings: AgentSettings,
    tools: Vec<ToolDefinition>,
}

impl ToolCallingSqlAgent {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        database: SqlDatabase,
        prefix: &str,
        memory: Arc<ConversationMemory>,
        settings: AgentSettings,
    ) -> Self {
        let system_prompt = format!(
            "{prefix}\n\n{}",
            tool_instructions(database.dialect().as_str(), settings.max_rows)
        );
        Self {
            backend,
            database,
            system_prompt,
            memory,
            settings,
            tools: sql_tools(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn database(&self) -> &SqlDatabase {
        &self.database
    }

    fn emit(&self, sink: &dyn StepSink, step: AgentStep) {
        if self.settings.verbose {
            info!(step = %step, "agent");
        }
        sink.record(step);
    }

    async fn run_tool(&self, call: &ToolCall) -> Result<String, String> {
        match call.name.as_str() {
            LIST_TABLES => self
                .database
                .usable_table_names()
                .await
                .map(|tables| tables.join(", "))
                .map_err(|err| err.to_string()),
            DESCRIBE_TABLES => {
                let raw = required_arg(call, "tables")?;
                let tables: Vec<&str> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|table| !table.is_empty())
                    .collect();
                if tables.is_empty() {
                    return Err("no table names given".to_string());
                }
                self.database
                    .table_info(&tables)
                    .await
                    .map_err(|err| err.to_string())
            }
            QUERY_SQL => {
                let query = required_arg(call, "query")?;
                self.database
                    .run_read_only(query, self.settings.max_rows)
                    .await
                    .map_err(|err| err.to_string())
            }
            other => Err(format!(
                "unknown tool '{other}'. Available tools: {LIST_TABLES}, {DESCRIBE_TABLES}, {QUERY_SQL}"
            )),
        }
    }
}

#[async_trait]
impl SqlAgent for ToolCallingSqlAgent {
    async fn invoke(
        &self,
        request: AgentRequest<'_>,
        sink: &dyn StepSink,
    ) -> Result<AgentOutput, AgentError> {
        let AgentRequest {
            input,
            conversation_id,
        } = request;
        self.emit(
            sink,
            AgentStep::ChainStarted {
                input: input.to_string(),
            },
        );

        let mut messages = vec![ModelMessage::system(&self.system_prompt)];
        messages.extend(self.memory.history(conversation_id));
        messages.push(ModelMessage::user(input));

        let mut usage = Usage::default();
        for iteration in 0..self.settings.max_iterations {
            debug!(%conversation_id, iteration, "agent iteration");
            let reply = match self.backend.complete(&messages, &self.tools).await {
                Ok(reply) => reply,
                Err(err) => {
                    self.emit(sink, AgentStep::Error { message: err.to_string() });
                    return Err(err.into());
                }
            };

            if let Some(reply_usage) = &reply.usage {
                usage.accumulate(reply_usage);
            }

            if !reply.wants_tools() {
                info!(
                    %conversation_id,
                    iterations = iteration + 1,
                    prompt_tokens = ?usage.prompt_tokens,
                    completion_tokens = ?usage.completion_tokens,
                    total_tokens = ?usage.total_tokens,
                    "agent answered"
                );
                let output = reply.content.trim().to_string();
                self.emit(sink, AgentStep::ChainEnded { output: output.clone() });
                self.memory.remember(conversation_id, input, &output);
                return Ok(AgentOutput { output });
            }

            messages.push(ModelMessage::assistant_from_ai(&reply));
            for call in &reply.tool_calls {
                self.emit(
                    sink,
                    AgentStep::ToolInvoked {
                        tool: call.name.clone(),
                        input: trace_input(call),
                    },
                );
                let content = match self.run_tool(call).await {
                    Ok(output) => {
                        self.emit(
                            sink,
                            AgentStep::ToolResult {
                                tool: call.name.clone(),
                                output: output.clone(),
                            },
                        );
                        output
                    }
                    Err(message) => {
                        self.emit(sink, AgentStep::Error { message: message.clone() });
                        format!("Error: {message}")
                    }
                };
                messages.push(ModelMessage::tool_result(&call.id, content));
            }
        }

        let err = AgentError::IterationLimit(self.settings.max_iterations);
        self.emit(sink, AgentStep::Error { message: err.to_string() });
        Err(err)
    }

    fn forget(&self, conversation_id: Uuid) {
        self.memory.forget(conversation_id);
    }
}

/// Tool declarations bound to the model.
pub fn sql_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            LIST_TABLES,
            "List the tables of the database, comma separated. Takes no arguments.",
        ),
        ToolDefinition::new(
            DESCRIBE_TABLES,
            "Show the schema and three sample rows of the given tables. \
             Call list_tables first to be sure the tables exist.",
        )
        .with_param(ToolParam::required(
            "tables",
            "Comma separated table names, e.g. 'Artist, Album'",
        )),
        ToolDefinition::new(
            QUERY_SQL,
            "Run one read-only SQL query and return the rows. On error, rewrite the query and \
             try again. Cast NUMERIC columns to float or text.",
        )
        .with_param(ToolParam::required("query", "A single SELECT statement")),
    ]
}

fn required_arg<'a>(call: &'a ToolCall, key: &str) -> Result<&'a str, String> {
    call.str_arg(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| format!("missing required argument '{key}'"))
}

fn trace_input(call: &ToolCall) -> String {
    let key = match call.name.as_str() {
        QUERY_SQL => "query",
        DESCRIBE_TABLES => "tables",
        _ => return call.args_as_string(),
    };
    call.str_arg(key)
        .map(str::to_string)
        .unwrap_or_else(|| call.args_as_string())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;
    use uuid::Uuid;

    use super::{AgentSettings, ToolCallingSqlAgent};
    use crate::agent::events::AgentStep;
    use crate::agent::memory::ConversationMemory;
    use crate::agent::prompt::SYSTEM_PROMPT;
    use crate::agent::recorder::StepRecorder;
    use crate::agent::{AgentError, AgentRequest, SqlAgent};
    use crate::rchain::ai::AIMessage;
    use crate::rchain::chat_models::{ChatBackend, MessageRole, ModelMessage};
    use crate::rchain::provider::{Provider, ProviderError};
    use crate::rchain::tools::{ToolCall, ToolDefinition};
    use crate::sql::test_support::music_store;

    /// Replays canned replies and keeps every request it saw.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Option<AIMessage>>>,
        requests: Mutex<Vec<Vec<ModelMessage>>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Option<AIMessage>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<Vec<ModelMessage>> {
            self.requests.lock().expect("requests").clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(
            &self,
            messages: &[ModelMessage],
            _tools: &[ToolDefinition],
        ) -> Result<AIMessage, ProviderError> {
            self.requests.lock().expect("requests").push(messages.to_vec());
            self.replies
                .lock()
                .expect("replies")
                .pop_front()
                .flatten()
                .ok_or(ProviderError::EmptyResponse {
                    provider: Provider::Openai,
                })
        }
    }

    fn call(id: &str, name: &str, args: serde_json::Value) -> AIMessage {
        AIMessage::with_tool_calls(vec![ToolCall::new(id, name, args)])
    }

    async fn agent(backend: Arc<ScriptedBackend>, settings: AgentSettings) -> ToolCallingSqlAgent {
        ToolCallingSqlAgent::new(
            backend,
            music_store().await,
            SYSTEM_PROMPT,
            Arc::new(ConversationMemory::default()),
            settings,
        )
    }

    #[tokio::test]
    async fn single_query_produces_four_steps_in_order() {
        let backend = ScriptedBackend::new(vec![
            Some(call(
                "c1",
                "query_sql",
                json!({"query": "SELECT Name FROM Artist WHERE ArtistId = 1"}),
            )),
            Some(AIMessage::text("The top artist is AC/DC.")),
        ]);
        let agent = agent(Arc::clone(&backend), AgentSettings::default()).await;
        let recorder = StepRecorder::new();

        let output = agent
            .invoke(
                AgentRequest {
                    input: "Top 5 best-selling artists?",
                    conversation_id: Uuid::new_v4(),
                },
                &recorder,
            )
            .await
            .expect("answer");

        assert_eq!(output.output, "The top artist is AC/DC.");
        assert_eq!(
            recorder.snapshot(),
            vec![
                AgentStep::ChainStarted {
                    input: "Top 5 best-selling artists?".to_string()
                },
                AgentStep::ToolInvoked {
                    tool: "query_sql".to_string(),
                    input: "SELECT Name FROM Artist WHERE ArtistId = 1".to_string(),
                },
                AgentStep::ToolResult {
                    tool: "query_sql".to_string(),
                    output: "Name\nAC/DC\n".to_string(),
                },
                AgentStep::ChainEnded {
                    output: "The top artist is AC/DC.".to_string()
                },
            ]
        );

        let second_request = &backend.requests()[1];
        let tool_message = second_request.last().expect("tool result");
        assert_eq!(tool_message.role, MessageRole::Tool);
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn rejected_write_is_reported_and_fed_back() {
        let backend = ScriptedBackend::new(vec![
            Some(call("c1", "query_sql", json!({"query": "DROP TABLE Artist"}))),
            Some(AIMessage::text("I can only read data.")),
        ]);
        let agent = agent(Arc::clone(&backend), AgentSettings::default()).await;
        let recorder = StepRecorder::new();

        let output = agent
            .invoke(
                AgentRequest {
                    input: "Drop the artists",
                    conversation_id: Uuid::new_v4(),
                },
                &recorder,
            )
            .await
            .expect("answer");

        assert_eq!(output.output, "I can only read data.");
        let steps = recorder.snapshot();
        assert!(matches!(&steps[2], AgentStep::Error { message } if message.contains("Query rejected")));
        let fed_back = &backend.requests()[1];
        assert!(fed_back.last().expect("tool").content.starts_with("Error: Query rejected"));

        let tables = agent.database().usable_table_names().await.expect("tables");
        assert!(tables.contains(&"Artist".to_string()));
    }

    #[tokio::test]
    async fn list_and_describe_tools_read_the_schema() {
        let backend = ScriptedBackend::new(vec![
            Some(call("c1", "list_tables", json!({}))),
            Some(call("c2", "describe_tables", json!({"tables": "Album"}))),
            Some(AIMessage::text("done")),
        ]);
        let agent = agent(Arc::clone(&backend), AgentSettings::default()).await;
        let recorder = StepRecorder::with_output_limit(10_000);

        agent
            .invoke(
                AgentRequest {
                    input: "What tables exist?",
                    conversation_id: Uuid::new_v4(),
                },
                &recorder,
            )
            .await
            .expect("answer");

        let steps = recorder.snapshot();
        assert_eq!(
            steps[2],
            AgentStep::ToolResult {
                tool: "list_tables".to_string(),
                output: "Album, Artist".to_string(),
            }
        );
        assert!(matches!(&steps[4], AgentStep::ToolResult { output, .. } if output.contains("CREATE TABLE Album")));
    }

    #[tokio::test]
    async fn model_failure_is_recorded_and_returned() {
        let backend = ScriptedBackend::new(vec![None]);
        let agent = agent(backend, AgentSettings::default()).await;
        let recorder = StepRecorder::new();

        let err = agent
            .invoke(
                AgentRequest {
                    input: "hello",
                    conversation_id: Uuid::new_v4(),
                },
                &recorder,
            )
            .await
            .expect_err("failure");

        assert!(matches!(err, AgentError::Model(_)));
        assert!(matches!(recorder.snapshot().last(), Some(AgentStep::Error { .. })));
    }

    #[tokio::test]
    async fn iteration_limit_stops_tool_loops() {
        let backend = ScriptedBackend::new(vec![
            Some(call("c1", "list_tables", json!({}))),
            Some(call("c2", "list_tables", json!({}))),
            Some(AIMessage::text("never reached")),
        ]);
        let settings = AgentSettings {
            max_iterations: 2,
            ..AgentSettings::default()
        };
        let agent = agent(backend, settings).await;

        let err = agent
            .invoke(
                AgentRequest {
                    input: "loop",
                    conversation_id: Uuid::new_v4(),
                },
                &StepRecorder::new(),
            )
            .await
            .expect_err("limit");
        assert!(matches!(err, AgentError::IterationLimit(2)));
    }

    #[tokio::test]
    async fn memory_replays_earlier_turns_of_the_same_conversation() {
        let backend = ScriptedBackend::new(vec![
            Some(AIMessage::text("There are 3 artists.")),
            Some(AIMessage::text("AC/DC, Accept and one unnamed.")),
            Some(AIMessage::text("fresh")),
        ]);
        let agent = agent(Arc::clone(&backend), AgentSettings::default()).await;
        let conversation_id = Uuid::new_v4();
        let sink = StepRecorder::new();

        for input in ["How many artists?", "Name them"] {
            agent
                .invoke(AgentRequest { input, conversation_id }, &sink)
                .await
                .expect("answer");
        }
        agent
            .invoke(
                AgentRequest {
                    input: "Other chat",
                    conversation_id: Uuid::new_v4(),
                },
                &sink,
            )
            .await
            .expect("answer");

        let requests = backend.requests();
        // system + user
        assert_eq!(requests[0].len(), 2);
        // system + remembered pair + user
        assert_eq!(requests[1].len(), 4);
        assert_eq!(requests[1][1], ModelMessage::user("How many artists?"));
        assert_eq!(requests[1][2], ModelMessage::assistant("There are 3 artists."));
        assert_eq!(requests[2].len(), 2);
    }

    #[tokio::test]
    async fn unknown_tool_and_missing_argument_become_tool_errors() {
        let backend = ScriptedBackend::new(vec![
            Some(AIMessage::with_tool_calls(vec![
                ToolCall::new("c1", "drop_everything", json!({})),
                ToolCall::new("c2", "query_sql", json!({})),
            ])),
            Some(AIMessage::text("ok")),
        ]);
        let agent = agent(Arc::clone(&backend), AgentSettings::default()).await;
        let recorder = StepRecorder::new();
        agent
            .invoke(
                AgentRequest {
                    input: "?",
                    conversation_id: Uuid::new_v4(),
                },
                &recorder,
            )
            .await
            .expect("answer");

        let errors: Vec<String> = recorder
            .snapshot()
            .into_iter()
            .filter_map(|step| match step {
                AgentStep::Error { message } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("unknown tool 'drop_everything'"));
        assert_eq!(errors[1], "missing required argument 'query'");
    }

    #[tokio::test]
    async fn system_prompt_mentions_dialect() {
        let agent = agent(ScriptedBackend::new(Vec::new()), AgentSettings::default()).await;
        assert!(agent.system_prompt().starts_with(SYSTEM_PROMPT));
        assert!(agent.system_prompt().contains("sqlite database"));
        assert_eq!(agent.tools().len(), 3);
        assert!(agent.tools()[2].description.contains("Cast NUMERIC columns"));
    }
}
