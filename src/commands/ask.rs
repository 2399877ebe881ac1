use std::io::{self, IsTerminal, Read};
use std::sync::Arc;

use clap::Args;
use serde_json::json;

use crate::agent::ConversationMemory;
use crate::agent::prompt::SYSTEM_PROMPT;
use crate::agent::sql_agent::sql_tools;
use crate::chat::{ChatMessage, Session};
use crate::commands::common::{self, ConnectionArgs, OutputMode, Settings};
use crate::commands::render;
use crate::logging;
use crate::rchain::provider::is_api_key_present;
use crate::sql::database::redact_uri;

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Output format
    #[arg(long, value_enum)]
    pub output: Option<OutputMode>,
    /// Shorthand for --output json
    #[arg(long)]
    pub json: bool,
    /// Print the agent trace on stderr
    #[arg(long)]
    pub show_steps: bool,
    /// Print the planned request without contacting the model or the database
    #[arg(long)]
    pub dry_run: bool,
    /// Question about the database; read from stdin when omitted
    pub question: Option<String>,
}

pub async fn run(args: AskArgs) -> Result<(), String> {
    logging::init(args.connection.verbose, args.connection.quiet);
    let settings = common::resolve(&args.connection)?;
    let question = read_question(args.question.as_deref())?;
    let output = output_mode(&args, &settings);
    let show_steps = (args.show_steps || settings.show_steps) && !args.connection.quiet;

    if args.dry_run {
        print_dry_run(&settings, &question, output);
        return Ok(());
    }

    let database = common::connect_database(&settings).await?;
    let mut session = Session::new(settings.session_config(), settings.tool_output_limit);
    let agent = common::build_agent(
        database,
        &settings,
        session.config(),
        Arc::new(ConversationMemory::default()),
    )?;

    let conversation_id = session.conversation_id();
    let reply = session.ask(&agent, &question).await;

    if show_steps {
        render::print_steps(&reply.steps);
    }
    match output {
        OutputMode::Text => println!("{}", reply.content),
        OutputMode::Json => println!("{}", reply_json(&question, conversation_id, reply)),
    }

    if reply.is_error {
        return Err("Question could not be answered.".to_string());
    }
    Ok(())
}

fn read_question(argument: Option<&str>) -> Result<String, String> {
    if let Some(question) = argument.map(str::trim).filter(|value| !value.is_empty()) {
        return Ok(question.to_string());
    }

    let stdin = io::stdin();
    if !stdin.is_terminal() {
        let mut buffer = String::new();
        stdin
            .lock()
            .read_to_string(&mut buffer)
            .map_err(|err| format!("Failed to read stdin: {err}"))?;
        let trimmed = buffer.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    Err("No question provided. Pass it as an argument or pipe it on stdin.".to_string())
}

fn output_mode(args: &AskArgs, settings: &Settings) -> OutputMode {
    if args.json {
        return OutputMode::Json;
    }
    args.output.or(settings.output).unwrap_or(OutputMode::Text)
}

fn print_dry_run(settings: &Settings, question: &str, output: OutputMode) {
    let tools: Vec<String> = sql_tools().into_iter().map(|tool| tool.name).collect();
    let body = json!({
        "dry_run": true,
        "provider": settings.provider,
        "model": settings.model,
        "database": settings.database.as_deref().map(redact_uri),
        "api_key_present": is_api_key_present(settings.provider, None),
        "temperature": settings.model_options.temperature,
        "max_tokens": settings.model_options.max_tokens,
        "timeout": settings.model_options.retry.timeout_secs,
        "retries": settings.model_options.retry.retries,
        "max_iterations": settings.agent.max_iterations,
        "max_rows": settings.agent.max_rows,
        "tool_output_limit": settings.tool_output_limit,
        "output": output.as_str(),
        "tools": tools,
        "system_prompt": SYSTEM_PROMPT,
        "question": question,
    });
    println!("{body}");
}

fn reply_json(question: &str, conversation_id: uuid::Uuid, reply: &ChatMessage) -> serde_json::Value {
    json!({
        "question": question,
        "conversation_id": conversation_id,
        "answer": reply.content,
        "is_error": reply.is_error,
        "steps": reply.steps,
    })
}
