use std::io::Write;
use std::sync::Arc;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::agent::prompt::EXAMPLE_QUESTIONS;
use crate::agent::{ConversationMemory, SqlAgent, ToolCallingSqlAgent};
use crate::chat::{Session, SessionConfig};
use crate::commands::common::{self, ConnectionArgs, Settings};
use crate::commands::render;
use crate::logging;
use crate::rchain::provider::Provider;
use crate::sql::SqlDatabase;

const HELP: &str = "Commands:
  /help              show this help
  /examples          list example questions
  /example <n>       ask example question n
  /tables            list database tables
  /steps             show the trace of the last reply
  /model <id>        switch model
  /provider <name>   switch provider (openai, fireworks, gemini)
  /key <credential>  use this API key for the session (empty to unset)
  /clear             start a new conversation
  /quit              leave
Anything else is sent to the agent as a question.";

#[derive(Debug, Args, Clone)]
pub struct ChatArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Print the agent trace after every reply
    #[arg(long)]
    pub show_steps: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatCommand {
    Question(String),
    Help,
    Examples,
    Example(usize),
    Tables,
    Steps,
    Model(String),
    Provider(String),
    Key(Option<String>),
    Clear,
    Quit,
    Invalid(String),
}

impl ChatCommand {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(Self::Question(line.to_string()));
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        let parsed = match (name, rest) {
            ("help", _) => Self::Help,
            ("examples", _) => Self::Examples,
            ("example", n) => match n.parse::<usize>() {
                Ok(n) if (1..=EXAMPLE_QUESTIONS.len()).contains(&n) => Self::Example(n),
                _ => Self::Invalid(format!(
                    "Usage: /example <1-{}>",
                    EXAMPLE_QUESTIONS.len()
                )),
            },
            ("tables", _) => Self::Tables,
            ("steps", _) => Self::Steps,
            ("model", "") => Self::Invalid("Usage: /model <id>".to_string()),
            ("model", id) => Self::Model(id.to_string()),
            ("provider", "") => Self::Invalid("Usage: /provider <name>".to_string()),
            ("provider", provider) => Self::Provider(provider.to_string()),
            ("key", "") => Self::Key(None),
            ("key", key) => Self::Key(Some(key.to_string())),
            ("clear", _) => Self::Clear,
            ("quit" | "exit", _) => Self::Quit,
            (other, _) => Self::Invalid(format!("Unknown command '/{other}'. Type /help.")),
        };
        Some(parsed)
    }
}

struct ChatState {
    settings: Settings,
    database: SqlDatabase,
    memory: Arc<ConversationMemory>,
    agent: ToolCallingSqlAgent,
    session: Session,
    show_steps: bool,
}

impl ChatState {
    /// Applies a config change, keeping the previous agent when the new one cannot be built.
    fn reconfigure(&mut self, change: impl FnOnce(&mut SessionConfig)) {
        let previous = self.session.config().clone();
        change(self.session.config_mut());
        match common::build_agent(
            self.database.clone(),
            &self.settings,
            self.session.config(),
            Arc::clone(&self.memory),
        ) {
            Ok(agent) => {
                self.agent = agent;
                let config = self.session.config();
                render::print_notice(&format!("Using {} / {}.", config.provider, config.model));
            }
            Err(err) => {
                *self.session.config_mut() = previous;
                render::print_notice(&format!("Keeping previous settings: {err}"));
            }
        }
    }

    /// Returns false when the loop should stop.
    async fn handle(&mut self, command: ChatCommand) -> bool {
        match command {
            ChatCommand::Question(question) => self.ask(&question).await,
            ChatCommand::Example(n) => {
                let question = EXAMPLE_QUESTIONS[n - 1];
                println!("> {question}");
                self.ask(question).await;
            }
            ChatCommand::Help => println!("{HELP}"),
            ChatCommand::Examples => {
                for (index, question) in EXAMPLE_QUESTIONS.iter().enumerate() {
                    println!("  {}. {question}", index + 1);
                }
            }
            ChatCommand::Tables => match self.database.usable_table_names().await {
                Ok(tables) => println!("Tables available: {}", tables.join(", ")),
                Err(err) => render::print_notice(&err.to_string()),
            },
            ChatCommand::Steps => match self.session.last_reply() {
                Some(reply) => render::print_steps(&reply.steps),
                None => render::print_notice("No reply yet."),
            },
            ChatCommand::Model(model) => self.reconfigure(|config| config.model = model),
            ChatCommand::Provider(name) => match name.parse::<Provider>() {
                Ok(provider) => self.reconfigure(|config| {
                    config.provider = provider;
                    config.model = provider.default_model().to_string();
                }),
                Err(err) => render::print_notice(&err),
            },
            ChatCommand::Key(credential) => self.reconfigure(|config| config.credential = credential),
            ChatCommand::Clear => {
                let previous = self.session.clear();
                self.agent.forget(previous);
                render::print_notice("Conversation cleared.");
            }
            ChatCommand::Invalid(message) => render::print_notice(&message),
            ChatCommand::Quit => return false,
        }
        true
    }

    async fn ask(&mut self, question: &str) {
        let reply = self.session.ask(&self.agent, question).await;
        if self.show_steps {
            render::print_steps(&reply.steps);
        }
        render::print_reply(reply);
    }
}

pub async fn run(args: ChatArgs) -> Result<(), String> {
    logging::init(args.connection.verbose, args.connection.quiet);
    let settings = common::resolve(&args.connection)?;

    let database = common::connect_database(&settings).await?;
    let tables = database
        .usable_table_names()
        .await
        .map_err(|err| format!("Failed to read tables: {err}"))?;

    let memory = Arc::new(ConversationMemory::default());
    let session = Session::new(settings.session_config(), settings.tool_output_limit);
    let agent = common::build_agent(database.clone(), &settings, session.config(), Arc::clone(&memory))?;

    println!("Connected to {}", database.display_uri());
    println!("Tables available: {}", tables.join(", "));
    println!("Type a question, /examples for ideas or /help for commands.");

    let mut state = ChatState {
        show_steps: args.show_steps || settings.show_steps,
        settings,
        database,
        memory,
        agent,
        session,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "failed to read stdin");
                break;
            }
        };
        let Some(command) = ChatCommand::parse(&line) else {
            continue;
        };
        if !state.handle(command).await {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ChatCommand;

    #[test]
    fn plain_lines_are_questions() {
        assert_eq!(
            ChatCommand::parse("  Top 5 best-selling artists? "),
            Some(ChatCommand::Question("Top 5 best-selling artists?".to_string()))
        );
        assert_eq!(ChatCommand::parse("   "), None);
    }

    #[test]
    fn slash_commands_parse_arguments() {
        assert_eq!(
            ChatCommand::parse("/model gpt-4o-mini"),
            Some(ChatCommand::Model("gpt-4o-mini".to_string()))
        );
        assert_eq!(ChatCommand::parse("/key"), Some(ChatCommand::Key(None)));
        assert_eq!(
            ChatCommand::parse("/key abc"),
            Some(ChatCommand::Key(Some("abc".to_string())))
        );
        assert_eq!(ChatCommand::parse("/example 2"), Some(ChatCommand::Example(2)));
        assert_eq!(ChatCommand::parse("/exit"), Some(ChatCommand::Quit));
        assert_eq!(ChatCommand::parse("/clear"), Some(ChatCommand::Clear));
    }

    #[test]
    fn bad_commands_are_reported_not_sent() {
        assert!(matches!(ChatCommand::parse("/example 99"), Some(ChatCommand::Invalid(_))));
        assert!(matches!(ChatCommand::parse("/model"), Some(ChatCommand::Invalid(_))));
        assert!(matches!(ChatCommand::parse("/drop"), Some(ChatCommand::Invalid(message)) if message.contains("/drop")));
    }
}
