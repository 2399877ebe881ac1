use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use sqlpipe::commands::ask::{self, AskArgs};
use sqlpipe::commands::chat::{self, ChatArgs};
use sqlpipe::commands::config::{self, ConfigArgs};
use sqlpipe::commands::tables::{self, TablesArgs};

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  sqlpipe chat --database sqlite:Chinook.db\n  sqlpipe ask --database \"$SUPABASE_URI\" \"Top 5 best-selling artists?\"\n  echo \"Total sales by genre?\" | sqlpipe ask --provider openai --model gpt-4o-mini\n  sqlpipe tables --database sqlite:Chinook.db\n  sqlpipe completion bash > ~/.local/share/bash-completion/completions/sqlpipe";

const ASK_HELP_EXAMPLES: &str = "Examples:\n  sqlpipe ask --database sqlite:Chinook.db \"How many customers from each country?\"\n  sqlpipe ask --profile supabase --show-steps \"Which tracks are over 5 minutes long?\"\n  sqlpipe ask --dry-run --json \"What are the most expensive albums?\"";

#[derive(Debug, Parser)]
#[command(
    name = "sqlpipe",
    about = "Chat with a SQL agent about the Chinook music-store database",
    version = sqlpipe::VERSION,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Start an interactive chat session")]
    Chat(ChatArgs),
    #[command(about = "Ask a single question", after_help = ASK_HELP_EXAMPLES)]
    Ask(AskArgs),
    #[command(about = "List the tables of the database")]
    Tables(TablesArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "sqlpipe", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "sqlpipe", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "sqlpipe", &mut io::stdout()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(args) => chat::run(args).await,
        Commands::Ask(args) => ask::run(args).await,
        Commands::Tables(args) => tables::run(args).await,
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}
