use std::process;

use clap::Parser;
use sqlpipe::commands::ask::{self, AskArgs};

#[derive(Debug, Parser)]
#[command(
    name = "sqlask",
    about = "Ask one question about the music-store database",
    version = sqlpipe::VERSION
)]
struct Cli {
    #[command(flatten)]
    ask: AskArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = ask::run(cli.ask).await {
        eprintln!("{err}");
        process::exit(1);
    }
}
