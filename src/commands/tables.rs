use clap::Args;

use crate::commands::common::{self, ConnectionArgs};
use crate::logging;

#[derive(Debug, Args, Clone)]
pub struct TablesArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Print the names as a JSON array
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: TablesArgs) -> Result<(), String> {
    logging::init(args.connection.verbose, args.connection.quiet);
    let settings = common::resolve(&args.connection)?;
    let database = common::connect_database(&settings).await?;
    let tables = database
        .usable_table_names()
        .await
        .map_err(|err| format!("Failed to read tables: {err}"))?;

    if args.json {
        println!("{}", serde_json::json!(tables));
    } else {
        for table in tables {
            println!("{table}");
        }
    }
    Ok(())
}
