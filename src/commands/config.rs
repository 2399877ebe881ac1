use clap::{Args, Subcommand};

use crate::config;

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    /// Parse the config file and optionally check one profile
    Check {
        #[arg(long)]
        profile: Option<String>,
    },
    /// Print the config file location
    Path,
}

pub fn run(args: ConfigArgs) -> Result<(), String> {
    match args.command {
        ConfigSubcommand::Check { profile } => {
            let path = config::validate_config(profile.as_deref()).map_err(|err| err.to_string())?;
            println!("config OK: {}", path.display());
        }
        ConfigSubcommand::Path => {
            let path = config::config_path().map_err(|err| err.to_string())?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
