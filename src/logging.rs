use std::io::IsTerminal;

use tracing_subscriber::{EnvFilter, fmt};

/// Installs the stderr subscriber. `RUST_LOG` wins over the CLI flags.
pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if quiet {
            "error"
        } else if verbose {
            "info,sqlpipe=debug,sqlx=warn,hyper=info,reqwest=info"
        } else {
            "warn"
        })
    });

    // a second init in the same process (tests) is not an error
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(stderr_supports_color())
        .with_target(verbose)
        .without_time()
        .try_init();
}

/// Same rule as the reply colors: a terminal, and `NO_COLOR` unset.
fn stderr_supports_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}
