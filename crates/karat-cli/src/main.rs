//! CLI entry point - the composition root.
//!
//! Parses arguments, bootstraps the supervisor and dispatches to handlers.
//! Errors carrying a `CliError` select the process exit code.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use karat_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() {
    // Load .env before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command.clone() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = CliConfig::from_cli(&cli)?;
    let ctx = bootstrap(config)?;

    match command {
        Commands::Paths => handlers::paths::execute(&ctx)?,
        Commands::Check => handlers::check::execute(&ctx)?,
        Commands::Init => handlers::init::execute(&ctx).await?,
        Commands::Run { show_password } => handlers::run::execute(&ctx, show_password).await?,
    }

    Ok(())
}
