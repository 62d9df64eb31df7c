//! Run command handler.
//!
//! Starts the server, prints the connection string and keeps it running
//! until Ctrl-C or an unexpected exit, then stops it. Ctrl-C during startup
//! abandons the start and stops whatever was spawned.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use karat_core::DatabaseServer;
use tracing::{info, warn};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// How often the foreground loop checks that the server is still running.
const STATE_POLL: Duration = Duration::from_secs(1);

/// Execute the run command.
pub async fn execute(ctx: &CliContext, show_password: bool) -> Result<()> {
    let postgres = ctx.postgres();
    postgres.validate_binaries().map_err(CliError::from)?;

    if postgres.ensure_initialized().await.map_err(CliError::from)? {
        println!(
            "Initialized data directory at {}",
            postgres.config().data_directory.display()
        );
    }

    serve(ctx.server().as_ref(), show_password, shutdown_signal()).await
}

/// Start `server`, wait for `shutdown` or an unexpected exit, then stop it.
pub async fn serve<F>(server: &dyn DatabaseServer, show_password: bool, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let started = tokio::select! {
        biased;
        result = server.start() => Some(result),
        () = &mut shutdown => None,
    };
    match started {
        Some(result) => result.map_err(CliError::from)?,
        None => {
            info!("Shutdown requested during startup");
            server.stop().await;
            return Ok(());
        }
    }

    let connection = server.connection_config();
    if show_password {
        println!("{}", connection.connection_string());
    } else {
        println!("{}", connection.redacted_connection_string());
    }
    println!("PostgreSQL is running. Press Ctrl-C to stop.");

    let outcome = tokio::select! {
        () = &mut shutdown => {
            info!("Shutdown requested");
            Ok(())
        }
        () = wait_until_stopped(server) => {
            Err(CliError::Process("PostgreSQL exited unexpectedly".to_string()))
        }
    };

    server.stop().await;
    outcome?;
    Ok(())
}

async fn wait_until_stopped(server: &dyn DatabaseServer) {
    let mut ticker = tokio::time::interval(STATE_POLL);
    loop {
        ticker.tick().await;
        if !server.state().is_running() {
            return;
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, running until the server exits");
        std::future::pending::<()>().await;
    }
}
