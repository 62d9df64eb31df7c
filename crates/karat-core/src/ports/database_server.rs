//! Database server lifecycle port.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionConfig;
use crate::error::SupervisorError;

/// Lifecycle state of the embedded server.
///
/// `Stopped → Starting → Running → Stopping → Stopped`; an unexpected exit
/// from `Starting` or `Running` goes straight back to `Stopped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServerState {
    /// True once the readiness phrase has been seen and the process is alive.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Embedded database server owned by the application's composition root.
///
/// # Design Rules
///
/// - `start` is fallible and a no-op when already running
/// - `stop` always completes; failures are escalated internally
/// - connection info is pure formatting, valid before the server is up
#[async_trait]
pub trait DatabaseServer: Send + Sync {
    /// Start the server and wait until it accepts connections.
    async fn start(&self) -> Result<(), SupervisorError>;

    /// Stop the server. Never fails and always returns in bounded time.
    async fn stop(&self);

    /// Current lifecycle state.
    fn state(&self) -> ServerState;

    /// Structured connection parameters.
    fn connection_config(&self) -> ConnectionConfig;

    /// `postgres://` connection string for the application's database layer.
    fn connection_string(&self) -> String {
        self.connection_config().connection_string()
    }
}
