#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]

pub mod postgres;
pub mod process;
mod supervisor;

// Re-export the DatabaseServer implementation
pub use supervisor::{
    DEFAULT_KILL_GRACE, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_STARTUP_TIMEOUT, EmbeddedPostgres,
    LaunchReport, SupervisorTimeouts,
};

// Re-export output types surfaced by EmbeddedPostgres::recent_output
pub use process::{OutputLine, OutputStream};
