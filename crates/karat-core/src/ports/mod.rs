//! Port definitions (trait abstractions) for the embedded database.
//!
//! Adapters (CLI, desktop shell) depend on these traits rather than on the
//! concrete runtime, so tests can substitute mocks.

mod database_server;

pub use database_server::{DatabaseServer, ServerState};
