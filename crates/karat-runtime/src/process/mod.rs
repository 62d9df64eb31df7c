//! Child-process plumbing for the embedded server.
//!
//! # Structure
//!
//! - `OutputListeners` - stdout/stderr reader tasks with idempotent detach
//! - `ReadinessProbe` - line-based readiness state machine
//! - `OutputLog` - bounded per-supervisor ring buffer of server output
//! - `shutdown` - signal helpers for forced termination
//! - `is_port_available` - pre-spawn port check

mod logs;
mod ports;
mod readiness;
pub mod shutdown;
mod stream;

pub use logs::{MAX_OUTPUT_LINES, OutputLine, OutputLog, OutputStream};
pub use ports::is_port_available;
pub use readiness::{READY_PHRASE, ReadinessProbe};
pub use stream::{LineSink, OutputListeners};
