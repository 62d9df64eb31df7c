//! Readiness detection over line-buffered server output.
//!
//! The probe is a two-state machine (`waiting → ready`) fed one complete line
//! at a time. Because the readers assemble lines before calling `observe`, a
//! phrase written in several chunks is still recognized.

use tokio::sync::watch;

/// Logged by the postmaster once it accepts connections.
pub const READY_PHRASE: &str = "database system is ready to accept connections";

/// Watches output lines for the readiness phrase.
#[derive(Debug)]
pub struct ReadinessProbe {
    phrase: String,
    ready: watch::Sender<bool>,
}

impl ReadinessProbe {
    pub fn new(phrase: impl Into<String>) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            phrase: phrase.into(),
            ready,
        }
    }

    /// Feed one line. Returns `true` only for the line that flips the probe to ready.
    pub fn observe(&self, line: &str) -> bool {
        if !line.contains(&self.phrase) {
            return false;
        }
        self.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Receiver that observes the transition; resolves immediately if already ready.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self::new(READY_PHRASE)
    }
}
