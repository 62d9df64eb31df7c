//! Supervisor for the embedded PostgreSQL server.
//!
//! `EmbeddedPostgres` owns at most one server process at a time and drives it
//! through `Stopped → Starting → Running → Stopping → Stopped`.
//!
//! Key design decisions:
//! - **Explicit instance**: constructed by the composition root, no global
//! - **Serialized lifecycle**: `start`/`stop` hold an async mutex, so a second
//!   `start` issued while one is pending waits for it and, if it succeeded,
//!   returns as a no-op
//! - **Exit monitor**: one task owns the `Child`, reaps it, detaches the
//!   output listeners and clears the handle, whoever caused the exit
//! - **Bounded shutdown**: `stop` never fails; it escalates from `pg_ctl` to
//!   signals and always returns within the shutdown deadline
//! - **No orphan on timeout**: a server that misses the startup deadline is
//!   killed before `start` reports the timeout

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use karat_core::{
    ConfigResolver, ConnectionConfig, DatabaseServer, ServerState, SupervisorConfig,
    SupervisorError,
};
use tokio::process::Child;
use tokio::sync::watch;
use tokio::time::{Instant, timeout, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::postgres::{
    PostgresBinaries, control_stop_command, ensure_initialized, initialize_data_directory,
    recover_orphaned_server, server_command, validate_binaries,
};
use crate::process::shutdown::send_terminate;
use crate::process::{
    LineSink, OutputLine, OutputListeners, OutputLog, OutputStream, ReadinessProbe,
    is_port_available,
};

/// Default time allowed for the readiness phrase to appear.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default hard deadline for a graceful stop.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time reserved at the end of the shutdown deadline for SIGKILL and reaping.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// How long the exit monitor lets readers flush final lines before detaching.
const OUTPUT_DRAIN: Duration = Duration::from_millis(250);

/// Timers used by the supervisor.
///
/// `kill_grace` is carved out of `shutdown`: a stop that is still waiting at
/// `shutdown - kill_grace` escalates to SIGKILL, so the whole stop fits in
/// `shutdown`. The grace is capped at half the shutdown deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorTimeouts {
    pub startup: Duration,
    pub shutdown: Duration,
    pub kill_grace: Duration,
}

impl SupervisorTimeouts {
    /// Offset from the start of a stop at which SIGKILL is sent.
    pub fn kill_after(&self) -> Duration {
        let grace = self.kill_grace.min(self.shutdown / 2);
        self.shutdown - grace
    }
}

impl Default for SupervisorTimeouts {
    fn default() -> Self {
        Self {
            startup: DEFAULT_STARTUP_TIMEOUT,
            shutdown: DEFAULT_SHUTDOWN_TIMEOUT,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

/// Outcome of [`EmbeddedPostgres::launch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchReport {
    /// Whether the data directory was bootstrapped during this launch.
    pub initialized: bool,
    /// PID of the running server.
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProcessExit {
    code: Option<i32>,
}

/// The one live server process.
struct ServerProcess {
    generation: u64,
    pid: Option<u32>,
    listeners: OutputListeners,
    kill: CancellationToken,
    exited: watch::Receiver<Option<ProcessExit>>,
}

/// What `stop` needs from the process slot, copied out of the lock.
struct StopTarget {
    generation: u64,
    pid: Option<u32>,
    kill: CancellationToken,
    exited: watch::Receiver<Option<ProcessExit>>,
}

enum StartupOutcome {
    Ready,
    Exited(Option<ProcessExit>),
}

/// State shared with the exit monitor and the output listeners.
struct Shared {
    state: watch::Sender<ServerState>,
    process: Mutex<Option<ServerProcess>>,
    output: OutputLog,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Option<ServerProcess>> {
        self.process.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ServerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Server state changed");
        }
    }

    /// Promote `generation` to `Running` if it is still the live process.
    fn mark_running(&self, generation: u64) -> bool {
        let slot = self.slot();
        match slot.as_ref() {
            Some(process) if process.generation == generation => {
                self.set_state(ServerState::Running);
                true
            }
            _ => false,
        }
    }

    /// Move the live process to `Stopping` and hand out what `stop` needs.
    ///
    /// Only called under the lifecycle lock, so a process still marked
    /// `Starting` belongs to a `start` whose future was dropped.
    fn begin_stop(&self) -> Option<StopTarget> {
        let slot = self.slot();
        let process = slot.as_ref()?;
        if !matches!(
            *self.state.borrow(),
            ServerState::Running | ServerState::Starting
        ) {
            return None;
        }
        self.set_state(ServerState::Stopping);
        Some(StopTarget {
            generation: process.generation,
            pid: process.pid,
            kill: process.kill.clone(),
            exited: process.exited.clone(),
        })
    }

    /// Detach listeners, then discard the handle of `generation`.
    ///
    /// Returns the state the process was in, or `None` if another path
    /// already released it.
    fn release(&self, generation: u64) -> Option<ServerState> {
        let mut slot = self.slot();
        match slot.as_ref() {
            Some(process) if process.generation == generation => {
                process.listeners.detach();
            }
            _ => return None,
        }
        *slot = None;

        let previous = *self.state.borrow();
        self.set_state(ServerState::Stopped);
        Some(previous)
    }
}

/// Feeds server output into the log and the readiness probe.
struct ServerOutput {
    shared: Arc<Shared>,
    probe: ReadinessProbe,
}

impl LineSink for ServerOutput {
    fn on_line(&self, stream: OutputStream, line: String) {
        debug!(%stream, "postgres: {}", line);
        if self.probe.observe(&line) {
            debug!("Readiness phrase observed");
        }
        self.shared.output.push(stream, line);
    }
}

/// Supervisor for the bundled PostgreSQL server.
///
/// # Example
///
/// ```ignore
/// let resolver = Arc::new(ConfigResolver::from_environment(settings)?);
/// let postgres = EmbeddedPostgres::new(resolver);
/// postgres.launch().await?;
/// let url = postgres.connection_string();
/// // ...
/// postgres.stop().await;
/// ```
pub struct EmbeddedPostgres {
    resolver: Arc<ConfigResolver>,
    timeouts: SupervisorTimeouts,
    lifecycle: tokio::sync::Mutex<()>,
    shared: Arc<Shared>,
    next_generation: AtomicU64,
}

impl EmbeddedPostgres {
    /// Create a stopped supervisor. Nothing is resolved or spawned yet.
    pub fn new(resolver: Arc<ConfigResolver>) -> Self {
        let (state, _) = watch::channel(ServerState::Stopped);
        Self {
            resolver,
            timeouts: SupervisorTimeouts::default(),
            lifecycle: tokio::sync::Mutex::new(()),
            shared: Arc::new(Shared {
                state,
                process: Mutex::new(None),
                output: OutputLog::default(),
            }),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Override the startup, shutdown and kill timers.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: SupervisorTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub const fn timeouts(&self) -> SupervisorTimeouts {
        self.timeouts
    }

    /// Resolved configuration (computed on first access).
    pub fn config(&self) -> &SupervisorConfig {
        self.resolver.resolve()
    }

    /// Expected binary locations for the resolved configuration.
    pub fn binaries(&self) -> PostgresBinaries {
        PostgresBinaries::in_dir(&self.config().binary_directory)
    }

    /// Confirm the three bundled executables exist.
    pub fn validate_binaries(&self) -> Result<PostgresBinaries, SupervisorError> {
        validate_binaries(self.config())
    }

    /// Bootstrap the data directory; fails if it already exists.
    pub async fn initialize_data_directory(&self) -> Result<(), SupervisorError> {
        initialize_data_directory(self.config(), &self.binaries()).await
    }

    /// Bootstrap the data directory only if it is absent.
    pub async fn ensure_initialized(&self) -> Result<bool, SupervisorError> {
        ensure_initialized(self.config(), &self.binaries()).await
    }

    /// Full startup sequence: validate binaries, bootstrap if needed, start.
    pub async fn launch(&self) -> Result<LaunchReport, SupervisorError> {
        let config = self.config();
        let binaries = validate_binaries(config)?;
        let initialized = ensure_initialized(config, &binaries).await?;
        self.start().await?;

        Ok(LaunchReport {
            initialized,
            pid: self.pid(),
        })
    }

    /// Start the server and wait for it to accept connections.
    ///
    /// No-op if already running.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let _lifecycle = self.lifecycle.lock().await;

        match self.state() {
            ServerState::Running => {
                debug!("PostgreSQL already running, start is a no-op");
                return Ok(());
            }
            ServerState::Starting => {
                warn!(pid = ?self.pid(), "Previous start was abandoned, stopping its server");
                self.stop_locked().await;
            }
            ServerState::Stopped | ServerState::Stopping => {}
        }

        let config = self.config();
        let binaries = PostgresBinaries::in_dir(&config.binary_directory);

        recover_orphaned_server(&binaries, config, self.timeouts.shutdown).await;

        if !is_port_available(config.server_port) {
            return Err(SupervisorError::PortInUse(config.server_port));
        }

        self.shared.output.clear();
        self.shared.set_state(ServerState::Starting);

        let mut child = match server_command(&binaries, config).spawn() {
            Ok(child) => child,
            Err(source) => {
                self.shared.set_state(ServerState::Stopped);
                return Err(SupervisorError::Spawn {
                    binary: binaries.postgres,
                    source,
                });
            }
        };

        let pid = child.id();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        info!(
            pid = ?pid,
            port = config.server_port,
            data_dir = %config.data_directory.display(),
            "Spawned PostgreSQL"
        );

        let probe = ReadinessProbe::default();
        let ready = probe.subscribe();
        let sink = Arc::new(ServerOutput {
            shared: Arc::clone(&self.shared),
            probe,
        });
        let listeners = OutputListeners::attach(&mut child, sink);
        let kill = CancellationToken::new();
        let (exit_tx, mut exited) = watch::channel(None);

        *self.shared.slot() = Some(ServerProcess {
            generation,
            pid,
            listeners: listeners.clone(),
            kill: kill.clone(),
            exited: exited.clone(),
        });

        tokio::spawn(monitor_exit(
            child,
            generation,
            kill.clone(),
            listeners.clone(),
            exit_tx,
            Arc::clone(&self.shared),
        ));

        let outcome = timeout(
            self.timeouts.startup,
            wait_for_startup(ready, exited.clone()),
        )
        .await;

        match outcome {
            Ok(StartupOutcome::Ready) if self.shared.mark_running(generation) => {
                info!(pid = ?pid, port = config.server_port, "PostgreSQL is accepting connections");
                Ok(())
            }
            Ok(StartupOutcome::Ready) => {
                // Ready and gone in the same instant
                let exit = wait_exit(&mut exited).await;
                Err(self.exited_during_startup(generation, &listeners, exit).await)
            }
            Ok(StartupOutcome::Exited(exit)) => {
                Err(self.exited_during_startup(generation, &listeners, exit).await)
            }
            Err(_) => {
                warn!(
                    pid = ?pid,
                    timeout = ?self.timeouts.startup,
                    "PostgreSQL did not report readiness in time, killing it"
                );
                let output = self.shared.output.render();
                self.force_kill(generation, &kill, &mut exited).await;
                Err(SupervisorError::StartupTimeout {
                    timeout: self.timeouts.startup,
                    output,
                })
            }
        }
    }

    /// Stop the server. Never fails.
    ///
    /// Asks `pg_ctl` for a fast shutdown; sends SIGTERM if `pg_ctl` cannot be
    /// spawned; sends SIGKILL once only the kill grace is left. Returns within
    /// the shutdown deadline even if the process cannot be reaped.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.stop_locked().await;
    }

    async fn stop_locked(&self) {
        let Some(target) = self.shared.begin_stop() else {
            debug!("PostgreSQL not running, stop is a no-op");
            return;
        };

        let config = self.config();
        let binaries = PostgresBinaries::in_dir(&config.binary_directory);
        let started = Instant::now();
        let kill_at = started + self.timeouts.kill_after();
        let deadline = started + self.timeouts.shutdown;
        let mut exited = target.exited.clone();

        info!(pid = ?target.pid, "Stopping PostgreSQL");

        let control = control_stop_command(&binaries, &config.data_directory).output();
        match timeout_at(kill_at, control).await {
            Ok(Ok(output)) if output.status.success() => {
                info!("pg_ctl reported a clean shutdown");
            }
            Ok(Ok(output)) => {
                warn!(
                    code = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "pg_ctl stop failed"
                );
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to spawn pg_ctl, terminating PostgreSQL directly");
                terminate(&target);
            }
            Err(_) => {
                warn!("pg_ctl did not finish in time");
            }
        }

        if timeout_at(kill_at, wait_exit(&mut exited)).await.is_err() {
            warn!(pid = ?target.pid, "PostgreSQL still running, killing it");
            target.kill.cancel();
            if timeout_at(deadline, wait_exit(&mut exited)).await.is_err() {
                error!(pid = ?target.pid, "PostgreSQL not reaped by the shutdown deadline");
            }
        }

        self.shared.release(target.generation);
        info!("PostgreSQL stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.shared.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.shared.state.subscribe()
    }

    /// PID of the live server process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.shared.slot().as_ref().and_then(|p| p.pid)
    }

    /// Recent server output (bounded), oldest first.
    pub fn recent_output(&self) -> Vec<OutputLine> {
        self.shared.output.snapshot()
    }

    /// Connection parameters; resolves the config lazily, no I/O.
    pub fn connection_config(&self) -> ConnectionConfig {
        self.config().connection_config()
    }

    /// `postgres://postgres:<password>@localhost:<port>/<database>`
    pub fn connection_string(&self) -> String {
        self.connection_config().connection_string()
    }

    async fn exited_during_startup(
        &self,
        generation: u64,
        listeners: &OutputListeners,
        exit: Option<ProcessExit>,
    ) -> SupervisorError {
        // Final lines (FATAL messages) may still be in flight
        listeners.drain(OUTPUT_DRAIN).await;
        self.shared.release(generation);

        let code = exit.and_then(|e| e.code);
        let output = self.shared.output.render();
        error!(code = ?code, "PostgreSQL exited before becoming ready");
        SupervisorError::ServerExited { code, output }
    }

    async fn force_kill(
        &self,
        generation: u64,
        kill: &CancellationToken,
        exited: &mut watch::Receiver<Option<ProcessExit>>,
    ) {
        kill.cancel();
        if timeout(self.timeouts.kill_grace, wait_exit(exited))
            .await
            .is_err()
        {
            error!("PostgreSQL did not exit after SIGKILL");
        }
        self.shared.release(generation);
    }
}

#[async_trait]
impl DatabaseServer for EmbeddedPostgres {
    async fn start(&self) -> Result<(), SupervisorError> {
        Self::start(self).await
    }

    async fn stop(&self) {
        Self::stop(self).await;
    }

    fn state(&self) -> ServerState {
        Self::state(self)
    }

    fn connection_config(&self) -> ConnectionConfig {
        Self::connection_config(self)
    }
}

// Drop is not async, so no pg_ctl here: best effort kill of a live server.
// Callers should `stop()` before dropping for a clean shutdown.
impl Drop for EmbeddedPostgres {
    fn drop(&mut self) {
        if let Some(process) = self.shared.slot().as_ref() {
            warn!(pid = ?process.pid, "Supervisor dropped with PostgreSQL still running, killing it");
            process.kill.cancel();
        }
    }
}

fn terminate(target: &StopTarget) {
    match target.pid.map(send_terminate) {
        Some(Ok(())) => debug!(pid = ?target.pid, "Sent SIGTERM"),
        Some(Err(e)) => {
            warn!(error = %e, "SIGTERM failed, killing PostgreSQL");
            target.kill.cancel();
        }
        None => target.kill.cancel(),
    }
}

async fn wait_for_startup(
    mut ready: watch::Receiver<bool>,
    mut exited: watch::Receiver<Option<ProcessExit>>,
) -> StartupOutcome {
    tokio::select! {
        biased;
        result = ready.wait_for(|r| *r) => {
            if result.is_ok() {
                return StartupOutcome::Ready;
            }
        }
        exit = wait_exit(&mut exited) => return StartupOutcome::Exited(exit),
    }

    // Both readers hit end-of-stream without the phrase: the process is exiting
    StartupOutcome::Exited(wait_exit(&mut exited).await)
}

async fn wait_exit(exited: &mut watch::Receiver<Option<ProcessExit>>) -> Option<ProcessExit> {
    match exited.wait_for(Option::is_some).await {
        Ok(exit) => *exit,
        Err(_) => None,
    }
}

/// Own the child until it exits, then release its slot.
///
/// Cancelling `kill` delivers SIGKILL through the child handle.
async fn monitor_exit(
    mut child: Child,
    generation: u64,
    kill: CancellationToken,
    listeners: OutputListeners,
    exit_tx: watch::Sender<Option<ProcessExit>>,
    shared: Arc<Shared>,
) {
    let pid = child.id();
    let status = tokio::select! {
        status = child.wait() => status,
        () = kill.cancelled() => {
            debug!(pid = ?pid, "Killing PostgreSQL");
            if let Err(e) = child.start_kill() {
                warn!(pid = ?pid, error = %e, "Failed to kill PostgreSQL");
            }
            child.wait().await
        }
    };

    let exit = match status {
        Ok(status) => ProcessExit {
            code: status.code(),
        },
        Err(e) => {
            warn!(pid = ?pid, error = %e, "Failed to reap PostgreSQL");
            ProcessExit { code: None }
        }
    };

    // Waiters are released first: a grandchild holding the pipes must not
    // hold up `stop`
    exit_tx.send_replace(Some(exit));

    // Let the readers pick up final lines (FATAL messages) before detaching
    if !listeners.drain(OUTPUT_DRAIN).await {
        debug!(pid = ?pid, "Output listeners still open after exit");
    }

    match shared.release(generation) {
        Some(ServerState::Running) => {
            warn!(pid = ?pid, code = ?exit.code, "PostgreSQL exited unexpectedly");
        }
        Some(state) => {
            debug!(pid = ?pid, code = ?exit.code, %state, "PostgreSQL exited");
        }
        None => {}
    }
}
