//! End-to-end lifecycle tests against fake PostgreSQL binaries.

#![cfg(unix)]

mod common;

use std::fs;
use std::net::TcpListener;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{
    Fixture, INITDB_FAILS, PG_CTL_HANGS, POSTGRES_EXITS, POSTGRES_NEVER_READY, POSTGRES_READY,
    POSTGRES_SPLIT_PHRASE, POSTGRES_WITH_GRANDCHILD, fast_timeouts, init_tracing,
};
use karat_core::paths::credential_file_path;
use karat_core::{ServerState, SupervisorError};
use karat_runtime::SupervisorTimeouts;
use karat_runtime::process::READY_PHRASE;
use karat_runtime::process::shutdown::pid_alive;

// ============================================================================
// Launch
// ============================================================================

#[tokio::test]
async fn fresh_install_bootstraps_starts_and_stops() {
    init_tracing();
    let fixture = Fixture::standard();
    let postgres = fixture.supervisor(fast_timeouts());

    let report = postgres.launch().await.expect("launch");

    assert!(report.initialized);
    assert_eq!(postgres.state(), ServerState::Running);
    assert!(report.pid.is_some());
    assert_eq!(report.pid, fixture.postmaster_pid());

    // initdb saw the password through the credential file, which is gone now
    let seen = fs::read_to_string(fixture.data_dir().join(".seen-password")).unwrap();
    assert_eq!(seen.trim_end(), fixture.config.server_password);
    assert!(!credential_file_path(fixture.data_dir()).exists());

    assert_eq!(
        postgres.connection_string(),
        format!(
            "postgres://postgres:{}@localhost:{}/karat_erp",
            fixture.config.server_password, fixture.config.server_port
        )
    );

    let pid = report.pid.unwrap();
    postgres.stop().await;

    assert_eq!(postgres.state(), ServerState::Stopped);
    assert_eq!(postgres.pid(), None);
    assert!(!pid_alive(pid));
    assert_eq!(fixture.postmaster_pid(), None);
}

#[tokio::test]
async fn existing_data_directory_skips_bootstrap() {
    init_tracing();
    let fixture = Fixture::standard();

    let first = fixture.supervisor(fast_timeouts());
    assert!(first.launch().await.unwrap().initialized);
    first.stop().await;

    // A new run gets a new password, but initdb must not run again
    let second = fixture.supervisor(fast_timeouts());
    let report = second.launch().await.unwrap();
    assert!(!report.initialized);
    assert_eq!(second.state(), ServerState::Running);

    second.stop().await;
}

#[tokio::test]
async fn missing_binary_fails_before_anything_runs() {
    let fixture = Fixture::new();
    fixture.install("postgres", POSTGRES_READY);
    fixture.install("pg_ctl", common::PG_CTL_OK);
    let postgres = fixture.supervisor(fast_timeouts());

    let err = postgres.launch().await.unwrap_err();

    match err {
        SupervisorError::MissingBinary { path } => assert_eq!(path, fixture.bin("initdb")),
        other => panic!("expected MissingBinary, got {other:?}"),
    }
    assert!(!fixture.data_dir().exists());
    assert_eq!(postgres.state(), ServerState::Stopped);
}

#[tokio::test]
async fn non_executable_binary_is_rejected() {
    let fixture = Fixture::standard();
    fixture.make_non_executable("postgres");
    let postgres = fixture.supervisor(fast_timeouts());

    assert!(matches!(
        postgres.launch().await,
        Err(SupervisorError::NotExecutable { path }) if path == fixture.bin("postgres")
    ));
}

#[tokio::test]
async fn initdb_failure_reports_output_and_removes_credentials() {
    init_tracing();
    let fixture = Fixture::standard();
    fixture.install("initdb", INITDB_FAILS);
    let postgres = fixture.supervisor(fast_timeouts());

    let err = postgres.launch().await.unwrap_err();

    match &err {
        SupervisorError::Initialization { code, output } => {
            assert_eq!(*code, Some(1));
            assert!(output.contains("invalid locale settings"), "output: {output}");
        }
        other => panic!("expected Initialization, got {other:?}"),
    }
    assert!(err.output().is_some());
    assert!(!credential_file_path(fixture.data_dir()).exists());
    assert_eq!(postgres.state(), ServerState::Stopped);
    assert!(fixture.spawned_pids().is_empty());
}

#[tokio::test]
async fn initialize_twice_is_rejected() {
    let fixture = Fixture::standard();
    let postgres = fixture.supervisor(fast_timeouts());

    postgres.initialize_data_directory().await.unwrap();
    assert!(matches!(
        postgres.initialize_data_directory().await,
        Err(SupervisorError::AlreadyInitialized { .. })
    ));
    assert!(!credential_file_path(fixture.data_dir()).exists());
}

// ============================================================================
// Readiness
// ============================================================================

#[tokio::test]
async fn readiness_phrase_split_across_writes() {
    init_tracing();
    let fixture = Fixture::standard();
    fixture.install("postgres", POSTGRES_SPLIT_PHRASE);
    let postgres = fixture.supervisor(fast_timeouts());

    postgres.launch().await.expect("split phrase should still be detected");

    assert_eq!(postgres.state(), ServerState::Running);
    assert!(
        postgres
            .recent_output()
            .iter()
            .any(|line| line.line.contains(READY_PHRASE))
    );

    postgres.stop().await;
}

#[tokio::test]
async fn startup_timeout_kills_the_server() {
    init_tracing();
    let fixture = Fixture::standard();
    fixture.install("postgres", POSTGRES_NEVER_READY);
    let timeouts = SupervisorTimeouts {
        startup: Duration::from_millis(500),
        ..fast_timeouts()
    };
    let postgres = fixture.supervisor(timeouts);

    let err = postgres.launch().await.unwrap_err();

    match &err {
        SupervisorError::StartupTimeout { timeout, output } => {
            assert_eq!(*timeout, Duration::from_millis(500));
            assert!(output.contains("starting PostgreSQL"), "output: {output}");
        }
        other => panic!("expected StartupTimeout, got {other:?}"),
    }
    assert_eq!(postgres.state(), ServerState::Stopped);
    assert_eq!(postgres.pid(), None);

    let pid = fixture.postmaster_pid().expect("fake server wrote its pid");
    assert!(!pid_alive(pid));
}

#[tokio::test]
async fn early_exit_fails_fast() {
    init_tracing();
    let fixture = Fixture::standard();
    fixture.install("postgres", POSTGRES_EXITS);
    let timeouts = SupervisorTimeouts {
        startup: Duration::from_secs(20),
        ..fast_timeouts()
    };
    let postgres = fixture.supervisor(timeouts);

    let started = Instant::now();
    let err = postgres.launch().await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    match err {
        SupervisorError::ServerExited { code, output } => {
            assert_eq!(code, Some(1));
            assert!(output.contains("could not create lock file"), "output: {output}");
        }
        other => panic!("expected ServerExited, got {other:?}"),
    }
    assert_eq!(postgres.state(), ServerState::Stopped);
}

#[tokio::test]
async fn occupied_port_is_reported_without_spawning() {
    let fixture = Fixture::standard();
    let _holder = TcpListener::bind(("127.0.0.1", fixture.config.server_port)).unwrap();
    let postgres = fixture.supervisor(fast_timeouts());

    let err = postgres.launch().await.unwrap_err();

    assert!(matches!(err, SupervisorError::PortInUse(port) if port == fixture.config.server_port));
    assert!(fixture.spawned_pids().is_empty());
    assert_eq!(postgres.state(), ServerState::Stopped);
}

// ============================================================================
// Start policy
// ============================================================================

#[tokio::test]
async fn start_while_running_is_noop() {
    let fixture = Fixture::standard();
    let postgres = fixture.supervisor(fast_timeouts());
    postgres.launch().await.unwrap();
    let pid = postgres.pid();

    postgres.start().await.unwrap();

    assert_eq!(postgres.pid(), pid);
    assert_eq!(fixture.spawned_pids().len(), 1);
    postgres.stop().await;
}

#[tokio::test]
async fn concurrent_starts_share_one_server() {
    init_tracing();
    let fixture = Fixture::standard();
    let postgres = Arc::new(fixture.supervisor(fast_timeouts()));
    postgres.ensure_initialized().await.unwrap();

    let (a, b) = tokio::join!(
        {
            let postgres = Arc::clone(&postgres);
            async move { postgres.start().await }
        },
        {
            let postgres = Arc::clone(&postgres);
            async move { postgres.start().await }
        }
    );

    a.unwrap();
    b.unwrap();
    assert_eq!(postgres.state(), ServerState::Running);
    assert_eq!(fixture.spawned_pids().len(), 1);

    postgres.stop().await;
}

#[tokio::test]
async fn restart_after_stop_spawns_a_new_server() {
    let fixture = Fixture::standard();
    let postgres = fixture.supervisor(fast_timeouts());

    postgres.launch().await.unwrap();
    let first = postgres.pid().unwrap();
    postgres.stop().await;

    postgres.start().await.unwrap();
    let second = postgres.pid().unwrap();

    assert_ne!(first, second);
    assert_eq!(fixture.spawned_pids(), vec![first, second]);
    postgres.stop().await;
}

#[tokio::test]
async fn unrelated_process_in_pid_file_is_left_alone() {
    init_tracing();
    let fixture = Fixture::standard();
    fs::create_dir_all(fixture.data_dir()).unwrap();

    // After a reboot the recorded PID can belong to anything
    let mut bystander = Command::new("sleep")
        .arg("30")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let bystander_pid = bystander.id();
    fs::write(
        fixture.data_dir().join("postmaster.pid"),
        format!("{bystander_pid}\n{}\n", fixture.data_dir().display()),
    )
    .unwrap();

    let postgres = fixture.supervisor(fast_timeouts());
    postgres.start().await.unwrap();

    assert!(pid_alive(bystander_pid), "unrelated process was signalled");
    assert_eq!(postgres.state(), ServerState::Running);

    postgres.stop().await;
    bystander.kill().unwrap();
    bystander.wait().unwrap();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn orphaned_server_is_stopped_before_start() {
    use std::os::unix::process::CommandExt;

    use karat_runtime::postgres::{PostgresBinaries, recover_orphaned_server};

    init_tracing();
    let fixture = Fixture::standard();
    fs::create_dir_all(fixture.data_dir()).unwrap();

    // A real executable installed as `postgres`, so /proc/<pid>/exe matches
    let sleep = fs::canonicalize("/bin/sleep")
        .or_else(|_| fs::canonicalize("/usr/bin/sleep"))
        .unwrap();
    fs::copy(&sleep, fixture.bin("postgres")).unwrap();

    let mut orphan = Command::new(fixture.bin("postgres"))
        .arg0("sleep")
        .arg("30")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let orphan_pid = orphan.id();
    let reaper = std::thread::spawn(move || orphan.wait().unwrap());
    fs::write(
        fixture.data_dir().join("postmaster.pid"),
        format!("{orphan_pid}\n"),
    )
    .unwrap();

    let binaries = PostgresBinaries::in_dir(&fixture.config.binary_directory);
    let recovered =
        recover_orphaned_server(&binaries, &fixture.config, Duration::from_secs(3)).await;

    assert!(recovered);
    assert!(!reaper.join().unwrap().success());
    assert_eq!(fixture.postmaster_pid(), None);
}

// ============================================================================
// Stop
// ============================================================================

#[tokio::test]
async fn stop_falls_back_to_sigterm_without_control_tool() {
    init_tracing();
    let fixture = Fixture::standard();
    let postgres = fixture.supervisor(fast_timeouts());
    postgres.launch().await.unwrap();
    let pid = postgres.pid().unwrap();

    fixture.make_non_executable("pg_ctl");
    let started = Instant::now();
    postgres.stop().await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(postgres.state(), ServerState::Stopped);
    assert!(!pid_alive(pid));
}

/// Scheduling slack on top of the shutdown deadline.
const DEADLINE_SLACK: Duration = Duration::from_millis(150);

#[tokio::test]
async fn stop_kills_at_deadline_when_control_tool_hangs() {
    init_tracing();
    let fixture = Fixture::standard();
    let timeouts = SupervisorTimeouts {
        shutdown: Duration::from_secs(1),
        kill_grace: Duration::from_millis(300),
        ..fast_timeouts()
    };
    let postgres = fixture.supervisor(timeouts);
    postgres.launch().await.unwrap();
    let pid = postgres.pid().unwrap();

    fixture.install("pg_ctl", PG_CTL_HANGS);
    let started = Instant::now();
    postgres.stop().await;

    let elapsed = started.elapsed();
    assert!(elapsed >= timeouts.kill_after(), "stopped too early: {elapsed:?}");
    assert!(
        elapsed <= timeouts.shutdown + DEADLINE_SLACK,
        "stop overran: {elapsed:?}"
    );
    assert_eq!(postgres.state(), ServerState::Stopped);
    assert!(!pid_alive(pid));
}

#[tokio::test]
async fn stop_meets_deadline_when_grandchild_holds_output() {
    init_tracing();
    let fixture = Fixture::standard();
    fixture.install("postgres", POSTGRES_WITH_GRANDCHILD);
    let timeouts = SupervisorTimeouts {
        shutdown: Duration::from_secs(1),
        kill_grace: Duration::from_millis(300),
        ..fast_timeouts()
    };
    let postgres = fixture.supervisor(timeouts);
    postgres.launch().await.unwrap();
    let pid = postgres.pid().unwrap();

    fixture.install("pg_ctl", PG_CTL_HANGS);
    let started = Instant::now();
    postgres.stop().await;

    let elapsed = started.elapsed();
    assert!(
        elapsed <= timeouts.shutdown + DEADLINE_SLACK,
        "stop overran: {elapsed:?}"
    );
    assert_eq!(postgres.state(), ServerState::Stopped);
    assert!(!pid_alive(pid));
}

#[tokio::test]
async fn abandoned_start_is_cleaned_up_by_stop() {
    init_tracing();
    let fixture = Fixture::standard();
    fixture.install("postgres", POSTGRES_NEVER_READY);
    let postgres = fixture.supervisor(fast_timeouts());

    let abandoned = tokio::time::timeout(Duration::from_millis(300), postgres.start()).await;
    assert!(abandoned.is_err());
    assert_eq!(postgres.state(), ServerState::Starting);
    let pid = postgres.pid().unwrap();

    postgres.stop().await;

    assert_eq!(postgres.state(), ServerState::Stopped);
    assert_eq!(postgres.pid(), None);
    assert!(!pid_alive(pid));
}

#[tokio::test]
async fn start_after_abandoned_start_replaces_the_server() {
    init_tracing();
    let fixture = Fixture::standard();
    fixture.install("postgres", POSTGRES_NEVER_READY);
    let postgres = fixture.supervisor(fast_timeouts());

    let abandoned = tokio::time::timeout(Duration::from_millis(300), postgres.start()).await;
    assert!(abandoned.is_err());
    let stale = postgres.pid().unwrap();

    fixture.install("postgres", POSTGRES_READY);
    postgres.start().await.unwrap();

    assert!(!pid_alive(stale));
    assert_ne!(postgres.pid(), Some(stale));
    assert_eq!(postgres.state(), ServerState::Running);

    postgres.stop().await;
}

#[tokio::test]
async fn stop_twice_is_noop() {
    let fixture = Fixture::standard();
    let postgres = fixture.supervisor(fast_timeouts());
    postgres.launch().await.unwrap();

    postgres.stop().await;
    postgres.stop().await;

    assert_eq!(postgres.state(), ServerState::Stopped);
}

#[tokio::test]
async fn crash_while_running_returns_to_stopped() {
    init_tracing();
    let fixture = Fixture::standard();
    let postgres = fixture.supervisor(fast_timeouts());
    postgres.launch().await.unwrap();
    let mut states = postgres.subscribe();

    karat_runtime::process::shutdown::send_terminate(postgres.pid().unwrap()).unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|state| *state == ServerState::Stopped),
    )
    .await
    .expect("state should reach Stopped")
    .unwrap();
    assert_eq!(postgres.pid(), None);

    // stop after a crash has nothing left to do
    postgres.stop().await;
    assert_eq!(postgres.state(), ServerState::Stopped);
}
