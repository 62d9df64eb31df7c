//! Fake PostgreSQL installations for supervisor tests.
//!
//! The scripts mimic just enough of the real tools: `postgres` records its
//! PID in `postmaster.pid` and prints the readiness phrase, `initdb` creates
//! the data directory, `pg_ctl stop` signals the recorded PID.

#![allow(dead_code)]

use std::fs;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use karat_core::{ConfigResolver, SupervisorConfig};
use karat_runtime::{EmbeddedPostgres, SupervisorTimeouts};
use tempfile::TempDir;

pub const POSTGRES_READY: &str = r#"#!/bin/sh
echo $$ >> "$2.spawns"
echo $$ > "$2/postmaster.pid"
echo "LOG:  starting PostgreSQL 16.4 on port $4" >&2
echo "LOG:  database system is ready to accept connections" >&2
exec sleep 300
"#;

pub const POSTGRES_SPLIT_PHRASE: &str = r#"#!/bin/sh
echo $$ > "$2/postmaster.pid"
printf 'LOG:  database system is rea' >&2
sleep 0.2
printf 'dy to accept connections\n' >&2
exec sleep 300
"#;

pub const POSTGRES_NEVER_READY: &str = r#"#!/bin/sh
echo $$ > "$2/postmaster.pid"
echo "LOG:  starting PostgreSQL 16.4" >&2
exec sleep 300
"#;

/// Leaves a background child holding stdout and stderr open after it dies.
pub const POSTGRES_WITH_GRANDCHILD: &str = r#"#!/bin/sh
echo $$ > "$2/postmaster.pid"
sleep 5 &
echo "LOG:  database system is ready to accept connections" >&2
exec sleep 300
"#;

pub const POSTGRES_EXITS: &str = r#"#!/bin/sh
echo "FATAL:  could not create lock file \"postmaster.pid\"" >&2
exit 1
"#;

pub const INITDB_OK: &str = r#"#!/bin/sh
pwfile="${5#--pwfile=}"
if [ ! -s "$pwfile" ]; then
    echo "initdb: error: password file \"$pwfile\" is empty" >&2
    exit 2
fi
mkdir -p "$2"
cp "$pwfile" "$2/.seen-password"
echo "Success. You can now start the database server."
"#;

pub const INITDB_FAILS: &str = r#"#!/bin/sh
echo "initdb: error: invalid locale settings" >&2
exit 1
"#;

pub const PG_CTL_OK: &str = r#"#!/bin/sh
pid=$(head -n 1 "$3/postmaster.pid")
kill "$pid"
rm -f "$3/postmaster.pid"
echo "server stopped"
"#;

pub const PG_CTL_HANGS: &str = "#!/bin/sh\nexec sleep 60\n";

/// Temporary data root with a fake binary directory.
pub struct Fixture {
    pub dir: TempDir,
    pub config: SupervisorConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let bin_dir = dir.path().join("postgres").join("bin");
        fs::create_dir_all(&bin_dir).expect("create bin dir");

        let config = SupervisorConfig {
            server_port: free_port(),
            data_directory: dir.path().join("data").join("postgres-data"),
            binary_directory: bin_dir,
            server_password: karat_core::generate_password(),
            database_name: "karat_erp".to_string(),
        };

        Self { dir, config }
    }

    /// Fixture with working `postgres`, `initdb` and `pg_ctl`.
    pub fn standard() -> Self {
        let fixture = Self::new();
        fixture.install("postgres", POSTGRES_READY);
        fixture.install("initdb", INITDB_OK);
        fixture.install("pg_ctl", PG_CTL_OK);
        fixture
    }

    /// Write an executable script into the binary directory.
    pub fn install(&self, name: &str, script: &str) {
        let path = self.bin(name);
        fs::write(&path, script).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    pub fn make_non_executable(&self, name: &str) {
        fs::set_permissions(self.bin(name), fs::Permissions::from_mode(0o644)).expect("chmod");
    }

    pub fn bin(&self, name: &str) -> PathBuf {
        self.config.binary_directory.join(name)
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_directory
    }

    pub fn postmaster_pid(&self) -> Option<u32> {
        karat_runtime::postgres::read_postmaster_pid(self.data_dir()).expect("read postmaster.pid")
    }

    /// PIDs of every fake server spawned against this data directory.
    pub fn spawned_pids(&self) -> Vec<u32> {
        let mut log = self.config.data_directory.clone().into_os_string();
        log.push(".spawns");
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect()
    }

    pub fn supervisor(&self, timeouts: SupervisorTimeouts) -> EmbeddedPostgres {
        let resolver = ConfigResolver::with_config(self.config.clone());
        EmbeddedPostgres::new(Arc::new(resolver)).with_timeouts(timeouts)
    }
}

pub fn fast_timeouts() -> SupervisorTimeouts {
    SupervisorTimeouts {
        startup: Duration::from_secs(5),
        shutdown: Duration::from_secs(3),
        kill_grace: Duration::from_secs(2),
    }
}

pub fn free_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
