//! Tracing setup for the worker.
//!
//! Stdout carries payload bytes, so records go to the XDG state log file or,
//! when that cannot be opened, to stderr. Never to stdout.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,rpdl_core=debug,rp_download=debug";

/// Per-record sink. A failed descriptor dup degrades that record to stderr.
enum Sink {
    Log(File),
    Stderr,
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Log(f) => f.write(buf),
            Sink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Log(f) => f.flush(),
            Sink::Stderr => io::stderr().lock().flush(),
        }
    }
}

/// Hands out duplicates of the log file opened before the sandbox went up.
struct LogFile(File);

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = Sink;

    fn make_writer(&'a self) -> Sink {
        match self.0.try_clone() {
            Ok(f) => Sink::Log(f),
            Err(_) => Sink::Stderr,
        }
    }
}

fn install(writer: BoxMakeWriter) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("tracing subscriber already set: {e}"))
}

/// `$XDG_STATE_HOME/rpdl/rpdl.log`.
pub fn log_path() -> Result<PathBuf> {
    // The prefixed state home is already `$XDG_STATE_HOME/rpdl`.
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rpdl")?;
    Ok(xdg_dirs.get_state_home().join("rpdl.log"))
}

/// Opens the log file in append mode and routes all records there.
///
/// Runs before the sandbox: the file descriptor is acquired here, afterwards
/// only `write` and `fcntl(F_DUPFD)` touch it.
pub fn init_logging() -> Result<()> {
    let path = log_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log dir {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    install(BoxMakeWriter::new(LogFile(file)))?;
    tracing::debug!(pid = std::process::id(), log = %path.display(), "worker logging ready");
    Ok(())
}

/// Fallback when the state directory is unusable: records go to stderr.
/// A second subscriber install is ignored.
pub fn init_logging_stderr() {
    let _ = install(BoxMakeWriter::new(io::stderr));
}
