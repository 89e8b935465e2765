//! Logging setup
//!
//! Log lines go to a daily-rolled file and to stderr. Nothing is written to
//! stdout, which carries command output (`--json`).

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_DIR: &str = "XTMREPORT_LOG_DIR";
const LOG_FILE_NAME: &str = "xtmreport.log";

/// Created and removed again to prove a log directory is writable
const WRITE_PROBE: &str = ".xtmreport-write-probe";

/// Must be held for the lifetime of the process so buffered lines are flushed.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber.
pub fn init_observability(log_dir: Option<&Path>, env_filter: EnvFilter) -> Result<ObservabilityGuard> {
    let (file_writer, log_guard) = match resolve_log_dir(log_dir) {
        Ok(dir) => tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_NAME)),
        Err(err) => {
            eprintln!("Warning: {err}. Logging to stderr only.");
            tracing_appender::non_blocking(std::io::sink())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    tracing::debug!("observability initialized");

    Ok(ObservabilityGuard {
        _log_guard: log_guard,
    })
}

/// Priority: quiet flag > verbose flag > `RUST_LOG` > `default_level`.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    if verbose > 0 {
        let level = match verbose {
            1 => "debug",
            _ => "trace",
        };
        return EnvFilter::new(level);
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn resolve_log_dir(config_dir: Option<&Path>) -> std::result::Result<PathBuf, String> {
    resolve_log_dir_with(
        std::env::var_os(ENV_LOG_DIR).map(PathBuf::from),
        config_dir.map(Path::to_path_buf),
    )
}

fn resolve_log_dir_with(
    env_dir: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> std::result::Result<PathBuf, String> {
    if let Some(dir) = env_dir.or(config_dir) {
        ensure_writable(&dir)?;
        return Ok(dir);
    }

    let mut candidates = Vec::new();
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "xtmreport") {
        candidates.push(proj_dirs.data_local_dir().join("logs"));
    }
    if let Ok(dir) = std::env::current_dir() {
        candidates.push(dir);
    }

    candidates
        .into_iter()
        .find(|dir| ensure_writable(dir).is_ok())
        .ok_or_else(|| "no writable log directory found".to_string())
}

fn ensure_writable(dir: &Path) -> std::result::Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("failed to create log directory {}: {e}", dir.display()))?;

    let probe = dir.join(WRITE_PROBE);
    std::fs::write(&probe, b"")
        .map_err(|e| format!("log directory {} is not writable: {e}", dir.display()))?;
    let _ = std::fs::remove_file(&probe);

    Ok(())
}
