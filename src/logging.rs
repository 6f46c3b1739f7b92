//! Logging setup and the run-scoped log file.
//!
//! Log lines go to stderr (filtered by `RUST_LOG` or the `-v` count) and,
//! while a recipe is running, also to `CSET.log` in its output directory.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log file name inside the output directory.
pub const LOG_FILE: &str = "CSET.log";

static RUN_LOG: Mutex<Option<File>> = Mutex::new(None);

/// Initialise logging.
///
/// `RUST_LOG` takes precedence; otherwise verbosity 0 logs warnings, 1 info,
/// and 2 or more debug.
pub fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(stderr_filter),
        )
        .with(run_log_layer())
        .init();
}

/// Layer writing to the attached run log at debug level.
pub fn run_log_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(|| RunLogWriter)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG)
}

/// Writer forwarding to the attached run log; discards output when detached.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunLogWriter;

impl Write for RunLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut sink = RUN_LOG.lock().unwrap_or_else(|e| e.into_inner());
        match sink.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut sink = RUN_LOG.lock().unwrap_or_else(|e| e.into_inner());
        match sink.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Detaches the run log when dropped.
#[derive(Debug)]
pub struct RunLogGuard {
    _private: (),
}

impl Drop for RunLogGuard {
    fn drop(&mut self) {
        let mut sink = RUN_LOG.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut file) = sink.take() {
            let _ = file.flush();
        }
    }
}

/// Start copying log lines to `path` (truncated) until the guard is dropped.
pub fn attach_run_log(path: &Path) -> io::Result<RunLogGuard> {
    let file = File::create(path)?;
    *RUN_LOG.lock().unwrap_or_else(|e| e.into_inner()) = Some(file);
    Ok(RunLogGuard { _private: () })
}
