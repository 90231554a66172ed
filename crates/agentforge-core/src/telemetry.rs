//! Log output for the `agentforge` binary.
//!
//! Stdout carries the build report, decisions and `--json` documents, so
//! every log line, including the lifecycle events from [`crate::obs`], is
//! written to stderr. `RUST_LOG` overrides the level picked from `-v`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Level used when `RUST_LOG` is unset: `info`, or `debug` under `-v`.
pub fn level_for(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Install the process-wide subscriber; a second call does nothing.
///
/// With `json` set, each event is one JSON object per line, which keeps
/// `agentforge --json build 2>log.ndjson` machine-readable end to end.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let installed = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr.json())
            .try_init()
    } else {
        tracing_subscriber::registry().with(filter).with(stderr).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for(false), Level::INFO);
        assert_eq!(level_for(true), Level::DEBUG);
    }

    #[test]
    fn test_second_init_is_ignored() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }
}
