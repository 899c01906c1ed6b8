//! Logging setup for the mount process.
//!
//! The filter comes from `OBS_FS_LOG`, then `RUST_LOG`. Without either, a foreground mount gets
//! `info` level output with progress spinners for long listings.

use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{
    EnvFilter,
    fmt::format::FmtSpan,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

const LOG_ENV: &str = "OBS_FS_LOG";
const DEFAULT_FILTER: &str = "info";

/// How log lines reach the terminal or the daemon's log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogStyle {
    /// Compact lines on stderr, interleaved with spinners for open spans.
    Spinners,
    /// Full fmt output with span enter/close events.
    Verbose,
    /// Uncoloured lines for a detached process writing to a file.
    Detached,
}

impl LogStyle {
    fn for_foreground(filter_from_env: bool) -> Self {
        if filter_from_env {
            Self::Verbose
        } else {
            Self::Spinners
        }
    }
}

pub struct Trc {
    style: LogStyle,
    filter: EnvFilter,
}

impl Default for Trc {
    fn default() -> Self {
        let from_env =
            EnvFilter::try_from_env(LOG_ENV).or_else(|_| EnvFilter::try_from_default_env());
        let style = LogStyle::for_foreground(from_env.is_ok());
        Self {
            style,
            filter: from_env.unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        }
    }
}

impl Trc {
    /// Switch to output suited for a process without a terminal.
    pub fn daemonized(mut self) -> Self {
        self.style = LogStyle::Detached;
        self
    }

    /// Install the global subscriber. Fails if one is already set.
    pub fn init(self) -> Result<(), TryInitError> {
        let registry = tracing_subscriber::registry().with(self.filter);
        match self.style {
            LogStyle::Spinners => {
                let spinners = IndicatifLayer::new();
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(spinners.get_stderr_writer())
                            .with_target(false)
                            .without_time()
                            .compact(),
                    )
                    .with(spinners)
                    .try_init()
            }
            LogStyle::Verbose => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE),
                )
                .try_init(),
            LogStyle::Detached => registry
                .with(tracing_subscriber::fmt::layer().with_ansi(false))
                .try_init(),
        }
    }
}
