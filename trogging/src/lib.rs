//! The logging pipeline shared by every `qserv` subcommand: a
//! [`cli::LoggingConfig`] clap block plus a [`Builder`] that turns it into
//! an installed global `tracing` subscriber.
//!
//! Two output formats are supported: `logfmt` (via the sibling `logfmt`
//! crate, the default — greppable `key=value` lines) and `json` (structured,
//! for log pipelines that parse it). Verbosity is controlled by repeating
//! `-v`/`-q` or by an `RUST_LOG`-style filter string.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

#[cfg(feature = "clap")]
pub mod cli;

use logfmt::LogFmtLayer;
use observability_deps::tracing::subscriber::set_global_default;
use tracing_subscriber::{fmt, prelude::*, registry::Registry, EnvFilter};

/// Errors building or installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The filter directive string (from `--log-filter` or `RUST_LOG`)
    /// failed to parse.
    #[error("invalid log filter directive: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    /// A global subscriber was already installed (e.g. by a test harness).
    #[error("a global tracing subscriber is already set")]
    AlreadySet,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// `key=value` lines, one per event (default).
    Logfmt,
    /// Structured JSON, one object per event.
    Json,
}

/// Builds and installs the process-wide `tracing` subscriber.
#[derive(Debug)]
pub struct Builder {
    filter: String,
    format: LogFormat,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Logfmt,
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `EnvFilter` directive string (e.g. `"qserv_dispatch=debug,info"`).
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Install the configured subscriber as the process-wide default.
    ///
    /// Returns [`Error::AlreadySet`] rather than panicking, so that
    /// subcommands which install their own subscriber for tests don't abort
    /// the process.
    pub fn install(self) -> Result<()> {
        let env_filter = EnvFilter::try_new(&self.filter)?;
        let registry = Registry::default().with(env_filter);

        let result = match self.format {
            LogFormat::Logfmt => set_global_default(registry.with(LogFmtLayer::new())),
            LogFormat::Json => set_global_default(registry.with(fmt::layer().json())),
        };
        result.map_err(|_| Error::AlreadySet)
    }
}
