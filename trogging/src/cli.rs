//! The `clap`-derived option block flattened into every `qserv` subcommand,
//! mirroring the run-subcommand's `#[clap(flatten)] logging_config` pattern.

use crate::{Builder, LogFormat};

/// Logging options shared by every subcommand.
#[derive(Debug, Clone, clap::Parser)]
pub struct LoggingConfig {
    /// Log filter directives, in `tracing_subscriber::EnvFilter` syntax
    /// (e.g. `qserv_dispatch=debug,info`). Falls back to `RUST_LOG`, then
    /// `info`.
    #[clap(long = "log-filter", env = "RUST_LOG")]
    log_filter: Option<String>,

    /// Log output encoding.
    #[clap(long = "log-format", default_value = "logfmt", parse(try_from_str))]
    log_format: LogFormatArg,

    /// Increase verbosity (`-v` = debug, `-vv` = trace). Overrides
    /// `--log-filter` for the crate-local target.
    #[clap(short, long, parse(from_occurrences))]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormatArg {
    Logfmt,
    Json,
}

impl std::str::FromStr for LogFormatArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logfmt" => Ok(Self::Logfmt),
            "json" => Ok(Self::Json),
            other => Err(format!("unrecognized log format: {other}")),
        }
    }
}

impl LoggingConfig {
    /// Build the [`Builder`] this configuration describes.
    pub fn builder(&self) -> Builder {
        let filter = match self.verbose {
            0 => self.log_filter.clone().unwrap_or_else(|| "info".to_string()),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        };
        let format = match self.log_format {
            LogFormatArg::Logfmt => LogFormat::Logfmt,
            LogFormatArg::Json => LogFormat::Json,
        };
        Builder::new().with_filter(filter).with_format(format)
    }
}
