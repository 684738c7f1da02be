//! Logging configs.
use snafu::{ResultExt, Snafu};
use tracing_subscriber::EnvFilter;

/// Filter used when neither `--log-filter` nor `-v` is given.
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("Invalid log filter {filter:?}: {source}"))]
    InvalidFilter {
        filter: String,
        source: tracing_subscriber::filter::ParseError,
    },

    #[snafu(display("Cannot install the global log subscriber: {reason}"))]
    Install { reason: String },
}

/// Logs: message format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// human-readable, single line
    #[default]
    Full,
    /// human-readable, multi line
    Pretty,
    /// machine-parseable
    Json,
}

/// CLI config for the logging related subset of options.
#[derive(Debug, Clone, clap::Parser)]
pub struct LoggingConfig {
    /// Logs: filter directive
    ///
    /// Configures log severity level filter, by target.
    ///
    /// Simplest options: error, warn, info, debug, trace
    ///
    /// Levels for different modules can be specified. For example
    /// `debug,table_dispatcher::writer=info` specifies debug logging for all
    /// modules except the writer, which only logs at info level.
    ///
    /// Overridden by `-v`.
    #[clap(long = "log-filter", env = "LOG_FILTER", action)]
    pub log_filter: Option<String>,

    /// Logs: filter short-hand
    ///
    /// Convenient way to set log severity level filter.
    /// Overrides `--log-filter`.
    ///
    /// -v   'info'
    ///
    /// -vv  'debug'
    ///
    /// -vvv 'trace'
    #[clap(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        verbatim_doc_comment
    )]
    pub log_verbose_count: u8,

    /// Logs: message format
    #[clap(
        long = "log-format",
        env = "LOG_FORMAT",
        default_value = "full",
        value_enum
    )]
    pub log_format: LogFormat,
}

impl LoggingConfig {
    /// The filter directives in effect, `-v` taking precedence over
    /// `--log-filter`.
    pub fn filter_directives(&self) -> String {
        match self.log_verbose_count {
            0 => self
                .log_filter
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }

    pub fn env_filter(&self) -> Result<EnvFilter, Error> {
        let filter = self.filter_directives();
        EnvFilter::try_new(&filter).context(InvalidFilterSnafu { filter })
    }

    /// Install a global `fmt` subscriber writing to stdout.
    ///
    /// Fails if a global subscriber is already installed.
    pub fn install_global_subscriber(&self) -> Result<(), Error> {
        let builder = tracing_subscriber::fmt().with_env_filter(self.env_filter()?);

        match self.log_format {
            LogFormat::Full => builder.try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
            LogFormat::Json => builder.json().try_init(),
        }
        .map_err(|e| Error::Install {
            reason: e.to_string(),
        })
    }
}
