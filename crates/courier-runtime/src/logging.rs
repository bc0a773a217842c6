//! Subscriber setup for Courier applications.
//!
//! The installed subscriber has two `fmt` layers writing to the same
//! destination:
//!
//! - the event layer, for everything the router, the middleware and the
//!   runtime emit, optionally with the open/close events of each `dispatch`
//!   span (which carry the run's busy and idle time)
//! - the access layer, which prints the lines of the `logger` middleware
//!   (target [`ACCESS_TARGET`]) bare, one request per line
//!
//! With `plain_access_log` off, access lines go through the event layer like
//! any other event.
//!
//! ```rust,ignore
//! use courier_runtime::config::load_config;
//! use courier_runtime::logging;
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging)?;
//! ```

use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use courier_framework::middleware::ACCESS_TARGET;
use thiserror::Error;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::{Directive, FilterExt, filter_fn};
use tracing_subscriber::fmt::format::{self, FmtSpan, FormatEvent, FormatFields};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::{self as fmt_layer, FmtContext};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LogOutput, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while installing the subscriber.
#[derive(Error, Debug)]
pub enum LoggingError {
    /// The log file could not be opened.
    #[error("Failed to open log file: {0}")]
    File(#[from] InitError),

    /// A global subscriber is already installed.
    #[error("Failed to install subscriber: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Installs the subscriber described by `config`.
///
/// An already installed global subscriber is kept.
pub fn init_from_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    match LoggingBuilder::from_config(config).try_init() {
        Err(LoggingError::AlreadyInstalled(_)) => Ok(()),
        result => result,
    }
}

fn is_access(metadata: &Metadata<'_>) -> bool {
    metadata.target() == ACCESS_TARGET
}

/// Formats an access event as its fields alone.
struct AccessLine;

impl<S, N> FormatEvent<S, N> for AccessLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// Builds the Courier subscriber.
///
/// # Example
///
/// ```rust,ignore
/// use courier_runtime::logging::LoggingBuilder;
/// use tracing::Level;
///
/// LoggingBuilder::new()
///     .with_level(Level::DEBUG)
///     .directive("courier_framework::matcher=trace")
///     .dispatch_spans(true)
///     .try_init()?;
/// ```
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    directives: Vec<String>,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    dispatch_spans: bool,
    plain_access_log: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            directives: Vec::new(),
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            dispatch_spans: false,
            plain_access_log: true,
        }
    }
}

impl LoggingBuilder {
    /// Compact lines on stdout at `info`, with plain access lines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors a `LoggingConfig`. Unknown levels fall back to `info`.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort();

        Self {
            level: Level::from_str(&config.level).unwrap_or(Level::INFO),
            directives: filters
                .into_iter()
                .map(|(target, level)| format!("{target}={}", level.to_lowercase()))
                .collect(),
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            dispatch_spans: config.dispatch_spans,
            plain_access_log: config.plain_access_log,
        }
    }

    /// Sets the base level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `courier::access=warn`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Sets the line format of the event layer.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Writes to stdout or stderr.
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Appends to the file at `path`.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = LogOutput::File;
        self.file_path = Some(path.into());
        self
    }

    /// Logs the open and close of every `dispatch` span.
    pub fn dispatch_spans(mut self, enabled: bool) -> Self {
        self.dispatch_spans = enabled;
        self
    }

    /// Prints access lines bare instead of as regular events.
    pub fn plain_access_log(mut self, enabled: bool) -> Self {
        self.plain_access_log = enabled;
        self
    }

    /// `RUST_LOG` replaces the base level; directives are added on top.
    /// Directives that fail to parse are skipped.
    fn filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));

        for directive in &self.directives {
            if let Ok(directive) = directive.parse::<Directive>() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }

    fn writer(&self) -> Result<BoxMakeWriter, LoggingError> {
        let writer = match (self.output, &self.file_path) {
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let appender = RollingFileAppender::builder()
                    .rotation(Rotation::NEVER)
                    .filename_prefix(
                        path.file_name()
                            .unwrap_or_else(|| OsStr::new("courier.log"))
                            .to_string_lossy(),
                    )
                    .build(path.parent().unwrap_or_else(|| Path::new(".")))?;
                BoxMakeWriter::new(appender)
            }
            // Validation rejects file output without a path.
            (LogOutput::Stdout | LogOutput::File, _) => BoxMakeWriter::new(std::io::stdout),
        };
        Ok(writer)
    }

    fn ansi(&self) -> bool {
        self.output != LogOutput::File
    }

    fn event_layer(&self) -> Result<BoxedLayer, LoggingError> {
        let spans = if self.dispatch_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt_layer::layer()
            .with_writer(self.writer()?)
            .with_ansi(self.ansi())
            .with_span_events(spans);

        let layer: BoxedLayer = match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => layer.boxed(),
            LogFormat::Full => layer.boxed(),
        };

        let filtered = if self.plain_access_log {
            layer
                .with_filter(self.filter().and(filter_fn(|m| !is_access(m))))
                .boxed()
        } else {
            layer.with_filter(self.filter()).boxed()
        };
        Ok(filtered)
    }

    fn access_layer(&self) -> Result<BoxedLayer, LoggingError> {
        Ok(fmt_layer::layer()
            .with_writer(self.writer()?)
            .with_ansi(self.ansi())
            .event_format(AccessLine)
            .with_filter(self.filter().and(filter_fn(is_access)))
            .boxed())
    }

    /// Builds the subscriber without installing it.
    pub fn build(&self) -> Result<impl Subscriber + Send + Sync + 'static, LoggingError> {
        let mut layers = vec![self.event_layer()?];
        if self.plain_access_log {
            layers.push(self.access_layer()?);
        }
        Ok(tracing_subscriber::registry().with(layers))
    }

    /// Installs the subscriber globally.
    pub fn try_init(self) -> Result<(), LoggingError> {
        self.build()?.try_init()?;
        Ok(())
    }
}
