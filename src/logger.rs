use std::{fs::OpenOptions, io, path::Path, sync::Arc};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::{dispatch::DispatchReport, error::Error};

/// Everything the dispatcher and the SMTP session report while a run is in
/// progress.
#[derive(Debug)]
pub enum Event<'a> {
    Loaded {
        what: &'static str,
        lines: &'a [String],
    },
    SkippedAlreadySent(&'a str),
    SkippedBad(&'a str),
    MailSent {
        line: &'a str,
        to: &'a str,
    },
    MailFailed {
        line: &'a str,
        error: &'a Error,
    },
    BudgetExhausted {
        budget: usize,
        remaining: usize,
    },
    ShutdownRequested {
        remaining: usize,
    },
    Persisted {
        path: &'a Path,
        count: usize,
    },
    PersistFailed {
        path: &'a Path,
        error: &'a Error,
    },
    /// The run aborted and its progress could not be written either.
    ProgressLost(&'a Error),
    Finished(&'a DispatchReport),
}

/// Sink for the SMTP transcript and dispatch events. Passed explicitly to
/// whoever needs it instead of living in a global.
pub trait Logger {
    fn client(&mut self, data: &[u8]);
    fn server(&mut self, data: &[u8]);
    fn event(&mut self, event: Event<'_>);
}

/// Forwards everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceLogger;

impl Logger for TraceLogger {
    fn client(&mut self, data: &[u8]) {
        tracing::trace!(target: "mailshot::smtp", "C: {}", String::from_utf8_lossy(data).trim_end());
    }

    fn server(&mut self, data: &[u8]) {
        tracing::trace!(target: "mailshot::smtp", "S: {}", String::from_utf8_lossy(data).trim_end());
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Loaded { what, lines } => {
                tracing::info!(count = lines.len(), "loaded {what}");
                for line in lines {
                    tracing::debug!("{what}: {line}");
                }
            }
            Event::SkippedAlreadySent(line) => {
                tracing::info!("mail already sent to {line:?}, not sending it again")
            }
            Event::SkippedBad(line) => {
                tracing::info!("{line:?} is a bad address, not sending to it again")
            }
            Event::MailSent { line, to } => tracing::info!(recipient = line, "--> sent to <{to}>"),
            Event::MailFailed { line, error } => {
                tracing::error!(recipient = line, "error during sending mail: {error}")
            }
            Event::BudgetExhausted { budget, remaining } => tracing::info!(
                budget,
                remaining,
                "package size reached, leaving the rest for the next run"
            ),
            Event::ShutdownRequested { remaining } => {
                tracing::warn!(remaining, "shutdown requested, stopping the batch")
            }
            Event::Persisted { path, count } => {
                tracing::info!(count, "appended to {}", path.display())
            }
            Event::PersistFailed { path, error } => {
                tracing::error!("failed to update {}: {error}", path.display())
            }
            Event::ProgressLost(error) => {
                tracing::error!("progress of the aborted run was not saved: {error}")
            }
            Event::Finished(report) => tracing::info!(
                attempts = report.attempts,
                sent = report.newly_sent.len(),
                failed = report.newly_bad.len(),
                "sent messages (pieces): {}",
                report.newly_sent.len()
            ),
        }
    }
}

fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

/// Maps a `LOG_LEVEL` value to a filter, `None` if it names no level.
fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        _ => None,
    }
}

/// Installs the console subscriber and, when `log_file` is given, a second
/// plain-text layer appending to that file.
pub fn init(log_file: Option<&Path>) -> io::Result<()> {
    let requested = std::env::var("LOG_LEVEL").ok();
    let level = requested
        .as_deref()
        .and_then(parse_level)
        .unwrap_or_else(default_level);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                    .with_writer(Arc::new(file))
                    .with_filter(level),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_ansi(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(level),
        )
        .with(file_layer)
        .try_init()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

    if let Some(value) = requested.filter(|value| parse_level(value).is_none()) {
        tracing::warn!("unknown LOG_LEVEL {value:?}, using {level}");
    }
    Ok(())
}
