use std::path::{Path, PathBuf};

use crate::{
    dispatch::{DispatchReport, Dispatcher, Halt},
    error::Result,
    input::EmailFile,
    logger::{Event, Logger},
    store,
    template::Renderer,
    transport::Transport,
};

/// The three recipient files of a run.
#[derive(Debug, Clone)]
pub struct Sources {
    pub recipients: PathBuf,
    pub already_sent: PathBuf,
    pub bad: PathBuf,
}

impl From<&EmailFile> for Sources {
    fn from(email: &EmailFile) -> Self {
        Sources {
            recipients: email.recipients_source.clone(),
            already_sent: email.already_sent_source.clone(),
            bad: email.bad_addresses_source.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub attempts: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped_already_sent: usize,
    pub skipped_bad: usize,
    pub not_attempted: usize,
    pub halt: Halt,
}

impl From<&DispatchReport> for RunSummary {
    fn from(report: &DispatchReport) -> Self {
        RunSummary {
            attempts: report.attempts,
            sent: report.newly_sent.len(),
            failed: report.newly_bad.len(),
            skipped_already_sent: report.skipped_already_sent,
            skipped_bad: report.skipped_bad,
            not_attempted: report.not_attempted,
            halt: report.halt,
        }
    }
}

/// Loads the recipient files, runs the dispatcher and appends whatever it
/// produced to the logs, also when it stopped on an error.
pub struct Runner<R, T, L>
where
    R: Renderer,
    T: Transport,
    L: Logger,
{
    sources: Sources,
    dispatcher: Dispatcher<R, T, L>,
}

impl<R, T, L> Runner<R, T, L>
where
    R: Renderer,
    T: Transport,
    L: Logger,
{
    pub fn new(sources: Sources, dispatcher: Dispatcher<R, T, L>) -> Self {
        Runner {
            sources,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<R, T, L> {
        &self.dispatcher
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        let candidates = store::load_recipients(&self.sources.recipients)?;
        let already_sent = store::load_already_sent(&self.sources.already_sent)?;
        let bad = store::load_bad(&self.sources.bad)?;

        let logger = self.dispatcher.logger_mut();
        logger.event(Event::Loaded {
            what: "recipients",
            lines: &candidates,
        });
        logger.event(Event::Loaded {
            what: "already sent recipients",
            lines: &already_sent,
        });
        logger.event(Event::Loaded {
            what: "bad e-mail addresses",
            lines: &bad,
        });

        let outcome = self.dispatcher.dispatch(&candidates, &already_sent, &bad);
        let report = match &outcome {
            Ok(report) => report,
            Err(aborted) => &aborted.report,
        };
        let persisted = persist(&self.sources, self.dispatcher.logger_mut(), report);

        match (outcome, persisted) {
            (Ok(report), Ok(())) => Ok(RunSummary::from(&report)),
            (Ok(_), Err(err)) => Err(err),
            (Err(aborted), Ok(())) => Err(aborted.into()),
            (Err(aborted), Err(err)) => {
                self.dispatcher
                    .logger_mut()
                    .event(Event::ProgressLost(&err));
                Err(aborted.into())
            }
        }
    }
}

/// Appends both accumulators. The second is written even if the first fails.
fn persist<L: Logger>(sources: &Sources, logger: &mut L, report: &DispatchReport) -> Result<()> {
    let sent = append(&sources.already_sent, logger, &report.newly_sent);
    let bad = append(&sources.bad, logger, &report.newly_bad);
    sent.and(bad)
}

fn append<L: Logger>(path: &Path, logger: &mut L, lines: &[String]) -> Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    if let Err(error) = store::append_lines(path, lines) {
        logger.event(Event::PersistFailed {
            path,
            error: &error,
        });
        return Err(error);
    }
    logger.event(Event::Persisted {
        path,
        count: lines.len(),
    });
    Ok(())
}
