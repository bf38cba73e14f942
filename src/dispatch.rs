//! The send loop.
//!
//! Candidates are walked once, in file order. Each one is skipped (already
//! sent or known bad), attempted (sent or failed), or left for a later run once
//! the per-run budget is spent. Skips are free; every attempt, successful or
//! not, costs one unit of budget.

use std::collections::HashSet;

use crate::{
    error::{Aborted, Error, Result},
    input::EmailFile,
    logger::{Event, Logger},
    mail::Mail,
    store::Recipient,
    template::{Renderer, TemplateContext},
    throttle::{Shutdown, Throttle},
    transport::Transport,
};

/// The fixed part of every message in a run.
#[derive(Debug, Clone)]
pub struct Campaign {
    pub subject: String,
    pub sender_name: String,
    pub from: String,
    pub template: String,
    pub budget: usize,
}

impl Campaign {
    pub fn new(email: &EmailFile, from: String) -> Campaign {
        Campaign {
            subject: email.subject.clone(),
            sender_name: email.sender_name.clone(),
            from,
            template: email.body_template.clone(),
            budget: email.package_size,
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Halt {
    #[default]
    Completed,
    BudgetExhausted,
    Shutdown,
}

/// What one candidate came to.
#[derive(Debug)]
pub enum Outcome {
    SkippedAlreadySent,
    SkippedBad,
    Sent,
    Failed(Error),
}

/// Result of one pass over the candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub newly_sent: Vec<String>,
    pub newly_bad: Vec<String>,
    pub attempts: usize,
    pub skipped_already_sent: usize,
    pub skipped_bad: usize,
    pub not_attempted: usize,
    pub halt: Halt,
}

pub struct Dispatcher<R, T, L>
where
    R: Renderer,
    T: Transport,
    L: Logger,
{
    campaign: Campaign,
    renderer: R,
    transport: T,
    logger: L,
    throttle: Throttle,
    shutdown: Shutdown,
}

impl<R, T, L> Dispatcher<R, T, L>
where
    R: Renderer,
    T: Transport,
    L: Logger,
{
    pub fn new(campaign: Campaign, renderer: R, transport: T, logger: L) -> Self {
        Dispatcher {
            campaign,
            renderer,
            transport,
            logger,
            throttle: Throttle::default(),
            shutdown: Shutdown::new(),
        }
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn campaign(&self) -> &Campaign {
        &self.campaign
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut L {
        &mut self.logger
    }

    /// Runs the batch. On an unrecovered error the report accumulated so far
    /// travels with the error so it can still be persisted.
    pub fn dispatch(
        &mut self,
        candidates: &[String],
        already_sent: &[String],
        bad: &[String],
    ) -> std::result::Result<DispatchReport, Aborted> {
        let already_sent: HashSet<&str> = already_sent.iter().map(String::as_str).collect();
        let bad: HashSet<&str> = bad.iter().map(String::as_str).collect();
        let mut sent_now: HashSet<&str> = HashSet::new();
        let mut bad_now: HashSet<&str> = HashSet::new();
        let mut report = DispatchReport::default();
        let budget = self.campaign.budget;

        for (index, line) in candidates.iter().enumerate() {
            let line = line.as_str();
            let remaining = candidates.len() - index;

            if report.attempts >= budget {
                report.halt = Halt::BudgetExhausted;
                report.not_attempted = remaining;
                self.logger
                    .event(Event::BudgetExhausted { budget, remaining });
                break;
            }
            if self.shutdown.is_requested() {
                report.halt = Halt::Shutdown;
                report.not_attempted = remaining;
                self.logger.event(Event::ShutdownRequested { remaining });
                break;
            }

            let outcome = if already_sent.contains(line) || sent_now.contains(line) {
                Outcome::SkippedAlreadySent
            } else if bad.contains(line) || bad_now.contains(line) {
                Outcome::SkippedBad
            } else {
                match self.attempt(line) {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        self.logger.event(Event::Finished(&report));
                        return Err(Aborted { report, error });
                    }
                }
            };

            match outcome {
                Outcome::SkippedAlreadySent => {
                    report.skipped_already_sent += 1;
                    self.logger.event(Event::SkippedAlreadySent(line));
                }
                Outcome::SkippedBad => {
                    report.skipped_bad += 1;
                    self.logger.event(Event::SkippedBad(line));
                }
                Outcome::Sent => {
                    report.attempts += 1;
                    sent_now.insert(line);
                    report.newly_sent.push(line.to_string());
                    // A shutdown cutting the pause short is seen at the top of
                    // the next iteration.
                    self.throttle.pause(&self.shutdown);
                }
                Outcome::Failed(error) => {
                    report.attempts += 1;
                    bad_now.insert(line);
                    report.newly_bad.push(line.to_string());
                    self.logger.event(Event::MailFailed {
                        line,
                        error: &error,
                    });
                }
            }
        }

        self.logger.event(Event::Finished(&report));
        Ok(report)
    }

    /// Renders and sends to one recipient. Only a line that cannot be split
    /// into name and email escapes as an error; every render or transport
    /// failure becomes `Outcome::Failed`.
    fn attempt(&mut self, line: &str) -> Result<Outcome> {
        let recipient = Recipient::parse(line)?;
        match self.deliver(&recipient) {
            Ok(()) => {
                self.logger.event(Event::MailSent {
                    line,
                    to: recipient.email,
                });
                Ok(Outcome::Sent)
            }
            Err(error) => Ok(Outcome::Failed(error)),
        }
    }

    fn deliver(&mut self, recipient: &Recipient<'_>) -> Result<()> {
        let campaign = &self.campaign;
        let body = self.renderer.render(
            &campaign.template,
            &TemplateContext {
                sender_name: &campaign.sender_name,
                recipient_name: recipient.name,
            },
        )?;
        let mail = Mail {
            subject: campaign.subject.clone(),
            from: campaign.from.clone(),
            from_name: Some(campaign.sender_name.clone()),
            to: recipient.email.to_string(),
            to_name: Some(recipient.name.to_string()),
            text: body,
        };
        self.transport.send(&mail)
    }
}
