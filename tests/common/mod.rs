#![allow(dead_code)]

use std::{collections::HashSet, fs, path::Path, time::Duration};

use mailshot::{
    Campaign, Dispatcher, Error, Event, Logger, Mail, Renderer, Result, SmtpError,
    TemplateContext, Throttle, Transport,
};

/// Records every message and fails for the configured addresses.
#[derive(Default)]
pub struct ScriptedTransport {
    pub sent: Vec<Mail>,
    pub attempts: Vec<String>,
    pub failing: HashSet<String>,
    pub fail_all: bool,
}

impl ScriptedTransport {
    pub fn failing_for(addresses: &[&str]) -> Self {
        ScriptedTransport {
            failing: addresses.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn always_failing() -> Self {
        ScriptedTransport {
            fail_all: true,
            ..Default::default()
        }
    }

    pub fn sent_to(&self) -> Vec<&str> {
        self.sent.iter().map(|m| m.to.as_str()).collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, mail: &Mail) -> Result<()> {
        self.attempts.push(mail.to.clone());
        if self.fail_all || self.failing.contains(&mail.to) {
            return Err(SmtpError::Policy(format!("550 no such user {}", mail.to)).into());
        }
        self.sent.push(mail.clone());
        Ok(())
    }
}

/// `Hi <recipient>, <sender>`; fails for the configured recipient names.
#[derive(Default)]
pub struct StubRenderer {
    pub broken_for: HashSet<String>,
}

impl StubRenderer {
    pub fn broken_for(names: &[&str]) -> Self {
        StubRenderer {
            broken_for: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

impl Renderer for StubRenderer {
    fn render(&self, template: &str, context: &TemplateContext<'_>) -> Result<String> {
        if self.broken_for.contains(context.recipient_name) {
            return Err(Error::Template(minijinja::Error::new(
                minijinja::ErrorKind::TemplateNotFound,
                template.to_string(),
            )));
        }
        Ok(format!(
            "Hi {}, {}",
            context.recipient_name, context.sender_name
        ))
    }
}

/// Keeps a one-word tag per event.
#[derive(Default)]
pub struct RecordingLogger {
    pub events: Vec<String>,
}

impl Logger for RecordingLogger {
    fn client(&mut self, _: &[u8]) {}
    fn server(&mut self, _: &[u8]) {}
    fn event(&mut self, event: Event<'_>) {
        let tag = match event {
            Event::Loaded { what, .. } => format!("loaded {what}"),
            Event::SkippedAlreadySent(line) => format!("skip-sent {line}"),
            Event::SkippedBad(line) => format!("skip-bad {line}"),
            Event::MailSent { line, .. } => format!("sent {line}"),
            Event::MailFailed { line, .. } => format!("failed {line}"),
            Event::BudgetExhausted { remaining, .. } => format!("budget {remaining}"),
            Event::ShutdownRequested { remaining } => format!("shutdown {remaining}"),
            Event::Persisted { count, .. } => format!("persisted {count}"),
            Event::PersistFailed { path, .. } => format!("persist-failed {}", file_name(path)),
            Event::ProgressLost(_) => "progress-lost".to_string(),
            Event::Finished(report) => format!("finished {}", report.attempts),
        };
        self.events.push(tag);
    }
}

pub fn campaign(budget: usize) -> Campaign {
    Campaign {
        subject: "Spring meetup".to_string(),
        sender_name: "Dora".to_string(),
        from: "dora@example.com".to_string(),
        template: "invite".to_string(),
        budget,
    }
}

pub type TestDispatcher = Dispatcher<StubRenderer, ScriptedTransport, RecordingLogger>;

pub fn dispatcher(budget: usize, transport: ScriptedTransport) -> TestDispatcher {
    dispatcher_with(budget, StubRenderer::default(), transport)
}

pub fn dispatcher_with(
    budget: usize,
    renderer: StubRenderer,
    transport: ScriptedTransport,
) -> TestDispatcher {
    Dispatcher::new(
        campaign(budget),
        renderer,
        transport,
        RecordingLogger::default(),
    )
    .with_throttle(Throttle::new(Duration::ZERO))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn throttled(budget: usize, transport: ScriptedTransport, interval: Duration) -> TestDispatcher {
    dispatcher(budget, transport).with_throttle(Throttle::new(interval))
}

pub fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn read_lines(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}
