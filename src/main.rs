use std::{error::Error as _, path::PathBuf, process::ExitCode};

use clap::Parser;
use mailshot::{
    AccountFile, Campaign, Dispatcher, EmailFile, JinjaRenderer, Result, RunSummary, Runner,
    Shutdown, SmtpTransport, Sources, TraceLogger,
};

/// Sends the next batch of a mailing and records who got it.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Message settings: subject, sender name, recipient files, template, package size.
    #[arg(long, default_value = "email.toml")]
    email: PathBuf,

    /// Account and SMTP server settings.
    #[arg(long, default_value = "email_account.toml")]
    account: PathBuf,

    /// File the run log is appended to.
    #[arg(long, default_value = "mailshot.log")]
    log_file: PathBuf,
}

fn execute(cli: &Cli) -> Result<RunSummary> {
    let email = EmailFile::load(&cli.email)?;
    email.log();
    let account = AccountFile::load(&cli.account)?;
    account.log();

    let (from, server, config, credentials) = account.destruct();
    let shutdown = Shutdown::install()?;
    let dispatcher = Dispatcher::new(
        Campaign::new(&email, from),
        JinjaRenderer::new(&email.template_dir),
        SmtpTransport::new(server, config, credentials, TraceLogger),
        TraceLogger,
    )
    .with_shutdown(shutdown);

    Runner::new(Sources::from(&email), dispatcher).run()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = mailshot::logger::init(Some(&cli.log_file)) {
        eprintln!("failed to set up logging: {err}");
        return ExitCode::FAILURE;
    }

    match execute(&cli) {
        Ok(summary) => {
            tracing::info!(
                attempts = summary.attempts,
                sent = summary.sent,
                failed = summary.failed,
                skipped_already_sent = summary.skipped_already_sent,
                skipped_bad = summary.skipped_bad,
                not_attempted = summary.not_attempted,
                halt = ?summary.halt,
                "run finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{err}");
            let mut source = err.source();
            while let Some(cause) = source {
                tracing::error!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
