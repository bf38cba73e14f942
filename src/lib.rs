//! Batch mail dispatch with a durable memory of who has been mailed.
//!
//! A run reads a candidate list, skips everyone already mailed or known to be
//! bad, sends to at most `package-size` of the rest and appends the newly sent
//! and newly failed lines to the two log files. Repeated runs converge on
//! every good recipient being mailed exactly once.

mod connection;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod logger;
pub mod mail;
pub mod run;
pub mod store;
pub mod template;
pub mod throttle;
pub mod transport;

pub use connection::{Config, Credentials, Server};
pub use dispatch::{Campaign, DispatchReport, Dispatcher, Halt, Outcome};
pub use error::{Aborted, Error, Result, SmtpError};
pub use input::{AccountFile, EmailFile};
pub use logger::{Event, Logger, TraceLogger};
pub use mail::Mail;
pub use run::{RunSummary, Runner, Sources};
pub use template::{JinjaRenderer, Renderer, TemplateContext};
pub use throttle::{Shutdown, Throttle};
pub use transport::{SmtpTransport, Transport};
