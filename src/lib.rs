//! Bulk dispatch of one message to a list of recipients through an SMTP relay.
//!
//! Each recipient is attempted exactly once, in order, over its own
//! authenticated SMTP session. A failure is recorded against that recipient
//! and the run carries on; pauses between messages and between batches
//! keep the sending rate within what the relay tolerates.
//!
//! The crate is made of three layers:
//!
//! * [`transport::smtp`]: the protocol session (greeting, `EHLO`, optional
//!   `STARTTLS` upgrade, `AUTH LOGIN`, one envelope and one payload, `QUIT`)
//! * [`message`]: the `multipart/alternative` composer, with a plain text
//!   and an HTML variant of the same content
//! * [`dispatch`]: the scheduler, folding per-recipient outcomes into a
//!   [`RunSummary`](dispatch::RunSummary)
//!
//! [`config`] and [`recipients`] provide a TOML configuration file and a
//! line-oriented recipient list for the `smtp-dispatch` binary.
//!
//! ## Example
//!
//! ```rust,no_run
//! use smtp_dispatch::{
//!     dispatch::{ConsoleReport, Dispatcher},
//!     recipients::RecipientSource,
//!     Config,
//! };
//!
//! # fn main() -> Result<(), smtp_dispatch::Error> {
//! let config = Config::from_path("dispatch.toml")?;
//! let recipients = config.recipients().recipients()?;
//!
//! let mut dispatcher = Dispatcher::new(config.transport()?);
//! let summary = dispatcher.run(
//!     &recipients,
//!     config.relay(),
//!     config.content(),
//!     config.pacing(),
//!     false,
//!     &mut ConsoleReport::new(std::io::stdout()),
//! )?;
//!
//! if !summary.is_success() {
//!     std::process::exit(1);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! * **tracing** (default): logs the SMTP exchange and every attempt with `tracing`
//! * **cli** (default): builds the `smtp-dispatch` binary

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_import_braces, unused_qualifications)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod address;
pub mod config;
pub mod dispatch;
mod error;
pub mod message;
pub mod recipients;
pub mod transport;

pub use crate::{
    address::Envelope,
    config::Config,
    error::Error,
    transport::{smtp::SmtpTransport, Transport},
};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
