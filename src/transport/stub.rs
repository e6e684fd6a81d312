//! The stub transport keeps every message in memory instead of sending it.
//!
//! Recipients can be marked as failing, to rehearse how a run reports
//! rejected addresses without a relay.
//!
//! ```rust
//! use smtp_dispatch::{
//!     transport::{
//!         smtp::{RelayCredentials, TransportSecurity},
//!         stub::StubTransport,
//!     },
//!     Envelope, Transport,
//! };
//!
//! let relay = RelayCredentials::new(
//!     "relay.example.org",
//!     587,
//!     TransportSecurity::Upgrade,
//!     "noreply@example.org",
//!     "secret",
//! );
//! let sender = StubTransport::new_ok().failing_for("bounce@example.com");
//!
//! let envelope = Envelope::new("noreply@example.org", "someone@example.com");
//! assert!(sender.send_raw(&relay, &envelope, b"Hello").is_ok());
//!
//! let envelope = Envelope::new("noreply@example.org", "bounce@example.com");
//! assert!(sender.send_raw(&relay, &envelope, b"Hello").is_err());
//!
//! assert_eq!(sender.messages().len(), 1);
//! ```

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    error::{self, Error},
    transport::smtp::{
        response::{Code, Response, Severity},
        RelayCredentials,
    },
    Envelope, Transport,
};

/// This transport records accepted messages and rejects chosen recipients
#[derive(Debug, Clone, Default)]
pub struct StubTransport {
    failing: HashSet<String>,
    message_log: Arc<Mutex<Vec<(Envelope, String)>>>,
}

impl StubTransport {
    /// Creates a new transport that accepts every message
    pub fn new_ok() -> StubTransport {
        StubTransport::default()
    }

    /// Rejects messages for `recipient` as a relay would at `RCPT TO`
    pub fn failing_for(mut self, recipient: impl Into<String>) -> StubTransport {
        self.failing.insert(recipient.into());
        self
    }

    /// Return all logged messages, in the order they were sent
    pub fn messages(&self) -> Vec<(Envelope, String)> {
        self.message_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for StubTransport {
    type Ok = Response;
    type Error = Error;

    fn send_raw(
        &self,
        _relay: &RelayCredentials,
        envelope: &Envelope,
        email: &[u8],
    ) -> Result<Self::Ok, Self::Error> {
        if self.failing.contains(envelope.to()) {
            return Err(error::protocol(
                "RCPT TO",
                Some(Code::new(Severity::PermanentNegativeCompletion, 5, 0)),
                "recipient rejected by stub",
            ));
        }

        self.message_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((envelope.clone(), String::from_utf8_lossy(email).into()));

        Ok(Response::new(
            Code::new(Severity::PositiveCompletion, 5, 0),
            vec!["Ok: queued".to_owned()],
        ))
    }
}
