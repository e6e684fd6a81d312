//! The SMTP transport sends each message over its own session with a relay.
//!
//! This client follows [RFC 5321](https://tools.ietf.org/html/rfc5321) and
//! relies on the relay for delivery. A session always:
//!
//! * reads the `220` greeting and identifies with `EHLO`
//! * upgrades with `STARTTLS` ([RFC 3207](https://tools.ietf.org/html/rfc3207))
//!   when the relay is configured for [`TransportSecurity::Upgrade`], then
//!   identifies again on the encrypted channel
//! * authenticates with `AUTH LOGIN`
//! * sends one envelope and one payload, then `QUIT`
//!
//! ```rust,no_run
//! use smtp_dispatch::{
//!     transport::smtp::{RelayCredentials, SmtpTransport, TransportSecurity, SUBMISSION_PORT},
//!     Envelope, Transport,
//! };
//!
//! # fn main() -> Result<(), smtp_dispatch::Error> {
//! let relay = RelayCredentials::new(
//!     "smtp.example.org",
//!     SUBMISSION_PORT,
//!     TransportSecurity::Upgrade,
//!     "noreply@example.org",
//!     "secret",
//! );
//! let transport = SmtpTransport::builder().build()?;
//!
//! let envelope = Envelope::new("noreply@example.org", "someone@example.com");
//! transport.send_raw(&relay, &envelope, b"Subject: hi\r\n\r\nHello\r\n")?;
//! # Ok(())
//! # }
//! ```

use std::{
    fmt::{self, Debug},
    time::Duration,
};

use serde::Deserialize;

use self::{
    authentication::Credentials,
    client::{ProtocolSession, TlsParameters},
    extension::ClientId,
    response::Response,
};
use crate::{
    error::{self, Error},
    Envelope, Transport,
};

pub mod authentication;
pub mod client;
pub mod commands;
pub mod extension;
pub mod response;

// Registered port numbers:
// https://www.iana.org/assignments/service-names-port-numbers/service-names-port-numbers.xhtml

/// Default smtp port
pub const SMTP_PORT: u16 = 25;
/// Default submission port
pub const SUBMISSION_PORT: u16 = 587;

/// Default time allowed to establish the transport
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default time allowed for each read or write of a command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// How the transport to the relay is secured
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportSecurity {
    /// Cleartext for the whole session
    Plain,
    /// Cleartext connect, then mandatory `STARTTLS`
    #[default]
    Upgrade,
}

impl TransportSecurity {
    /// The port conventionally used with this mode
    pub fn default_port(self) -> u16 {
        match self {
            TransportSecurity::Plain => SMTP_PORT,
            TransportSecurity::Upgrade => SUBMISSION_PORT,
        }
    }
}

/// Everything needed to reach and authenticate against a relay
///
/// Created once per run and passed to every send. The principal defaults
/// to the sender address.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayCredentials {
    host: String,
    port: u16,
    security: TransportSecurity,
    sender: String,
    sender_name: Option<String>,
    username: Option<String>,
    secret: String,
}

impl RelayCredentials {
    /// Creates relay credentials authenticating as `sender`
    pub fn new(
        host: impl Into<String>,
        port: u16,
        security: TransportSecurity,
        sender: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        RelayCredentials {
            host: host.into(),
            port,
            security,
            sender: sender.into(),
            sender_name: None,
            username: None,
            secret: secret.into(),
        }
    }

    /// Sets the display name shown next to the sender address
    pub fn sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Authenticates as `username` instead of the sender address
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Checks every required field is present
    pub fn validate(&self) -> Result<(), Error> {
        if self.host.trim().is_empty() {
            return Err(error::configuration("relay host is missing"));
        }
        if self.port == 0 {
            return Err(error::configuration("relay port must not be 0"));
        }
        if self.sender.trim().is_empty() {
            return Err(error::configuration("sender address is missing"));
        }
        if !self.login_credentials().has_secret() {
            return Err(error::configuration("relay secret is missing"));
        }
        Ok(())
    }

    /// Relay host name, also checked against its certificate
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Relay port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Transport security mode
    pub fn security(&self) -> TransportSecurity {
        self.security
    }

    /// Sender address, used in `MAIL FROM` and `From`
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Display name of the sender, if any
    pub fn display_name(&self) -> Option<&str> {
        self.sender_name.as_deref()
    }

    /// Credentials for `AUTH LOGIN`
    pub fn login_credentials(&self) -> Credentials {
        Credentials::new(
            self.username.clone().unwrap_or_else(|| self.sender.clone()),
            self.secret.clone(),
        )
    }
}

impl Debug for RelayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("sender", &self.sender)
            .field("sender_name", &self.sender_name)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Sends emails with a fresh SMTP session per message
///
/// Holds only run-wide settings, the relay itself is described by the
/// [`RelayCredentials`] given to each send.
#[derive(Clone, Debug)]
pub struct SmtpTransport {
    /// Name sent during EHLO
    hello_name: ClientId,
    connect_timeout: Option<Duration>,
    command_timeout: Option<Duration>,
    tls_parameters: TlsParameters,
}

impl SmtpTransport {
    /// Creates a builder with the default timeouts and certificate checks
    pub fn builder() -> SmtpTransportBuilder {
        SmtpTransportBuilder::default()
    }

    /// Opens and negotiates a session, ready for [`ProtocolSession::transmit`]
    pub fn session(&self, relay: &RelayCredentials) -> Result<ProtocolSession, Error> {
        let mut session = ProtocolSession::open(
            relay.host(),
            relay.port(),
            self.connect_timeout,
            self.command_timeout,
        )?;
        session.negotiate(relay, &self.hello_name, &self.tls_parameters)?;
        Ok(session)
    }
}

impl Transport for SmtpTransport {
    type Ok = Response;
    type Error = Error;

    /// Sends an email over its own session
    fn send_raw(
        &self,
        relay: &RelayCredentials,
        envelope: &Envelope,
        email: &[u8],
    ) -> Result<Self::Ok, Self::Error> {
        let mut session = self.session(relay)?;
        let result = session.transmit(email, envelope.from(), envelope.to());
        session.close();

        result
    }
}

/// Contains client configuration
#[derive(Clone, Debug)]
pub struct SmtpTransportBuilder {
    hello_name: Option<ClientId>,
    connect_timeout: Option<Duration>,
    command_timeout: Option<Duration>,
    accept_invalid_certs: bool,
}

impl Default for SmtpTransportBuilder {
    fn default() -> Self {
        Self {
            hello_name: None,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            accept_invalid_certs: false,
        }
    }
}

/// Builder for the SMTP `SmtpTransport`
impl SmtpTransportBuilder {
    /// Set the name used during EHLO, defaults to the local host name
    pub fn hello_name(mut self, name: ClientId) -> Self {
        self.hello_name = Some(name);
        self
    }

    /// Set the time allowed to establish the transport
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the time allowed for every read and write once connected
    pub fn command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Accept relay certificates that fail verification
    ///
    /// See [`TlsParametersBuilder::dangerous_accept_invalid_certs`](client::TlsParametersBuilder::dangerous_accept_invalid_certs).
    pub fn dangerous_accept_invalid_certs(mut self, accept_invalid_certs: bool) -> Self {
        self.accept_invalid_certs = accept_invalid_certs;
        self
    }

    /// Build the transport
    pub fn build(self) -> Result<SmtpTransport, Error> {
        let tls_parameters = TlsParameters::builder()
            .dangerous_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;

        Ok(SmtpTransport {
            hello_name: self.hello_name.unwrap_or_default(),
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
            tls_parameters,
        })
    }
}
