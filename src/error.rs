//! Error and result type for dispatch runs

use std::{error::Error as StdError, fmt, io};

use crate::{transport::smtp::response::Code, BoxError};

/// The errors that may occur while configuring or performing a dispatch run
///
/// Only configuration errors ever leave [`Dispatcher::run`](crate::dispatch::Dispatcher::run).
/// Every other kind is folded into the failed recipient's outcome.
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
            }),
        }
    }

    /// Returns true if a required setting is missing or invalid
    pub fn is_configuration(&self) -> bool {
        matches!(self.inner.kind, Kind::Configuration)
    }

    /// Returns true if the transport could not be established or broke down
    pub fn is_connection(&self) -> bool {
        matches!(self.inner.kind, Kind::Connection)
    }

    /// Returns true if the relay answered with an unexpected reply
    pub fn is_protocol(&self) -> bool {
        matches!(self.inner.kind, Kind::Protocol { .. })
    }

    /// Returns true if the message payload could not be fully written
    pub fn is_transmission(&self) -> bool {
        matches!(self.inner.kind, Kind::Transmission)
    }

    /// Returns true if the error is caused by a timeout
    pub fn is_timeout(&self) -> bool {
        let mut source = self.source();

        while let Some(err) = source {
            if let Some(io_err) = err.downcast_ref::<io::Error>() {
                return matches!(
                    io_err.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                );
            }

            source = err.source();
        }

        false
    }

    /// Returns the reply code, if the error was generated from a reply.
    pub fn status(&self) -> Option<Code> {
        match self.inner.kind {
            Kind::Protocol { code, .. } => code,
            _ => None,
        }
    }

    /// The label of the command that was answered unexpectedly
    pub fn command(&self) -> Option<&'static str> {
        match self.inner.kind {
            Kind::Protocol { command, .. } => Some(command),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Required credential or setting missing, fatal for the whole run
    Configuration,
    /// Transport could not be established, timed out or failed mid-exchange
    Connection,
    /// Reply code other than the one required by the session state
    Protocol {
        command: &'static str,
        code: Option<Code>,
    },
    /// Message payload could not be fully written
    Transmission,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("smtp_dispatch::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Configuration => f.write_str("configuration")?,
            Kind::Connection => f.write_str("connection")?,
            Kind::Transmission => f.write_str("transmission")?,
            Kind::Protocol {
                command,
                code: Some(ref code),
            } => write!(f, "protocol: {command} answered {code}")?,
            Kind::Protocol {
                command,
                code: None,
            } => write!(f, "protocol: {command}")?,
        };

        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| {
            let r: &(dyn StdError + 'static) = &**e;
            r
        })
    }
}

pub(crate) fn configuration<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Configuration, Some(e))
}

pub(crate) fn connection<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connection, Some(e))
}

pub(crate) fn transmission<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Transmission, Some(e))
}

pub(crate) fn protocol<E: Into<BoxError>>(
    command: &'static str,
    code: Option<Code>,
    e: E,
) -> Error {
    Error::new(Kind::Protocol { command, code }, Some(e))
}
