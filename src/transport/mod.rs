//! ## Transports for sending emails
//!
//! | Module   | Description                                |
//! | -------- | ------------------------------------------ |
//! | [`smtp`] | One authenticated SMTP session per message |
//! | [`stub`] | Records messages in memory, for tests      |

use crate::{message::ComposedMessage, transport::smtp::RelayCredentials, Envelope};

pub mod smtp;
pub mod stub;

/// Blocking Transport method for emails
pub trait Transport {
    /// Response produced by the Transport
    type Ok;
    /// Error produced by the Transport
    type Error;

    /// Sends a composed message to its envelope recipient
    fn send(
        &self,
        relay: &RelayCredentials,
        message: &ComposedMessage,
    ) -> Result<Self::Ok, Self::Error> {
        self.send_raw(relay, message.envelope(), message.formatted())
    }

    /// Sends an already formatted payload
    fn send_raw(
        &self,
        relay: &RelayCredentials,
        envelope: &Envelope,
        email: &[u8],
    ) -> Result<Self::Ok, Self::Error>;
}
