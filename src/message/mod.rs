//! Builds the `multipart/alternative` message sent to each recipient
//!
//! ## Usage
//!
//! ```rust
//! use smtp_dispatch::message::compose;
//!
//! let message = compose(
//!     "noreply@example.org",
//!     Some("Example Team"),
//!     "someone@example.com",
//!     "Happy new year",
//!     "Be happy!",
//!     "<p>Be <b>happy</b>!</p>",
//! );
//!
//! assert_eq!(message.envelope().to(), "someone@example.com");
//! ```
//!
//! Which produces:
//!
//! ```sh
//! From: "Example Team" <noreply@example.org>
//! To: someone@example.com
//! Subject: Happy new year
//! MIME-Version: 1.0
//! Content-Type: multipart/alternative;
//!  boundary="0oVZ2r3NOUHaDSjNVVx8xsRdBJIS0M6BvcEK3oPJ"
//!
//! --0oVZ2r3NOUHaDSjNVVx8xsRdBJIS0M6BvcEK3oPJ
//! Content-Type: text/plain; charset=utf-8
//! Content-Transfer-Encoding: 7bit
//!
//! Be happy!
//! --0oVZ2r3NOUHaDSjNVVx8xsRdBJIS0M6BvcEK3oPJ
//! Content-Type: text/html; charset=utf-8
//! Content-Transfer-Encoding: 7bit
//!
//! <p>Be <b>happy</b>!</p>
//! --0oVZ2r3NOUHaDSjNVVx8xsRdBJIS0M6BvcEK3oPJ--
//! ```
//!
//! Non-ASCII subjects and display names are written as _UTF8-Base64_
//! encoded words. Each part is sent `7bit` when it is ASCII with short
//! lines, `quoted-printable` otherwise. The boundary is drawn at random for
//! every message.

use std::{io::Write, iter};

pub use self::body::{Body, ContentTransferEncoding};
use crate::{transport::smtp::RelayCredentials, Envelope};

mod body;
mod encoded_word;

const BOUNDARY_LEN: usize = 40;

/// Create a random MIME boundary.
fn make_boundary() -> String {
    iter::repeat_with(fastrand::alphanumeric)
        .take(BOUNDARY_LEN)
        .collect()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// The content shared by every message of a run
///
/// Bodies are encoded once, only the recipient and the boundary change
/// between messages.
#[derive(Debug, Clone)]
pub struct MessageContent {
    subject: String,
    text: Body,
    html: Body,
}

impl MessageContent {
    /// Creates the content from a subject and both body variants
    pub fn new(subject: impl Into<String>, text: &str, html: &str) -> Self {
        MessageContent {
            subject: subject.into(),
            text: Body::new(text),
            html: Body::new(html),
        }
    }

    /// The subject, as given
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Composes the message for one recipient, from the relay's sender
    pub fn compose_for(&self, relay: &RelayCredentials, to: &str) -> ComposedMessage {
        self.compose(relay.sender(), relay.display_name(), to)
    }

    /// Composes the message for one recipient
    pub fn compose(&self, from: &str, from_name: Option<&str>, to: &str) -> ComposedMessage {
        let mut boundary = make_boundary();
        while contains(self.text.as_ref(), boundary.as_bytes())
            || contains(self.html.as_ref(), boundary.as_bytes())
        {
            boundary = make_boundary();
        }

        let mut out = Vec::with_capacity(self.text.len() + self.html.len() + 512);
        self.format(&mut out, &boundary, from, from_name, to);

        ComposedMessage {
            envelope: Envelope::new(from, to),
            boundary,
            formatted: out,
        }
    }

    fn format(
        &self,
        out: &mut Vec<u8>,
        boundary: &str,
        from: &str,
        from_name: Option<&str>,
        to: &str,
    ) {
        // Writes into a Vec<u8> can't fail
        let _ = write!(
            out,
            "From: {}\r\n\
             To: {to}\r\n\
             Subject: {}\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: multipart/alternative;\r\n boundary=\"{boundary}\"\r\n\
             \r\n",
            encoded_word::mailbox(from_name, from),
            encoded_word::encode(&self.subject),
        );

        for (mime, part) in [("text/plain", &self.text), ("text/html", &self.html)] {
            let _ = write!(
                out,
                "--{boundary}\r\n\
                 Content-Type: {mime}; charset=utf-8\r\n\
                 Content-Transfer-Encoding: {}\r\n\
                 \r\n",
                part.encoding(),
            );
            out.extend_from_slice(part.as_ref());
            out.extend_from_slice(b"\r\n");
        }

        let _ = write!(out, "--{boundary}--\r\n");
    }
}

/// Builds the message for one recipient
///
/// Pure, apart from drawing a random boundary.
pub fn compose(
    from: &str,
    from_name: Option<&str>,
    to: &str,
    subject: &str,
    text_body: &str,
    html_body: &str,
) -> ComposedMessage {
    MessageContent::new(subject, text_body, html_body).compose(from, from_name, to)
}

/// A message ready to be transmitted to a single recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    envelope: Envelope,
    boundary: String,
    formatted: Vec<u8>,
}

impl ComposedMessage {
    /// Get `ComposedMessage` envelope
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Get message content formatted for SMTP
    pub fn formatted(&self) -> &[u8] {
        &self.formatted
    }

    /// The boundary delimiting both parts
    pub fn boundary(&self) -> &str {
        &self.boundary
    }
}
