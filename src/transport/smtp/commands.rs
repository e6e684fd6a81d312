//! SMTP commands issued by a protocol session

use std::fmt::{self, Display, Formatter};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::transport::smtp::{authentication::Mechanism, extension::ClientId};

/// EHLO command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Ehlo {
    client_id: ClientId,
}

impl Display for Ehlo {
    #[allow(clippy::write_with_newline)]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EHLO {}\r\n", self.client_id)
    }
}

impl Ehlo {
    /// Creates a EHLO command
    pub fn new(client_id: ClientId) -> Ehlo {
        Ehlo { client_id }
    }
}

/// STARTTLS command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Starttls;

impl Display for Starttls {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("STARTTLS\r\n")
    }
}

/// AUTH command, without initial response
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Auth {
    mechanism: Mechanism,
}

impl Display for Auth {
    #[allow(clippy::write_with_newline)]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "AUTH {}\r\n", self.mechanism)
    }
}

impl Auth {
    /// Creates an AUTH command
    pub fn new(mechanism: Mechanism) -> Auth {
        Auth { mechanism }
    }
}

/// One base64 framed answer to a `334` challenge
#[derive(PartialEq, Eq, Clone)]
pub struct AuthResponse {
    encoded: String,
}

impl Display for AuthResponse {
    #[allow(clippy::write_with_newline)]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", self.encoded)
    }
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse").finish_non_exhaustive()
    }
}

impl AuthResponse {
    /// Base64 encodes the given frame
    pub fn new(frame: &str) -> AuthResponse {
        AuthResponse {
            encoded: STANDARD.encode(frame),
        }
    }
}

/// MAIL command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Mail<'a> {
    sender: &'a str,
}

impl Display for Mail<'_> {
    #[allow(clippy::write_with_newline)]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MAIL FROM:<{}>\r\n", self.sender)
    }
}

impl<'a> Mail<'a> {
    /// Creates a MAIL command
    pub fn new(sender: &'a str) -> Mail<'a> {
        Mail { sender }
    }
}

/// RCPT command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Rcpt<'a> {
    recipient: &'a str,
}

impl Display for Rcpt<'_> {
    #[allow(clippy::write_with_newline)]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RCPT TO:<{}>\r\n", self.recipient)
    }
}

impl<'a> Rcpt<'a> {
    /// Creates an RCPT command
    pub fn new(recipient: &'a str) -> Rcpt<'a> {
        Rcpt { recipient }
    }
}

/// DATA command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Data;

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("DATA\r\n")
    }
}

/// QUIT command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Quit;

impl Display for Quit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("QUIT\r\n")
    }
}
