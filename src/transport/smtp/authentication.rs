//! LOGIN authentication, the two-step challenge/response exchange

use std::fmt::{self, Debug, Display, Formatter};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::transport::smtp::response::Response;

/// Contains user credentials
#[derive(PartialEq, Eq, Clone, Hash)]
pub struct Credentials {
    authentication_identity: String,
    secret: String,
}

impl Credentials {
    /// Create a `Credentials` struct from principal and secret
    pub fn new(username: String, password: String) -> Credentials {
        Credentials {
            authentication_identity: username,
            secret: password,
        }
    }

    /// The frame answering the given LOGIN step
    pub(crate) fn login_frame(&self, step: LoginStep) -> &str {
        match step {
            LoginStep::Principal => &self.authentication_identity,
            LoginStep::Secret => &self.secret,
        }
    }

    /// Tells if there is a non-empty secret to authenticate with
    pub fn has_secret(&self) -> bool {
        !self.secret.is_empty()
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").finish()
    }
}

/// Authentication mechanisms recognised in `EHLO` replies
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum Mechanism {
    /// PLAIN authentication mechanism, defined in
    /// [RFC 4616](https://tools.ietf.org/html/rfc4616)
    ///
    /// Only tracked as a capability, sessions always authenticate with `LOGIN`.
    Plain,
    /// LOGIN authentication mechanism
    ///
    /// Defined in [draft-murchison-sasl-login-00](https://www.ietf.org/archive/id/draft-murchison-sasl-login-00.txt).
    Login,
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
        })
    }
}

/// The two frames of a LOGIN exchange, in order
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum LoginStep {
    /// Answer to the first `334`, identifies the principal
    Principal,
    /// Answer to the second `334`, carries the secret
    Secret,
}

/// Decodes the base64 prompt of a `334` challenge, e.g. `Username:`
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
pub(crate) fn decode_challenge(response: &Response) -> Option<String> {
    response
        .first_word()
        .and_then(|word| STANDARD.decode(word).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
