//! The envelope of a message, as given to the relay

/// Simple email envelope representation
///
/// Carries the reverse path used in `MAIL FROM` and the single forward
/// path used in `RCPT TO`. Addresses are taken as given, the recipient
/// source is responsible for their well-formedness.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Envelope {
    /// The envelope recipient's address
    forward_path: String,
    /// The envelope sender address
    reverse_path: String,
}

impl Envelope {
    /// Creates a new envelope for one recipient
    ///
    /// # Examples
    ///
    /// ```
    /// use smtp_dispatch::Envelope;
    ///
    /// let envelope = Envelope::new("noreply@example.org", "someone@example.com");
    /// assert_eq!(envelope.to(), "someone@example.com");
    /// ```
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Envelope {
        Envelope {
            forward_path: to.into(),
            reverse_path: from.into(),
        }
    }

    /// Gets the destination address of the envelope.
    pub fn to(&self) -> &str {
        &self.forward_path
    }

    /// Gets the sender of the envelope.
    pub fn from(&self) -> &str {
        &self.reverse_path
    }
}
