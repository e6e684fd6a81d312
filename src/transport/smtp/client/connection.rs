use std::{
    fmt::{self, Debug, Display},
    io::{self, BufRead, BufReader, Write},
    net::Shutdown,
    str,
    time::Duration,
};

#[cfg(feature = "tracing")]
use super::escape_crlf;
use super::{ClientCodec, NetworkStream, TlsParameters};
#[cfg(feature = "tracing")]
use crate::transport::smtp::{authentication::decode_challenge, extension::Extension};
use crate::{
    error::{self, Error},
    transport::smtp::{
        authentication::{Credentials, LoginStep, Mechanism},
        commands::{Auth, AuthResponse, Data, Ehlo, Mail, Quit, Rcpt, Starttls},
        extension::{ClientId, ServerInfo},
        response::{parse_response, Response},
        RelayCredentials, TransportSecurity,
    },
};

/// Where a [`ProtocolSession`] stands in the exchange with the relay
///
/// Every state is reached only after the reply expected by the previous
/// one was read.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum SessionState {
    /// Transport open, greeting not read yet
    Connecting,
    /// `220` greeting received
    Greeted,
    /// `EHLO` accepted
    EhloSent,
    /// `STARTTLS` accepted, handshake pending
    TlsRequested,
    /// Transport encrypted
    TlsEstablished,
    /// `AUTH LOGIN` answered with the principal challenge
    AuthChallenged,
    /// Principal accepted, secret requested
    AuthSecretPrompted,
    /// `235` received
    Authenticated,
    /// `MAIL FROM` accepted
    SenderDeclared,
    /// `RCPT TO` accepted
    RecipientDeclared,
    /// `DATA` answered with `354`
    DataModeEntered,
    /// Payload accepted
    BodyTransmitted,
    /// `QUIT` sent
    SessionClosing,
    /// Transport released
    Closed,
}

/// One SMTP conversation with a relay, for a single message
///
/// Dropping the session closes it, sending `QUIT` first when the
/// connection is still usable.
pub struct ProtocolSession {
    /// Buffered stream to the relay
    stream: BufReader<NetworkStream>,
    state: SessionState,
    /// Set once a read, a write or a reply parse failed
    broken: bool,
    /// Information from the last `EHLO` reply
    server_info: ServerInfo,
}

impl Debug for ProtocolSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolSession")
            .field("state", &self.state)
            .field("broken", &self.broken)
            .field("encrypted", &self.is_encrypted())
            .finish_non_exhaustive()
    }
}

impl ProtocolSession {
    /// Connects to the relay and reads its greeting
    ///
    /// `connect_timeout` bounds establishing the transport, `command_timeout`
    /// every later read and write.
    pub fn open(
        host: &str,
        port: u16,
        connect_timeout: Option<Duration>,
        command_timeout: Option<Duration>,
    ) -> Result<ProtocolSession, Error> {
        let stream = NetworkStream::connect(host, port, connect_timeout)?;

        #[cfg(feature = "tracing")]
        if let Ok(addr) = stream.peer_addr() {
            tracing::debug!("connected to {addr}");
        }

        ProtocolSession::greet(stream, command_timeout)
    }

    /// Wraps an already open stream and reads the greeting
    pub(crate) fn greet(
        stream: NetworkStream,
        command_timeout: Option<Duration>,
    ) -> Result<ProtocolSession, Error> {
        let mut session = ProtocolSession {
            stream: BufReader::new(stream),
            state: SessionState::Connecting,
            broken: false,
            server_info: ServerInfo::default(),
        };
        session
            .set_timeout(command_timeout)
            .map_err(error::connection)?;
        session.expect("greeting", 220, SessionState::Greeted)?;

        Ok(session)
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get information about the relay
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Tells if the underlying stream is currently encrypted
    pub fn is_encrypted(&self) -> bool {
        self.stream.get_ref().is_encrypted()
    }

    /// Set timeout
    pub fn set_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        self.stream.get_mut().set_read_timeout(duration)?;
        self.stream.get_mut().set_write_timeout(duration)
    }

    /// Identifies, upgrades the transport when asked to, and authenticates
    ///
    /// Advertised capabilities are only logged: `STARTTLS` and `AUTH LOGIN`
    /// are attempted whether or not the relay lists them.
    pub fn negotiate(
        &mut self,
        relay: &RelayCredentials,
        hello_name: &ClientId,
        tls_parameters: &TlsParameters,
    ) -> Result<(), Error> {
        self.ehlo(hello_name)?;

        if relay.security() == TransportSecurity::Upgrade {
            self.starttls(relay.host(), hello_name, tls_parameters)?;
        }

        self.auth(&relay.login_credentials())
    }

    fn starttls(
        &mut self,
        domain: &str,
        hello_name: &ClientId,
        tls_parameters: &TlsParameters,
    ) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        if !self.server_info.supports_feature(Extension::StartTls) {
            tracing::debug!("STARTTLS not advertised by {}, trying anyway", self.server_info.name());
        }

        self.command(Starttls, "STARTTLS", 220, SessionState::TlsRequested)?;

        // Anything already buffered was sent in plaintext before the handshake
        if !self.stream.buffer().is_empty() {
            self.broken = true;
            return Err(error::protocol(
                "STARTTLS",
                None,
                "relay sent data before the TLS handshake",
            ));
        }

        if let Err(err) = self.stream.get_mut().upgrade_tls(tls_parameters, domain) {
            self.broken = true;
            return Err(err);
        }
        self.state = SessionState::TlsEstablished;

        #[cfg(feature = "tracing")]
        tracing::debug!("connection encrypted");

        // Capabilities may change once encrypted
        self.ehlo(hello_name)
    }

    /// Send EHLO and update server info
    fn ehlo(&mut self, hello_name: &ClientId) -> Result<(), Error> {
        let response = self.command(
            Ehlo::new(hello_name.clone()),
            "EHLO",
            250,
            SessionState::EhloSent,
        )?;
        self.server_info = ServerInfo::from_response(&response)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("server {}", self.server_info);
        Ok(())
    }

    /// Runs the two step `AUTH LOGIN` exchange
    fn auth(&mut self, credentials: &Credentials) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        if !self
            .server_info
            .supports_feature(Extension::Authentication(Mechanism::Login))
        {
            tracing::debug!("AUTH LOGIN not advertised, trying anyway");
        }

        let _challenge = self.command(
            Auth::new(Mechanism::Login),
            "AUTH LOGIN",
            334,
            SessionState::AuthChallenged,
        )?;
        #[cfg(feature = "tracing")]
        tracing::trace!(
            "principal challenge: {:?}",
            decode_challenge(&_challenge)
        );

        self.redacted(
            &AuthResponse::new(credentials.login_frame(LoginStep::Principal)),
            "AUTH LOGIN principal",
            334,
            SessionState::AuthSecretPrompted,
        )?;
        self.redacted(
            &AuthResponse::new(credentials.login_frame(LoginStep::Secret)),
            "AUTH LOGIN secret",
            235,
            SessionState::Authenticated,
        )?;

        #[cfg(feature = "tracing")]
        tracing::debug!("authenticated");
        Ok(())
    }

    /// Sends one message to one recipient on an authenticated session
    ///
    /// Returns the relay's reply to the end of the payload.
    pub fn transmit(&mut self, message: &[u8], from: &str, to: &str) -> Result<Response, Error> {
        if self.state != SessionState::Authenticated {
            return Err(error::protocol(
                "MAIL FROM",
                None,
                format!("session is {:?}, not authenticated", self.state),
            ));
        }

        self.command(Mail::new(from), "MAIL FROM", 250, SessionState::SenderDeclared)?;
        self.command(Rcpt::new(to), "RCPT TO", 250, SessionState::RecipientDeclared)?;
        self.command(Data, "DATA", 354, SessionState::DataModeEntered)?;

        self.message(message)
    }

    /// Sends the message content, dot-stuffed and terminated
    fn message(&mut self, message: &[u8]) -> Result<Response, Error> {
        let mut codec = ClientCodec::new();
        let mut out_buf = Vec::with_capacity(message.len() + 5);
        codec.encode(message, &mut out_buf);
        let terminator: &[u8] = if codec.at_line_start() {
            b".\r\n"
        } else {
            b"\r\n.\r\n"
        };
        out_buf.extend_from_slice(terminator);

        let stream = self.stream.get_mut();
        if let Err(err) = stream.write_all(&out_buf).and_then(|()| stream.flush()) {
            self.broken = true;
            return Err(error::transmission(err));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("wrote {} bytes of message data", out_buf.len());

        self.expect("end of data", 250, SessionState::BodyTransmitted)
    }

    /// Sends `QUIT` when the connection is still usable, then releases it
    ///
    /// Never fails: the outcome of the message is already known.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        if !self.broken {
            match self.command(Quit, "QUIT", 221, SessionState::SessionClosing) {
                Ok(_) => {}
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("QUIT not acknowledged: {_err}");
                }
            }
        }

        let _ = self.stream.get_ref().shutdown(Shutdown::Both);
        self.state = SessionState::Closed;
    }

    /// Writes a command and expects `expected` in return
    fn command<C: Display>(
        &mut self,
        command: C,
        label: &'static str,
        expected: u16,
        next: SessionState,
    ) -> Result<Response, Error> {
        let line = command.to_string();
        self.write(line.as_bytes())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(">> {}", escape_crlf(&line));

        self.expect(label, expected, next)
    }

    /// Same as `command`, keeping the frame out of the logs
    fn redacted(
        &mut self,
        frame: &AuthResponse,
        label: &'static str,
        expected: u16,
        next: SessionState,
    ) -> Result<Response, Error> {
        self.write(frame.to_string().as_bytes())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(">> <{label} redacted>");

        self.expect(label, expected, next)
    }

    /// Writes a string to the relay
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let stream = self.stream.get_mut();
        if let Err(err) = stream.write_all(bytes).and_then(|()| stream.flush()) {
            self.broken = true;
            return Err(error::connection(err));
        }
        Ok(())
    }

    /// Reads a reply and moves to `next` if it carries `expected`
    fn expect(
        &mut self,
        label: &'static str,
        expected: u16,
        next: SessionState,
    ) -> Result<Response, Error> {
        let response = self.read_response(label)?;

        if response.has_code(expected) {
            self.state = next;
            Ok(response)
        } else {
            Err(error::protocol(
                label,
                Some(response.code()),
                response.text(),
            ))
        }
    }

    /// Gets the SMTP response
    fn read_response(&mut self, label: &'static str) -> Result<Response, Error> {
        let mut buffer = Vec::with_capacity(100);

        loop {
            match self.stream.read_until(b'\n', &mut buffer) {
                Ok(0) => {
                    self.broken = true;
                    return Err(error::connection(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("relay closed the connection while waiting for the {label} reply"),
                    )));
                }
                Ok(_) => {}
                Err(err) => {
                    self.broken = true;
                    return Err(error::connection(match err.kind() {
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => io::Error::new(
                            err.kind(),
                            format!("timed out waiting for the {label} reply"),
                        ),
                        _ => err,
                    }));
                }
            }

            // Lines are read whole, a multibyte sequence can't be split here
            let text = match str::from_utf8(&buffer) {
                Ok(text) => text,
                Err(e) => {
                    self.broken = true;
                    return Err(error::protocol(
                        label,
                        None,
                        format!("reply is not valid UTF-8: {e}"),
                    ));
                }
            };

            #[cfg(feature = "tracing")]
            tracing::debug!("<< {}", escape_crlf(text));

            match parse_response(text) {
                Ok((_remaining, response)) => return Ok(response),
                Err(nom::Err::Incomplete(_)) => { /* read more */ }
                Err(nom::Err::Failure(e)) | Err(nom::Err::Error(e)) => {
                    let reason = format!("malformed reply: {e}");
                    self.broken = true;
                    return Err(error::protocol(label, None, reason));
                }
            }
        }
    }
}

impl Drop for ProtocolSession {
    fn drop(&mut self) {
        self.close();
    }
}
