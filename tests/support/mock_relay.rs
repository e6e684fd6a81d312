//! Scripted SMTP relay on a loopback port
//!
//! Connections are served one at a time, each following the next
//! [`Script`] in line (and [`Script::Accept`] once they run out). Everything
//! the client sends is kept per connection for later assertions.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    io::{self, BufRead, BufReader, Read, Write},
    mem,
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use native_tls::{Identity, TlsAcceptor, TlsStream};

const CERTIFICATE: &[u8] = include_bytes!("../fixtures/relay.crt");
const PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/relay.key");

/// How the relay treats one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Accepts everything
    Accept,
    /// Answers the greeting with `554`
    RejectGreeting,
    /// Answers the secret with `535`
    RejectAuth,
    /// Answers `RCPT TO` with `550`
    RejectRcpt,
    /// Hangs up right after `EHLO`
    DropAfterEhlo,
}

/// What one client sent over one connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Command lines, without CRLF; LOGIN frames are decoded
    pub commands: Vec<String>,
    /// Payload received after `DATA`, with the dot-stuffing removed
    pub data: String,
    /// Index of the first command received over TLS
    pub encrypted_from: Option<usize>,
}

impl Transcript {
    /// Tells if a command starting with `prefix` was received
    pub fn has(&self, prefix: &str) -> bool {
        self.commands.iter().any(|command| command.starts_with(prefix))
    }
}

pub struct MockRelay {
    addr: SocketAddr,
    transcripts: Arc<Mutex<Vec<Transcript>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MockRelay {
    /// Starts a relay following `scripts`, one per connection
    ///
    /// `STARTTLS` is refused with `454`.
    pub fn start(scripts: &[Script]) -> MockRelay {
        MockRelay::spawn(scripts, None)
    }

    /// Starts a relay that accepts `STARTTLS` with a self-signed
    /// certificate for `mock.relay` and `127.0.0.1`
    pub fn start_with_tls(scripts: &[Script]) -> MockRelay {
        let identity = Identity::from_pkcs8(CERTIFICATE, PRIVATE_KEY).unwrap();
        let acceptor = TlsAcceptor::new(identity).unwrap();

        MockRelay::spawn(scripts, Some(acceptor))
    }

    fn spawn(scripts: &[Script], acceptor: Option<TlsAcceptor>) -> MockRelay {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let transcripts = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let transcripts = Arc::clone(&transcripts);
            let stop = Arc::clone(&stop);
            let mut scripts: VecDeque<Script> = scripts.iter().copied().collect();

            thread::spawn(move || {
                for stream in listener.incoming() {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };

                    let script = scripts.pop_front().unwrap_or(Script::Accept);
                    let transcript = serve(stream, script, acceptor.as_ref());
                    transcripts.lock().unwrap().push(transcript);
                }
            })
        };

        MockRelay {
            addr,
            transcripts,
            stop,
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Transcripts of the connections served so far
    pub fn transcripts(&self) -> Vec<Transcript> {
        self.transcripts.lock().unwrap().clone()
    }

    /// Waits until `count` connections were fully served
    ///
    /// The client may hang up before the relay is done with the
    /// connection, so the last transcript can land slightly later.
    pub fn wait_for(&self, count: usize) -> Vec<Transcript> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let transcripts = self.transcripts();
            if transcripts.len() >= count || Instant::now() > deadline {
                return transcripts;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for MockRelay {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Wakes the accept loop up
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Server side of one connection, upgraded in place on `STARTTLS`
enum Conn {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Gone,
}

impl Read for Conn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Conn::Plain(s) => s.read(buf),
            Conn::Tls(s) => s.read(buf),
            Conn::Gone => Ok(0),
        }
    }
}

impl Write for Conn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Conn::Plain(s) => s.write(buf),
            Conn::Tls(s) => s.write(buf),
            Conn::Gone => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Conn::Plain(s) => s.flush(),
            Conn::Tls(s) => s.flush(),
            Conn::Gone => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Commands,
    Principal,
    Secret,
    Data,
}

fn serve(stream: TcpStream, script: Script, acceptor: Option<&TlsAcceptor>) -> Transcript {
    let mut transcript = Transcript::default();
    let mut conn = BufReader::new(Conn::Plain(stream));

    let greeting = if script == Script::RejectGreeting {
        "554 5.3.2 mock.relay not accepting mail\r\n"
    } else {
        "220 mock.relay ESMTP ready\r\n"
    };
    if conn.get_mut().write_all(greeting.as_bytes()).is_err() {
        return transcript;
    }

    let mut phase = Phase::Commands;
    let mut line = String::new();
    loop {
        line.clear();
        match conn.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let trimmed = line.trim_end_matches("\r\n");
        let encrypted = matches!(conn.get_ref(), Conn::Tls(_));

        let reply: &str = match phase {
            Phase::Data => {
                if trimmed == "." {
                    phase = Phase::Commands;
                    "250 2.0.0 Ok: queued\r\n"
                } else {
                    let unstuffed = trimmed.strip_prefix('.').unwrap_or(trimmed);
                    transcript.data.push_str(unstuffed);
                    transcript.data.push_str("\r\n");
                    continue;
                }
            }
            Phase::Principal => {
                transcript.commands.push(decode(trimmed));
                phase = Phase::Secret;
                "334 UGFzc3dvcmQ6\r\n"
            }
            Phase::Secret => {
                transcript.commands.push(decode(trimmed));
                phase = Phase::Commands;
                if script == Script::RejectAuth {
                    "535 5.7.8 Authentication credentials invalid\r\n"
                } else {
                    "235 2.7.0 Authentication successful\r\n"
                }
            }
            Phase::Commands => {
                transcript.commands.push(trimmed.to_owned());
                let verb = trimmed.to_ascii_uppercase();

                if verb.starts_with("EHLO") {
                    if script == Script::DropAfterEhlo {
                        let _ = conn.get_mut().write_all(b"250 mock.relay\r\n");
                        break;
                    }
                    if acceptor.is_some() && !encrypted {
                        "250-mock.relay\r\n250-STARTTLS\r\n250 SIZE 10240000\r\n"
                    } else {
                        "250-mock.relay\r\n250-AUTH LOGIN PLAIN\r\n250 SIZE 10240000\r\n"
                    }
                } else if verb == "STARTTLS" {
                    match acceptor {
                        Some(acceptor) if !encrypted => {
                            if conn
                                .get_mut()
                                .write_all(b"220 2.0.0 Ready to start TLS\r\n")
                                .is_err()
                            {
                                break;
                            }
                            let Conn::Plain(tcp) = mem::replace(conn.get_mut(), Conn::Gone)
                            else {
                                break;
                            };
                            match acceptor.accept(tcp) {
                                Ok(tls) => *conn.get_mut() = Conn::Tls(Box::new(tls)),
                                Err(_) => break,
                            }
                            transcript.encrypted_from = Some(transcript.commands.len());
                            continue;
                        }
                        _ => "454 4.7.0 TLS not available\r\n",
                    }
                } else if verb == "AUTH LOGIN" {
                    phase = Phase::Principal;
                    "334 VXNlcm5hbWU6\r\n"
                } else if verb.starts_with("MAIL FROM:") {
                    "250 2.1.0 Ok\r\n"
                } else if verb.starts_with("RCPT TO:") {
                    if script == Script::RejectRcpt {
                        "550 5.1.1 No such user\r\n"
                    } else {
                        "250 2.1.5 Ok\r\n"
                    }
                } else if verb == "DATA" {
                    phase = Phase::Data;
                    "354 End data with <CR><LF>.<CR><LF>\r\n"
                } else if verb == "QUIT" {
                    let _ = conn.get_mut().write_all(b"221 2.0.0 Bye\r\n");
                    break;
                } else {
                    "500 5.5.2 Error: command not recognized\r\n"
                }
            }
        };

        if conn.get_mut().write_all(reply.as_bytes()).is_err() {
            break;
        }
    }

    transcript
}

fn decode(frame: &str) -> String {
    STANDARD
        .decode(frame)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| format!("<undecodable {frame}>"))
}
