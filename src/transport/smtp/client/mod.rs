//! Protocol session and the stream it owns

pub use self::{
    connection::{ProtocolSession, SessionState},
    net::NetworkStream,
    tls::{TlsParameters, TlsParametersBuilder},
};

mod connection;
#[cfg(test)]
mod mock;
mod net;
mod tls;

/// The codec used for transparency
///
/// Doubles the leading `.` of every payload line, so a line holding a
/// single dot can't end the DATA phase early.
#[derive(Default, Clone, Copy, Debug)]
pub struct ClientCodec {
    status: CodecStatus,
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
enum CodecStatus {
    /// Next byte starts a line
    #[default]
    StartOfNewLine,
    /// Inside a line
    MiddleOfLine,
    /// Just read a `\r`
    StartingNewLine,
}

impl ClientCodec {
    /// Creates a new client codec
    pub fn new() -> Self {
        ClientCodec::default()
    }

    /// Adds transparency
    pub fn encode(&mut self, frame: &[u8], buf: &mut Vec<u8>) {
        buf.reserve(frame.len());
        for &b in frame {
            buf.push(b);
            match (b, self.status) {
                (b'\r', _) => {
                    self.status = CodecStatus::StartingNewLine;
                }
                (b'\n', CodecStatus::StartingNewLine) => {
                    self.status = CodecStatus::StartOfNewLine;
                }
                (_, CodecStatus::StartingNewLine) => {
                    self.status = CodecStatus::MiddleOfLine;
                }
                (b'.', CodecStatus::StartOfNewLine) => {
                    self.status = CodecStatus::MiddleOfLine;
                    buf.push(b'.');
                }
                (_, CodecStatus::StartOfNewLine) => {
                    self.status = CodecStatus::MiddleOfLine;
                }
                _ => {}
            }
        }
    }

    /// Tells if the bytes encoded so far ended on a line terminator
    pub fn at_line_start(&self) -> bool {
        self.status == CodecStatus::StartOfNewLine
    }
}

/// Returns the string replacing all the CRLF with "\<CRLF\>"
///
/// Used for debug displays
#[cfg(feature = "tracing")]
pub(super) fn escape_crlf(string: &str) -> String {
    string.replace("\r\n", "<CRLF>")
}
