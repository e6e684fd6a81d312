use std::{
    fmt,
    io::{self, Read, Write},
    mem,
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::TlsStream;

#[cfg(test)]
use super::mock::MockStream;
use super::TlsParameters;
use crate::error::{self, Error};

/// A network stream
pub struct NetworkStream {
    inner: InnerNetworkStream,
}

/// Represents the different types of underlying network streams
#[allow(clippy::large_enum_variant)]
enum InnerNetworkStream {
    /// Plain TCP stream
    Tcp(TcpStream),
    /// Encrypted TCP stream
    NativeTls(TlsStream<TcpStream>),
    /// Scripted stream
    #[cfg(test)]
    Mock(MockStream),
    /// Transport released after a failed upgrade
    None,
}

impl NetworkStream {
    fn new(inner: InnerNetworkStream) -> Self {
        NetworkStream { inner }
    }

    #[cfg(test)]
    pub(crate) fn new_mock(stream: MockStream) -> Self {
        NetworkStream::new(InnerNetworkStream::Mock(stream))
    }

    /// Returns peer's address
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self.inner {
            InnerNetworkStream::Tcp(ref s) => s.peer_addr(),
            InnerNetworkStream::NativeTls(ref s) => s.get_ref().peer_addr(),
            #[cfg(test)]
            InnerNetworkStream::Mock(_) => Ok(SocketAddr::from(([127, 0, 0, 1], 25))),
            InnerNetworkStream::None => Err(released()),
        }
    }

    /// Shutdowns the connection
    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref s) => s.shutdown(how),
            InnerNetworkStream::NativeTls(ref s) => s.get_ref().shutdown(how),
            #[cfg(test)]
            InnerNetworkStream::Mock(_) => Ok(()),
            InnerNetworkStream::None => Ok(()),
        }
    }

    /// Opens a plain TCP connection, trying every resolved address in turn
    ///
    /// Each attempt is bounded by `timeout` when one is given.
    pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self, Error> {
        let addrs = (host, port).to_socket_addrs().map_err(error::connection)?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };

            match attempt {
                Ok(stream) => return Ok(NetworkStream::new(InnerNetworkStream::Tcp(stream))),
                Err(err) => last_err = Some(err),
            }
        }

        Err(match last_err {
            Some(last_err) => error::connection(last_err),
            None => error::connection(format!("could not resolve {host}:{port}")),
        })
    }

    /// Upgrades the plain connection to TLS, in place
    ///
    /// `domain` is checked against the certificate presented by the relay.
    /// On failure the underlying socket is released and the stream stays unusable.
    pub fn upgrade_tls(
        &mut self,
        tls_parameters: &TlsParameters,
        domain: &str,
    ) -> Result<(), Error> {
        match mem::replace(&mut self.inner, InnerNetworkStream::None) {
            InnerNetworkStream::Tcp(stream) => {
                let stream = tls_parameters
                    .connector()
                    .connect(domain, stream)
                    .map_err(|e| error::connection(format!("tls handshake failed: {e}")))?;
                self.inner = InnerNetworkStream::NativeTls(stream);
                Ok(())
            }
            #[cfg(test)]
            InnerNetworkStream::Mock(_) => Err(error::connection(
                "tls handshake failed: scripted stream cannot be encrypted",
            )),
            already_encrypted @ InnerNetworkStream::NativeTls(_) => {
                self.inner = already_encrypted;
                Ok(())
            }
            InnerNetworkStream::None => Err(error::connection(released())),
        }
    }

    /// Tells if the stream is encrypted
    pub fn is_encrypted(&self) -> bool {
        matches!(self.inner, InnerNetworkStream::NativeTls(_))
    }

    /// Set read timeout for IO calls
    pub fn set_read_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut stream) => stream.set_read_timeout(duration),
            InnerNetworkStream::NativeTls(ref mut stream) => {
                stream.get_ref().set_read_timeout(duration)
            }
            #[cfg(test)]
            InnerNetworkStream::Mock(_) => Ok(()),
            InnerNetworkStream::None => Err(released()),
        }
    }

    /// Set write timeout for IO calls
    pub fn set_write_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut stream) => stream.set_write_timeout(duration),
            InnerNetworkStream::NativeTls(ref mut stream) => {
                stream.get_ref().set_write_timeout(duration)
            }
            #[cfg(test)]
            InnerNetworkStream::Mock(_) => Ok(()),
            InnerNetworkStream::None => Err(released()),
        }
    }
}

fn released() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection already released")
}

impl fmt::Debug for NetworkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkStream")
            .field("encrypted", &self.is_encrypted())
            .finish_non_exhaustive()
    }
}

impl Read for NetworkStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.read(buf),
            InnerNetworkStream::NativeTls(ref mut s) => s.read(buf),
            #[cfg(test)]
            InnerNetworkStream::Mock(ref mut s) => s.read(buf),
            InnerNetworkStream::None => Err(released()),
        }
    }
}

impl Write for NetworkStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.write(buf),
            InnerNetworkStream::NativeTls(ref mut s) => s.write(buf),
            #[cfg(test)]
            InnerNetworkStream::Mock(ref mut s) => s.write(buf),
            InnerNetworkStream::None => Err(released()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.flush(),
            InnerNetworkStream::NativeTls(ref mut s) => s.flush(),
            #[cfg(test)]
            InnerNetworkStream::Mock(ref mut s) => s.flush(),
            InnerNetworkStream::None => Err(released()),
        }
    }
}
