use std::fmt::{self, Debug};

use native_tls::{Protocol, TlsConnector};

use crate::error::{self, Error};

/// Parameters to use for the in-place STARTTLS upgrade
///
/// The connector is built once per run and shared by every session; the
/// domain checked against the relay certificate is supplied at upgrade time.
#[derive(Clone)]
pub struct TlsParameters {
    connector: TlsConnector,
    accept_invalid_certs: bool,
}

impl TlsParameters {
    /// Creates TLS parameters verifying certificates against the system store
    pub fn new() -> Result<Self, Error> {
        Self::builder().build()
    }

    /// Creates a builder for TLS parameters
    pub fn builder() -> TlsParametersBuilder {
        TlsParametersBuilder::default()
    }

    pub(super) fn connector(&self) -> &TlsConnector {
        &self.connector
    }
}

impl Debug for TlsParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsParameters")
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish_non_exhaustive()
    }
}

/// Builder for `TlsParameters`
#[derive(Debug, Clone, Default)]
pub struct TlsParametersBuilder {
    accept_invalid_certs: bool,
}

impl TlsParametersBuilder {
    /// Controls whether certificates with an invalid hostname or chain are accepted
    ///
    /// Defaults to `false`.
    ///
    /// # Warning
    ///
    /// Only meant for test relays with self-signed certificates. Any
    /// machine in the path can read the authentication secret otherwise.
    pub fn dangerous_accept_invalid_certs(mut self, accept_invalid_certs: bool) -> Self {
        self.accept_invalid_certs = accept_invalid_certs;
        self
    }

    /// Creates a new `TlsParameters` using native-tls
    pub fn build(self) -> Result<TlsParameters, Error> {
        let mut tls_builder = TlsConnector::builder();
        tls_builder.min_protocol_version(Some(Protocol::Tlsv12));
        tls_builder.danger_accept_invalid_hostnames(self.accept_invalid_certs);
        tls_builder.danger_accept_invalid_certs(self.accept_invalid_certs);

        let connector = tls_builder.build().map_err(error::configuration)?;

        Ok(TlsParameters {
            connector,
            accept_invalid_certs: self.accept_invalid_certs,
        })
    }
}
