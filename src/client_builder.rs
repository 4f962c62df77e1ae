use std::net::TcpStream;

#[cfg(feature = "native-tls")]
use native_tls::TlsConnector;

use crate::client::Connection;
use crate::conn::BoxedTransport;
use crate::error::Result;
use crate::store::Connector;
use crate::types::LiteralSpool;

/// How the transport to the server is secured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ConnectionMode {
    /// No encryption. Only for testing against local servers.
    Plaintext,
    /// TLS from the first byte, usually on port 993.
    #[cfg(feature = "native-tls")]
    Tls,
    /// Plaintext, upgraded with `STARTTLS` right after the greeting, usually on port 143.
    #[cfg(feature = "native-tls")]
    StartTls,
}

/// A convenience builder for [`Connection`]s over the supported transports, and the
/// [`Connector`] a [`Store`](crate::Store) normally uses.
///
/// ```no_run
/// # use imap_wire::{ClientBuilder, ConnectionMode, Connector, Config};
/// # fn main() -> Result<(), imap_wire::Error> {
/// let connection = ClientBuilder::new("imap.example.com", 143)
///     .mode(ConnectionMode::StartTls)
///     .connect(Config::default().spool())?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ClientBuilder<D>
where
    D: AsRef<str>,
{
    domain: D,
    port: u16,
    mode: ConnectionMode,
    skip_tls_verify: bool,
}

impl<D> ClientBuilder<D>
where
    D: AsRef<str>,
{
    /// Make a new `ClientBuilder` using the given domain and port. TLS is the default when the
    /// `native-tls` feature is enabled.
    pub fn new(domain: D, port: u16) -> Self {
        ClientBuilder {
            domain,
            port,
            #[cfg(feature = "native-tls")]
            mode: ConnectionMode::Tls,
            #[cfg(not(feature = "native-tls"))]
            mode: ConnectionMode::Plaintext,
            skip_tls_verify: false,
        }
    }

    /// Choose how the connection is secured.
    pub fn mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Accept any certificate and host name. Never use this outside of tests.
    pub fn danger_skip_tls_verify(mut self, skip: bool) -> Self {
        self.skip_tls_verify = skip;
        self
    }

    #[cfg(feature = "native-tls")]
    fn tls_connector(&self) -> Result<TlsConnector> {
        Ok(TlsConnector::builder()
            .danger_accept_invalid_certs(self.skip_tls_verify)
            .danger_accept_invalid_hostnames(self.skip_tls_verify)
            .build()?)
    }

    fn tcp(&self) -> Result<TcpStream> {
        Ok(TcpStream::connect((self.domain.as_ref(), self.port))?)
    }
}

impl<D> Connector for ClientBuilder<D>
where
    D: AsRef<str>,
{
    type Transport = BoxedTransport;

    fn connect(&self, spool: LiteralSpool) -> Result<Connection<BoxedTransport>> {
        match self.mode {
            ConnectionMode::Plaintext => {
                let mut connection = Connection::new(Box::new(self.tcp()?) as BoxedTransport, spool);
                connection.read_greeting()?;
                Ok(connection)
            }
            #[cfg(feature = "native-tls")]
            ConnectionMode::Tls => {
                let tls = self
                    .tls_connector()?
                    .connect(self.domain.as_ref(), self.tcp()?)?;
                let mut connection = Connection::new(Box::new(tls) as BoxedTransport, spool);
                connection.read_greeting()?;
                Ok(connection)
            }
            #[cfg(feature = "native-tls")]
            ConnectionMode::StartTls => {
                let mut plain = Connection::new(self.tcp()?, spool.clone());
                plain.read_greeting()?;
                plain.run_command_and_check_ok("STARTTLS")?.release();
                let tcp = plain.into_inner()?;
                let tls = self.tls_connector()?.connect(self.domain.as_ref(), tcp)?;
                // no second greeting after STARTTLS
                Ok(Connection::new(Box::new(tls) as BoxedTransport, spool))
            }
        }
    }
}
