use std::fmt::{Debug, Formatter};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

#[cfg(feature = "native-tls")]
use native_tls::TlsStream;

/// A byte stream that a [`Connection`](crate::Connection) talks IMAP over.
///
/// TLS negotiation happens before a stream is wrapped; the engine only reads, writes, and closes.
pub trait Transport: Read + Write + Send {
    /// Set the timeout for subsequent reads to the given one.
    ///
    /// If `timeout` is `None`, the read timeout should be removed.
    ///
    /// See also `std::net::TcpStream::set_read_timeout`.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Shut the stream down. Calling this more than once must not fail loudly.
    fn close(&mut self) -> io::Result<()>;

    /// A cheap check that the peer has not gone away. This must not block or consume input.
    fn is_open(&self) -> bool;
}

impl Transport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn is_open(&self) -> bool {
        self.peer_addr().is_ok()
    }
}

#[cfg(feature = "native-tls")]
impl Transport for TlsStream<TcpStream> {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.get_mut().set_read_timeout(timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        let _ = self.shutdown();
        Transport::close(self.get_mut())
    }

    fn is_open(&self) -> bool {
        self.get_ref().is_open()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

impl Debug for dyn Transport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Imap transport")
    }
}

/// A boxed transport, as produced by [`ClientBuilder`](crate::ClientBuilder).
pub type BoxedTransport = Box<dyn Transport>;
