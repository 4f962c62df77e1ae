//! IMAP error types.

use std::io::Error as IoError;
use std::result;

#[cfg(feature = "native-tls")]
use native_tls::Error as TlsError;
#[cfg(feature = "native-tls")]
use native_tls::HandshakeError as TlsHandshakeError;
#[cfg(feature = "native-tls")]
use std::net::TcpStream;

use bufstream::IntoInnerError as BufError;
use thiserror::Error;

/// A convenience wrapper around `Result` for `imap_wire::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A set of errors that can occur in the IMAP engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An `io::Error` that occurred while trying to read or write to a network stream or a
    /// literal spool file.
    #[error("{0}")]
    Io(#[from] IoError),
    /// An error from the `native_tls` library during the TLS handshake.
    #[cfg(feature = "native-tls")]
    #[error("{0}")]
    TlsHandshake(#[from] TlsHandshakeError<TcpStream>),
    /// An error from the `native_tls` library while managing the socket.
    #[cfg(feature = "native-tls")]
    #[error("{0}")]
    Tls(#[from] TlsError),
    /// A BAD response from the IMAP server, where a successful completion was required.
    #[error("Bad Response: {0}")]
    Bad(String),
    /// A NO response from the IMAP server, where a successful completion was required.
    #[error("No Response: {0}")]
    No(String),
    /// The server terminated the session with an untagged or tagged `BYE`.
    #[error("Server terminated connection: {0}")]
    Bye(String),
    /// The connection was terminated unexpectedly.
    #[error("Connection Lost")]
    ConnectionLost,
    /// A command was issued on a connection that has already been closed.
    #[error("Connection is closed")]
    Disconnected,
    /// Error parsing a server response.
    #[error("{0}")]
    Parse(#[from] ParseError),
    /// Command inputs were not valid [IMAP
    /// strings](https://tools.ietf.org/html/rfc3501#section-4.3).
    #[error("{0}")]
    Validate(#[from] ValidateError),
    /// The server rejected the supplied credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),
}

impl<T> From<BufError<T>> for Error {
    fn from(err: BufError<T>) -> Error {
        Error::Io(err.into())
    }
}

impl Error {
    /// Whether this error leaves the connection that produced it unusable.
    ///
    /// Transport failures, grammar failures and server termination are fatal; a `NO`/`BAD`
    /// completion or a validation failure is not.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Io(_) | Error::ConnectionLost | Error::Disconnected => true,
            Error::Parse(_) | Error::Bye(_) => true,
            #[cfg(feature = "native-tls")]
            Error::Tls(_) | Error::TlsHandshake(_) => true,
            Error::Bad(_) | Error::No(_) | Error::Validate(_) | Error::Authentication(_) => false,
        }
    }
}

/// An error occured while trying to parse a server response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The stream ended in the middle of a response.
    #[error("Unexpected end of stream inside a response")]
    UnexpectedEnd,
    /// A `)` without a matching `(`, or a line that ended inside an open list.
    #[error("Unbalanced parenthesis in response")]
    UnbalancedParen,
    /// A `]` without a matching `[`, or a line that ended inside an open bracket.
    #[error("Unbalanced bracket in response")]
    UnbalancedBracket,
    /// A quoted string was not closed before the end of the line.
    #[error("Unterminated quoted string")]
    UnterminatedQuote,
    /// A literal header was not of the form `{n}` followed by CRLF.
    #[error("Invalid literal header: {0}")]
    InvalidLiteral(String),
    /// A response did not start with a tag, `*` or `+`.
    #[error("Response is missing its tag")]
    MissingTag,
    /// A byte that is not allowed at this position in the grammar.
    #[error("Unexpected byte {0:#04x} in response")]
    UnexpectedByte(u8),
    /// The response was well formed but did not carry the expected data.
    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

/// An [invalid character](https://tools.ietf.org/html/rfc3501#section-4.3) was found in a command
/// argument.
#[derive(Debug, Error)]
#[error("Invalid character in input: {0:?}")]
pub struct ValidateError(pub char);
