use std::fmt;

/// This trait allows for pluggable SASL authentication mechanisms.
///
/// `process` receives each base64-decoded server challenge and returns the raw reply; encoding it
/// for the wire is the connection's job.
pub trait Authenticator {
    /// The type of the response to the challenge. This will usually be a `Vec<u8>` or `String`.
    type Response: AsRef<[u8]>;

    /// Each base64-decoded server challenge will be passed to `process`.
    fn process(&self, challenge: &[u8]) -> Self::Response;
}

/// The [`PLAIN`](https://tools.ietf.org/html/rfc4616) mechanism: `\0user\0password`.
#[derive(Clone)]
pub struct PlainAuthenticator {
    username: String,
    password: String,
}

impl PlainAuthenticator {
    /// An authenticator for the given credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        PlainAuthenticator {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for PlainAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainAuthenticator")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Authenticator for PlainAuthenticator {
    type Response = String;

    fn process(&self, _challenge: &[u8]) -> Self::Response {
        format!("\0{}\0{}", self.username, self.password)
    }
}
