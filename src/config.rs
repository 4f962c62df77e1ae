use std::path::PathBuf;
use std::time::Duration;

use crate::types::LiteralSpool;
use crate::utf7;

/// Literals larger than this many bytes are spooled to disk by default.
pub const DEFAULT_LITERAL_THRESHOLD: usize = 2 * 1024 * 1024;

/// Settings shared by every connection a [`Store`](crate::Store) opens.
///
/// ```
/// # use imap_wire::Config;
/// # use std::time::Duration;
/// let config = Config::default()
///     .literal_threshold(64 * 1024)
///     .path_prefix("INBOX.")
///     .read_timeout(Duration::from_secs(60));
/// assert_eq!(config.path_prefix.as_deref(), Some("INBOX."));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Literals strictly larger than this are spooled to `temp_dir`.
    pub literal_threshold: usize,
    /// Directory for spooled literals.
    pub temp_dir: PathBuf,
    /// Prefix stripped from, and added to, folder names, in wire (modified UTF-7) form. When
    /// `None`, the personal namespace is asked for on the first connection if the server supports
    /// `NAMESPACE`.
    pub path_prefix: Option<String>,
    /// Parameters sent with `ID` when the server advertises it.
    pub client_id: Vec<(String, String)>,
    /// Read timeout applied to every new transport.
    pub read_timeout: Option<Duration>,
    /// Log wire traffic at `debug` instead of `trace` level.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            literal_threshold: DEFAULT_LITERAL_THRESHOLD,
            temp_dir: std::env::temp_dir(),
            path_prefix: None,
            client_id: vec![
                ("name".to_string(), env!("CARGO_PKG_NAME").to_string()),
                ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
            ],
            read_timeout: None,
            debug: false,
        }
    }
}

impl Config {
    /// Set the in-memory literal threshold.
    pub fn literal_threshold(mut self, bytes: usize) -> Self {
        self.literal_threshold = bytes;
        self
    }

    /// Set the spool directory.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Use a fixed folder path prefix instead of asking the server. The prefix is given as the
    /// user sees it and stored encoded, so `"Entwürfe/"` goes on the wire as `"Entw&APw-rfe/"`.
    pub fn path_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.path_prefix = Some(utf7::encode(prefix.as_ref()));
        self
    }

    /// Replace the `ID` parameters. An empty list disables `ID`.
    pub fn client_id<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.client_id = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Set the transport read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Log wire traffic at `debug` level.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The literal placement policy these settings describe.
    pub fn spool(&self) -> LiteralSpool {
        LiteralSpool::new(self.literal_threshold, self.temp_dir.clone())
    }
}
