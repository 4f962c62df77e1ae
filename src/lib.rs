//! An IMAP wire-protocol engine: a streaming response grammar with disk-spooled literals, pooled
//! authenticated connections, and mailbox hierarchy building.
//!
//! Everything is synchronous. A [`Store`] owns the settings, credentials and connection pool of one
//! account and is shared by reference between threads; every operation borrows a connection for
//! its duration.
//!
//! # Usage
//!
//! ```no_run
//! use imap_wire::{ClientBuilder, Config, Credentials, FetchRequest, Store};
//!
//! fn main() -> imap_wire::Result<()> {
//!     let store = Store::new(
//!         ClientBuilder::new("imap.example.com", 993),
//!         Credentials::Login {
//!             username: "user".into(),
//!             password: "password".into(),
//!         },
//!         Config::default().literal_threshold(256 * 1024),
//!     );
//!
//!     for folder in store.update_folders()? {
//!         println!("{}", folder);
//!     }
//!
//!     let mut body = store.fetch_body(&FetchRequest::new("INBOX", 42, ""))?;
//!     std::io::copy(&mut body.reader()?, &mut std::io::stdout())?;
//!     body.release();
//!
//!     let mut responses = store.execute_command("NOOP")?;
//!     for response in responses.iter() {
//!         println!("{}", response);
//!     }
//!     responses.release();
//!     Ok(())
//! }
//! ```
//!
//! Literals larger than [`Config::literal_threshold`] are streamed into temporary files and
//! represented as [`FileLiteral`]s. Whoever ends up owning a [`Response`] releases it, which deletes
//! those files; [`sweep_orphans`] removes anything a crashed process left behind.

mod parse;
mod tokenizer;
mod types;

pub mod authenticator;
pub mod client;
pub mod client_builder;
pub mod config;
pub mod conn;
pub mod error;
pub mod folders;
pub mod pool;
pub mod requests;
pub mod store;
pub mod utf7;

pub use crate::authenticator::{Authenticator, PlainAuthenticator};
pub use crate::client::{Connection, ConnectionState};
pub use crate::client_builder::{ClientBuilder, ConnectionMode};
pub use crate::config::Config;
pub use crate::conn::{BoxedTransport, Transport};
pub use crate::error::{Error, ParseError, Result};
pub use crate::parse::{parse_capabilities, parse_namespace, parse_status, Namespace, ResponseParser};
pub use crate::requests::{FetchRequest, RequestQueue};
pub use crate::store::{Connector, Credentials, Store};
pub use crate::types::*;

#[cfg(any(test, feature = "test_helpers"))]
mod mock_stream;

#[cfg(any(test, feature = "test_helpers"))]
pub mod testing;
