//! The pooled, authenticated entry point to an IMAP account.

use std::fmt;
use std::sync::OnceLock;

use tracing::{debug, info};

use crate::authenticator::PlainAuthenticator;
use crate::client::{check_ok, validate_str, Connection, ConnectionState};
use crate::config::Config;
use crate::conn::Transport;
use crate::error::{Error, ParseError, Result, ValidateError};
use crate::folders::{build_hierarchy, encode_folder_name};
use crate::parse::{parse_namespace, parse_status, Namespace};
use crate::pool::ConnectionPool;
use crate::requests::{FetchRequest, RequestQueue};
use crate::types::*;

/// Opens greeted connections for a [`Store`].
///
/// Implemented by [`ClientBuilder`](crate::ClientBuilder), and by any
/// `Fn(LiteralSpool) -> Result<Connection<T>>`, which is handy for scripted transports in tests.
pub trait Connector {
    /// The transport of the connections this connector opens.
    type Transport: Transport;

    /// Open a new connection whose greeting has been read, parsing literals according to `spool`.
    fn connect(&self, spool: LiteralSpool) -> Result<Connection<Self::Transport>>;
}

impl<F, T> Connector for F
where
    F: Fn(LiteralSpool) -> Result<Connection<T>>,
    T: Transport,
{
    type Transport = T;

    fn connect(&self, spool: LiteralSpool) -> Result<Connection<T>> {
        self(spool)
    }
}

/// How a [`Store`] authenticates each new connection.
#[derive(Clone)]
pub enum Credentials {
    /// The `LOGIN` command.
    Login {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// `AUTHENTICATE PLAIN`.
    Plain {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// The server greets with `PREAUTH`; a plain `OK` greeting is an authentication failure.
    PreAuth,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Login { username, .. } => {
                f.debug_struct("Login").field("username", username).finish()
            }
            Credentials::Plain { username, .. } => {
                f.debug_struct("Plain").field("username", username).finish()
            }
            Credentials::PreAuth => f.write_str("PreAuth"),
        }
    }
}

/// An IMAP account: credentials, settings, and a pool of authenticated connections.
///
/// A `Store` is meant to be created once and shared by reference between threads. Every operation
/// borrows a connection from the pool for its duration and gives it back afterwards, unless the
/// connection failed (I/O error, malformed response or `BYE`), in which case it is closed and
/// never reused.
///
/// The `ID` argument and the discovered namespace are computed once per `Store`.
pub struct Store<C: Connector> {
    connector: C,
    credentials: Credentials,
    config: Config,
    pool: ConnectionPool<C::Transport>,
    imap_id: OnceLock<String>,
    namespace: OnceLock<Option<Namespace>>,
}

impl<C: Connector> fmt::Debug for Store<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("namespace", &self.namespace.get())
            .finish()
    }
}

impl<C: Connector> Store<C> {
    /// Make a store. No connection is opened until one is needed.
    pub fn new(connector: C, credentials: Credentials, config: Config) -> Self {
        Store {
            connector,
            credentials,
            config,
            pool: ConnectionPool::new(),
            imap_id: OnceLock::new(),
            namespace: OnceLock::new(),
        }
    }

    /// The settings this store was made with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The idle connection pool.
    pub fn pool(&self) -> &ConnectionPool<C::Transport> {
        &self.pool
    }

    /// The number of idle pooled connections.
    pub fn idle_connections(&self) -> usize {
        self.pool.len()
    }

    /// The parenthesized `ID` argument built from [`Config::client_id`], e.g.
    /// `("name" "imap-wire" "version" "0.1.0")`. Pairs that cannot be quoted are left out.
    pub fn imap_id(&self) -> &str {
        self.imap_id.get_or_init(|| {
            let quoted: Vec<String> = self
                .config
                .client_id
                .iter()
                .filter_map(|(k, v)| {
                    Some(format!("{} {}", validate_str(k).ok()?, validate_str(v).ok()?))
                })
                .collect();
            format!("({})", quoted.join(" "))
        })
    }

    /// The folder path prefix in effect: the configured one, or else the personal namespace the
    /// server reported on the first connection.
    pub fn path_prefix(&self) -> Option<&str> {
        self.config.path_prefix.as_deref().or_else(|| {
            self.namespace
                .get()?
                .as_ref()
                .map(|ns| ns.prefix.as_str())
                .filter(|p| !p.is_empty())
        })
    }

    /// Take an idle connection if a live one is pooled, otherwise open and authenticate a new one.
    ///
    /// Each pooled connection is probed with `NOOP` first. One that fails the probe, including a
    /// server `BYE` that arrived while it sat idle, is closed and the next one is tried.
    ///
    /// Hand the connection back with [`release`](Self::release).
    pub fn acquire(&self) -> Result<Connection<C::Transport>> {
        while let Some(mut connection) = self.pool.acquire() {
            if !connection.is_alive() {
                debug!(state = ?connection.state(), "discarding stale pooled connection");
                connection.close();
                continue;
            }
            match connection.run_command_and_check_ok("NOOP") {
                Ok(mut responses) => {
                    responses.release();
                    debug!("reusing pooled connection");
                    return Ok(connection);
                }
                Err(e) => {
                    debug!(error = %e, "discarding pooled connection that failed the NOOP probe");
                    connection.close();
                }
            }
        }
        self.create_connection()
    }

    /// Return a connection to the pool. Dead connections are dropped.
    pub fn release(&self, connection: Connection<C::Transport>) {
        self.pool.release(connection);
    }

    fn create_connection(&self) -> Result<Connection<C::Transport>> {
        let mut connection = self.connector.connect(self.config.spool())?;
        connection.debug = self.config.debug;
        info!("opened new IMAP connection");
        if let Err(e) = self.prepare(&mut connection) {
            connection.close();
            return Err(e);
        }
        Ok(connection)
    }

    fn prepare(&self, connection: &mut Connection<C::Transport>) -> Result<()> {
        connection.set_read_timeout(self.config.read_timeout)?;

        if connection.state() != ConnectionState::Authenticated {
            match &self.credentials {
                Credentials::Login { username, password } => connection.login(username, password)?,
                Credentials::Plain { username, password } => connection.authenticate(
                    "PLAIN",
                    &PlainAuthenticator::new(username.as_str(), password.as_str()),
                )?,
                Credentials::PreAuth => {
                    return Err(Error::Authentication(
                        "server did not pre-authenticate the session".to_string(),
                    ))
                }
            }
        }

        let (has_id, has_namespace) = {
            let caps = connection.capabilities()?;
            (caps.has("ID"), caps.has("NAMESPACE"))
        };

        if has_id && !self.config.client_id.is_empty() {
            connection
                .execute_command(&format!("ID {}", self.imap_id()))?
                .release();
        }

        if self.config.path_prefix.is_none() && self.namespace.get().is_none() {
            let namespace = if has_namespace {
                let mut responses = connection.execute_command("NAMESPACE")?;
                let namespace = parse_namespace(&responses);
                responses.release();
                namespace
            } else {
                None
            };
            debug!(?namespace, "discovered personal namespace");
            let _ = self.namespace.set(namespace);
        }
        Ok(())
    }

    /// Run `f` on a pooled connection. The connection goes back to the pool afterwards unless `f`
    /// failed with a [fatal](Error::is_fatal) error.
    pub fn with_connection<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection<C::Transport>) -> Result<R>,
    {
        let mut connection = self.acquire()?;
        let result = f(&mut connection);
        match &result {
            Err(e) if e.is_fatal() => {
                debug!(error = %e, "discarding connection after failure");
                connection.close();
            }
            _ => self.release(connection),
        }
        result
    }

    /// Run one command on a pooled connection and return everything the server sent for it.
    ///
    /// `NO` and `BAD` completions are returned as data. The caller must
    /// [`release`](Responses::release) the responses.
    pub fn execute_command(&self, command: &str) -> Result<Responses> {
        self.with_connection(|c| c.execute_command(command))
    }

    /// Open a fresh connection, authenticate, and `NOOP`, to validate the settings.
    pub fn check_settings(&self) -> Result<()> {
        let mut connection = self.create_connection()?;
        match connection.run_command_and_check_ok("NOOP") {
            Ok(mut responses) => {
                responses.release();
                self.release(connection);
                Ok(())
            }
            Err(e) => {
                connection.close();
                Err(e)
            }
        }
    }

    /// List every folder under the path prefix and build the hierarchy from scratch.
    pub fn update_folders(&self) -> Result<Vec<MailboxNode>> {
        self.with_connection(|c| {
            let prefix = self.path_prefix();
            let pattern = format!("{}*", prefix.unwrap_or_default());
            let command = format!("LIST \"\" {}", validate_str(&pattern)?);
            let mut responses = check_ok(c.execute_command(&command)?)?;
            let nodes = build_hierarchy(&responses, prefix);
            responses.release();
            debug!(folders = nodes.len(), "rebuilt folder hierarchy");
            Ok(nodes)
        })
    }

    /// `STATUS` counters of the folder called `name`.
    pub fn folder_status(&self, name: &str) -> Result<FolderStatus> {
        self.with_connection(|c| {
            let prefix = self.path_prefix();
            let command = format!(
                "STATUS {} (MESSAGES RECENT UIDNEXT UIDVALIDITY UNSEEN)",
                validate_str(&encode_folder_name(name, prefix))?
            );
            let mut responses = check_ok(c.execute_command(&command)?)?;
            let status = parse_status(&responses, prefix);
            responses.release();
            status
        })
    }

    /// Download one body section.
    ///
    /// The folder is opened read-only and the section fetched with `BODY.PEEK`, so no flags change.
    /// The returned string is the caller's; a file literal must be
    /// [`release`](ImapString::release)d once consumed.
    pub fn fetch_body(&self, request: &FetchRequest) -> Result<ImapString> {
        if let Some(c) = request
            .section
            .chars()
            .find(|c| matches!(c, ']' | ' ' | '\r' | '\n'))
        {
            return Err(Error::Validate(ValidateError(c)));
        }
        self.with_connection(|c| {
            let mailbox = encode_folder_name(&request.mailbox, self.path_prefix());
            check_ok(c.execute_command(&format!("EXAMINE {}", validate_str(&mailbox)?))?)?
                .release();
            let command = format!(
                "UID FETCH {} (UID BODY.PEEK[{}])",
                request.uid, request.section
            );
            let mut responses = check_ok(c.execute_command(&command)?)?;
            let body = take_body(&mut responses, request);
            responses.release();
            body.ok_or_else(|| {
                Error::Parse(ParseError::Unexpected(format!(
                    "server sent no body for {}",
                    request
                )))
            })
        })
    }

    /// Work through `queue` oldest first, fetching each request and passing the body to `handler`.
    ///
    /// A request is removed once its handler has run, and the body is released right after. The
    /// first error stops the run; a request whose fetch failed stays queued. Returns how many
    /// requests were handled.
    pub fn fetch_queued<F>(&self, queue: &RequestQueue<FetchRequest>, mut handler: F) -> Result<usize>
    where
        F: FnMut(&FetchRequest, &ImapString) -> Result<()>,
    {
        let mut handled = 0;
        while let Some(request) = queue.next_request() {
            let mut body = self.fetch_body(&request)?;
            let result = handler(&request, &body);
            body.release();
            queue.remove_request(&request);
            result?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Close every idle connection. No `LOGOUT` is sent. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let idle = self.pool.drain();
        let closed = idle.len();
        for mut connection in idle {
            connection.close();
        }
        info!(closed, "closed idle connections");
        closed
    }
}

fn take_body(responses: &mut Responses, request: &FetchRequest) -> Option<ImapString> {
    let key = format!("BODY[{}]", request.section);
    for response in responses.iter_mut() {
        if !response.is_data_response(1, "FETCH") {
            continue;
        }
        let uid = response
            .list_or_empty(2)
            .key_string_or_empty("UID")
            .number::<Uid>();
        if uid.is_some() && uid != Some(request.uid) {
            continue;
        }
        let mut attrs = response.take(2);
        let body = match &mut attrs {
            Element::List(list) => list.take_key_value(&key),
            _ => Element::None,
        };
        attrs.release();
        match body {
            Element::String(s) => return Some(s),
            mut other => other.release(),
        }
    }
    None
}
