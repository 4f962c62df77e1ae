use std::fmt;
use std::io::Write;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bufstream::BufStream;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, trace, warn};

use super::authenticator::Authenticator;
use super::conn::Transport;
use super::error::{Error, ParseError, Result, ValidateError};
use super::parse::{parse_capabilities, ResponseParser};
use super::types::*;

static TAG_PREFIX: &str = "a";
const INITIAL_TAG: u32 = 0;
const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

lazy_static! {
    static ref SENSITIVE_COMMAND: Option<Regex> =
        Regex::new(r"(?i)^\S+\s+(LOGIN|AUTHENTICATE)\b").ok();
}

/// Whether a command line must not appear in logs. Everything is redacted if the pattern is
/// unavailable.
fn is_sensitive(line: &str) -> bool {
    SENSITIVE_COMMAND
        .as_ref()
        .map_or(true, |re| re.is_match(line))
}

macro_rules! quote {
    ($x:expr) => {
        format!("\"{}\"", $x.replace(r"\", r"\\").replace("\"", "\\\""))
    };
}

pub(crate) fn validate_str(value: &str) -> Result<String> {
    let quoted = quote!(value);
    if quoted.find('\n').is_some() {
        return Err(Error::Validate(ValidateError('\n')));
    }
    if quoted.find('\r').is_some() {
        return Err(Error::Validate(ValidateError('\r')));
    }
    Ok(quoted)
}

/// Turn a batch whose completion is not `OK` into [`Error::No`] / [`Error::Bad`].
///
/// The batch is released on the error path.
pub(crate) fn check_ok(mut responses: Responses) -> Result<Responses> {
    let err = match responses.completion() {
        Some(r) if r.is_ok() => return Ok(responses),
        Some(r) if r.is_no() => Error::No(r.status_text_or_empty().string().into_owned()),
        Some(r) => Error::Bad(r.status_text_or_empty().string().into_owned()),
        None => Error::Parse(ParseError::Unexpected("missing tagged completion".into())),
    };
    responses.release();
    Err(err)
}

/// Where a [`Connection`] is in its life.
///
/// `Disconnected` is terminal: a connection is never brought back once its transport is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// The transport has been closed.
    Disconnected,
    /// Greeted, but not yet logged in.
    Connected,
    /// Logged in and idle.
    Authenticated,
    /// A command is in flight.
    Executing,
}

/// One IMAP session over a [`Transport`].
///
/// A connection issues one command at a time: it tags it, writes it, and reads every response up
/// to and including the tagged completion. Any transport failure, grammar failure or `BYE` closes
/// the transport; the connection then reports [`ConnectionState::Disconnected`] forever.
#[derive(Debug)]
pub struct Connection<T: Transport> {
    stream: BufStream<T>,
    tag: u32,
    state: ConnectionState,
    parser: ResponseParser,
    capabilities: Option<Capabilities>,
    /// Log wire traffic at `debug` instead of `trace` level.
    pub debug: bool,
}

impl<T: Transport> Connection<T> {
    /// Wrap an open stream. Call [`read_greeting`](Connection::read_greeting) next.
    pub fn new(stream: T, spool: LiteralSpool) -> Connection<T> {
        Connection {
            stream: BufStream::new(stream),
            tag: INITIAL_TAG,
            state: ConnectionState::Connected,
            parser: ResponseParser::new(spool),
            capabilities: None,
            debug: false,
        }
    }

    /// The current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.stream.get_ref()
    }

    /// Whether this connection can be handed out again: it is logged in and its transport still
    /// looks open. This does not touch the network.
    pub fn is_alive(&self) -> bool {
        self.state == ConnectionState::Authenticated && self.stream.get_ref().is_open()
    }

    /// Set the read timeout of the underlying transport.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.stream.get_mut().set_read_timeout(timeout)?)
    }

    /// Read the server greeting.
    ///
    /// `OK` leaves the connection `Connected`, `PREAUTH` makes it `Authenticated`, and `BYE`
    /// closes it with [`Error::Bye`].
    pub fn read_greeting(&mut self) -> Result<()> {
        let mut greeting = match self.read_response() {
            Ok(r) => r,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };
        let result = if greeting.is_bye() {
            let text = greeting.status_text_or_empty().string().into_owned();
            info!(text = %text, "server refused the connection");
            Err(Error::Bye(text))
        } else if greeting.is_preauth() {
            self.state = ConnectionState::Authenticated;
            Ok(())
        } else if greeting.is_ok() && !greeting.is_tagged() {
            Ok(())
        } else {
            Err(Error::Parse(ParseError::Unexpected(format!(
                "invalid greeting: {}",
                greeting
            ))))
        };
        self.absorb_capabilities(std::slice::from_ref(&greeting));
        greeting.release();
        if result.is_err() {
            self.close();
        }
        result
    }

    /// Log in to the IMAP server with `LOGIN`.
    ///
    /// A `NO` or `BAD` completion yields [`Error::Authentication`] and leaves the connection open.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let command = format!(
            "LOGIN {} {}",
            validate_str(username)?,
            validate_str(password)?
        );
        self.capabilities = None;
        let responses = self.run(&command, |_| Ok(None))?;
        self.finish_authentication(responses)
    }

    /// Authenticate with `AUTHENTICATE mechanism`, answering every continuation request with
    /// the authenticator's reply to the decoded challenge.
    pub fn authenticate<A: Authenticator>(
        &mut self,
        mechanism: &str,
        authenticator: &A,
    ) -> Result<()> {
        self.capabilities = None;
        let responses = self.run(&format!("AUTHENTICATE {}", mechanism), |challenge| {
            let challenge = BASE64
                .decode(challenge.continuation_text_or_empty().bytes())
                .map_err(|e| {
                    Error::Parse(ParseError::Unexpected(format!("invalid challenge: {}", e)))
                })?;
            Ok(Some(BASE64.encode(authenticator.process(&challenge))))
        })?;
        self.finish_authentication(responses)
    }

    fn finish_authentication(&mut self, responses: Responses) -> Result<()> {
        match check_ok(responses) {
            Ok(mut responses) => {
                responses.release();
                self.state = ConnectionState::Authenticated;
                Ok(())
            }
            Err(Error::No(text)) | Err(Error::Bad(text)) => Err(Error::Authentication(text)),
            Err(e) => Err(e),
        }
    }

    /// The server's capabilities. These are cached until the next login and refreshed whenever a
    /// response carries a `[CAPABILITY ...]` code.
    pub fn capabilities(&mut self) -> Result<&Capabilities> {
        if self.capabilities.is_none() {
            self.run_command_and_check_ok("CAPABILITY")?.release();
        }
        Ok(self.capabilities.get_or_insert_with(Capabilities::default))
    }

    /// Run a command and return every response it produced, completion last.
    ///
    /// A `NO` or `BAD` completion is returned as data. The caller owns the returned responses and
    /// must release them.
    pub fn execute_command(&mut self, command: &str) -> Result<Responses> {
        self.run(command, |_| Ok(None))
    }

    /// Run a command and require an `OK` completion.
    pub fn run_command_and_check_ok(&mut self, command: &str) -> Result<Responses> {
        check_ok(self.execute_command(command)?)
    }

    /// Log out and close the transport. A `BYE` in reply is the expected outcome.
    pub fn logout(&mut self) -> Result<()> {
        let result = self.execute_command("LOGOUT");
        self.close();
        match result {
            Ok(mut responses) => {
                responses.release();
                Ok(())
            }
            Err(Error::Bye(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Close the transport without saying goodbye. Idempotent.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.state = ConnectionState::Disconnected;
        self.capabilities = None;
        let _ = self.stream.flush();
        if let Err(e) = self.stream.get_mut().close() {
            debug!(error = %e, "error while closing transport");
        }
    }

    /// Give up the session and take back the raw transport, e.g. after `STARTTLS`.
    pub fn into_inner(self) -> Result<T> {
        Ok(self.stream.into_inner()?)
    }

    fn run<F>(&mut self, command: &str, on_continuation: F) -> Result<Responses>
    where
        F: FnMut(&Response) -> Result<Option<String>>,
    {
        if self.state == ConnectionState::Disconnected {
            return Err(Error::Disconnected);
        }
        let prior = self.state;
        self.state = ConnectionState::Executing;

        let command = self.create_command(command);
        let tag = format!("{}{}", TAG_PREFIX, self.tag);
        let result = self
            .write_line(command.as_bytes(), false)
            .and_then(|()| self.read_until_tagged(&tag, on_continuation));

        match result {
            Ok(responses) => {
                self.state = prior;
                self.absorb_capabilities(&responses);
                Ok(responses)
            }
            Err(e) => {
                if e.is_fatal() {
                    self.close();
                } else {
                    self.state = prior;
                }
                Err(e)
            }
        }
    }

    fn read_until_tagged<F>(&mut self, tag: &str, mut on_continuation: F) -> Result<Responses>
    where
        F: FnMut(&Response) -> Result<Option<String>>,
    {
        let mut responses = Responses::default();
        match self.collect_until_tagged(tag, &mut on_continuation, &mut responses) {
            Ok(()) => Ok(responses),
            Err(e) => {
                responses.release();
                Err(e)
            }
        }
    }

    fn collect_until_tagged<F>(
        &mut self,
        tag: &str,
        on_continuation: &mut F,
        responses: &mut Responses,
    ) -> Result<()>
    where
        F: FnMut(&Response) -> Result<Option<String>>,
    {
        loop {
            let mut response = self.read_response()?;

            if response.is_bye() {
                let text = response.status_text_or_empty().string().into_owned();
                response.release();
                info!(text = %text, "server closed the connection");
                return Err(Error::Bye(text));
            }

            let alert = response.alert_text_or_empty();
            if !alert.is_empty() {
                warn!(alert = %alert, "server alert");
            }

            if response.is_continuation_request() {
                match on_continuation(&response) {
                    Ok(Some(reply)) => {
                        response.release();
                        self.write_line(reply.as_bytes(), true)?;
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        response.release();
                        return Err(e);
                    }
                }
            }

            let done = match response.tag() {
                Some(t) if t == tag => true,
                Some(t) => {
                    let err = format!("expected tag {}, got {}", tag, t);
                    response.release();
                    return Err(Error::Parse(ParseError::Unexpected(err)));
                }
                None => false,
            };
            responses.push(response);
            if done {
                return Ok(());
            }
        }
    }

    fn absorb_capabilities(&mut self, responses: &[Response]) {
        let caps = parse_capabilities(responses);
        if !caps.is_empty() {
            self.capabilities = Some(caps);
        }
    }

    fn read_response(&mut self) -> Result<Response> {
        let response = self.parser.read_response(&mut self.stream)?;
        self.log_wire("S", &response);
        Ok(response)
    }

    fn create_command(&mut self, command: &str) -> String {
        self.tag += 1;
        format!("{}{} {}", TAG_PREFIX, self.tag, command)
    }

    fn write_line(&mut self, buf: &[u8], sensitive: bool) -> Result<()> {
        self.stream.write_all(buf)?;
        self.stream.write_all(&[CR, LF])?;
        self.stream.flush()?;
        let line = String::from_utf8_lossy(buf);
        if sensitive || is_sensitive(&line) {
            self.log_wire("C", &"[IMAP command redacted]");
        } else {
            self.log_wire("C", &line);
        }
        Ok(())
    }

    fn log_wire(&self, direction: &str, line: &dyn fmt::Display) {
        if self.debug {
            debug!("{}: {}", direction, line);
        } else {
            trace!("{}: {}", direction, line);
        }
    }
}
