use std::cmp::min;
use std::io::{Error, ErrorKind, Read, Result, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::conn::Transport;

/// A scripted [`Transport`] for tests.
///
/// Reads are served from a fixed buffer; writes are captured in a buffer shared with every clone
/// of the stream handle so a test can inspect what was sent after the stream has moved into a
/// connection. Closing is observable the same way.
#[derive(Clone, Debug, Default)]
pub struct MockStream {
    read_buf: Vec<u8>,
    read_pos: usize,
    written_buf: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
    err_on_read: bool,
    eof_on_read: bool,
    read_delay: usize,
}

impl MockStream {
    /// A stream that yields `read_buf` and then fails with `UnexpectedEof`.
    pub fn new(read_buf: Vec<u8>) -> MockStream {
        MockStream::default().with_buf(read_buf)
    }

    /// Replace the scripted server bytes.
    pub fn with_buf(mut self, read_buf: Vec<u8>) -> MockStream {
        self.read_buf = read_buf;
        self
    }

    /// Every read reports a clean end of stream.
    pub fn with_eof(mut self) -> MockStream {
        self.eof_on_read = true;
        self
    }

    /// Every read fails.
    pub fn with_err(mut self) -> MockStream {
        self.err_on_read = true;
        self
    }

    /// The first read returns a single byte.
    pub fn with_delay(mut self) -> MockStream {
        self.read_delay = 1;
        self
    }

    /// Everything written to the stream so far.
    pub fn written(&self) -> Vec<u8> {
        self.written_buf
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    /// Everything written so far, as lossy text.
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }

    /// Whether [`Transport::close`] has been called on any clone of this stream.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Simulate the peer going away.
    pub fn hang_up(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.eof_on_read {
            return Ok(0);
        }
        if self.err_on_read {
            return Err(Error::new(ErrorKind::Other, "MockStream Error"));
        }
        if self.read_pos >= self.read_buf.len() {
            return Err(Error::new(ErrorKind::UnexpectedEof, "EOF"));
        }
        let mut write_len = min(buf.len(), self.read_buf.len() - self.read_pos);
        if self.read_delay > 0 {
            self.read_delay -= 1;
            write_len = min(write_len, 1);
        }
        let max_pos = self.read_pos + write_len;
        buf[..write_len].copy_from_slice(&self.read_buf[self.read_pos..max_pos]);
        self.read_pos += write_len;
        Ok(write_len)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::new(ErrorKind::BrokenPipe, "MockStream closed"));
        }
        self.written_buf
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Transport for MockStream {
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.is_closed()
    }
}
