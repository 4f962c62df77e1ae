use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::types::Uid;

/// A body section of one message that a caller wants downloaded.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    /// Decoded folder name, without the path prefix.
    pub mailbox: String,
    /// UID of the message within `mailbox`.
    pub uid: Uid,
    /// Body section specifier, e.g. `""` for the whole message or `"1.2"`.
    pub section: String,
}

impl FetchRequest {
    /// Request section `section` of message `uid` in `mailbox`.
    pub fn new(mailbox: impl Into<String>, uid: Uid, section: impl Into<String>) -> Self {
        FetchRequest {
            mailbox: mailbox.into(),
            uid,
            section: section.into(),
        }
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}[{}]", self.mailbox, self.uid, self.section)
    }
}

/// Outstanding requests, oldest first.
///
/// Adding a request that is already outstanding does nothing, so the length is always the number
/// of distinct outstanding requests. All methods take `&self` and may be called from any thread.
pub struct RequestQueue<R> {
    pending: Mutex<VecDeque<R>>,
}

impl<R> Default for RequestQueue<R> {
    fn default() -> Self {
        RequestQueue {
            pending: Mutex::new(VecDeque::new()),
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for RequestQueue<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.pending.lock().iter()).finish()
    }
}

impl<R: Eq + Hash + Clone> RequestQueue<R> {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request unless it is already outstanding. Returns whether it was added.
    pub fn add_request(&self, request: R) -> bool {
        let mut pending = self.pending.lock();
        if pending.contains(&request) {
            return false;
        }
        pending.push_back(request);
        true
    }

    /// Remove a request. Returns whether it was outstanding.
    pub fn remove_request(&self, request: &R) -> bool {
        let mut pending = self.pending.lock();
        match pending.iter().position(|r| r == request) {
            Some(i) => {
                pending.remove(i);
                true
            }
            None => false,
        }
    }

    /// The oldest outstanding request. It stays queued until removed.
    pub fn next_request(&self) -> Option<R> {
        self.pending.lock().front().cloned()
    }

    /// Whether `request` is outstanding.
    pub fn contains(&self, request: &R) -> bool {
        self.pending.lock().contains(request)
    }

    /// The number of outstanding requests.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
