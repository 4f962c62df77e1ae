use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

use crate::client::Connection;
use crate::conn::Transport;

/// Idle authenticated connections, shared between threads.
///
/// A connection is in the pool only while nobody is using it: [`acquire`](Self::acquire) removes
/// it and [`release`](Self::release) puts it back, so a single connection is never used by two
/// threads at once. There is no bound on the number of connections and no fairness guarantee.
pub struct ConnectionPool<T: Transport> {
    idle: Mutex<VecDeque<Connection<T>>>,
}

impl<T: Transport> Default for ConnectionPool<T> {
    fn default() -> Self {
        ConnectionPool {
            idle: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T: Transport> fmt::Debug for ConnectionPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("idle", &self.len())
            .finish()
    }
}

impl<T: Transport> ConnectionPool<T> {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the most recently released idle connection, if any.
    pub fn acquire(&self) -> Option<Connection<T>> {
        self.idle.lock().pop_back()
    }

    /// Return a connection. Connections that are no longer alive are closed and dropped instead.
    pub fn release(&self, mut connection: Connection<T>) {
        if connection.is_alive() {
            debug!(state = ?connection.state(), "returning connection to pool");
            self.idle.lock().push_back(connection);
        } else {
            debug!(state = ?connection.state(), "discarding dead connection");
            connection.close();
        }
    }

    /// The number of idle connections.
    pub fn len(&self) -> usize {
        self.idle.lock().len()
    }

    /// Returns true if no connection is idle.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every idle connection.
    pub fn drain(&self) -> Vec<Connection<T>> {
        self.idle.lock().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_stream::MockStream;
    use crate::types::LiteralSpool;

    fn authenticated() -> (MockStream, Connection<MockStream>) {
        let mock = MockStream::new(b"* PREAUTH ready\r\n".to_vec());
        let mut c = Connection::new(mock.clone(), LiteralSpool::new(16, std::env::temp_dir()));
        c.read_greeting().unwrap();
        (mock, c)
    }

    #[test]
    fn release_then_acquire() {
        let pool = ConnectionPool::new();
        assert!(pool.acquire().is_none());
        let (_, c) = authenticated();
        pool.release(c);
        assert_eq!(pool.len(), 1);
        assert!(pool.acquire().is_some());
        assert!(pool.is_empty());
    }

    #[test]
    fn dead_connections_are_not_pooled() {
        let pool = ConnectionPool::new();
        let (mock, c) = authenticated();
        mock.hang_up();
        pool.release(c);
        assert!(pool.is_empty());

        let (mock, mut c) = authenticated();
        c.close();
        pool.release(c);
        assert!(pool.is_empty());
        assert!(mock.is_closed());
    }

    #[test]
    fn shared_between_threads() {
        let pool = std::sync::Arc::new(ConnectionPool::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    let (_, c) = authenticated();
                    pool.release(c);
                    let c = pool.acquire();
                    if let Some(c) = c {
                        pool.release(c);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.drain().len(), 4);
        assert!(pool.is_empty());
    }
}
