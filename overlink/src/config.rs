//! Tunables for connections and listeners.
//!
//! Defaults reproduce the classic embedded client behaviour: up to ten
//! write attempts, each waiting at most one second for the socket to
//! become writable, and input draining in 1 KiB chunks.

use crate::net::Listener;

use std::time::Duration;

/// Number of non-progressing write attempts before a write gives up.
pub const DEFAULT_WRITE_RETRIES: u32 = 10;

/// Upper bound on each writability wait.
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(1);

/// Chunk size used by [`Connection::flush`](crate::net::Connection::flush).
pub const DEFAULT_FLUSH_CHUNK: usize = 1024;

/// Default listen backlog.
pub const DEFAULT_BACKLOG: i32 = 4;

/// Per-connection I/O settings.
///
/// # Examples
///
/// ```rust
/// use overlink::ConnectionConfig;
/// use std::time::Duration;
///
/// let config = ConnectionConfig::new()
///     .write_retries(3)
///     .write_wait(Duration::from_millis(200));
///
/// assert_eq!(config.retries(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    write_retries: u32,
    write_wait: Duration,
    flush_chunk: usize,
}

impl ConnectionConfig {
    /// Creates a configuration with the default tunables.
    pub const fn new() -> Self {
        Self {
            write_retries: DEFAULT_WRITE_RETRIES,
            write_wait: DEFAULT_WRITE_WAIT,
            flush_chunk: DEFAULT_FLUSH_CHUNK,
        }
    }

    /// Sets how many non-progressing attempts a write may make.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn write_retries(mut self, n: u32) -> Self {
        assert!(n > 0, "write_retries must be > 0");

        self.write_retries = n;
        self
    }

    /// Sets the maximum time a single writability wait may block.
    pub fn write_wait(mut self, wait: Duration) -> Self {
        self.write_wait = wait;
        self
    }

    /// Sets the chunk size used when draining input.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn flush_chunk(mut self, n: usize) -> Self {
        assert!(n > 0, "flush_chunk must be > 0");

        self.flush_chunk = n;
        self
    }

    pub fn retries(&self) -> u32 {
        self.write_retries
    }

    pub fn wait(&self) -> Duration {
        self.write_wait
    }

    pub fn chunk(&self) -> usize {
        self.flush_chunk
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for configuring and creating a [`Listener`].
///
/// # Examples
///
/// ```rust
/// use overlink::ListenerBuilder;
///
/// let listener = ListenerBuilder::new()
///     .port(8080)
///     .backlog(8)
///     .build();
///
/// assert_eq!(listener.port(), 8080);
/// assert!(!listener.is_listening());
/// ```
#[derive(Debug, Clone)]
pub struct ListenerBuilder {
    /// Port used when `begin` is called with `0`.
    port: u16,

    /// Maximum number of pending connections.
    backlog: i32,

    /// Settings handed to every accepted connection.
    connection: ConnectionConfig,
}

impl ListenerBuilder {
    /// Creates a builder with port `0` and the default backlog.
    pub fn new() -> Self {
        Self {
            port: 0,
            backlog: DEFAULT_BACKLOG,
            connection: ConnectionConfig::new(),
        }
    }

    /// Sets the default port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the listen backlog.
    ///
    /// # Panics
    ///
    /// Panics if `n <= 0`.
    pub fn backlog(mut self, n: i32) -> Self {
        assert!(n > 0, "backlog must be > 0");

        self.backlog = n;
        self
    }

    /// Sets the configuration applied to accepted connections.
    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.connection = config;
        self
    }

    /// Builds the listener. No socket is opened until `begin`.
    pub fn build(self) -> Listener {
        Listener::from_parts(self.port, self.backlog, self.connection)
    }
}

impl Default for ListenerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
