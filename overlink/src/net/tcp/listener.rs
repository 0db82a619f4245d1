use super::socket::SocketHandle;
use super::stream::Connection;
use crate::config::{ConnectionConfig, ListenerBuilder};
use crate::sys::{
    sys_accept, sys_bind, sys_listen, sys_set_keepalive, sys_set_nodelay, sys_set_nonblocking,
    sys_set_reuseaddr, sys_set_timeouts, sys_socket, sys_sockname,
};

use std::io;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use tracing::{debug, error, warn};

/// A non-blocking TCP listener on the overlay network.
///
/// Nothing is bound until [`begin`](Self::begin). Incoming clients are
/// then polled with [`has_client`](Self::has_client) and handed over with
/// [`available`](Self::available); a client detected by `has_client` is
/// kept aside so the following `available` delivers exactly that one.
#[derive(Debug)]
pub struct Listener {
    /// Listening socket, present while listening.
    socket: Option<SocketHandle>,

    /// Port used when `begin` is given `0`.
    port: u16,

    /// Listen backlog.
    backlog: i32,

    /// `TCP_NODELAY` value applied to accepted connections.
    no_delay: bool,

    listening: bool,

    /// A client accepted by `has_client` and not yet handed over.
    accepted: Option<SocketHandle>,

    /// Settings given to accepted connections.
    connection: ConnectionConfig,
}

impl Listener {
    /// Creates a listener that will bind `port` by default.
    pub fn new(port: u16) -> Self {
        ListenerBuilder::new().port(port).build()
    }

    /// Returns a builder for a customised listener.
    pub fn builder() -> ListenerBuilder {
        ListenerBuilder::new()
    }

    pub(crate) fn from_parts(port: u16, backlog: i32, connection: ConnectionConfig) -> Self {
        Self {
            socket: None,
            port,
            backlog,
            no_delay: false,
            listening: false,
            accepted: None,
            connection,
        }
    }

    /// Starts listening on `port` on every overlay address.
    ///
    /// A `port` of `0` uses the port the listener was created with (and
    /// if that is `0` too, the OS picks one; see
    /// [`local_addr`](Self::local_addr)). Does nothing when already
    /// listening.
    ///
    /// On failure the listener stays stopped and the partially set up
    /// socket is closed. On success the no-delay setting is reset to
    /// `false`.
    pub fn begin(&mut self, port: u16) -> io::Result<()> {
        if self.listening {
            return Ok(());
        }

        let port = if port == 0 { self.port } else { port };

        let fd = sys_socket().inspect_err(|e| error!(error = %e, "socket failed"))?;

        // Closed on every early return below.
        let socket = SocketHandle::new(fd);
        let address = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0));

        sys_set_reuseaddr(fd).inspect_err(|e| error!(fd, error = %e, "SO_REUSEADDR failed"))?;
        sys_bind(fd, &address).inspect_err(|e| error!(fd, %address, error = %e, "bind failed"))?;
        sys_listen(fd, self.backlog)
            .inspect_err(|e| error!(fd, backlog = self.backlog, error = %e, "listen failed"))?;
        sys_set_nonblocking(fd).inspect_err(|e| error!(fd, error = %e, "O_NONBLOCK failed"))?;

        debug!(fd, %address, backlog = self.backlog, "listening");

        self.socket = Some(socket);
        self.listening = true;
        self.no_delay = false;
        self.accepted = None;

        Ok(())
    }

    /// Returns `true` if a client is waiting to be handed over.
    ///
    /// Never blocks. A client found here is accepted immediately and
    /// kept until the next [`available`](Self::available) or
    /// [`end`](Self::end).
    pub fn has_client(&mut self) -> bool {
        if self.accepted.is_some() {
            return true;
        }

        self.accepted = self.accept_pending();
        self.accepted.is_some()
    }

    /// Hands over the next client, if any.
    ///
    /// Returns an unconnected [`Connection`] when not listening, when no
    /// client is waiting, or when the accepted socket cannot be
    /// configured (keepalive, then the configured no-delay), in which
    /// case that socket is closed.
    pub fn available(&mut self) -> Connection {
        if !self.listening {
            return Connection::with_config(self.connection);
        }

        let Some(socket) = self.accepted.take().or_else(|| self.accept_pending()) else {
            return Connection::with_config(self.connection);
        };

        // Closed on every early return below.
        let fd = socket.fd();

        if let Err(e) = sys_set_keepalive(fd) {
            error!(fd, error = %e, "SO_KEEPALIVE failed, dropping client");
            return Connection::with_config(self.connection);
        }

        if let Err(e) = sys_set_nodelay(fd, self.no_delay) {
            error!(fd, error = %e, "TCP_NODELAY failed, dropping client");
            return Connection::with_config(self.connection);
        }

        debug!(fd, "client accepted");

        Connection::from_handle(socket, self.connection)
    }

    fn accept_pending(&self) -> Option<SocketHandle> {
        let listener = self.socket.as_ref()?;

        match sys_accept(listener.fd()) {
            Ok(fd) => Some(SocketHandle::new(fd)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!(fd = listener.fd(), error = %e, "accept failed");
                None
            }
        }
    }

    /// Sets whether accepted connections get `TCP_NODELAY`.
    ///
    /// Only affects connections handed over after this call.
    pub fn set_no_delay(&mut self, nodelay: bool) {
        self.no_delay = nodelay;
    }

    pub fn no_delay(&self) -> bool {
        self.no_delay
    }

    /// Sets receive and send timeouts on the listening socket itself.
    pub fn set_timeout(&self, seconds: u32) -> io::Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "listener is not bound"))?;

        sys_set_timeouts(socket.fd(), seconds)
    }

    /// Stops listening.
    ///
    /// Closes the listening socket and any client accepted by
    /// [`has_client`](Self::has_client) but never handed over.
    pub fn end(&mut self) {
        if let Some(socket) = self.socket.take() {
            debug!(fd = socket.fd(), "listener closed");
        }

        self.accepted = None;
        self.listening = false;
    }

    /// Same as [`end`](Self::end).
    pub fn close(&mut self) {
        self.end();
    }

    /// Same as [`end`](Self::end).
    pub fn stop(&mut self) {
        self.end();
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Returns the default port.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn backlog(&self) -> i32 {
        self.backlog
    }

    pub fn connection_config(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "listener is not bound"))?;

        sys_sockname(socket.fd())
    }
}
