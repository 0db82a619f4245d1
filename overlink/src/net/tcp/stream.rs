use super::socket::SocketHandle;
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::overlay::{Resolver, resolve_overlay};
use crate::sys::{
    is_disconnect, sys_bytes_available, sys_connect, sys_getsockopt_int, sys_peek, sys_peername,
    sys_recv, sys_send, sys_set_timeouts, sys_setsockopt, sys_setsockopt_int, sys_socket,
    sys_sockname, sys_wait_writable,
};

use libc::{IPPROTO_TCP, SOL_SOCKET, TCP_NODELAY, c_int};
use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr, SocketAddrV6};
use std::os::fd::{FromRawFd, RawFd};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, trace, warn};

/// A non-blocking TCP connection over the overlay network.
///
/// A `Connection` is a cheap handle: cloning it shares the underlying
/// socket, which is closed once the last clone is stopped or dropped.
/// Two connections compare equal when they share the same socket,
/// regardless of the numeric descriptor value.
///
/// The connection moves through three states:
/// - *unconnected*: no socket, every I/O call is a no-op,
/// - *connected*: socket present and believed alive,
/// - *disconnected*: the peer went away or a fatal error occurred; I/O
///   fails fast until the connection is reconnected or reassigned.
///
/// All methods are synchronous. Reads never block; [`write`](Self::write)
/// may wait for writability within the bounds of its [`ConnectionConfig`].
#[derive(Debug, Clone, Default)]
pub struct Connection {
    handle: Option<Arc<SocketHandle>>,
    connected: bool,
    config: ConnectionConfig,
}

impl Connection {
    /// Creates an unconnected connection with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unconnected connection with custom settings.
    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            handle: None,
            connected: false,
            config,
        }
    }

    /// Wraps an already connected socket.
    pub(crate) fn from_handle(handle: SocketHandle, config: ConnectionConfig) -> Self {
        Self {
            handle: Some(Arc::new(handle)),
            connected: true,
            config,
        }
    }

    /// Connects to `ip:port`.
    ///
    /// Only 128-bit overlay addresses are routable; an IPv4 address
    /// always fails with [`Error::LegacyAddress`]. The connect itself
    /// blocks until the handshake completes or fails.
    ///
    /// On failure the connection keeps whatever socket and state it had
    /// before the call.
    pub fn connect(&mut self, ip: IpAddr, port: u16) -> Result<()> {
        let ip = match ip {
            IpAddr::V4(v4) => {
                warn!(address = %v4, "overlay network does not support IPv4 addresses");
                return Err(Error::LegacyAddress(v4));
            }
            IpAddr::V6(v6) => v6,
        };

        self.connect_overlay(ip, port)
    }

    /// Resolves `host` through `resolver` and connects to it.
    ///
    /// Fails without connecting if the host resolves to anything other
    /// than an overlay address.
    pub fn connect_host<R>(&mut self, resolver: &R, host: &str, port: u16) -> Result<()>
    where
        R: Resolver + ?Sized,
    {
        let ip = resolve_overlay(resolver, host)?;
        self.connect_overlay(ip, port)
    }

    fn connect_overlay(&mut self, ip: Ipv6Addr, port: u16) -> Result<()> {
        let fd = sys_socket().inspect_err(|e| error!(error = %e, "socket failed"))?;

        // Closed on every early return below.
        let socket = SocketHandle::new(fd);
        let address = SocketAddr::V6(SocketAddrV6::new(ip, port, 0, 0));

        if let Err(e) = sys_connect(socket.fd(), &address) {
            error!(fd, %address, error = %e, "connect failed");
            return Err(e.into());
        }

        debug!(fd, %address, "connected");

        self.handle = Some(Arc::new(socket));
        self.connected = true;

        Ok(())
    }

    /// Writes `buffer`, retrying while the socket is busy.
    ///
    /// Returns the number of bytes actually sent. A result shorter than
    /// `buffer.len()` means partial progress, not failure: the retry
    /// budget ran out (each attempt that sends nothing costs one retry),
    /// the call used up its time budget of
    /// [`ConnectionConfig::retries`] × [`ConnectionConfig::wait`], or a
    /// fatal error stopped the connection.
    ///
    /// Returns `0` immediately when not connected, and `0` if waiting for
    /// writability itself fails.
    pub fn write(&mut self, buffer: &[u8]) -> usize {
        let fd = match self.fd() {
            Some(fd) if self.connected => fd,
            _ => return 0,
        };

        let mut sent = 0;
        let mut retries = self.config.retries();
        let deadline = Instant::now().checked_add(self.config.wait().saturating_mul(retries));

        while sent < buffer.len() && retries > 0 {
            let mut wait = self.config.wait();
            if let Some(deadline) = deadline {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    trace!(fd, sent, "write time budget used up");
                    break;
                }
                wait = wait.min(left);
            }

            match sys_wait_writable(fd, wait) {
                Ok(true) => {}
                Ok(false) => {
                    retries -= 1;
                    trace!(fd, retries, "socket not writable");
                    continue;
                }
                Err(e) => {
                    error!(fd, error = %e, "writability wait failed");
                    return 0;
                }
            }

        let res = sys_send(fd, &buffer[sent..]);

            if res > 0 {
                sent += res as usize;
                continue;
            }

            if res == 0 {
                retries -= 1;
                continue;
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
                    retries -= 1;
                    trace!(fd, retries, "send would block");
                }
                _ => {
                    error!(fd, error = %err, "send failed");
                    self.stop();
                    break;
                }
            }
        }

        if sent < buffer.len() {
            debug!(fd, sent, requested = buffer.len(), "short write");
        }

        sent
    }

    /// Writes a single byte. Returns `1` on success, `0` otherwise.
    pub fn write_byte(&mut self, byte: u8) -> usize {
        self.write(&[byte])
    }

    /// Returns the number of bytes ready to be read without blocking.
    ///
    /// Returns `0` when not connected. A failed query stops the
    /// connection.
    pub fn available(&mut self) -> usize {
        if !self.connected {
            return 0;
        }

        let Some(fd) = self.fd() else {
            return 0;
        };

        match sys_bytes_available(fd) {
            Ok(n) => n,
            Err(e) => {
                error!(fd, error = %e, "FIONREAD failed");
                self.stop();
                0
            }
        }
    }

    /// Reads up to `buffer.len()` queued bytes.
    ///
    /// Returns `None` when nothing is queued (without blocking) or on
    /// error. An error other than would-block stops the connection.
    pub fn read(&mut self, buffer: &mut [u8]) -> Option<usize> {
        if self.available() == 0 {
            return None;
        }

        let fd = self.fd()?;
        let res = sys_recv(fd, buffer);

        if res < 0 {
            self.recv_failed(fd);
            return None;
        }

        Some(res as usize)
    }

    /// Reads one byte, or `None` if nothing is queued.
    pub fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];

        match self.read(&mut byte) {
            Some(1) => Some(byte[0]),
            _ => None,
        }
    }

    /// Returns the next queued byte without consuming it.
    pub fn peek(&mut self) -> Option<u8> {
        if self.available() == 0 {
            return None;
        }

        let fd = self.fd()?;
        let mut byte = [0u8; 1];
        let res = sys_peek(fd, &mut byte);

        if res < 0 {
            self.recv_failed(fd);
            return None;
        }

        (res == 1).then_some(byte[0])
    }

    fn recv_failed(&mut self, fd: RawFd) {
        let err = io::Error::last_os_error();

        if err.kind() != io::ErrorKind::WouldBlock {
            error!(fd, error = %err, "recv failed");
            self.stop();
        }
    }

    /// Discards every byte currently queued for reading.
    ///
    /// This drains input; outgoing data is never buffered in user space
    /// so there is nothing to push out. Any receive error stops the
    /// connection.
    pub fn flush(&mut self) {
        let mut remaining = self.available();
        if remaining == 0 {
            return;
        }

        let mut buffer = vec![0u8; self.config.chunk().min(remaining)];

        while remaining > 0 {
            let Some(fd) = self.fd() else {
                break;
            };

            let chunk = remaining.min(buffer.len());
            let res = sys_recv(fd, &mut buffer[..chunk]);

            if res < 0 {
                let err = io::Error::last_os_error();
                error!(fd, error = %err, "recv failed while flushing");
                self.stop();
                break;
            }

            if res == 0 {
                break;
            }

            remaining -= (res as usize).min(remaining);
        }
    }

    /// Returns whether the connection is still believed to be alive.
    ///
    /// While connected, this probes the socket without blocking or
    /// consuming data. An orderly shutdown by the peer or a
    /// not-connected, broken-pipe, reset, refused or aborted error
    /// marks the connection as disconnected; anything else leaves it
    /// connected. Once disconnected, no further probing happens.
    pub fn connected(&mut self) -> bool {
        if !self.connected {
            return false;
        }

        match self.fd() {
            None => self.connected = false,
            Some(fd) => {
                let mut byte = [0u8; 1];
                let res = sys_peek(fd, &mut byte);

                if res == 0 {
                    self.connected = false;
                } else if res < 0 {
                    let err = io::Error::last_os_error();
                    if is_disconnect(&err) {
                        self.connected = false;
                    }
                }

                if !self.connected {
                    debug!(fd, "peer disconnected");
                }
            }
        }

        self.connected
    }

    /// Releases this connection's share of the socket.
    ///
    /// The socket closes if no clone still holds it. Safe to call any
    /// number of times.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let shared = Arc::strong_count(&handle) > 1;
            debug!(fd = handle.fd(), shared, "connection stopped");
        }

        self.connected = false;
    }

    /// Returns the raw descriptor, if a socket is attached.
    pub fn fd(&self) -> Option<RawFd> {
        self.handle.as_ref().map(|handle| handle.fd())
    }

    /// Returns the settings this connection was created with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns the address of the remote peer.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        sys_peername(self.socket_fd()?)
    }

    /// Returns the local address of the socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        sys_sockname(self.socket_fd()?)
    }

    fn socket_fd(&self) -> io::Result<RawFd> {
        self.fd()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection has no socket"))
    }

    /// Sets a `SOL_SOCKET` option from raw bytes.
    ///
    /// `option` is passed to the OS untranslated.
    pub fn set_socket_option(&self, option: c_int, value: &[u8]) -> io::Result<()> {
        let fd = self.socket_fd()?;

        sys_setsockopt(fd, SOL_SOCKET, option, value)
            .inspect_err(|e| error!(fd, option, error = %e, "setsockopt failed"))
    }

    /// Sets an integer `IPPROTO_TCP` option.
    pub fn set_option(&self, option: c_int, value: c_int) -> io::Result<()> {
        let fd = self.socket_fd()?;

        sys_setsockopt_int(fd, IPPROTO_TCP, option, value)
            .inspect_err(|e| error!(fd, option, error = %e, "setsockopt failed"))
    }

    /// Reads an integer `IPPROTO_TCP` option.
    pub fn get_option(&self, option: c_int) -> io::Result<c_int> {
        let fd = self.socket_fd()?;

        sys_getsockopt_int(fd, IPPROTO_TCP, option)
            .inspect_err(|e| error!(fd, option, error = %e, "getsockopt failed"))
    }

    /// Sets both the receive and send timeouts, in whole seconds.
    pub fn set_timeout(&self, seconds: u32) -> io::Result<()> {
        let fd = self.socket_fd()?;

        sys_set_timeouts(fd, seconds)
            .inspect_err(|e| error!(fd, seconds, error = %e, "setting timeouts failed"))
    }

    /// Enables or disables `TCP_NODELAY`.
    pub fn set_no_delay(&self, nodelay: bool) -> io::Result<()> {
        self.set_option(TCP_NODELAY, nodelay as c_int)
    }

    /// Returns whether `TCP_NODELAY` is set. Query failures read as `false`.
    pub fn no_delay(&self) -> bool {
        self.get_option(TCP_NODELAY).map(|v| v != 0).unwrap_or(false)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        match (&self.handle, &other.handle) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for Connection {}

impl FromRawFd for Connection {
    /// Takes ownership of a connected stream socket.
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Self::from_handle(SocketHandle::new(fd), ConnectionConfig::new())
    }
}
