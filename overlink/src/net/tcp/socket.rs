use crate::sys::sys_close;

use std::fmt;
use std::os::fd::RawFd;

/// Sole owner of one open socket descriptor.
///
/// The descriptor is closed when the handle is dropped. Handles are never
/// cloned; connections share one through an `Arc` so the descriptor lives
/// exactly as long as its longest-lived owner.
pub(crate) struct SocketHandle {
    fd: RawFd,
}

impl SocketHandle {
    /// Takes ownership of an open descriptor.
    pub(crate) fn new(fd: RawFd) -> Self {
        Self { fd }
    }

    /// Returns the raw descriptor.
    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        tracing::trace!(fd = self.fd, "closing socket");
        sys_close(self.fd);
    }
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle").field("fd", &self.fd).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::os::fd::IntoRawFd;

    #[test]
    fn drop_closes_descriptor() {
        let listener = TcpListener::bind("[::1]:0").expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");

        let client = TcpStream::connect(addr).expect("Failed to connect to listener");
        let (mut server, _) = listener.accept().expect("Failed to accept connection");

        drop(SocketHandle::new(client.into_raw_fd()));

        let mut buffer = [0; 1];
        let n = server.read(&mut buffer).expect("Failed to read from stream");
        assert_eq!(n, 0, "peer should observe end of stream");
    }
}
