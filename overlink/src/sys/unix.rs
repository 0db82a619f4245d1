use libc::{
    AF_INET, AF_INET6, F_GETFL, F_SETFL, FIONREAD, IPPROTO_TCP, MSG_DONTWAIT, MSG_PEEK, O_NONBLOCK,
    POLLERR, POLLHUP, POLLOUT, SO_KEEPALIVE, SO_RCVTIMEO, SO_REUSEADDR, SO_SNDTIMEO, SOCK_STREAM, SOL_SOCKET,
    TCP_NODELAY, accept, bind, c_int, c_void, close, connect, fcntl, getpeername, getsockname,
    getsockopt, ioctl, listen, poll, pollfd, recv, send, setsockopt, sockaddr, sockaddr_in,
    sockaddr_in6, sockaddr_storage, socket, socklen_t, time_t, timeval,
};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::RawFd;
use std::time::Duration;
use std::{io, mem};

/// Flags used for every outgoing `send(2)`.
///
/// Sends never block and never raise `SIGPIPE` on a reset peer.
#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: c_int = MSG_DONTWAIT | libc::MSG_NOSIGNAL;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: c_int = MSG_DONTWAIT;

/// Closes a file descriptor.
pub(crate) fn sys_close(fd: RawFd) {
    unsafe { close(fd) };
}

/// Sets a file descriptor to non-blocking mode.
pub(crate) fn sys_set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { fcntl(fd, F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let rc = unsafe { fcntl(fd, F_SETFL, flags | O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Creates an IPv6 stream socket.
///
/// The socket is left in blocking mode; callers pick per-call
/// non-blocking behaviour through `MSG_DONTWAIT` or switch the whole
/// descriptor with [`sys_set_nonblocking`].
pub(crate) fn sys_socket() -> io::Result<RawFd> {
    let fd = unsafe { socket(AF_INET6, SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    if let Err(e) = sys_suppress_sigpipe(fd) {
        unsafe { close(fd) };
        return Err(e);
    }

    Ok(fd)
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn sys_suppress_sigpipe(fd: RawFd) -> io::Result<()> {
    sys_setsockopt_int(fd, SOL_SOCKET, libc::SO_NOSIGPIPE, 1)
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn sys_suppress_sigpipe(_fd: RawFd) -> io::Result<()> {
    Ok(())
}

/// Binds a socket to an address.
pub(crate) fn sys_bind(fd: RawFd, addr: &SocketAddr) -> io::Result<()> {
    let (storage, len) = socketaddr_to_storage(addr);

    let rc = unsafe { bind(fd, &storage as *const _ as *const sockaddr, len) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Marks a socket as a listening socket with the given backlog.
pub(crate) fn sys_listen(fd: RawFd, backlog: c_int) -> io::Result<()> {
    let rc = unsafe { listen(fd, backlog) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Accepts a pending connection.
///
/// On a non-blocking listener this fails with `WouldBlock` when no
/// client is waiting.
pub(crate) fn sys_accept(fd: RawFd) -> io::Result<RawFd> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;

    let client_fd = unsafe { accept(fd, &mut storage as *mut _ as *mut sockaddr, &mut len) };

    if client_fd < 0 {
        return Err(io::Error::last_os_error());
    }

    if let Err(e) = sys_suppress_sigpipe(client_fd) {
        unsafe { close(client_fd) };
        return Err(e);
    }

    Ok(client_fd)
}

/// Returns the local address of a socket.
pub(crate) fn sys_sockname(fd: RawFd) -> io::Result<SocketAddr> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;

    let rc = unsafe { getsockname(fd, &mut storage as *mut _ as *mut sockaddr, &mut len) };

    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        sockaddr_storage_to_socketaddr(&storage)
    }
}

/// Returns the remote address of a connected socket.
pub(crate) fn sys_peername(fd: RawFd) -> io::Result<SocketAddr> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;

    let rc = unsafe { getpeername(fd, &mut storage as *mut _ as *mut sockaddr, &mut len) };

    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        sockaddr_storage_to_socketaddr(&storage)
    }
}

/// Connects a socket, blocking until the handshake completes or fails.
pub(crate) fn sys_connect(fd: RawFd, addr: &SocketAddr) -> io::Result<()> {
    let (storage, len) = socketaddr_to_storage(addr);

    loop {
        let rc = unsafe { connect(fd, &storage as *const _ as *const sockaddr, len) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Sends without blocking.
///
/// Returns the number of bytes queued, or a negative value on error.
pub(crate) fn sys_send(fd: RawFd, buffer: &[u8]) -> isize {
    unsafe { send(fd, buffer.as_ptr() as *const c_void, buffer.len(), SEND_FLAGS) }
}

/// Receives without blocking.
///
/// Returns the number of bytes received, `0` on orderly shutdown, or a
/// negative value on error.
pub(crate) fn sys_recv(fd: RawFd, buffer: &mut [u8]) -> isize {
    unsafe { recv(fd, buffer.as_mut_ptr() as *mut c_void, buffer.len(), MSG_DONTWAIT) }
}

/// Receives without consuming the queued bytes.
pub(crate) fn sys_peek(fd: RawFd, buffer: &mut [u8]) -> isize {
    unsafe {
        recv(
            fd,
            buffer.as_mut_ptr() as *mut c_void,
            buffer.len(),
            MSG_PEEK | MSG_DONTWAIT,
        )
    }
}

/// Returns the number of bytes queued for reading (`FIONREAD`).
pub(crate) fn sys_bytes_available(fd: RawFd) -> io::Result<usize> {
    let mut count: c_int = 0;

    let rc = unsafe { ioctl(fd, FIONREAD, &mut count) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(count.max(0) as usize)
    }
}

/// Waits until `fd` is writable or `timeout` elapses.
///
/// Returns `Ok(true)` when the socket is ready (including error and
/// hang-up conditions, which the next `send` will surface), and
/// `Ok(false)` on timeout. An interrupted wait counts as a timeout.
pub(crate) fn sys_wait_writable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pfd = pollfd {
        fd,
        events: POLLOUT,
        revents: 0,
    };
    let millis = timeout.as_millis().min(c_int::MAX as u128) as c_int;

    let rc = unsafe { poll(&mut pfd, 1, millis) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }

    Ok(rc > 0 && pfd.revents & (POLLOUT | POLLERR | POLLHUP) != 0)
}

/// Sets a raw socket option from a byte buffer.
pub(crate) fn sys_setsockopt(fd: RawFd, level: c_int, option: c_int, value: &[u8]) -> io::Result<()> {
    let rc = unsafe {
        setsockopt(
            fd,
            level,
            option,
            value.as_ptr() as *const c_void,
            value.len() as socklen_t,
        )
    };

    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Sets an integer-valued socket option.
pub(crate) fn sys_setsockopt_int(fd: RawFd, level: c_int, option: c_int, value: c_int) -> io::Result<()> {
    let rc = unsafe {
        setsockopt(
            fd,
            level,
            option,
            &value as *const _ as *const c_void,
            mem::size_of::<c_int>() as socklen_t,
        )
    };

    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Reads an integer-valued socket option.
pub(crate) fn sys_getsockopt_int(fd: RawFd, level: c_int, option: c_int) -> io::Result<c_int> {
    let mut value: c_int = 0;
    let mut len = mem::size_of::<c_int>() as socklen_t;

    let rc = unsafe {
        getsockopt(
            fd,
            level,
            option,
            &mut value as *mut _ as *mut c_void,
            &mut len,
        )
    };

    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(value)
    }
}

/// Enables `SO_REUSEADDR` on a socket.
pub(crate) fn sys_set_reuseaddr(fd: RawFd) -> io::Result<()> {
    sys_setsockopt_int(fd, SOL_SOCKET, SO_REUSEADDR, 1)
}

/// Applies the same whole-second timeout to `SO_RCVTIMEO` and `SO_SNDTIMEO`.
pub(crate) fn sys_set_timeouts(fd: RawFd, seconds: u32) -> io::Result<()> {
    let tv = timeval {
        tv_sec: seconds as time_t,
        tv_usec: 0,
    };
    let bytes = unsafe {
        std::slice::from_raw_parts(&tv as *const timeval as *const u8, mem::size_of::<timeval>())
    };

    sys_setsockopt(fd, SOL_SOCKET, SO_RCVTIMEO, bytes)?;
    sys_setsockopt(fd, SOL_SOCKET, SO_SNDTIMEO, bytes)
}

/// Enables `SO_KEEPALIVE`.
pub(crate) fn sys_set_keepalive(fd: RawFd) -> io::Result<()> {
    sys_setsockopt_int(fd, SOL_SOCKET, SO_KEEPALIVE, 1)
}

/// Sets `TCP_NODELAY`.
pub(crate) fn sys_set_nodelay(fd: RawFd, nodelay: bool) -> io::Result<()> {
    sys_setsockopt_int(fd, IPPROTO_TCP, TCP_NODELAY, nodelay as c_int)
}

/// Converts a `sockaddr_storage` to a Rust `SocketAddr`.
pub(crate) fn sockaddr_storage_to_socketaddr(storage: &sockaddr_storage) -> io::Result<SocketAddr> {
    match storage.ss_family as c_int {
        AF_INET => {
            let addr = unsafe { &*(storage as *const _ as *const sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
            let port = u16::from_be(addr.sin_port);

            Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
        }

        AF_INET6 => {
            let addr = unsafe { &*(storage as *const _ as *const sockaddr_in6) };
            let ip = Ipv6Addr::from(addr.sin6_addr.s6_addr);
            let port = u16::from_be(addr.sin6_port);

            Ok(SocketAddr::V6(SocketAddrV6::new(
                ip,
                port,
                addr.sin6_flowinfo,
                addr.sin6_scope_id,
            )))
        }

        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unsupported address family",
        )),
    }
}

/// Converts a `SocketAddr` to a `sockaddr_storage`.
pub(crate) fn socketaddr_to_storage(addr: &SocketAddr) -> (sockaddr_storage, socklen_t) {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };

    match addr {
        SocketAddr::V4(v4) => {
            let sa = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in) };
            sa.sin_family = AF_INET as _;
            sa.sin_port = v4.port().to_be();
            sa.sin_addr.s_addr = u32::from(*v4.ip()).to_be();

            (storage, mem::size_of::<sockaddr_in>() as socklen_t)
        }

        SocketAddr::V6(v6) => {
            let sa = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in6) };
            sa.sin6_family = AF_INET6 as _;
            sa.sin6_port = v6.port().to_be();
            sa.sin6_addr.s6_addr = v6.ip().octets();
            sa.sin6_flowinfo = v6.flowinfo();
            sa.sin6_scope_id = v6.scope_id();

            (storage, mem::size_of::<sockaddr_in6>() as socklen_t)
        }
    }
}

/// Returns `true` for errno values that mean the peer is gone.
pub(crate) fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::ENOTCONN)
            | Some(libc::EPIPE)
            | Some(libc::ECONNRESET)
            | Some(libc::ECONNREFUSED)
            | Some(libc::ECONNABORTED)
    )
}
