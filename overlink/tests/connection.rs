#[cfg(test)]
mod tests {
    use overlink::overlay::HostTable;
    use overlink::{Connection, ConnectionConfig, Error};

    use std::io::{Read, Write};
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, TcpListener, TcpStream};
    use std::os::fd::{FromRawFd, IntoRawFd};
    use std::thread;
    use std::time::{Duration, Instant};

    fn loopback_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("[::1]:0").expect("Failed to bind listener");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        (listener, port)
    }

    fn connected_pair() -> (Connection, TcpStream) {
        let (listener, port) = loopback_listener();

        let mut connection = Connection::new();
        connection
            .connect(IpAddr::V6(Ipv6Addr::LOCALHOST), port)
            .expect("Failed to connect to listener");

        let (peer, _) = listener.accept().expect("Failed to accept connection");
        (connection, peer)
    }

    /// Closes `peer` with an RST instead of a FIN.
    fn reset(peer: TcpStream) {
        let peer = unsafe { Connection::from_raw_fd(peer.into_raw_fd()) };
        let linger = [1i32.to_ne_bytes(), 0i32.to_ne_bytes()].concat();

        peer.set_socket_option(libc::SO_LINGER, &linger)
            .expect("Failed to set SO_LINGER");
        drop(peer);

        thread::sleep(Duration::from_millis(100));
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..300 {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_write_delivers_all_bytes_in_order() {
        let (mut connection, mut peer) = connected_pair();
        let payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();

        let handle = thread::spawn(move || {
            let mut received = Vec::new();
            peer.read_to_end(&mut received)
                .expect("Failed to read from stream");
            received
        });

        assert_eq!(connection.write(&payload), payload.len());
        connection.stop();

        let received = handle.join().expect("Thread panicked");
        assert_eq!(received, expected);
    }

    #[test]
    fn test_write_is_bounded_when_peer_never_drains() {
        let (listener, port) = loopback_listener();
        let config = ConnectionConfig::new()
            .write_retries(3)
            .write_wait(Duration::from_millis(100));

        let mut connection = Connection::with_config(config);
        connection
            .connect(IpAddr::V6(Ipv6Addr::LOCALHOST), port)
            .expect("Failed to connect to listener");
        let (_peer, _) = listener.accept().expect("Failed to accept connection");

        let payload = vec![0x5a; 64 * 1024 * 1024];
        let started = Instant::now();
        let sent = connection.write(&payload);

        assert!(sent < payload.len(), "write should stop short");
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(connection.connected(), "a short write is not a disconnect");
    }

    #[test]
    fn test_write_time_is_bounded_when_peer_drains_slowly() {
        let (listener, port) = loopback_listener();
        let config = ConnectionConfig::new()
            .write_retries(2)
            .write_wait(Duration::from_millis(100));

        let mut connection = Connection::with_config(config);
        connection
            .connect(IpAddr::V6(Ipv6Addr::LOCALHOST), port)
            .expect("Failed to connect to listener");
        let (mut peer, _) = listener.accept().expect("Failed to accept connection");

        let handle = thread::spawn(move || {
            let mut buffer = vec![0u8; 4 * 1024 * 1024];
            let mut total = 0;
            loop {
                match peer.read(&mut buffer) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => total += n,
                }
                thread::sleep(Duration::from_millis(60));
            }
            total
        });

        let payload = vec![0x33; 64 * 1024 * 1024];
        let started = Instant::now();
        let sent = connection.write(&payload);
        let elapsed = started.elapsed();
        connection.stop();

        assert!(sent < payload.len(), "write should stop short");
        assert!(
            elapsed < Duration::from_millis(600),
            "write took {elapsed:?} with a 200ms budget"
        );

        let received = handle.join().expect("Thread panicked");
        assert_eq!(received, sent);
    }

    #[test]
    fn test_write_to_reset_peer_stops_connection() {
        let (mut connection, peer) = connected_pair();
        reset(peer);

        assert_eq!(connection.write(b"after reset"), 0);
        assert_eq!(connection.fd(), None);
        assert!(!connection.connected());

        let mut buffer = [0u8; 4];
        assert_eq!(connection.read(&mut buffer), None);
    }

    #[test]
    fn test_reset_after_data_keeps_queued_bytes() {
        let (mut connection, mut peer) = connected_pair();
        peer.write_all(b"data").expect("Failed to write to stream");
        assert!(wait_until(|| connection.available() == 4));

        reset(peer);

        let mut buffer = [0u8; 8];
        assert_eq!(connection.read(&mut buffer), Some(4));
        assert_eq!(&buffer[..4], b"data");

        assert!(!connection.connected(), "reset is seen once input is drained");
        assert_eq!(connection.read(&mut buffer), None);
        assert_eq!(connection.write(b"late"), 0);
    }

    #[test]
    fn test_read_returns_none_without_data() {
        let (mut connection, _peer) = connected_pair();

        let mut buffer = [0u8; 8];
        assert_eq!(connection.available(), 0);
        assert_eq!(connection.read(&mut buffer), None);
        assert_eq!(connection.read_byte(), None);
        assert_eq!(connection.peek(), None);
        assert!(connection.connected());
    }

    #[test]
    fn test_read_and_peek() {
        let (mut connection, mut peer) = connected_pair();
        peer.write_all(b"hello").expect("Failed to write to stream");

        assert!(wait_until(|| connection.available() == 5));

        assert_eq!(connection.peek(), Some(b'h'));
        assert_eq!(connection.available(), 5, "peek must not consume");

        assert_eq!(connection.read_byte(), Some(b'h'));

        let mut buffer = [0u8; 16];
        assert_eq!(connection.read(&mut buffer), Some(4));
        assert_eq!(&buffer[..4], b"ello");
    }

    #[test]
    fn test_flush_drains_input() {
        let (mut connection, mut peer) = connected_pair();

        connection.flush();
        assert!(connection.connected());

        peer.write_all(&[7u8; 3000])
            .expect("Failed to write to stream");
        assert!(wait_until(|| connection.available() == 3000));

        connection.flush();
        assert_eq!(connection.available(), 0);
        assert!(connection.connected());
    }

    #[test]
    fn test_peer_close_disconnects() {
        let (mut connection, peer) = connected_pair();
        assert!(connection.connected());

        drop(peer);

        assert!(wait_until(|| !connection.connected()));

        let mut buffer = [0u8; 4];
        assert_eq!(connection.read(&mut buffer), None);
        assert_eq!(connection.write(b"late"), 0);
        assert_eq!(connection.available(), 0);
        assert!(!connection.connected(), "disconnect is sticky");
    }

    #[test]
    fn test_unconnected_is_inert() {
        let mut connection = Connection::new();

        assert_eq!(connection.fd(), None);
        assert!(!connection.connected());
        assert_eq!(connection.write(b"data"), 0);
        assert_eq!(connection.write_byte(1), 0);
        assert_eq!(connection.read_byte(), None);
        assert!(connection.get_option(libc::TCP_NODELAY).is_err());
        assert!(connection.set_timeout(1).is_err());
        assert!(!connection.no_delay());

        connection.stop();
        connection.stop();
    }

    #[test]
    fn test_legacy_address_rejected() {
        let mut connection = Connection::new();

        let result = connection.connect(IpAddr::V4(Ipv4Addr::LOCALHOST), 80);
        assert!(matches!(result, Err(Error::LegacyAddress(_))));
        assert_eq!(connection.fd(), None);
    }

    #[test]
    fn test_failed_connect_keeps_previous_socket() {
        let (mut connection, _peer) = connected_pair();
        let before = connection.clone();

        let (closed, port) = loopback_listener();
        drop(closed);

        let result = connection.connect(IpAddr::V6(Ipv6Addr::LOCALHOST), port);
        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(connection, before);
        assert!(connection.connected());
    }

    #[test]
    fn test_equality_is_socket_identity() {
        let (first, _peer_a) = connected_pair();
        let (second, _peer_b) = connected_pair();

        let copy = first.clone();
        assert_eq!(copy, first);
        assert_ne!(first, second);
        assert_ne!(first, Connection::new());
        assert_eq!(Connection::new(), Connection::new());
    }

    #[test]
    fn test_stop_releases_only_one_share() {
        let (mut original, mut peer) = connected_pair();
        let mut copy = original.clone();

        original.stop();
        assert_eq!(original.fd(), None);
        assert_ne!(original, copy);

        assert_eq!(copy.write(b"still open"), 10);

        let mut buffer = [0u8; 10];
        peer.read_exact(&mut buffer)
            .expect("Failed to read from stream");
        assert_eq!(&buffer, b"still open");

        drop(copy);

        let n = peer.read(&mut buffer).expect("Failed to read from stream");
        assert_eq!(n, 0, "last owner closes the socket");
    }

    #[test]
    fn test_reassignment_replaces_socket() {
        let (mut target, _peer_a) = connected_pair();
        let (source, _peer_b) = connected_pair();
        assert_ne!(target, source);

        target = source.clone();
        assert_eq!(target, source);
        assert!(target.connected());
    }

    #[test]
    fn test_socket_options() {
        let (connection, _peer) = connected_pair();

        connection
            .set_no_delay(true)
            .expect("Failed to set TCP_NODELAY");
        assert!(connection.no_delay());

        connection
            .set_no_delay(false)
            .expect("Failed to clear TCP_NODELAY");
        assert!(!connection.no_delay());

        connection.set_timeout(2).expect("Failed to set timeouts");

        let keepalive = 1i32.to_ne_bytes();
        connection
            .set_socket_option(libc::SO_KEEPALIVE, &keepalive)
            .expect("Failed to set SO_KEEPALIVE");
    }

    #[test]
    fn test_connect_by_host_name() {
        let (listener, port) = loopback_listener();

        let mut hosts = HostTable::new();
        hosts.insert("peer", IpAddr::V6(Ipv6Addr::LOCALHOST));
        hosts.insert("legacy", IpAddr::V4(Ipv4Addr::LOCALHOST));

        let mut connection = Connection::new();
        assert!(matches!(
            connection.connect_host(&hosts, "legacy", port),
            Err(Error::NotOverlay { .. })
        ));
        assert!(matches!(
            connection.connect_host(&hosts, "nobody", port),
            Err(Error::Unresolved(_))
        ));
        assert_eq!(connection.fd(), None);

        connection
            .connect_host(&hosts, "peer", port)
            .expect("Failed to connect by name");
        let (_peer, peer_addr) = listener.accept().expect("Failed to accept connection");

        assert_eq!(
            connection.local_addr().expect("Failed to get local address"),
            peer_addr
        );
        assert_eq!(
            connection
                .peer_addr()
                .expect("Failed to get peer address")
                .port(),
            port
        );
    }
}
