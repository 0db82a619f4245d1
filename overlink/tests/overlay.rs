use overlink::overlay::{ControlPlane, HostTable, LifecycleState, Overlay, Resolver};
use overlink::{Connection, Error, Listener};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::thread;
use std::time::Duration;

/// Control plane stand-in backed by a fixed host table.
struct StaticService {
    hosts: HostTable,
    joined_as: Option<String>,
    running: bool,
}

impl StaticService {
    fn new(hosts: HostTable) -> Self {
        Self {
            hosts,
            joined_as: None,
            running: false,
        }
    }
}

impl Resolver for StaticService {
    fn resolve(&self, host: &str, port: &str) -> Option<SocketAddr> {
        if !self.running {
            return None;
        }
        self.hosts.resolve(host, port)
    }
}

impl ControlPlane for StaticService {
    fn join(&mut self, _code: &str, hostname: &str) {
        self.joined_as = Some(hostname.to_string());
    }

    fn start(&mut self) {
        self.running = true;
    }
}

#[test]
fn test_connect_through_started_overlay() {
    let mut listener = Listener::new(0);
    listener.begin(0).expect("Failed to start listener");
    let port = listener
        .local_addr()
        .expect("Failed to get local address")
        .port();

    let hosts: HostTable = [
        ("server", IpAddr::V6(Ipv6Addr::LOCALHOST)),
        ("printer", IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))),
    ]
    .into_iter()
    .collect();

    let mut overlay = Overlay::new(StaticService::new(hosts));
    overlay
        .join("0123-4567", Some("client-node"))
        .expect("Join should succeed before start");

    let mut client = Connection::new();
    assert!(matches!(
        client.connect_host(&overlay, "server", port),
        Err(Error::Unresolved(_))
    ));

    overlay.start().expect("First start should succeed");
    assert_eq!(overlay.state(), LifecycleState::Started);
    assert_eq!(overlay.control().joined_as.as_deref(), Some("client-node"));

    assert!(matches!(
        client.connect_host(&overlay, "printer", port),
        Err(Error::NotOverlay { .. })
    ));
    assert!(matches!(
        overlay.resolve_overlay("printer"),
        Err(Error::NotOverlay { .. })
    ));
    assert_eq!(client.fd(), None, "rejected host leaves the connection unconnected");

    client
        .connect_host(&overlay, "server", port)
        .expect("Failed to connect through overlay");

    let mut server = Connection::new();
    for _ in 0..300 {
        server = listener.available();
        if server.fd().is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(server.connected());

    assert_eq!(client.write(b"over"), 4);
}

#[test]
fn test_out_of_order_startup_is_an_error() {
    let mut overlay = Overlay::new(StaticService::new(HostTable::new()));

    overlay.start().expect("Start without join is allowed");
    assert!(matches!(overlay.start(), Err(Error::AlreadyStarted)));
    assert!(matches!(
        overlay.join("code", None),
        Err(Error::AlreadyStarted)
    ));
    assert_eq!(overlay.control().joined_as, None);
}
