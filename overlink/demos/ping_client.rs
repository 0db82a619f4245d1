//! Example: client that resolves a peer by name and sends a ping
//!
//! Usage: `ping_client <host> <ipv6-address> <port>`

use overlink::Connection;
use overlink::overlay::HostTable;
use tracing_subscriber::{EnvFilter, fmt};

use std::net::IpAddr;
use std::thread;
use std::time::Duration;

fn main() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    let (host, ip, port) = match args.as_slice() {
        [_, host, ip, port] => match (ip.parse::<IpAddr>(), port.parse::<u16>()) {
            (Ok(ip), Ok(port)) => (host.clone(), ip, port),
            _ => {
                eprintln!("Invalid address or port");
                return;
            }
        },
        _ => {
            eprintln!("Usage: ping_client <host> <ipv6-address> <port>");
            return;
        }
    };

    // A static table stands in for the overlay's name service
    let mut hosts = HostTable::new();
    hosts.insert(host.clone(), ip);

    let mut client = Connection::new();
    if let Err(e) = client.connect_host(&hosts, &host, port) {
        eprintln!("Failed to connect: {}", e);
        return;
    }

    let sent = client.write(b"PING");
    println!("Sent {} bytes", sent);

    let mut buf = [0u8; 64];
    for _ in 0..100 {
        if let Some(n) = client.read(&mut buf) {
            println!("Received: {}", String::from_utf8_lossy(&buf[..n]));
            break;
        }
        if !client.connected() {
            println!("Server closed the connection");
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
}
