//! Example: polling echo server with Overlink
//!
//! Run with `RUST_LOG=debug` to see connection lifecycle events.

use overlink::{ConnectionSet, Listener};
use tracing_subscriber::{EnvFilter, fmt};

use std::thread;
use std::time::Duration;

fn main() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init();

    // Listen on every overlay address, port 9000
    let mut listener = Listener::new(9000);
    if let Err(e) = listener.begin(0) {
        eprintln!("Failed to listen: {}", e);
        return;
    }
    println!("Echo server listening on [::]:9000");

    let mut clients = ConnectionSet::new();
    let mut buf = [0u8; 1024];

    loop {
        // Pick up any waiting client without blocking
        while listener.has_client() {
            let client = listener.available();
            if let Ok(addr) = client.peer_addr() {
                println!("Accepted connection from {}", addr);
            }
            clients.insert(client);
        }

        for (_, client) in clients.iter_mut() {
            if let Some(n) = client.read(&mut buf) {
                client.write(&buf[..n]);
            }
        }

        clients.prune();
        thread::sleep(Duration::from_millis(5));
    }
}
