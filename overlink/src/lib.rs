//! # Overlink
//!
//! **Overlink** gives embedded applications socket-style TCP over an IPv6
//! overlay network: a [`Connection`] for client streams and a
//! [`Listener`] for servers, both driven from the application's own loop
//! without ever blocking on reads.
//!
//! Addresses come from the overlay network rather than the physical one,
//! so only 128-bit addresses are routable. Host names are resolved by the
//! overlay control plane through the [`overlay::Resolver`] trait.
//!
//! Overlink offers:
//!
//! - **Shared connections**: cloning a [`Connection`] shares its socket,
//!   which closes when the last clone goes away
//! - **Bounded writes** that retry a busy socket a fixed number of times
//!   and report partial progress instead of hanging
//! - **Accept-ahead listening**: [`Listener::has_client`] checks for a
//!   waiting client without losing it before [`Listener::available`]
//! - **An explicit overlay lifecycle** ([`overlay::Overlay`]) that rejects
//!   out-of-order start-up instead of aborting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use overlink::Listener;
//!
//! let mut listener = Listener::new(5000);
//! listener.begin(0).expect("failed to listen");
//!
//! loop {
//!     if listener.has_client() {
//!         let mut client = listener.available();
//!         let mut buffer = [0u8; 64];
//!
//!         while client.connected() {
//!             if let Some(n) = client.read(&mut buffer) {
//!                 client.write(&buffer[..n]);
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`net`] — Connections, listeners and connection sets
//! - [`overlay`] — Overlay lifecycle and name resolution
//! - [`config`] — Write-retry and listener tunables
//!
//! Diagnostics are emitted through [`tracing`]; install a subscriber to
//! see them.

mod error;
mod sys;
mod utils;

pub mod config;
pub mod net;
pub mod overlay;

pub use config::{ConnectionConfig, ListenerBuilder};
pub use error::{Error, Result};
pub use net::{Connection, ConnectionSet, Listener};
