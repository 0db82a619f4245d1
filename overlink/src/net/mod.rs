//! TCP networking primitives.
//!
//! This module provides synchronous, non-blocking TCP types for the
//! overlay network:
//! - accepting incoming connections,
//! - establishing outbound connections,
//! - reading and writing without blocking the caller's loop.
//!
//! Everything runs on the caller's thread; there is no background task
//! and no internal locking.
mod tcp;

pub use tcp::listener::Listener;
pub use tcp::set::ConnectionSet;
pub use tcp::stream::Connection;
