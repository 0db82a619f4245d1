//! TCP networking implementation.
//!
//! This module contains the concrete TCP types built on top of the
//! platform socket layer.
//!
//! It is split into:
//! - [`socket`]: the owned descriptor shared between connection clones,
//! - [`stream`]: client-side connections with retrying writes,
//! - [`listener`]: accepting incoming connections with accept-ahead,
//! - [`set`]: bookkeeping for many live connections.

pub mod listener;
pub mod set;
pub mod socket;
pub mod stream;
