//! Platform socket layer.
//!
//! Thin wrappers over the OS socket API. Every function here maps to one
//! or two system calls and reports failure through `io::Result` or a raw
//! negative return, leaving policy (retries, state changes, logging) to
//! the networking types built on top.
//!
//! The concrete implementation is selected at compile time.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub(crate) use unix::*;
