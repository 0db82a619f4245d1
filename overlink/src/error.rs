//! Error type shared by the connection and overlay APIs.

use std::io;
use std::net::{IpAddr, Ipv4Addr};

/// Errors reported by `overlink`.
///
/// Transient socket conditions (would-block, short writes) are never
/// surfaced here; they show up as byte counts on the I/O methods instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An OS-level socket call failed.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    /// The overlay network only routes 128-bit addresses.
    #[error("IPv4 address {0} is not reachable over the overlay network")]
    LegacyAddress(Ipv4Addr),

    /// The resolver had no answer for the host name.
    #[error("could not resolve host `{0}`")]
    Unresolved(String),

    /// The resolver answered with an address outside the overlay family.
    #[error("host `{host}` resolved to {addr}, which is not an overlay address")]
    NotOverlay { host: String, addr: IpAddr },

    /// `start` was already called on the overlay client.
    #[error("overlay network already started")]
    AlreadyStarted,
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let err: Error = io::Error::from(io::ErrorKind::ConnectionRefused).into();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::ConnectionRefused));
    }

    #[test]
    fn messages_name_the_host() {
        let err = Error::NotOverlay {
            host: "sensor-1".into(),
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        };
        assert_eq!(
            err.to_string(),
            "host `sensor-1` resolved to 127.0.0.1, which is not an overlay address"
        );
    }
}
