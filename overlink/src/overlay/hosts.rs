use super::Resolver;

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

/// A fixed table of host names.
///
/// Useful when the overlay peers are known ahead of time. The port
/// string given to [`resolve`](Resolver::resolve) becomes the port of
/// the returned address; anything that does not parse as a port gives
/// port `0`.
#[derive(Debug, Clone, Default)]
pub struct HostTable {
    hosts: HashMap<String, IpAddr>,
}

impl HostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry. Returns the previous address, if any.
    pub fn insert(&mut self, host: impl Into<String>, addr: IpAddr) -> Option<IpAddr> {
        self.hosts.insert(host.into(), addr)
    }

    pub fn remove(&mut self, host: &str) -> Option<IpAddr> {
        self.hosts.remove(host)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl Resolver for HostTable {
    fn resolve(&self, host: &str, port: &str) -> Option<SocketAddr> {
        let ip = *self.hosts.get(host)?;
        let port = port.parse().unwrap_or(0);

        Some(SocketAddr::new(ip, port))
    }
}

impl<S: Into<String>> FromIterator<(S, IpAddr)> for HostTable {
    fn from_iter<I: IntoIterator<Item = (S, IpAddr)>>(iter: I) -> Self {
        Self {
            hosts: iter.into_iter().map(|(h, a)| (h.into(), a)).collect(),
        }
    }
}
