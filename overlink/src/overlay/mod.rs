//! Overlay network client lifecycle and name resolution.
//!
//! The overlay network itself (tunnels, peer discovery, the virtual
//! interface) is run by an external control plane. This module only
//! models what the sockets need from it:
//!
//! - a [`Resolver`] turning host names into overlay addresses,
//! - a [`ControlPlane`] that can be joined and started once,
//! - an [`Overlay`] wrapper enforcing the start-up order
//!   `NotStarted → Joined → Started` with explicit errors.

mod hosts;

pub use hosts::HostTable;

use crate::error::{Error, Result};

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use tracing::{debug, warn};

/// Resolves host names to socket addresses.
pub trait Resolver {
    /// Looks up `host`. The `port` string is forwarded untouched.
    fn resolve(&self, host: &str, port: &str) -> Option<SocketAddr>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn resolve(&self, host: &str, port: &str) -> Option<SocketAddr> {
        (**self).resolve(host, port)
    }
}

/// The external overlay network service.
pub trait ControlPlane: Resolver {
    /// Provisions the node with a join code and an optional host name
    /// (empty when not given).
    fn join(&mut self, code: &str, hostname: &str);

    /// Brings the overlay interface up.
    fn start(&mut self);
}

/// Where an [`Overlay`] is in its start-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Joined,
    Started,
}

/// Owns a [`ControlPlane`] and guards its start-up order.
///
/// # Examples
///
/// ```rust
/// use overlink::overlay::{HostTable, LifecycleState, Overlay};
/// # use overlink::overlay::{ControlPlane, Resolver};
/// # use std::net::SocketAddr;
/// # struct Service(HostTable);
/// # impl Resolver for Service {
/// #     fn resolve(&self, host: &str, port: &str) -> Option<SocketAddr> { self.0.resolve(host, port) }
/// # }
/// # impl ControlPlane for Service {
/// #     fn join(&mut self, _: &str, _: &str) {}
/// #     fn start(&mut self) {}
/// # }
///
/// let mut overlay = Overlay::new(Service(HostTable::new()));
/// overlay.join("join-code", Some("sensor-1")).unwrap();
/// overlay.start().unwrap();
///
/// assert_eq!(overlay.state(), LifecycleState::Started);
/// assert!(overlay.start().is_err());
/// ```
#[derive(Debug)]
pub struct Overlay<C> {
    control: C,
    state: LifecycleState,
}

impl<C: ControlPlane> Overlay<C> {
    pub fn new(control: C) -> Self {
        Self {
            control,
            state: LifecycleState::NotStarted,
        }
    }

    /// Provides the join code. Must happen before [`start`](Self::start);
    /// may be repeated until then.
    pub fn join(&mut self, code: &str, hostname: Option<&str>) -> Result<()> {
        if self.state == LifecycleState::Started {
            return Err(Error::AlreadyStarted);
        }

        self.control.join(code, hostname.unwrap_or(""));
        self.state = LifecycleState::Joined;

        debug!(hostname = hostname.unwrap_or(""), "overlay joined");
        Ok(())
    }

    /// Starts the overlay network. Fails if it was already started.
    pub fn start(&mut self) -> Result<()> {
        if self.state == LifecycleState::Started {
            return Err(Error::AlreadyStarted);
        }

        self.control.start();
        self.state = LifecycleState::Started;

        debug!("overlay started");
        Ok(())
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    /// Resolves `host` to its overlay address.
    pub fn resolve_overlay(&self, host: &str) -> Result<Ipv6Addr> {
        resolve_overlay(&self.control, host)
    }
}

impl<C: ControlPlane> Resolver for Overlay<C> {
    /// Answers exactly what the control plane answers. Non-overlay
    /// results are rejected by [`Overlay::resolve_overlay`] and
    /// [`Connection::connect_host`](crate::Connection::connect_host).
    fn resolve(&self, host: &str, port: &str) -> Option<SocketAddr> {
        self.control.resolve(host, port)
    }
}

/// Resolves `host` and insists on an overlay address.
///
/// The port handed to the resolver is a placeholder; callers supply the
/// real one when connecting.
pub(crate) fn resolve_overlay<R>(resolver: &R, host: &str) -> Result<Ipv6Addr>
where
    R: Resolver + ?Sized,
{
    let Some(addr) = resolver.resolve(host, "1") else {
        warn!(host, "host not resolved");
        return Err(Error::Unresolved(host.to_string()));
    };

    match addr.ip() {
        IpAddr::V6(ip) => Ok(ip),
        other => {
            warn!(host, address = %other, "resolved address is not an overlay address");
            Err(Error::NotOverlay {
                host: host.to_string(),
                addr: other,
            })
        }
    }
}
