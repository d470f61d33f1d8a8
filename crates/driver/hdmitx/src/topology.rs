//! Downstream sink lookup.
//!
//! The transmitter's output port is connected, in the hardware description,
//! to a sink device (typically an I2C-controlled HDMI bridge). Drivers probe
//! in no particular order, so the sink may be declared but not yet usable.
//! [`SinkResolver`] keeps those two situations apart: a missing sink is a
//! configuration error, an unprobed one is a reason to retry later.

use core::fmt;

use crate::device_path::DevicePath;
use crate::error::ResolveError;

/// One endpoint of a node's port in the device graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GraphEndpoint {
    /// The node owning the port.
    pub node: DevicePath,
    /// Port number on that node.
    pub port: u32,
    /// Endpoint number within the port.
    pub endpoint: u32,
}

impl fmt::Display for GraphEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:port{}/endpoint{}", self.node, self.port, self.endpoint)
    }
}

/// A device known to the topology.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceRef {
    path: DevicePath,
}

impl DeviceRef {
    /// Creates a reference to the device at `path`.
    #[must_use]
    pub const fn new(path: DevicePath) -> Self {
        Self { path }
    }

    /// The device's node path.
    #[must_use]
    pub const fn path(&self) -> &DevicePath {
        &self.path
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path, f)
    }
}

/// Queries consumed from the configuration/topology subsystem.
pub trait Topology {
    /// Returns the device on the remote side of `endpoint`, if the topology
    /// declares one.
    fn lookup_sink(&self, endpoint: &GraphEndpoint) -> Option<DeviceRef>;

    /// Returns `true` once a driver has bound to `device`.
    fn driver_attached(&self, device: &DeviceRef) -> bool;
}

/// A resolved sink.
///
/// Holds only the lookup identity of the sink, never its lifetime: the sink
/// belongs to another driver and may go away independently. Handles are only
/// minted by [`SinkResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkHandle {
    device: DeviceRef,
}

impl SinkHandle {
    /// The sink device.
    #[must_use]
    pub const fn device(&self) -> &DeviceRef {
        &self.device
    }
}

/// Locates the sink connected to one of our output endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkResolver {
    endpoint: GraphEndpoint,
}

impl SinkResolver {
    /// Creates a resolver for the given output endpoint.
    #[must_use]
    pub const fn new(endpoint: GraphEndpoint) -> Self {
        Self { endpoint }
    }

    /// The endpoint this resolver follows.
    #[must_use]
    pub const fn endpoint(&self) -> &GraphEndpoint {
        &self.endpoint
    }

    /// Looks the sink up afresh.
    ///
    /// Nothing is cached between calls: each attach cycle must see the sink's
    /// current state, since it may have been unbound and rebound meanwhile.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::NotFound`] if the topology declares no sink.
    /// - [`ResolveError::NotReady`] if the sink exists but has no driver yet.
    pub fn resolve(&self, topology: &dyn Topology) -> Result<SinkHandle, ResolveError> {
        let device = topology
            .lookup_sink(&self.endpoint)
            .ok_or(ResolveError::NotFound)?;
        if !topology.driver_attached(&device) {
            log::debug!("sink {} declared at {} but not bound", device, self.endpoint);
            return Err(ResolveError::NotReady);
        }
        Ok(SinkHandle { device })
    }
}
