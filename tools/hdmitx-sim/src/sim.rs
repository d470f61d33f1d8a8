//! In-memory device graph and pipeline authority.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, bail};
use hdmitx::{
    BridgeId, DevicePath, DeviceRef, DisplayPipeline, EncoderDescriptor, EncoderId, GraphEndpoint,
    ParameterSet, PipelineError, Topology,
};

use crate::scenario::TopologySpec;

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SimNode {
    link: GraphEndpoint,
    device: DeviceRef,
    present: bool,
    attached: bool,
    bridge: bool,
}

/// Device graph built from `[[topology.nodes]]`.
#[derive(Debug, Default)]
pub struct SimTopology {
    nodes: Vec<SimNode>,
}

impl SimTopology {
    /// Builds the graph; links without a `source` start at `default_source`.
    pub fn new(spec: &TopologySpec, default_source: &str) -> Self {
        let nodes = spec
            .nodes
            .iter()
            .map(|node| SimNode {
                link: GraphEndpoint {
                    node: DevicePath::parse(node.source.as_deref().unwrap_or(default_source)),
                    port: node.port,
                    endpoint: node.endpoint,
                },
                device: DeviceRef::new(DevicePath::parse(&node.path)),
                present: node.present,
                attached: node.driver_attached,
                bridge: node.bridge,
            })
            .collect();
        Self { nodes }
    }

    /// Marks the driver of the device at `path` as attached or gone.
    ///
    /// Returns the device and whether it exports a bridge.
    pub fn set_attached(&mut self, path: &str, attached: bool) -> Result<(DeviceRef, bool)> {
        let wanted = DevicePath::parse(path);
        let Some(node) = self.nodes.iter_mut().find(|n| *n.device.path() == wanted) else {
            bail!("No topology node at {path}");
        };
        node.attached = attached;
        Ok((node.device.clone(), node.bridge))
    }

    /// Devices whose driver is attached and that export a bridge.
    pub fn bridge_providers(&self) -> impl Iterator<Item = &DeviceRef> {
        self.nodes
            .iter()
            .filter(|n| n.attached && n.bridge)
            .map(|n| &n.device)
    }
}

impl Topology for SimTopology {
    fn lookup_sink(&self, endpoint: &GraphEndpoint) -> Option<DeviceRef> {
        self.nodes
            .iter()
            .find(|n| n.present && n.link == *endpoint)
            .map(|n| n.device.clone())
    }

    fn driver_attached(&self, device: &DeviceRef) -> bool {
        self.nodes
            .iter()
            .any(|n| n.device == *device && n.attached)
    }
}

// ---------------------------------------------------------------------------
// Pipeline authority
// ---------------------------------------------------------------------------

/// Pipeline authority keeping encoders, bridges and links in maps.
#[derive(Debug, Default)]
pub struct SimPipeline {
    next_encoder: u32,
    next_bridge: u32,
    encoders: BTreeMap<EncoderId, EncoderDescriptor>,
    parameters: BTreeSet<EncoderId>,
    bridges: BTreeMap<DeviceRef, BridgeId>,
    links: BTreeMap<EncoderId, BridgeId>,
}

impl SimPipeline {
    /// Publishes a bridge for `device`, as its driver would on probe.
    pub fn export_bridge(&mut self, device: &DeviceRef) -> BridgeId {
        if let Some(bridge) = self.bridges.get(device) {
            return *bridge;
        }
        self.next_bridge += 1;
        let bridge = BridgeId(self.next_bridge);
        self.bridges.insert(device.clone(), bridge);
        log::debug!("sim: {} exports {}", device, bridge);
        bridge
    }

    /// Withdraws the bridge of `device`, dropping any link to it.
    pub fn withdraw_bridge(&mut self, device: &DeviceRef) {
        let Some(bridge) = self.bridges.remove(device) else {
            return;
        };
        let before = self.links.len();
        self.links.retain(|_, b| *b != bridge);
        if self.links.len() != before {
            log::warn!("sim: {} withdrawn while linked", bridge);
        }
    }

    /// Registered encoders.
    #[cfg(test)]
    pub fn encoders(&self) -> impl Iterator<Item = (&EncoderId, &EncoderDescriptor)> {
        self.encoders.iter()
    }

    /// The bridge linked to `encoder`, if any.
    #[cfg(test)]
    pub fn link(&self, encoder: EncoderId) -> Option<BridgeId> {
        self.links.get(&encoder).copied()
    }

    /// Whether `encoder` has advertised its parameters.
    #[cfg(test)]
    pub fn has_parameters(&self, encoder: EncoderId) -> bool {
        self.parameters.contains(&encoder)
    }
}

impl DisplayPipeline for SimPipeline {
    fn register_encoder(&mut self, desc: &EncoderDescriptor) -> Result<EncoderId, PipelineError> {
        self.next_encoder += 1;
        let id = EncoderId(self.next_encoder);
        log::debug!(
            "sim: registered {} '{}' {:?} crtcs={}",
            id,
            desc.name,
            desc.encoder_type,
            desc.possible_crtcs
        );
        self.encoders.insert(id, desc.clone());
        Ok(id)
    }

    fn unregister_encoder(&mut self, encoder: EncoderId) {
        self.encoders.remove(&encoder);
        self.parameters.remove(&encoder);
        self.links.remove(&encoder);
        log::debug!("sim: unregistered {}", encoder);
    }

    fn register_parameters(
        &mut self,
        encoder: EncoderId,
        params: &ParameterSet,
    ) -> Result<(), PipelineError> {
        if !self.encoders.contains_key(&encoder) {
            return Err(PipelineError::Rejected);
        }
        self.parameters.insert(encoder);
        log::debug!(
            "sim: {} advertises {} parameters",
            encoder,
            params.iter().count()
        );
        Ok(())
    }

    fn find_bridge(&self, device: &DeviceRef) -> Option<BridgeId> {
        self.bridges.get(device).copied()
    }

    fn attach_bridge(&mut self, encoder: EncoderId, bridge: BridgeId) -> Result<(), PipelineError> {
        if !self.encoders.contains_key(&encoder) {
            return Err(PipelineError::Rejected);
        }
        if self.links.values().any(|b| *b == bridge) {
            return Err(PipelineError::Busy);
        }
        self.links.insert(encoder, bridge);
        Ok(())
    }
}
