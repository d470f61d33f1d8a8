//! In-memory stand-ins for the topology, the pipeline authority and the
//! register layer, shared by the unit tests.

use alloc::vec::Vec;

use hdmitx_timing::{DeviceTiming, GenericMode};

use crate::device_path::DevicePath;
use crate::hw::TimingRegisters;
use crate::params::ParameterSet;
use crate::pipeline::{BridgeId, DisplayPipeline, EncoderDescriptor, EncoderId, PipelineError};
use crate::topology::{DeviceRef, GraphEndpoint, Topology};

pub(crate) const MODE_1080P: GenericMode = GenericMode {
    h_display: 1920,
    h_sync_start: 2008,
    h_sync_end: 2052,
    h_total: 2200,
    v_display: 1080,
    v_sync_start: 1084,
    v_sync_end: 1089,
    v_total: 1125,
};

pub(crate) const MODE_720P: GenericMode = GenericMode {
    h_display: 1280,
    h_sync_start: 1390,
    h_sync_end: 1430,
    h_total: 1650,
    v_display: 720,
    v_sync_start: 725,
    v_sync_end: 730,
    v_total: 750,
};

/// Topology with at most one sink, reachable from any endpoint.
pub(crate) struct FakeTopology {
    pub sink: Option<DeviceRef>,
    pub sink_bound: bool,
}

impl FakeTopology {
    pub fn sink_ref() -> DeviceRef {
        DeviceRef::new(DevicePath::parse("/amba_pl/i2c@a0010000/adv7511@39"))
    }

    pub fn with_sink(bound: bool) -> Self {
        Self {
            sink: Some(Self::sink_ref()),
            sink_bound: bound,
        }
    }
}

impl Topology for FakeTopology {
    fn lookup_sink(&self, _endpoint: &GraphEndpoint) -> Option<DeviceRef> {
        self.sink.clone()
    }

    fn driver_attached(&self, device: &DeviceRef) -> bool {
        self.sink.as_ref() == Some(device) && self.sink_bound
    }
}

/// Pipeline authority recording every request.
#[derive(Default)]
pub(crate) struct FakePipeline {
    pub next_id: u32,
    pub encoders: Vec<(EncoderId, EncoderDescriptor)>,
    pub unregistered: Vec<EncoderId>,
    pub parameter_owners: Vec<EncoderId>,
    pub links: Vec<(EncoderId, BridgeId)>,
    pub bridges: Vec<(DeviceRef, BridgeId)>,
    pub fail_register: Option<PipelineError>,
    pub fail_parameters: Option<PipelineError>,
    pub fail_attach: Option<PipelineError>,
}

impl FakePipeline {
    /// A pipeline where the fake sink has exported a bridge.
    pub fn with_bridge() -> Self {
        Self {
            bridges: alloc::vec![(FakeTopology::sink_ref(), BridgeId(100))],
            ..Self::default()
        }
    }

    pub fn live_encoders(&self) -> usize {
        self.encoders.len() - self.unregistered.len()
    }
}

impl DisplayPipeline for FakePipeline {
    fn register_encoder(&mut self, desc: &EncoderDescriptor) -> Result<EncoderId, PipelineError> {
        if let Some(err) = self.fail_register {
            return Err(err);
        }
        self.next_id += 1;
        let id = EncoderId(self.next_id);
        self.encoders.push((id, desc.clone()));
        Ok(id)
    }

    fn unregister_encoder(&mut self, encoder: EncoderId) {
        self.unregistered.push(encoder);
        self.links.retain(|(e, _)| *e != encoder);
    }

    fn register_parameters(
        &mut self,
        encoder: EncoderId,
        _params: &ParameterSet,
    ) -> Result<(), PipelineError> {
        if let Some(err) = self.fail_parameters {
            return Err(err);
        }
        self.parameter_owners.push(encoder);
        Ok(())
    }

    fn find_bridge(&self, device: &DeviceRef) -> Option<BridgeId> {
        self.bridges
            .iter()
            .find(|(d, _)| d == device)
            .map(|(_, b)| *b)
    }

    fn attach_bridge(&mut self, encoder: EncoderId, bridge: BridgeId) -> Result<(), PipelineError> {
        if let Some(err) = self.fail_attach {
            return Err(err);
        }
        self.links.push((encoder, bridge));
        Ok(())
    }
}

/// A register write observed by [`RecordingRegisters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RegWrite {
    Timing(DeviceTiming),
    Parameters { width: u64, height: u64 },
    Enable(bool),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingRegisters {
    pub writes: Vec<RegWrite>,
}

impl TimingRegisters for RecordingRegisters {
    fn apply_timing(&mut self, timing: &DeviceTiming) {
        self.writes.push(RegWrite::Timing(*timing));
    }

    fn apply_parameters(&mut self, params: &ParameterSet) {
        self.writes.push(RegWrite::Parameters {
            width: params.width_out(),
            height: params.height_out(),
        });
    }

    fn set_enable_bit(&mut self, enable: bool) {
        self.writes.push(RegWrite::Enable(enable));
    }
}
