//! Boundary between the pipeline authority and the lifecycle controllers.
//!
//! The authority identifies a transmitter by a [`ComponentId`] in its
//! bind/unbind callbacks and by an [`EncoderId`] in its commit callbacks.
//! [`EncoderRegistry`] maps both identities to the owning [`HdmiTx`], so a
//! callback never has to recover the driver from an embedded framework
//! object. [`PipelineAdapter`] forwards each callback and translates the
//! result into the authority's [`Errno`] convention, keeping "retry later"
//! distinct from hard failures.

use alloc::collections::BTreeMap;
use core::fmt;

use hdmitx_timing::GenericMode;

use crate::DRIVER_NAME;
use crate::controller::HdmiTx;
use crate::error::{FatalError, LifecycleError, RetryOr};
use crate::hw::TimingRegisters;
use crate::params::{ParamError, ParameterSet};
use crate::pipeline::{DisplayPipeline, EncoderId, PipelineError};
use crate::topology::Topology;

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Error codes understood by the authority, with kernel errno values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Errno {
    /// No such object.
    NoEnt = 2,
    /// Out of memory or objects.
    NoMem = 12,
    /// Object busy, or request invalid in the current state.
    Busy = 16,
    /// No such device.
    NoDev = 19,
    /// Invalid argument.
    Inval = 22,
    /// Value out of range.
    Range = 34,
    /// A dependency has not probed yet; retry the bind later.
    ProbeDefer = 517,
}

impl Errno {
    /// Every code the adapter can return.
    pub const ALL: [Self; 7] = [
        Self::NoEnt,
        Self::NoMem,
        Self::Busy,
        Self::NoDev,
        Self::Inval,
        Self::Range,
        Self::ProbeDefer,
    ];

    /// Looks a code up by its symbolic name (`"EINVAL"`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }

    /// The negative return value the authority expects.
    #[must_use]
    pub const fn to_raw(self) -> i32 {
        -(self as i32)
    }

    /// Returns `true` for the deferred-retry code.
    #[must_use]
    pub const fn is_retry(self) -> bool {
        matches!(self, Self::ProbeDefer)
    }

    /// Symbolic name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoEnt => "ENOENT",
            Self::NoMem => "ENOMEM",
            Self::Busy => "EBUSY",
            Self::NoDev => "ENODEV",
            Self::Inval => "EINVAL",
            Self::Range => "ERANGE",
            Self::ProbeDefer => "EPROBE_DEFER",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.to_raw())
    }
}

impl From<PipelineError> for Errno {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Rejected => Self::Inval,
            PipelineError::Busy => Self::Busy,
            PipelineError::NoResources => Self::NoMem,
        }
    }
}

impl From<FatalError> for Errno {
    fn from(err: FatalError) -> Self {
        match err {
            FatalError::NoSink => Self::Inval,
            FatalError::BridgeNotFound => Self::NoDev,
            FatalError::Register(e) | FatalError::Parameters(e) | FatalError::Link(e) => e.into(),
            FatalError::InvalidState(_) => Self::Busy,
        }
    }
}

impl From<RetryOr<FatalError>> for Errno {
    fn from(err: RetryOr<FatalError>) -> Self {
        match err {
            RetryOr::Retry => Self::ProbeDefer,
            RetryOr::Fatal(e) => e.into(),
        }
    }
}

impl From<ParamError> for Errno {
    fn from(err: ParamError) -> Self {
        match err {
            ParamError::Unknown => Self::NoEnt,
            ParamError::OutOfRange { .. } => Self::Range,
            ParamError::NotInEnum { .. } => Self::Inval,
        }
    }
}

impl From<LifecycleError> for Errno {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::InvalidState { .. } => Self::Busy,
            LifecycleError::NoModeSet | LifecycleError::Timing(_) => Self::Inval,
            LifecycleError::Param(e) => e.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Identity of a transmitter in the authority's bind/unbind callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub u32);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

/// Maps callback identities to controller instances.
pub struct EncoderRegistry<R> {
    devices: BTreeMap<ComponentId, HdmiTx<R>>,
    encoders: BTreeMap<EncoderId, ComponentId>,
    next_id: u32,
}

impl<R> Default for EncoderRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> EncoderRegistry<R> {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            devices: BTreeMap::new(),
            encoders: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Adds a controller and returns its component id.
    pub fn insert(&mut self, device: HdmiTx<R>) -> ComponentId {
        let mut id = ComponentId(self.next_id);
        while self.devices.contains_key(&id) {
            id = ComponentId(id.0.wrapping_add(1));
        }
        self.next_id = id.0.wrapping_add(1);
        self.devices.insert(id, device);
        id
    }

    /// Removes a controller and any encoder mapping pointing at it.
    pub fn remove(&mut self, id: ComponentId) -> Option<HdmiTx<R>> {
        self.encoders.retain(|_, owner| *owner != id);
        self.devices.remove(&id)
    }

    /// Records that `encoder` belongs to `id`.
    pub fn link_encoder(&mut self, encoder: EncoderId, id: ComponentId) {
        self.encoders.insert(encoder, id);
    }

    /// Forgets every encoder mapping of `id`.
    pub fn unlink_encoders(&mut self, id: ComponentId) {
        self.encoders.retain(|_, owner| *owner != id);
    }

    /// Looks a controller up by component id.
    #[must_use]
    pub fn get(&self, id: ComponentId) -> Option<&HdmiTx<R>> {
        self.devices.get(&id)
    }

    /// Looks a controller up by component id, mutably.
    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut HdmiTx<R>> {
        self.devices.get_mut(&id)
    }

    /// Looks a controller up by the encoder id the authority assigned it.
    #[must_use]
    pub fn by_encoder(&self, encoder: EncoderId) -> Option<&HdmiTx<R>> {
        self.encoders
            .get(&encoder)
            .and_then(|id| self.devices.get(id))
    }

    /// Looks a controller up by encoder id, mutably.
    pub fn by_encoder_mut(&mut self, encoder: EncoderId) -> Option<&mut HdmiTx<R>> {
        let id = self.encoders.get(&encoder)?;
        self.devices.get_mut(id)
    }

    /// Number of registered controllers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if no controller is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterates over the registered component ids.
    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.devices.keys().copied()
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// The CRTC state handed to the encoder on a mode-set commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrtcState {
    /// Mode after the authority's adjustments; the one to program.
    pub adjusted_mode: GenericMode,
    /// Whether the CRTC will be scanning out after the commit.
    pub active: bool,
}

/// Callback surface registered with the pipeline authority.
pub struct PipelineAdapter<R> {
    registry: EncoderRegistry<R>,
}

impl<R> Default for PipelineAdapter<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> PipelineAdapter<R> {
    /// Creates an adapter with no devices.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registry: EncoderRegistry::new(),
        }
    }

    /// The underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &EncoderRegistry<R> {
        &self.registry
    }
}

impl<R: TimingRegisters> PipelineAdapter<R> {
    /// Makes a probed device available for binding.
    pub fn add_device(&mut self, device: HdmiTx<R>) -> ComponentId {
        let id = self.registry.insert(device);
        log::debug!("{}: added {}", DRIVER_NAME, id);
        id
    }

    /// Removes a device, detaching it first if still bound.
    pub fn remove_device(
        &mut self,
        id: ComponentId,
        pipeline: &mut dyn DisplayPipeline,
    ) -> Option<HdmiTx<R>> {
        let mut device = self.registry.remove(id)?;
        if device.state() != crate::state::DeviceState::Detached {
            device.detach(pipeline);
        }
        log::debug!("{}: removed {}", DRIVER_NAME, id);
        Some(device)
    }

    /// Bind callback.
    ///
    /// # Errors
    ///
    /// [`Errno::ProbeDefer`] when the sink has not probed yet; other codes
    /// are permanent failures.
    pub fn bind(
        &mut self,
        id: ComponentId,
        topology: &dyn Topology,
        pipeline: &mut dyn DisplayPipeline,
    ) -> Result<(), Errno> {
        let device = self.registry.get_mut(id).ok_or(Errno::NoEnt)?;
        device.attach(topology, pipeline).map_err(|err| {
            let errno = Errno::from(err);
            log::debug!("{}: bind {} -> {}", DRIVER_NAME, id, errno);
            errno
        })?;
        if let Some(encoder) = device.encoder() {
            self.registry.link_encoder(encoder, id);
        }
        Ok(())
    }

    /// Unbind callback.
    ///
    /// # Errors
    ///
    /// [`Errno::NoEnt`] for an unknown component.
    pub fn unbind(
        &mut self,
        id: ComponentId,
        pipeline: &mut dyn DisplayPipeline,
    ) -> Result<(), Errno> {
        let device = self.registry.get_mut(id).ok_or(Errno::NoEnt)?;
        device.detach(pipeline);
        self.registry.unlink_encoders(id);
        Ok(())
    }

    /// Mode-set callback of an atomic commit.
    ///
    /// A commit for an inactive CRTC carries no mode to program and leaves
    /// the stored timing alone.
    ///
    /// # Errors
    ///
    /// [`Errno::Inval`] for a malformed mode, [`Errno::Busy`] outside the
    /// states that accept a mode, [`Errno::NoEnt`] for an unknown encoder.
    pub fn atomic_mode_set(&mut self, encoder: EncoderId, crtc: &CrtcState) -> Result<(), Errno> {
        let device = self.device_mut(encoder)?;
        if !crtc.active {
            log::debug!("{}: {} mode-set on inactive crtc skipped", DRIVER_NAME, encoder);
            return Ok(());
        }
        device.mode_set(crtc.adjusted_mode).map_err(Errno::from)
    }

    /// Enable callback.
    ///
    /// # Errors
    ///
    /// [`Errno::Inval`] if no mode was set, [`Errno::Busy`] in a state that
    /// cannot be enabled, [`Errno::NoEnt`] for an unknown encoder.
    pub fn enable(&mut self, encoder: EncoderId) -> Result<(), Errno> {
        self.device_mut(encoder)?.enable().map_err(Errno::from)
    }

    /// Disable callback.
    ///
    /// # Errors
    ///
    /// [`Errno::Busy`] in a state that cannot be disabled, [`Errno::NoEnt`]
    /// for an unknown encoder.
    pub fn disable(&mut self, encoder: EncoderId) -> Result<(), Errno> {
        self.device_mut(encoder)?.disable().map_err(Errno::from)
    }

    /// Lists the encoder's parameters with their domains.
    ///
    /// # Errors
    ///
    /// [`Errno::NoEnt`] for an unknown encoder.
    pub fn properties(&self, encoder: EncoderId) -> Result<&ParameterSet, Errno> {
        self.registry
            .by_encoder(encoder)
            .map(HdmiTx::parameters)
            .ok_or(Errno::NoEnt)
    }

    /// Reads one property.
    ///
    /// # Errors
    ///
    /// [`Errno::NoEnt`] for an unknown encoder or property name.
    pub fn get_property(&self, encoder: EncoderId, name: &str) -> Result<u64, Errno> {
        self.registry
            .by_encoder(encoder)
            .ok_or(Errno::NoEnt)?
            .parameter(name)
            .map_err(Errno::from)
    }

    /// Writes one property.
    ///
    /// # Errors
    ///
    /// [`Errno::Range`] or [`Errno::Inval`] for a value outside the domain,
    /// [`Errno::NoEnt`] for an unknown encoder or property name.
    pub fn set_property(&mut self, encoder: EncoderId, name: &str, value: u64) -> Result<(), Errno> {
        self.device_mut(encoder)?
            .set_parameter(name, value)
            .map_err(Errno::from)
    }

    fn device_mut(&mut self, encoder: EncoderId) -> Result<&mut HdmiTx<R>, Errno> {
        self.registry.by_encoder_mut(encoder).ok_or_else(|| {
            log::warn!("{}: callback for unknown {}", DRIVER_NAME, encoder);
            Errno::NoEnt
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HdmiTxConfig;
    use crate::params::{OUT_FMT, WIDTH_OUT};
    use crate::state::DeviceState;
    use crate::testing::{FakePipeline, FakeTopology, MODE_720P, MODE_1080P, RecordingRegisters};

    fn adapter_with_device() -> (PipelineAdapter<RecordingRegisters>, ComponentId) {
        let mut adapter = PipelineAdapter::new();
        let device = HdmiTx::new(HdmiTxConfig::default(), RecordingRegisters::default()).unwrap();
        let id = adapter.add_device(device);
        (adapter, id)
    }

    fn commit(mode: GenericMode) -> CrtcState {
        CrtcState {
            adjusted_mode: mode,
            active: true,
        }
    }

    #[test]
    fn errno_raw_values() {
        assert_eq!(Errno::ProbeDefer.to_raw(), -517);
        assert_eq!(Errno::NoDev.to_raw(), -19);
        assert_eq!(Errno::Inval.to_raw(), -22);
        assert_eq!(Errno::ProbeDefer.to_string(), "EPROBE_DEFER (-517)");
        assert!(Errno::ProbeDefer.is_retry());
        assert!(!Errno::NoDev.is_retry());
    }

    #[test]
    fn errno_lookup_by_name() {
        for errno in Errno::ALL {
            assert_eq!(Errno::from_name(errno.name()), Some(errno));
        }
        assert_eq!(Errno::from_name("EAGAIN"), None);
    }

    #[test]
    fn retry_and_fatal_map_to_distinct_codes() {
        assert_eq!(Errno::from(RetryOr::<FatalError>::Retry), Errno::ProbeDefer);
        assert_eq!(Errno::from(RetryOr::Fatal(FatalError::NoSink)), Errno::Inval);
        assert_eq!(
            Errno::from(RetryOr::Fatal(FatalError::BridgeNotFound)),
            Errno::NoDev
        );
        assert_eq!(
            Errno::from(RetryOr::Fatal(FatalError::Link(PipelineError::Busy))),
            Errno::Busy
        );
    }

    #[test]
    fn bind_defers_then_succeeds() {
        let (mut adapter, id) = adapter_with_device();
        let mut pipeline = FakePipeline::with_bridge();
        let mut topo = FakeTopology::with_sink(false);

        assert_eq!(adapter.bind(id, &topo, &mut pipeline), Err(Errno::ProbeDefer));
        assert_eq!(
            adapter.registry().get(id).unwrap().state(),
            DeviceState::Unbound
        );

        topo.sink_bound = true;
        adapter.bind(id, &topo, &mut pipeline).unwrap();
        let device = adapter.registry().get(id).unwrap();
        assert_eq!(device.state(), DeviceState::Attached);
        let encoder = device.encoder().unwrap();
        assert!(adapter.registry().by_encoder(encoder).is_some());
    }

    #[test]
    fn bind_without_sink_is_hard_failure() {
        let (mut adapter, id) = adapter_with_device();
        let mut pipeline = FakePipeline::with_bridge();
        let topo = FakeTopology {
            sink: None,
            sink_bound: false,
        };
        let err = adapter.bind(id, &topo, &mut pipeline).unwrap_err();
        assert!(!err.is_retry());
    }

    #[test]
    fn commit_sequence_routes_by_encoder() {
        let (mut adapter, id) = adapter_with_device();
        let mut pipeline = FakePipeline::with_bridge();
        adapter
            .bind(id, &FakeTopology::with_sink(true), &mut pipeline)
            .unwrap();
        let encoder = adapter.registry().get(id).unwrap().encoder().unwrap();

        adapter.atomic_mode_set(encoder, &commit(MODE_1080P)).unwrap();
        adapter.enable(encoder).unwrap();
        adapter.disable(encoder).unwrap();
        adapter.disable(encoder).unwrap();

        let device = adapter.registry().get(id).unwrap();
        assert_eq!(device.state(), DeviceState::Disabled);
        assert_eq!(device.timing().unwrap().front_porch_h, 88);
    }

    #[test]
    fn enable_without_mode_is_inval() {
        let (mut adapter, id) = adapter_with_device();
        let mut pipeline = FakePipeline::with_bridge();
        adapter
            .bind(id, &FakeTopology::with_sink(true), &mut pipeline)
            .unwrap();
        let encoder = adapter.registry().get(id).unwrap().encoder().unwrap();
        assert_eq!(adapter.enable(encoder), Err(Errno::Inval));
    }

    #[test]
    fn bad_mode_is_inval() {
        let (mut adapter, id) = adapter_with_device();
        let mut pipeline = FakePipeline::with_bridge();
        adapter
            .bind(id, &FakeTopology::with_sink(true), &mut pipeline)
            .unwrap();
        let encoder = adapter.registry().get(id).unwrap().encoder().unwrap();
        let bad = GenericMode {
            h_sync_start: 100,
            ..MODE_1080P
        };
        assert_eq!(adapter.atomic_mode_set(encoder, &commit(bad)), Err(Errno::Inval));
    }

    #[test]
    fn unknown_encoder_is_noent() {
        let (mut adapter, _) = adapter_with_device();
        assert_eq!(adapter.enable(EncoderId(42)), Err(Errno::NoEnt));
        assert_eq!(
            adapter.atomic_mode_set(EncoderId(42), &commit(MODE_1080P)),
            Err(Errno::NoEnt)
        );
        assert!(adapter.properties(EncoderId(42)).is_err());
    }

    #[test]
    fn property_access() {
        let (mut adapter, id) = adapter_with_device();
        let mut pipeline = FakePipeline::with_bridge();
        adapter
            .bind(id, &FakeTopology::with_sink(true), &mut pipeline)
            .unwrap();
        let encoder = adapter.registry().get(id).unwrap().encoder().unwrap();

        assert_eq!(adapter.properties(encoder).unwrap().iter().count(), 4);
        adapter.set_property(encoder, WIDTH_OUT, 1280).unwrap();
        assert_eq!(adapter.get_property(encoder, WIDTH_OUT), Ok(1280));
        assert_eq!(adapter.set_property(encoder, WIDTH_OUT, 9000), Err(Errno::Range));
        assert_eq!(adapter.set_property(encoder, OUT_FMT, 7), Err(Errno::Inval));
        assert_eq!(adapter.get_property(encoder, "hue"), Err(Errno::NoEnt));
    }

    #[test]
    fn unbind_detaches_and_drops_encoder_route() {
        let (mut adapter, id) = adapter_with_device();
        let mut pipeline = FakePipeline::with_bridge();
        adapter
            .bind(id, &FakeTopology::with_sink(true), &mut pipeline)
            .unwrap();
        let encoder = adapter.registry().get(id).unwrap().encoder().unwrap();
        adapter.atomic_mode_set(encoder, &commit(MODE_1080P)).unwrap();
        adapter.enable(encoder).unwrap();

        adapter.unbind(id, &mut pipeline).unwrap();
        assert_eq!(
            adapter.registry().get(id).unwrap().state(),
            DeviceState::Detached
        );
        assert_eq!(adapter.enable(encoder), Err(Errno::NoEnt));
        assert_eq!(pipeline.live_encoders(), 0);
    }

    #[test]
    fn remove_detaches_bound_device() {
        let (mut adapter, id) = adapter_with_device();
        let mut pipeline = FakePipeline::with_bridge();
        adapter
            .bind(id, &FakeTopology::with_sink(true), &mut pipeline)
            .unwrap();

        let device = adapter.remove_device(id, &mut pipeline).unwrap();
        assert_eq!(device.state(), DeviceState::Detached);
        assert!(adapter.registry().is_empty());
        assert_eq!(pipeline.live_encoders(), 0);
        assert!(adapter.remove_device(id, &mut pipeline).is_none());
    }

    #[test]
    fn registry_tracks_multiple_devices() {
        let mut registry = EncoderRegistry::new();
        let a = registry.insert(
            HdmiTx::new(HdmiTxConfig::default(), RecordingRegisters::default()).unwrap(),
        );
        let b = registry.insert(
            HdmiTx::new(HdmiTxConfig::default(), RecordingRegisters::default()).unwrap(),
        );
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        registry.link_encoder(EncoderId(1), a);
        registry.link_encoder(EncoderId(2), b);
        registry.remove(a);
        assert!(registry.by_encoder(EncoderId(1)).is_none());
        assert!(registry.by_encoder(EncoderId(2)).is_some());
        assert_eq!(registry.ids().collect::<Vec<_>>(), [b]);
    }

    #[test]
    fn component_ids_wrap_without_reuse() {
        let mut registry = EncoderRegistry::new();
        registry.next_id = u32::MAX;
        let last = registry.insert(
            HdmiTx::new(HdmiTxConfig::default(), RecordingRegisters::default()).unwrap(),
        );
        let first = registry.insert(
            HdmiTx::new(HdmiTxConfig::default(), RecordingRegisters::default()).unwrap(),
        );
        assert_eq!(last, ComponentId(u32::MAX));
        assert_eq!(first, ComponentId(0));

        registry.next_id = u32::MAX;
        let next = registry.insert(
            HdmiTx::new(HdmiTxConfig::default(), RecordingRegisters::default()).unwrap(),
        );
        assert_eq!(next, ComponentId(1));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn inactive_crtc_keeps_stored_timing() {
        let (mut adapter, id) = adapter_with_device();
        let mut pipeline = FakePipeline::with_bridge();
        adapter
            .bind(id, &FakeTopology::with_sink(true), &mut pipeline)
            .unwrap();
        let encoder = adapter.registry().get(id).unwrap().encoder().unwrap();
        adapter.atomic_mode_set(encoder, &commit(MODE_1080P)).unwrap();

        let inactive = CrtcState {
            adjusted_mode: MODE_720P,
            active: false,
        };
        adapter.atomic_mode_set(encoder, &inactive).unwrap();
        let device = adapter.registry().get(id).unwrap();
        assert_eq!(device.timing().unwrap().active_w, 1920);
        assert_eq!(
            adapter.atomic_mode_set(EncoderId(42), &inactive),
            Err(Errno::NoEnt)
        );
    }
}
