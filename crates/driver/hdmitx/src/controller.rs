//! Lifecycle controller for one transmitter instance.
//!
//! [`HdmiTx`] owns the device state machine and everything whose validity
//! depends on it: the sink handle, the encoder and bridge ids handed out by
//! the authority, the stored [`DeviceTiming`] and the [`ParameterSet`].
//! Every state change goes through one of the methods below; an operation
//! arriving in the wrong state is reported, never absorbed.

use hdmitx_timing::{DeviceTiming, GenericMode};

use crate::DRIVER_NAME;
use crate::config::HdmiTxConfig;
use crate::error::{FatalError, LifecycleError, ResolveError, RetryOr};
use crate::hw::TimingRegisters;
use crate::params::{ParamError, ParameterSet};
use crate::pipeline::{BridgeId, DisplayPipeline, EncoderId};
use crate::state::{DeviceState, Operation};
use crate::topology::{SinkHandle, SinkResolver, Topology};

/// Pipeline objects held while bound.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    sink: SinkHandle,
    encoder: EncoderId,
    bridge: BridgeId,
}

/// HDMI Tx driver state.
pub struct HdmiTx<R> {
    config: HdmiTxConfig,
    resolver: SinkResolver,
    state: DeviceState,
    binding: Option<Binding>,
    timing: Option<DeviceTiming>,
    params: ParameterSet,
    regs: R,
}

impl<R: TimingRegisters> HdmiTx<R> {
    /// Creates an unbound instance.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if the configured parameter values are out of
    /// their domains.
    pub fn new(config: HdmiTxConfig, regs: R) -> Result<Self, ParamError> {
        let params = ParameterSet::from_config(&config)?;
        let resolver = SinkResolver::new(config.sink_endpoint());
        Ok(Self {
            config,
            resolver,
            state: DeviceState::Unbound,
            binding: None,
            timing: None,
            params,
            regs,
        })
    }

    /// Binds the transmitter into the pipeline.
    ///
    /// Resolves the sink, registers the encoder and its parameters, then links
    /// the sink's bridge. On any failure the device is back in `Unbound` with
    /// nothing left registered, so the call can be repeated.
    ///
    /// # Errors
    ///
    /// - [`RetryOr::Retry`] if the sink has not probed yet.
    /// - [`RetryOr::Fatal`] for a missing sink, an authority refusal, or a
    ///   call outside `Unbound`.
    pub fn attach(
        &mut self,
        topology: &dyn Topology,
        pipeline: &mut dyn DisplayPipeline,
    ) -> Result<(), RetryOr<FatalError>> {
        if self.state != DeviceState::Unbound {
            return Err(RetryOr::Fatal(FatalError::InvalidState(self.state)));
        }

        self.state = DeviceState::Resolving;
        let sink = match self.resolver.resolve(topology) {
            Ok(sink) => sink,
            Err(ResolveError::NotReady) => {
                log::warn!(
                    "{}: sink at {} not ready, deferring",
                    DRIVER_NAME,
                    self.resolver.endpoint()
                );
                self.state = DeviceState::Unbound;
                return Err(RetryOr::Retry);
            }
            Err(ResolveError::NotFound) => {
                log::error!(
                    "{}: no sink connected at {}",
                    DRIVER_NAME,
                    self.resolver.endpoint()
                );
                self.state = DeviceState::Unbound;
                return Err(RetryOr::Fatal(FatalError::NoSink));
            }
        };

        match self.register(&sink, pipeline) {
            Ok((encoder, bridge)) => {
                log::info!(
                    "{}: attached as {} -> {} ({})",
                    DRIVER_NAME,
                    encoder,
                    bridge,
                    sink.device()
                );
                self.binding = Some(Binding {
                    sink,
                    encoder,
                    bridge,
                });
                self.state = DeviceState::Attached;
                Ok(())
            }
            Err(err) => {
                log::error!("{}: attach failed: {}", DRIVER_NAME, err);
                self.state = DeviceState::Unbound;
                Err(RetryOr::Fatal(err))
            }
        }
    }

    /// Registers the encoder and links it to the sink's bridge, unregistering
    /// again if any later step fails.
    fn register(
        &self,
        sink: &SinkHandle,
        pipeline: &mut dyn DisplayPipeline,
    ) -> Result<(EncoderId, BridgeId), FatalError> {
        let encoder = pipeline
            .register_encoder(&self.config.encoder_descriptor())
            .map_err(FatalError::Register)?;

        let linked = pipeline
            .register_parameters(encoder, &self.params)
            .map_err(FatalError::Parameters)
            .and_then(|()| {
                pipeline
                    .find_bridge(sink.device())
                    .ok_or(FatalError::BridgeNotFound)
            })
            .and_then(|bridge| {
                pipeline
                    .attach_bridge(encoder, bridge)
                    .map(|()| bridge)
                    .map_err(FatalError::Link)
            });

        match linked {
            Ok(bridge) => Ok((encoder, bridge)),
            Err(err) => {
                pipeline.unregister_encoder(encoder);
                Err(err)
            }
        }
    }

    /// Translates and stores a new mode.
    ///
    /// Accepted while `Attached` or `Disabled`. A rejected mode leaves the
    /// previously stored timing in place.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::InvalidState`] outside `Attached`/`Disabled`.
    /// - [`LifecycleError::Timing`] for a malformed mode.
    pub fn mode_set(&mut self, mode: GenericMode) -> Result<(), LifecycleError> {
        if !matches!(self.state, DeviceState::Attached | DeviceState::Disabled) {
            return Err(self.invalid(Operation::ModeSet));
        }
        let timing = hdmitx_timing::derive(mode).inspect_err(|err| {
            log::warn!("{}: rejecting mode {}: {}", DRIVER_NAME, mode, err);
        })?;
        log::debug!("{}: mode {} -> {}", DRIVER_NAME, mode, timing);
        self.timing = Some(timing);
        Ok(())
    }

    /// Programs the stored timing and starts scan-out.
    ///
    /// Redundant calls while `Enabled` succeed without touching the hardware.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::NoModeSet`] if no mode has been stored.
    /// - [`LifecycleError::InvalidState`] outside the bound states.
    pub fn enable(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            DeviceState::Enabled => {
                log::debug!("{}: already enabled", DRIVER_NAME);
                Ok(())
            }
            DeviceState::Attached | DeviceState::Disabled => {
                let timing = self.timing.ok_or(LifecycleError::NoModeSet)?;
                self.regs.apply_parameters(&self.params);
                self.regs.apply_timing(&timing);
                self.regs.set_enable_bit(true);
                self.state = DeviceState::Enabled;
                log::info!("{}: enabled {}", DRIVER_NAME, timing);
                Ok(())
            }
            _ => Err(self.invalid(Operation::Enable)),
        }
    }

    /// Stops scan-out.
    ///
    /// Redundant calls while `Disabled` succeed without touching the hardware.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidState`] unless `Enabled` or `Disabled`.
    pub fn disable(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            DeviceState::Disabled => {
                log::debug!("{}: already disabled", DRIVER_NAME);
                Ok(())
            }
            DeviceState::Enabled => {
                self.regs.set_enable_bit(false);
                self.state = DeviceState::Disabled;
                log::info!("{}: disabled", DRIVER_NAME);
                Ok(())
            }
            _ => Err(self.invalid(Operation::Disable)),
        }
    }

    /// Tears the device down. Terminal, and valid from any state.
    ///
    /// Stops scan-out if enabled, unregisters the encoder (which drops the
    /// bridge link) and forgets the sink and the stored timing.
    pub fn detach(&mut self, pipeline: &mut dyn DisplayPipeline) {
        match self.state {
            DeviceState::Detached => {
                log::warn!("{}: detach on detached device ignored", DRIVER_NAME);
                return;
            }
            DeviceState::Enabled => {
                self.regs.set_enable_bit(false);
            }
            _ => {}
        }

        if let Some(binding) = self.binding.take() {
            pipeline.unregister_encoder(binding.encoder);
            log::info!(
                "{}: detached {} from {}",
                DRIVER_NAME,
                binding.encoder,
                binding.sink.device()
            );
        }
        self.timing = None;
        self.state = DeviceState::Detached;
    }

    /// Reads a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidState`] once detached, or
    /// [`LifecycleError::Param`] for an unknown name.
    pub fn parameter(&self, name: &str) -> Result<u64, LifecycleError> {
        if self.state == DeviceState::Detached {
            return Err(self.invalid(Operation::Parameter));
        }
        Ok(self.params.value(name)?)
    }

    /// Writes a parameter. Takes effect on the next `enable()`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidState`] once detached, or
    /// [`LifecycleError::Param`] for an unknown name or out-of-domain value.
    pub fn set_parameter(&mut self, name: &str, value: u64) -> Result<(), LifecycleError> {
        if self.state == DeviceState::Detached {
            return Err(self.invalid(Operation::Parameter));
        }
        self.params.set(name, value)?;
        log::debug!("{}: {} <- {}", DRIVER_NAME, name, value);
        Ok(())
    }

    fn invalid(&self, op: Operation) -> LifecycleError {
        LifecycleError::InvalidState {
            op,
            state: self.state,
        }
    }
}

impl<R> HdmiTx<R> {
    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> DeviceState {
        self.state
    }

    /// The stored timing. Always `None` outside the bound states.
    #[must_use]
    pub fn timing(&self) -> Option<&DeviceTiming> {
        if self.state.is_bound() {
            self.timing.as_ref()
        } else {
            None
        }
    }

    /// The resolved sink, while bound.
    #[must_use]
    pub fn sink(&self) -> Option<&SinkHandle> {
        self.binding.as_ref().map(|b| &b.sink)
    }

    /// The authority's id for this encoder, while bound.
    #[must_use]
    pub fn encoder(&self) -> Option<EncoderId> {
        self.binding.as_ref().map(|b| b.encoder)
    }

    /// The linked bridge, while bound.
    #[must_use]
    pub fn bridge(&self) -> Option<BridgeId> {
        self.binding.as_ref().map(|b| b.bridge)
    }

    /// The parameter set.
    #[must_use]
    pub const fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    /// The instance configuration.
    #[must_use]
    pub const fn config(&self) -> &HdmiTxConfig {
        &self.config
    }

    /// The register backend.
    #[must_use]
    pub const fn registers(&self) -> &R {
        &self.regs
    }
}

#[cfg(test)]
mod tests {
    use hdmitx_timing::{TimingError, TimingField};

    use super::*;
    use crate::params::{HEIGHT_OUT, WIDTH_OUT};
    use crate::pipeline::PipelineError;
    use crate::testing::{
        FakePipeline, FakeTopology, MODE_1080P, MODE_720P, RecordingRegisters, RegWrite,
    };

    fn device() -> HdmiTx<RecordingRegisters> {
        HdmiTx::new(HdmiTxConfig::default(), RecordingRegisters::default()).unwrap()
    }

    fn attached() -> (HdmiTx<RecordingRegisters>, FakePipeline) {
        let mut tx = device();
        let mut pipeline = FakePipeline::with_bridge();
        tx.attach(&FakeTopology::with_sink(true), &mut pipeline)
            .unwrap();
        (tx, pipeline)
    }

    fn enabled() -> (HdmiTx<RecordingRegisters>, FakePipeline) {
        let (mut tx, pipeline) = attached();
        tx.mode_set(MODE_1080P).unwrap();
        tx.enable().unwrap();
        (tx, pipeline)
    }

    const TIMING_1080P: DeviceTiming = DeviceTiming {
        active_w: 1920,
        active_h: 1080,
        front_porch_h: 88,
        back_porch_h: 148,
        sync_len_h: 44,
        front_porch_v: 4,
        back_porch_v: 36,
        sync_len_v: 5,
    };

    #[test]
    fn attach_registers_encoder_and_links_bridge() {
        let (tx, pipeline) = attached();
        assert_eq!(tx.state(), DeviceState::Attached);
        assert_eq!(tx.sink().unwrap().device(), &FakeTopology::sink_ref());
        assert_eq!(tx.bridge(), Some(crate::pipeline::BridgeId(100)));

        let encoder = tx.encoder().unwrap();
        assert_eq!(pipeline.encoders.len(), 1);
        assert_eq!(pipeline.encoders[0].1, tx.config().encoder_descriptor());
        assert_eq!(pipeline.parameter_owners, [encoder]);
        assert_eq!(pipeline.links, [(encoder, crate::pipeline::BridgeId(100))]);
    }

    #[test]
    fn attach_retries_until_sink_probes() {
        let mut tx = device();
        let mut pipeline = FakePipeline::with_bridge();
        let mut topo = FakeTopology::with_sink(false);

        assert_eq!(tx.attach(&topo, &mut pipeline), Err(RetryOr::Retry));
        assert_eq!(tx.state(), DeviceState::Unbound);
        assert!(tx.sink().is_none());
        assert!(pipeline.encoders.is_empty());

        // Retrying before the sink probes changes nothing either.
        assert_eq!(tx.attach(&topo, &mut pipeline), Err(RetryOr::Retry));

        topo.sink_bound = true;
        tx.attach(&topo, &mut pipeline).unwrap();
        assert_eq!(tx.state(), DeviceState::Attached);
        assert_eq!(pipeline.live_encoders(), 1);
    }

    #[test]
    fn attach_without_sink_is_fatal() {
        let mut tx = device();
        let mut pipeline = FakePipeline::with_bridge();
        let topo = FakeTopology {
            sink: None,
            sink_bound: false,
        };
        assert_eq!(
            tx.attach(&topo, &mut pipeline),
            Err(RetryOr::Fatal(FatalError::NoSink))
        );
        assert_eq!(tx.state(), DeviceState::Unbound);
    }

    #[test]
    fn missing_bridge_rolls_back_encoder() {
        let mut tx = device();
        let mut pipeline = FakePipeline::default();
        assert_eq!(
            tx.attach(&FakeTopology::with_sink(true), &mut pipeline),
            Err(RetryOr::Fatal(FatalError::BridgeNotFound))
        );
        assert_eq!(tx.state(), DeviceState::Unbound);
        assert_eq!(pipeline.encoders.len(), 1);
        assert_eq!(pipeline.live_encoders(), 0);
        assert!(tx.encoder().is_none());
    }

    #[test]
    fn link_failure_rolls_back_encoder() {
        let mut tx = device();
        let mut pipeline = FakePipeline {
            fail_attach: Some(PipelineError::Busy),
            ..FakePipeline::with_bridge()
        };
        assert_eq!(
            tx.attach(&FakeTopology::with_sink(true), &mut pipeline),
            Err(RetryOr::Fatal(FatalError::Link(PipelineError::Busy)))
        );
        assert_eq!(tx.state(), DeviceState::Unbound);
        assert_eq!(pipeline.live_encoders(), 0);
        assert!(pipeline.links.is_empty());
    }

    #[test]
    fn parameter_registration_failure_rolls_back_encoder() {
        let mut tx = device();
        let mut pipeline = FakePipeline {
            fail_parameters: Some(PipelineError::NoResources),
            ..FakePipeline::with_bridge()
        };
        assert_eq!(
            tx.attach(&FakeTopology::with_sink(true), &mut pipeline),
            Err(RetryOr::Fatal(FatalError::Parameters(
                PipelineError::NoResources
            )))
        );
        assert_eq!(pipeline.live_encoders(), 0);
    }

    #[test]
    fn encoder_registration_failure_is_fatal() {
        let mut tx = device();
        let mut pipeline = FakePipeline {
            fail_register: Some(PipelineError::Rejected),
            ..FakePipeline::with_bridge()
        };
        assert_eq!(
            tx.attach(&FakeTopology::with_sink(true), &mut pipeline),
            Err(RetryOr::Fatal(FatalError::Register(PipelineError::Rejected)))
        );
        assert_eq!(tx.state(), DeviceState::Unbound);
        assert!(pipeline.unregistered.is_empty());
    }

    #[test]
    fn attach_twice_is_state_error() {
        let (mut tx, mut pipeline) = attached();
        assert_eq!(
            tx.attach(&FakeTopology::with_sink(true), &mut pipeline),
            Err(RetryOr::Fatal(FatalError::InvalidState(
                DeviceState::Attached
            )))
        );
        assert_eq!(pipeline.live_encoders(), 1);
    }

    #[test]
    fn mode_set_stores_derived_timing() {
        let (mut tx, _) = attached();
        tx.mode_set(MODE_1080P).unwrap();
        assert_eq!(tx.timing(), Some(&TIMING_1080P));
        assert_eq!(tx.state(), DeviceState::Attached);
    }

    #[test]
    fn bad_mode_keeps_previous_timing() {
        let (mut tx, _) = attached();
        tx.mode_set(MODE_1080P).unwrap();
        let bad = GenericMode {
            v_sync_start: 700,
            ..MODE_720P
        };
        assert_eq!(
            tx.mode_set(bad),
            Err(LifecycleError::Timing(TimingError::Negative {
                field: TimingField::FrontPorchV
            }))
        );
        assert_eq!(tx.timing(), Some(&TIMING_1080P));
    }

    #[test]
    fn mode_set_while_unbound_is_state_error() {
        let mut tx = device();
        assert_eq!(
            tx.mode_set(MODE_1080P),
            Err(LifecycleError::InvalidState {
                op: Operation::ModeSet,
                state: DeviceState::Unbound,
            })
        );
        assert!(tx.timing.is_none());
    }

    #[test]
    fn mode_set_while_enabled_is_state_error() {
        let (mut tx, _) = enabled();
        assert!(matches!(
            tx.mode_set(MODE_720P),
            Err(LifecycleError::InvalidState {
                op: Operation::ModeSet,
                state: DeviceState::Enabled,
            })
        ));
        assert_eq!(tx.timing(), Some(&TIMING_1080P));
    }

    #[test]
    fn enable_without_mode_fails() {
        let (mut tx, _) = attached();
        assert_eq!(tx.enable(), Err(LifecycleError::NoModeSet));
        assert_eq!(tx.state(), DeviceState::Attached);
        assert!(tx.registers().writes.is_empty());
    }

    #[test]
    fn enable_programs_parameters_timing_then_enable_bit() {
        let (tx, _) = enabled();
        assert_eq!(tx.state(), DeviceState::Enabled);
        assert_eq!(
            tx.registers().writes,
            [
                RegWrite::Parameters {
                    width: 1920,
                    height: 1080
                },
                RegWrite::Timing(TIMING_1080P),
                RegWrite::Enable(true),
            ]
        );
    }

    #[test]
    fn enable_and_disable_are_idempotent() {
        let (mut tx, _) = enabled();
        tx.enable().unwrap();
        assert_eq!(tx.state(), DeviceState::Enabled);
        assert_eq!(tx.registers().writes.len(), 3);

        tx.disable().unwrap();
        tx.disable().unwrap();
        assert_eq!(tx.state(), DeviceState::Disabled);
        assert_eq!(
            tx.registers().writes.last(),
            Some(&RegWrite::Enable(false))
        );
        assert_eq!(tx.registers().writes.len(), 4);
    }

    #[test]
    fn re_enable_applies_new_mode_and_parameters() {
        let (mut tx, _) = enabled();
        tx.disable().unwrap();
        tx.mode_set(MODE_720P).unwrap();
        tx.set_parameter(WIDTH_OUT, 1280).unwrap();
        tx.set_parameter(HEIGHT_OUT, 720).unwrap();
        tx.enable().unwrap();

        let timing_720p = hdmitx_timing::derive(MODE_720P).unwrap();
        assert_eq!(
            tx.registers().writes[4..],
            [
                RegWrite::Parameters {
                    width: 1280,
                    height: 720
                },
                RegWrite::Timing(timing_720p),
                RegWrite::Enable(true),
            ]
        );
    }

    #[test]
    fn disable_before_enable_is_state_error() {
        let (mut tx, _) = attached();
        assert_eq!(
            tx.disable(),
            Err(LifecycleError::InvalidState {
                op: Operation::Disable,
                state: DeviceState::Attached,
            })
        );
    }

    #[test]
    fn detach_from_enabled_disables_first() {
        let (mut tx, mut pipeline) = enabled();
        let encoder = tx.encoder().unwrap();
        tx.detach(&mut pipeline);

        assert_eq!(tx.state(), DeviceState::Detached);
        assert_eq!(
            tx.registers().writes.last(),
            Some(&RegWrite::Enable(false))
        );
        assert_eq!(pipeline.unregistered, [encoder]);
        assert!(pipeline.links.is_empty());
        assert!(tx.sink().is_none());
        assert!(tx.timing().is_none());
    }

    #[test]
    fn detach_from_attached_leaves_hardware_alone() {
        let (mut tx, mut pipeline) = attached();
        tx.mode_set(MODE_1080P).unwrap();
        tx.detach(&mut pipeline);
        assert_eq!(tx.state(), DeviceState::Detached);
        assert!(tx.registers().writes.is_empty());
        assert_eq!(pipeline.live_encoders(), 0);
    }

    #[test]
    fn detach_from_unbound_touches_nothing() {
        let mut tx = device();
        let mut pipeline = FakePipeline::with_bridge();
        tx.detach(&mut pipeline);
        assert_eq!(tx.state(), DeviceState::Detached);
        assert!(pipeline.unregistered.is_empty());
    }

    #[test]
    fn detached_is_terminal() {
        let (mut tx, mut pipeline) = attached();
        tx.detach(&mut pipeline);
        tx.detach(&mut pipeline);
        assert_eq!(pipeline.unregistered.len(), 1);

        assert_eq!(
            tx.attach(&FakeTopology::with_sink(true), &mut pipeline),
            Err(RetryOr::Fatal(FatalError::InvalidState(
                DeviceState::Detached
            )))
        );
        assert!(tx.enable().is_err());
        assert!(tx.mode_set(MODE_1080P).is_err());
        assert!(tx.parameter(WIDTH_OUT).is_err());
        assert!(tx.set_parameter(WIDTH_OUT, 640).is_err());
    }

    #[test]
    fn parameters_checked_and_unchanged_on_error() {
        let mut tx = device();
        tx.set_parameter(WIDTH_OUT, 1280).unwrap();
        assert_eq!(tx.parameter(WIDTH_OUT), Ok(1280));
        assert!(matches!(
            tx.set_parameter(WIDTH_OUT, 10_000),
            Err(LifecycleError::Param(ParamError::OutOfRange { .. }))
        ));
        assert_eq!(tx.parameter(WIDTH_OUT), Ok(1280));
        assert_eq!(
            tx.parameter("brightness"),
            Err(LifecycleError::Param(ParamError::Unknown))
        );
    }
}
