//! Scenario replay.
//!
//! Drives one transmitter through the [`PipelineAdapter`] the same way the
//! authority would, recording each callback's status and comparing it with
//! the scenario's expectations.

use anyhow::{Context, Result};
use hdmitx::{
    ComponentId, CrtcState, DeviceState, EncoderId, Errno, HdmiTx, NullRegisters, ParamDomain,
    PipelineAdapter,
};

use crate::scenario::{Action, Expect, Scenario, Step};
use crate::sim::{SimPipeline, SimTopology};

/// Result of one replayed step.
#[derive(Debug)]
pub struct StepReport {
    /// Step keyword.
    pub action: &'static str,
    /// What the callback returned.
    pub outcome: Result<(), Errno>,
    /// What the scenario expected.
    pub expected: Expect,
    /// Device state after the step.
    pub state: DeviceState,
    /// Why the step did not meet its expectations.
    pub failure: Option<String>,
}

/// Results of a whole scenario.
#[derive(Debug, Default)]
pub struct Report {
    /// One entry per step, in order.
    pub steps: Vec<StepReport>,
}

impl Report {
    /// Whether every step met its expectations.
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.failure.is_none())
    }

    /// Number of failed steps.
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.failure.is_some()).count()
    }
}

/// Replays steps against a single transmitter instance.
pub struct Replayer {
    topology: SimTopology,
    pipeline: SimPipeline,
    adapter: PipelineAdapter<NullRegisters>,
    component: ComponentId,
    encoder: Option<EncoderId>,
}

impl Replayer {
    /// Probes the driver and builds the environment described by `scenario`.
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let topology = SimTopology::new(&scenario.topology, &scenario.driver.node);
        let mut pipeline = SimPipeline::default();
        for device in topology.bridge_providers() {
            pipeline.export_bridge(device);
        }

        let device = HdmiTx::new(scenario.driver.clone(), NullRegisters)
            .context("Invalid driver configuration")?;
        let mut adapter = PipelineAdapter::new();
        let component = adapter.add_device(device);

        Ok(Self {
            topology,
            pipeline,
            adapter,
            component,
            encoder: None,
        })
    }

    /// Runs every step, stopping only on malformed steps.
    pub fn run(&mut self, steps: &[Step]) -> Result<Report> {
        let mut report = Report::default();
        for (index, step) in steps.iter().enumerate() {
            let entry = self
                .step(step)
                .with_context(|| format!("Step {} ({})", index + 1, step.action.keyword()))?;
            if let Some(failure) = &entry.failure {
                log::error!("step {}: {}", index + 1, failure);
            }
            report.steps.push(entry);
        }
        Ok(report)
    }

    /// Current state of the transmitter.
    pub fn state(&self) -> DeviceState {
        self.device().map_or(DeviceState::Detached, HdmiTx::state)
    }

    /// The simulated authority.
    #[cfg(test)]
    pub const fn pipeline(&self) -> &SimPipeline {
        &self.pipeline
    }

    fn device(&self) -> Option<&HdmiTx<NullRegisters>> {
        self.adapter.registry().get(self.component)
    }

    fn step(&mut self, step: &Step) -> Result<StepReport> {
        let (outcome, mut failure) = self.execute(&step.action)?;
        let state = self.state();

        if !step.expect.matches(outcome) {
            failure = Some(format!(
                "expected {}, got {}",
                step.expect,
                outcome.map_or_else(|e| e.name().to_string(), |()| "ok".to_string())
            ));
        } else if let Some(want) = step.state.as_deref().filter(|want| *want != state.name()) {
            failure = Some(format!("expected state {want}, got {state}"));
        }

        Ok(StepReport {
            action: step.action.keyword(),
            outcome,
            expected: step.expect,
            state,
            failure,
        })
    }

    /// Performs one action. The outer error is a malformed step; the inner
    /// result is the driver's status.
    fn execute(&mut self, action: &Action) -> Result<(Result<(), Errno>, Option<String>)> {
        let outcome = match action {
            Action::Attach => {
                let result =
                    self.adapter
                        .bind(self.component, &self.topology, &mut self.pipeline);
                if result.is_ok() {
                    self.encoder = self.device().and_then(HdmiTx::encoder);
                }
                result
            }
            Action::LoadSink { path } => {
                let (device, bridge) = self.topology.set_attached(path, true)?;
                if bridge {
                    self.pipeline.export_bridge(&device);
                }
                log::info!("sim: sink driver loaded at {}", device);
                Ok(())
            }
            Action::UnloadSink { path } => {
                let (device, _) = self.topology.set_attached(path, false)?;
                self.pipeline.withdraw_bridge(&device);
                log::info!("sim: sink driver unloaded at {}", device);
                Ok(())
            }
            Action::ModeSet { mode } => {
                let crtc = CrtcState {
                    adjusted_mode: mode.resolve()?,
                    active: true,
                };
                self.encoder()
                    .and_then(|encoder| self.adapter.atomic_mode_set(encoder, &crtc))
            }
            Action::Enable => self
                .encoder()
                .and_then(|encoder| self.adapter.enable(encoder)),
            Action::Disable => self
                .encoder()
                .and_then(|encoder| self.adapter.disable(encoder)),
            Action::SetParam { name, value } => {
                let value = value.resolve()?;
                self.encoder()
                    .and_then(|encoder| self.adapter.set_property(encoder, name, value))
            }
            Action::GetParam { name, value } => {
                let want = value.as_ref().map(|v| v.resolve()).transpose()?;
                let got = self
                    .encoder()
                    .and_then(|encoder| self.adapter.get_property(encoder, name));
                match (got, want) {
                    (Ok(got), Some(want)) if got != want => {
                        return Ok((Ok(()), Some(format!("{name} is {got}, expected {want}"))));
                    }
                    (Ok(got), _) => {
                        log::info!("{} = {}", name, got);
                        Ok(())
                    }
                    (Err(e), _) => Err(e),
                }
            }
            Action::ListParams => self.encoder().and_then(|encoder| {
                for param in self.adapter.properties(encoder)?.iter() {
                    log::info!(
                        "{} = {} ({})",
                        param.name(),
                        param.value(),
                        describe(param.domain())
                    );
                }
                Ok(())
            }),
            Action::Detach => self.adapter.unbind(self.component, &mut self.pipeline),
        };
        Ok((outcome, None))
    }

    /// The encoder id the authority last assigned, or `ENOENT` if the device
    /// never attached.
    fn encoder(&self) -> Result<EncoderId, Errno> {
        self.encoder.ok_or(Errno::NoEnt)
    }
}

fn describe(domain: ParamDomain) -> String {
    match domain {
        ParamDomain::Range { min, max } => format!("{min}..={max}"),
        ParamDomain::Enum(values) => values
            .iter()
            .map(|v| v.name)
            .collect::<Vec<_>>()
            .join("|"),
    }
}
