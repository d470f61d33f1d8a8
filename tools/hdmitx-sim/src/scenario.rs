//! Scenario file model.
//!
//! A scenario describes the driver instance, the devices reachable through
//! the graph, and a script of authority callbacks with the outcome each one
//! is expected to produce.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use hdmitx::{Errno, GenericMode, HdmiTxConfig, MediaBusFormat};
use serde::Deserialize;

/// Built-in mode presets, usable as `mode = "1080p"` in a scenario.
pub const PRESETS: &[(&str, GenericMode)] = &[
    (
        "480p",
        GenericMode {
            h_display: 640,
            h_sync_start: 656,
            h_sync_end: 752,
            h_total: 800,
            v_display: 480,
            v_sync_start: 490,
            v_sync_end: 492,
            v_total: 525,
        },
    ),
    (
        "720p",
        GenericMode {
            h_display: 1280,
            h_sync_start: 1390,
            h_sync_end: 1430,
            h_total: 1650,
            v_display: 720,
            v_sync_start: 725,
            v_sync_end: 730,
            v_total: 750,
        },
    ),
    (
        "1080p",
        GenericMode {
            h_display: 1920,
            h_sync_start: 2008,
            h_sync_end: 2052,
            h_total: 2200,
            v_display: 1080,
            v_sync_start: 1084,
            v_sync_end: 1089,
            v_total: 1125,
        },
    ),
    (
        "2160p30",
        GenericMode {
            h_display: 3840,
            h_sync_start: 4016,
            h_sync_end: 4104,
            h_total: 4400,
            v_display: 2160,
            v_sync_start: 2168,
            v_sync_end: 2178,
            v_total: 2250,
        },
    ),
];

/// A parsed scenario file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Free-form title shown in the report.
    #[serde(default)]
    pub name: Option<String>,
    /// Driver instance configuration.
    #[serde(default)]
    pub driver: HdmiTxConfig,
    /// Devices reachable from the transmitter.
    #[serde(default)]
    pub topology: TopologySpec,
    /// Callbacks to replay, in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Reads and parses a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parses scenario text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// `[topology]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologySpec {
    /// `[[topology.nodes]]` entries.
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

/// One sink device and the graph link leading to it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NodeSpec {
    /// Device path of the sink.
    pub path: String,
    /// Node the link starts from. Defaults to the driver's own node.
    #[serde(default)]
    pub source: Option<String>,
    /// Port on the source node.
    #[serde(default = "default_port")]
    pub port: u32,
    /// Endpoint within the port.
    #[serde(default)]
    pub endpoint: u32,
    /// Whether the graph link exists at all.
    #[serde(default = "enabled")]
    pub present: bool,
    /// Whether the sink's driver has probed at start.
    #[serde(default)]
    pub driver_attached: bool,
    /// Whether the sink exports a bridge once its driver is attached.
    #[serde(default = "enabled")]
    pub bridge: bool,
}

const fn default_port() -> u32 {
    hdmitx::config::DEFAULT_SINK_PORT
}

const fn enabled() -> bool {
    true
}

/// One `[[steps]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// The callback or environment change.
    #[serde(flatten)]
    pub action: Action,
    /// Expected status. Defaults to success.
    #[serde(default)]
    pub expect: Expect,
    /// Expected device state after the step.
    #[serde(default)]
    pub state: Option<String>,
}

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    /// Authority bind callback.
    Attach,
    /// The sink's driver probes; its bridge becomes available.
    LoadSink {
        /// Sink device path.
        path: String,
    },
    /// The sink's driver goes away; its bridge is withdrawn.
    UnloadSink {
        /// Sink device path.
        path: String,
    },
    /// Mode-set step of an atomic commit.
    ModeSet {
        /// Mode to program.
        mode: ModeSpec,
    },
    /// Encoder enable callback.
    Enable,
    /// Encoder disable callback.
    Disable,
    /// Property write.
    SetParam {
        /// Property name.
        name: String,
        /// Value to write.
        value: ParamValue,
    },
    /// Property read, optionally checking the value.
    GetParam {
        /// Property name.
        name: String,
        /// Expected value.
        #[serde(default)]
        value: Option<ParamValue>,
    },
    /// Lists every property with its domain.
    ListParams,
    /// Authority unbind callback.
    Detach,
}

impl Action {
    /// Step keyword as written in the scenario.
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Attach => "attach",
            Self::LoadSink { .. } => "load-sink",
            Self::UnloadSink { .. } => "unload-sink",
            Self::ModeSet { .. } => "mode-set",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::SetParam { .. } => "set-param",
            Self::GetParam { .. } => "get-param",
            Self::ListParams => "list-params",
            Self::Detach => "detach",
        }
    }
}

/// A mode given either by preset name or by its eight edges.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ModeSpec {
    /// Name from [`PRESETS`].
    Preset(String),
    /// Explicit timing.
    Explicit(GenericMode),
}

impl ModeSpec {
    /// Resolves presets to their timing.
    pub fn resolve(&self) -> Result<GenericMode> {
        match self {
            Self::Explicit(mode) => Ok(*mode),
            Self::Preset(name) => PRESETS
                .iter()
                .find(|(preset, _)| *preset == name.as_str())
                .map(|(_, mode)| *mode)
                .with_context(|| format!("Unknown mode preset '{name}'")),
        }
    }
}

/// A property value, numeric or a media-bus format name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Raw value.
    Number(u64),
    /// Format name such as `"UYVY8_1X16"`.
    Format(String),
}

impl ParamValue {
    /// The raw value to hand to the driver.
    pub fn resolve(&self) -> Result<u64> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Format(name) => MediaBusFormat::from_name(name)
                .map(|fmt| u64::from(fmt.code()))
                .with_context(|| format!("Unknown media bus format '{name}'")),
        }
    }
}

/// Expected status of a step: `"ok"` or an errno name such as `"EPROBE_DEFER"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Expect {
    /// The callback succeeds.
    #[default]
    Ok,
    /// The callback fails with this code.
    Errno(Errno),
}

impl Expect {
    /// Whether `outcome` satisfies the expectation.
    pub fn matches(self, outcome: Result<(), Errno>) -> bool {
        match (self, outcome) {
            (Self::Ok, Ok(())) => true,
            (Self::Errno(want), Err(got)) => want == got,
            _ => false,
        }
    }
}

impl TryFrom<String> for Expect {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("ok") {
            return Ok(Self::Ok);
        }
        Errno::from_name(&value)
            .map(Self::Errno)
            .ok_or_else(|| format!("unknown status '{value}'"))
    }
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Errno(errno) => f.write_str(errno.name()),
        }
    }
}
