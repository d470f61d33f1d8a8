//! Device lifecycle states and the operations that move between them.

use core::fmt;

/// The lifecycle state of one transmitter instance.
///
/// State machine: `Unbound → Resolving → Attached → Enabled ↔ Disabled → Detached`
/// (also `Resolving → Unbound` on retry or failure, and any state `→ Detached`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Probed, not yet bound into the pipeline.
    Unbound,
    /// Looking up the downstream sink.
    Resolving,
    /// Registered as an encoder and linked to the sink's bridge.
    Attached,
    /// Scanning out with the stored timing.
    Enabled,
    /// Bound, output stopped after having been enabled.
    Disabled,
    /// Torn down. Terminal.
    Detached,
}

impl DeviceState {
    /// Returns `true` while the device is part of the pipeline, i.e. in the
    /// states where the stored timing may be read.
    #[must_use]
    pub const fn is_bound(self) -> bool {
        matches!(self, Self::Attached | Self::Enabled | Self::Disabled)
    }

    /// Returns the human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unbound => "unbound",
            Self::Resolving => "resolving",
            Self::Attached => "attached",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Detached => "detached",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An operation requested of the lifecycle controller, used in state errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Store a new mode.
    ModeSet,
    /// Start scan-out.
    Enable,
    /// Stop scan-out.
    Disable,
    /// Read or write a configurable parameter.
    Parameter,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ModeSet => "mode_set",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Parameter => "parameter access",
        })
    }
}
