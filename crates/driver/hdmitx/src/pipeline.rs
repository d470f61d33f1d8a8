//! Services the pipeline authority provides to the encoder.
//!
//! The authority owns encoder and bridge objects; the driver only ever holds
//! the opaque ids it hands out. [`DisplayPipeline`] is implemented by the
//! authority and passed into attach/detach, so the driver never depends on
//! the authority's internals.

use alloc::string::String;
use core::fmt;

use crate::params::ParameterSet;
use crate::topology::DeviceRef;

/// Authority-assigned encoder identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EncoderId(pub u32);

/// Authority-assigned bridge identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BridgeId(pub u32);

impl fmt::Display for EncoderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoder#{}", self.0)
    }
}

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bridge#{}", self.0)
    }
}

/// Physical signalling of the encoder output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EncoderType {
    /// HDMI / DVI.
    #[default]
    Tmds,
    /// Parallel RGB.
    Dpi,
    /// MIPI DSI.
    Dsi,
    /// LVDS panel link.
    Lvds,
}

bitflags::bitflags! {
    /// CRTCs that may feed this encoder.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PossibleCrtcs: u32 {
        /// First CRTC.
        const CRTC0 = 1 << 0;
        /// Second CRTC.
        const CRTC1 = 1 << 1;
        /// Third CRTC.
        const CRTC2 = 1 << 2;
        /// Fourth CRTC.
        const CRTC3 = 1 << 3;
    }
}

impl fmt::Display for PossibleCrtcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

/// What the encoder advertises when it registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderDescriptor {
    /// Name shown by the authority.
    pub name: String,
    /// Output signalling.
    pub encoder_type: EncoderType,
    /// CRTCs that can drive this encoder.
    pub possible_crtcs: PossibleCrtcs,
}

/// Failures reported by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The authority rejected the request as malformed.
    #[error("request rejected")]
    Rejected,
    /// The object is already in use (e.g. the bridge has an encoder).
    #[error("resource busy")]
    Busy,
    /// The authority ran out of objects or memory.
    #[error("out of resources")]
    NoResources,
}

/// Services consumed from the pipeline authority.
pub trait DisplayPipeline {
    /// Registers an encoder and returns the id later callbacks will use.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the authority refuses the encoder.
    fn register_encoder(&mut self, desc: &EncoderDescriptor) -> Result<EncoderId, PipelineError>;

    /// Removes an encoder, dropping any bridge attached to it.
    fn unregister_encoder(&mut self, encoder: EncoderId);

    /// Exposes the encoder's configurable parameters to the authority's
    /// property system.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the properties cannot be created.
    fn register_parameters(
        &mut self,
        encoder: EncoderId,
        params: &ParameterSet,
    ) -> Result<(), PipelineError>;

    /// Returns the bridge exported by the given device, if it registered one.
    fn find_bridge(&self, device: &DeviceRef) -> Option<BridgeId>;

    /// Links a bridge to the output of an encoder.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the bridge cannot be attached.
    fn attach_bridge(&mut self, encoder: EncoderId, bridge: BridgeId) -> Result<(), PipelineError>;
}
