//! Bind lifecycle and pipeline integration for an FPGA HDMI Tx encoder.
//!
//! The transmitter is a sub-device of a larger display pipeline. It cannot
//! do anything useful until the downstream sink (an external HDMI/DVI bridge
//! chip) has been probed, and it is driven entirely by callbacks from the
//! pipeline authority. The crate is layered like this:
//!
//! - **Timing** -- [`hdmitx_timing`] turns the authority's [`GenericMode`] into
//!   the core's [`DeviceTiming`].
//! - **Dependencies** -- [`SinkResolver`] finds the sink through the
//!   [`Topology`] and tells "absent" apart from "not probed yet".
//! - **Lifecycle** -- [`HdmiTx`] owns the [`DeviceState`] machine, the stored
//!   timing and the [`ParameterSet`].
//! - **Boundary** -- [`PipelineAdapter`] turns authority callbacks into
//!   lifecycle calls and lifecycle errors into [`Errno`] codes.
//!
//! Register programming sits behind [`TimingRegisters`]; the encoding of the
//! transmitter's registers is not part of this crate.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod adapter;
pub mod config;
pub mod controller;
pub mod device_path;
pub mod error;
pub mod hw;
pub mod params;
pub mod pipeline;
pub mod state;
pub mod topology;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{ComponentId, CrtcState, EncoderRegistry, Errno, PipelineAdapter};
pub use config::{DRIVER_NAME, HdmiTxConfig};
pub use controller::HdmiTx;
pub use device_path::DevicePath;
pub use error::{FatalError, LifecycleError, ResolveError, RetryOr};
pub use hdmitx_timing::{DeviceTiming, GenericMode, TimingError};
pub use hw::{NullRegisters, TimingRegisters};
pub use params::{ConfigurableParameter, MediaBusFormat, ParamDomain, ParamError, ParameterSet};
pub use pipeline::{
    BridgeId, DisplayPipeline, EncoderDescriptor, EncoderId, EncoderType, PipelineError,
    PossibleCrtcs,
};
pub use state::{DeviceState, Operation};
pub use topology::{DeviceRef, GraphEndpoint, SinkHandle, SinkResolver, Topology};
