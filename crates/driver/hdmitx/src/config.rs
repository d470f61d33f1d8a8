//! Per-instance driver configuration.
//!
//! Everything here would normally come from the hardware description; the
//! parsing of that description is left to the host, which fills in an
//! [`HdmiTxConfig`] (directly, or from a file with the `serde` feature).

use alloc::string::String;

use crate::device_path::DevicePath;
use crate::params::MediaBusFormat;
use crate::pipeline::{EncoderDescriptor, EncoderType, PossibleCrtcs};
use crate::topology::GraphEndpoint;

/// Driver name, used as the log prefix and the default encoder name.
pub const DRIVER_NAME: &str = "xlnx-hdmi";

/// Output port the sink hangs off.
pub const DEFAULT_SINK_PORT: u32 = 1;

/// Configuration of one transmitter instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct HdmiTxConfig {
    /// Encoder name advertised to the authority.
    pub name: String,
    /// Device-tree node of this transmitter.
    pub node: String,
    /// Port on `node` whose remote end is the sink.
    pub sink_port: u32,
    /// Endpoint within `sink_port`.
    pub sink_endpoint: u32,
    /// Output signalling.
    pub encoder_type: EncoderType,
    /// Bitmask of CRTCs that may drive the encoder.
    pub crtc_mask: u32,
    /// Initial output width override.
    pub width_out: u32,
    /// Initial output height override.
    pub height_out: u32,
    /// Initial input media-bus format.
    pub in_fmt: MediaBusFormat,
    /// Initial output media-bus format.
    pub out_fmt: MediaBusFormat,
}

impl Default for HdmiTxConfig {
    fn default() -> Self {
        Self {
            name: String::from(DRIVER_NAME),
            node: String::from("/amba_pl/hdmi@a0000000"),
            sink_port: DEFAULT_SINK_PORT,
            sink_endpoint: 0,
            encoder_type: EncoderType::Tmds,
            // Only a single CRTC feeds the transmitter in current designs.
            crtc_mask: PossibleCrtcs::CRTC0.bits(),
            width_out: 1920,
            height_out: 1080,
            in_fmt: MediaBusFormat::Rgb888_1x24,
            out_fmt: MediaBusFormat::Rgb888_1x24,
        }
    }
}

impl HdmiTxConfig {
    /// The graph endpoint to follow when looking for the sink.
    #[must_use]
    pub fn sink_endpoint(&self) -> GraphEndpoint {
        GraphEndpoint {
            node: DevicePath::parse(&self.node),
            port: self.sink_port,
            endpoint: self.sink_endpoint,
        }
    }

    /// CRTC mask with undefined bits dropped.
    #[must_use]
    pub const fn possible_crtcs(&self) -> PossibleCrtcs {
        PossibleCrtcs::from_bits_truncate(self.crtc_mask)
    }

    /// The descriptor registered with the authority on attach.
    #[must_use]
    pub fn encoder_descriptor(&self) -> EncoderDescriptor {
        EncoderDescriptor {
            name: self.name.clone(),
            encoder_type: self.encoder_type,
            possible_crtcs: self.possible_crtcs(),
        }
    }
}
