//! Register layer seam.
//!
//! The lifecycle controller decides *when* the core is programmed; an
//! implementation of [`TimingRegisters`] decides *how*. All writes are treated
//! as infallible here. A backend that can fail must surface that itself.

use hdmitx_timing::DeviceTiming;

use crate::params::ParameterSet;

/// Writes to the transmitter core.
pub trait TimingRegisters {
    /// Programs the video timing registers.
    fn apply_timing(&mut self, timing: &DeviceTiming);

    /// Programs the core configuration from the user parameters.
    fn apply_parameters(&mut self, params: &ParameterSet);

    /// Sets or clears the core enable bit.
    fn set_enable_bit(&mut self, enable: bool);
}

/// Backend for cores whose register map is not described: traces every
/// write and touches no hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRegisters;

impl TimingRegisters for NullRegisters {
    fn apply_timing(&mut self, timing: &DeviceTiming) {
        log::debug!("{}: timing write {}", crate::DRIVER_NAME, timing);
    }

    fn apply_parameters(&mut self, params: &ParameterSet) {
        log::debug!(
            "{}: config write out={}x{} in_fmt={} out_fmt={}",
            crate::DRIVER_NAME,
            params.width_out(),
            params.height_out(),
            params.in_fmt(),
            params.out_fmt(),
        );
    }

    fn set_enable_bit(&mut self, enable: bool) {
        log::debug!("{}: enable bit <- {}", crate::DRIVER_NAME, enable);
    }
}
