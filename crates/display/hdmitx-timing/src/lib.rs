//! `hdmitx-timing` --- display mode to HDMI Tx video timing translation.
//!
//! The display pipeline describes a mode by its active area plus the sync
//! edges and totals of each axis ([`GenericMode`]). The transmitter core wants
//! the same information as explicit porch and sync lengths ([`DeviceTiming`]).
//! [`derive`] converts between the two with exact integer arithmetic and
//! refuses malformed modes instead of clamping them.
//!
//! # Usage
//!
//! ```ignore
//! let mode = GenericMode {
//!     h_display: 1920, h_sync_start: 2008, h_sync_end: 2052, h_total: 2200,
//!     v_display: 1080, v_sync_start: 1084, v_sync_end: 1089, v_total: 1125,
//! };
//! let timing = hdmitx_timing::derive(mode)?;
//! assert_eq!(timing.front_porch_h, 88);
//! ```

#![cfg_attr(not(test), no_std)]

pub mod mode;
pub mod timing;

pub use mode::GenericMode;
pub use timing::{DeviceTiming, TimingError, TimingField, derive};
