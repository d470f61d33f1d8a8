//! Device-native video timing and the translation from [`GenericMode`].

use core::fmt;

use crate::mode::GenericMode;

/// A derived timing field, used to report which edge of a mode is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingField {
    /// `h_sync_start - h_display`.
    FrontPorchH,
    /// `h_total - h_sync_end`.
    BackPorchH,
    /// `h_sync_end - h_sync_start`.
    SyncLenH,
    /// `v_sync_start - v_display`.
    FrontPorchV,
    /// `v_total - v_sync_end`.
    BackPorchV,
    /// `v_sync_end - v_sync_start`.
    SyncLenV,
}

impl TimingField {
    /// Returns the field name as it appears on [`DeviceTiming`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FrontPorchH => "front_porch_h",
            Self::BackPorchH => "back_porch_h",
            Self::SyncLenH => "sync_len_h",
            Self::FrontPorchV => "front_porch_v",
            Self::BackPorchV => "back_porch_v",
            Self::SyncLenV => "sync_len_v",
        }
    }
}

impl fmt::Display for TimingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors produced while translating a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimingError {
    /// A porch or sync length would be negative: the mode's edges are out of
    /// order on some axis.
    #[error("derived {field} would be negative")]
    Negative {
        /// The first offending field, horizontal axis checked first.
        field: TimingField,
    },
}

/// Video timing in the form the transmitter core is programmed with.
///
/// For a timing produced by [`derive`], `front + sync + back` on each axis
/// equals `total - active` of the source mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DeviceTiming {
    /// Active pixels per line.
    pub active_w: u32,
    /// Active lines per frame.
    pub active_h: u32,
    /// Pixels between end of active video and start of hsync.
    pub front_porch_h: u32,
    /// Pixels between end of hsync and start of the next line.
    pub back_porch_h: u32,
    /// Width of the hsync pulse in pixels.
    pub sync_len_h: u32,
    /// Lines between end of active video and start of vsync.
    pub front_porch_v: u32,
    /// Lines between end of vsync and start of the next frame.
    pub back_porch_v: u32,
    /// Height of the vsync pulse in lines.
    pub sync_len_v: u32,
}

impl DeviceTiming {
    /// Total pixels per line, or `None` on overflow.
    #[must_use]
    pub fn h_total(&self) -> Option<u32> {
        self.active_w
            .checked_add(self.front_porch_h)?
            .checked_add(self.sync_len_h)?
            .checked_add(self.back_porch_h)
    }

    /// Total lines per frame, or `None` on overflow.
    #[must_use]
    pub fn v_total(&self) -> Option<u32> {
        self.active_h
            .checked_add(self.front_porch_v)?
            .checked_add(self.sync_len_v)?
            .checked_add(self.back_porch_v)
    }

    /// Rebuilds the edge-based description of this timing.
    ///
    /// Returns `None` if an edge position overflows `u32`.
    #[must_use]
    pub fn to_generic(&self) -> Option<GenericMode> {
        let h_sync_start = self.active_w.checked_add(self.front_porch_h)?;
        let h_sync_end = h_sync_start.checked_add(self.sync_len_h)?;
        let v_sync_start = self.active_h.checked_add(self.front_porch_v)?;
        let v_sync_end = v_sync_start.checked_add(self.sync_len_v)?;
        Some(GenericMode {
            h_display: self.active_w,
            h_sync_start,
            h_sync_end,
            h_total: h_sync_end.checked_add(self.back_porch_h)?,
            v_display: self.active_h,
            v_sync_start,
            v_sync_end,
            v_total: v_sync_end.checked_add(self.back_porch_v)?,
        })
    }
}

impl fmt::Display for DeviceTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} hfp={} hs={} hbp={} vfp={} vs={} vbp={}",
            self.active_w,
            self.active_h,
            self.front_porch_h,
            self.sync_len_h,
            self.back_porch_h,
            self.front_porch_v,
            self.sync_len_v,
            self.back_porch_v,
        )
    }
}

impl TryFrom<GenericMode> for DeviceTiming {
    type Error = TimingError;

    fn try_from(mode: GenericMode) -> Result<Self, Self::Error> {
        derive(mode)
    }
}

/// Subtracts `b` from `a`, reporting `field` if the result would be negative.
fn span(a: u32, b: u32, field: TimingField) -> Result<u32, TimingError> {
    a.checked_sub(b).ok_or(TimingError::Negative { field })
}

/// Translates a generic mode into device timing.
///
/// Pure integer arithmetic: no rounding, no clamping.
///
/// # Errors
///
/// Returns [`TimingError::Negative`] if any porch or sync length would be
/// negative, i.e. the mode's edges are not monotonic on some axis.
pub fn derive(mode: GenericMode) -> Result<DeviceTiming, TimingError> {
    Ok(DeviceTiming {
        active_w: mode.h_display,
        active_h: mode.v_display,
        front_porch_h: span(mode.h_sync_start, mode.h_display, TimingField::FrontPorchH)?,
        back_porch_h: span(mode.h_total, mode.h_sync_end, TimingField::BackPorchH)?,
        sync_len_h: span(mode.h_sync_end, mode.h_sync_start, TimingField::SyncLenH)?,
        front_porch_v: span(mode.v_sync_start, mode.v_display, TimingField::FrontPorchV)?,
        back_porch_v: span(mode.v_total, mode.v_sync_end, TimingField::BackPorchV)?,
        sync_len_v: span(mode.v_sync_end, mode.v_sync_start, TimingField::SyncLenV)?,
    })
}
