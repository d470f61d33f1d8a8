//! Generic display mode description.

use core::fmt;

use crate::timing::{self, TimingError};

/// A display mode as the pipeline authority describes it.
///
/// Each axis is given as the active size followed by the positions of the
/// sync start, sync end and total, all measured from the start of the active
/// region in pixels (horizontal) or lines (vertical). A well-formed mode has
/// `display <= sync_start <= sync_end <= total` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct GenericMode {
    /// Active pixels per line.
    pub h_display: u32,
    /// Pixel at which horizontal sync begins.
    pub h_sync_start: u32,
    /// Pixel at which horizontal sync ends.
    pub h_sync_end: u32,
    /// Total pixels per line, blanking included.
    pub h_total: u32,
    /// Active lines per frame.
    pub v_display: u32,
    /// Line at which vertical sync begins.
    pub v_sync_start: u32,
    /// Line at which vertical sync ends.
    pub v_sync_end: u32,
    /// Total lines per frame, blanking included.
    pub v_total: u32,
}

impl GenericMode {
    /// Checks the edge ordering of both axes.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::Negative`] naming the first porch or sync
    /// length that the mode would make negative.
    pub fn validate(&self) -> Result<(), TimingError> {
        timing::derive(*self).map(|_| ())
    }

    /// Horizontal blanking width, or `None` if `h_total < h_display`.
    #[must_use]
    pub const fn h_blank(&self) -> Option<u32> {
        self.h_total.checked_sub(self.h_display)
    }

    /// Vertical blanking height, or `None` if `v_total < v_display`.
    #[must_use]
    pub const fn v_blank(&self) -> Option<u32> {
        self.v_total.checked_sub(self.v_display)
    }
}

impl fmt::Display for GenericMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} h[{} {} {}] v[{} {} {}]",
            self.h_display,
            self.v_display,
            self.h_sync_start,
            self.h_sync_end,
            self.h_total,
            self.v_sync_start,
            self.v_sync_end,
            self.v_total,
        )
    }
}
