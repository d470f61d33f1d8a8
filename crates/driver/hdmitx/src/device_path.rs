//! Structured device-tree node paths.
//!
//! Topology lookups and log messages name devices by their position in the
//! hardware description (e.g. `/amba_pl/hdmi@a0000000`) rather than by
//! ad-hoc strings.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

/// A hierarchical node path such as `/amba_pl/i2c@a0010000/adv7511@39`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DevicePath {
    segments: Vec<String>,
}

impl DevicePath {
    /// Parses a `/`-separated path. Empty segments are ignored, so `"/a//b/"`
    /// and `"a/b"` name the same node.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|seg| !seg.is_empty())
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Returns the leaf (last) segment, or `""` for the root.
    #[must_use]
    pub fn leaf(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for seg in &self.segments {
            f.write_str("/")?;
            f.write_str(seg)?;
        }
        Ok(())
    }
}
