//! User-tunable bridge parameters.
//!
//! The transmitter exposes four parameters to the authority's property
//! system: output width and height overrides, and the input and output
//! media-bus formats. Each carries its domain so a generic configuration UI
//! can list and edit them without knowing about this driver.

use core::fmt;

use crate::config::HdmiTxConfig;

/// Name of the output width parameter.
pub const WIDTH_OUT: &str = "width_out";
/// Name of the output height parameter.
pub const HEIGHT_OUT: &str = "height_out";
/// Name of the input media-bus format parameter.
pub const IN_FMT: &str = "in_fmt";
/// Name of the output media-bus format parameter.
pub const OUT_FMT: &str = "out_fmt";

/// Largest width or height the output override accepts.
pub const MAX_DIMENSION: u64 = 4096;

/// Media-bus pixel formats the transmitter can accept or emit.
///
/// Discriminants are the kernel's `MEDIA_BUS_FMT_*` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u32)]
pub enum MediaBusFormat {
    /// 8-bit RGB, one 24-bit sample per pixel.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "RGB888_1X24"))]
    Rgb888_1x24 = 0x100a,
    /// 8-bit RBG ordering, one 24-bit sample per pixel.
    #[cfg_attr(feature = "serde", serde(rename = "RBG888_1X24"))]
    Rbg888_1x24 = 0x100e,
    /// 10-bit RGB, one 30-bit sample per pixel.
    #[cfg_attr(feature = "serde", serde(rename = "RGB101010_1X30"))]
    Rgb101010_1x30 = 0x1018,
    /// 8-bit YUV 4:2:2, one 16-bit sample per pixel.
    #[cfg_attr(feature = "serde", serde(rename = "UYVY8_1X16"))]
    Uyvy8_1x16 = 0x200f,
    /// 10-bit YUV 4:2:2, one 20-bit sample per pixel.
    #[cfg_attr(feature = "serde", serde(rename = "UYVY10_1X20"))]
    Uyvy10_1x20 = 0x201a,
    /// 8-bit YUV 4:4:4, one 24-bit sample per pixel.
    #[cfg_attr(feature = "serde", serde(rename = "VUY8_1X24"))]
    Vuy8_1x24 = 0x2024,
}

impl MediaBusFormat {
    /// Every supported format, in enumeration order.
    pub const ALL: [Self; 6] = [
        Self::Rgb888_1x24,
        Self::Rbg888_1x24,
        Self::Rgb101010_1x30,
        Self::Uyvy8_1x16,
        Self::Uyvy10_1x20,
        Self::Vuy8_1x24,
    ];

    /// The `MEDIA_BUS_FMT_*` code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// The format's name without the `MEDIA_BUS_FMT_` prefix.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rgb888_1x24 => "RGB888_1X24",
            Self::Rbg888_1x24 => "RBG888_1X24",
            Self::Rgb101010_1x30 => "RGB101010_1X30",
            Self::Uyvy8_1x16 => "UYVY8_1X16",
            Self::Uyvy10_1x20 => "UYVY10_1X20",
            Self::Vuy8_1x24 => "VUY8_1X24",
        }
    }

    /// Looks a format up by its code.
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|fmt| u64::from(fmt.code()) == code)
    }

    /// Looks a format up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|fmt| fmt.name() == name)
    }
}

impl fmt::Display for MediaBusFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One named value of an enumerated parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue {
    /// Raw value stored in the parameter.
    pub value: u64,
    /// Display name.
    pub name: &'static str,
}

const fn bus_format_value(fmt: MediaBusFormat) -> EnumValue {
    EnumValue {
        value: fmt.code() as u64,
        name: fmt.name(),
    }
}

static BUS_FORMAT_VALUES: [EnumValue; 6] = [
    bus_format_value(MediaBusFormat::Rgb888_1x24),
    bus_format_value(MediaBusFormat::Rbg888_1x24),
    bus_format_value(MediaBusFormat::Rgb101010_1x30),
    bus_format_value(MediaBusFormat::Uyvy8_1x16),
    bus_format_value(MediaBusFormat::Uyvy10_1x20),
    bus_format_value(MediaBusFormat::Vuy8_1x24),
];

/// The values a parameter may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDomain {
    /// Any integer in `min..=max`.
    Range {
        /// Smallest accepted value.
        min: u64,
        /// Largest accepted value.
        max: u64,
    },
    /// One of a fixed list of values.
    Enum(&'static [EnumValue]),
}

/// Rejected parameter accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// No parameter has this name.
    #[error("unknown parameter")]
    Unknown,
    /// Value outside a range parameter's bounds.
    #[error("{name}: {value} outside {min}..={max}")]
    OutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: u64,
        /// Lower bound.
        min: u64,
        /// Upper bound.
        max: u64,
    },
    /// Value not among an enum parameter's choices.
    #[error("{name}: {value:#x} is not a valid choice")]
    NotInEnum {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: u64,
    },
}

/// A named parameter with its current value and domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurableParameter {
    name: &'static str,
    value: u64,
    domain: ParamDomain,
}

impl ConfigurableParameter {
    /// Parameter name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Current value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Accepted values.
    #[must_use]
    pub const fn domain(&self) -> ParamDomain {
        self.domain
    }

    /// Checks `value` against the domain without storing it.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::OutOfRange`] or [`ParamError::NotInEnum`].
    pub fn check(&self, value: u64) -> Result<(), ParamError> {
        match self.domain {
            ParamDomain::Range { min, max } if !(min..=max).contains(&value) => {
                Err(ParamError::OutOfRange {
                    name: self.name,
                    value,
                    min,
                    max,
                })
            }
            ParamDomain::Enum(choices) if !choices.iter().any(|c| c.value == value) => {
                Err(ParamError::NotInEnum {
                    name: self.name,
                    value,
                })
            }
            _ => Ok(()),
        }
    }

    fn set(&mut self, value: u64) -> Result<(), ParamError> {
        self.check(value)?;
        self.value = value;
        Ok(())
    }
}

/// The transmitter's full parameter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSet {
    params: [ConfigurableParameter; 4],
}

impl ParameterSet {
    /// Builds the parameter set with initial values from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if a configured value is outside its domain.
    pub fn from_config(config: &HdmiTxConfig) -> Result<Self, ParamError> {
        let dimension = ParamDomain::Range {
            min: 0,
            max: MAX_DIMENSION,
        };
        let format = ParamDomain::Enum(&BUS_FORMAT_VALUES);
        let mut set = Self {
            params: [
                ConfigurableParameter {
                    name: WIDTH_OUT,
                    value: 0,
                    domain: dimension,
                },
                ConfigurableParameter {
                    name: HEIGHT_OUT,
                    value: 0,
                    domain: dimension,
                },
                ConfigurableParameter {
                    name: IN_FMT,
                    value: u64::from(MediaBusFormat::default().code()),
                    domain: format,
                },
                ConfigurableParameter {
                    name: OUT_FMT,
                    value: u64::from(MediaBusFormat::default().code()),
                    domain: format,
                },
            ],
        };
        set.set(WIDTH_OUT, u64::from(config.width_out))?;
        set.set(HEIGHT_OUT, u64::from(config.height_out))?;
        set.set(IN_FMT, u64::from(config.in_fmt.code()))?;
        set.set(OUT_FMT, u64::from(config.out_fmt.code()))?;
        Ok(set)
    }

    /// Iterates over all parameters in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigurableParameter> {
        self.params.iter()
    }

    /// Looks a parameter up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConfigurableParameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Returns the current value of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Unknown`] for an unknown name.
    pub fn value(&self, name: &str) -> Result<u64, ParamError> {
        self.get(name).map(ConfigurableParameter::value).ok_or(ParamError::Unknown)
    }

    /// Validates and stores a new value. Rejected writes change nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] for an unknown name or an out-of-domain value.
    pub fn set(&mut self, name: &str, value: u64) -> Result<(), ParamError> {
        self.params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or(ParamError::Unknown)?
            .set(value)
    }

    /// Output width override.
    #[must_use]
    pub fn width_out(&self) -> u64 {
        self.params[0].value
    }

    /// Output height override.
    #[must_use]
    pub fn height_out(&self) -> u64 {
        self.params[1].value
    }

    /// Input media-bus format.
    #[must_use]
    pub fn in_fmt(&self) -> MediaBusFormat {
        MediaBusFormat::from_code(self.params[2].value).unwrap_or_default()
    }

    /// Output media-bus format.
    #[must_use]
    pub fn out_fmt(&self) -> MediaBusFormat {
        MediaBusFormat::from_code(self.params[3].value).unwrap_or_default()
    }
}
