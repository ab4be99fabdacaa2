//! Acquisition runtime settings
//!
//! # Design
//! Settings are selected once at power-up and stay fixed afterwards. Everything the host can
//! change at runtime travels through the configuration protocol instead, see
//! [crate::configuration].
//!
//! The defaults acquire from the on-chip ADC. Holding the user button during reset selects the
//! diagnostic counter source.
use serde::{Deserialize, Serialize};

use crate::design_parameters::ADC_RESOLUTION_BITS;

/// The kind of sample source feeding the frames.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub enum SourceKind {
    /// Analog conversions of the input channels.
    #[default]
    Adc,
    /// Frame timestamp and check values, for link diagnostics.
    Counter,
}

/// A conversion resolution supported by the ADC.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Eight,
    Ten,
    Twelve,
    Fourteen,
    Sixteen,
}

impl Resolution {
    /// The number of significant bits of a conversion code.
    pub const fn bits(&self) -> u32 {
        match self {
            Self::Eight => 8,
            Self::Ten => 10,
            Self::Twelve => 12,
            Self::Fourteen => 14,
            Self::Sixteen => 16,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        match ADC_RESOLUTION_BITS {
            8 => Self::Eight,
            10 => Self::Ten,
            14 => Self::Fourteen,
            16 => Self::Sixteen,
            _ => Self::Twelve,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// The sample source.
    pub source: SourceKind,

    /// The ADC conversion resolution.
    pub resolution: Resolution,

    /// Drive the synchronization output: high while not acquiring, low while acquiring.
    pub sync_output: bool,
}

impl Settings {
    /// Construct the boot settings.
    ///
    /// # Args
    /// * `diagnostic` - Select the diagnostic counter source.
    pub fn new(diagnostic: bool) -> Self {
        Self {
            source: if diagnostic {
                SourceKind::Counter
            } else {
                SourceKind::Adc
            },
            sync_output: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_selection() {
        assert_eq!(Settings::new(false).source, SourceKind::Adc);
        assert_eq!(Settings::new(true).source, SourceKind::Counter);
        assert!(Settings::new(false).sync_output);
        assert_eq!(Settings::default().resolution.bits(), ADC_RESOLUTION_BITS);
    }
}
