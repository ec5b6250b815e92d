//! # Key Vocabulary
//!
//! Every property the unit reports or accepts is identified by a short wire
//! key. Keys prefixed with `*` carry a single scalar; the others carry a
//! `value+min+max[+extra]` vector. Three of the scalar keys are reserved for
//! framing multi-line error reports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::SCALAR_PREFIX;
use crate::error::CodecError;

macro_rules! data_keys {
    ($( $(#[$meta:meta])* $variant:ident => $wire:literal, )+) => {
        /// Property identifier from the unit's fixed vocabulary
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum DataKey {
            $( $(#[$meta])* $variant, )+
        }

        impl DataKey {
            const ALL: &'static [DataKey] = &[ $( DataKey::$variant, )+ ];

            /// Wire representation of the key
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( DataKey::$variant => $wire, )+
                }
            }

            /// Look up a key by its wire representation
            pub fn from_wire(wire: &str) -> Option<Self> {
                match wire {
                    $( $wire => Some(DataKey::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

data_keys! {
    // Scalars
    /// Air temperature measured at the heater
    AirTemperatureAtHeater => "*TK",
    /// Supply air temperature
    AirTemperatureSupply => "*TC",
    /// Control system firmware version
    ControlSystemVersion => "*SC",
    /// Closes an error report frame
    ErrorFrameEnd => "*EZ",
    /// One line of an error report
    ErrorMessage => "*EB",
    /// Opens an error report frame
    ErrorFrameStart => "*EA",
    /// Exhaust fan speed
    FanSpeedExhaust => "*DB",
    /// Supply fan speed
    FanSpeedSupply => "*DA",
    /// Months until the filter should be replaced
    FilterMonthsLeft => "*FL",
    /// Heat exchanger rotor speed in percent
    HeatExchangerRotorPercent => "*XA",
    /// Heat exchanger rotor speed in RPM
    HeatExchangerRotorRpm => "*XB",
    /// Heater power in percent
    HeaterPowerPercent => "*MJ",
    /// Minutes left of boost mode
    MinutesLeftBoostMode => "*FI",
    /// Minutes left of fireplace mode
    MinutesLeftFireplaceMode => "*ME",
    /// Unit model name
    ModelName => "*SB",
    /// Unit product number
    ProductNumber => "*SA",

    // Installer contact details
    /// Installer e-mail address
    InstallerEmail => "IB",
    /// Installer name
    InstallerName => "IA",
    /// Installer menu password
    InstallerPassword => "IP",
    /// Installer phone number
    InstallerPhone => "IC",
    /// Installer website
    InstallerWebsite => "IE",

    // Vectors x+ x+ x+x
    /// Boost mode duration setting
    BoostModeMinutes => "FH",
    /// Control system state
    ControlSystemState => "MP",
    /// Cooling mode
    CoolingMode => "MK",
    /// Fireplace mode on/off
    FireplaceMode => "MB",
    /// Fireplace mode duration setting
    FireplaceModeMinutes => "MC",
    /// Fan mode (speed step)
    ModeFan => "MF",
    /// Heater mode
    ModeHeater => "MH",
    /// Heater power rating
    ModeHeaterPowerRating => "MG",
    /// Temperature mode
    ModeTemperature => "MT",
    /// Target temperature in cooling mode
    TargetTemperatureCool => "TF",
    /// Target temperature in economy mode
    TargetTemperatureEconomy => "TE",
    /// Target temperature in normal mode
    TargetTemperatureNormal => "TD",
}

impl DataKey {
    /// Every key in the vocabulary
    pub fn all() -> &'static [DataKey] {
        Self::ALL
    }

    /// Scalar keys carry a single value instead of a `+` vector
    pub fn is_scalar(&self) -> bool {
        self.as_str().starts_with(SCALAR_PREFIX)
    }

    /// One of the three keys used to frame error reports
    pub fn is_error_frame(&self) -> bool {
        matches!(
            self,
            DataKey::ErrorFrameStart | DataKey::ErrorMessage | DataKey::ErrorFrameEnd
        )
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKey {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Self::from_wire(key).ok_or_else(|| CodecError::UnrecognizedKey {
            key: key.to_string(),
        })
    }
}

impl Serialize for DataKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = String::deserialize(deserializer)?;
        wire.parse().map_err(serde::de::Error::custom)
    }
}
