//! Per-key settings and device-wide tuning

use core::fmt;

use heapless::{String, Vec};

use crate::lut::GaussParams;

pub type Instant = u64;
pub type Duration = u64;

pub const ANALOG_RESOLUTION: u32 = 12;
pub const ADC_MAX: u16 = (1 << ANALOG_RESOLUTION) - 1;
/// Number of distinct readings of the ADC, also the size of the Gauss table
pub const ADC_RANGE: usize = 1 << ANALOG_RESOLUTION;
/// Full switch travel in 0.01mm
pub const TRAVEL_DISTANCE: u16 = 400;
/// Moving average window, 2^4 samples
pub const FILTER_SAMPLES: usize = 16;

pub const NAME_LEN: usize = 128;
pub const CONFIG_VERSION: u32 = 3;

/// Constants of the device, fixed at build time
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tuning {
    /// Full travel in the distance unit, also the "fully released" distance
    pub travel_distance: u16,
    /// Pulled off each reading before it moves the calibration boundaries
    pub boundary_deadzone: u16,
    /// Minimum raw span between rest and down position
    pub boundary_min_span: u16,
    /// Continuous rapid trigger leaves its zone once the distance is this
    /// close to full travel
    pub continuous_release_threshold: u16,
    /// Minimum time between two presses of a digital key, in ms
    pub debounce_delay: Duration,
    /// Minimum gap between lower and upper hysteresis, and between the upper
    /// hysteresis and full travel
    pub hysteresis_tolerance: u16,
    /// Minimum rapid trigger sensitivity
    pub rapid_trigger_tolerance: u16,
    /// Sensor mounted the other way around: readings rise when pressed
    pub invert_readings: bool,
    /// Correct the magnetic curve with a lookup table instead of mapping
    /// linearly
    pub gauss_correction: Option<GaussParams>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            travel_distance: TRAVEL_DISTANCE,
            boundary_deadzone: 20,
            boundary_min_span: (200 * TRAVEL_DISTANCE as u32 / 400) as u16,
            continuous_release_threshold: 10,
            debounce_delay: 50,
            hysteresis_tolerance: 10,
            rapid_trigger_tolerance: 10,
            invert_readings: false,
            gauss_correction: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Rapid trigger sensitivity outside `[tolerance, travel]`
    Sensitivity(u16),
    /// Lower and upper hysteresis closer than the tolerance
    HysteresisGap { lower: u16, upper: u16 },
    /// Upper hysteresis too close to (or past) full travel
    HysteresisRange(u16),
    /// Not a character that has a keyboard usage
    KeyChar(char),
    /// Name empty or longer than [`NAME_LEN`]
    NameLength(usize),
    /// Analog settings for a digital key or the other way around
    KeyKind,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Sensitivity(value) => {
                write!(f, "rapid trigger sensitivity {} out of range", value)
            }
            ConfigError::HysteresisGap { lower, upper } => {
                write!(f, "hysteresis {}..{} narrower than tolerance", lower, upper)
            }
            ConfigError::HysteresisRange(upper) => {
                write!(f, "upper hysteresis {} too close to full travel", upper)
            }
            ConfigError::KeyChar(c) => write!(f, "no key usage for {:?}", c),
            ConfigError::NameLength(len) => write!(f, "name length {} out of range", len),
            ConfigError::KeyKind => write!(f, "settings do not match the kind of key"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogKeyConfig {
    pub key_char: char,
    pub hid_enabled: bool,
    pub rapid_trigger: bool,
    pub continuous_rapid_trigger: bool,
    /// Distance the key has to rise from its peak to release
    pub rapid_trigger_up_sensitivity: u16,
    /// Distance the key has to fall from its peak to press
    pub rapid_trigger_down_sensitivity: u16,
    /// Press at or below this distance, also where the rapid trigger zone begins
    pub lower_hysteresis: u16,
    /// Release at or above this distance, also where the rapid trigger zone ends
    pub upper_hysteresis: u16,
}

impl AnalogKeyConfig {
    pub fn new(key_char: char, travel_distance: u16) -> Self {
        let travel = travel_distance as u32;
        Self {
            key_char,
            hid_enabled: true,
            rapid_trigger: false,
            continuous_rapid_trigger: false,
            rapid_trigger_up_sensitivity: (travel / 10) as u16,
            rapid_trigger_down_sensitivity: (travel / 10) as u16,
            lower_hysteresis: (travel * 550 / 1000) as u16,
            upper_hysteresis: (travel * 675 / 1000) as u16,
        }
    }

    pub fn validate(&self, tuning: &Tuning) -> Result<(), ConfigError> {
        check_key_char(self.key_char)?;

        for sensitivity in [
            self.rapid_trigger_up_sensitivity,
            self.rapid_trigger_down_sensitivity,
        ] {
            if sensitivity < tuning.rapid_trigger_tolerance
                || sensitivity > tuning.travel_distance
            {
                return Err(ConfigError::Sensitivity(sensitivity));
            }
        }

        let (lower, upper) = (self.lower_hysteresis, self.upper_hysteresis);
        if (upper as i32 - lower as i32) < tuning.hysteresis_tolerance as i32 {
            return Err(ConfigError::HysteresisGap { lower, upper });
        }
        if (tuning.travel_distance as i32 - upper as i32) < tuning.hysteresis_tolerance as i32 {
            return Err(ConfigError::HysteresisRange(upper));
        }

        Ok(())
    }

    /// Applies `change` only if the result is still valid
    pub fn update(
        &mut self,
        tuning: &Tuning,
        change: impl FnOnce(&mut Self),
    ) -> Result<(), ConfigError> {
        let mut next = *self;
        change(&mut next);
        next.validate(tuning)?;
        *self = next;
        Ok(())
    }

    pub fn set_lower_hysteresis(&mut self, value: u16, tuning: &Tuning) -> Result<(), ConfigError> {
        self.update(tuning, |config| config.lower_hysteresis = value)
    }

    pub fn set_upper_hysteresis(&mut self, value: u16, tuning: &Tuning) -> Result<(), ConfigError> {
        self.update(tuning, |config| config.upper_hysteresis = value)
    }

    pub fn set_up_sensitivity(&mut self, value: u16, tuning: &Tuning) -> Result<(), ConfigError> {
        self.update(tuning, |config| config.rapid_trigger_up_sensitivity = value)
    }

    pub fn set_down_sensitivity(&mut self, value: u16, tuning: &Tuning) -> Result<(), ConfigError> {
        self.update(tuning, |config| {
            config.rapid_trigger_down_sensitivity = value
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DigitalKeyConfig {
    pub key_char: char,
    pub hid_enabled: bool,
}

impl DigitalKeyConfig {
    pub fn new(key_char: char) -> Self {
        Self {
            key_char,
            hid_enabled: true,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_key_char(self.key_char)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyConfig {
    Analog(AnalogKeyConfig),
    Digital(DigitalKeyConfig),
}

impl KeyConfig {
    pub fn key_char(&self) -> char {
        match self {
            KeyConfig::Analog(config) => config.key_char,
            KeyConfig::Digital(config) => config.key_char,
        }
    }

    pub fn hid_enabled(&self) -> bool {
        match self {
            KeyConfig::Analog(config) => config.hid_enabled,
            KeyConfig::Digital(config) => config.hid_enabled,
        }
    }

    pub fn set_key_char(&mut self, key_char: char) -> Result<(), ConfigError> {
        check_key_char(key_char)?;
        match self {
            KeyConfig::Analog(config) => config.key_char = key_char,
            KeyConfig::Digital(config) => config.key_char = key_char,
        }
        Ok(())
    }

    pub fn set_hid_enabled(&mut self, enabled: bool) {
        match self {
            KeyConfig::Analog(config) => config.hid_enabled = enabled,
            KeyConfig::Digital(config) => config.hid_enabled = enabled,
        }
    }

    pub fn validate(&self, tuning: &Tuning) -> Result<(), ConfigError> {
        match self {
            KeyConfig::Analog(config) => config.validate(tuning),
            KeyConfig::Digital(config) => config.validate(),
        }
    }

    /// Same kind of key, so the config fits the same hardware slot
    pub fn same_kind(&self, other: &KeyConfig) -> bool {
        matches!(
            (self, other),
            (KeyConfig::Analog(_), KeyConfig::Analog(_))
                | (KeyConfig::Digital(_), KeyConfig::Digital(_))
        )
    }
}

fn check_key_char(key_char: char) -> Result<(), ConfigError> {
    if key_char.is_ascii_alphanumeric() {
        Ok(())
    } else {
        Err(ConfigError::KeyChar(key_char))
    }
}

/// Analog keys count down from `z`, digital keys up from `a`
pub fn default_key_char(analog: bool, index: usize) -> char {
    match (analog, index) {
        (true, i) if i < 26 => (b'z' - i as u8) as char,
        (true, _) => 'a',
        (false, i) if i < 26 => (b'a' + i as u8) as char,
        (false, _) => 'z',
    }
}

/// Default settings for `analog` analog keys followed by `digital` digital
/// keys. Keys that do not fit in `KEYS` are left out.
pub fn default_config<const KEYS: usize>(
    analog: usize,
    digital: usize,
    tuning: &Tuning,
) -> Vec<KeyConfig, KEYS> {
    let analog_keys = (0..analog).map(|i| {
        KeyConfig::Analog(AnalogKeyConfig::new(
            default_key_char(true, i),
            tuning.travel_distance,
        ))
    });
    let digital_keys =
        (0..digital).map(|i| KeyConfig::Digital(DigitalKeyConfig::new(default_key_char(false, i))));

    analog_keys.chain(digital_keys).take(KEYS).collect()
}

/// Checks a keypad name and copies it into a fixed buffer
pub fn name_buffer(name: &str) -> Result<String<NAME_LEN>, ConfigError> {
    let mut buffer = String::new();
    if name.is_empty() || buffer.push_str(name).is_err() {
        return Err(ConfigError::NameLength(name.len()));
    }
    Ok(buffer)
}

/// Everything the configuration store persists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration<const KEYS: usize> {
    pub version: u32,
    pub(crate) name: String<NAME_LEN>,
    pub keys: Vec<KeyConfig, KEYS>,
}

impl<const KEYS: usize> Configuration<KEYS> {
    pub fn new(keys: Vec<KeyConfig, KEYS>) -> Self {
        let mut name = String::new();
        // Fits, NAME_LEN is well above it
        let _ = name.push_str("hallpad");
        Self {
            version: CONFIG_VERSION,
            name,
            keys,
        }
    }

    pub fn with_defaults(analog: usize, digital: usize, tuning: &Tuning) -> Self {
        Self::new(default_config(analog, digital, tuning))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), ConfigError> {
        self.name = name_buffer(name)?;
        Ok(())
    }

    /// Whether this configuration can drive the key layout of `other`
    pub fn matches_layout(&self, other: &Self) -> bool {
        self.version == other.version
            && self.keys.len() == other.keys.len()
            && self
                .keys
                .iter()
                .zip(other.keys.iter())
                .all(|(a, b)| a.same_kind(b))
    }
}
