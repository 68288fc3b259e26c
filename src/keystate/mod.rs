//! Per-key runtime state, and the registry that owns every key of the pad

use heapless::Vec;

use crate::calibration::Boundaries;
use crate::config::{
    AnalogKeyConfig, ConfigError, DigitalKeyConfig, Instant, KeyConfig, Tuning, ADC_MAX,
    FILTER_SAMPLES,
};
use crate::debounce::{Debouncer, Edge};
use crate::distance::DistanceMapper;
use crate::filter::SampleFilter;
use crate::hid::HidSink;
use crate::telemetry::Telemetry;

pub mod actuation;
pub mod button;

use actuation::Actuation;
use button::ButtonState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    Press,
    Release,
}

/// Index of a key in its [`KeyRegistry`]. Only the registry hands these out,
/// so holding one means the key exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyId(u8);

impl KeyId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct AnalogKey {
    /// Settings as last written. Checked every scan, the key keeps running on
    /// `active` while these are invalid.
    pub config: AnalogKeyConfig,
    active: AnalogKeyConfig,
    channel: u8,
    filter: SampleFilter<FILTER_SAMPLES>,
    bounds: Boundaries,
    actuation: Actuation,
    last_raw: u16,
    last_filtered: u16,
    last_distance: u16,
}

impl AnalogKey {
    pub fn new(config: AnalogKeyConfig, channel: u8, tuning: &Tuning) -> Self {
        Self {
            config,
            active: config,
            channel,
            filter: SampleFilter::new(),
            bounds: Boundaries::uncalibrated(ADC_MAX),
            actuation: Actuation::new(),
            last_raw: 0,
            last_filtered: 0,
            last_distance: tuning.travel_distance,
        }
    }

    /// Mux channel the sensor sits on
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Settings the key is currently actuating with
    pub fn active(&self) -> &AnalogKeyConfig {
        &self.active
    }

    pub fn bounds(&self) -> &Boundaries {
        &self.bounds
    }

    pub fn actuation(&self) -> &Actuation {
        &self.actuation
    }

    pub fn is_pressed(&self) -> bool {
        self.actuation.is_pressed()
    }

    pub fn last_raw(&self) -> u16 {
        self.last_raw
    }

    pub fn last_filtered(&self) -> u16 {
        self.last_filtered
    }

    pub fn last_distance(&self) -> u16 {
        self.last_distance
    }

    /// One scan of the key: filter `raw`, recalibrate, map to a distance and
    /// actuate.
    ///
    /// Calibration waits for a full filter window, actuation for a usable
    /// calibration. Until then the key reads as fully released.
    pub fn scan<H: HidSink + ?Sized, T: Telemetry + ?Sized, const SIZE: usize>(
        &mut self,
        id: KeyId,
        raw: u16,
        tuning: &Tuning,
        mapper: &DistanceMapper<SIZE>,
        hid: &mut H,
        telemetry: &mut T,
    ) -> Option<Transition> {
        let released = self.refresh_config(id, tuning, hid);

        let raw = if tuning.invert_readings {
            ADC_MAX.saturating_sub(raw)
        } else {
            raw
        };
        let filtered = self.filter.push(raw);
        telemetry.filtered(id, raw, filtered);

        if self.filter.initialized() {
            self.bounds.update(
                filtered,
                tuning.boundary_deadzone,
                tuning.boundary_min_span,
            );
        }

        let distance = mapper.map(&self.bounds, filtered, tuning.travel_distance);
        telemetry.analog(id, filtered, distance, &self.bounds);

        self.last_raw = raw;
        self.last_filtered = filtered;
        self.last_distance = distance;

        if released.is_some() || !self.bounds.calibrated() {
            return released;
        }
        self.actuation.update(&self.active, distance, tuning, hid)
    }

    /// Takes over `config` if it is valid. A key held under the old character
    /// is released first, so the host never sees it stuck.
    fn refresh_config<H: HidSink + ?Sized>(
        &mut self,
        id: KeyId,
        tuning: &Tuning,
        hid: &mut H,
    ) -> Option<Transition> {
        if self.config == self.active {
            return None;
        }
        if let Err(err) = self.config.validate(tuning) {
            warn!("key {}: rejected settings, {}", id.index(), err);
            self.config = self.active;
            return None;
        }

        let released = if self.config.key_char != self.active.key_char {
            self.actuation.release(self.active.key_char, hid)
        } else {
            None
        };
        self.active = self.config;
        released
    }

    /// Forgets calibration, filter contents and actuation state. The
    /// settings stay.
    pub fn reset<H: HidSink + ?Sized>(&mut self, tuning: &Tuning, hid: &mut H) {
        self.actuation.release(self.active.key_char, hid);
        *self = Self::new(self.active, self.channel, tuning);
    }
}

#[derive(Debug, Clone)]
pub struct DigitalKey {
    /// Settings as last written, see [`AnalogKey::config`]
    pub config: DigitalKeyConfig,
    active: DigitalKeyConfig,
    channel: u8,
    debouncer: Debouncer,
    button: ButtonState,
    last_high: bool,
}

impl DigitalKey {
    pub fn new(config: DigitalKeyConfig, channel: u8) -> Self {
        Self {
            config,
            active: config,
            channel,
            debouncer: Debouncer::new(),
            button: ButtonState::Unpressed,
            last_high: false,
        }
    }

    /// Input the switch is wired to
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn active(&self) -> &DigitalKeyConfig {
        &self.active
    }

    pub fn is_pressed(&self) -> bool {
        self.button.is_pressed()
    }

    pub fn last_high(&self) -> bool {
        self.last_high
    }

    pub fn scan<H: HidSink + ?Sized, T: Telemetry + ?Sized>(
        &mut self,
        id: KeyId,
        high: bool,
        now: Instant,
        tuning: &Tuning,
        hid: &mut H,
        telemetry: &mut T,
    ) -> Option<Transition> {
        telemetry.digital(id, high);
        self.last_high = high;

        if self.config != self.active {
            match self.config.validate() {
                Ok(()) => {
                    let previous = self.active;
                    self.active = self.config;
                    if previous.key_char != self.active.key_char {
                        if let Some(released) = self.button.release(previous.key_char, hid) {
                            return Some(released);
                        }
                    }
                }
                Err(err) => {
                    warn!("key {}: rejected settings, {}", id.index(), err);
                    self.config = self.active;
                }
            }
        }

        match self.debouncer.update(high, now, tuning.debounce_delay)? {
            Edge::Press => self
                .button
                .press(self.active.key_char, self.active.hid_enabled, hid),
            Edge::Release => self.button.release(self.active.key_char, hid),
        }
    }

    pub fn reset<H: HidSink + ?Sized>(&mut self, hid: &mut H) {
        self.button.release(self.active.key_char, hid);
        *self = Self::new(self.active, self.channel);
    }
}

#[derive(Debug, Clone)]
pub enum Key {
    Analog(AnalogKey),
    Digital(DigitalKey),
}

impl Key {
    fn new(config: KeyConfig, channel: u8, tuning: &Tuning) -> Self {
        match config {
            KeyConfig::Analog(config) => Key::Analog(AnalogKey::new(config, channel, tuning)),
            KeyConfig::Digital(config) => Key::Digital(DigitalKey::new(config, channel)),
        }
    }

    /// Settings the key is running with
    pub fn config(&self) -> KeyConfig {
        match self {
            Key::Analog(key) => KeyConfig::Analog(key.active),
            Key::Digital(key) => KeyConfig::Digital(key.active),
        }
    }

    /// Stages `config` for the next scan. It has to be valid and for the
    /// same kind of key.
    pub fn set_config(&mut self, config: KeyConfig, tuning: &Tuning) -> Result<(), ConfigError> {
        config.validate(tuning)?;
        match (self, config) {
            (Key::Analog(key), KeyConfig::Analog(config)) => key.config = config,
            (Key::Digital(key), KeyConfig::Digital(config)) => key.config = config,
            _ => return Err(ConfigError::KeyKind),
        }
        Ok(())
    }

    pub fn is_pressed(&self) -> bool {
        match self {
            Key::Analog(key) => key.is_pressed(),
            Key::Digital(key) => key.is_pressed(),
        }
    }

    /// Travel distance, digital keys have none
    pub fn distance(&self) -> Option<u16> {
        match self {
            Key::Analog(key) => Some(key.last_distance),
            Key::Digital(_) => None,
        }
    }

    pub fn is_analog(&self) -> bool {
        matches!(self, Key::Analog(_))
    }

    fn reset<H: HidSink + ?Sized>(&mut self, tuning: &Tuning, hid: &mut H) {
        match self {
            Key::Analog(key) => key.reset(tuning, hid),
            Key::Digital(key) => key.reset(hid),
        }
    }
}

/// All keys of the pad, analog and digital, in configuration order.
///
/// Analog keys take mux channels and digital keys take inputs, each numbered
/// from 0 in the order they appear.
#[derive(Debug, Clone)]
pub struct KeyRegistry<const KEYS: usize> {
    keys: Vec<Key, KEYS>,
}

impl<const KEYS: usize> KeyRegistry<KEYS> {
    const FITS_ID: () = assert!(KEYS <= u8::MAX as usize + 1, "key ids are u8");

    pub fn new(configs: &[KeyConfig], tuning: &Tuning) -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::FITS_ID;

        let mut keys = Vec::new();
        let (mut analog, mut digital) = (0u8, 0u8);
        for config in configs.iter().take(KEYS) {
            let channel = match config {
                KeyConfig::Analog(_) => &mut analog,
                KeyConfig::Digital(_) => &mut digital,
            };
            // Capacity checked by `take`
            let _ = keys.push(Key::new(*config, *channel, tuning));
            *channel = channel.wrapping_add(1);
        }
        if configs.len() > KEYS {
            warn!("{} keys configured, only {} fit", configs.len(), KEYS);
        }
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn analog_count(&self) -> usize {
        self.keys.iter().filter(|key| key.is_analog()).count()
    }

    pub fn digital_count(&self) -> usize {
        self.len() - self.analog_count()
    }

    pub fn id(&self, index: usize) -> Option<KeyId> {
        (index < self.keys.len()).then_some(KeyId(index as u8))
    }

    pub fn get(&self, id: KeyId) -> Option<&Key> {
        self.keys.get(id.index())
    }

    pub fn get_mut(&mut self, id: KeyId) -> Option<&mut Key> {
        self.keys.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (KeyId, &Key)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| (KeyId(i as u8), key))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (KeyId, &mut Key)> {
        self.keys
            .iter_mut()
            .enumerate()
            .map(|(i, key)| (KeyId(i as u8), key))
    }

    /// Settings of every key, ready to be stored
    pub fn configs(&self) -> Vec<KeyConfig, KEYS> {
        self.keys.iter().map(Key::config).collect()
    }

    /// Stages new settings for every key. Nothing changes unless all of them
    /// fit.
    pub fn apply(&mut self, configs: &[KeyConfig], tuning: &Tuning) -> Result<(), ConfigError> {
        if configs.len() != self.keys.len() {
            return Err(ConfigError::KeyKind);
        }
        for (key, config) in self.keys.iter().zip(configs) {
            config.validate(tuning)?;
            if !key.config().same_kind(config) {
                return Err(ConfigError::KeyKind);
            }
        }
        for (key, config) in self.keys.iter_mut().zip(configs) {
            key.set_config(*config, tuning)?;
        }
        Ok(())
    }

    /// Releases every key and drops all runtime state, calibration included
    pub fn reset<H: HidSink + ?Sized>(&mut self, tuning: &Tuning, hid: &mut H) {
        for key in self.keys.iter_mut() {
            key.reset(tuning, hid);
        }
    }
}
