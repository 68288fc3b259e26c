//! The scan loop tying sensors, keys and the HID output together

use heapless::String;

use crate::config::{name_buffer, ConfigError, Configuration, Instant, KeyConfig, Tuning, NAME_LEN};
use crate::distance::DistanceMapper;
use crate::hid::HidSink;
use crate::keystate::{Key, KeyId, KeyRegistry};
use crate::sensor::Sensor;
use crate::snapshot::KeySnapshots;
use crate::store::{load_or_default, ConfigStore};
use crate::telemetry::Telemetry;

/// Monotonic millisecond clock, only used for debouncing
pub trait Clock {
    fn now(&self) -> Instant;
}

/// How many keys of each kind the hardware has. Analog keys come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layout {
    pub analog: usize,
    pub digital: usize,
}

/// Diagnostic view of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyReport {
    Analog {
        key_char: char,
        filtered: u16,
        distance: u16,
        rest_position: u16,
        down_position: u16,
        calibrated: bool,
        pressed: bool,
    },
    Digital {
        key_char: char,
        high: bool,
        pressed: bool,
    },
}

pub struct Keypad<S, H, C, T, const KEYS: usize> {
    registry: KeyRegistry<KEYS>,
    tuning: Tuning,
    mapper: DistanceMapper,
    layout: Layout,
    name: String<NAME_LEN>,
    sensor: S,
    hid: H,
    clock: C,
    telemetry: T,
    /// Forward every analog reading to the telemetry each scan
    pub output_mode: bool,
}

impl<S, H, C, T, const KEYS: usize> Keypad<S, H, C, T, KEYS>
where
    S: Sensor,
    H: HidSink,
    C: Clock,
    T: Telemetry,
{
    /// A keypad running on default settings. Use [`Keypad::boot`] to pick up
    /// stored ones.
    pub fn new(tuning: Tuning, layout: Layout, sensor: S, hid: H, clock: C, telemetry: T) -> Self {
        let defaults = Self::defaults(&tuning, layout);
        Self {
            registry: KeyRegistry::new(&defaults.keys, &tuning),
            mapper: DistanceMapper::new(&tuning),
            tuning,
            layout,
            name: defaults.name,
            sensor,
            hid,
            clock,
            telemetry,
            output_mode: false,
        }
    }

    fn defaults(tuning: &Tuning, layout: Layout) -> Configuration<KEYS> {
        Configuration::with_defaults(layout.analog, layout.digital, tuning)
    }

    /// Takes over the stored configuration, or stores the defaults if there
    /// is no usable one. A store that fails leaves the keypad on defaults.
    pub fn boot<St: ConfigStore<KEYS>>(&mut self, store: &mut St) {
        let defaults = Self::defaults(&self.tuning, self.layout);
        let config = match load_or_default(store, defaults.clone(), &self.tuning) {
            Ok(config) => config,
            Err(_) => {
                warn!("configuration store failed, running on defaults");
                defaults
            }
        };
        self.install(&config);
        info!(
            "booted with {} analog and {} digital keys",
            self.registry.analog_count(),
            self.registry.digital_count()
        );
    }

    fn install(&mut self, config: &Configuration<KEYS>) {
        self.registry.reset(&self.tuning, &mut self.hid);
        self.hid.flush();
        self.registry = KeyRegistry::new(&config.keys, &self.tuning);
        self.name = config.name.clone();
    }

    pub fn configuration(&self) -> Configuration<KEYS> {
        let mut config = Configuration::new(self.registry.configs());
        config.name = self.name.clone();
        config
    }

    pub fn save<St: ConfigStore<KEYS>>(&self, store: &mut St) -> Result<(), St::Error> {
        store.save(&self.configuration())
    }

    /// Back to default settings, calibration included, and stores them
    pub fn reset_to_default<St: ConfigStore<KEYS>>(&mut self, store: &mut St) -> Result<(), St::Error> {
        let defaults = Self::defaults(&self.tuning, self.layout);
        self.install(&defaults);
        store.save(&defaults)
    }

    /// One pass over every key. Each key is read and scanned, then the HID
    /// report is flushed once.
    pub fn tick(&mut self) {
        let now = self.clock.now();

        for (id, key) in self.registry.iter_mut() {
            let transition = match key {
                Key::Analog(key) => {
                    let raw = match self.sensor.read_raw(key.channel()) {
                        Ok(raw) => raw,
                        Err(_) => {
                            warn!("key {}: analog read failed", id.index());
                            continue;
                        }
                    };
                    let transition = key.scan(
                        id,
                        raw,
                        &self.tuning,
                        &self.mapper,
                        &mut self.hid,
                        &mut self.telemetry,
                    );
                    if self.output_mode {
                        self.telemetry
                            .output(id, key.last_filtered(), key.last_distance());
                    }
                    transition
                }
                Key::Digital(key) => {
                    let high = match self.sensor.read_digital(key.channel()) {
                        Ok(high) => high,
                        Err(_) => {
                            warn!("key {}: digital read failed", id.index());
                            continue;
                        }
                    };
                    key.scan(
                        id,
                        high,
                        now,
                        &self.tuning,
                        &mut self.hid,
                        &mut self.telemetry,
                    )
                }
            };

            if let Some(transition) = transition {
                self.telemetry.transition(id, transition);
            }
        }

        self.hid.flush();
    }

    /// Stages new settings for one key, taken over on the next tick
    pub fn set_key_config(&mut self, id: KeyId, config: KeyConfig) -> Result<(), ConfigError> {
        let tuning = self.tuning;
        self.registry
            .get_mut(id)
            .ok_or(ConfigError::KeyKind)?
            .set_config(config, &tuning)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), ConfigError> {
        self.name = name_buffer(name)?;
        Ok(())
    }

    pub fn report(&self) -> impl Iterator<Item = (KeyId, KeyReport)> + '_ {
        self.registry.iter().map(|(id, key)| {
            let report = match key {
                Key::Analog(key) => KeyReport::Analog {
                    key_char: key.active().key_char,
                    filtered: key.last_filtered(),
                    distance: key.last_distance(),
                    rest_position: key.bounds().rest_position(),
                    down_position: key.bounds().down_position(),
                    calibrated: key.bounds().calibrated(),
                    pressed: key.is_pressed(),
                },
                Key::Digital(key) => KeyReport::Digital {
                    key_char: key.active().key_char,
                    high: key.last_high(),
                    pressed: key.is_pressed(),
                },
            };
            (id, report)
        })
    }

    pub fn publish(&self, snapshots: &KeySnapshots<KEYS>) {
        snapshots.publish(&self.registry);
    }

    pub fn registry(&self) -> &KeyRegistry<KEYS> {
        &self.registry
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn hid(&self) -> &H {
        &self.hid
    }

    pub fn hid_mut(&mut self) -> &mut H {
        &mut self.hid
    }

    pub fn telemetry_mut(&mut self) -> &mut T {
        &mut self.telemetry
    }
}
