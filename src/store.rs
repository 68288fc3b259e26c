//! Persistence of the key settings

use core::convert::Infallible;

use crate::config::{Configuration, Tuning};

/// Keeps a [`Configuration`] across power cycles
pub trait ConfigStore<const KEYS: usize> {
    type Error;

    /// The stored configuration, `None` if nothing has been stored yet
    fn load(&mut self) -> Result<Option<Configuration<KEYS>>, Self::Error>;

    fn save(&mut self, config: &Configuration<KEYS>) -> Result<(), Self::Error>;
}

/// Loads the stored configuration if it still fits `defaults`, otherwise
/// stores `defaults` and returns them.
///
/// A stored configuration fits if it has the same version, the same keys in
/// the same order and only valid settings.
pub fn load_or_default<S: ConfigStore<KEYS>, const KEYS: usize>(
    store: &mut S,
    defaults: Configuration<KEYS>,
    tuning: &Tuning,
) -> Result<Configuration<KEYS>, S::Error> {
    match store.load()? {
        Some(stored) if !stored.matches_layout(&defaults) => {
            info!(
                "stored configuration v{} with {} keys does not fit, using defaults",
                stored.version,
                stored.keys.len()
            );
        }
        Some(stored) => match stored.keys.iter().try_for_each(|key| key.validate(tuning)) {
            Ok(()) => return Ok(stored),
            Err(err) => warn!("stored configuration rejected, {}", err),
        },
        None => info!("no stored configuration, using defaults"),
    }

    store.save(&defaults)?;
    Ok(defaults)
}

/// Store that lives as long as the device is powered
#[derive(Debug, Default)]
pub struct MemoryStore<const KEYS: usize> {
    stored: Option<Configuration<KEYS>>,
    saves: usize,
}

impl<const KEYS: usize> MemoryStore<KEYS> {
    pub const fn new() -> Self {
        Self {
            stored: None,
            saves: 0,
        }
    }

    pub fn with(config: Configuration<KEYS>) -> Self {
        Self {
            stored: Some(config),
            saves: 0,
        }
    }

    pub fn stored(&self) -> Option<&Configuration<KEYS>> {
        self.stored.as_ref()
    }

    /// Number of successful saves
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl<const KEYS: usize> ConfigStore<KEYS> for MemoryStore<KEYS> {
    type Error = Infallible;

    fn load(&mut self) -> Result<Option<Configuration<KEYS>>, Infallible> {
        Ok(self.stored.clone())
    }

    fn save(&mut self, config: &Configuration<KEYS>) -> Result<(), Infallible> {
        self.stored = Some(config.clone());
        self.saves += 1;
        Ok(())
    }
}
