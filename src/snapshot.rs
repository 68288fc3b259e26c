//! Latest key state for a second core.
//!
//! Only plain loads and stores, so this works on cores without compare and
//! swap. A reader may see one key from this scan and the next from the
//! previous one.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use crate::keystate::KeyRegistry;

#[allow(clippy::declare_interior_mutable_const)]
const RELEASED: AtomicBool = AtomicBool::new(false);
#[allow(clippy::declare_interior_mutable_const)]
const NO_DISTANCE: AtomicU16 = AtomicU16::new(u16::MAX);

pub struct KeySnapshots<const KEYS: usize> {
    pressed: [AtomicBool; KEYS],
    distance: [AtomicU16; KEYS],
}

impl<const KEYS: usize> Default for KeySnapshots<KEYS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const KEYS: usize> KeySnapshots<KEYS> {
    /// Usable as a `static`
    pub const fn new() -> Self {
        Self {
            pressed: [RELEASED; KEYS],
            distance: [NO_DISTANCE; KEYS],
        }
    }

    pub fn publish(&self, registry: &KeyRegistry<KEYS>) {
        for (id, key) in registry.iter() {
            let i = id.index();
            self.pressed[i].store(key.is_pressed(), Ordering::Relaxed);
            self.distance[i].store(key.distance().unwrap_or(u16::MAX), Ordering::Relaxed);
        }
    }

    pub fn pressed(&self, index: usize) -> bool {
        self.pressed
            .get(index)
            .map_or(false, |pressed| pressed.load(Ordering::Relaxed))
    }

    /// Last distance of an analog key, `None` for digital keys and keys
    /// never published
    pub fn distance(&self, index: usize) -> Option<u16> {
        self.distance
            .get(index)
            .map(|distance| distance.load(Ordering::Relaxed))
            .filter(|&distance| distance != u16::MAX)
    }

    pub fn any_pressed(&self) -> bool {
        self.pressed
            .iter()
            .any(|pressed| pressed.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::{default_config, Tuning};
    use crate::keystate::Key;
    use crate::keystate::button::tests::RecordingHid;

    static SNAPSHOTS: KeySnapshots<3> = KeySnapshots::new();

    #[test]
    fn starts_empty() {
        assert!(!SNAPSHOTS.any_pressed());
        assert_eq!(SNAPSHOTS.distance(0), None);
        assert!(!SNAPSHOTS.pressed(7));
    }

    #[test]
    fn publishes_registry() {
        let tuning = Tuning::default();
        let mut registry = KeyRegistry::<3>::new(&default_config::<3>(2, 1, &tuning), &tuning);
        let snapshots = KeySnapshots::<3>::new();

        snapshots.publish(&registry);
        assert_eq!(snapshots.distance(0), Some(400));
        assert_eq!(snapshots.distance(2), None);
        assert!(!snapshots.any_pressed());

        let mut hid = RecordingHid::default();
        let id = registry.id(2).unwrap();
        if let Some(Key::Digital(key)) = registry.get_mut(id) {
            key.scan(id, true, 0, &tuning, &mut hid, &mut ());
        }
        snapshots.publish(&registry);
        assert!(snapshots.pressed(2));
        assert!(!snapshots.pressed(0));
        assert!(snapshots.any_pressed());
    }
}
