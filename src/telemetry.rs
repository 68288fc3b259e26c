//! Diagnostics hooks. Every method defaults to doing nothing; `()` is the
//! sink to use when diagnostics are off.

use crate::calibration::Boundaries;
use crate::keystate::{KeyId, Transition};

pub trait Telemetry {
    /// Sample before and after the moving average
    fn filtered(&mut self, _key: KeyId, _raw: u16, _filtered: u16) {}

    /// Filtered value, the distance it mapped to and the boundaries used
    fn analog(&mut self, _key: KeyId, _filtered: u16, _distance: u16, _bounds: &Boundaries) {}

    fn digital(&mut self, _key: KeyId, _high: bool) {}

    /// Emitted every scan for every analog key while output mode is on
    fn output(&mut self, _key: KeyId, _filtered: u16, _distance: u16) {}

    fn transition(&mut self, _key: KeyId, _transition: Transition) {}
}

impl Telemetry for () {}

/// Forwards everything to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn filtered(&mut self, key: KeyId, raw: u16, filtered: u16) {
        trace!("key {}: raw {}, filtered {}", key.index(), raw, filtered);
    }

    fn analog(&mut self, key: KeyId, filtered: u16, distance: u16, bounds: &Boundaries) {
        trace!(
            "key {}: filtered {}, distance {}, rest {}, down {}",
            key.index(),
            filtered,
            distance,
            bounds.rest_position(),
            bounds.down_position()
        );
    }

    fn digital(&mut self, key: KeyId, high: bool) {
        trace!("key {}: high {}", key.index(), high);
    }

    fn output(&mut self, key: KeyId, filtered: u16, distance: u16) {
        info!("OUT key {}: {} {}", key.index(), filtered, distance);
    }

    fn transition(&mut self, key: KeyId, transition: Transition) {
        debug!("key {}: {}", key.index(), transition);
    }
}
