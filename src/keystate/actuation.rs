//! Press/release decisions for an analog key.
//!
//! Distances run from 0 (bottomed out) to full travel (at rest), so pressing
//! the key lowers the distance.
//!
//! Without rapid trigger the key presses at or below the lower hysteresis and
//! releases at or above the upper one.
//!
//! With rapid trigger the key presses as soon as it enters the zone below the
//! lower hysteresis. Inside the zone the actuation point floats: the key
//! releases once it has risen the up sensitivity above the lowest point
//! reached while pressed, and presses again once it has fallen the down
//! sensitivity below the highest point reached while released. The zone is
//! left above the upper hysteresis, or, for continuous rapid trigger, only
//! once the key is all but fully released.

use crate::config::{AnalogKeyConfig, Tuning};
use crate::hid::HidSink;

use super::button::ButtonState;
use super::Transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuationState {
    Released,
    TraditionalPressed,
    RapidTriggerZone { pressed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actuation {
    button: ButtonState,
    in_rapid_trigger_zone: bool,
    rapid_trigger_peak: u16,
}

impl Default for Actuation {
    fn default() -> Self {
        Self::new()
    }
}

impl Actuation {
    pub const fn new() -> Self {
        Self {
            button: ButtonState::Unpressed,
            in_rapid_trigger_zone: false,
            // Only read inside the zone, and entering it sets the peak
            rapid_trigger_peak: u16::MAX,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.button.is_pressed()
    }

    pub fn in_rapid_trigger_zone(&self) -> bool {
        self.in_rapid_trigger_zone
    }

    pub fn rapid_trigger_peak(&self) -> u16 {
        self.rapid_trigger_peak
    }

    pub fn state(&self) -> ActuationState {
        match (self.in_rapid_trigger_zone, self.is_pressed()) {
            (true, pressed) => ActuationState::RapidTriggerZone { pressed },
            (false, true) => ActuationState::TraditionalPressed,
            (false, false) => ActuationState::Released,
        }
    }

    /// Releases the key if it is held, regardless of distance
    pub fn release<H: HidSink + ?Sized>(&mut self, key_char: char, hid: &mut H) -> Option<Transition> {
        self.button.release(key_char, hid)
    }

    pub fn update<H: HidSink + ?Sized>(
        &mut self,
        config: &AnalogKeyConfig,
        distance: u16,
        tuning: &Tuning,
        hid: &mut H,
    ) -> Option<Transition> {
        if config.rapid_trigger {
            self.rapid_trigger(config, distance, tuning, hid)
        } else {
            self.traditional(config, distance, hid)
        }
    }

    fn traditional<H: HidSink + ?Sized>(
        &mut self,
        config: &AnalogKeyConfig,
        distance: u16,
        hid: &mut H,
    ) -> Option<Transition> {
        if distance <= config.lower_hysteresis {
            self.button.press(config.key_char, config.hid_enabled, hid)
        } else if distance >= config.upper_hysteresis {
            self.button.release(config.key_char, hid)
        } else {
            None
        }
    }

    fn rapid_trigger<H: HidSink + ?Sized>(
        &mut self,
        config: &AnalogKeyConfig,
        distance: u16,
        tuning: &Tuning,
        hid: &mut H,
    ) -> Option<Transition> {
        // Widened so sums near the ends of the u16 range cannot wrap
        let value = distance as i32;
        let peak = self.rapid_trigger_peak as i32;
        let up = config.rapid_trigger_up_sensitivity as i32;
        let down = config.rapid_trigger_down_sensitivity as i32;

        // Leaving the zone
        let release_point = if config.continuous_rapid_trigger {
            tuning.travel_distance as i32 - tuning.continuous_release_threshold as i32
        } else {
            config.upper_hysteresis as i32
        };
        if value >= release_point {
            self.in_rapid_trigger_zone = false;
        }

        let transition = if value <= config.lower_hysteresis as i32 && !self.in_rapid_trigger_zone {
            // Entering the zone counts as an actuation by itself. The peak
            // starts here even if HID blocks the press.
            self.in_rapid_trigger_zone = true;
            self.rapid_trigger_peak = distance;
            self.button.press(config.key_char, config.hid_enabled, hid)
        } else if !self.is_pressed() && self.in_rapid_trigger_zone && value + down <= peak {
            self.button.press(config.key_char, config.hid_enabled, hid)
        } else if self.is_pressed() && (!self.in_rapid_trigger_zone || value >= peak + up) {
            self.button.release(config.key_char, hid)
        } else {
            None
        };

        let pressed = self.is_pressed();
        if (pressed && distance < self.rapid_trigger_peak)
            || (!pressed && distance > self.rapid_trigger_peak)
        {
            self.rapid_trigger_peak = distance;
        }

        transition
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::super::button::tests::RecordingHid;
    use super::*;

    fn config(rapid_trigger: bool, continuous: bool, sensitivity: u16) -> AnalogKeyConfig {
        AnalogKeyConfig {
            key_char: 'z',
            hid_enabled: true,
            rapid_trigger,
            continuous_rapid_trigger: continuous,
            rapid_trigger_up_sensitivity: sensitivity,
            rapid_trigger_down_sensitivity: sensitivity,
            lower_hysteresis: 250,
            upper_hysteresis: 300,
        }
    }

    /// Feeds `distances` and returns the index and kind of every transition
    fn run(
        actuation: &mut Actuation,
        config: &AnalogKeyConfig,
        distances: &[u16],
    ) -> Vec<(usize, Transition)> {
        let tuning = Tuning::default();
        let mut hid = RecordingHid::default();
        distances
            .iter()
            .enumerate()
            .filter_map(|(i, d)| actuation.update(config, *d, &tuning, &mut hid).map(|t| (i, t)))
            .collect()
    }

    #[test]
    fn traditional_sequence() {
        let mut actuation = Actuation::new();
        let transitions = run(
            &mut actuation,
            &config(false, false, 20),
            &[400, 260, 200, 310, 400],
        );
        assert_eq!(
            transitions,
            [(2, Transition::Press), (3, Transition::Release)]
        );
    }

    #[test]
    fn traditional_dead_zone_is_stable() {
        let config = config(false, false, 20);
        for start in [200, 400] {
            let mut actuation = Actuation::new();
            run(&mut actuation, &config, &[start]);
            let pressed = actuation.is_pressed();
            let transitions = run(&mut actuation, &config, &[251, 275, 299, 260, 251, 299]);
            assert!(transitions.is_empty());
            assert_eq!(actuation.is_pressed(), pressed);
        }
    }

    #[test]
    fn traditional_boundaries_are_inclusive() {
        let config = config(false, false, 20);
        let mut actuation = Actuation::new();
        let transitions = run(&mut actuation, &config, &[250, 300]);
        assert_eq!(
            transitions,
            [(0, Transition::Press), (1, Transition::Release)]
        );
    }

    #[test]
    fn rapid_trigger_sequence() {
        let mut actuation = Actuation::new();
        let transitions = run(
            &mut actuation,
            &config(true, false, 20),
            &[400, 240, 200, 210, 230, 260],
        );
        // Press on entering the zone, release once 20 above the 200 peak
        assert_eq!(
            transitions,
            [(1, Transition::Press), (4, Transition::Release)]
        );
        assert!(actuation.in_rapid_trigger_zone());
        assert_eq!(actuation.rapid_trigger_peak(), 260);
        assert_eq!(
            actuation.state(),
            ActuationState::RapidTriggerZone { pressed: false }
        );
    }

    #[test]
    fn rapid_trigger_presses_again_inside_zone() {
        let mut actuation = Actuation::new();
        let transitions = run(
            &mut actuation,
            &config(true, false, 20),
            &[240, 200, 225, 240, 225, 219, 150],
        );
        // Released at 225 (peak 200), peak rises to 240, pressed at 219
        assert_eq!(
            transitions,
            [
                (0, Transition::Press),
                (2, Transition::Release),
                (5, Transition::Press)
            ]
        );
        assert_eq!(actuation.rapid_trigger_peak(), 150);
    }

    #[test]
    fn rapid_trigger_releases_on_leaving_zone() {
        let mut actuation = Actuation::new();
        let transitions = run(&mut actuation, &config(true, false, 100), &[240, 300, 240]);
        assert_eq!(
            transitions,
            [
                (0, Transition::Press),
                (1, Transition::Release),
                (2, Transition::Press)
            ]
        );
    }

    #[test]
    fn continuous_rapid_trigger_stays_in_zone() {
        let mut actuation = Actuation::new();
        let config = config(true, true, 20);
        let transitions = run(&mut actuation, &config, &[240, 200, 320, 380, 350]);
        // Above the upper hysteresis but still inside the zone: 350 is 30 under the 380 peak
        assert_eq!(
            transitions,
            [
                (0, Transition::Press),
                (2, Transition::Release),
                (4, Transition::Press)
            ]
        );
        assert!(actuation.in_rapid_trigger_zone());

        // 390 is within the release threshold of full travel
        let transitions = run(&mut actuation, &config, &[390]);
        assert_eq!(transitions, [(0, Transition::Release)]);
        assert!(!actuation.in_rapid_trigger_zone());
        assert_eq!(actuation.state(), ActuationState::Released);

        // Outside the zone only the lower hysteresis presses
        let transitions = run(&mut actuation, &config, &[300, 260, 250]);
        assert_eq!(transitions, [(2, Transition::Press)]);
    }

    #[test]
    fn peak_follows_direction() {
        let mut actuation = Actuation::new();
        let config = config(true, false, 50);
        let mut peaks = Vec::new();
        for distance in [240, 230, 235, 180, 190, 150] {
            run(&mut actuation, &config, &[distance]);
            peaks.push(actuation.rapid_trigger_peak());
        }
        // Non-increasing while the key stays pressed
        assert_eq!(peaks, [240, 230, 230, 180, 180, 150]);
        assert!(actuation.is_pressed());

        // Released 50 above the 150 peak, then the peak tracks the maximum
        run(&mut actuation, &config, &[200]);
        assert!(!actuation.is_pressed());
        assert_eq!(actuation.rapid_trigger_peak(), 200);
        run(&mut actuation, &config, &[190, 240]);
        assert_eq!(actuation.rapid_trigger_peak(), 240);
    }

    #[test]
    fn no_wrap_at_zero_distance() {
        let config = config(true, false, 400);
        let mut actuation = Actuation::new();
        // Pressed at 0, peak 0
        assert_eq!(run(&mut actuation, &config, &[0]), [(0, Transition::Press)]);
        assert_eq!(actuation.rapid_trigger_peak(), 0);
        // 0 + 400 > 0 must not look like a release, and 0 < 400 no re-press
        assert!(run(&mut actuation, &config, &[0, 0]).is_empty());
        assert!(actuation.is_pressed());
        // Released only once up by the full sensitivity, which leaves the zone first
        assert_eq!(
            run(&mut actuation, &config, &[300]),
            [(0, Transition::Release)]
        );
        // Fresh zone entry at 0
        assert_eq!(run(&mut actuation, &config, &[0]), [(0, Transition::Press)]);
    }

    #[test]
    fn no_wrap_with_untouched_peak() {
        let config = config(true, false, 400);
        let mut actuation = Actuation::new();
        // Peak still u16::MAX, distance outside zone: peak + up must not overflow
        assert!(run(&mut actuation, &config, &[400, 280, 260]).is_empty());
        assert_eq!(actuation.rapid_trigger_peak(), u16::MAX);
    }

    #[test]
    fn down_sensitivity_from_zero_peak() {
        // Released near the bottom with a large down sensitivity
        let mut config = config(true, true, 10);
        config.rapid_trigger_down_sensitivity = 400;
        let mut actuation = Actuation::new();
        run(&mut actuation, &config, &[0, 10]);
        assert!(!actuation.is_pressed());
        assert_eq!(actuation.rapid_trigger_peak(), 10);
        // 0 + 400 <= 10 is false, no press
        assert!(run(&mut actuation, &config, &[0]).is_empty());
        assert!(!actuation.is_pressed());
    }

    #[test]
    fn disabled_hid_blocks_press_not_release() {
        let mut config = config(false, false, 20);
        let mut actuation = Actuation::new();
        assert_eq!(run(&mut actuation, &config, &[200]), [(0, Transition::Press)]);

        config.hid_enabled = false;
        assert_eq!(run(&mut actuation, &config, &[350]), [(0, Transition::Release)]);
        assert!(run(&mut actuation, &config, &[200, 350, 200]).is_empty());
        assert!(!actuation.is_pressed());

        config.hid_enabled = true;
        assert_eq!(run(&mut actuation, &config, &[200]), [(0, Transition::Press)]);
    }

    #[test]
    fn rapid_trigger_disabled_hid_tracks_peak() {
        let mut config = config(true, false, 20);
        config.hid_enabled = false;
        let mut actuation = Actuation::new();
        // Enters the zone without pressing, then rises
        assert!(run(&mut actuation, &config, &[240, 290]).is_empty());
        assert!(actuation.in_rapid_trigger_zone());
        assert_eq!(actuation.rapid_trigger_peak(), 290);

        // Hovering after HID comes back is not a press
        config.hid_enabled = true;
        assert!(run(&mut actuation, &config, &[290, 285]).is_empty());
        assert!(!actuation.is_pressed());
        // Falling the down sensitivity from the peak is
        assert_eq!(run(&mut actuation, &config, &[270]), [(0, Transition::Press)]);
        assert_eq!(actuation.rapid_trigger_peak(), 270);
    }

    #[test]
    fn mode_switch_mid_press() {
        let mut config = config(false, false, 20);
        let mut actuation = Actuation::new();
        run(&mut actuation, &config, &[200]);
        assert_eq!(actuation.state(), ActuationState::TraditionalPressed);

        config.rapid_trigger = true;
        // Not in the zone, so rapid trigger releases the held key
        assert_eq!(run(&mut actuation, &config, &[270]), [(0, Transition::Release)]);
    }
}
