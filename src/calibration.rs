//! Runtime calibration of the sensor range of an analog key.
//!
//! Readings are expected to drop as the key is pressed. The rest position
//! follows the highest reading seen and the down position the lowest one,
//! each pulled inwards by a deadzone so that noise at the extremes still maps
//! onto the ends of the travel.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Boundaries {
    rest_position: u16,
    down_position: u16,
    calibrated: bool,
}

impl Boundaries {
    /// Widest possible range for a sensor with `adc_max` as its top reading.
    /// Any real reading tightens it.
    pub const fn uncalibrated(adc_max: u16) -> Self {
        Self {
            rest_position: 0,
            down_position: adc_max,
            calibrated: false,
        }
    }

    #[cfg(test)]
    pub(crate) const fn fixed(rest_position: u16, down_position: u16) -> Self {
        Self {
            rest_position,
            down_position,
            calibrated: down_position < rest_position,
        }
    }

    pub fn rest_position(&self) -> u16 {
        self.rest_position
    }

    pub fn down_position(&self) -> u16 {
        self.down_position
    }

    /// Whether the down position has been pulled under the rest position by
    /// at least the minimum span
    pub fn calibrated(&self) -> bool {
        self.calibrated
    }

    /// Widens the range with a filtered reading.
    ///
    /// The rest position only ever rises and the down position only ever
    /// falls. A new down position is only accepted while it stays
    /// `min_span` below the rest position.
    pub fn update(&mut self, value: u16, deadzone: u16, min_span: u16) {
        let upper = value as i32 - deadzone as i32;
        let lower = value as i32 + deadzone as i32;

        if upper > self.rest_position as i32 {
            self.rest_position = upper as u16;
        } else if lower < self.down_position as i32
            && self.rest_position as i32 - lower >= min_span as i32
        {
            trace!("down position {} -> {}", self.down_position, lower);
            self.down_position = lower as u16;
            self.calibrated = true;
        }
    }
}
