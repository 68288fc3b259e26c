//! Filtered sensor reading to travel distance.
//!
//! Distances run from 0 (bottomed out) to the full travel (at rest), the way
//! the magnet moves relative to the sensor.

use crate::calibration::Boundaries;
use crate::config::{Tuning, ADC_RANGE};
use crate::lut::GaussLut;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistanceMapper<const SIZE: usize = ADC_RANGE> {
    /// Straight line between down and rest position
    Linear,
    /// Magnetic curve anchored at the rest position and stretched so the
    /// down position lands on full travel
    Gauss(GaussLut<SIZE>),
}

impl<const SIZE: usize> DistanceMapper<SIZE> {
    pub fn new(tuning: &Tuning) -> Self {
        match tuning.gauss_correction {
            Some(params) => Self::Gauss(GaussLut::new(params, tuning.travel_distance)),
            None => Self::Linear,
        }
    }

    /// Distance in `[0, travel]`. Uncalibrated keys always read as fully
    /// released.
    pub fn map(&self, bounds: &Boundaries, value: u16, travel: u16) -> u16 {
        if !bounds.calibrated() {
            return travel;
        }

        match self {
            Self::Linear => linear(bounds, value, travel),
            Self::Gauss(lut) => {
                let rest = bounds.rest_position();
                let full = lut.adc_to_distance(bounds.down_position(), rest);
                if full == 0 {
                    // The curve is flat up to the down position, nothing to stretch
                    return linear(bounds, value, travel);
                }

                let pressed = lut.adc_to_distance(value, rest) as u32 * travel as u32 / full as u32;
                travel - pressed.min(travel as u32) as u16
            }
        }
    }
}

fn linear(bounds: &Boundaries, value: u16, travel: u16) -> u16 {
    let down = bounds.down_position() as i32;
    let rest = bounds.rest_position() as i32;
    if rest <= down {
        return travel;
    }

    let distance = (value as i32 - down) * travel as i32 / (rest - down);
    distance.clamp(0, travel as i32) as u16
}
