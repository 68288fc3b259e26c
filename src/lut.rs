//! Gauss correction lookup table.
//!
//! The field of a magnet falls off non-linearly with distance, so mapping the
//! sensor range linearly onto the switch travel bunches the actuation points
//! up at one end. The table inverts a fitted curve
//!
//! ```text
//! adc(x) = a * (1 - e^(-b * (x + c))) - d
//! ```
//!
//! where `a` stretches y, `b` stretches x, `c` offsets x and `d` offsets y.
//! Entry `i` holds the travel distance for ADC reading `i` on a key whose rest
//! position sits exactly where the curve puts it; other keys shift the lookup
//! by the difference between their measured rest position and that ideal one.

/// Constants of the fitted curve. A sensor whose reading drops as the key
/// goes down needs a negative `b` and `c`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GaussParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl GaussParams {
    /// Fit for a 12-bit ADC reading ~1800 at rest and ~1100 when bottomed out
    /// over a 4.00mm switch.
    pub const DEFAULT: Self = Self {
        a: 3000.0,
        b: -0.001148,
        c: -798.0,
        d: 0.0,
    };

    /// Distance the curve predicts for `adc`, not clamped
    fn distance(&self, adc: f64) -> f64 {
        libm::log(1.0 - (adc + self.d) / self.a) / -self.b - self.c
    }

    /// Reading the curve predicts with the magnet at zero distance
    fn ideal_rest(&self) -> f64 {
        self.a * (1.0 - libm::exp(-self.b * self.c)) - self.d
    }
}

impl Default for GaussParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaussLut<const SIZE: usize> {
    table: [u16; SIZE],
    ideal_rest: u16,
}

impl<const SIZE: usize> GaussLut<SIZE> {
    const LAST: usize = {
        assert!(SIZE > 0, "empty lookup table");
        SIZE - 1
    };

    pub fn new(params: GaussParams, travel_distance: u16) -> Self {
        let mut table = [0; SIZE];

        // Readings at or above `a - d` are past the asymptote and stay 0
        if params.a > 0.0 && params.b != 0.0 {
            let end = libm::ceil(params.a - params.d).clamp(0.0, SIZE as f64) as usize;
            for (i, entry) in table.iter_mut().enumerate().take(end) {
                // NaN saturates to 0 on the cast
                *entry = params
                    .distance(i as f64)
                    .clamp(0.0, travel_distance as f64) as u16;
            }
        }

        let ideal_rest = params.ideal_rest().clamp(0.0, Self::LAST as f64) as u16;
        debug!("gauss lut built, ideal rest {}", ideal_rest);

        Self { table, ideal_rest }
    }

    pub fn ideal_rest(&self) -> u16 {
        self.ideal_rest
    }

    /// Travel distance for `adc` on a key resting at `rest_position`.
    ///
    /// The shifted index is clamped to the table so a rest position far away
    /// from the fitted one saturates instead of reading past the end.
    pub fn adc_to_distance(&self, adc: u16, rest_position: u16) -> u16 {
        let index = adc as i32 + self.ideal_rest as i32 - rest_position as i32;
        self.table[index.clamp(0, Self::LAST as i32) as usize]
    }
}
