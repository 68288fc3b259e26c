//! Simple moving average over a power-of-two window

/// Moving average over the last `SAMPLES` readings of one analog channel.
///
/// `SAMPLES` has to be a power of two so the average is a shift instead of a
/// division. Until the window has been filled once the output is dragged
/// towards zero by the empty slots, which is what [`SampleFilter::initialized`]
/// reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFilter<const SAMPLES: usize> {
    buffer: [u16; SAMPLES],
    index: usize,
    sum: u32,
    initialized: bool,
}

impl<const SAMPLES: usize> SampleFilter<SAMPLES> {
    const EXPONENT: u32 = {
        assert!(SAMPLES.is_power_of_two(), "window must be a power of two");
        assert!(SAMPLES <= 1 << 16, "window too large for the running sum");
        SAMPLES.trailing_zeros()
    };

    pub const fn new() -> Self {
        Self {
            buffer: [0; SAMPLES],
            index: 0,
            sum: 0,
            initialized: false,
        }
    }

    /// Feeds one reading and returns the current average
    pub fn push(&mut self, value: u16) -> u16 {
        let evicted = core::mem::replace(&mut self.buffer[self.index], value);
        self.sum = self.sum - evicted as u32 + value as u32;

        self.index += 1;
        if self.index == SAMPLES {
            self.index = 0;
            self.initialized = true;
        }

        (self.sum >> Self::EXPONENT) as u16
    }

    /// Whether every slot has been written at least once
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub const fn exponent() -> u32 {
        Self::EXPONENT
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl<const SAMPLES: usize> Default for SampleFilter<SAMPLES> {
    fn default() -> Self {
        Self::new()
    }
}
