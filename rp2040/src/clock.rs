//! Time from the RP2040 timer peripheral
use hallpad::engine::Clock;
use rp2040_hal::fugit;
use rp2040_hal::pac;

pub type Instant = fugit::Instant<u64, 1, 1_000_000>;
pub type Duration = fugit::Duration<u64, 1, 1_000_000>;

/// Microseconds since boot. The timer must be out of reset, which
/// `hal::Timer::new` takes care of.
pub fn now() -> Instant {
    // Safety: only reads the free running raw counter, which has no side
    // effects and is safe to do from both cores
    let timer = unsafe { &*pac::TIMER::ptr() };
    Instant::from_ticks(loop {
        let high = timer.timerawh.read().bits();
        let low = timer.timerawl.read().bits();
        // Retry if the low word wrapped between the reads
        if high == timer.timerawh.read().bits() {
            break ((high as u64) << 32) | (low as u64);
        }
    })
}

/// Millisecond clock for the keypad debouncers
pub struct TimerClock;

impl Clock for TimerClock {
    fn now(&self) -> u64 {
        now().duration_since_epoch().to_millis()
    }
}
