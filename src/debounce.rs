//! Debouncing of digital switches.
//!
//! Contacts chatter when they close, not when they open, so only presses are
//! rate limited. A release goes through on the first low reading.

use crate::config::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Press,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Debouncer {
    last_press: Option<Instant>,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self { last_press: None }
    }

    pub fn last_press(&self) -> Option<Instant> {
        self.last_press
    }

    /// What the key should do given the pin level at `now`.
    ///
    /// A high pin yields a press at most once per `delay`. Whether the press
    /// actually changes anything is up to the caller, the window restarts
    /// either way.
    pub fn update(&mut self, high: bool, now: Instant, delay: Duration) -> Option<Edge> {
        if !high {
            return Some(Edge::Release);
        }

        match self.last_press {
            Some(last) if now.saturating_sub(last) < delay => None,
            _ => {
                self.last_press = Some(now);
                Some(Edge::Press)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    const DELAY: Duration = 50;

    #[test]
    fn first_press_is_immediate() {
        let mut debouncer = Debouncer::new();
        assert_eq!(debouncer.update(true, 0, DELAY), Some(Edge::Press));
        assert_eq!(debouncer.last_press(), Some(0));
    }

    #[test]
    fn chatter_inside_window_is_ignored() {
        let mut debouncer = Debouncer::new();
        assert_eq!(debouncer.update(true, 100, DELAY), Some(Edge::Press));
        assert_eq!(debouncer.update(true, 101, DELAY), None);
        assert_eq!(debouncer.update(true, 149, DELAY), None);
        assert_eq!(debouncer.last_press(), Some(100));
        assert_eq!(debouncer.update(true, 150, DELAY), Some(Edge::Press));
        assert_eq!(debouncer.last_press(), Some(150));
    }

    #[test]
    fn release_is_immediate() {
        let mut debouncer = Debouncer::new();
        debouncer.update(true, 100, DELAY);
        assert_eq!(debouncer.update(false, 101, DELAY), Some(Edge::Release));
        // The press window is not reset by a release
        assert_eq!(debouncer.update(true, 102, DELAY), None);
    }

    #[test]
    fn clock_going_backwards_does_not_underflow() {
        let mut debouncer = Debouncer::new();
        debouncer.update(true, 100, DELAY);
        assert_eq!(debouncer.update(true, 10, DELAY), None);
    }
}
