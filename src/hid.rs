//! Keyboard output

use heapless::Vec;
#[doc(hidden)]
pub use paste::paste;
pub use usbd_human_interface_device::page::Keyboard;

/// Receives press and release events. The engine calls `flush` once per scan
/// after every key has been processed.
pub trait HidSink {
    fn press(&mut self, key: char);
    fn release(&mut self, key: char);
    fn flush(&mut self);
}

macro_rules! usage_table {
    (letters: $($letter:ident)*; digits: $($digit:literal)*;) => {
        /// Keyboard usage for an ASCII letter or digit
        pub fn keyboard_usage(key: char) -> Option<Keyboard> {
            let key = key.to_ascii_lowercase() as u32;
            $(
                if key == stringify!($letter).as_bytes()[0] as u32 {
                    return Some(paste! { Keyboard::[<$letter:upper>] });
                }
            )*
            $(
                if key == stringify!($digit).as_bytes()[0] as u32 {
                    return Some(paste! { Keyboard::[<Keyboard $digit>] });
                }
            )*
            None
        }
    };
}

usage_table! {
    letters: a b c d e f g h i j k l m n o p q r s t u v w x y z;
    digits: 0 1 2 3 4 5 6 7 8 9;
}

#[derive(Debug, Default)]
pub struct ReportFlags {
    /// A press was dropped because `ROLLOVER` keys were already held
    pub rollover: bool,
}

/// Collects the held keys of one scan and publishes them as a report on
/// `flush`.
///
/// Keys sharing a character share a usage, which stays held until every one
/// of them is released.
#[derive(Debug, Default)]
pub struct ReportBuffer<const ROLLOVER: usize> {
    /// Usage and number of keys holding it
    held: Vec<(Keyboard, u8), ROLLOVER>,
    report: Vec<Keyboard, ROLLOVER>,
    pub flags: ReportFlags,
}

impl<const ROLLOVER: usize> ReportBuffer<ROLLOVER> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of the last flushed report
    pub fn report(&self) -> &[Keyboard] {
        &self.report
    }
}

impl<const ROLLOVER: usize> HidSink for ReportBuffer<ROLLOVER> {
    fn press(&mut self, key: char) {
        let Some(usage) = keyboard_usage(key) else {
            warn!("no keyboard usage for {}", key);
            return;
        };
        if let Some((_, count)) = self.held.iter_mut().find(|(held, _)| *held == usage) {
            *count = count.saturating_add(1);
            return;
        }
        if self.held.push((usage, 1)).is_err() {
            self.flags.rollover = true;
        }
    }

    fn release(&mut self, key: char) {
        let Some(usage) = keyboard_usage(key) else {
            return;
        };
        if let Some(index) = self.held.iter().position(|(held, _)| *held == usage) {
            let count = &mut self.held[index].1;
            *count -= 1;
            if *count == 0 {
                self.held.remove(index);
            }
        }
    }

    fn flush(&mut self) {
        self.report.clear();
        self.report.extend(self.held.iter().map(|(usage, _)| *usage));
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn usages() {
        assert_eq!(keyboard_usage('a'), Some(Keyboard::A));
        assert_eq!(keyboard_usage('Z'), Some(Keyboard::Z));
        assert_eq!(keyboard_usage('x'), Some(Keyboard::X));
        assert_eq!(keyboard_usage('0'), Some(Keyboard::Keyboard0));
        assert_eq!(keyboard_usage('7'), Some(Keyboard::Keyboard7));
        assert_eq!(keyboard_usage('%'), None);
        assert_eq!(keyboard_usage(' '), None);
    }

    #[test]
    fn report_waits_for_flush() {
        let mut buffer = ReportBuffer::<4>::new();
        buffer.press('z');
        assert!(buffer.report().is_empty());
        buffer.flush();
        assert_eq!(buffer.report(), [Keyboard::Z]);

        buffer.press('x');
        buffer.release('z');
        assert_eq!(buffer.report(), [Keyboard::Z]);
        buffer.flush();
        assert_eq!(buffer.report(), [Keyboard::X]);
    }

    #[test]
    fn repeated_press_is_held_once() {
        let mut buffer = ReportBuffer::<4>::new();
        buffer.press('z');
        buffer.press('Z');
        buffer.flush();
        assert_eq!(buffer.report(), [Keyboard::Z]);
    }

    #[test]
    fn shared_usage_held_until_last_release() {
        let mut buffer = ReportBuffer::<4>::new();
        buffer.press('z');
        buffer.press('z');
        buffer.release('z');
        buffer.flush();
        assert_eq!(buffer.report(), [Keyboard::Z]);

        buffer.release('z');
        buffer.flush();
        assert!(buffer.report().is_empty());
        // Nothing left to release
        buffer.release('z');
        buffer.press('z');
        buffer.flush();
        assert_eq!(buffer.report(), [Keyboard::Z]);
    }

    #[test]
    fn rollover_sets_flag() {
        let mut buffer = ReportBuffer::<2>::new();
        buffer.press('a');
        buffer.press('b');
        assert!(!buffer.flags.rollover);
        buffer.press('c');
        assert!(buffer.flags.rollover);
        buffer.flush();
        assert_eq!(buffer.report(), [Keyboard::A, Keyboard::B]);
    }

    #[test]
    fn unknown_release_is_ignored() {
        let mut buffer = ReportBuffer::<2>::new();
        buffer.press('a');
        buffer.release('%');
        buffer.release('b');
        buffer.flush();
        assert_eq!(buffer.report(), [Keyboard::A]);
    }
}
