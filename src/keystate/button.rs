use crate::hid::HidSink;

use super::Transition;

/// Logical pressed state of a key, shared by analog and digital keys.
///
/// A press only goes through while HID is enabled on the key, a release
/// always does: turning HID off while the key is held must not leave it stuck
/// down on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonState {
    #[default]
    Unpressed,
    Pressed,
}

impl ButtonState {
    pub fn is_pressed(&self) -> bool {
        matches!(self, ButtonState::Pressed)
    }

    pub fn press<H: HidSink + ?Sized>(
        &mut self,
        key_char: char,
        hid_enabled: bool,
        hid: &mut H,
    ) -> Option<Transition> {
        match self {
            ButtonState::Unpressed if hid_enabled => {
                hid.press(key_char);
                *self = ButtonState::Pressed;
                Some(Transition::Press)
            }
            _ => None,
        }
    }

    pub fn release<H: HidSink + ?Sized>(&mut self, key_char: char, hid: &mut H) -> Option<Transition> {
        match self {
            ButtonState::Pressed => {
                hid.release(key_char);
                *self = ButtonState::Unpressed;
                Some(Transition::Release)
            }
            ButtonState::Unpressed => None,
        }
    }
}
