//! Board wiring: a 16 channel analog mux in front of ADC0 for the hall
//! effect keys, and plain GPIOs for the digital keys

use rp_pico as bsp;

use bsp::hal;
use bsp::Pins;
use hal::adc::AdcPin;
use hal::gpio::bank0::{Gpio25, Gpio26};
use hal::gpio::{DynPinId, FunctionSioInput, FunctionSioOutput, Pin, PullDown, PullNone};
use heapless::Vec;

use hallpad::sensor::{AnalogMux, DigitalPins, PadSensor};

pub const SELECT: usize = 4;
pub const ANALOG: usize = 1 << SELECT;
pub const DIGITAL: usize = 4;
pub const KEYS: usize = ANALOG + DIGITAL;

/// Time the mux output needs to settle after switching, in us
const SETTLE_US: u8 = 10;

pub type SelectPin = Pin<DynPinId, FunctionSioOutput, PullDown>;
pub type DigitalPin = Pin<DynPinId, FunctionSioInput, PullDown>;
pub type LedPin = Pin<Gpio25, FunctionSioOutput, PullNone>;
type SensorPin = AdcPin<Pin<Gpio26, FunctionSioInput, PullNone>>;

pub type Sensor = PadSensor<
    hal::Adc,
    hal::Adc,
    SensorPin,
    SelectPin,
    cortex_m::delay::Delay,
    DigitalPin,
    SELECT,
    DIGITAL,
>;

/// Splits the pins into the keypad sensor and the status LED
pub fn sensor(pins: Pins, adc: hal::Adc, delay: cortex_m::delay::Delay) -> (Sensor, LedPin) {
    let mut select = Vec::<SelectPin, SELECT>::new();
    select.extend([
        pins.gpio16.reconfigure().into_dyn_pin(),
        pins.gpio17.reconfigure().into_dyn_pin(),
        pins.gpio18.reconfigure().into_dyn_pin(),
        pins.gpio19.reconfigure().into_dyn_pin(),
    ]);

    let mut digital = Vec::<DigitalPin, DIGITAL>::new();
    digital.extend([
        pins.gpio10.reconfigure().into_dyn_pin(),
        pins.gpio11.reconfigure().into_dyn_pin(),
        pins.gpio12.reconfigure().into_dyn_pin(),
        pins.gpio13.reconfigure().into_dyn_pin(),
    ]);

    let adc_pin = AdcPin::new(pins.gpio26.into_floating_input());

    let sensor = PadSensor {
        analog: AnalogMux::new(adc, adc_pin, select, delay, SETTLE_US),
        digital: DigitalPins::new(digital),
    };
    (sensor, pins.led.reconfigure())
}
