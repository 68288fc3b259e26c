//! Reads the hall effect sensors and the digital switches

use core::fmt;
use core::marker::PhantomData;

use embedded_hal::adc::{Channel, OneShot};
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use heapless::Vec;

/// Where the engine gets its readings from. Analog and digital keys are each
/// numbered from 0, see [`crate::keystate::KeyRegistry`].
pub trait Sensor {
    type Error;

    /// Raw ADC reading of an analog key
    fn read_raw(&mut self, channel: u8) -> Result<u16, Self::Error>;

    /// Whether a digital key's pin is high
    fn read_digital(&mut self, channel: u8) -> Result<bool, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError<PE, AE> {
    Pin(PE),
    Adc(AE),
    /// No sensor on this channel
    Channel(u8),
}

impl<PE: fmt::Debug, AE: fmt::Debug> fmt::Display for SensorError<PE, AE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Pin(err) => write!(f, "pin error {:?}", err),
            SensorError::Adc(err) => write!(f, "adc error {:?}", err),
            SensorError::Channel(channel) => write!(f, "no sensor on channel {}", channel),
        }
    }
}

/// One ADC input behind a binary addressed analog multiplexer.
///
/// Select pin `i` carries bit `i` of the channel number, so `SELECT` pins
/// address `2^SELECT` sensors.
pub struct AnalogMux<AdcT, Adc, AdcPin, SelectPin, Delay, const SELECT: usize> {
    adc: Adc,
    adc_pin: AdcPin,
    select: Vec<SelectPin, SELECT>,
    delay: Delay,
    settle_us: u8,
    current: Option<u8>,
    _adc: PhantomData<AdcT>,
}

impl<AdcT, Adc, AdcPin, SelectPin, Delay, PE, const SELECT: usize>
    AnalogMux<AdcT, Adc, AdcPin, SelectPin, Delay, SELECT>
where
    Adc: OneShot<AdcT, u16, AdcPin>,
    AdcPin: Channel<AdcT>,
    SelectPin: OutputPin<Error = PE>,
    Delay: DelayUs<u8>,
{
    pub fn new(
        adc: Adc,
        adc_pin: AdcPin,
        select: Vec<SelectPin, SELECT>,
        delay: Delay,
        settle_us: u8,
    ) -> Self {
        Self {
            adc,
            adc_pin,
            select,
            delay,
            settle_us,
            current: None,
            _adc: PhantomData,
        }
    }

    /// Number of sensors the select pins can address
    pub fn channels(&self) -> usize {
        1 << self.select.len()
    }

    fn select(&mut self, channel: u8) -> Result<(), PE> {
        if self.current == Some(channel) {
            return Ok(());
        }
        // Invalidated first so a failed switch is retried next time
        self.current = None;
        for (bit, pin) in self.select.iter_mut().enumerate() {
            pin.set_state(((channel >> bit) & 1 == 1).into())?;
        }
        self.delay.delay_us(self.settle_us);
        self.current = Some(channel);
        Ok(())
    }

    pub fn read(&mut self, channel: u8) -> Result<u16, SensorError<PE, Adc::Error>> {
        if channel as usize >= self.channels() {
            return Err(SensorError::Channel(channel));
        }
        self.select(channel).map_err(SensorError::Pin)?;
        nb::block!(self.adc.read(&mut self.adc_pin)).map_err(SensorError::Adc)
    }

    pub fn release(self) -> (Adc, AdcPin, Vec<SelectPin, SELECT>, Delay) {
        (self.adc, self.adc_pin, self.select, self.delay)
    }
}

/// Digital switches, one input pin each
pub struct DigitalPins<InputPinT, const DIGITAL: usize> {
    inputs: Vec<InputPinT, DIGITAL>,
}

impl<E, InputPinT: InputPin<Error = E>, const DIGITAL: usize> DigitalPins<InputPinT, DIGITAL> {
    pub fn new(inputs: Vec<InputPinT, DIGITAL>) -> Self {
        Self { inputs }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn read<AE>(&mut self, channel: u8) -> Result<bool, SensorError<E, AE>> {
        self.inputs
            .get(channel as usize)
            .ok_or(SensorError::Channel(channel))?
            .is_high()
            .map_err(SensorError::Pin)
    }
}

/// The analog mux and the digital pins of one pad, as a single [`Sensor`]
pub struct PadSensor<
    AdcT,
    Adc,
    AdcPin,
    SelectPin,
    Delay,
    InputPinT,
    const SELECT: usize,
    const DIGITAL: usize,
> {
    pub analog: AnalogMux<AdcT, Adc, AdcPin, SelectPin, Delay, SELECT>,
    pub digital: DigitalPins<InputPinT, DIGITAL>,
}

impl<AdcT, Adc, AdcPin, SelectPin, Delay, InputPinT, E, const SELECT: usize, const DIGITAL: usize>
    Sensor for PadSensor<AdcT, Adc, AdcPin, SelectPin, Delay, InputPinT, SELECT, DIGITAL>
where
    Adc: OneShot<AdcT, u16, AdcPin>,
    AdcPin: Channel<AdcT>,
    SelectPin: OutputPin<Error = E>,
    InputPinT: InputPin<Error = E>,
    Delay: DelayUs<u8>,
{
    type Error = SensorError<E, Adc::Error>;

    fn read_raw(&mut self, channel: u8) -> Result<u16, Self::Error> {
        self.analog.read(channel)
    }

    fn read_digital(&mut self, channel: u8) -> Result<bool, Self::Error> {
        self.digital.read(channel)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::convert::Infallible;
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    struct MockAdc;

    /// Returns `1000 + 10 * selected channel`, or blocks once when asked to
    struct MockAdcUnit {
        selected: Rc<Cell<u8>>,
        busy: bool,
        reads: usize,
    }

    struct MockAdcPin;

    impl Channel<MockAdc> for MockAdcPin {
        type ID = u8;

        fn channel() -> u8 {
            0
        }
    }

    impl OneShot<MockAdc, u16, MockAdcPin> for MockAdcUnit {
        type Error = ();

        fn read(&mut self, _pin: &mut MockAdcPin) -> nb::Result<u16, ()> {
            if self.busy {
                self.busy = false;
                return Err(nb::Error::WouldBlock);
            }
            self.reads += 1;
            Ok(1000 + 10 * self.selected.get() as u16)
        }
    }

    struct SelectPin {
        bit: u8,
        selected: Rc<Cell<u8>>,
    }

    impl OutputPin for SelectPin {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.selected.set(self.selected.get() & !(1 << self.bit));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.selected.set(self.selected.get() | 1 << self.bit);
            Ok(())
        }
    }

    struct Input(bool);

    impl InputPin for Input {
        type Error = Infallible;

        fn is_high(&self) -> Result<bool, Infallible> {
            Ok(self.0)
        }

        fn is_low(&self) -> Result<bool, Infallible> {
            Ok(!self.0)
        }
    }

    #[derive(Default)]
    struct CountingDelay(Rc<Cell<u32>>);

    impl DelayUs<u8> for CountingDelay {
        fn delay_us(&mut self, us: u8) {
            self.0.set(self.0.get() + us as u32);
        }
    }

    type Mux = AnalogMux<MockAdc, MockAdcUnit, MockAdcPin, SelectPin, CountingDelay, 4>;

    fn mux(busy: bool) -> (Mux, Rc<Cell<u32>>) {
        let selected = Rc::new(Cell::new(0));
        let select = (0..4)
            .map(|bit| SelectPin {
                bit,
                selected: selected.clone(),
            })
            .collect();
        let waited = Rc::new(Cell::new(0));
        let adc = MockAdcUnit {
            selected,
            busy,
            reads: 0,
        };
        (
            AnalogMux::new(adc, MockAdcPin, select, CountingDelay(waited.clone()), 5),
            waited,
        )
    }

    #[test]
    fn mux_addresses_channels() {
        let (mut mux, _) = mux(false);
        assert_eq!(mux.channels(), 16);
        assert_eq!(mux.read(0), Ok(1000));
        assert_eq!(mux.read(5), Ok(1050));
        assert_eq!(mux.read(15), Ok(1150));
        assert_eq!(mux.read(16), Err(SensorError::Channel(16)));
    }

    #[test]
    fn mux_waits_only_when_switching() {
        let (mut mux, waited) = mux(false);
        mux.read(3).unwrap();
        mux.read(3).unwrap();
        assert_eq!(waited.get(), 5);
        mux.read(4).unwrap();
        assert_eq!(waited.get(), 10);
    }

    #[test]
    fn mux_blocks_on_busy_adc() {
        let (mut mux, _) = mux(true);
        assert_eq!(mux.read(1), Ok(1010));
        let (adc, _, _, _) = mux.release();
        assert_eq!(adc.reads, 1);
    }

    #[test]
    fn digital_pins() {
        let mut pins = DigitalPins::<_, 2>::new([Input(true), Input(false)].into_iter().collect());
        assert_eq!(pins.len(), 2);
        assert_eq!(pins.read::<()>(0), Ok(true));
        assert_eq!(pins.read::<()>(1), Ok(false));
        assert_eq!(pins.read::<()>(2), Err(SensorError::Channel(2)));
    }

    #[test]
    fn pad_sensor() {
        let (analog, _) = mux(false);
        let mut sensor = PadSensor {
            analog,
            digital: DigitalPins::<_, 1>::new([Input(true)].into_iter().collect()),
        };
        assert_eq!(sensor.read_raw(2), Ok(1020));
        assert_eq!(sensor.read_digital(0), Ok(true));
        assert_eq!(sensor.read_digital(1), Err(SensorError::Channel(1)));
    }
}
