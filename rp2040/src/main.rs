#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_probe as _;

mod clock;
use clock::{now, Duration, TimerClock};

mod pins;
use pins::{LedPin, ANALOG, DIGITAL, KEYS};

use rp_pico as bsp;

use bsp::entry;
use bsp::{hal, hal::pac};
use hal::multicore::{Multicore, Stack};
use hal::sio::Sio;
use hal::Clock as _;

use embedded_hal::digital::v2::OutputPin;

use usb_device::class_prelude::*;
use usb_device::prelude::*;
use usbd_human_interface_device::device::keyboard::NKROBootKeyboardConfig;
use usbd_human_interface_device::prelude::*;

use hallpad::config::Tuning;
use hallpad::hid::ReportBuffer;
use hallpad::snapshot::KeySnapshots;
use hallpad::store::MemoryStore;
use hallpad::telemetry::LogTelemetry;
use hallpad::{Keypad, Layout};

static mut CORE1_STACK: Stack<4096> = Stack::new();

/// Written by the scan loop on core 0, read by the LED loop on core 1
static SNAPSHOTS: KeySnapshots<KEYS> = KeySnapshots::new();

defmt::timestamp!("{} {:us}", Sio::core(), now());

const LAYOUT: Layout = Layout {
    analog: ANALOG,
    digital: DIGITAL,
};

const SCAN_PERIOD: Duration = Duration::millis(1);

#[entry]
fn core0() -> ! {
    let core = pac::CorePeripherals::take().unwrap();
    let mut pac = pac::Peripherals::take().unwrap();
    let mut sio = Sio::new(pac.SIO);

    // Set up the watchdog driver - needed by the clock setup code
    let mut watchdog = hal::watchdog::Watchdog::new(pac.WATCHDOG);
    // Configure the clocks
    let clocks = hal::clocks::init_clocks_and_plls(
        bsp::XOSC_CRYSTAL_FREQ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();
    let sys_clk = clocks.system_clock.freq();

    // Takes the timer out of reset for `clock::now`
    let _timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

    let pins = bsp::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let adc = hal::Adc::new(pac.ADC, &mut pac.RESETS);
    let delay = cortex_m::delay::Delay::new(core.SYST, sys_clk.to_Hz());
    let (sensor, led) = pins::sensor(pins, adc, delay);

    let mut mc = Multicore::new(&mut pac.PSM, &mut pac.PPB, &mut sio.fifo);
    let cores = mc.cores();
    let _task = cores[1].spawn(unsafe { &mut CORE1_STACK.mem }, move || core1(led));

    // USB
    let usb_alloc = UsbBusAllocator::new(hal::usb::UsbBus::new(
        pac.USBCTRL_REGS,
        pac.USBCTRL_DPRAM,
        clocks.usb_clock,
        true,
        &mut pac.RESETS,
    ));

    let mut keyboard = UsbHidClassBuilder::new()
        .add_device(NKROBootKeyboardConfig::default())
        .build(&usb_alloc);

    // https://pid.codes
    let mut usb_device = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .manufacturer("hallpad")
        .product("Hall effect keypad")
        .serial_number("TEST")
        .build();

    let mut keypad: Keypad<_, ReportBuffer<KEYS>, _, _, KEYS> = Keypad::new(
        Tuning::default(),
        LAYOUT,
        sensor,
        ReportBuffer::new(),
        TimerClock,
        LogTelemetry,
    );
    // Settings survive until power off
    let mut store = MemoryStore::<KEYS>::new();
    keypad.boot(&mut store);

    let mut next_scan = now();
    loop {
        if usb_device.poll(&mut [&mut keyboard]) {
            match keyboard.device().read_report() {
                Err(UsbError::WouldBlock) => {}
                Err(e) => {
                    core::panic!("Failed to read keyboard report: {:?}", e)
                }
                Ok(leds) => defmt::debug!("num lock {}", leds.num_lock),
            }
        }

        if now() < next_scan {
            continue;
        }
        next_scan += SCAN_PERIOD;

        keypad.tick();
        keypad.publish(&SNAPSHOTS);

        let hid = keypad.hid_mut();
        if hid.flags.rollover {
            defmt::warn!("more keys held than fit in a report");
            hid.flags.rollover = false;
        }
        let keys = hid.report().iter().copied();
        match keyboard.device().write_report(keys) {
            Err(UsbHidError::WouldBlock) => {}
            Err(UsbHidError::Duplicate) => {}
            Ok(_) => {}
            Err(e) => {
                core::panic!("Failed to write keyboard report: {:?}", e)
            }
        }

        match keyboard.tick() {
            Err(UsbHidError::WouldBlock) => {}
            Ok(_) => {}
            Err(e) => {
                core::panic!("Failed to process keyboard tick: {:?}", e)
            }
        }
    }
}

/// Lights the LED while any key is held. Only reads the published snapshot.
fn core1(mut led: LedPin) -> ! {
    loop {
        // The pin is infallible
        let _ = led.set_state(SNAPSHOTS.any_pressed().into());
        cortex_m::asm::delay(125_000);
    }
}
