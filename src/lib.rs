//! Analog hall effect keypad: turns raw sensor readings into key presses
#![no_std]

#[macro_use]
mod fmt;

pub mod calibration;
pub mod config;
pub mod debounce;
pub mod distance;
pub mod engine;
pub mod filter;
pub mod hid;
pub mod keystate;
pub mod lut;
pub mod sensor;
pub mod snapshot;
pub mod store;
pub mod telemetry;

pub use engine::{Clock, KeyReport, Keypad, Layout};
