//! Duo binding layer library.
//!
//! Fixed-capacity resource pools, interrupt registry, BLE link state and
//! peripheral bindings that sit between a scripting runtime and the board
//! HAL.  Hardware is reached only through the traits in [`app::ports`];
//! ESP-IDF-specific adapters are guarded by `#[cfg(target_os = "espidf")]`.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod ble;
pub mod config;
pub mod drivers;
pub mod error;
pub mod interrupts;
pub mod payload;
pub mod pins;
pub mod sockets;

pub use error::{Error, ErrorKind, Result};
