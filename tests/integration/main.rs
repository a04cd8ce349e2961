//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against simulated or mock adapters.  All tests run on the host with no
//! real hardware required.

mod ble_tests;
mod interrupt_tests;
mod mock_hw;
mod peripheral_tests;
mod socket_tests;
