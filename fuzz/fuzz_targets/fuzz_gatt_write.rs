//! Fuzz target: BLE GATT write path
//!
//! Splits the input into GATT writes against the RX, CCCD and stray
//! handles, interleaved with mainline reads, and checks the inbound ring
//! never loses or reorders a byte it accepted.
//!
//! cargo fuzz run fuzz_gatt_write

#![no_main]

use std::collections::VecDeque;

use duoport::adapters::sim::{SIM_RX_HANDLE, SIM_TX_HANDLE, SimBleTransport};
use duoport::ble::{BleEvent, BleLink};
use duoport::config::{BLE_INBOUND_CAPACITY, BleConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut link = BleLink::new(SimBleTransport::new());
    if link.init(&BleConfig::default()).is_err() {
        return;
    }
    let mut model = VecDeque::new();
    let mut rest = data;

    while let Some((&header, tail)) = rest.split_first() {
        let len = usize::from(header & 0x3F).min(tail.len());
        let (chunk, next) = tail.split_at(len);
        rest = next;

        match header >> 6 {
            0 | 1 => {
                let room = BLE_INBOUND_CAPACITY - model.len();
                let res = link.on_event(BleEvent::GattWrite { value_handle: SIM_RX_HANDLE, data: chunk });
                assert_eq!(res.is_err(), chunk.len() > room);
                model.extend(chunk.iter().take(room));
            }
            2 => {
                let _ = link.on_event(BleEvent::GattWrite { value_handle: SIM_TX_HANDLE + 1, data: chunk });
                let _ = link.on_event(BleEvent::GattWrite { value_handle: 0x0001, data: chunk });
            }
            _ => {
                let mut out = Vec::new();
                let n = link.read(&mut out, len);
                assert_eq!(n, out.len());
                let expected: Vec<u8> = model.drain(..n).collect();
                assert_eq!(out, expected);
            }
        }
        assert_eq!(link.available(), model.len());
    }
});
