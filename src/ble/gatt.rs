//! GATT/GAP layout of the serial-style BLE service.
//!
//! One primary service with two characteristics:
//!
//! | Characteristic | UUID suffix | Properties              | Max length |
//! |----------------|-------------|-------------------------|-----------:|
//! | RX (inbound)   | `0002`      | write without response  |        256 |
//! | TX (outbound)  | `0003`      | notify                  |         20 |

use core::fmt;

use crate::config::{BLE_INBOUND_CAPACITY, BLE_OUTBOUND_CAPACITY, BleConfig};

/// 128-bit UUID stored in canonical (big-endian) byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uuid128(pub [u8; 16]);

impl Uuid128 {
    /// Over-the-air order.
    pub fn to_le_bytes(self) -> [u8; 16] {
        let mut b = self.0;
        b.reverse();
        b
    }
}

impl fmt::Display for Uuid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

const fn nus_uuid(short: u8) -> Uuid128 {
    Uuid128([
        0x71, 0x3d, 0x00, short, 0x50, 0x3e, 0x4c, 0x75, 0xba, 0x94, 0x31, 0x48, 0xf1, 0x8d, 0x94, 0x1e,
    ])
}

pub const SERVICE_UUID: Uuid128 = nus_uuid(0x00);
pub const RX_CHAR_UUID: Uuid128 = nus_uuid(0x02);
pub const TX_CHAR_UUID: Uuid128 = nus_uuid(0x03);

// Characteristic property bits.
pub const PROP_WRITE_WITHOUT_RESPONSE: u8 = 0x04;
pub const PROP_NOTIFY: u8 = 0x10;

// AD types.
const AD_FLAGS: u8 = 0x01;
const AD_UUID128_COMPLETE: u8 = 0x07;
const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;
/// LE general discoverable, BR/EDR not supported.
const FLAGS_LE_ONLY_GENERAL: u8 = 0x06;

/// Legacy advertising PDU payload limit.
pub const ADV_PAYLOAD_MAX: usize = 31;

pub type AdvPayload = heapless::Vec<u8, ADV_PAYLOAD_MAX>;

const ADV_HEADER: [u8; 5] = [0x02, AD_FLAGS, FLAGS_LE_ONLY_GENERAL, 0x11, AD_UUID128_COMPLETE];
const _: () = assert!(ADV_HEADER.len() + 16 <= ADV_PAYLOAD_MAX);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicSpec {
    pub uuid: Uuid128,
    pub properties: u8,
    pub max_len: usize,
}

/// Everything the transport needs for one-time registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattLayout<'a> {
    pub device_name: &'a str,
    pub service: Uuid128,
    pub rx: CharacteristicSpec,
    pub tx: CharacteristicSpec,
    pub adv_interval: u16,
    pub conn_interval_min: u16,
    pub conn_interval_max: u16,
    pub slave_latency: u16,
    pub supervision_timeout: u16,
}

impl<'a> GattLayout<'a> {
    pub fn from_config(cfg: &'a BleConfig) -> Self {
        Self {
            device_name: cfg.device_name.as_str(),
            service: SERVICE_UUID,
            rx: CharacteristicSpec {
                uuid: RX_CHAR_UUID,
                properties: PROP_WRITE_WITHOUT_RESPONSE,
                max_len: BLE_INBOUND_CAPACITY,
            },
            tx: CharacteristicSpec {
                uuid: TX_CHAR_UUID,
                properties: PROP_NOTIFY,
                max_len: BLE_OUTBOUND_CAPACITY,
            },
            adv_interval: cfg.adv_interval,
            conn_interval_min: cfg.conn_interval_min,
            conn_interval_max: cfg.conn_interval_max,
            slave_latency: cfg.slave_latency,
            supervision_timeout: cfg.supervision_timeout,
        }
    }

    /// Flags plus the complete 128-bit service UUID list.
    pub fn adv_data(&self) -> AdvPayload {
        let mut out = AdvPayload::new();
        let stored = out
            .extend_from_slice(&ADV_HEADER)
            .and_then(|()| out.extend_from_slice(&self.service.to_le_bytes()));
        debug_assert!(stored.is_ok(), "advertising data over {ADV_PAYLOAD_MAX} bytes");
        out
    }

    /// Complete local name.  Names longer than the PDU allows are cut.
    pub fn scan_response(&self) -> AdvPayload {
        let name = self.device_name.as_bytes();
        let name = &name[..name.len().min(ADV_PAYLOAD_MAX - 2)];
        let mut out = AdvPayload::new();
        let stored = out
            .extend_from_slice(&[name.len() as u8 + 1, AD_COMPLETE_LOCAL_NAME])
            .and_then(|()| out.extend_from_slice(name));
        debug_assert!(stored.is_ok(), "scan response over {ADV_PAYLOAD_MAX} bytes");
        out
    }
}
