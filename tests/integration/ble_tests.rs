//! Integration tests for the BLE link against the simulated stack.

use duoport::adapters::sim::{SIM_RX_HANDLE, SIM_TX_HANDLE, SimBleTransport};
use duoport::app::bindings;
use duoport::app::script::Value;
use duoport::ble::{BleEvent, BleLink, LinkState};
use duoport::config::{BLE_INBOUND_CAPACITY, BleConfig};
use duoport::error::{Error, ErrorKind};
use duoport::payload::Payload;

fn ready_link() -> BleLink<SimBleTransport> {
    let mut link = BleLink::new(SimBleTransport::new());
    link.init(&BleConfig::default()).unwrap();
    link
}

fn gatt_write(link: &BleLink<SimBleTransport>, data: &[u8]) -> duoport::Result<()> {
    link.on_event(BleEvent::GattWrite { value_handle: SIM_RX_HANDLE, data })
}

#[test]
fn connection_lifecycle() {
    let link = ready_link();
    link.begin_advertising().unwrap();
    assert!(link.transport().is_advertising());
    assert_eq!(link.state(), LinkState::Disconnected);

    // A failed connect attempt changes nothing.
    link.on_event(BleEvent::Connected { status: 0x3E, conn_handle: 1 }).unwrap();
    assert!(!link.connected());

    link.on_event(BleEvent::Connected { status: 0, conn_handle: 0x0040 }).unwrap();
    assert_eq!(link.state(), LinkState::Connected);
    assert_eq!(link.connection_handle(), Some(0x0040));
    assert_eq!(bindings::ble_connected(&link), Ok(Value::Bool(true)));

    link.on_event(BleEvent::Disconnected { conn_handle: 0x0040, reason: 0x13 }).unwrap();
    assert!(!link.connected());
    assert_eq!(link.connection_handle(), None);
    assert!(!link.disconnect());
}

#[test]
fn local_disconnect_reaches_the_stack() {
    let link = ready_link();
    link.on_event(BleEvent::Connected { status: 0, conn_handle: 7 }).unwrap();
    assert!(link.disconnect());
    assert_eq!(link.transport().disconnect_requests(), [7]);
    assert_eq!(link.state(), LinkState::Disconnected);
}

#[test]
fn inbound_bytes_are_read_in_order() {
    let link = ready_link();
    gatt_write(&link, &[1, 0, 2]).unwrap();
    gatt_write(&link, b"ab").unwrap();
    assert_eq!(bindings::ble_available(&link), Ok(Value::Int(5)));

    let mut out = Vec::new();
    assert_eq!(link.read(&mut out, 2), 2);
    assert_eq!(link.read(&mut out, 10), 3);
    assert_eq!(out, [1, 0, 2, b'a', b'b']);
    assert_eq!(link.read(&mut out, 10), 0);
}

#[test]
fn overflow_keeps_what_fits() {
    let link = ready_link();
    let fill = vec![0xAA; BLE_INBOUND_CAPACITY - 4];
    gatt_write(&link, &fill).unwrap();

    assert_eq!(gatt_write(&link, &[1, 2, 3, 4, 5, 6]), Err(Error::BufferFull("ble inbound")));
    assert_eq!(link.available(), BLE_INBOUND_CAPACITY);
    assert_eq!(link.dropped_bytes(), 2);

    let mut out = Vec::new();
    link.read(&mut out, BLE_INBOUND_CAPACITY);
    assert_eq!(&out[out.len() - 4..], [1, 2, 3, 4]);
}

#[test]
fn writes_to_other_handles_are_ignored() {
    let link = ready_link();
    link.on_event(BleEvent::GattWrite { value_handle: 0x0099, data: b"zz" }).unwrap();
    assert_eq!(link.available(), 0);
}

#[test]
fn cccd_toggles_notifications() {
    let link = ready_link();
    let cccd = SIM_TX_HANDLE + 1;
    link.on_event(BleEvent::Connected { status: 0, conn_handle: 1 }).unwrap();
    link.on_event(BleEvent::GattWrite { value_handle: cccd, data: &[0x01, 0x00] }).unwrap();
    assert!(link.notifications_enabled());
    link.on_event(BleEvent::GattWrite { value_handle: cccd, data: &[0x00, 0x00] }).unwrap();
    assert!(!link.notifications_enabled());

    link.on_event(BleEvent::GattWrite { value_handle: cccd, data: &[0x01, 0x00] }).unwrap();
    link.on_event(BleEvent::Disconnected { conn_handle: 1, reason: 0x08 }).unwrap();
    assert!(!link.notifications_enabled());
}

#[test]
fn long_write_is_chunked() {
    let link = ready_link();
    let data: Vec<u8> = (0..45).collect();
    assert_eq!(link.write(Payload::Bytes(&data)), Ok(45));

    let sent = link.transport().notifications();
    let sizes: Vec<_> = sent.iter().map(|(_, chunk)| chunk.len()).collect();
    assert_eq!(sizes, [20, 20, 5]);
    assert!(sent.iter().all(|(handle, _)| *handle == SIM_TX_HANDLE));
    let joined: Vec<u8> = sent.into_iter().flat_map(|(_, chunk)| chunk).collect();
    assert_eq!(joined, data);
}

#[test]
fn script_write_takes_strings_and_lists() {
    let link = ready_link();
    assert_eq!(bindings::ble_write(&link, &Value::Str("hi".into())), Ok(Value::Int(2)));
    assert_eq!(bindings::ble_write(&link, &Value::List(vec![0, 255])), Ok(Value::Int(2)));
    let err = bindings::ble_write(&link, &Value::List(vec![256])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);
    assert_eq!(link.transport().notifications().len(), 2);
}

#[test]
fn refused_notify_gives_short_count() {
    let link = ready_link();
    link.transport().refuse_notify(true);
    assert_eq!(link.write(Payload::Text("hello")), Ok(0));
    link.transport().refuse_notify(false);
    assert_eq!(link.write(Payload::Text("hello")), Ok(5));
}

#[test]
fn init_rules() {
    let mut link = BleLink::new(SimBleTransport::new());
    assert_eq!(link.write(Payload::Text("x")).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(link.begin_advertising().unwrap_err().kind(), ErrorKind::InvalidState);

    link.init(&BleConfig::default()).unwrap();
    assert_eq!(link.transport().registered_name().as_deref(), Some("Duo-Python"));
    assert_eq!(link.init(&BleConfig::default()), Err(Error::AlreadyInUse("ble gatt layout")));

    let mut refused = BleLink::new(SimBleTransport::new());
    refused.transport().refuse_register(true);
    assert_eq!(refused.init(&BleConfig::default()).unwrap_err().kind(), ErrorKind::InvalidState);
}

#[test]
fn script_read_appends_bytes() {
    let link = ready_link();
    gatt_write(&link, b"xyz").unwrap();
    let mut out = Vec::new();
    assert_eq!(bindings::ble_read(&link, &mut out, 2), Ok(Value::Int(2)));
    assert_eq!(out, b"xy");
    assert_eq!(bindings::ble_read(&link, &mut out, -1).unwrap_err().kind, ErrorKind::InvalidArgument);
}
