//! Integration tests for peripheral bindings over `embedded-hal` mocks and
//! the simulated serial ports.

use embedded_hal::i2c::ErrorKind as BusErrorKind;

use duoport::adapters::sim::{SimSpi, SimUart};
use duoport::app::script::Value;
use duoport::drivers::i2c::{I2cBus, TRANSFER_MAX, TransferStatus};
use duoport::drivers::spi::spi_bank;
use duoport::drivers::timer::{self, Pwm};
use duoport::drivers::uart::uart_bank;
use duoport::error::{Error, ErrorKind};
use duoport::payload::Payload;
use duoport::pins::D2;

use crate::mock_hw::{I2cCall, MockDelay, MockI2c, MockPwm};

const SENSOR: u8 = 0x48;

fn bus() -> I2cBus<MockI2c> {
    let mut bus = I2cBus::new(MockI2c::new().with_device(SENSOR, &[0x12, 0x34]));
    bus.init();
    bus
}

// ── I2C ───────────────────────────────────────────────────────

#[test]
fn i2c_requires_init() {
    let mut bus = I2cBus::new(MockI2c::new());
    assert_eq!(bus.send_char(1, 0x10), Err(Error::InvalidState("i2c not initialised")));
    bus.init();
    assert!(bus.is_enabled());
    bus.deinit();
    assert_eq!(bus.recv_char(0x10).unwrap_err().kind(), ErrorKind::InvalidState);
}

#[test]
fn i2c_status_codes() {
    let mut bus = bus();
    assert_eq!(bus.send_char(0x01, i64::from(SENSOR)), Ok(TransferStatus::Success));
    assert_eq!(bus.send_char(0x01, 0x20).map(TransferStatus::code), Ok(2));

    let mut nacking = MockI2c::new().with_device(0x30, &[]);
    nacking.data_nack.push(0x30);
    let mut nacking = I2cBus::new(nacking);
    nacking.init();
    assert_eq!(nacking.send(Payload::Text("hi"), 0x30), Ok(TransferStatus::DataNack));
    assert_eq!(Value::from(TransferStatus::DataNack), Value::Int(3));
}

#[test]
fn i2c_bus_faults_map_to_codes() {
    let mut bus = bus();
    let addr = i64::from(SENSOR);
    let fail = |kind: BusErrorKind| {
        let mut b = I2cBus::new(MockI2c { fail_next: Some(kind), ..MockI2c::new() });
        b.init();
        b.send_char(0, addr)
    };
    assert_eq!(fail(BusErrorKind::Overrun), Ok(TransferStatus::DataTooLong));
    assert_eq!(fail(BusErrorKind::ArbitrationLoss), Ok(TransferStatus::Other));
    assert_eq!(bus.recv_char(addr), Ok(Some(0x12)));
}

#[test]
fn i2c_send_limits() {
    let mut bus = bus();
    let addr = i64::from(SENSOR);
    let max = vec![7u8; TRANSFER_MAX];
    assert_eq!(bus.send(Payload::Bytes(&max), addr), Ok(TransferStatus::Success));
    let long = vec![7u8; TRANSFER_MAX + 1];
    assert_eq!(bus.send(Payload::Bytes(&long), addr), Ok(TransferStatus::DataTooLong));
    assert_eq!(bus.bus().written_to(SENSOR).len(), TRANSFER_MAX);

    assert_eq!(bus.send_char(0, 0x80).unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(bus.send_char(256, addr).unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(
        bus.send(Payload::Values(&[1, -1]), addr).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
}

#[test]
fn i2c_recv_appends_on_success_only() {
    let mut bus = bus();
    let mut out = vec![0xFF];
    assert_eq!(bus.recv(&mut out, i64::from(SENSOR), 3), Ok(TransferStatus::Success));
    assert_eq!(out, [0xFF, 0x12, 0x34, 0x12]);

    assert_eq!(bus.recv(&mut out, 0x21, 2), Ok(TransferStatus::AddressNack));
    assert_eq!(out.len(), 4);
    assert_eq!(bus.recv_char(0x21), Ok(None));

    assert_eq!(
        bus.recv(&mut out, i64::from(SENSOR), TRANSFER_MAX + 1),
        Err(Error::InvalidArgument("i2c read length"))
    );
    assert!(bus.bus().calls.contains(&I2cCall::Read { addr: 0x21, len: 2 }));
}

// ── PWM and delays ────────────────────────────────────────────

#[test]
fn pwm_scales_to_timer_range() {
    let mut pwm = Pwm::new(MockPwm::new(), D2);
    assert_eq!(pwm.write(255), Ok(true));
    assert_eq!(pwm.write(0), Ok(true));
    assert_eq!(pwm.write(51), Ok(true));
    assert_eq!(pwm.channel().duties, [MockPwm::MAX, 0, 200]);
    assert_eq!(pwm.duty(), 51);
    assert_eq!(pwm.pin(), D2);
}

#[test]
fn pwm_refusal_keeps_previous_duty() {
    let mut pwm = Pwm::new(MockPwm { refuse: true, ..MockPwm::new() }, D2);
    assert_eq!(pwm.write(100), Ok(false));
    assert_eq!(pwm.duty(), 0);
    assert_eq!(pwm.write(256).unwrap_err().kind(), ErrorKind::InvalidArgument);
}

#[test]
fn delays_accumulate() {
    let mut delay = MockDelay::default();
    timer::delay_ms(&mut delay, 5).unwrap();
    timer::delay_us(&mut delay, 250).unwrap();
    assert_eq!(delay.total_ns, 5_250_000);
    assert_eq!(timer::delay_ms(&mut delay, -1).unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(delay.total_ns, 5_250_000);
}

// ── Banks ─────────────────────────────────────────────────────

#[test]
fn uart_bank_is_one_based() {
    let mut uarts = uart_bank(SimUart::new(), SimUart::new());
    assert_eq!(uarts.get(0).err(), Some(Error::InvalidArgument("uart id")));
    assert_eq!(uarts.get(3).err(), Some(Error::InvalidArgument("uart id")));

    let second = uarts.get(2).unwrap();
    assert_eq!(second.id(), 2);
    second.init(9600).unwrap();
    assert_eq!(second.write(Payload::Text("AT\r\n")), Ok(4));
    assert_eq!(second.port().sent, b"AT\r\n");
    assert!(!uarts.get(1).unwrap().is_enabled());
}

#[test]
fn spi_bank_transfers_full_duplex() {
    let mut spis = spi_bank(SimSpi::new(), SimSpi::new());
    let spi = spis.get(1).unwrap();
    assert_eq!(spi.send_char(0x0F).unwrap_err().kind(), ErrorKind::InvalidState);
    spi.init();
    spi.set_clock_divider(8).unwrap();
    assert_eq!(spi.send_char(0x0F), Ok(0xF0));

    let mut out = Vec::new();
    assert_eq!(spi.recv(&mut out, 3), Ok(3));
    assert_eq!(out, [0xFF, 0xFF, 0xFF]);
    assert_eq!(spi.port().divider, 8);
}
