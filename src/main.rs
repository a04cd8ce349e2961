//! Duoport bring-up binary.
//!
//! Wires the binding layer to concrete adapters and runs a cooperative main
//! loop: a TCP echo server on the configured demo port, a BLE link (over the
//! simulated transport on every target) echoing inbound bytes back as
//! notifications, and pending interrupt lines dispatched to their callbacks.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │  StdSocketHal        EspGpioInterrupts / SimInterruptHal     │
//! │  SimBleTransport     StdClock                                │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │  SocketPool · InterruptRegistry · BleLink                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use log::{info, warn};

use duoport::adapters::net::StdSocketHal;
use duoport::adapters::sim::SimBleTransport;
use duoport::app::ports::{Clock, StdClock};
use duoport::ble::BleLink;
use duoport::config::PortConfig;
use duoport::interrupts::{InterruptRegistry, PendingLines};
use duoport::payload::Payload;
use duoport::pins::{PinDescriptor, Port, Pull, TriggerMode};
use duoport::sockets::{SocketPool, SocketState};

const LOOP_INTERVAL_MS: u32 = 10;
const ECHO_CHUNK: usize = 256;

#[cfg(target_os = "espidf")]
fn init_logging() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn init_logging() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init()?;
    Ok(())
}

/// `DUOPORT_CONFIG` may name a JSON file; otherwise defaults apply.
fn load_config() -> Result<PortConfig> {
    let Ok(path) = std::env::var("DUOPORT_CONFIG") else {
        return Ok(PortConfig::default());
    };
    let bytes = std::fs::read(&path).with_context(|| format!("reading {path}"))?;
    let cfg = PortConfig::from_json(&bytes).map_err(|e| anyhow::anyhow!("{path}: {e}"))?;
    info!("Config loaded from {path}");
    Ok(cfg)
}

#[cfg(target_os = "espidf")]
fn interrupt_controller() -> Result<(duoport::adapters::gpio::EspGpioInterrupts, &'static PendingLines)> {
    let hal = duoport::adapters::gpio::EspGpioInterrupts::install()?;
    Ok((hal, &duoport::adapters::gpio::PENDING_LINES))
}

#[cfg(not(target_os = "espidf"))]
fn interrupt_controller() -> Result<(duoport::adapters::sim::SimInterruptHal, &'static PendingLines)> {
    static PENDING: PendingLines = PendingLines::new();
    Ok((duoport::adapters::sim::SimInterruptHal::new(), &PENDING))
}

fn main() -> Result<()> {
    // ── 1. Bootstrap ──────────────────────────────────────────
    init_logging()?;
    info!("duoport v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config.validate().map_err(|e| anyhow::anyhow!("invalid config: {e}"))?;
    let clock = StdClock::new();

    // ── 2. Interrupts ─────────────────────────────────────────
    let (irq_hal, pending) = interrupt_controller()?;
    let irq = InterruptRegistry::new(irq_hal);
    let button = PinDescriptor::new(Port::B, 3);
    irq.attach(
        button,
        TriggerMode::Falling,
        Pull::Up,
        Box::new(|line| {
            info!("irq: line {line} fired");
            Ok(())
        }),
        false,
    )?;

    // ── 3. BLE link ───────────────────────────────────────────
    // TODO: NimBLE-backed BleTransport for espidf; every target runs the
    // in-memory transport until then.
    let mut ble = BleLink::new(SimBleTransport::new());
    ble.init(&config.ble)?;
    ble.begin_advertising()?;
    #[cfg(target_os = "espidf")]
    warn!("BLE: no radio transport on this target, '{}' is simulated only", config.ble.device_name);
    #[cfg(not(target_os = "espidf"))]
    info!("BLE: simulated transport advertising as '{}'", config.ble.device_name);

    // ── 4. TCP echo server ────────────────────────────────────
    let mut pool = SocketPool::new(StdSocketHal::new(&config));
    let server = pool.create_server(config.demo_server_port)?;
    if !pool.begin(server)? {
        warn!("TCP: could not listen on port {}", config.demo_server_port);
    }

    info!("System ready. Entering main loop.");

    // ── 5. Main loop ──────────────────────────────────────────
    let mut buf = Vec::with_capacity(ECHO_CHUNK);
    loop {
        irq.dispatch_pending(pending);

        if pool.server_state(server)? == SocketState::Used {
            match pool.accept(server) {
                Ok(Some(client)) => info!("TCP: client {} connected", client.index()),
                Ok(None) => {}
                Err(e) => warn!("TCP: accept: {e}"),
            }
        }

        let clients: Vec<_> = pool.accepted_clients().collect();
        for client in clients {
            if !pool.connected(client).unwrap_or(false) {
                info!("TCP: client {} gone", client.index());
                pool.delete_client(client)?;
                continue;
            }
            buf.clear();
            if pool.read(client, &mut buf, ECHO_CHUNK)? > 0 {
                pool.write(client, Payload::Bytes(&buf))?;
            }
        }

        buf.clear();
        if ble.read(&mut buf, ECHO_CHUNK) > 0 {
            ble.write(Payload::Bytes(&buf))?;
        }

        clock.sleep_ms(LOOP_INTERVAL_MS);
    }
}
