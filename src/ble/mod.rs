//! BLE link: one central connection and two byte rings.
//!
//! ```text
//!  stack write cb ──▶ on_event(GattWrite) ──▶ inbound ring ──▶ read()
//!  write(payload) ──▶ outbound ring ──(≤20 B chunk)──▶ send_notify
//! ```
//!
//! Stack callbacks arrive in the transport's context; the glue forwards them
//! to [`BleLink::on_event`].  Connection state is kept in atomics so the
//! main loop can query it without a lock.  The inbound ring is the only
//! structure written from the callback side.
//!
//! ## Overflow policy
//!
//! When a write would overflow the inbound ring, the bytes that fit are
//! kept, the rest of that write is dropped, a warning is logged and
//! `BufferFull` is returned to the glue.  Nothing is retried.

pub mod gatt;
pub mod ring;

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};

use log::{debug, info, warn};

use crate::app::ports::{BleTransport, GattHandles};
use crate::config::{BLE_INBOUND_CAPACITY, BLE_OUTBOUND_CAPACITY, BleConfig};
use crate::error::{Error, Result};
use crate::payload::Payload;

pub use gatt::GattLayout;
pub use ring::RingBuffer;

const NO_CONNECTION: u16 = 0xFFFF;

/// Stack callbacks, as delivered by the transport glue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleEvent<'a> {
    Connected { status: u8, conn_handle: u16 },
    Disconnected { conn_handle: u16, reason: u8 },
    GattWrite { value_handle: u16, data: &'a [u8] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

pub struct BleLink<T: BleTransport> {
    transport: T,
    handles: Option<GattHandles>,
    connected: AtomicBool,
    conn_handle: AtomicU16,
    notify_enabled: AtomicBool,
    inbound: RingBuffer<BLE_INBOUND_CAPACITY>,
    outbound: RingBuffer<BLE_OUTBOUND_CAPACITY>,
    dropped: AtomicUsize,
}

impl<T: BleTransport> BleLink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            handles: None,
            connected: AtomicBool::new(false),
            conn_handle: AtomicU16::new(NO_CONNECTION),
            notify_enabled: AtomicBool::new(false),
            inbound: RingBuffer::new("ble inbound"),
            outbound: RingBuffer::new("ble outbound"),
            dropped: AtomicUsize::new(0),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Register the GATT layout with the stack.  Must run once before
    /// advertising or writing.
    pub fn init(&mut self, cfg: &BleConfig) -> Result<()> {
        if self.handles.is_some() {
            return Err(Error::AlreadyInUse("ble gatt layout"));
        }
        let layout = GattLayout::from_config(cfg);
        let handles = self
            .transport
            .register(&layout)
            .ok_or(Error::InvalidState("ble stack refused registration"))?;
        info!(
            "ble: registered '{}' rx=0x{:04x} tx=0x{:04x}",
            layout.device_name, handles.rx_value, handles.tx_value
        );
        self.handles = Some(handles);
        Ok(())
    }

    fn handles(&self) -> Result<GattHandles> {
        self.handles.ok_or(Error::InvalidState("ble not initialised"))
    }

    pub fn begin_advertising(&self) -> Result<()> {
        self.handles()?;
        self.transport.start_advertising();
        debug!("ble: advertising");
        Ok(())
    }

    pub fn stop_advertising(&self) -> Result<()> {
        self.handles()?;
        self.transport.stop_advertising();
        Ok(())
    }

    // ── Stack callbacks (producer side) ───────────────────────

    pub fn on_event(&self, event: BleEvent<'_>) -> Result<()> {
        match event {
            BleEvent::Connected { status, conn_handle } => {
                if status != 0 {
                    debug!("ble: connect attempt failed, status {}", status);
                    return Ok(());
                }
                self.conn_handle.store(conn_handle, Ordering::Relaxed);
                self.connected.store(true, Ordering::Release);
                info!("ble: connected, handle 0x{:04x}", conn_handle);
                Ok(())
            }
            BleEvent::Disconnected { conn_handle, reason } => {
                self.mark_disconnected();
                info!("ble: handle 0x{:04x} disconnected, reason 0x{:02x}", conn_handle, reason);
                Ok(())
            }
            BleEvent::GattWrite { value_handle, data } => self.on_write(value_handle, data),
        }
    }

    fn on_write(&self, value_handle: u16, data: &[u8]) -> Result<()> {
        let Some(handles) = self.handles else {
            return Ok(());
        };
        if value_handle == handles.rx_value {
            let kept = self.inbound.extend(data);
            if kept < data.len() {
                let lost = data.len() - kept;
                self.dropped.fetch_add(lost, Ordering::Relaxed);
                warn!("ble: inbound ring full, dropped {} of {} bytes", lost, data.len());
                return Err(Error::BufferFull("ble inbound"));
            }
        } else if value_handle == handles.tx_value.wrapping_add(1) {
            // CCCD of the notify characteristic.
            let enabled = data.first().is_some_and(|b| b & 0x01 != 0);
            self.notify_enabled.store(enabled, Ordering::Relaxed);
            debug!("ble: notifications {}", if enabled { "on" } else { "off" });
        } else {
            debug!("ble: write to unknown handle 0x{:04x} ignored", value_handle);
        }
        Ok(())
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
        self.conn_handle.store(NO_CONNECTION, Ordering::Relaxed);
        self.notify_enabled.store(false, Ordering::Relaxed);
    }

    // ── Mainline (consumer side) ──────────────────────────────

    /// Pop up to `max` inbound bytes onto `out`, FIFO.
    pub fn read(&self, out: &mut Vec<u8>, max: usize) -> usize {
        self.inbound.drain_into(out, max)
    }

    pub fn available(&self) -> usize {
        self.inbound.len()
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LinkState {
        if self.connected() { LinkState::Connected } else { LinkState::Disconnected }
    }

    pub fn connection_handle(&self) -> Option<u16> {
        self.connected()
            .then(|| self.conn_handle.load(Ordering::Relaxed))
            .filter(|h| *h != NO_CONNECTION)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notify_enabled.load(Ordering::Relaxed)
    }

    /// Bytes lost to inbound overflow since start.
    pub fn dropped_bytes(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Queue `payload` through the outbound ring and notify it in chunks of
    /// at most the ring's capacity.  Returns bytes delivered to the stack;
    /// a short count means the stack refused a notification.  Mainline only.
    pub fn write(&self, payload: Payload<'_>) -> Result<usize> {
        let handles = self.handles()?;
        let bytes = payload.to_bytes()?;
        let mut chunk = [0u8; BLE_OUTBOUND_CAPACITY];
        let mut total = 0;

        for piece in bytes.chunks(self.outbound.capacity()) {
            if self.outbound.extend(piece) < piece.len() {
                return Err(Error::BufferFull("ble outbound"));
            }
            let mut n = 0;
            while let Ok(b) = self.outbound.pop() {
                chunk[n] = b;
                n += 1;
            }
            if !self.transport.send_notify(handles.tx_value, &chunk[..n]) {
                debug!("ble: notify refused after {} bytes", total);
                break;
            }
            total += n;
        }
        Ok(total)
    }

    /// Drop the current connection.  `false` when nothing was connected.
    pub fn disconnect(&self) -> bool {
        let Some(handle) = self.connection_handle() else {
            return false;
        };
        self.transport.disconnect(handle);
        self.mark_disconnected();
        info!("ble: disconnect requested for 0x{:04x}", handle);
        true
    }
}
