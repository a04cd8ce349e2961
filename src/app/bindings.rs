//! Script-facing call surface.
//!
//! Scripts hold plain integers for server and client slots.  These functions
//! resolve them against the pool, apply the sentinel conventions scripts
//! expect (`-1` for "no client waiting" and "nothing to peek"), and turn
//! every [`Error`](crate::error::Error) into an [`Exception`].

use crate::app::ports::{BleTransport, HeapLock, InterruptHal, SocketHal};
use crate::app::script::{CallResult, Exception, Value};
use crate::ble::BleLink;
use crate::error::{Error, Result};
use crate::interrupts::InterruptRegistry;
use crate::pins::PinDescriptor;
use crate::sockets::SocketPool;

fn port_arg(port: i64) -> Result<u16> {
    u16::try_from(port).map_err(|_| Error::InvalidArgument("tcp port"))
}

fn len_arg(max: i64) -> Result<usize> {
    usize::try_from(max).map_err(|_| Error::InvalidArgument("read length"))
}

fn ok<T: Into<Value>>(r: Result<T>) -> CallResult {
    r.map(Into::into).map_err(Exception::from)
}

fn peeked(r: Result<Option<u8>>) -> CallResult {
    ok(r.map(|b| b.map_or(-1, i64::from)))
}

// ── TCP server ────────────────────────────────────────────────

pub fn tcp_server_new<H: SocketHal>(pool: &mut SocketPool<H>, port: i64) -> CallResult {
    let port = port_arg(port)?;
    ok(pool.create_server(port).map(|id| id.index()))
}

pub fn tcp_server_begin<H: SocketHal>(pool: &mut SocketPool<H>, server: i64) -> CallResult {
    let id = pool.server_id(server)?;
    ok(pool.begin(id))
}

pub fn tcp_server_stop<H: SocketHal>(pool: &mut SocketPool<H>, server: i64) -> CallResult {
    let id = pool.server_id(server)?;
    ok(pool.stop(id))
}

pub fn tcp_server_delete<H: SocketHal>(pool: &mut SocketPool<H>, server: i64) -> CallResult {
    let id = pool.server_id(server)?;
    ok(pool.delete(id))
}

/// New client slot index, or `-1` when no connection is waiting.
pub fn tcp_server_accept<H: SocketHal>(pool: &mut SocketPool<H>, server: i64) -> CallResult {
    let id = pool.server_id(server)?;
    let accepted = pool.accept(id)?;
    Ok(accepted.map_or(Value::Int(-1), |c| c.index().into()))
}

// ── Accepted clients ──────────────────────────────────────────

pub fn tcp_client_write<H: SocketHal>(pool: &mut SocketPool<H>, client: i64, data: &Value) -> CallResult {
    let id = pool.client_id(client)?;
    ok(pool.write(id, data.as_payload()?))
}

pub fn tcp_client_read<H: SocketHal>(
    pool: &mut SocketPool<H>,
    client: i64,
    out: &mut Vec<u8>,
    max: i64,
) -> CallResult {
    let id = pool.client_id(client)?;
    ok(pool.read(id, out, len_arg(max)?))
}

pub fn tcp_client_available<H: SocketHal>(pool: &mut SocketPool<H>, client: i64) -> CallResult {
    let id = pool.client_id(client)?;
    ok(pool.available(id))
}

pub fn tcp_client_connected<H: SocketHal>(pool: &mut SocketPool<H>, client: i64) -> CallResult {
    let id = pool.client_id(client)?;
    ok(pool.connected(id))
}

pub fn tcp_client_peek<H: SocketHal>(pool: &mut SocketPool<H>, client: i64) -> CallResult {
    let id = pool.client_id(client)?;
    peeked(pool.peek(id))
}

pub fn tcp_client_flush<H: SocketHal>(pool: &mut SocketPool<H>, client: i64) -> CallResult {
    let id = pool.client_id(client)?;
    ok(pool.flush(id))
}

pub fn tcp_client_status<H: SocketHal>(pool: &mut SocketPool<H>, client: i64) -> CallResult {
    let id = pool.client_id(client)?;
    ok(pool.status(id))
}

pub fn tcp_client_stop<H: SocketHal>(pool: &mut SocketPool<H>, client: i64) -> CallResult {
    let id = pool.client_id(client)?;
    ok(pool.stop_client(id))
}

pub fn tcp_client_delete<H: SocketHal>(pool: &mut SocketPool<H>, client: i64) -> CallResult {
    let id = pool.client_id(client)?;
    ok(pool.delete_client(id))
}

// ── Standalone client ─────────────────────────────────────────

pub fn client_new<H: SocketHal>(pool: &mut SocketPool<H>) -> CallResult {
    ok(pool.standalone().create())
}

pub fn client_connect_ip<H: SocketHal>(pool: &mut SocketPool<H>, ip: &Value, port: i64) -> CallResult {
    let port = port_arg(port)?;
    ok(pool.standalone().connect_by_ip(ip.as_str()?, port))
}

pub fn client_connect_host<H: SocketHal>(pool: &mut SocketPool<H>, host: &Value, port: i64) -> CallResult {
    let port = port_arg(port)?;
    ok(pool.standalone().connect_by_host(host.as_str()?, port))
}

pub fn client_write<H: SocketHal>(pool: &mut SocketPool<H>, data: &Value) -> CallResult {
    ok(pool.standalone().write(data.as_payload()?))
}

pub fn client_read<H: SocketHal>(pool: &mut SocketPool<H>, out: &mut Vec<u8>, max: i64) -> CallResult {
    ok(pool.standalone().read(out, len_arg(max)?))
}

pub fn client_available<H: SocketHal>(pool: &mut SocketPool<H>) -> CallResult {
    ok(pool.standalone().available())
}

pub fn client_connected<H: SocketHal>(pool: &mut SocketPool<H>) -> CallResult {
    ok(pool.standalone().connected())
}

pub fn client_peek<H: SocketHal>(pool: &mut SocketPool<H>) -> CallResult {
    peeked(pool.standalone().peek())
}

pub fn client_flush<H: SocketHal>(pool: &mut SocketPool<H>) -> CallResult {
    ok(pool.standalone().flush())
}

pub fn client_status<H: SocketHal>(pool: &mut SocketPool<H>) -> CallResult {
    ok(pool.standalone().status())
}

pub fn client_stop<H: SocketHal>(pool: &mut SocketPool<H>) -> CallResult {
    ok(pool.standalone().stop())
}

pub fn client_delete<H: SocketHal>(pool: &mut SocketPool<H>) -> CallResult {
    ok(pool.standalone().delete())
}

// ── BLE ───────────────────────────────────────────────────────

pub fn ble_read<T: BleTransport>(link: &BleLink<T>, out: &mut Vec<u8>, max: i64) -> CallResult {
    Ok(link.read(out, len_arg(max)?).into())
}

pub fn ble_write<T: BleTransport>(link: &BleLink<T>, data: &Value) -> CallResult {
    ok(link.write(data.as_payload()?))
}

pub fn ble_available<T: BleTransport>(link: &BleLink<T>) -> CallResult {
    Ok(link.available().into())
}

pub fn ble_connected<T: BleTransport>(link: &BleLink<T>) -> CallResult {
    Ok(link.connected().into())
}

// ── Interrupts ────────────────────────────────────────────────

pub fn irq_detach<H: InterruptHal, L: HeapLock>(irq: &InterruptRegistry<H, L>, pin: PinDescriptor) -> CallResult {
    ok(irq.detach(pin))
}

pub fn irq_disable_all<H: InterruptHal, L: HeapLock>(irq: &InterruptRegistry<H, L>) -> CallResult {
    irq.disable_all();
    Ok(Value::None)
}

/// `False` when there was no matching `disable_all`.
pub fn irq_enable_all<H: InterruptHal, L: HeapLock>(irq: &InterruptRegistry<H, L>) -> CallResult {
    Ok(irq.enable_all().into())
}
