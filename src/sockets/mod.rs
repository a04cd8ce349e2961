//! TCP socket resource pool.
//!
//! ```text
//!  servers[3]   UNUSED ──begin──▶ USED ──stop──▶ UNUSED ──delete──▶ (vacant)
//!                                  │
//!                                accept
//!                                  ▼
//!  clients[20]  USED ──stop──▶ UNUSED ──delete──▶ (vacant)
//!
//!  standalone   UNUSED ──connect──▶ USED ──stop──▶ UNUSED
//! ```
//!
//! The pool owns every native handle.  Callers address servers and accepted
//! clients by generation-tagged ids; the standalone client is a singleton
//! reached through [`SocketPool::standalone`].  Accepted and standalone
//! clients share the same read/write marshalling.

pub mod client;
pub mod ip;
pub mod slot;

use log::{debug, info};

use crate::app::ports::SocketHal;
use crate::config::{MAX_CLIENT_SOCKETS, MAX_SERVER_SOCKETS, TCP_READ_CHUNK};
use crate::error::{Error, Result};
use crate::payload::{Payload, append_bounded};

pub use client::StandaloneClient;
pub use ip::parse_ipv4;
pub use slot::{SlotId, SocketState};

use client::StandaloneSlot;
use slot::Slots;

const SERVER: &str = "server socket";
const CLIENT: &str = "client socket";

/// Handle to a server slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerId(SlotId);

/// Handle to an accepted-client slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(SlotId);

impl ServerId {
    /// Slot index, the integer scripts hold.
    pub const fn index(self) -> usize {
        self.0.index()
    }
}

impl ClientId {
    pub const fn index(self) -> usize {
        self.0.index()
    }
}

pub struct SocketPool<H: SocketHal> {
    hal: H,
    servers: Slots<H::Server, MAX_SERVER_SOCKETS>,
    clients: Slots<H::Client, MAX_CLIENT_SOCKETS>,
    standalone: StandaloneSlot<H::Client>,
}

impl<H: SocketHal> SocketPool<H> {
    pub fn new(hal: H) -> Self {
        Self {
            hal,
            servers: Slots::new(SERVER),
            clients: Slots::new(CLIENT),
            standalone: StandaloneSlot::default(),
        }
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    pub fn server_count(&self) -> usize {
        self.servers.occupied()
    }

    pub fn client_count(&self) -> usize {
        self.clients.occupied()
    }

    /// Live server id for a script-held slot index.
    pub fn server_id(&self, index: i64) -> Result<ServerId> {
        self.servers.id_at(index).map(ServerId)
    }

    /// Live accepted-client id for a script-held slot index.
    pub fn client_id(&self, index: i64) -> Result<ClientId> {
        self.clients.id_at(index).map(ClientId)
    }

    pub fn accepted_clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.ids().map(ClientId)
    }

    // ── Servers ───────────────────────────────────────────────

    /// Allocate a server slot bound to `port`.  The slot starts UNUSED.
    pub fn create_server(&mut self, port: u16) -> Result<ServerId> {
        self.servers.ensure_vacancy()?;
        let handle = self
            .hal
            .create_server(port)
            .ok_or(Error::ResourceExhausted("native server socket"))?;
        let id = self.servers.insert(handle, SocketState::Unused)?;
        info!("tcp: server {} created on port {}", id.index(), port);
        Ok(ServerId(id))
    }

    /// Start listening.  `Ok(false)` when the native listen failed; the slot
    /// then stays UNUSED.
    pub fn begin(&mut self, id: ServerId) -> Result<bool> {
        let slot = self.servers.get_mut(id.0)?;
        if slot.is_used() {
            return Err(Error::AlreadyInUse(SERVER));
        }
        let handle = slot.handle_mut().ok_or(Error::NotFound(SERVER))?;
        let listening = self.hal.begin_server(handle);
        if listening {
            slot.set_state(SocketState::Used);
            info!("tcp: server {} listening", id.index());
        } else {
            debug!("tcp: server {} listen failed", id.index());
        }
        Ok(listening)
    }

    pub fn stop(&mut self, id: ServerId) -> Result<()> {
        let slot = self.servers.get_mut(id.0)?;
        if !slot.is_used() {
            return Err(Error::InvalidState(SERVER));
        }
        let handle = slot.handle_mut().ok_or(Error::NotFound(SERVER))?;
        self.hal.stop_server(handle);
        slot.set_state(SocketState::Unused);
        info!("tcp: server {} stopped", id.index());
        Ok(())
    }

    /// Release the native server and free its slot.  Stops it first if it
    /// is still listening.  Clients it accepted are left in place.
    pub fn delete(&mut self, id: ServerId) -> Result<()> {
        if self.servers.get_mut(id.0)?.is_used() {
            self.stop(id)?;
        }
        let handle = self.servers.remove(id.0)?;
        self.hal.delete_server(handle);
        info!("tcp: server {} deleted", id.index());
        Ok(())
    }

    pub fn server_state(&mut self, id: ServerId) -> Result<SocketState> {
        Ok(self.servers.get_mut(id.0)?.state())
    }

    /// Poll for a pending connection.  `Ok(None)` when nobody is waiting;
    /// no slot is consumed in that case.
    pub fn accept(&mut self, id: ServerId) -> Result<Option<ClientId>> {
        let slot = self.servers.get_mut(id.0)?;
        if !slot.is_used() {
            return Err(Error::InvalidState(SERVER));
        }
        // Checked before polling so a pending connection is never dequeued
        // from the native stack and then dropped.
        self.clients.ensure_vacancy()?;
        let handle = slot.handle_mut().ok_or(Error::NotFound(SERVER))?;
        let Some(client) = self.hal.accept_client(handle) else {
            return Ok(None);
        };
        let client_id = self.clients.insert(client, SocketState::Used)?;
        info!("tcp: server {} accepted client {}", id.index(), client_id.index());
        Ok(Some(ClientId(client_id)))
    }

    // ── Accepted clients ──────────────────────────────────────

    fn with_client<R>(
        &mut self,
        id: ClientId,
        require_used: bool,
        op: impl FnOnce(&mut H, &mut H::Client) -> R,
    ) -> Result<R> {
        let slot = self.clients.get_mut(id.0)?;
        if require_used && !slot.is_used() {
            return Err(Error::InvalidState(CLIENT));
        }
        let handle = slot.handle_mut().ok_or(Error::NotFound(CLIENT))?;
        Ok(op(&mut self.hal, handle))
    }

    pub fn client_state(&mut self, id: ClientId) -> Result<SocketState> {
        Ok(self.clients.get_mut(id.0)?.state())
    }

    pub fn write(&mut self, id: ClientId, payload: Payload<'_>) -> Result<usize> {
        let bytes = payload.to_bytes()?;
        self.with_client(id, false, |hal, c| hal.write(c, &bytes))
    }

    /// Append up to `max` received bytes to `out`.
    pub fn read(&mut self, id: ClientId, out: &mut Vec<u8>, max: usize) -> Result<usize> {
        self.with_client(id, false, |hal, c| read_into(hal, c, out, max))
    }

    pub fn available(&mut self, id: ClientId) -> Result<usize> {
        self.with_client(id, true, |hal, c| hal.available(c))
    }

    pub fn connected(&mut self, id: ClientId) -> Result<bool> {
        self.with_client(id, true, |hal, c| hal.connected(c))
    }

    pub fn peek(&mut self, id: ClientId) -> Result<Option<u8>> {
        self.with_client(id, true, |hal, c| hal.peek(c))
    }

    pub fn flush(&mut self, id: ClientId) -> Result<()> {
        self.with_client(id, true, |hal, c| hal.flush(c))
    }

    pub fn flush_buffer(&mut self, id: ClientId) -> Result<()> {
        self.with_client(id, true, |hal, c| hal.flush_buffer(c))
    }

    pub fn status(&mut self, id: ClientId) -> Result<u8> {
        self.with_client(id, false, |hal, c| hal.status(c))
    }

    pub fn stop_client(&mut self, id: ClientId) -> Result<()> {
        self.with_client(id, true, |hal, c| hal.stop_client(c))?;
        self.clients.get_mut(id.0)?.set_state(SocketState::Unused);
        debug!("tcp: client {} stopped", id.index());
        Ok(())
    }

    pub fn delete_client(&mut self, id: ClientId) -> Result<()> {
        if self.clients.get_mut(id.0)?.is_used() {
            self.stop_client(id)?;
        }
        let handle = self.clients.remove(id.0)?;
        self.hal.delete_client(handle);
        debug!("tcp: client {} deleted", id.index());
        Ok(())
    }

    // ── Standalone client ─────────────────────────────────────

    /// View of the singleton outbound client.
    pub fn standalone(&mut self) -> StandaloneClient<'_, H> {
        StandaloneClient::new(&mut self.hal, &mut self.standalone)
    }
}

/// One native read of at most `min(max, TCP_READ_CHUNK)` bytes, appended
/// to `out`.
pub(crate) fn read_into<H: SocketHal>(
    hal: &mut H,
    client: &mut H::Client,
    out: &mut Vec<u8>,
    max: usize,
) -> usize {
    let want = max.min(TCP_READ_CHUNK);
    if want == 0 {
        return 0;
    }
    let mut buf = [0u8; TCP_READ_CHUNK];
    let got = hal.read(client, &mut buf[..want]).min(want);
    append_bounded(out, &buf[..got], want)
}
