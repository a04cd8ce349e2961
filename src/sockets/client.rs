//! Standalone (outbound) TCP client.
//!
//! A single client descriptor lives next to the accepted-client pool.  It is
//! created explicitly, connected by address or host name, and torn down with
//! `delete`.  Reads and writes reuse the pool's marshalling.

use log::{debug, info};

use super::{SocketState, parse_ipv4, read_into};
use crate::app::ports::SocketHal;
use crate::error::{Error, Result};
use crate::payload::Payload;

const STANDALONE: &str = "tcp client";

pub(crate) struct StandaloneSlot<C> {
    handle: Option<C>,
    state: SocketState,
}

impl<C> Default for StandaloneSlot<C> {
    fn default() -> Self {
        Self { handle: None, state: SocketState::Unused }
    }
}

impl<C> StandaloneSlot<C> {
    /// Handle of an idle client, ready to connect.
    fn idle(&mut self) -> Result<&mut C> {
        let handle = self.handle.as_mut().ok_or(Error::NotFound(STANDALONE))?;
        if self.state == SocketState::Used {
            return Err(Error::AlreadyInUse(STANDALONE));
        }
        Ok(handle)
    }

    fn active(&mut self) -> Result<&mut C> {
        let handle = self.handle.as_mut().ok_or(Error::NotFound(STANDALONE))?;
        if self.state == SocketState::Unused {
            return Err(Error::InvalidState(STANDALONE));
        }
        Ok(handle)
    }

    fn any(&mut self) -> Result<&mut C> {
        self.handle.as_mut().ok_or(Error::NotFound(STANDALONE))
    }
}

/// Borrowed view of the singleton client; obtained from
/// [`SocketPool::standalone`](super::SocketPool::standalone).
pub struct StandaloneClient<'p, H: SocketHal> {
    hal: &'p mut H,
    slot: &'p mut StandaloneSlot<H::Client>,
}

impl<'p, H: SocketHal> StandaloneClient<'p, H> {
    pub(crate) fn new(hal: &'p mut H, slot: &'p mut StandaloneSlot<H::Client>) -> Self {
        Self { hal, slot }
    }

    pub fn exists(&self) -> bool {
        self.slot.handle.is_some()
    }

    pub fn state(&self) -> SocketState {
        self.slot.state
    }

    /// Create the native client, or reuse the idle one.
    pub fn create(&mut self) -> Result<()> {
        if self.slot.handle.is_some() {
            return match self.slot.state {
                SocketState::Used => Err(Error::AlreadyInUse(STANDALONE)),
                SocketState::Unused => Ok(()),
            };
        }
        let handle = self
            .hal
            .create_client()
            .ok_or(Error::ResourceExhausted("native client socket"))?;
        self.slot.handle = Some(handle);
        self.slot.state = SocketState::Unused;
        debug!("tcp: standalone client created");
        Ok(())
    }

    /// `Ok(false)` when the native connect did not succeed.
    pub fn connect_by_ip(&mut self, ip: &str, port: u16) -> Result<bool> {
        let handle = self.slot.idle()?;
        let packed = parse_ipv4(ip)?;
        let ok = self.hal.connect_by_ip(handle, packed, port);
        self.finish_connect(ok, ip, port)
    }

    pub fn connect_by_host(&mut self, host: &str, port: u16) -> Result<bool> {
        if host.is_empty() {
            return Err(Error::InvalidArgument("host name"));
        }
        let handle = self.slot.idle()?;
        let ok = self.hal.connect_by_host(handle, host, port);
        self.finish_connect(ok, host, port)
    }

    fn finish_connect(&mut self, ok: bool, target: &str, port: u16) -> Result<bool> {
        if ok {
            self.slot.state = SocketState::Used;
            info!("tcp: connected to {}:{}", target, port);
        } else {
            debug!("tcp: connect to {}:{} failed", target, port);
        }
        Ok(ok)
    }

    pub fn stop(&mut self) -> Result<()> {
        let handle = self.slot.active()?;
        self.hal.stop_client(handle);
        self.slot.state = SocketState::Unused;
        Ok(())
    }

    /// Release the native client.  Disconnects first if needed.
    pub fn delete(&mut self) -> Result<()> {
        if self.slot.state == SocketState::Used {
            self.stop()?;
        }
        let handle = self.slot.handle.take().ok_or(Error::NotFound(STANDALONE))?;
        self.hal.delete_client(handle);
        debug!("tcp: standalone client deleted");
        Ok(())
    }

    pub fn write(&mut self, payload: Payload<'_>) -> Result<usize> {
        let bytes = payload.to_bytes()?;
        let handle = self.slot.any()?;
        Ok(self.hal.write(handle, &bytes))
    }

    pub fn read(&mut self, out: &mut Vec<u8>, max: usize) -> Result<usize> {
        let handle = self.slot.any()?;
        Ok(read_into(self.hal, handle, out, max))
    }

    pub fn available(&mut self) -> Result<usize> {
        let handle = self.slot.active()?;
        Ok(self.hal.available(handle))
    }

    pub fn connected(&mut self) -> Result<bool> {
        let handle = self.slot.active()?;
        Ok(self.hal.connected(handle))
    }

    pub fn peek(&mut self) -> Result<Option<u8>> {
        let handle = self.slot.active()?;
        Ok(self.hal.peek(handle))
    }

    pub fn flush(&mut self) -> Result<()> {
        let handle = self.slot.active()?;
        self.hal.flush(handle);
        Ok(())
    }

    pub fn flush_buffer(&mut self) -> Result<()> {
        let handle = self.slot.active()?;
        self.hal.flush_buffer(handle);
        Ok(())
    }

    pub fn status(&mut self) -> Result<u8> {
        let handle = self.slot.any()?;
        Ok(self.hal.status(handle))
    }
}
