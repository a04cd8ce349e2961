//! Socket HAL over `std::net`.
//!
//! Works on the host and on ESP-IDF (lwIP behind the std shim).  Listeners
//! and streams are non-blocking so `accept`, `read` and `available` return
//! immediately, matching the poll-style contract the pool expects.  Outbound
//! connects block for at most the configured timeout.

use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::SocketHal;
use crate::config::PortConfig;

/// Bytes inspected by one `available` probe.
const PEEK_WINDOW: usize = 1460;

#[derive(Debug)]
pub struct NetServer {
    port: u16,
    listener: Option<TcpListener>,
}

impl NetServer {
    /// Port actually bound (differs from the requested one for port 0).
    pub fn local_port(&self) -> Option<u16> {
        self.listener.as_ref()?.local_addr().ok().map(|a| a.port())
    }
}

#[derive(Debug, Default)]
pub struct NetClient {
    stream: Option<TcpStream>,
}

#[derive(Debug, Clone)]
pub struct StdSocketHal {
    connect_timeout: Duration,
}

impl StdSocketHal {
    pub fn new(cfg: &PortConfig) -> Self {
        Self { connect_timeout: Duration::from_millis(u64::from(cfg.tcp_connect_timeout_ms.max(1))) }
    }

    fn open(&self, client: &mut NetClient, addr: SocketAddr) -> bool {
        match TcpStream::connect_timeout(&addr, self.connect_timeout) {
            Ok(stream) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    warn!("net: {addr}: set_nonblocking failed: {e}");
                    return false;
                }
                info!("net: connected to {addr}");
                client.stream = Some(stream);
                true
            }
            Err(e) => {
                debug!("net: connect {addr} failed: {e}");
                false
            }
        }
    }
}

fn would_block(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted)
}

impl SocketHal for StdSocketHal {
    type Server = NetServer;
    type Client = NetClient;

    fn create_server(&mut self, port: u16) -> Option<NetServer> {
        Some(NetServer { port, listener: None })
    }

    fn begin_server(&mut self, server: &mut NetServer) -> bool {
        let listener = match TcpListener::bind((Ipv4Addr::UNSPECIFIED, server.port)) {
            Ok(l) => l,
            Err(e) => {
                warn!("net: bind :{} failed: {e}", server.port);
                return false;
            }
        };
        if let Err(e) = listener.set_nonblocking(true) {
            warn!("net: listener set_nonblocking failed: {e}");
            return false;
        }
        server.listener = Some(listener);
        true
    }

    fn stop_server(&mut self, server: &mut NetServer) {
        server.listener = None;
    }

    fn delete_server(&mut self, server: NetServer) {
        drop(server);
    }

    fn accept_client(&mut self, server: &mut NetServer) -> Option<NetClient> {
        let listener = server.listener.as_ref()?;
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    warn!("net: {peer}: set_nonblocking failed: {e}");
                    return None;
                }
                debug!("net: accepted {peer} on :{}", server.port);
                Some(NetClient { stream: Some(stream) })
            }
            Err(e) if would_block(&e) => None,
            Err(e) => {
                warn!("net: accept on :{} failed: {e}", server.port);
                None
            }
        }
    }

    fn create_client(&mut self) -> Option<NetClient> {
        Some(NetClient::default())
    }

    fn connect_by_ip(&mut self, client: &mut NetClient, ip: u32, port: u16) -> bool {
        self.open(client, SocketAddr::from((Ipv4Addr::from(ip), port)))
    }

    fn connect_by_host(&mut self, client: &mut NetClient, host: &str, port: u16) -> bool {
        let addrs = match (host, port).to_socket_addrs() {
            Ok(a) => a,
            Err(e) => {
                debug!("net: resolve {host} failed: {e}");
                return false;
            }
        };
        addrs.into_iter().any(|addr| self.open(client, addr))
    }

    fn stop_client(&mut self, client: &mut NetClient) {
        if let Some(stream) = client.stream.take() {
            // Peer may already be gone.
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn delete_client(&mut self, mut client: NetClient) {
        self.stop_client(&mut client);
    }

    fn write(&mut self, client: &mut NetClient, data: &[u8]) -> usize {
        let Some(stream) = client.stream.as_mut() else { return 0 };
        let mut sent = 0;
        while sent < data.len() {
            match stream.write(&data[sent..]) {
                Ok(0) => break,
                Ok(n) => sent += n,
                Err(e) if would_block(&e) => break,
                Err(e) => {
                    debug!("net: write failed: {e}");
                    break;
                }
            }
        }
        sent
    }

    fn read(&mut self, client: &mut NetClient, buf: &mut [u8]) -> usize {
        let Some(stream) = client.stream.as_mut() else { return 0 };
        match stream.read(buf) {
            Ok(n) => n,
            Err(e) if would_block(&e) => 0,
            Err(e) => {
                debug!("net: read failed: {e}");
                0
            }
        }
    }

    fn available(&mut self, client: &mut NetClient) -> usize {
        let Some(stream) = client.stream.as_ref() else { return 0 };
        let mut window = [0u8; PEEK_WINDOW];
        stream.peek(&mut window).unwrap_or(0)
    }

    fn connected(&mut self, client: &mut NetClient) -> bool {
        let Some(stream) = client.stream.as_ref() else { return false };
        match stream.peek(&mut [0u8; 1]) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) => would_block(&e),
        }
    }

    fn peek(&mut self, client: &mut NetClient) -> Option<u8> {
        let stream = client.stream.as_ref()?;
        let mut b = [0u8; 1];
        match stream.peek(&mut b) {
            Ok(1) => Some(b[0]),
            _ => None,
        }
    }

    fn flush(&mut self, client: &mut NetClient) {
        if let Some(stream) = client.stream.as_mut() {
            let _ = stream.flush();
        }
    }

    fn flush_buffer(&mut self, client: &mut NetClient) {
        let mut scratch = [0u8; PEEK_WINDOW];
        while self.read(client, &mut scratch) > 0 {}
    }

    fn status(&mut self, client: &mut NetClient) -> u8 {
        u8::from(self.connected(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn poll<T>(mut f: impl FnMut() -> Option<T>) -> Option<T> {
        for _ in 0..200 {
            if let Some(v) = f() {
                return Some(v);
            }
            sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn loopback_accept_write_read() {
        let mut hal = StdSocketHal::new(&PortConfig::default());
        let mut server = hal.create_server(0).unwrap();
        assert!(hal.begin_server(&mut server));
        let port = server.local_port().unwrap();

        assert!(hal.accept_client(&mut server).is_none(), "nobody connected yet");

        let mut outbound = hal.create_client().unwrap();
        assert!(hal.connect_by_ip(&mut outbound, u32::from(Ipv4Addr::LOCALHOST), port));
        let mut inbound = poll(|| hal.accept_client(&mut server)).expect("accept");

        assert_eq!(hal.write(&mut outbound, b"hello"), 5);
        assert_eq!(poll(|| (hal.available(&mut inbound) == 5).then_some(())), Some(()));
        assert_eq!(hal.peek(&mut inbound), Some(b'h'));
        let mut buf = [0u8; 10];
        assert_eq!(hal.read(&mut inbound, &mut buf), 5);
        assert_eq!(&buf[..5], b"hello");
        assert!(hal.connected(&mut inbound));

        hal.delete_client(outbound);
        assert_eq!(poll(|| (!hal.connected(&mut inbound)).then_some(())), Some(()));
        hal.stop_server(&mut server);
        assert!(hal.accept_client(&mut server).is_none());
    }

    #[test]
    fn refused_connect_is_false() {
        let mut hal = StdSocketHal::new(&PortConfig::default());
        // Bind then drop to get a port nobody listens on.
        let port = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap().local_addr().unwrap().port();
        let mut c = hal.create_client().unwrap();
        assert!(!hal.connect_by_ip(&mut c, u32::from(Ipv4Addr::LOCALHOST), port));
        assert_eq!(hal.status(&mut c), 0);
    }
}
