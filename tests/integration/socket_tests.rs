//! Integration tests for the TCP socket pool.
//!
//! Drives the pool through full server/client lifecycles on the simulated
//! socket HAL, including pool exhaustion and slot reuse.

use duoport::adapters::sim::SimSocketHal;
use duoport::error::{Error, ErrorKind};
use duoport::payload::Payload;
use duoport::sockets::{SocketPool, SocketState};

fn listening_pool(port: u16) -> (SocketPool<SimSocketHal>, duoport::sockets::ServerId) {
    let mut pool = SocketPool::new(SimSocketHal::new());
    let server = pool.create_server(port).unwrap();
    assert_eq!(pool.begin(server), Ok(true));
    (pool, server)
}

// ── Server lifecycle ──────────────────────────────────────────

#[test]
fn server_is_reusable_after_stop() {
    let (mut pool, server) = listening_pool(80);
    assert_eq!(pool.accept(server), Ok(None));
    pool.stop(server).unwrap();
    assert_eq!(pool.server_state(server), Ok(SocketState::Unused));
    assert_eq!(pool.begin(server), Ok(true));
    assert_eq!(pool.server_state(server), Ok(SocketState::Used));
}

#[test]
fn delete_stops_a_listening_server() {
    let (mut pool, server) = listening_pool(80);
    pool.hal_mut().queue_connection(80, b"late");
    pool.delete(server).unwrap();
    assert_eq!(pool.server_count(), 0);
    assert_eq!(pool.hal().servers_deleted(), 1);
    assert_eq!(pool.accept(server).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn script_index_resolution() {
    let (pool, server) = listening_pool(80);
    assert_eq!(pool.server_id(0), Ok(server));
    assert_eq!(pool.server_id(1).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(pool.server_id(3).unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(pool.server_id(-1).unwrap_err().kind(), ErrorKind::InvalidArgument);
}

// ── Client pool ───────────────────────────────────────────────

#[test]
fn twenty_first_client_is_exhausted() {
    let (mut pool, server) = listening_pool(8080);
    for _ in 0..21 {
        pool.hal_mut().queue_connection(8080, b"");
    }
    for i in 0..20 {
        let client = pool.accept(server).unwrap().expect("pending connection");
        assert_eq!(client.index(), i);
    }
    assert_eq!(pool.accept(server), Err(Error::ResourceExhausted("client socket")));
    // The 21st peer is still queued in the stack, not lost.
    assert_eq!(pool.hal().pending_on(8080), 1);
    assert_eq!(pool.client_count(), 20);
}

#[test]
fn freed_client_slot_is_reused() {
    let (mut pool, server) = listening_pool(8080);
    for _ in 0..3 {
        pool.hal_mut().queue_connection(8080, b"x");
    }
    let a = pool.accept(server).unwrap().unwrap();
    let b = pool.accept(server).unwrap().unwrap();
    pool.delete_client(a).unwrap();
    let c = pool.accept(server).unwrap().unwrap();
    assert_eq!(c.index(), a.index());
    assert_eq!(pool.client_state(a).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(pool.client_state(b), Ok(SocketState::Used));
    assert_eq!(pool.hal().clients_deleted(), 1);
    assert_eq!(pool.accepted_clients().count(), 2);
}

#[test]
fn accepted_client_marshalling() {
    let (mut pool, server) = listening_pool(80);
    pool.hal_mut().queue_connection(80, &[0, 1, 0, 2]);
    let client = pool.accept(server).unwrap().unwrap();

    assert_eq!(pool.connected(client), Ok(true));
    assert_eq!(pool.peek(client), Ok(Some(0)));
    let mut out = Vec::new();
    assert_eq!(pool.read(client, &mut out, 10), Ok(4));
    assert_eq!(out, [0, 1, 0, 2], "zero bytes are data");
    assert_eq!(pool.peek(client), Ok(None));

    assert_eq!(pool.write(client, Payload::Text("ok")), Ok(2));
    assert_eq!(pool.hal().bytes_written(), 2);
    pool.flush(client).unwrap();
    assert_eq!(pool.status(client), Ok(1));
}

// ── Standalone client ─────────────────────────────────────────

#[test]
fn standalone_write_five_read_ten() {
    let mut pool = SocketPool::new(SimSocketHal::new());
    let mut client = pool.standalone();
    client.create().unwrap();
    assert_eq!(client.connect_by_ip("192.168.1.10", 7), Ok(true));

    assert_eq!(client.write(Payload::Bytes(&[1, 2, 3, 4, 5])), Ok(5));
    let mut out = vec![9];
    assert_eq!(client.read(&mut out, 10), Ok(5));
    assert_eq!(out, [9, 1, 2, 3, 4, 5]);
    assert_eq!(client.available(), Ok(0));
}

#[test]
fn standalone_lifecycle_errors() {
    let mut pool = SocketPool::new(SimSocketHal::new());
    let mut client = pool.standalone();
    assert_eq!(client.connect_by_ip("10.0.0.1", 80).unwrap_err().kind(), ErrorKind::NotFound);

    client.create().unwrap();
    assert_eq!(client.connect_by_ip("10.0.0", 80).unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(client.available().unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(client.connect_by_host("example.org", 80), Ok(true));
    assert_eq!(client.connect_by_host("example.org", 80).unwrap_err().kind(), ErrorKind::AlreadyInUse);
    assert_eq!(client.create().unwrap_err().kind(), ErrorKind::AlreadyInUse);

    client.stop().unwrap();
    assert_eq!(client.state(), SocketState::Unused);
    client.delete().unwrap();
    assert!(!client.exists());
}

#[test]
fn refused_connect_returns_false_and_stays_unused() {
    let mut pool = SocketPool::new(SimSocketHal::new());
    pool.hal_mut().refuse_connections(true);
    let mut client = pool.standalone();
    client.create().unwrap();
    assert_eq!(client.connect_by_ip("10.0.0.1", 80), Ok(false));
    assert_eq!(client.state(), SocketState::Unused);
}

// ── Script-sized reads ────────────────────────────────────────

#[test]
fn huge_read_length_reads_one_chunk() {
    use duoport::app::bindings;
    use duoport::app::script::Value;
    use duoport::config::TCP_READ_CHUNK;

    let (mut pool, server) = listening_pool(80);
    let inbound: Vec<u8> = (0..3000u32).map(|i| i as u8).collect();
    pool.hal_mut().queue_connection(80, &inbound);
    let client = bindings::tcp_server_accept(&mut pool, server.index() as i64)
        .unwrap()
        .as_int()
        .unwrap();

    let mut out = Vec::new();
    let first = bindings::tcp_client_read(&mut pool, client, &mut out, i64::MAX);
    assert_eq!(first, Ok(Value::Int(TCP_READ_CHUNK as i64)));
    while bindings::tcp_client_read(&mut pool, client, &mut out, i64::MAX) != Ok(Value::Int(0)) {}
    assert_eq!(out, inbound);

    pool.standalone().create().unwrap();
    assert_eq!(bindings::client_read(&mut pool, &mut out, i64::MAX), Ok(Value::Int(0)));
}
