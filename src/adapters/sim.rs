//! In-memory HAL implementations.
//!
//! Used by the host build of the bring-up binary and by tests.  Each
//! simulator keeps enough state for a test to inject stimulus (pending
//! connections, pin edges, GATT writes) and observe what the core asked the
//! hardware to do.

use std::cell::Cell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::convert::Infallible;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::app::ports::{
    AccessPoint, AnalogOut, BitOrder, BleTransport, Cipher, Clock, GattHandles, InterruptHal, PinConfig,
    RgbPort, Security, SerialPort, ServoPort, SocketHal, SpiPort, WifiRadio,
};
use crate::ble::gatt::GattLayout;
use crate::interrupts::PendingLines;
use crate::pins::{PhysicalPin, PinMode, TriggerMode};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A test that panicked while holding the lock leaves the state usable.
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ───────────────────────────────────────────────────────────────
// Sockets
// ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SimServer {
    port: u16,
    listening: bool,
}

#[derive(Debug)]
pub struct SimClient {
    rx: VecDeque<u8>,
    open: bool,
    /// Outbound connections talk to an echo peer.
    echo: bool,
}

impl SimClient {
    fn new(inbound: &[u8], open: bool) -> Self {
        Self { rx: inbound.iter().copied().collect(), open, echo: false }
    }
}

/// Socket HAL with injectable pending connections and an echo peer for
/// outbound clients.
#[derive(Debug, Default)]
pub struct SimSocketHal {
    pending: HashMap<u16, VecDeque<Vec<u8>>>,
    fail_listen: HashSet<u16>,
    refuse: bool,
    servers_created: usize,
    servers_deleted: usize,
    clients_deleted: usize,
    bytes_written: usize,
}

impl SimSocketHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a peer connect to `port`; it will have sent `inbound`.
    pub fn queue_connection(&mut self, port: u16, inbound: &[u8]) {
        self.pending.entry(port).or_default().push_back(inbound.to_vec());
    }

    pub fn fail_listen_on(&mut self, port: u16) {
        self.fail_listen.insert(port);
    }

    pub fn refuse_connections(&mut self, refuse: bool) {
        self.refuse = refuse;
    }

    pub fn servers_created(&self) -> usize {
        self.servers_created
    }

    pub fn servers_deleted(&self) -> usize {
        self.servers_deleted
    }

    pub fn clients_deleted(&self) -> usize {
        self.clients_deleted
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn pending_on(&self, port: u16) -> usize {
        self.pending.get(&port).map_or(0, VecDeque::len)
    }

    fn connect(&mut self, client: &mut SimClient) -> bool {
        if self.refuse {
            return false;
        }
        client.open = true;
        client.echo = true;
        true
    }
}

impl SocketHal for SimSocketHal {
    type Server = SimServer;
    type Client = SimClient;

    fn create_server(&mut self, port: u16) -> Option<SimServer> {
        self.servers_created += 1;
        Some(SimServer { port, listening: false })
    }

    fn begin_server(&mut self, server: &mut SimServer) -> bool {
        server.listening = !self.fail_listen.contains(&server.port);
        server.listening
    }

    fn stop_server(&mut self, server: &mut SimServer) {
        server.listening = false;
    }

    fn delete_server(&mut self, _server: SimServer) {
        self.servers_deleted += 1;
    }

    fn accept_client(&mut self, server: &mut SimServer) -> Option<SimClient> {
        if !server.listening {
            return None;
        }
        let inbound = self.pending.get_mut(&server.port)?.pop_front()?;
        Some(SimClient::new(&inbound, true))
    }

    fn create_client(&mut self) -> Option<SimClient> {
        Some(SimClient::new(&[], false))
    }

    fn connect_by_ip(&mut self, client: &mut SimClient, _ip: u32, _port: u16) -> bool {
        self.connect(client)
    }

    fn connect_by_host(&mut self, client: &mut SimClient, _host: &str, _port: u16) -> bool {
        self.connect(client)
    }

    fn stop_client(&mut self, client: &mut SimClient) {
        client.open = false;
        client.rx.clear();
    }

    fn delete_client(&mut self, _client: SimClient) {
        self.clients_deleted += 1;
    }

    fn write(&mut self, client: &mut SimClient, data: &[u8]) -> usize {
        if !client.open {
            return 0;
        }
        if client.echo {
            client.rx.extend(data);
        }
        self.bytes_written += data.len();
        data.len()
    }

    fn read(&mut self, client: &mut SimClient, buf: &mut [u8]) -> usize {
        let n = buf.len().min(client.rx.len());
        for (dst, src) in buf.iter_mut().zip(client.rx.drain(..n)) {
            *dst = src;
        }
        n
    }

    fn available(&mut self, client: &mut SimClient) -> usize {
        client.rx.len()
    }

    fn connected(&mut self, client: &mut SimClient) -> bool {
        client.open
    }

    fn peek(&mut self, client: &mut SimClient) -> Option<u8> {
        client.rx.front().copied()
    }

    fn flush(&mut self, _client: &mut SimClient) {}

    fn flush_buffer(&mut self, client: &mut SimClient) {
        client.rx.clear();
    }

    fn status(&mut self, client: &mut SimClient) -> u8 {
        u8::from(client.open)
    }
}

// ───────────────────────────────────────────────────────────────
// Interrupts
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct IrqState {
    modes: HashMap<PhysicalPin, PinMode>,
    attached: HashMap<PhysicalPin, (u8, TriggerMode)>,
    masked: bool,
    mask_calls: usize,
    unmask_calls: usize,
}

/// Interrupt controller that records configuration and lets tests fire
/// edges on attached pins.
#[derive(Debug, Default)]
pub struct SimInterruptHal {
    state: Mutex<IrqState>,
}

impl SimInterruptHal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin_mode(&self, pin: PhysicalPin) -> Option<PinMode> {
        lock(&self.state).modes.get(&pin).copied()
    }

    pub fn attachment(&self, pin: PhysicalPin) -> Option<(u8, TriggerMode)> {
        lock(&self.state).attached.get(&pin).copied()
    }

    pub fn is_masked(&self) -> bool {
        lock(&self.state).masked
    }

    /// (disable_all calls, enable_all calls)
    pub fn mask_calls(&self) -> (usize, usize) {
        let s = lock(&self.state);
        (s.mask_calls, s.unmask_calls)
    }

    /// Simulate an edge on `pin`.  Returns the line that would fire, or
    /// `None` when the pin is not attached or interrupts are masked.
    pub fn edge(&self, pin: PhysicalPin) -> Option<u8> {
        let s = lock(&self.state);
        if s.masked {
            return None;
        }
        s.attached.get(&pin).map(|(line, _)| *line)
    }

    /// Edge delivered the way an ISR trampoline would: into a pending set.
    pub fn edge_into(&self, pin: PhysicalPin, pending: &PendingLines) -> bool {
        self.edge(pin).is_some_and(|line| pending.raise(line))
    }
}

impl InterruptHal for SimInterruptHal {
    fn set_pin_mode(&self, pin: PhysicalPin, mode: PinMode) {
        lock(&self.state).modes.insert(pin, mode);
    }

    fn attach_interrupt(&self, pin: PhysicalPin, line: u8, mode: TriggerMode) {
        lock(&self.state).attached.insert(pin, (line, mode));
    }

    fn detach_interrupt(&self, pin: PhysicalPin) {
        lock(&self.state).attached.remove(&pin);
    }

    fn enable_all(&self) {
        let mut s = lock(&self.state);
        s.masked = false;
        s.unmask_calls += 1;
    }

    fn disable_all(&self) {
        let mut s = lock(&self.state);
        s.masked = true;
        s.mask_calls += 1;
    }
}

// ───────────────────────────────────────────────────────────────
// BLE
// ───────────────────────────────────────────────────────────────

/// Value handles the simulated stack assigns.
pub const SIM_RX_HANDLE: u16 = 0x0012;
pub const SIM_TX_HANDLE: u16 = 0x0015;

#[derive(Debug, Default)]
struct BleState {
    registered_name: Option<String>,
    adv_data: Vec<u8>,
    advertising: bool,
    notifications: Vec<(u16, Vec<u8>)>,
    disconnects: Vec<u16>,
    refuse_notify: bool,
    refuse_register: bool,
}

#[derive(Debug, Default)]
pub struct SimBleTransport {
    state: Mutex<BleState>,
}

impl SimBleTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered_name(&self) -> Option<String> {
        lock(&self.state).registered_name.clone()
    }

    pub fn adv_data(&self) -> Vec<u8> {
        lock(&self.state).adv_data.clone()
    }

    pub fn is_advertising(&self) -> bool {
        lock(&self.state).advertising
    }

    pub fn notifications(&self) -> Vec<(u16, Vec<u8>)> {
        lock(&self.state).notifications.clone()
    }

    pub fn disconnect_requests(&self) -> Vec<u16> {
        lock(&self.state).disconnects.clone()
    }

    pub fn refuse_notify(&self, refuse: bool) {
        lock(&self.state).refuse_notify = refuse;
    }

    pub fn refuse_register(&self, refuse: bool) {
        lock(&self.state).refuse_register = refuse;
    }
}

impl BleTransport for SimBleTransport {
    fn register(&self, layout: &GattLayout<'_>) -> Option<GattHandles> {
        let mut s = lock(&self.state);
        if s.refuse_register {
            return None;
        }
        s.registered_name = Some(layout.device_name.to_owned());
        s.adv_data = layout.adv_data().to_vec();
        Some(GattHandles { rx_value: SIM_RX_HANDLE, tx_value: SIM_TX_HANDLE })
    }

    fn start_advertising(&self) {
        lock(&self.state).advertising = true;
    }

    fn stop_advertising(&self) {
        lock(&self.state).advertising = false;
    }

    fn send_notify(&self, value_handle: u16, data: &[u8]) -> bool {
        let mut s = lock(&self.state);
        if s.refuse_notify {
            return false;
        }
        s.notifications.push((value_handle, data.to_vec()));
        true
    }

    fn disconnect(&self, conn_handle: u16) {
        lock(&self.state).disconnects.push(conn_handle);
    }
}

// ───────────────────────────────────────────────────────────────
// Peripherals
// ───────────────────────────────────────────────────────────────

/// UART with a loopback wire between TX and RX.
#[derive(Debug, Default)]
pub struct SimUart {
    pub(crate) baud: Option<u32>,
    pub(crate) rx: VecDeque<u8>,
    pub sent: Vec<u8>,
    pub loopback: bool,
}

impl SimUart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baud(&self) -> Option<u32> {
        self.baud
    }

    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }
}

impl SerialPort for SimUart {
    fn begin(&mut self, baud: u32) {
        self.baud = Some(baud);
    }

    fn end(&mut self) {
        self.baud = None;
        self.rx.clear();
    }

    fn is_enabled(&self) -> bool {
        self.baud.is_some()
    }

    fn available(&mut self) -> usize {
        self.rx.len()
    }

    fn read(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn peek(&mut self) -> Option<u8> {
        self.rx.front().copied()
    }

    fn write(&mut self, byte: u8) -> bool {
        if self.baud.is_none() {
            return false;
        }
        self.sent.push(byte);
        if self.loopback {
            self.rx.push_back(byte);
        }
        true
    }

    fn flush(&mut self) {}
}

/// SPI master whose MISO echoes MOSI, bit-inverted, so tests can tell the
/// two directions apart.
#[derive(Debug)]
pub struct SimSpi {
    pub enabled: bool,
    pub mosi: Vec<u8>,
    pub divider: u16,
    pub order: BitOrder,
    pub mode: u8,
}

impl Default for SimSpi {
    fn default() -> Self {
        Self { enabled: false, mosi: Vec::new(), divider: 4, order: BitOrder::MsbFirst, mode: 0 }
    }
}

impl SimSpi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpiPort for SimSpi {
    fn begin(&mut self) {
        self.enabled = true;
    }

    fn end(&mut self) {
        self.enabled = false;
    }

    fn transfer(&mut self, byte: u8) -> u8 {
        self.mosi.push(byte);
        !byte
    }

    fn set_clock_divider(&mut self, divider: u16) {
        self.divider = divider;
    }

    fn set_bit_order(&mut self, order: BitOrder) {
        self.order = order;
    }

    fn set_data_mode(&mut self, mode: u8) {
        self.mode = mode;
    }
}

#[derive(Debug, Default)]
pub struct SimServo {
    pin: Option<PhysicalPin>,
    pulse_us: u16,
    trim_us: i16,
}

impl SimServo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&self) -> Option<PhysicalPin> {
        self.pin
    }

    pub fn trim(&self) -> i16 {
        self.trim_us
    }
}

impl ServoPort for SimServo {
    fn attach(&mut self, pin: PhysicalPin) -> bool {
        self.pin = Some(pin);
        true
    }

    fn detach(&mut self) {
        self.pin = None;
    }

    fn attached(&self) -> bool {
        self.pin.is_some()
    }

    fn write_us(&mut self, pulse_us: u16) {
        self.pulse_us = pulse_us;
    }

    fn read_us(&self) -> u16 {
        self.pulse_us
    }

    fn set_trim(&mut self, trim_us: i16) {
        self.trim_us = trim_us;
    }
}

#[derive(Debug, Default)]
pub struct SimDac {
    pub output_pins: HashSet<PhysicalPin>,
    pub levels: HashMap<PhysicalPin, u16>,
}

impl SimDac {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalogOut for SimDac {
    fn set_output_mode(&mut self, pin: PhysicalPin) {
        self.output_pins.insert(pin);
    }

    fn analog_write(&mut self, pin: PhysicalPin, value: u16) {
        self.levels.insert(pin, value);
    }
}

#[derive(Debug, Default)]
pub struct SimRgb {
    pub controlled: bool,
    pub color: (u8, u8, u8),
    pub brightness: u8,
}

impl SimRgb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RgbPort for SimRgb {
    fn control(&mut self, take: bool) {
        self.controlled = take;
    }

    fn controlled(&self) -> bool {
        self.controlled
    }

    fn color(&mut self, r: u8, g: u8, b: u8) {
        self.color = (r, g, b);
    }

    fn brightness(&mut self, level: u8) {
        self.brightness = level;
    }
}

/// One GPIO pad.  Reads consume queued levels first, then return the last
/// level seen; writes are recorded and also become the read-back level.
#[derive(Debug, Default)]
pub struct SimPin {
    level: bool,
    inputs: VecDeque<bool>,
    writes: Vec<bool>,
    modes: Vec<PinMode>,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue levels for the next reads.
    pub fn feed(&mut self, levels: &[bool]) {
        self.inputs.extend(levels);
    }

    pub fn writes(&self) -> &[bool] {
        &self.writes
    }

    pub fn mode(&self) -> Option<PinMode> {
        self.modes.last().copied()
    }

    pub fn modes(&self) -> &[PinMode] {
        &self.modes
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        if let Some(level) = self.inputs.pop_front() {
            self.level = level;
        }
        Ok(self.level)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.level = false;
        self.writes.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.level = true;
        self.writes.push(true);
        Ok(())
    }
}

impl PinConfig for SimPin {
    fn set_mode(&mut self, mode: PinMode) {
        self.modes.push(mode);
    }
}

// ───────────────────────────────────────────────────────────────
// Wi-Fi
// ───────────────────────────────────────────────────────────────

/// Radio that becomes ready after a fixed number of readiness polls.
#[derive(Debug)]
pub struct SimWifiRadio {
    powered: bool,
    associating: bool,
    polls_until_ready: Cell<u32>,
    /// Polls needed after each `connect`; `u32::MAX` never associates.
    pub connect_polls: u32,
    listening: bool,
    stored: Vec<AccessPoint>,
    pub visible: Vec<AccessPoint>,
    pub hosts: HashMap<String, Ipv4Addr>,
}

impl Default for SimWifiRadio {
    fn default() -> Self {
        Self {
            powered: false,
            associating: false,
            polls_until_ready: Cell::new(0),
            connect_polls: 3,
            listening: false,
            stored: Vec::new(),
            visible: Vec::new(),
            hosts: HashMap::new(),
        }
    }
}

impl SimWifiRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }
}

impl WifiRadio for SimWifiRadio {
    fn on(&mut self) {
        self.powered = true;
    }

    fn off(&mut self) {
        self.powered = false;
        self.associating = false;
    }

    fn connect(&mut self) {
        if self.powered && !self.stored.is_empty() {
            self.associating = true;
            self.polls_until_ready.set(self.connect_polls);
        }
    }

    fn disconnect(&mut self) {
        self.associating = false;
    }

    fn is_ready(&self) -> bool {
        if !self.associating {
            return false;
        }
        let left = self.polls_until_ready.get();
        if left == 0 {
            return true;
        }
        if left != u32::MAX {
            self.polls_until_ready.set(left - 1);
        }
        false
    }

    fn start_listen(&mut self) {
        self.listening = true;
    }

    fn stop_listen(&mut self) {
        self.listening = false;
    }

    fn is_listening(&self) -> bool {
        self.listening
    }

    fn set_credentials(&mut self, ssid: &str, _password: &str, security: Security, cipher: Cipher) -> bool {
        let mut name = heapless::String::new();
        if name.push_str(ssid).is_err() {
            return false;
        }
        self.stored.retain(|ap| ap.ssid != name);
        self.stored.push(AccessPoint { ssid: name, bssid: [0; 6], security, cipher, channel: 0, rssi: 0 });
        true
    }

    fn has_credentials(&self) -> bool {
        !self.stored.is_empty()
    }

    fn clear_credentials(&mut self) -> bool {
        self.stored.clear();
        true
    }

    fn credentials(&self) -> Vec<AccessPoint> {
        self.stored.clone()
    }

    fn scan(&mut self) -> Vec<AccessPoint> {
        self.visible.clone()
    }

    fn mac_address(&self) -> [u8; 6] {
        [0x94, 0xA1, 0xA2, 0x00, 0x00, 0x01]
    }

    fn ssid(&self) -> heapless::String<32> {
        self.stored.last().map(|ap| ap.ssid.clone()).unwrap_or_default()
    }

    fn bssid(&self) -> [u8; 6] {
        [0x02, 0, 0, 0, 0, 0x01]
    }

    fn rssi(&self) -> i8 {
        -52
    }

    fn local_ip(&self) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, 50)
    }

    fn subnet_mask(&self) -> Ipv4Addr {
        Ipv4Addr::new(255, 255, 255, 0)
    }

    fn gateway_ip(&self) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, 1)
    }

    fn ping(&mut self, ip: Ipv4Addr, tries: u8) -> u8 {
        if ip == self.gateway_ip() { tries } else { 0 }
    }

    fn resolve(&mut self, host: &str) -> Option<Ipv4Addr> {
        self.hosts.get(host).copied()
    }
}

/// Manual clock: `sleep_ms` advances time instantly.  Each `now_us` read
/// also moves time forward by `tick_us`, so busy-wait loops terminate.
#[derive(Debug, Default)]
pub struct SimClock {
    now_us: Cell<u64>,
    tick_us: u64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticking(tick_us: u64) -> Self {
        Self { now_us: Cell::new(0), tick_us }
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_us.get() / 1000
    }

    fn sleep_ms(&self, ms: u32) {
        self.now_us.set(self.now_us.get() + u64::from(ms) * 1000);
    }

    fn now_us(&self) -> u64 {
        let now = self.now_us.get();
        self.now_us.set(now + self.tick_us);
        now
    }
}
