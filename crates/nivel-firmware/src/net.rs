//! Wi-Fi bring-up and the smoltcp-backed [`Transport`].
//!
//! The interface, the DHCP client and a small pool of listening TCP sockets
//! are all driven from [`Transport::poll`], which the main cycle calls once
//! per tick. Nothing here spawns a task or blocks after bring-up.

use alloc::string::String;
use alloc::vec::Vec;

use embassy_time::{Duration, Instant as EmbassyInstant, Timer, with_timeout};
use esp_radio::Controller as RadioController;
use esp_radio::wifi::{self, ClientConfig, ModeConfig, WifiController, WifiDevice};
use heapless::String as HString;
use log::{debug, info, warn};
use nivel_core::app_state::AppError;
use nivel_core::config::{HTTP_PORT, NETWORK_INIT_TIMEOUT_MS, WifiCredentials};
use nivel_core::http::{ConnectionId, EventQueue, Transport, TransportError, TransportEvent};
use smoltcp::iface::{Config as IfaceConfig, Interface, SocketHandle, SocketSet, SocketStorage};
use smoltcp::socket::{dhcpv4, tcp};
use smoltcp::time::Instant;
use smoltcp::wire::{EthernetAddress, HardwareAddress, IpCidr, Ipv4Address};
use static_cell::StaticCell;

/// Listening sockets; this many clients can be served at once.
pub const TCP_SOCKETS: usize = 2;
const TCP_RX_BUFFER: usize = 1536;
const TCP_TX_BUFFER: usize = 2048;

/// Interval between polls while waiting for a DHCP lease.
const LEASE_POLL_MS: u64 = 50;

static RADIO: StaticCell<RadioController<'static>> = StaticCell::new();
static SOCKET_STORAGE: StaticCell<[SocketStorage<'static>; TCP_SOCKETS + 1]> = StaticCell::new();
static TCP_BUFFERS: StaticCell<[([u8; TCP_RX_BUFFER], [u8; TCP_TX_BUFFER]); TCP_SOCKETS]> =
    StaticCell::new();

struct Slot {
    handle: SocketHandle,
    conn: Option<ConnectionId>,
    /// Bytes written and not yet reported as sent.
    in_flight: usize,
    closing: bool,
    peer_closed: bool,
}

/// smoltcp interface plus the sockets serving the configuration service.
pub struct SmoltcpTransport {
    // Dropping the controller stops the radio.
    _controller: WifiController<'static>,
    device: WifiDevice<'static>,
    iface: Interface,
    sockets: SocketSet<'static>,
    dhcp: SocketHandle,
    slots: heapless::Vec<Slot, TCP_SOCKETS>,
    address: Option<Ipv4Address>,
    next_conn: ConnectionId,
}

impl SmoltcpTransport {
    fn new(controller: WifiController<'static>, mut device: WifiDevice<'static>) -> Self {
        let mac = device.mac_address();
        let mut config = IfaceConfig::new(HardwareAddress::Ethernet(EthernetAddress(mac)));
        config.random_seed = u64::from_le_bytes([mac[0], mac[1], mac[2], mac[3], mac[4], mac[5], 0x6e, 0x76]);
        let iface = Interface::new(config, &mut device, timestamp());

        let storage = SOCKET_STORAGE.init([SocketStorage::EMPTY; TCP_SOCKETS + 1]);
        let mut sockets = SocketSet::new(&mut storage[..]);
        let dhcp = sockets.add(dhcpv4::Socket::new());

        let buffers = TCP_BUFFERS.init([([0; TCP_RX_BUFFER], [0; TCP_TX_BUFFER]); TCP_SOCKETS]);
        let mut slots = heapless::Vec::new();
        for (rx, tx) in buffers.iter_mut() {
            let socket = tcp::Socket::new(
                tcp::SocketBuffer::new(&mut rx[..]),
                tcp::SocketBuffer::new(&mut tx[..]),
            );
            let handle = sockets.add(socket);
            let _ = slots.push(Slot {
                handle,
                conn: None,
                in_flight: 0,
                closing: false,
                peer_closed: false,
            });
        }

        let mut transport = Self {
            _controller: controller,
            device,
            iface,
            sockets,
            dhcp,
            slots,
            address: None,
            next_conn: 0,
        };
        transport.listen_all();
        transport
    }

    /// The address leased by DHCP, once there is one.
    pub fn address(&self) -> Option<Ipv4Address> {
        self.address
    }

    fn listen_all(&mut self) {
        for slot in self.slots.iter() {
            let socket = self.sockets.get_mut::<tcp::Socket>(slot.handle);
            if !socket.is_open() {
                if let Err(e) = socket.listen(HTTP_PORT) {
                    warn!("TCP listen failed: {:?}", e);
                }
            }
        }
    }

    fn poll_interface(&mut self) {
        self.iface
            .poll(timestamp(), &mut self.device, &mut self.sockets);

        let event = self.sockets.get_mut::<dhcpv4::Socket>(self.dhcp).poll();
        match event {
            Some(dhcpv4::Event::Configured(config)) => {
                info!("DHCP lease: {}", config.address);
                self.iface.update_ip_addrs(|addrs| {
                    addrs.clear();
                    let _ = addrs.push(IpCidr::Ipv4(config.address));
                });
                if let Some(router) = config.router {
                    let _ = self.iface.routes_mut().add_default_ipv4_route(router);
                } else {
                    self.iface.routes_mut().remove_default_ipv4_route();
                }
                self.address = Some(config.address.address());
            }
            Some(dhcpv4::Event::Deconfigured) => {
                warn!("DHCP lease lost");
                self.iface.update_ip_addrs(|addrs| addrs.clear());
                self.iface.routes_mut().remove_default_ipv4_route();
                self.address = None;
            }
            None => {}
        }
    }

    fn slot_for(&mut self, conn: ConnectionId) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.conn == Some(conn))
    }
}

impl Transport for SmoltcpTransport {
    fn poll(&mut self, _now_ms: u32, events: &mut EventQueue) {
        self.poll_interface();

        for slot in self.slots.iter_mut() {
            if events.is_full() {
                break;
            }
            let socket = self.sockets.get_mut::<tcp::Socket>(slot.handle);

            let Some(conn) = slot.conn else {
                if socket.is_active() {
                    let conn = self.next_conn;
                    self.next_conn = self.next_conn.wrapping_add(1);
                    debug!("TCP accept {:?} as {}", socket.remote_endpoint(), conn);
                    slot.conn = Some(conn);
                    slot.in_flight = 0;
                    slot.closing = false;
                    slot.peer_closed = false;
                    let _ = events.push_back(TransportEvent::Accepted(conn));
                } else if !socket.is_open() {
                    let _ = socket.listen(HTTP_PORT);
                }
                continue;
            };

            if slot.closing {
                if !socket.is_active() {
                    slot.conn = None;
                    if !socket.is_open() {
                        let _ = socket.listen(HTTP_PORT);
                    }
                }
                continue;
            }

            let queued = socket.send_queue();
            if slot.in_flight > queued && !events.is_full() {
                let len = slot.in_flight - queued;
                slot.in_flight = queued;
                let _ = events.push_back(TransportEvent::Sent { conn, len });
            }

            if socket.can_recv() && !events.is_full() {
                let payload = socket
                    .recv(|buf| (buf.len(), buf.to_vec()))
                    .unwrap_or_else(|_| Vec::new());
                if !payload.is_empty() {
                    let _ = events.push_back(TransportEvent::Received { conn, payload });
                }
            }

            if !socket.may_recv() && !slot.peer_closed && !events.is_full() {
                slot.peer_closed = true;
                let _ = events.push_back(TransportEvent::PeerClosed(conn));
            }
        }
    }

    fn write(&mut self, conn: ConnectionId, data: &[u8]) -> Result<usize, TransportError> {
        let handle = self
            .slot_for(conn)
            .filter(|s| !s.closing)
            .map(|s| s.handle)
            .ok_or(TransportError::UnknownConnection)?;

        let socket = self.sockets.get_mut::<tcp::Socket>(handle);
        if !socket.may_send() {
            return Err(TransportError::Closed);
        }
        let written = socket.send_slice(data).map_err(|e| {
            warn!("TCP send on {} failed: {:?}", conn, e);
            TransportError::Stack
        })?;

        if let Some(slot) = self.slot_for(conn) {
            slot.in_flight += written;
        }
        Ok(written)
    }

    fn close(&mut self, conn: ConnectionId) {
        let Some(handle) = self.slot_for(conn).map(|s| {
            s.closing = true;
            s.handle
        }) else {
            return;
        };
        self.sockets.get_mut::<tcp::Socket>(handle).close();
    }
}

/// Interface clock. smoltcp timers are absolute, so this must not wrap.
fn timestamp() -> Instant {
    Instant::from_millis(EmbassyInstant::now().as_millis() as i64)
}

fn now_ms() -> u32 {
    EmbassyInstant::now().as_millis() as u32
}

fn network_error(context: &str, detail: impl core::fmt::Debug) -> AppError {
    use core::fmt::Write;

    let mut message: HString<64> = HString::new();
    let _ = write!(message, "{}: {:?}", context, detail);
    warn!("{}", message);
    AppError::network_init(&message)
}

/// Join the network and wait for a DHCP lease, all within
/// [`NETWORK_INIT_TIMEOUT_MS`].
pub async fn bring_up(
    wifi_peripheral: esp_hal::peripherals::WIFI<'static>,
    credentials: WifiCredentials<'_>,
) -> Result<SmoltcpTransport, AppError> {
    let started = now_ms();

    let radio = esp_radio::init().map_err(|e| network_error("radio init", e))?;
    let radio = RADIO.init(radio);

    let (mut controller, interfaces) = wifi::new(radio, wifi_peripheral, Default::default())
        .map_err(|e| network_error("wifi driver", e))?;

    let client_config = ModeConfig::Client(
        ClientConfig::default()
            .with_ssid(String::from(credentials.ssid))
            .with_password(String::from(credentials.password)),
    );
    controller
        .set_config(&client_config)
        .map_err(|e| network_error("wifi config", e))?;
    controller
        .start_async()
        .await
        .map_err(|e| network_error("wifi start", e))?;

    info!("Connecting to \"{}\"", credentials.ssid);
    let timeout = Duration::from_millis(u64::from(NETWORK_INIT_TIMEOUT_MS));
    match with_timeout(timeout, controller.connect_async()).await {
        Ok(Ok(())) => info!("Wi-Fi associated"),
        Ok(Err(e)) => return Err(network_error("wifi connect", e)),
        Err(_) => return Err(network_error("wifi connect", "timeout")),
    }

    let mut transport = SmoltcpTransport::new(controller, interfaces.sta);
    loop {
        let now = now_ms();
        transport.poll_interface();
        if transport.address().is_some() {
            return Ok(transport);
        }
        if now.wrapping_sub(started) >= NETWORK_INIT_TIMEOUT_MS {
            return Err(network_error("dhcp", "no lease"));
        }
        Timer::after(Duration::from_millis(LEASE_POLL_MS)).await;
    }
}
