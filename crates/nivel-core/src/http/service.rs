//! Per-connection request/response state machines.

use alloc::boxed::Box;

use heapless::Vec;
use log::{debug, info, warn};

use super::request::{Request, classify};
use super::response::{HttpResponse, ResponseError};
use super::transport::{ConnectionId, EventQueue, Transport, TransportError, TransportEvent};
use crate::app_state::AppState;

/// Simultaneous connections tracked; further accepts are closed at once.
pub const MAX_CONNECTIONS: usize = 4;

/// The response being delivered on one connection.
#[derive(Debug)]
struct HttpExchange {
    response: HttpResponse,
    /// Bytes handed to the transport so far.
    bytes_queued: usize,
    /// Bytes the transport reported as sent.
    bytes_sent: usize,
}

impl HttpExchange {
    fn new(response: HttpResponse) -> Self {
        Self {
            response,
            bytes_queued: 0,
            bytes_sent: 0,
        }
    }

    fn total_len(&self) -> usize {
        self.response.len()
    }

    fn is_delivered(&self) -> bool {
        self.bytes_sent >= self.response.len()
    }

    fn unqueued(&self) -> &[u8] {
        &self.response.as_bytes()[self.bytes_queued..]
    }
}

#[derive(Debug)]
enum ConnectionState {
    /// Waiting for the request.
    Accepted,
    Responding(Box<HttpExchange>),
    /// Close has been issued; the slot is released at the end of the poll.
    Closing,
}

#[derive(Debug)]
struct Connection {
    id: ConnectionId,
    state: ConnectionState,
}

/// The configuration service: turns transport events into responses and
/// threshold updates.
pub struct ConfigService {
    connections: Vec<Connection, MAX_CONNECTIONS>,
    events: EventQueue,
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigService {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            events: EventQueue::new(),
        }
    }

    /// Number of connections currently holding a slot.
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    /// Poll the transport once and process everything it reported.
    ///
    /// Returns the number of events handled.
    pub fn poll<T: Transport>(&mut self, transport: &mut T, state: &mut AppState, now_ms: u32) -> usize {
        transport.poll(now_ms, &mut self.events);

        let mut handled = 0;
        while let Some(event) = self.events.pop_front() {
            self.handle_event(transport, state, event);
            handled += 1;
        }

        // Retry anything the transport could not take earlier.
        for idx in 0..self.connections.len() {
            self.flush(transport, idx);
        }

        self.connections
            .retain(|c| !matches!(c.state, ConnectionState::Closing));
        handled
    }

    fn handle_event<T: Transport>(&mut self, transport: &mut T, state: &mut AppState, event: TransportEvent) {
        let conn = event.connection();

        if let TransportEvent::Accepted(_) = event {
            self.accept(transport, conn);
            return;
        }

        let Some(idx) = self.connections.iter().position(|c| c.id == conn) else {
            debug!("Event for untracked connection {}: {:?}", conn, event);
            return;
        };

        match event {
            TransportEvent::Accepted(_) => {}
            TransportEvent::Received { payload, .. } => {
                if payload.is_empty() {
                    debug!("Connection {} closed by peer", conn);
                    self.close(transport, idx);
                } else if let ConnectionState::Accepted = self.connections[idx].state {
                    self.respond(transport, state, idx, &payload);
                } else {
                    debug!(
                        "Ignoring {} extra bytes on connection {}",
                        payload.len(),
                        conn
                    );
                }
            }
            TransportEvent::Sent { len, .. } => {
                let delivered = match &mut self.connections[idx].state {
                    ConnectionState::Responding(exchange) => {
                        exchange.bytes_sent += len;
                        exchange.is_delivered()
                    }
                    _ => false,
                };
                if delivered {
                    self.close(transport, idx);
                } else {
                    self.flush(transport, idx);
                }
            }
            TransportEvent::PeerClosed(_) => {
                debug!("Connection {} closed by peer", conn);
                self.close(transport, idx);
            }
        }
    }

    fn accept<T: Transport>(&mut self, transport: &mut T, conn: ConnectionId) {
        let connection = Connection {
            id: conn,
            state: ConnectionState::Accepted,
        };
        match self.connections.push(connection) {
            Ok(()) => info!("Connection {} accepted", conn),
            Err(_) => {
                warn!(
                    "Connection table full ({}), rejecting {}",
                    MAX_CONNECTIONS, conn
                );
                transport.close(conn);
            }
        }
    }

    fn respond<T: Transport>(&mut self, transport: &mut T, state: &mut AppState, idx: usize, raw: &[u8]) {
        let conn = self.connections[idx].id;
        let request = classify(raw);
        debug!("Connection {} request: {:?}", conn, request);

        match build_response(request, state) {
            Ok(response) => {
                self.connections[idx].state =
                    ConnectionState::Responding(Box::new(HttpExchange::new(response)));
                self.flush(transport, idx);
            }
            Err(e) => {
                warn!("Connection {}: {}", conn, e);
                self.close(transport, idx);
            }
        }
    }

    /// Hand as much of the pending response to the transport as it accepts.
    fn flush<T: Transport>(&mut self, transport: &mut T, idx: usize) {
        let conn = self.connections[idx].id;
        let ConnectionState::Responding(exchange) = &mut self.connections[idx].state else {
            return;
        };

        let mut failure: Option<TransportError> = None;
        while !exchange.unqueued().is_empty() {
            match transport.write(conn, exchange.unqueued()) {
                Ok(0) => break,
                Ok(n) => exchange.bytes_queued += n,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            warn!("Write on connection {} failed: {}", conn, e);
            self.close(transport, idx);
        }
    }

    fn close<T: Transport>(&mut self, transport: &mut T, idx: usize) {
        let connection = &mut self.connections[idx];
        if let ConnectionState::Closing = connection.state {
            return;
        }
        if let ConnectionState::Responding(exchange) = &connection.state {
            info!(
                "Connection {} closed ({}/{} bytes sent)",
                connection.id,
                exchange.bytes_sent,
                exchange.total_len()
            );
        } else {
            info!("Connection {} closed", connection.id);
        }
        transport.close(connection.id);
        connection.state = ConnectionState::Closing;
    }
}

/// Apply the request's side effect and frame its response.
fn build_response(request: Request, state: &mut AppState) -> Result<HttpResponse, ResponseError> {
    match request {
        Request::Limits(Some(thresholds)) => {
            state.set_thresholds(thresholds);
            HttpResponse::redirect_to_root()
        }
        Request::Limits(None) => {
            warn!("Malformed threshold request, configuration unchanged");
            HttpResponse::redirect_to_root()
        }
        Request::Status => HttpResponse::status(state.reading.percent, state.pump),
        Request::Index => HttpResponse::index(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdConfig;
    use crate::pump::PumpState;
    use crate::sensors::LevelReading;
    use crate::testing::FakeTransport;

    const STATUS: &[u8] = b"GET /estado HTTP/1.1\r\nHost: tank\r\n\r\n";

    fn body(response: &str) -> &str {
        response.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("")
    }

    #[test]
    fn test_status_after_boot() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        let mut state = AppState::new();

        let conn = transport.connect();
        transport.send(conn, STATUS);
        service.poll(&mut transport, &mut state, 0);

        assert_eq!(body(&transport.response(conn)), r#"{"nivel":0.0,"bomba":false}"#);
        assert!(!transport.is_closed(conn), "close waits for the send completion");

        transport.ack_all(conn);
        service.poll(&mut transport, &mut state, 500);
        assert!(transport.is_closed(conn));
        assert_eq!(service.open_connections(), 0);
    }

    #[test]
    fn test_status_reports_store() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        let mut state = AppState::new();
        state.reading = LevelReading::from_raw(1023);
        state.pump = PumpState::ON;

        let conn = transport.connect();
        transport.send(conn, STATUS);
        service.poll(&mut transport, &mut state, 0);

        assert_eq!(body(&transport.response(conn)), r#"{"nivel":24.0,"bomba":true}"#);
    }

    #[test]
    fn test_limits_update_and_redirect() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        let mut state = AppState::new();

        let conn = transport.connect();
        transport.send(conn, b"GET /limites?min=10&max=90 HTTP/1.1\r\n\r\n");
        service.poll(&mut transport, &mut state, 0);

        assert_eq!(state.thresholds, ThresholdConfig::new(10.0, 90.0));
        assert_eq!(
            transport.response(conn),
            "HTTP/1.1 302 Found\r\nLocation: /\r\n\r\n"
        );
    }

    #[test]
    fn test_malformed_limits_keep_config() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        let mut state = AppState::new();

        let conn = transport.connect();
        transport.send(conn, b"GET /limites?max=90 HTTP/1.1\r\n\r\n");
        service.poll(&mut transport, &mut state, 0);

        assert_eq!(state.thresholds, ThresholdConfig::default());
        assert!(transport.response(conn).starts_with("HTTP/1.1 302 Found"));
    }

    #[test]
    fn test_empty_receive_closes_without_response() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        let mut state = AppState::new();

        let conn = transport.connect();
        transport.send(conn, b"");
        service.poll(&mut transport, &mut state, 0);

        assert!(transport.is_closed(conn));
        assert!(transport.response(conn).is_empty());
        assert_eq!(service.open_connections(), 0);
    }

    #[test]
    fn test_partial_writes_deliver_whole_page() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        transport.write_limit = Some(512);
        let mut state = AppState::new();

        let conn = transport.connect();
        transport.send(conn, b"GET / HTTP/1.1\r\n\r\n");
        service.poll(&mut transport, &mut state, 0);
        assert_eq!(transport.response(conn).len(), 512);

        let total = HttpResponse::index().unwrap().len();
        let mut now = 0;
        while transport.response(conn).len() < total {
            transport.ack_all(conn);
            now += 500;
            service.poll(&mut transport, &mut state, now);
            assert!(
                !transport.is_closed(conn),
                "closed before the final completion"
            );
        }

        assert!(!transport.is_closed(conn));
        transport.ack_all(conn);
        service.poll(&mut transport, &mut state, now + 500);
        assert!(transport.is_closed(conn));
        assert_eq!(transport.response(conn), HttpResponse::index().unwrap().as_str());
        assert!(transport.write_calls > 1);
    }

    #[test]
    fn test_stalled_write_retried_next_poll() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        transport.write_limit = Some(0);
        let mut state = AppState::new();

        let conn = transport.connect();
        transport.send(conn, STATUS);
        service.poll(&mut transport, &mut state, 0);
        assert!(transport.response(conn).is_empty());

        transport.write_limit = None;
        service.poll(&mut transport, &mut state, 500);
        assert_eq!(body(&transport.response(conn)), r#"{"nivel":0.0,"bomba":false}"#);
    }

    #[test]
    fn test_peer_close_mid_response_releases_exchange() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        transport.write_limit = Some(64);
        let mut state = AppState::new();

        let conn = transport.connect();
        transport.send(conn, b"GET / HTTP/1.1\r\n\r\n");
        service.poll(&mut transport, &mut state, 0);
        assert_eq!(service.open_connections(), 1);

        transport.peer_close(conn);
        service.poll(&mut transport, &mut state, 500);
        assert_eq!(service.open_connections(), 0);
        assert!(transport.is_closed(conn));
    }

    #[test]
    fn test_write_failure_closes_locally() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        transport.fail_writes = true;
        let mut state = AppState::new();

        let conn = transport.connect();
        transport.send(conn, STATUS);
        service.poll(&mut transport, &mut state, 0);

        assert!(transport.is_closed(conn));
        assert_eq!(service.open_connections(), 0);
    }

    #[test]
    fn test_connection_table_limit() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        let mut state = AppState::new();

        let conns: std::vec::Vec<_> = (0..MAX_CONNECTIONS + 1).map(|_| transport.connect()).collect();
        service.poll(&mut transport, &mut state, 0);

        assert_eq!(service.open_connections(), MAX_CONNECTIONS);
        assert!(transport.is_closed(conns[MAX_CONNECTIONS]));
        assert!(conns[..MAX_CONNECTIONS].iter().all(|c| !transport.is_closed(*c)));
    }

    #[test]
    fn test_interleaved_connections() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        let mut state = AppState::new();

        let a = transport.connect();
        let b = transport.connect();
        transport.send(b, b"GET /limites?min=20&max=80 HTTP/1.1\r\n\r\n");
        transport.send(a, STATUS);
        service.poll(&mut transport, &mut state, 0);

        assert!(transport.response(b).starts_with("HTTP/1.1 302"));
        assert!(transport.response(a).starts_with("HTTP/1.1 200"));
        assert_eq!(state.thresholds, ThresholdConfig::new(20.0, 80.0));
    }

    #[test]
    fn test_extra_bytes_ignored() {
        let mut service = ConfigService::new();
        let mut transport = FakeTransport::new();
        let mut state = AppState::new();

        let conn = transport.connect();
        transport.send(conn, STATUS);
        transport.send(conn, b"GET /limites?min=1&max=2 HTTP/1.1\r\n\r\n");
        service.poll(&mut transport, &mut state, 0);

        assert_eq!(state.thresholds, ThresholdConfig::default());
        assert_eq!(body(&transport.response(conn)), r#"{"nivel":0.0,"bomba":false}"#);
    }
}
