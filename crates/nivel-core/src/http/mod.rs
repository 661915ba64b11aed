//! Single-listener configuration service.
//!
//! A tiny HTTP/1.1 responder on top of a cooperative, non-blocking
//! transport. The transport is polled once per main-cycle tick; whatever it
//! reports (accepts, received bytes, send completions, peer closes) is fed
//! through per-connection state machines before control returns to the
//! cycle.
//!
//! | request                          | response                          |
//! |----------------------------------|-----------------------------------|
//! | `GET /limites?min=<f>&max=<f>`   | `302` to `/`, thresholds replaced |
//! | `GET /estado`                    | `200` JSON `{"nivel":..,"bomba":..}` |
//! | anything else                    | `200` the control page            |
//!
//! Every response is followed by a close; there is no keep-alive and no
//! idle timeout.

pub mod page;
pub mod request;
pub mod response;
pub mod service;
pub mod transport;

pub use request::{Request, classify};
pub use response::{HttpResponse, ResponseError};
pub use service::{ConfigService, MAX_CONNECTIONS};
pub use transport::{ConnectionId, EventQueue, Transport, TransportError, TransportEvent};
