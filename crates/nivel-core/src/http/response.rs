//! Response framing into a fixed-capacity buffer.

use core::fmt::Write;

use heapless::String;
use thiserror_no_std::Error;

use super::page::INDEX_HTML;
use crate::pump::PumpState;

/// Upper bound for one complete response, headers included.
pub const RESPONSE_CAPACITY: usize = 4096;

const REDIRECT_TO_ROOT: &str = "HTTP/1.1 302 Found\r\nLocation: /\r\n\r\n";

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseError {
    #[error("Response does not fit in the 4096-byte buffer")]
    Overflow,
}

impl From<core::fmt::Error> for ResponseError {
    fn from(_: core::fmt::Error) -> Self {
        ResponseError::Overflow
    }
}

/// A fully framed response, ready to be handed to the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    text: String<RESPONSE_CAPACITY>,
}

impl HttpResponse {
    /// `302` back to the control page.
    pub fn redirect_to_root() -> Result<Self, ResponseError> {
        let mut text = String::new();
        text.push_str(REDIRECT_TO_ROOT)
            .map_err(|_| ResponseError::Overflow)?;
        Ok(Self { text })
    }

    /// `200` with the current level and pump state as JSON.
    pub fn status(percent: f32, pump: PumpState) -> Result<Self, ResponseError> {
        let mut body: String<64> = String::new();
        write!(
            body,
            "{{\"nivel\":{:.1},\"bomba\":{}}}",
            percent, pump.engaged
        )?;
        Self::ok("application/json", &body)
    }

    /// `200` with the control page.
    pub fn index() -> Result<Self, ResponseError> {
        Self::ok("text/html", INDEX_HTML)
    }

    fn ok(content_type: &str, body: &str) -> Result<Self, ResponseError> {
        let mut text = String::new();
        write!(
            text,
            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            content_type,
            body.len()
        )?;
        text.push_str(body).map_err(|_| ResponseError::Overflow)?;
        Ok(Self { text })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
