//! Response interpretation.
//!
//! The transport driver fills in a [`TransportResponse`]; [`summarize`]
//! projects the byte-count metadata out of it for reporting. The projection
//! has no failure mode of its own: a malformed response produces a summary
//! of equally little meaning, so callers that care check
//! [`ResponseSummary::status_in_http_range`] before trusting the framing.

/// A completed exchange as reported by the transport driver.
///
/// The driver reuses its receive buffer across requests, so this value is
/// only meaningful until the next request is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Raw response header block.
    pub header: Vec<u8>,
    /// Response body.
    pub body: Vec<u8>,
    /// Number of headers in the header block.
    pub header_count: u32,
    /// Value of the Content-Length header (0 if absent).
    pub content_len: u32,
    /// True if the body did not fit the receive buffer and was cut short.
    pub truncated: bool,
}

/// Byte-count metadata for one request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSummary {
    pub status_code: u16,
    pub header_len: usize,
    pub body_len: usize,
    pub header_count: u32,
    pub content_len: u32,
    pub truncated: bool,
}

impl ResponseSummary {
    /// True if the status code lies in the valid HTTP range [100, 599].
    pub fn status_in_http_range(&self) -> bool {
        (100..=599).contains(&self.status_code)
    }
}

/// Project the reporting metadata out of a completed exchange.
pub fn summarize(response: &TransportResponse) -> ResponseSummary {
    ResponseSummary {
        status_code: response.status_code,
        header_len: response.header.len(),
        body_len: response.body.len(),
        header_count: response.header_count,
        content_len: response.content_len,
        truncated: response.truncated,
    }
}
