//! Request construction and dispatch.
//!
//! [`RequestDispatcher`] owns a reusable fixed-capacity scratch buffer into
//! which the request head (request line plus headers) is serialized before
//! each send. Exceeding the capacity is a configuration error and is reported
//! as [`RequestError::WriteFailed`], never silently truncated.
//!
//! Every request carries a fixed `Content-Type` demonstration header and a
//! fixed body (empty for HEAD).

use std::fmt;

use log::{debug, info};

use crate::response::{summarize, ResponseSummary};
use crate::transport::{TransportClient, TransportError, TransportSession};

/// The fixed demonstration header attached to every request.
pub const CONTENT_TYPE_FIELD: &str = "Content-Type";
/// Value of the fixed demonstration header.
pub const CONTENT_TYPE_VALUE: &str = "application/x-www-form-urlencoded";

/// Fixed request body sent with every non-HEAD request.
pub const REQUEST_BODY: &[u8] = b"Hello";

/// HTTP request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Head,
}

impl Method {
    /// The verb token as it appears on the request line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Head => "HEAD",
        }
    }

    /// Parse a request-line verb token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "HEAD" => Some(Self::Head),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured request head handed to the transport driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub path: String,
    /// Extra headers beyond Host and Content-Length.
    pub headers: Vec<(String, String)>,
}

/// Reusable scratch buffer with a hard capacity limit.
///
/// The buffer is cleared and refilled on every request; a value sliced out
/// of it is only valid until the next request.
pub struct HeaderBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

impl HeaderBuffer {
    /// Create a buffer that holds at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Hard capacity limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written since the last clear.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written since the last clear.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Serialized content.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Discard the previous request's content.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        let needed = self.buf.len() + bytes.len();
        if needed > self.capacity {
            return Err(WriteError::Capacity {
                needed,
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }
}

/// Head serialization failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The serialized head does not fit the scratch buffer.
    Capacity { needed: usize, capacity: usize },
    /// A request field contains bytes that cannot appear on the wire.
    InvalidField(&'static str),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capacity { needed, capacity } => write!(
                f,
                "request head needs {} bytes, buffer capacity is {}",
                needed, capacity
            ),
            Self::InvalidField(field) => write!(f, "invalid request field: {}", field),
        }
    }
}

impl std::error::Error for WriteError {}

fn valid_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_graphic() && b != b':')
}

fn valid_value(s: &str) -> bool {
    s.bytes().all(|b| b != b'\r' && b != b'\n')
}

/// Serialize a request head into `buffer`.
///
/// Returns the number of bytes written. The buffer is cleared first, so a
/// failed serialization leaves it holding the partial head; callers treat any
/// error as non-recoverable for this request.
pub fn serialize_head(
    buffer: &mut HeaderBuffer,
    head: &RequestHead,
    host: &str,
    content_len: usize,
) -> Result<usize, WriteError> {
    if !head.path.starts_with('/') || !head.path.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(WriteError::InvalidField("path"));
    }
    if !valid_value(host) || host.is_empty() {
        return Err(WriteError::InvalidField("host"));
    }

    buffer.clear();
    buffer.push(head.method.as_str().as_bytes())?;
    buffer.push(b" ")?;
    buffer.push(head.path.as_bytes())?;
    buffer.push(b" HTTP/1.1\r\n")?;

    buffer.push(b"Host: ")?;
    buffer.push(host.as_bytes())?;
    buffer.push(b"\r\n")?;

    for (field, value) in &head.headers {
        if !valid_token(field) {
            return Err(WriteError::InvalidField("header field"));
        }
        if !valid_value(value) {
            return Err(WriteError::InvalidField("header value"));
        }
        buffer.push(field.as_bytes())?;
        buffer.push(b": ")?;
        buffer.push(value.as_bytes())?;
        buffer.push(b"\r\n")?;
    }

    buffer.push(b"Content-Length: ")?;
    buffer.push(content_len.to_string().as_bytes())?;
    buffer.push(b"\r\n\r\n")?;

    Ok(buffer.len())
}

/// Parse a serialized request head back into its structured form.
///
/// Counterpart of [`serialize_head`]; the `Host` and `Content-Length` headers
/// it adds are folded back into the returned header list.
pub fn parse_head(bytes: &[u8]) -> Result<RequestHead, WriteError> {
    let text = std::str::from_utf8(bytes).map_err(|_| WriteError::InvalidField("encoding"))?;
    let text = text
        .strip_suffix("\r\n\r\n")
        .ok_or(WriteError::InvalidField("terminator"))?;

    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or(WriteError::InvalidField("request line"))?;

    let mut parts = request_line.split(' ');
    let method = parts
        .next()
        .and_then(Method::from_token)
        .ok_or(WriteError::InvalidField("method"))?;
    let path = parts
        .next()
        .ok_or(WriteError::InvalidField("path"))?
        .to_string();
    if parts.next() != Some("HTTP/1.1") {
        return Err(WriteError::InvalidField("version"));
    }

    let mut headers = Vec::new();
    for line in lines {
        let (field, value) = line
            .split_once(": ")
            .ok_or(WriteError::InvalidField("header line"))?;
        headers.push((field.to_string(), value.to_string()));
    }

    Ok(RequestHead {
        method,
        path,
        headers,
    })
}

/// Errors from [`RequestDispatcher::dispatch`]. Both variants are
/// recoverable: the command loop reports them and keeps running.
#[derive(Debug)]
pub enum RequestError {
    /// Head serialization failed (buffer too small or invalid field).
    WriteFailed(WriteError),
    /// The transport rejected or failed the send.
    SendFailed(TransportError),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed(e) => write!(f, "failed to write request head: {}", e),
            Self::SendFailed(e) => write!(f, "failed to send request: {}", e),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WriteFailed(e) => Some(e),
            Self::SendFailed(e) => Some(e),
        }
    }
}

impl From<WriteError> for RequestError {
    fn from(e: WriteError) -> Self {
        Self::WriteFailed(e)
    }
}

/// Serializes requests into the shared scratch buffer and submits them over
/// an established transport session.
pub struct RequestDispatcher {
    buffer: HeaderBuffer,
    host: String,
}

impl RequestDispatcher {
    /// Create a dispatcher for the given server host with the given scratch
    /// capacity.
    pub fn new(host: impl Into<String>, buffer_capacity: usize) -> Self {
        Self {
            buffer: HeaderBuffer::with_capacity(buffer_capacity),
            host: host.into(),
        }
    }

    /// Scratch buffer capacity.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Serialized head of the most recent request. Invalidated by the next
    /// dispatch.
    pub fn last_head(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Send one request and interpret the response.
    pub fn dispatch<C: TransportClient>(
        &mut self,
        session: &mut TransportSession<C>,
        method: Method,
        path: &str,
    ) -> Result<ResponseSummary, RequestError> {
        let body: &[u8] = if method == Method::Head {
            &[]
        } else {
            REQUEST_BODY
        };

        let head = RequestHead {
            method,
            path: path.to_string(),
            headers: vec![(
                CONTENT_TYPE_FIELD.to_string(),
                CONTENT_TYPE_VALUE.to_string(),
            )],
        };

        let head_len = serialize_head(&mut self.buffer, &head, &self.host, body.len())?;
        info!(
            "Sending request headers ({} bytes):\n{}",
            head_len,
            String::from_utf8_lossy(self.buffer.as_bytes())
        );

        let response = session
            .send(&head, body)
            .map_err(RequestError::SendFailed)?;

        let mut summary = summarize(&response);
        if method == Method::Head {
            // A HEAD exchange never reports a body.
            summary.body_len = 0;
        }

        debug!(
            "headers_len:[{}] header_count:[{}] body_len:[{}] content_len:[{}]",
            summary.header_len, summary.header_count, summary.body_len, summary.content_len
        );

        Ok(summary)
    }
}
