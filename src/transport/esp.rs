//! ESP-IDF secure transport adapter.
//!
//! Wraps `EspHttpConnection` (esp_http_client + esp-tls) behind the
//! [`TransportClient`] seam, configured for mutual TLS: client certificate
//! and private key from the credential set, server authentication against
//! the root CA via the global CA store.

use std::ffi::CStr;
use std::time::Duration;

use esp_idf_svc::http::client::{Configuration as HttpConfiguration, EspHttpConnection};
use esp_idf_svc::http::Method as HttpMethod;
use esp_idf_svc::io::Write;
use esp_idf_svc::tls::X509;
use log::{debug, info};

use super::{
    DisconnectKind, DisconnectObserver, TransportClient, TransportError, TransportFactory,
};
use crate::config::{ServerEndpoint, TlsCredentials};
use crate::request::{Method, RequestHead};
use crate::response::TransportResponse;

/// Headers the driver exposes by name lookup; esp_http_client has no API to
/// enumerate the raw header block, so reporting reconstructs these.
const REPORTED_HEADERS: [&str; 3] = ["Content-Type", "Content-Length", "Connection"];

fn http_method(method: Method) -> HttpMethod {
    match method {
        Method::Get => HttpMethod::Get,
        Method::Post => HttpMethod::Post,
        Method::Put => HttpMethod::Put,
        Method::Head => HttpMethod::Head,
    }
}

/// Convert a PEM blob to the NUL-terminated `'static` form esp-tls expects.
///
/// The credential buffers must outlive the session, which lives for the rest
/// of the process, so leaking the copy is the intended lifetime.
fn pem_x509(pem: &[u8], what: &'static str) -> Result<X509<'static>, TransportError> {
    let mut bytes = pem.to_vec();
    if bytes.last() != Some(&0) {
        bytes.push(0);
    }
    let leaked: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    let cstr = CStr::from_bytes_with_nul(leaked)
        .map_err(|_| TransportError::Credential(format!("{what}: embedded NUL byte")))?;
    Ok(X509::pem(cstr))
}

/// Builds [`EspTransport`] clients.
pub struct EspTransportFactory {
    timeout: Duration,
    buffer_capacity: usize,
}

impl EspTransportFactory {
    /// `timeout` bounds each driver operation; `buffer_capacity` bounds the
    /// response body read per exchange.
    pub fn new(timeout: Duration, buffer_capacity: usize) -> Self {
        Self {
            timeout,
            buffer_capacity,
        }
    }
}

impl TransportFactory for EspTransportFactory {
    type Client = EspTransport;

    fn create(
        &mut self,
        credentials: &TlsCredentials,
        endpoint: &ServerEndpoint,
        observer: DisconnectObserver,
    ) -> Result<Self::Client, TransportError> {
        let client_certificate = pem_x509(&credentials.client_cert, "client certificate")?;
        let private_key = pem_x509(&credentials.client_key, "client private key")?;

        // The root CA goes into esp-tls' global CA store; the connection
        // configuration then authenticates the server against it.
        let mut root_ca = credentials.root_ca.clone();
        if root_ca.last() != Some(&0) {
            root_ca.push(0);
        }
        let root_ca: &'static [u8] = Box::leak(root_ca.into_boxed_slice());
        // SAFETY: the blob is 'static, NUL-terminated PEM; the length passed
        // includes the terminator as esp-tls requires for PEM buffers.
        unsafe {
            esp_idf_sys::esp!(esp_idf_sys::esp_tls_init_global_ca_store())
                .map_err(|e| TransportError::Credential(format!("CA store init: {e:?}")))?;
            esp_idf_sys::esp!(esp_idf_sys::esp_tls_set_global_ca_store(
                root_ca.as_ptr(),
                root_ca.len() as u32,
            ))
            .map_err(|e| TransportError::Credential(format!("CA store load: {e:?}")))?;
        }

        Ok(EspTransport {
            config: HttpConfiguration {
                buffer_size: Some(self.buffer_capacity),
                timeout: Some(self.timeout),
                client_certificate: Some(client_certificate),
                private_key: Some(private_key),
                use_global_ca_store: true,
                ..Default::default()
            },
            base_url: format!("https://{endpoint}"),
            buffer_capacity: self.buffer_capacity,
            observer,
            connection: None,
        })
    }
}

/// ESP32 transport-client implementation.
pub struct EspTransport {
    config: HttpConfiguration,
    base_url: String,
    buffer_capacity: usize,
    observer: DisconnectObserver,
    connection: Option<EspHttpConnection>,
}

impl TransportClient for EspTransport {
    fn connect(&mut self, timeout: Duration) -> Result<(), TransportError> {
        self.config.timeout = Some(timeout);

        // esp_http_client defers the TCP connect and TLS handshake to the
        // first request on the connection; creating the connection validates
        // the configuration and credential material.
        let connection = EspHttpConnection::new(&self.config)
            .map_err(|e| TransportError::Connect(format!("{e:?}")))?;
        self.connection = Some(connection);

        info!("HTTPS client ready for {}", self.base_url);
        Ok(())
    }

    fn send(
        &mut self,
        head: &RequestHead,
        body: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        let connection = self.connection.as_mut().ok_or(TransportError::Closed)?;

        let url = format!("{}{}", self.base_url, head.path);
        let headers: Vec<(&str, &str)> = head
            .headers
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
            .collect();

        connection
            .initiate_request(http_method(head.method), &url, &headers)
            .map_err(|e| {
                self.observer.notify(DisconnectKind::NetworkLost);
                TransportError::Write(format!("{e:?}"))
            })?;
        connection
            .write_all(body)
            .map_err(|e| TransportError::Write(format!("{e:?}")))?;

        connection
            .initiate_response()
            .map_err(|e| TransportError::Send(format!("{e:?}")))?;

        let status_code = connection.status();
        let content_len = connection
            .header("Content-Length")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0);

        let mut header = Vec::new();
        let mut header_count = 0;
        for name in REPORTED_HEADERS {
            if let Some(value) = connection.header(name) {
                header.extend_from_slice(name.as_bytes());
                header.extend_from_slice(b": ");
                header.extend_from_slice(value.as_bytes());
                header.extend_from_slice(b"\r\n");
                header_count += 1;
            }
        }

        let mut response_body = vec![0u8; self.buffer_capacity];
        let mut body_len = 0;
        let mut truncated = false;
        loop {
            if body_len == response_body.len() {
                // More data than the receive buffer holds; drain one byte to
                // tell "exactly full" apart from "cut short".
                let mut probe = [0u8; 1];
                truncated = matches!(connection.read(&mut probe), Ok(n) if n > 0);
                break;
            }
            match connection.read(&mut response_body[body_len..]) {
                Ok(0) => break,
                Ok(n) => body_len += n,
                Err(e) => return Err(TransportError::Send(format!("{e:?}"))),
            }
        }
        response_body.truncate(body_len);

        debug!(
            "{} {} -> {} ({} body bytes)",
            head.method, head.path, status_code, body_len
        );

        Ok(TransportResponse {
            status_code,
            header,
            body: response_body,
            header_count,
            content_len,
            truncated,
        })
    }
}
