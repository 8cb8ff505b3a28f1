//! Secure transport configuration and session lifetime.
//!
//! The TLS/HTTP stack itself is an external collaborator behind the
//! [`TransportClient`] and [`TransportFactory`] traits; this module owns the
//! one-time configuration step, the session wrapper, and the disconnect
//! observer. The ESP-IDF implementation lives in [`esp`] (ESP32 only); a
//! scripted in-memory implementation for host testing lives in [`loopback`].

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::config::{ServerEndpoint, TlsCredentials};
use crate::request::RequestHead;
use crate::response::TransportResponse;

#[cfg(feature = "esp32")]
pub mod esp;
pub mod loopback;

/// Errors reported by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Credential material was rejected while building the client.
    Credential(String),
    /// TCP connect or TLS handshake failed.
    Connect(String),
    /// The handshake or exchange exceeded the configured timeout.
    Timeout,
    /// Writing the request to the wire failed.
    Write(String),
    /// The exchange failed after the request was written.
    Send(String),
    /// The session is not connected (never connected, or closed by the
    /// disconnect callback).
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential(e) => write!(f, "credential error: {}", e),
            Self::Connect(e) => write!(f, "connect failed: {}", e),
            Self::Timeout => write!(f, "transport timed out"),
            Self::Write(e) => write!(f, "write failed: {}", e),
            Self::Send(e) => write!(f, "send failed: {}", e),
            Self::Closed => write!(f, "transport not connected"),
        }
    }
}

impl std::error::Error for TransportError {}

/// How the remote end dropped the connection, as reported by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    /// The server closed the connection.
    ServerInitiated,
    /// The underlying network went away.
    NetworkLost,
}

impl fmt::Display for DisconnectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerInitiated => write!(f, "server-initiated disconnect"),
            Self::NetworkLost => write!(f, "network lost"),
        }
    }
}

/// Lifecycle of an established session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected and usable.
    Open,
    /// Disconnect reported, teardown in progress.
    Closing,
    /// Closed; sends must fail without touching the wire.
    Closed,
}

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Handle the transport driver invokes when the connection drops.
///
/// The callback fires from the network stack's own context, concurrently
/// with the worker driving the session, so the state lives in an atomic. It
/// performs no session repair: it only records that the session is gone.
#[derive(Clone)]
pub struct DisconnectObserver {
    state: Arc<AtomicU8>,
}

impl DisconnectObserver {
    fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(STATE_OPEN)),
        }
    }

    /// Record a disconnect. Safe to call from any thread.
    ///
    /// The callback side only marks the session `Closing`; the worker
    /// finishes the teardown (and records `Closed`) the next time it touches
    /// the session.
    pub fn notify(&self, kind: DisconnectKind) {
        warn!("Disconnect callback triggered: {}", kind);
        let _ = self.state.compare_exchange(
            STATE_OPEN,
            STATE_CLOSING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Worker-side teardown acknowledgement.
    fn acknowledge(&self) {
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
    }

    /// Current session state as last recorded.
    ///
    /// Reading this from the worker races benignly with the callback; the
    /// transport call itself still returns an explicit error if the session
    /// died between the check and the send.
    pub fn session_state(&self) -> SessionState {
        match self.state.load(Ordering::SeqCst) {
            STATE_OPEN => SessionState::Open,
            STATE_CLOSING => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Transport-client capability (external collaborator).
///
/// Implementations wrap a real TLS/HTTP stack. `connect` performs the
/// handshake; `send` submits one serialized request and blocks until the
/// response arrives or the driver's timeout fires.
pub trait TransportClient {
    fn connect(&mut self, timeout: Duration) -> Result<(), TransportError>;

    fn send(&mut self, head: &RequestHead, body: &[u8]) -> Result<TransportResponse, TransportError>;
}

/// Builds a [`TransportClient`] bound to a credential set, a server endpoint
/// and a disconnect observer.
pub trait TransportFactory {
    type Client: TransportClient;

    fn create(
        &mut self,
        credentials: &TlsCredentials,
        endpoint: &ServerEndpoint,
        observer: DisconnectObserver,
    ) -> Result<Self::Client, TransportError>;
}

/// An established (or to-be-established) secure connection to the server.
///
/// Exclusively owned by the worker after configuration. Once the disconnect
/// observer records `Closed`, every further send fails with
/// [`TransportError::Closed`] instead of being attempted.
pub struct TransportSession<C: TransportClient> {
    client: C,
    observer: DisconnectObserver,
    connected: bool,
}

impl<C: TransportClient> TransportSession<C> {
    /// Perform the one-time handshake with the given send/receive timeout.
    ///
    /// A failure here is fatal to the caller: there is no reconnection loop
    /// in this design.
    pub fn connect(&mut self, timeout: Duration) -> Result<(), TransportError> {
        self.client.connect(timeout)?;
        self.connected = true;
        info!("Successfully connected to the HTTPS server");
        Ok(())
    }

    /// Submit one request over the established session.
    pub fn send(
        &mut self,
        head: &RequestHead,
        body: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        if !self.connected {
            return Err(TransportError::Closed);
        }
        // Advisory check only; the driver call below still reports its own
        // closed/error result if the callback fires after this read.
        match self.observer.session_state() {
            SessionState::Open => {}
            SessionState::Closing => {
                // The driver already dropped the connection; finish the
                // teardown on this side and latch the session closed.
                self.observer.acknowledge();
                self.connected = false;
                return Err(TransportError::Closed);
            }
            SessionState::Closed => return Err(TransportError::Closed),
        }
        self.client.send(head, body)
    }

    /// Session lifecycle state as recorded by the disconnect observer.
    pub fn state(&self) -> SessionState {
        if !self.connected {
            return SessionState::Closed;
        }
        self.observer.session_state()
    }
}

/// One-time construction of the secure transport session.
pub struct TransportConfigurator;

impl TransportConfigurator {
    /// Build a fresh session bound to the credentials, the endpoint, and a
    /// newly-created disconnect observer.
    ///
    /// Called exactly once in normal operation; a repeated call builds a
    /// completely new session rather than reusing any prior state.
    pub fn configure<F: TransportFactory>(
        factory: &mut F,
        credentials: &TlsCredentials,
        endpoint: &ServerEndpoint,
    ) -> Result<TransportSession<F::Client>, TransportError> {
        info!("Configuring HTTPS client for {}", endpoint);

        let observer = DisconnectObserver::new();
        let client = factory.create(credentials, endpoint, observer.clone())?;

        Ok(TransportSession {
            client,
            observer,
            connected: false,
        })
    }
}
