//! Scripted in-memory transport for host-side testing.
//!
//! Plays the role of the TLS/HTTP stack without any network access: the
//! test scripts the connect outcome and a queue of canned responses, then
//! inspects which requests the client actually submitted.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;

use super::{
    DisconnectObserver, TransportClient, TransportError, TransportFactory,
};
use crate::config::{ServerEndpoint, TlsCredentials};
use crate::request::{Method, RequestHead};
use crate::response::TransportResponse;

/// Shared state behind a scripted transport, inspectable from the test even
/// after the client has been moved into a session.
pub struct ScriptedState {
    /// Responses returned by successive sends, in order.
    pub responses: VecDeque<TransportResponse>,
    /// Outcome of the next `connect` call.
    pub connect_result: Result<(), TransportError>,
    /// True once `connect` has succeeded.
    pub connected: bool,
    /// Method and path of every request that reached the driver.
    pub sent: Vec<(Method, String)>,
    /// Body length of every request that reached the driver, same order as
    /// `sent`.
    pub body_lens: Vec<usize>,
    /// Observer handed over at creation; lets tests fire the disconnect
    /// callback the way the real stack would.
    pub observer: Option<DisconnectObserver>,
    /// Number of `connect` calls observed.
    pub connect_calls: u32,
}

/// Scripted [`TransportClient`] implementation.
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedTransport {
    /// A plain 200 response with a small HTML body.
    pub fn ok_response() -> TransportResponse {
        TransportResponse {
            status_code: 200,
            header: b"Content-Type: text/html\r\nConnection: keep-alive\r\n".to_vec(),
            body: b"<html>hello from loopback</html>".to_vec(),
            header_count: 2,
            content_len: 32,
            truncated: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TransportClient for ScriptedTransport {
    fn connect(&mut self, _timeout: Duration) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.connect_calls += 1;
        state.connect_result.clone()?;
        state.connected = true;
        Ok(())
    }

    fn send(
        &mut self,
        head: &RequestHead,
        body: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(TransportError::Closed);
        }
        debug!(
            "loopback: {} {} ({} body bytes)",
            head.method,
            head.path,
            body.len()
        );
        state.sent.push((head.method, head.path.clone()));
        state.body_lens.push(body.len());
        state
            .responses
            .pop_front()
            .ok_or_else(|| TransportError::Send("no scripted response left".to_string()))
    }
}

/// Scripted [`TransportFactory`]; counts creations so tests can assert the
/// configurator was (or was not) invoked.
pub struct ScriptedFactory {
    state: Arc<Mutex<ScriptedState>>,
    create_error: Option<TransportError>,
    /// Number of `create` calls observed.
    pub create_calls: u32,
}

impl ScriptedFactory {
    /// Factory whose client connects successfully and replays `responses`.
    pub fn with_responses(responses: Vec<TransportResponse>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedState {
                responses: responses.into(),
                connect_result: Ok(()),
                connected: false,
                sent: Vec::new(),
                body_lens: Vec::new(),
                observer: None,
                connect_calls: 0,
            })),
            create_error: None,
            create_calls: 0,
        }
    }

    /// Factory whose client fails the handshake with the given reason.
    pub fn failing_connect(reason: &str) -> Self {
        let factory = Self::with_responses(Vec::new());
        factory.client_state().connect_result = Err(TransportError::Connect(reason.to_string()));
        factory
    }

    /// Factory that refuses to create a client at all.
    pub fn failing_create(error: TransportError) -> Self {
        let mut factory = Self::with_responses(Vec::new());
        factory.create_error = Some(error);
        factory
    }

    /// Inspect the shared client state.
    pub fn client_state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TransportFactory for ScriptedFactory {
    type Client = ScriptedTransport;

    fn create(
        &mut self,
        _credentials: &TlsCredentials,
        _endpoint: &ServerEndpoint,
        observer: DisconnectObserver,
    ) -> Result<Self::Client, TransportError> {
        self.create_calls += 1;
        if let Some(error) = &self.create_error {
            return Err(error.clone());
        }
        self.client_state().observer = Some(observer);
        Ok(ScriptedTransport {
            state: Arc::clone(&self.state),
        })
    }
}
