//! Secure HTTPS client firmware library.
//!
//! An embedded client that joins a Wi-Fi network, establishes a mutually
//! authenticated TLS connection to a fixed server, and dispatches operator
//! selected GET/POST/PUT requests over it.
//!
//! The platform-independent orchestration (retry-bounded join, one-time
//! transport configuration, request dispatch, response interpretation, and
//! the command loop) lives here and is tested on the host without ESP32
//! hardware; the ESP-IDF driver adapters are gated behind the `esp32`
//! feature.

pub mod command;
pub mod config;
pub mod request;
pub mod response;
pub mod transport;
pub mod wifi;

// Re-export commonly used items
pub use command::{CommandLoop, IterationOutcome, Selection, MENU_TEXT};
pub use config::{
    ApCredentials, ClientConfig, CredentialError, SecurityPolicy, ServerEndpoint, TlsCredentials,
};
pub use request::{Method, RequestDispatcher, RequestError};
pub use response::{summarize, ResponseSummary, TransportResponse};
pub use transport::{
    DisconnectKind, DisconnectObserver, SessionState, TransportClient, TransportConfigurator,
    TransportError, TransportFactory, TransportSession,
};
pub use wifi::{ConnectError, ConnectionManager, ConnectionState, JoinError, WifiJoin};
