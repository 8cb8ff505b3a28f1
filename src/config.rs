//! Client configuration and credential material.
//!
//! This module contains platform-independent types for the access-point
//! credentials, the TLS credential set, the target server endpoint, and the
//! tunable client parameters. Everything here is host-testable; nothing
//! touches a driver.
//!
//! Credential material (Wi-Fi password, TLS private key) is zeroed on drop.

use std::fmt;
use std::time::Duration;

use zeroize::Zeroize;

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum password length for WPA2/WPA3.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Minimum password length for WPA2/WPA3.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Default number of association attempts before giving up.
pub const DEFAULT_JOIN_RETRIES: u32 = 5;

/// Default send/receive timeout for the transport handshake and requests.
pub const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default capacity of the request head scratch buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 2048;

/// Default resource path for GET/POST/PUT requests.
pub const DEFAULT_RESOURCE_PATH: &str = "/";

/// Default resource path for the GET-after-PUT verification request.
pub const DEFAULT_AFTER_PUT_PATH: &str = "/text.html";

/// Access-point security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityPolicy {
    /// Open network, no password.
    Open,
    /// WPA2-Personal (PSK).
    Wpa2Personal,
    /// WPA3-Personal (SAE).
    Wpa3Personal,
}

/// Wi-Fi credentials for joining an access point.
///
/// The password is zeroed when the value is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApCredentials {
    /// Network SSID (1-32 bytes).
    pub ssid: String,
    /// Network password (8-64 bytes for WPA2/WPA3, empty for open networks).
    pub password: String,
    /// Security policy the access point enforces.
    pub security: SecurityPolicy,
}

impl ApCredentials {
    /// Create credentials for a protected network.
    ///
    /// Returns an error if the SSID or password lengths are invalid for the
    /// given security policy.
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
        security: SecurityPolicy,
    ) -> Result<Self, CredentialError> {
        let creds = Self {
            ssid: ssid.into(),
            password: password.into(),
            security,
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Create credentials for an open network (no password).
    pub fn open(ssid: impl Into<String>) -> Result<Self, CredentialError> {
        Self::new(ssid, String::new(), SecurityPolicy::Open)
    }

    /// Validate SSID and password lengths.
    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.ssid.is_empty() {
            return Err(CredentialError::SsidEmpty);
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(CredentialError::SsidTooLong {
                len: self.ssid.len(),
                max: MAX_SSID_LEN,
            });
        }

        match self.security {
            SecurityPolicy::Open => {}
            SecurityPolicy::Wpa2Personal | SecurityPolicy::Wpa3Personal => {
                if self.password.len() < MIN_PASSWORD_LEN {
                    return Err(CredentialError::PasswordTooShort {
                        len: self.password.len(),
                        min: MIN_PASSWORD_LEN,
                    });
                }
                if self.password.len() > MAX_PASSWORD_LEN {
                    return Err(CredentialError::PasswordTooLong {
                        len: self.password.len(),
                        max: MAX_PASSWORD_LEN,
                    });
                }
            }
        }

        Ok(())
    }

    /// Check if this is an open network.
    pub fn is_open(&self) -> bool {
        matches!(self.security, SecurityPolicy::Open)
    }
}

impl Drop for ApCredentials {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// TLS credential set for mutual authentication.
///
/// All three blobs are opaque PEM data handed to the transport driver; they
/// must outlive the transport session. The private key is zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsCredentials {
    /// Client certificate (PEM).
    pub client_cert: Vec<u8>,
    /// Client private key (PEM).
    pub client_key: Vec<u8>,
    /// Root CA certificate used to authenticate the server (PEM).
    pub root_ca: Vec<u8>,
}

impl TlsCredentials {
    /// Create a credential set. All three blobs must be non-empty.
    pub fn new(
        client_cert: Vec<u8>,
        client_key: Vec<u8>,
        root_ca: Vec<u8>,
    ) -> Result<Self, CredentialError> {
        if client_cert.is_empty() {
            return Err(CredentialError::MissingBlob("client certificate"));
        }
        if client_key.is_empty() {
            return Err(CredentialError::MissingBlob("client private key"));
        }
        if root_ca.is_empty() {
            return Err(CredentialError::MissingBlob("root CA certificate"));
        }
        Ok(Self {
            client_cert,
            client_key,
            root_ca,
        })
    }
}

impl fmt::Debug for TlsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material, only blob sizes.
        f.debug_struct("TlsCredentials")
            .field("client_cert_len", &self.client_cert.len())
            .field("client_key_len", &self.client_key.len())
            .field("root_ca_len", &self.root_ca.len())
            .finish()
    }
}

impl Drop for TlsCredentials {
    fn drop(&mut self) {
        self.client_key.zeroize();
    }
}

/// The HTTPS server the client talks to. Set once at configuration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    /// Server host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServerEndpoint {
    /// Create an endpoint. The host must be non-empty.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, CredentialError> {
        let host = host.into();
        if host.is_empty() {
            return Err(CredentialError::MissingBlob("server host"));
        }
        Ok(Self { host, port })
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Tunable client parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Association attempts before `connect` reports exhaustion.
    pub max_join_retries: u32,
    /// Send/receive timeout for the handshake and each request.
    pub transport_timeout: Duration,
    /// Resource path for GET/POST/PUT.
    pub resource_path: String,
    /// Resource path for the GET-after-PUT verification request.
    pub after_put_path: String,
    /// Capacity of the request head scratch buffer.
    pub buffer_capacity: usize,
    /// Optional fixed delay between failed join attempts. `None` retries
    /// immediately.
    pub join_retry_delay: Option<Duration>,
}

impl ClientConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.max_join_retries == 0 {
            return Err(CredentialError::InvalidConfig("max_join_retries is zero"));
        }
        if self.buffer_capacity == 0 {
            return Err(CredentialError::InvalidConfig("buffer_capacity is zero"));
        }
        if !self.resource_path.starts_with('/') {
            return Err(CredentialError::InvalidConfig(
                "resource_path must start with '/'",
            ));
        }
        if !self.after_put_path.starts_with('/') {
            return Err(CredentialError::InvalidConfig(
                "after_put_path must start with '/'",
            ));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_join_retries: DEFAULT_JOIN_RETRIES,
            transport_timeout: DEFAULT_TRANSPORT_TIMEOUT,
            resource_path: DEFAULT_RESOURCE_PATH.to_string(),
            after_put_path: DEFAULT_AFTER_PUT_PATH.to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            join_retry_delay: None,
        }
    }
}

/// Errors raised while building configuration or credential values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Password is too short for the selected security policy.
    PasswordTooShort { len: usize, min: usize },
    /// Password exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
    /// A required credential blob is empty.
    MissingBlob(&'static str),
    /// A client parameter is out of range.
    InvalidConfig(&'static str),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooShort { len, min } => {
                write!(f, "password too short: {} bytes (min {})", len, min)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
            Self::MissingBlob(what) => write!(f, "missing {}", what),
            Self::InvalidConfig(what) => write!(f, "invalid configuration: {}", what),
        }
    }
}

impl std::error::Error for CredentialError {}
