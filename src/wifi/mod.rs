//! Wireless association with bounded retries.
//!
//! The actual Wi-Fi driver sits behind the [`WifiJoin`] trait so the retry
//! logic can be tested on the host with a scripted driver. The ESP-IDF
//! implementation lives in [`esp`] (ESP32 only).

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use log::{error, info, warn};

use crate::config::{ApCredentials, ClientConfig};

#[cfg(feature = "esp32")]
pub mod esp;

/// Wireless-join capability.
///
/// `init` brings up the wireless subsystem and is called exactly once;
/// `join` performs one association attempt against the access point.
pub trait WifiJoin {
    /// Bring up the wireless subsystem.
    fn init(&mut self) -> Result<(), JoinError>;

    /// Attempt one association. Returns the assigned address on success.
    fn join(&mut self, credentials: &ApCredentials) -> Result<IpAddr, JoinError>;
}

/// Driver-reported failure for a single init or join attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinError {
    message: String,
}

impl JoinError {
    /// Wrap a driver error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for JoinError {}

/// Observable state of the wireless link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No association attempted yet.
    Disconnected,
    /// Association attempt in progress (1-based attempt counter).
    Connecting(u32),
    /// Associated, with the assigned address.
    Connected(IpAddr),
    /// All attempts exhausted or the subsystem failed to come up.
    Failed,
}

/// Errors from [`ConnectionManager::connect`]. Both variants are fatal:
/// without an associated network nothing downstream can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Wireless subsystem bring-up failed. Not retried; requires a restart.
    Init(JoinError),
    /// Every association attempt failed.
    Exhausted { attempts: u32 },
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(e) => write!(f, "wireless subsystem init failed: {}", e),
            Self::Exhausted { attempts } => {
                write!(f, "failed to join network after {} attempts", attempts)
            }
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Init(e) => Some(e),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Joins the wireless network with bounded retries.
pub struct ConnectionManager {
    state: ConnectionState,
    retry_delay: Option<Duration>,
}

impl ConnectionManager {
    /// Create a manager that retries immediately after a failed attempt.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_delay: None,
        }
    }

    /// Create a manager that sleeps for `delay` between failed attempts.
    ///
    /// The upstream behaviour is no delay at all; the option exists because
    /// back-to-back retries give the access point no time to recover.
    pub fn with_retry_delay(delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_delay: Some(delay),
        }
    }

    /// Create a manager using the retry delay from `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_delay: config.join_retry_delay,
        }
    }

    /// Delay applied between failed attempts, if any.
    pub fn retry_delay(&self) -> Option<Duration> {
        self.retry_delay
    }

    /// Current link state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Bring up the wireless subsystem and associate with the access point.
    ///
    /// Makes at most `max_retries` association attempts. Subsystem init
    /// failure is fatal and consumes no attempts. On success the process-wide
    /// network stack is usable by the transport layer.
    pub fn connect<J: WifiJoin>(
        &mut self,
        driver: &mut J,
        credentials: &ApCredentials,
        max_retries: u32,
    ) -> Result<IpAddr, ConnectError> {
        if let Err(e) = driver.init() {
            error!("Wi-Fi subsystem init failed: {}", e);
            self.state = ConnectionState::Failed;
            return Err(ConnectError::Init(e));
        }
        info!("Wi-Fi initialization is successful");
        info!("Joining AP: {}", credentials.ssid);

        for attempt in 1..=max_retries {
            self.state = ConnectionState::Connecting(attempt);

            match driver.join(credentials) {
                Ok(addr) => {
                    info!(
                        "Successfully joined Wi-Fi network {} (attempt {}/{})",
                        credentials.ssid, attempt, max_retries
                    );
                    info!("Assigned IP address: {}", addr);
                    self.state = ConnectionState::Connected(addr);
                    return Ok(addr);
                }
                Err(e) => {
                    warn!(
                        "Failed to join Wi-Fi network (attempt {}/{}): {}",
                        attempt, max_retries, e
                    );
                    if attempt < max_retries {
                        if let Some(delay) = self.retry_delay {
                            std::thread::sleep(delay);
                        }
                    }
                }
            }
        }

        error!("Exhausted {} join attempts", max_retries);
        self.state = ConnectionState::Failed;
        Err(ConnectError::Exhausted {
            attempts: max_retries,
        })
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    /// Scripted driver: fails `failures` times, then succeeds.
    struct ScriptedJoin {
        init_result: Result<(), JoinError>,
        failures: u32,
        init_calls: u32,
        join_calls: u32,
    }

    impl ScriptedJoin {
        fn failing_first(failures: u32) -> Self {
            Self {
                init_result: Ok(()),
                failures,
                init_calls: 0,
                join_calls: 0,
            }
        }

        fn broken_subsystem() -> Self {
            Self {
                init_result: Err(JoinError::new("no radio")),
                failures: 0,
                init_calls: 0,
                join_calls: 0,
            }
        }
    }

    impl WifiJoin for ScriptedJoin {
        fn init(&mut self) -> Result<(), JoinError> {
            self.init_calls += 1;
            self.init_result.clone()
        }

        fn join(&mut self, _credentials: &ApCredentials) -> Result<IpAddr, JoinError> {
            self.join_calls += 1;
            if self.join_calls <= self.failures {
                Err(JoinError::new("association timed out"))
            } else {
                Ok(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)))
            }
        }
    }

    fn test_credentials() -> ApCredentials {
        ApCredentials::new(
            "TestNetwork",
            "password123",
            crate::config::SecurityPolicy::Wpa2Personal,
        )
        .unwrap()
    }

    #[test]
    fn test_first_attempt_succeeds() {
        let mut driver = ScriptedJoin::failing_first(0);
        let mut manager = ConnectionManager::new();

        let addr = manager
            .connect(&mut driver, &test_credentials(), 5)
            .unwrap();
        assert_eq!(addr, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)));
        assert_eq!(driver.join_calls, 1);
        assert_eq!(manager.state(), ConnectionState::Connected(addr));
    }

    #[test]
    fn test_succeeds_on_second_of_five() {
        let mut driver = ScriptedJoin::failing_first(1);
        let mut manager = ConnectionManager::new();

        let addr = manager
            .connect(&mut driver, &test_credentials(), 5)
            .unwrap();
        assert_eq!(driver.join_calls, 2);
        assert!(matches!(manager.state(), ConnectionState::Connected(a) if a == addr));
    }

    #[test]
    fn test_exhausted_after_exactly_n_attempts() {
        for n in [1u32, 3, 5] {
            let mut driver = ScriptedJoin::failing_first(u32::MAX);
            let mut manager = ConnectionManager::new();

            let result = manager.connect(&mut driver, &test_credentials(), n);
            assert_eq!(result, Err(ConnectError::Exhausted { attempts: n }));
            // Exactly N attempts, never N+1 or N-1.
            assert_eq!(driver.join_calls, n);
            assert_eq!(manager.state(), ConnectionState::Failed);
        }
    }

    #[test]
    fn test_last_attempt_success_is_not_exhausted() {
        let mut driver = ScriptedJoin::failing_first(4);
        let mut manager = ConnectionManager::new();

        assert!(manager.connect(&mut driver, &test_credentials(), 5).is_ok());
        assert_eq!(driver.join_calls, 5);
    }

    #[test]
    fn test_config_retry_delay_reaches_the_manager() {
        let config = ClientConfig {
            join_retry_delay: Some(Duration::from_millis(10)),
            ..ClientConfig::default()
        };
        let manager = ConnectionManager::from_config(&config);
        assert_eq!(manager.retry_delay(), Some(Duration::from_millis(10)));

        let defaults = ConnectionManager::from_config(&ClientConfig::default());
        assert_eq!(defaults.retry_delay(), None);
    }

    #[test]
    fn test_config_retry_delay_is_applied_between_attempts() {
        let config = ClientConfig {
            join_retry_delay: Some(Duration::from_millis(10)),
            ..ClientConfig::default()
        };
        let mut driver = ScriptedJoin::failing_first(u32::MAX);
        let mut manager = ConnectionManager::from_config(&config);

        let started = std::time::Instant::now();
        let result = manager.connect(&mut driver, &test_credentials(), 3);
        assert_eq!(result, Err(ConnectError::Exhausted { attempts: 3 }));
        // Two inter-attempt sleeps of 10 ms each.
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_retry_delay_does_not_change_attempt_count() {
        let mut driver = ScriptedJoin::failing_first(u32::MAX);
        let mut manager = ConnectionManager::with_retry_delay(Duration::from_millis(1));

        let result = manager.connect(&mut driver, &test_credentials(), 3);
        assert_eq!(result, Err(ConnectError::Exhausted { attempts: 3 }));
        assert_eq!(driver.join_calls, 3);
    }

    #[test]
    fn test_init_failure_is_fatal_without_join_attempts() {
        let mut driver = ScriptedJoin::broken_subsystem();
        let mut manager = ConnectionManager::new();

        let result = manager.connect(&mut driver, &test_credentials(), 5);
        assert!(matches!(result, Err(ConnectError::Init(_))));
        assert_eq!(driver.init_calls, 1);
        assert_eq!(driver.join_calls, 0);
        assert_eq!(manager.state(), ConnectionState::Failed);
    }
}
