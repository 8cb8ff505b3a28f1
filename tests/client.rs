//! End-to-end scenarios on the host: scripted Wi-Fi driver plus the
//! loopback transport, no hardware or network access.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use https_client_esp32::transport::loopback::{ScriptedFactory, ScriptedTransport};
use https_client_esp32::{
    ApCredentials, ClientConfig, CommandLoop, ConnectError, ConnectionManager, ConnectionState,
    JoinError, Method, RequestDispatcher, SecurityPolicy, Selection, ServerEndpoint,
    TlsCredentials, TransportConfigurator, WifiJoin,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Wi-Fi driver double that fails a scripted number of times, then succeeds.
struct FlakyJoin {
    failures_before_success: u32,
    join_calls: u32,
}

impl FlakyJoin {
    fn new(failures_before_success: u32) -> Self {
        Self {
            failures_before_success,
            join_calls: 0,
        }
    }
}

impl WifiJoin for FlakyJoin {
    fn init(&mut self) -> Result<(), JoinError> {
        Ok(())
    }

    fn join(&mut self, _credentials: &ApCredentials) -> Result<IpAddr, JoinError> {
        self.join_calls += 1;
        if self.join_calls <= self.failures_before_success {
            Err(JoinError::new("association failed"))
        } else {
            Ok(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 42)))
        }
    }
}

fn ap_credentials() -> ApCredentials {
    ApCredentials::new("TestNetwork", "password123", SecurityPolicy::Wpa2Personal).unwrap()
}

fn tls_credentials() -> TlsCredentials {
    TlsCredentials::new(
        b"-----CERT-----".to_vec(),
        b"-----KEY-----".to_vec(),
        b"-----CA-----".to_vec(),
    )
    .unwrap()
}

fn endpoint() -> ServerEndpoint {
    ServerEndpoint::new("example.local", 50007).unwrap()
}

#[test]
fn join_on_second_attempt_then_first_get_succeeds() {
    init_logging();
    let config = ClientConfig::default();

    // Join succeeds on attempt 2 of 5.
    let mut driver = FlakyJoin::new(1);
    let mut manager = ConnectionManager::new();
    let addr = manager
        .connect(&mut driver, &ap_credentials(), config.max_join_retries)
        .unwrap();
    assert_eq!(driver.join_calls, 2);
    assert_eq!(manager.state(), ConnectionState::Connected(addr));

    // Configure and connect the secure transport.
    let mut factory = ScriptedFactory::with_responses(vec![ScriptedTransport::ok_response()]);
    let mut session =
        TransportConfigurator::configure(&mut factory, &tls_credentials(), &endpoint()).unwrap();
    session.connect(config.transport_timeout).unwrap();

    // First operator input: 1 (GET).
    let mut dispatcher = RequestDispatcher::new("example.local", config.buffer_capacity);
    let mut command_loop = CommandLoop::new(&config);
    let outcome = command_loop.run_once(Selection::parse("1"), &mut dispatcher, &mut session);

    match outcome {
        https_client_esp32::IterationOutcome::Dispatched { summary, .. } => {
            assert!(summary.status_in_http_range());
            assert!(summary.body_len <= config.buffer_capacity);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn put_then_get_after_put_hits_the_verification_path() {
    init_logging();
    let config = ClientConfig::default();
    let mut factory = ScriptedFactory::with_responses(vec![
        ScriptedTransport::ok_response(),
        ScriptedTransport::ok_response(),
    ]);
    let mut session =
        TransportConfigurator::configure(&mut factory, &tls_credentials(), &endpoint()).unwrap();
    session.connect(config.transport_timeout).unwrap();

    let mut dispatcher = RequestDispatcher::new("example.local", config.buffer_capacity);
    let mut command_loop = CommandLoop::new(&config);

    command_loop.run_once(Selection::parse("3"), &mut dispatcher, &mut session);
    assert!(command_loop.pending_after_put());

    command_loop.run_once(Selection::parse("4"), &mut dispatcher, &mut session);
    assert!(!command_loop.pending_after_put());

    let state = factory.client_state();
    assert_eq!(state.sent.len(), 2);
    let (put, get) = (&state.sent[0], &state.sent[1]);
    assert_eq!(put.0, Method::Put);
    assert_eq!(get.0, Method::Get);
    assert_ne!(put.1, get.1);
    assert_eq!(get.1, config.after_put_path);
}

#[test]
fn exhausted_join_never_reaches_the_transport() {
    init_logging();
    let config = ClientConfig::default();

    // All 5 of 5 attempts fail.
    let mut driver = FlakyJoin::new(u32::MAX);
    let mut manager = ConnectionManager::new();
    let mut factory = ScriptedFactory::with_responses(Vec::new());

    let result = manager.connect(&mut driver, &ap_credentials(), config.max_join_retries);
    assert_eq!(result, Err(ConnectError::Exhausted { attempts: 5 }));
    assert_eq!(driver.join_calls, 5);

    // The firmware wiring configures the transport only after a successful
    // join; mirror it here.
    if result.is_ok() {
        let _ = TransportConfigurator::configure(&mut factory, &tls_credentials(), &endpoint());
    }
    assert_eq!(factory.create_calls, 0);
}

#[test]
fn full_operator_session_over_scripted_input() {
    init_logging();
    let config = ClientConfig::default();
    let mut factory = ScriptedFactory::with_responses(vec![
        ScriptedTransport::ok_response(),
        ScriptedTransport::ok_response(),
        ScriptedTransport::ok_response(),
        ScriptedTransport::ok_response(),
    ]);
    let mut session =
        TransportConfigurator::configure(&mut factory, &tls_credentials(), &endpoint()).unwrap();
    session.connect(Duration::from_millis(5000)).unwrap();

    let mut dispatcher = RequestDispatcher::new("example.local", config.buffer_capacity);
    let mut command_loop = CommandLoop::new(&config);

    // GET, POST, invalid selector, PUT, GET-after-PUT; then input ends.
    let input = b"1\n2\nbogus\n3\n4\n" as &[u8];
    command_loop
        .run(input, &mut dispatcher, &mut session)
        .unwrap();

    let state = factory.client_state();
    let sent: Vec<(Method, &str)> = state
        .sent
        .iter()
        .map(|(method, path)| (*method, path.as_str()))
        .collect();
    assert_eq!(
        sent,
        vec![
            (Method::Get, "/"),
            (Method::Post, "/"),
            (Method::Put, "/"),
            (Method::Get, "/text.html"),
        ]
    );
}
