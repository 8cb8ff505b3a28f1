//! Operator-driven command loop.
//!
//! Reads one verb selector per iteration, resolves the resource path, and
//! dispatches the request. The loop owns the "GET after PUT" latch as
//! explicit state: a PUT sets it, and the explicit GET-after-PUT selection
//! clears it. Note the selection does not consult the latch before choosing
//! its path; it always targets the after-put path, so the latch and the menu
//! choice are deliberately redundant routes to the same resource. Upstream
//! behaviour, preserved as-is.
//!
//! There is no terminal state: every dispatch returns to the prompt, and the
//! loop runs until the process halts (or, on a host, until input ends).

use std::io::{self, BufRead};

use log::{info, warn};

use crate::config::ClientConfig;
use crate::request::{Method, RequestDispatcher, RequestError};
use crate::response::ResponseSummary;
use crate::transport::{TransportClient, TransportSession};

/// Operator menu, one selector per line.
pub const MENU_TEXT: &str = "\
===============================================================\n\
 Please select the HTTPS method:\n\
   1. GET request\n\
   2. POST request\n\
   3. PUT request\n\
   4. GET request after PUT\n\
===============================================================";

/// One operator verb selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Get,
    Post,
    Put,
    GetAfterPut,
    /// Anything outside the four mapped selectors.
    Invalid,
}

impl Selection {
    /// Map a numeric selector to a verb selection.
    pub fn from_selector(selector: u32) -> Self {
        match selector {
            1 => Self::Get,
            2 => Self::Post,
            3 => Self::Put,
            4 => Self::GetAfterPut,
            _ => Self::Invalid,
        }
    }

    /// Parse one line of operator input.
    pub fn parse(line: &str) -> Self {
        match line.trim().parse::<u32>() {
            Ok(selector) => Self::from_selector(selector),
            Err(_) => Self::Invalid,
        }
    }
}

/// Result of one loop iteration.
#[derive(Debug)]
pub enum IterationOutcome {
    /// A request was sent and a response received.
    Dispatched {
        method: Method,
        path: String,
        summary: ResponseSummary,
    },
    /// A request was attempted but failed; the loop continues.
    Failed {
        method: Method,
        path: String,
        error: RequestError,
    },
    /// Invalid selector; nothing was dispatched.
    Reprompt,
}

/// The process-wide control loop.
///
/// Owns the GET-after-PUT latch and the two fixed resource paths. One
/// instance drives one transport session; it is the only sender, so the
/// dispatcher's scratch buffer needs no locking.
pub struct CommandLoop {
    resource_path: String,
    after_put_path: String,
    pending_after_put: bool,
}

impl CommandLoop {
    /// Create a loop using the paths from `config`.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            resource_path: config.resource_path.clone(),
            after_put_path: config.after_put_path.clone(),
            pending_after_put: false,
        }
    }

    /// Current value of the GET-after-PUT latch.
    pub fn pending_after_put(&self) -> bool {
        self.pending_after_put
    }

    /// Execute one iteration for an already-read selection.
    ///
    /// Latch discipline: PUT sets the latch before dispatch; the explicit
    /// GET-after-PUT selection clears it unconditionally (idempotent) and
    /// always targets the after-put path; GET and POST leave it untouched.
    pub fn run_once<C: TransportClient>(
        &mut self,
        selection: Selection,
        dispatcher: &mut RequestDispatcher,
        session: &mut TransportSession<C>,
    ) -> IterationOutcome {
        let (method, path) = match selection {
            Selection::Get => (Method::Get, self.resource_path.clone()),
            Selection::Post => (Method::Post, self.resource_path.clone()),
            Selection::Put => {
                self.pending_after_put = true;
                (Method::Put, self.resource_path.clone())
            }
            Selection::GetAfterPut => {
                self.pending_after_put = false;
                (Method::Get, self.after_put_path.clone())
            }
            Selection::Invalid => return IterationOutcome::Reprompt,
        };

        info!("HTTP {} request for {}", method, path);
        match dispatcher.dispatch(session, method, &path) {
            Ok(summary) => IterationOutcome::Dispatched {
                method,
                path,
                summary,
            },
            Err(error) => IterationOutcome::Failed {
                method,
                path,
                error,
            },
        }
    }

    /// Drive the loop from an operator input stream, forever.
    ///
    /// Returns only when the input stream ends (which never happens on a
    /// device console) or reading fails. Dispatch errors are reported and
    /// the loop keeps going.
    pub fn run<R: BufRead, C: TransportClient>(
        &mut self,
        mut input: R,
        dispatcher: &mut RequestDispatcher,
        session: &mut TransportSession<C>,
    ) -> io::Result<()> {
        let mut line = String::new();
        loop {
            println!("{}", MENU_TEXT);

            line.clear();
            if input.read_line(&mut line)? == 0 {
                return Ok(());
            }

            match self.run_once(Selection::parse(&line), dispatcher, session) {
                IterationOutcome::Dispatched {
                    method,
                    path,
                    summary,
                } => {
                    println!("Successfully sent {} request for {}", method, path);
                    println!("The HTTP status code is :: {}", summary.status_code);
                    println!(
                        "headers_len:[{}] header_count:[{}] body_len:[{}] content_len:[{}]{}",
                        summary.header_len,
                        summary.header_count,
                        summary.body_len,
                        summary.content_len,
                        if summary.truncated { " (truncated)" } else { "" }
                    );
                }
                IterationOutcome::Failed {
                    method,
                    path,
                    error,
                } => {
                    warn!("Failed to send {} request for {}: {}", method, path, error);
                    println!("Failed to send the HTTP request: {}", error);
                }
                IterationOutcome::Reprompt => {
                    println!("Please select from the given valid options");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerEndpoint, TlsCredentials};
    use crate::transport::loopback::{ScriptedFactory, ScriptedTransport};
    use crate::transport::TransportConfigurator;
    use std::time::Duration;

    fn config() -> ClientConfig {
        ClientConfig::default()
    }

    fn connected_session(
        responses: usize,
    ) -> (
        ScriptedFactory,
        crate::transport::TransportSession<ScriptedTransport>,
    ) {
        let canned = (0..responses).map(|_| ScriptedTransport::ok_response()).collect();
        let mut factory = ScriptedFactory::with_responses(canned);
        let credentials =
            TlsCredentials::new(b"CERT".to_vec(), b"KEY".to_vec(), b"CA".to_vec()).unwrap();
        let endpoint = ServerEndpoint::new("example.local", 50007).unwrap();
        let mut session =
            TransportConfigurator::configure(&mut factory, &credentials, &endpoint).unwrap();
        session.connect(Duration::from_millis(5000)).unwrap();
        (factory, session)
    }

    fn dispatcher() -> RequestDispatcher {
        RequestDispatcher::new("example.local", config().buffer_capacity)
    }

    #[test]
    fn test_selector_mapping() {
        assert_eq!(Selection::from_selector(1), Selection::Get);
        assert_eq!(Selection::from_selector(2), Selection::Post);
        assert_eq!(Selection::from_selector(3), Selection::Put);
        assert_eq!(Selection::from_selector(4), Selection::GetAfterPut);
        assert_eq!(Selection::from_selector(0), Selection::Invalid);
        assert_eq!(Selection::from_selector(5), Selection::Invalid);
    }

    #[test]
    fn test_parse_operator_input() {
        assert_eq!(Selection::parse("1\n"), Selection::Get);
        assert_eq!(Selection::parse("  4  "), Selection::GetAfterPut);
        assert_eq!(Selection::parse("x"), Selection::Invalid);
        assert_eq!(Selection::parse(""), Selection::Invalid);
    }

    #[test]
    fn test_get_and_post_leave_latch_untouched() {
        let (factory, mut session) = connected_session(4);
        let mut dispatcher = dispatcher();
        let mut command_loop = CommandLoop::new(&config());

        command_loop.run_once(Selection::Get, &mut dispatcher, &mut session);
        command_loop.run_once(Selection::Post, &mut dispatcher, &mut session);
        assert!(!command_loop.pending_after_put());

        // Latch set by PUT stays set across GET and POST.
        command_loop.run_once(Selection::Put, &mut dispatcher, &mut session);
        assert!(command_loop.pending_after_put());
        command_loop.run_once(Selection::Get, &mut dispatcher, &mut session);
        assert!(command_loop.pending_after_put());

        let state = factory.client_state();
        let sent = &state.sent;
        assert_eq!(sent.len(), 4);
        // Plain GET after PUT still targets the default path; only the
        // explicit selection switches paths.
        assert_eq!(sent[3], (Method::Get, "/".to_string()));
    }

    #[test]
    fn test_put_sets_latch_before_dispatch() {
        let (factory, mut session) = connected_session(1);
        let mut dispatcher = dispatcher();
        let mut command_loop = CommandLoop::new(&config());

        let outcome = command_loop.run_once(Selection::Put, &mut dispatcher, &mut session);
        assert!(command_loop.pending_after_put());
        assert!(matches!(
            outcome,
            IterationOutcome::Dispatched {
                method: Method::Put,
                ..
            }
        ));
        assert_eq!(
            factory.client_state().sent[0],
            (Method::Put, "/".to_string())
        );
        assert!(dispatcher.last_head().starts_with(b"PUT / HTTP/1.1\r\n"));
    }

    #[test]
    fn test_get_after_put_targets_after_put_path_and_clears_latch() {
        let (factory, mut session) = connected_session(2);
        let mut dispatcher = dispatcher();
        let mut command_loop = CommandLoop::new(&config());

        command_loop.run_once(Selection::Put, &mut dispatcher, &mut session);
        let outcome = command_loop.run_once(Selection::GetAfterPut, &mut dispatcher, &mut session);

        assert!(!command_loop.pending_after_put());
        match outcome {
            IterationOutcome::Dispatched { method, path, .. } => {
                assert_eq!(method, Method::Get);
                assert_eq!(path, "/text.html");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let state = factory.client_state();
        let sent = &state.sent;
        assert_ne!(sent[0].1, sent[1].1);
        assert_eq!(sent[1], (Method::Get, "/text.html".to_string()));
    }

    #[test]
    fn test_get_after_put_clear_is_idempotent() {
        let (factory, mut session) = connected_session(2);
        let mut dispatcher = dispatcher();
        let mut command_loop = CommandLoop::new(&config());

        // Latch was never set; the selection still works and still targets
        // the after-put path.
        command_loop.run_once(Selection::GetAfterPut, &mut dispatcher, &mut session);
        assert!(!command_loop.pending_after_put());

        command_loop.run_once(Selection::GetAfterPut, &mut dispatcher, &mut session);
        assert!(!command_loop.pending_after_put());

        let state = factory.client_state();
        let sent = &state.sent;
        assert_eq!(sent[0], (Method::Get, "/text.html".to_string()));
        assert_eq!(sent[1], (Method::Get, "/text.html".to_string()));
    }

    #[test]
    fn test_invalid_selector_performs_no_transport_calls() {
        let (factory, mut session) = connected_session(0);
        let mut dispatcher = dispatcher();
        let mut command_loop = CommandLoop::new(&config());

        let outcome = command_loop.run_once(Selection::Invalid, &mut dispatcher, &mut session);
        assert!(matches!(outcome, IterationOutcome::Reprompt));
        assert!(!command_loop.pending_after_put());
        assert_eq!(factory.client_state().sent.len(), 0);
        assert_eq!(
            session.state(),
            crate::transport::SessionState::Open
        );
    }

    #[test]
    fn test_dispatch_failure_is_recoverable() {
        // Only one canned response: the second send fails, the loop keeps
        // its state and the next iteration can still run.
        let (_factory, mut session) = connected_session(1);
        let mut dispatcher = dispatcher();
        let mut command_loop = CommandLoop::new(&config());

        let first = command_loop.run_once(Selection::Get, &mut dispatcher, &mut session);
        assert!(matches!(first, IterationOutcome::Dispatched { .. }));

        let second = command_loop.run_once(Selection::Get, &mut dispatcher, &mut session);
        assert!(matches!(second, IterationOutcome::Failed { .. }));

        let third = command_loop.run_once(Selection::Invalid, &mut dispatcher, &mut session);
        assert!(matches!(third, IterationOutcome::Reprompt));
    }

    #[test]
    fn test_run_drains_input_and_returns_on_eof() {
        let (factory, mut session) = connected_session(3);
        let mut dispatcher = dispatcher();
        let mut command_loop = CommandLoop::new(&config());

        let input = b"1\n9\n3\n4\n" as &[u8];
        command_loop
            .run(input, &mut dispatcher, &mut session)
            .unwrap();

        let state = factory.client_state();
        let sent = &state.sent;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], (Method::Get, "/".to_string()));
        assert_eq!(sent[1], (Method::Put, "/".to_string()));
        assert_eq!(sent[2], (Method::Get, "/text.html".to_string()));
    }
}
