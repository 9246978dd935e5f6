//! Worker entry: sandbox first, then exactly one fetch.

use crate::outcome::FetchOutcome;
use crate::request::FetchRequest;
use crate::sandbox::{Sandbox, SandboxError, SandboxProfile};
use crate::session::FetchSession;
use crate::transport::Transport;

/// Applies `profile`, then builds the transport and runs one session.
///
/// The transport is only constructed after the sandbox is in place, so no
/// network-capable code runs unsandboxed. A sandbox error is returned before
/// anything else happens; the caller must exit with its code.
pub fn run_worker<S, T, F>(
    sandbox: &S,
    profile: &SandboxProfile,
    make_transport: F,
    request: &FetchRequest,
) -> Result<FetchOutcome, SandboxError>
where
    S: Sandbox + ?Sized,
    T: Transport,
    F: FnOnce() -> T,
{
    if let Err(e) = sandbox.apply(profile) {
        tracing::error!(error = %e, "sandbox setup failed; refusing to fetch");
        return Err(e);
    }

    let transport = make_transport();
    Ok(FetchSession::new(&transport).run(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::EXIT_SANDBOX_FAILED;
    use crate::sandbox::{OsSandbox, SandboxState};
    use crate::transport::scripted::{Script, ScriptedTransport};
    use std::cell::Cell;
    use std::io;

    struct FailingSandbox {
        calls: Cell<usize>,
    }

    impl Sandbox for FailingSandbox {
        fn apply(&self, _profile: &SandboxProfile) -> Result<(), SandboxError> {
            self.calls.set(self.calls.get() + 1);
            Err(SandboxError::InstallFailed {
                step: "PR_SET_SECCOMP",
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            })
        }
    }

    fn request() -> FetchRequest {
        FetchRequest::new("https://example.com/cover.png", "rpdl-test", 1 << 20).unwrap()
    }

    #[test]
    fn install_failure_blocks_every_network_operation() {
        let (transport, log) = ScriptedTransport::new(Script::body(Some(3), vec![b"abc".to_vec()]));
        let sandbox = FailingSandbox {
            calls: Cell::new(0),
        };
        let mut transport_built = false;

        let err = run_worker(
            &sandbox,
            &SandboxProfile::for_current_platform(),
            || {
                transport_built = true;
                transport
            },
            &request(),
        )
        .unwrap_err();

        assert!(matches!(err, SandboxError::InstallFailed { .. }));
        assert_eq!(err.exit_code(), EXIT_SANDBOX_FAILED);
        assert_eq!(sandbox.calls.get(), 1);
        assert!(!transport_built);
        let log = log.borrow();
        assert_eq!(log.connections, 0);
        assert_eq!(log.requests, 0);
        assert!(log.reads.is_empty());
    }

    #[test]
    fn sandboxed_worker_fetches_once() {
        let state = SandboxState::new();
        let sandbox = OsSandbox::with_state(&state);
        let (transport, log) =
            ScriptedTransport::new(Script::body(Some(5), vec![b"hello".to_vec()]));

        let outcome = run_worker(&sandbox, &SandboxProfile::baseline(), || transport, &request())
            .unwrap();

        assert!(state.is_applied());
        match outcome {
            FetchOutcome::Success(r) => assert_eq!(r.data, b"hello"),
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(log.borrow().connections, 1);
    }

    #[test]
    fn second_worker_in_same_process_is_refused() {
        let state = SandboxState::new();
        let sandbox = OsSandbox::with_state(&state);
        let profile = SandboxProfile::baseline();
        let (first, _) = ScriptedTransport::new(Script::body(Some(1), vec![b"x".to_vec()]));
        run_worker(&sandbox, &profile, || first, &request()).unwrap();

        let (second, log) = ScriptedTransport::new(Script::body(Some(1), vec![b"y".to_vec()]));
        let err = run_worker(&sandbox, &profile, || second, &request()).unwrap_err();
        assert!(matches!(err, SandboxError::AlreadyApplied));
        assert_eq!(log.borrow().connections, 0);
    }
}
