//! The session: the single place the current [`AuthState`] lives.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::{
    codec::{self, Snapshot},
    error::LoginError,
    machine::{Completion, IgnoredReason, LoginMachine},
    pcd::ProofVerifier,
    popup::{AttemptId, LoginAttempt, PopupChannel, PopupResponse},
    server::PassportServer,
    state::{AuthState, LoginRequest},
    storage::{SnapshotStorage, StorageError},
};

/// A passport login session.
///
/// Owns the state machine, the snapshot storage and the popup channel, and holds the current
/// state. Every transition is persisted before it becomes visible; if persisting fails the
/// transition is not applied, so the stored and in-memory states never diverge.
///
/// Dropping the session ends it. The persisted snapshot stays behind for the next [`Self::load`].
pub struct PassportLogin<V, S, P> {
    machine: LoginMachine<V, S>,
    storage: Arc<dyn SnapshotStorage>,
    channel: P,
    state: Mutex<AuthState>,
}

impl<V, S, P> std::fmt::Debug for PassportLogin<V, S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassportLogin")
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

impl<V, S, P> PassportLogin<V, S, P>
where
    V: ProofVerifier,
    S: PassportServer,
    P: PopupChannel,
{
    /// Starts a session from the persisted snapshot.
    ///
    /// A missing, unreadable or undecodable snapshot starts the session `LoggedOut`, as does a
    /// snapshot of a pending login. Those cases are logged and never fail the session.
    pub async fn load(
        machine: LoginMachine<V, S>,
        storage: Arc<dyn SnapshotStorage>,
        channel: P,
    ) -> Self {
        let (state, reset) = match storage.read() {
            Ok(None) => (AuthState::LoggedOut, false),
            Ok(Some(raw)) => match codec::deserialize(&raw) {
                Ok(snapshot) => {
                    let pending = matches!(snapshot, Snapshot::LoggingIn { .. });
                    match machine.restore(snapshot).await {
                        Ok(state) => (state, pending),
                        Err(e) => {
                            warn!("stored credential no longer deserializes, logging out: {e}");
                            (AuthState::LoggedOut, true)
                        }
                    }
                }
                Err(e) => {
                    warn!("discarding session snapshot: {e}");
                    (AuthState::LoggedOut, true)
                }
            },
            Err(e) => {
                warn!("cannot read session snapshot: {e}");
                (AuthState::LoggedOut, false)
            }
        };

        if reset {
            if let Err(e) = persist(storage.as_ref(), &AuthState::LoggedOut) {
                warn!("cannot reset session snapshot: {e}");
            }
        }
        info!(state = %state.summary(), "session loaded");

        Self {
            machine,
            storage,
            channel,
            state: Mutex::new(state),
        }
    }

    /// The current state.
    ///
    /// # Errors
    /// Returns [`StorageError::Lock`] if a previous holder of the state lock panicked.
    pub fn state(&self) -> Result<AuthState, StorageError> {
        Ok(self.lock_state()?.clone())
    }

    /// The state machine driving the session.
    pub const fn machine(&self) -> &LoginMachine<V, S> {
        &self.machine
    }

    /// Handles a login request.
    ///
    /// For a login, opens the popup, moves to `LoggingIn` and returns the attempt to await. Any
    /// attempt that was pending is superseded. For a logout, moves to `LoggedOut` and returns
    /// `None`.
    ///
    /// # Errors
    /// Fails without changing the state if the group cannot be resolved, the popup cannot be
    /// opened or the new state cannot be persisted.
    pub async fn start_login(
        &self,
        request: LoginRequest,
    ) -> Result<Option<LoginAttempt>, LoginError> {
        let start = self.machine.start_login(request).await?;

        let attempt = match start.popup {
            Some(popup) => {
                self.channel
                    .open(&popup.window_url, &popup.request, popup.responder)?;
                Some(popup.attempt)
            }
            None => None,
        };

        let mut guard = self.lock_state()?;
        self.commit(&mut guard, start.state)?;
        Ok(attempt)
    }

    /// Ends the session.
    ///
    /// # Errors
    /// Fails without changing the state if `LoggedOut` cannot be persisted.
    pub fn logout(&self) -> Result<(), LoginError> {
        let mut guard = self.lock_state()?;
        self.commit(&mut guard, AuthState::LoggedOut)
    }

    /// Completes the pending login with a raw passport response, whichever attempt it answers.
    ///
    /// # Errors
    /// See [`LoginMachine::complete_login`]. The session stays `LoggingIn` on error.
    pub async fn complete_login(&self, raw_response: &str) -> Result<Completion, LoginError> {
        let current = self.state()?;
        let completion = self.machine.complete_login(&current, raw_response).await?;
        self.apply(&current, completion)
    }

    /// Completes the pending login with a response delivered through its popup. Responses of
    /// superseded attempts are ignored.
    ///
    /// # Errors
    /// See [`LoginMachine::complete_login`]. The session stays `LoggingIn` on error.
    pub async fn complete_attempt(
        &self,
        response: &PopupResponse,
    ) -> Result<Completion, LoginError> {
        let current = self.state()?;
        let completion = self.machine.complete_attempt(&current, response).await?;
        self.apply(&current, completion)
    }

    /// Waits for the popup of `attempt` to answer, then completes the login with its response.
    ///
    /// # Errors
    /// [`LoginError::Channel`] if the popup closes without answering, otherwise as
    /// [`Self::complete_attempt`].
    pub async fn await_login(&self, attempt: LoginAttempt) -> Result<Completion, LoginError> {
        let response = attempt.response().await?;
        self.complete_attempt(&response).await
    }

    /// Applies a completion computed against `current`, unless another transition happened while
    /// the response was being validated.
    fn apply(&self, current: &AuthState, completion: Completion) -> Result<Completion, LoginError> {
        let Completion::Transition(next) = completion else {
            return Ok(completion);
        };

        let mut guard = self.lock_state()?;
        if pending_attempt(&guard) != pending_attempt(current) {
            debug!("session moved on while validating, ignoring response");
            return Ok(Completion::Ignored(IgnoredReason::Superseded));
        }

        self.commit(&mut guard, next.clone())?;
        Ok(Completion::Transition(next))
    }

    /// Persists `next`, then publishes it.
    fn commit(&self, guard: &mut MutexGuard<'_, AuthState>, next: AuthState) -> Result<(), LoginError> {
        persist(self.storage.as_ref(), &next)?;
        debug!(from = %guard.summary(), to = %next.summary(), "state transition");
        **guard = next;
        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, AuthState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Lock("session state mutex poisoned".to_string()))
    }
}

fn pending_attempt(state: &AuthState) -> Option<AttemptId> {
    match state {
        AuthState::LoggingIn(pending) => Some(pending.attempt()),
        _ => None,
    }
}

fn persist(storage: &dyn SnapshotStorage, state: &AuthState) -> Result<(), StorageError> {
    let snapshot =
        codec::serialize(state).map_err(|e| StorageError::Serialization(e.to_string()))?;
    storage.write_atomic(&snapshot)
}
