//! The login state machine.
//!
//! [`LoginMachine`] decides transitions but holds no state itself: callers pass the current
//! [`AuthState`] in and apply the state that comes out. Persisting and publishing that state is the
//! session's job (see [`PassportLogin`](crate::PassportLogin)).

use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    codec::{Snapshot, StoredLogin},
    config::PassportConfig,
    error::LoginError,
    field::FieldElement,
    group::{GroupSource, SemaphoreGroup},
    merkle_tree::{default_hasher, TreeHasher},
    participant::Participant,
    pcd::{
        Credential, GroupMembershipPcd, PcdError, ProofVerifier, SerializedPcd, SignaturePcd,
        SEMAPHORE_GROUP_PCD_TYPE, SEMAPHORE_SIGNATURE_PCD_TYPE,
    },
    popup::{attempt_channel, LoginAttempt, PopupResponse, ResponseSender},
    request::ProofRequest,
    server::PassportServer,
    state::{AnonymousLogin, AuthState, GroupBinding, LoggedIn, LoginRequest, PendingLogin},
};

/// Everything needed to show the popup of a new login attempt.
#[derive(Debug)]
pub struct PopupLaunch {
    /// The proof request.
    pub request: ProofRequest,
    /// URL the popup window opens.
    pub window_url: Url,
    /// Handed to the popup channel.
    pub responder: ResponseSender,
    /// Kept by the caller to await the response.
    pub attempt: LoginAttempt,
}

/// Result of [`LoginMachine::start_login`].
#[derive(Debug)]
pub struct LoginStart {
    /// The state to move to.
    pub state: AuthState,
    /// The popup to open. `None` for a logout.
    pub popup: Option<PopupLaunch>,
}

/// Why a response was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    /// No login is pending.
    NotLoggingIn,
    /// A response for an attempt that has since been replaced.
    Superseded,
    /// An anonymous login received a PCD of another type.
    UnrelatedPcdType,
}

/// Outcome of a completion that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The response completed the login.
    Transition(AuthState),
    /// The response was not for the pending login. The state is unchanged.
    Ignored(IgnoredReason),
}

/// Decides login transitions and validates passport responses.
pub struct LoginMachine<V, S> {
    config: PassportConfig,
    verifier: V,
    server: S,
    hasher: Box<dyn TreeHasher>,
}

impl<V, S> std::fmt::Debug for LoginMachine<V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginMachine")
            .field("config", &self.config)
            .field("hasher", &self.hasher.name())
            .finish_non_exhaustive()
    }
}

impl<V: ProofVerifier, S: PassportServer> LoginMachine<V, S> {
    /// Creates a machine using the default tree hasher.
    pub fn new(config: PassportConfig, verifier: V, server: S) -> Self {
        Self {
            config,
            verifier,
            server,
            hasher: default_hasher(),
        }
    }

    /// Replaces the hasher used to recompute group roots.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Box<dyn TreeHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// The configuration the machine was built with.
    pub const fn config(&self) -> &PassportConfig {
        &self.config
    }

    /// Computes the state a login request leads to, and the popup to open for it.
    ///
    /// Any previously pending attempt is superseded: the returned state carries a fresh attempt id.
    ///
    /// # Errors
    /// - [`LoginError::GroupFetch`] if the group of an anonymous login cannot be fetched.
    /// - [`LoginError::InvalidGroup`] if the group does not fit its tree.
    pub async fn start_login(&self, request: LoginRequest) -> Result<LoginStart, LoginError> {
        let (state, request) = match request {
            LoginRequest::Logout => {
                return Ok(LoginStart {
                    state: AuthState::LoggedOut,
                    popup: None,
                })
            }
            LoginRequest::Identified => {
                (None, ProofRequest::identity_revealing(&self.config))
            }
            LoginRequest::Anonymous(login) => {
                let binding = self.bind_group(login).await?;
                let request = ProofRequest::group_membership(
                    &self.config,
                    &binding.group,
                    binding.group_url.as_ref(),
                    binding.signal,
                    binding.external_nullifier,
                );
                (Some(binding), request)
            }
        };

        let window_url = request
            .popup_window_url(&self.config)
            .map_err(|e| LoginError::Channel(format!("cannot encode proof request: {e}")))?;

        let (attempt, responder) = attempt_channel();
        let pending = match state {
            None => PendingLogin::Identified {
                attempt: attempt.id(),
            },
            Some(binding) => PendingLogin::Anonymous {
                attempt: attempt.id(),
                binding,
            },
        };
        let state = AuthState::LoggingIn(pending);
        info!(attempt = %attempt.id(), state = %state.summary(), "login started");

        Ok(LoginStart {
            state,
            popup: Some(PopupLaunch {
                request,
                window_url,
                responder,
                attempt,
            }),
        })
    }

    async fn bind_group(&self, login: AnonymousLogin) -> Result<GroupBinding, LoginError> {
        let (group, group_url) = match login.group {
            GroupSource::Inline(group) => {
                group.validate()?;
                (group, None)
            }
            GroupSource::Url(url) => (self.server.fetch_group(&url).await?, Some(url)),
            GroupSource::Named(named) => {
                let url = self.config.named_group_url(named);
                (self.server.fetch_group(&url).await?, Some(url))
            }
        };

        Ok(GroupBinding {
            group,
            group_url,
            signal: login.signal.unwrap_or(FieldElement::ZERO),
            external_nullifier: login.external_nullifier.unwrap_or(FieldElement::ZERO),
        })
    }

    /// Completes the pending login of `current` with a response delivered by its popup. A response
    /// for any other attempt is ignored.
    ///
    /// # Errors
    /// See [`Self::complete_login`].
    pub async fn complete_attempt(
        &self,
        current: &AuthState,
        response: &PopupResponse,
    ) -> Result<Completion, LoginError> {
        if let AuthState::LoggingIn(pending) = current {
            if pending.attempt() != response.attempt {
                debug!(
                    attempt = %response.attempt,
                    pending = %pending.attempt(),
                    "ignoring response of a superseded attempt"
                );
                return Ok(Completion::Ignored(IgnoredReason::Superseded));
            }
        }
        self.complete_login(current, &response.raw).await
    }

    /// Completes the pending login of `current` with a raw passport response.
    ///
    /// A state that is not `LoggingIn` ignores every response. Errors never imply a transition:
    /// the caller stays `LoggingIn`.
    ///
    /// # Errors
    /// - [`LoginError::MalformedResponse`] if the response is not a PCD envelope or its payload
    ///   cannot be deserialized.
    /// - [`LoginError::VerificationFailed`] if the proof does not verify.
    /// - [`LoginError::GroupRootMismatch`], [`LoginError::SignalMismatch`] and
    ///   [`LoginError::NullifierMismatch`] if a group proof is bound to something else.
    /// - [`LoginError::WrongPcdType`] if an identity-revealing login receives another PCD type.
    /// - [`LoginError::ParticipantNotFound`] and [`LoginError::CommitmentMismatch`] if the signer
    ///   is not a known participant.
    /// - [`LoginError::ParticipantLookup`] if the participant cannot be looked up.
    pub async fn complete_login(
        &self,
        current: &AuthState,
        raw_response: &str,
    ) -> Result<Completion, LoginError> {
        let AuthState::LoggingIn(pending) = current else {
            debug!(state = %current.summary(), "ignoring response, no login pending");
            return Ok(Completion::Ignored(IgnoredReason::NotLoggingIn));
        };

        let serialized = SerializedPcd::from_json(raw_response)
            .map_err(|e| LoginError::MalformedResponse(format!("not a pcd envelope: {e}")))?;

        let logged_in = match pending {
            PendingLogin::Anonymous { binding, .. } => {
                if serialized.pcd_type != SEMAPHORE_GROUP_PCD_TYPE {
                    debug!(pcd_type = %serialized.pcd_type, "ignoring unrelated pcd");
                    return Ok(Completion::Ignored(IgnoredReason::UnrelatedPcdType));
                }
                self.complete_anonymous(binding, serialized).await?
            }
            PendingLogin::Identified { .. } => self.complete_identified(serialized).await?,
        };

        let state = AuthState::LoggedIn(logged_in);
        info!(attempt = %pending.attempt(), state = %state.summary(), "login completed");
        Ok(Completion::Transition(state))
    }

    async fn complete_anonymous(
        &self,
        binding: &GroupBinding,
        serialized: SerializedPcd,
    ) -> Result<LoggedIn, LoginError> {
        let pcd = self
            .verifier
            .deserialize_group_proof(&serialized.pcd)
            .await
            .map_err(malformed_payload)?;

        check_verdict(self.verifier.verify_group_proof(&pcd).await)?;

        let expected_root = binding.group.merkle_root(self.hasher.as_ref())?;
        let claim = &pcd.claim;
        if claim.merkle_root != expected_root {
            return Err(LoginError::GroupRootMismatch {
                expected: expected_root,
                actual: claim.merkle_root,
            });
        }
        if claim.signal != binding.signal {
            return Err(LoginError::SignalMismatch {
                expected: binding.signal,
                actual: claim.signal,
            });
        }
        if claim.external_nullifier != binding.external_nullifier {
            return Err(LoginError::NullifierMismatch {
                expected: binding.external_nullifier,
                actual: claim.external_nullifier,
            });
        }

        Ok(LoggedIn::Anonymous {
            binding: binding.clone(),
            credential: Credential { serialized, pcd },
        })
    }

    async fn complete_identified(&self, serialized: SerializedPcd) -> Result<LoggedIn, LoginError> {
        if serialized.pcd_type != SEMAPHORE_SIGNATURE_PCD_TYPE {
            return Err(LoginError::WrongPcdType {
                expected: SEMAPHORE_SIGNATURE_PCD_TYPE.to_string(),
                actual: serialized.pcd_type,
            });
        }

        let pcd = self
            .verifier
            .deserialize_signature_proof(&serialized.pcd)
            .await
            .map_err(malformed_payload)?;

        check_verdict(self.verifier.verify_signature_proof(&pcd).await)?;

        let uuid = signed_uuid(&pcd.claim.signed_message)?;
        let participant: Participant = self
            .server
            .lookup_participant(&uuid)
            .await?
            .ok_or_else(|| LoginError::ParticipantNotFound { uuid: uuid.clone() })?;

        if participant.commitment() != &pcd.claim.identity_commitment {
            warn!(%uuid, "participant commitment does not match the signature");
            return Err(LoginError::CommitmentMismatch { uuid });
        }

        Ok(LoggedIn::Identified {
            participant,
            credential: Credential { serialized, pcd },
        })
    }

    /// Rebuilds the state a persisted snapshot describes.
    ///
    /// Credentials are deserialized again but not re-verified: they were verified before being
    /// persisted. A pending login is not resumed and restores as `LoggedOut`.
    ///
    /// # Errors
    /// Returns the [`PcdError`] of a stored envelope that no longer deserializes.
    pub async fn restore(&self, snapshot: Snapshot) -> Result<AuthState, PcdError> {
        match snapshot {
            Snapshot::LoggedOut | Snapshot::LoggingIn { .. } => Ok(AuthState::LoggedOut),
            Snapshot::LoggedIn(StoredLogin::Identified {
                participant,
                serialized,
            }) => {
                let pcd: SignaturePcd = self
                    .verifier
                    .deserialize_signature_proof(&serialized.pcd)
                    .await?;
                Ok(AuthState::LoggedIn(LoggedIn::Identified {
                    participant,
                    credential: Credential { serialized, pcd },
                }))
            }
            Snapshot::LoggedIn(StoredLogin::Anonymous {
                binding,
                serialized,
            }) => {
                let pcd: GroupMembershipPcd = self
                    .verifier
                    .deserialize_group_proof(&serialized.pcd)
                    .await?;
                Ok(AuthState::LoggedIn(LoggedIn::Anonymous {
                    binding,
                    credential: Credential { serialized, pcd },
                }))
            }
        }
    }

    /// Fetches the group a source designates, for diagnostics.
    ///
    /// # Errors
    /// Same as the group resolution of [`Self::start_login`].
    pub async fn resolve_group(&self, source: GroupSource) -> Result<SemaphoreGroup, LoginError> {
        Ok(self.bind_group(AnonymousLogin::new(source)).await?.group)
    }

    /// Recomputes the root of `group` with the machine's hasher.
    ///
    /// # Errors
    /// Returns [`LoginError::InvalidGroup`] if the group does not fit its tree.
    pub fn group_root(&self, group: &SemaphoreGroup) -> Result<FieldElement, LoginError> {
        group.merkle_root(self.hasher.as_ref())
    }
}

fn malformed_payload(error: PcdError) -> LoginError {
    LoginError::MalformedResponse(error.to_string())
}

fn check_verdict(verdict: Result<bool, PcdError>) -> Result<(), LoginError> {
    match verdict {
        Ok(true) => Ok(()),
        Ok(false) => Err(LoginError::VerificationFailed("invalid proof".to_string())),
        Err(e) => Err(LoginError::VerificationFailed(e.to_string())),
    }
}

/// Extracts the participant uuid from a signed message: either the uuid itself or a JSON object
/// with a `uuid` key.
fn signed_uuid(message: &str) -> Result<String, LoginError> {
    let message = message.trim();
    let uuid = if message.starts_with('{') {
        let value: Value = serde_json::from_str(message)
            .map_err(|e| LoginError::MalformedResponse(format!("signed message: {e}")))?;
        value
            .get("uuid")
            .and_then(Value::as_str)
            .map(str::trim)
            .ok_or_else(|| {
                LoginError::MalformedResponse("signed message has no uuid".to_string())
            })?
            .to_string()
    } else {
        message.to_string()
    };

    if uuid.is_empty() {
        return Err(LoginError::MalformedResponse(
            "signed message is empty".to_string(),
        ));
    }
    Ok(uuid)
}
