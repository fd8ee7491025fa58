//! Authentication states and login requests.

use std::fmt;

use url::Url;

use crate::{
    field::FieldElement,
    group::{GroupSource, SemaphoreGroup},
    participant::Participant,
    pcd::{Credential, GroupMembershipPcd, SignaturePcd},
    popup::AttemptId,
};

/// The group, signal and external nullifier an anonymous login is bound to.
///
/// Recorded when the login starts and kept once it completes: a logged-in binding is exactly the
/// one the verified proof was checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBinding {
    /// The group snapshot the proof must have been generated against.
    pub group: SemaphoreGroup,
    /// Where the snapshot was fetched from, if it was not given inline.
    pub group_url: Option<Url>,
    /// Public signal the proof must carry.
    pub signal: FieldElement,
    /// External nullifier the proof must carry.
    pub external_nullifier: FieldElement,
}

/// A login waiting for the passport's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingLogin {
    /// Waiting for a signature over the user's uuid.
    Identified {
        /// The attempt whose response is awaited.
        attempt: AttemptId,
    },
    /// Waiting for a group membership proof.
    Anonymous {
        /// The attempt whose response is awaited.
        attempt: AttemptId,
        /// What the proof will be checked against.
        binding: GroupBinding,
    },
}

impl PendingLogin {
    /// The attempt whose response is awaited.
    #[must_use]
    pub const fn attempt(&self) -> AttemptId {
        match self {
            Self::Identified { attempt } | Self::Anonymous { attempt, .. } => *attempt,
        }
    }

    /// Whether the login is anonymous.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous { .. })
    }
}

/// A completed login.
#[derive(Debug, Clone, PartialEq)]
pub enum LoggedIn {
    /// The user revealed their identity.
    Identified {
        /// The participant whose commitment matched the signature.
        participant: Participant,
        /// The verified signature.
        credential: Credential<SignaturePcd>,
    },
    /// The user proved group membership without revealing who they are.
    Anonymous {
        /// The group, signal and external nullifier the proof was checked against.
        binding: GroupBinding,
        /// The verified membership proof.
        credential: Credential<GroupMembershipPcd>,
    },
}

impl LoggedIn {
    /// Whether the login is anonymous.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous { .. })
    }

    /// The participant, for identity-revealing logins.
    #[must_use]
    pub const fn participant(&self) -> Option<&Participant> {
        match self {
            Self::Identified { participant, .. } => Some(participant),
            Self::Anonymous { .. } => None,
        }
    }
}

/// Authentication state of a session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    /// No login in progress.
    #[default]
    LoggedOut,
    /// Waiting for the passport.
    LoggingIn(PendingLogin),
    /// Authenticated.
    LoggedIn(LoggedIn),
}

impl AuthState {
    /// The status tag, as persisted.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::LoggedOut => "logged-out",
            Self::LoggingIn(_) => "logging-in",
            Self::LoggedIn(_) => "logged-in",
        }
    }

    /// Whether the state belongs to an anonymous login. `None` when logged out.
    #[must_use]
    pub const fn anonymous(&self) -> Option<bool> {
        match self {
            Self::LoggedOut => None,
            Self::LoggingIn(pending) => Some(pending.is_anonymous()),
            Self::LoggedIn(logged_in) => Some(logged_in.is_anonymous()),
        }
    }

    /// A loggable view of the state, free of credentials and personal data.
    #[must_use]
    pub const fn summary(&self) -> StateSummary<'_> {
        StateSummary(self)
    }
}

/// Displays a state as its status and anonymous flag.
#[derive(Debug, Clone, Copy)]
pub struct StateSummary<'a>(&'a AuthState);

impl fmt::Display for StateSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.anonymous() {
            Some(anonymous) => write!(f, "{} (anonymous: {anonymous})", self.0.status()),
            None => f.write_str(self.0.status()),
        }
    }
}

/// An anonymous login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymousLogin {
    /// The group to prove membership in.
    pub group: GroupSource,
    /// Public signal bound into the proof. Defaults to zero.
    pub signal: Option<FieldElement>,
    /// External nullifier scoping the proof. Defaults to zero.
    pub external_nullifier: Option<FieldElement>,
}

impl AnonymousLogin {
    /// An anonymous login into `group` with zero signal and external nullifier.
    #[must_use]
    pub const fn new(group: GroupSource) -> Self {
        Self {
            group,
            signal: None,
            external_nullifier: None,
        }
    }

    /// Binds the proof to `signal`.
    #[must_use]
    pub const fn with_signal(mut self, signal: FieldElement) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Scopes the proof to `external_nullifier`.
    #[must_use]
    pub const fn with_external_nullifier(mut self, external_nullifier: FieldElement) -> Self {
        self.external_nullifier = Some(external_nullifier);
        self
    }
}

/// What the application asks the login flow to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginRequest {
    /// End the session.
    Logout,
    /// Log in revealing the user's identity.
    Identified,
    /// Log in anonymously as a member of a group.
    Anonymous(AnonymousLogin),
}

impl From<AnonymousLogin> for LoginRequest {
    fn from(login: AnonymousLogin) -> Self {
        Self::Anonymous(login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::NamedGroup;

    #[test]
    fn test_summary_hides_details() {
        let pending = AuthState::LoggingIn(PendingLogin::Anonymous {
            attempt: AttemptId::nil(),
            binding: GroupBinding {
                group: SemaphoreGroup::new(vec![FieldElement::from(1)]),
                group_url: None,
                signal: FieldElement::ZERO,
                external_nullifier: FieldElement::ZERO,
            },
        });
        assert_eq!(pending.summary().to_string(), "logging-in (anonymous: true)");
        assert_eq!(AuthState::LoggedOut.summary().to_string(), "logged-out");
    }

    #[test]
    fn test_anonymous_login_defaults() {
        let login = AnonymousLogin::new(GroupSource::Named(NamedGroup::Participants));
        assert_eq!(login.signal, None);

        let login = login
            .with_signal(FieldElement::from(1))
            .with_external_nullifier(FieldElement::from(42));
        assert_eq!(login.signal, Some(FieldElement::from(1)));
        assert_eq!(login.external_nullifier, Some(FieldElement::from(42)));
    }
}
