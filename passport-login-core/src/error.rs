use thiserror::Error;

use crate::{field::FieldElement, storage::StorageError};

/// Configuration errors. Raised once, when a [`PassportConfig`](crate::PassportConfig) is built.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configured URL could not be parsed
    #[error("invalid_url: {name} ({reason})")]
    InvalidUrl {
        /// Name of the configuration option.
        name: String,
        /// Parser message.
        reason: String,
    },
    /// A configured URL uses a scheme other than `http` or `https`
    #[error("unsupported_scheme: {name} uses {scheme}")]
    UnsupportedScheme {
        /// Name of the configuration option.
        name: String,
        /// The offending scheme.
        scheme: String,
    },
    /// A JSON configuration document could not be parsed
    #[error("invalid_config_json: {0}")]
    InvalidJson(String),
}

/// Errors surfaced by the login state machine.
///
/// None of these move the state: a failed `start_login` leaves the previous state in place and a
/// failed completion leaves the session `LoggingIn`, from where the caller may retry or log out.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The semaphore group could not be fetched (transient, retry by restarting the login)
    #[error("group_fetch_error: {url} (status {status:?}): {error}")]
    GroupFetch {
        /// The group URL.
        url: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Error details.
        error: String,
    },
    /// The participant lookup failed for a reason other than a missing participant (transient)
    #[error("participant_lookup_error: {uuid} (status {status:?}): {error}")]
    ParticipantLookup {
        /// The participant being looked up.
        uuid: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Error details.
        error: String,
    },
    /// A group snapshot cannot be used for a login
    #[error("invalid_group: {0}")]
    InvalidGroup(String),
    /// The passport response is not a serialized PCD envelope, or its payload cannot be deserialized
    #[error("malformed_response: {0}")]
    MalformedResponse(String),
    /// An identity-revealing login received a PCD of the wrong type
    #[error("wrong_pcd_type: expected {expected}, got {actual}")]
    WrongPcdType {
        /// The PCD type the pending login asked for.
        expected: String,
        /// The PCD type that arrived.
        actual: String,
    },
    /// The proof did not verify
    #[error("verification_failed: {0}")]
    VerificationFailed(String),
    /// The proof was generated against a different group than the one the login asked for
    #[error("group_root_mismatch: expected {expected}, got {actual}")]
    GroupRootMismatch {
        /// Root recomputed from the pending group.
        expected: FieldElement,
        /// Root claimed by the proof.
        actual: FieldElement,
    },
    /// The proof is bound to a different signal
    #[error("signal_mismatch: expected {expected}, got {actual}")]
    SignalMismatch {
        /// Signal of the pending login.
        expected: FieldElement,
        /// Signal claimed by the proof.
        actual: FieldElement,
    },
    /// The proof is bound to a different external nullifier
    #[error("nullifier_mismatch: expected {expected}, got {actual}")]
    NullifierMismatch {
        /// External nullifier of the pending login.
        expected: FieldElement,
        /// External nullifier claimed by the proof.
        actual: FieldElement,
    },
    /// The signed identifier does not belong to any participant
    #[error("participant_not_found: {uuid}")]
    ParticipantNotFound {
        /// The signed identifier.
        uuid: String,
    },
    /// The server record disagrees with the identity commitment that produced the signature
    #[error("commitment_mismatch: participant {uuid}")]
    CommitmentMismatch {
        /// The participant whose record disagrees.
        uuid: String,
    },
    /// The popup could not be opened
    #[error("channel_error: {0}")]
    Channel(String),
    /// The new state could not be persisted, so it was not applied
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LoginError {
    /// Whether retrying (by restarting the login) may succeed without anything else changing.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::GroupFetch { .. }
                | Self::ParticipantLookup { .. }
                | Self::Channel(_)
                | Self::Storage(_)
        )
    }
}

/// Errors decoding a persisted snapshot. Never surfaced to the user: the session falls back to
/// `LoggedOut` and logs the error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Not a JSON object, or a field has the wrong shape
    #[error("malformed_snapshot: {0}")]
    Malformed(String),
    /// The snapshot was written by an unknown format version
    #[error("unsupported_version: {0}")]
    UnsupportedVersion(u64),
    /// The status tag is not one this format knows
    #[error("unknown_status: {0}")]
    UnknownStatus(String),
    /// A field required by the status/anonymous combination is absent
    #[error("missing_field: {0}")]
    MissingField(&'static str),
    /// The stored PCD envelope does not match the kind of login it belongs to
    #[error("wrong_pcd_type: expected {expected}, got {actual}")]
    WrongPcdType {
        /// The PCD type the record requires.
        expected: &'static str,
        /// The stored PCD type.
        actual: String,
    },
}

/// A value could not be read as a field element.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    /// The presented data is not a valid number up to 256 bits
    #[error("invalid_number: {0}")]
    InvalidNumber(String),
}
