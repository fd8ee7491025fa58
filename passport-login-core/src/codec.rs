//! Versioned snapshot format of the session state.
//!
//! ```json
//! {"version": 1, "status": "logged-in", "anonymous": true, "group": {...},
//!  "groupURL": "https://...", "signal": "1", "externalNullifier": "42",
//!  "serializedPCD": {"type": "semaphore-group-signal", "pcd": "..."}}
//! ```
//!
//! A logged-in snapshot carries the proof envelope as received, never its deserialized form. A
//! `logging-in` snapshot is only a tag: pending logins do not survive a reload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{
    error::CodecError,
    field::FieldElement,
    group::SemaphoreGroup,
    participant::Participant,
    pcd::{SerializedPcd, SEMAPHORE_GROUP_PCD_TYPE, SEMAPHORE_SIGNATURE_PCD_TYPE},
    state::{AuthState, GroupBinding, LoggedIn},
};

/// Format version written by [`serialize`].
pub const SNAPSHOT_VERSION: u64 = 1;

const STATUS_LOGGED_OUT: &str = "logged-out";
const STATUS_LOGGING_IN: &str = "logging-in";
const STATUS_LOGGED_IN: &str = "logged-in";

/// A decoded snapshot. Logged-in snapshots hold the envelope only; the session rebuilds the
/// credential from it.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// No session.
    LoggedOut,
    /// A login was pending when the snapshot was written.
    LoggingIn {
        /// Whether the pending login was anonymous, when recorded.
        anonymous: Option<bool>,
    },
    /// A completed login.
    LoggedIn(StoredLogin),
}

/// A persisted completed login.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredLogin {
    /// An identity-revealing login.
    Identified {
        /// The validated participant.
        participant: Participant,
        /// The signature envelope.
        serialized: SerializedPcd,
    },
    /// An anonymous login.
    Anonymous {
        /// The group, signal and external nullifier the proof was checked against.
        binding: GroupBinding,
        /// The membership proof envelope.
        serialized: SerializedPcd,
    },
}

impl From<&AuthState> for Snapshot {
    fn from(state: &AuthState) -> Self {
        match state {
            AuthState::LoggedOut => Self::LoggedOut,
            AuthState::LoggingIn(pending) => Self::LoggingIn {
                anonymous: Some(pending.is_anonymous()),
            },
            AuthState::LoggedIn(LoggedIn::Identified {
                participant,
                credential,
            }) => Self::LoggedIn(StoredLogin::Identified {
                participant: participant.clone(),
                serialized: credential.serialized.clone(),
            }),
            AuthState::LoggedIn(LoggedIn::Anonymous {
                binding,
                credential,
            }) => Self::LoggedIn(StoredLogin::Anonymous {
                binding: binding.clone(),
                serialized: credential.serialized.clone(),
            }),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRecord {
    version: u64,
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anonymous: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    participant: Option<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<SemaphoreGroup>,
    #[serde(rename = "groupURL", default, skip_serializing_if = "Option::is_none")]
    group_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signal: Option<FieldElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external_nullifier: Option<FieldElement>,
    #[serde(rename = "serializedPCD", default, skip_serializing_if = "Option::is_none")]
    serialized_pcd: Option<SerializedPcd>,
}

impl SnapshotRecord {
    fn with_status(status: &str) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            status: status.to_string(),
            ..Self::default()
        }
    }
}

/// Encodes `state` for persistence.
///
/// # Errors
/// Returns [`CodecError::Malformed`] if a participant record cannot be represented as JSON.
pub fn serialize(state: &AuthState) -> Result<String, CodecError> {
    encode(&Snapshot::from(state))
}

/// Encodes a decoded snapshot again. `encode(&deserialize(s)?)` is equivalent to `s` for any
/// snapshot [`serialize`] produced.
///
/// # Errors
/// Returns [`CodecError::Malformed`] if a participant record cannot be represented as JSON.
pub fn encode(snapshot: &Snapshot) -> Result<String, CodecError> {
    let record = match snapshot {
        Snapshot::LoggedOut => SnapshotRecord::with_status(STATUS_LOGGED_OUT),
        Snapshot::LoggingIn { anonymous } => SnapshotRecord {
            anonymous: *anonymous,
            ..SnapshotRecord::with_status(STATUS_LOGGING_IN)
        },
        Snapshot::LoggedIn(StoredLogin::Identified {
            participant,
            serialized,
        }) => SnapshotRecord {
            anonymous: Some(false),
            participant: Some(participant.clone()),
            serialized_pcd: Some(serialized.clone()),
            ..SnapshotRecord::with_status(STATUS_LOGGED_IN)
        },
        Snapshot::LoggedIn(StoredLogin::Anonymous {
            binding,
            serialized,
        }) => SnapshotRecord {
            anonymous: Some(true),
            group: Some(binding.group.clone()),
            group_url: binding.group_url.as_ref().map(ToString::to_string),
            signal: Some(binding.signal),
            external_nullifier: Some(binding.external_nullifier),
            serialized_pcd: Some(serialized.clone()),
            ..SnapshotRecord::with_status(STATUS_LOGGED_IN)
        },
    };

    serde_json::to_string(&record).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Decodes a persisted snapshot.
///
/// The version is checked before anything else, so a snapshot from a newer format is reported as
/// such rather than as malformed.
///
/// # Errors
/// - [`CodecError::UnsupportedVersion`] for a version other than [`SNAPSHOT_VERSION`].
/// - [`CodecError::UnknownStatus`] for an unrecognized status.
/// - [`CodecError::MissingField`] when a field required by the status is absent.
/// - [`CodecError::WrongPcdType`] when the stored envelope does not fit the kind of login.
/// - [`CodecError::Malformed`] for anything else.
pub fn deserialize(raw: &str) -> Result<Snapshot, CodecError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| CodecError::Malformed(e.to_string()))?;
    let Value::Object(object) = &value else {
        return Err(CodecError::Malformed("snapshot is not an object".to_string()));
    };

    let version = object
        .get("version")
        .ok_or(CodecError::MissingField("version"))?
        .as_u64()
        .ok_or_else(|| CodecError::Malformed("version is not an integer".to_string()))?;
    if version != SNAPSHOT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let status = object
        .get("status")
        .ok_or(CodecError::MissingField("status"))?
        .as_str()
        .ok_or_else(|| CodecError::Malformed("status is not a string".to_string()))?;
    if ![STATUS_LOGGED_OUT, STATUS_LOGGING_IN, STATUS_LOGGED_IN].contains(&status) {
        return Err(CodecError::UnknownStatus(status.to_string()));
    }

    let record: SnapshotRecord =
        serde_json::from_value(value).map_err(|e| CodecError::Malformed(e.to_string()))?;

    match record.status.as_str() {
        STATUS_LOGGED_OUT => Ok(Snapshot::LoggedOut),
        STATUS_LOGGING_IN => Ok(Snapshot::LoggingIn {
            anonymous: record.anonymous,
        }),
        _ => decode_logged_in(record).map(Snapshot::LoggedIn),
    }
}

fn decode_logged_in(record: SnapshotRecord) -> Result<StoredLogin, CodecError> {
    let anonymous = record
        .anonymous
        .ok_or(CodecError::MissingField("anonymous"))?;
    let serialized = record
        .serialized_pcd
        .ok_or(CodecError::MissingField("serializedPCD"))?;

    if anonymous {
        expect_pcd_type(&serialized, SEMAPHORE_GROUP_PCD_TYPE)?;
        let group_url = record
            .group_url
            .map(|url| {
                Url::parse(&url).map_err(|e| CodecError::Malformed(format!("groupURL: {e}")))
            })
            .transpose()?;

        Ok(StoredLogin::Anonymous {
            binding: GroupBinding {
                group: record.group.ok_or(CodecError::MissingField("group"))?,
                group_url,
                signal: record.signal.ok_or(CodecError::MissingField("signal"))?,
                external_nullifier: record
                    .external_nullifier
                    .ok_or(CodecError::MissingField("externalNullifier"))?,
            },
            serialized,
        })
    } else {
        expect_pcd_type(&serialized, SEMAPHORE_SIGNATURE_PCD_TYPE)?;
        Ok(StoredLogin::Identified {
            participant: record
                .participant
                .ok_or(CodecError::MissingField("participant"))?,
            serialized,
        })
    }
}

fn expect_pcd_type(serialized: &SerializedPcd, expected: &'static str) -> Result<(), CodecError> {
    if serialized.pcd_type == expected {
        Ok(())
    } else {
        Err(CodecError::WrongPcdType {
            expected,
            actual: serialized.pcd_type.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn participant() -> Participant {
        serde_json::from_value(json!({
            "uuid": "u1",
            "commitment": "77",
            "email": "u1@example.org",
            "salt": null,
            "terms_agreed": 1
        }))
        .unwrap()
    }

    fn identified() -> Snapshot {
        Snapshot::LoggedIn(StoredLogin::Identified {
            participant: participant(),
            serialized: SerializedPcd {
                pcd_type: SEMAPHORE_SIGNATURE_PCD_TYPE.to_string(),
                pcd: "{\"id\":\"1\"}".to_string(),
            },
        })
    }

    fn anonymous() -> Snapshot {
        Snapshot::LoggedIn(StoredLogin::Anonymous {
            binding: GroupBinding {
                group: SemaphoreGroup::new([1u64, 2, 3].map(FieldElement::from).to_vec()),
                group_url: Some(Url::parse("https://api.zupass.org/semaphore/1").unwrap()),
                signal: FieldElement::from(1),
                external_nullifier: FieldElement::from(42),
            },
            serialized: SerializedPcd {
                pcd_type: SEMAPHORE_GROUP_PCD_TYPE.to_string(),
                pcd: "{}".to_string(),
            },
        })
    }

    #[test]
    fn test_logged_out_round_trip() {
        let encoded = serialize(&AuthState::LoggedOut).unwrap();
        assert_eq!(encoded, r#"{"version":1,"status":"logged-out"}"#);
        assert_eq!(deserialize(&encoded).unwrap(), Snapshot::LoggedOut);
    }

    #[test]
    fn test_logged_in_round_trips() {
        for snapshot in [identified(), anonymous()] {
            let encoded = encode(&snapshot).unwrap();
            assert_eq!(deserialize(&encoded).unwrap(), snapshot);
        }
    }

    #[test]
    fn test_anonymous_field_names() {
        let encoded: Value = serde_json::from_str(&encode(&anonymous()).unwrap()).unwrap();
        assert_eq!(encoded["groupURL"], "https://api.zupass.org/semaphore/1");
        assert_eq!(encoded["externalNullifier"], "42");
        assert_eq!(encoded["serializedPCD"]["type"], SEMAPHORE_GROUP_PCD_TYPE);
        assert!(encoded.get("participant").is_none());
    }

    #[test]
    fn test_logging_in_is_only_a_tag() {
        let encoded = encode(&Snapshot::LoggingIn {
            anonymous: Some(true),
        })
        .unwrap();
        assert_eq!(
            encoded,
            r#"{"version":1,"status":"logging-in","anonymous":true}"#
        );
    }

    #[test]
    fn test_inline_group_has_no_url() {
        let Snapshot::LoggedIn(StoredLogin::Anonymous {
            mut binding,
            serialized,
        }) = anonymous()
        else {
            unreachable!()
        };
        binding.group_url = None;
        let snapshot = Snapshot::LoggedIn(StoredLogin::Anonymous {
            binding,
            serialized,
        });
        let encoded = encode(&snapshot).unwrap();
        assert!(!encoded.contains("groupURL"));
        assert_eq!(deserialize(&encoded).unwrap(), snapshot);
    }

    #[test_case(r#"{"version":2,"status":"logged-out"}"#, CodecError::UnsupportedVersion(2) ; "newer version")]
    #[test_case(r#"{"status":"logged-out"}"#, CodecError::MissingField("version") ; "missing version")]
    #[test_case(r#"{"version":1}"#, CodecError::MissingField("status") ; "missing status")]
    #[test_case(r#"{"version":1,"status":"expired"}"#, CodecError::UnknownStatus("expired".to_string()) ; "unknown status")]
    #[test_case(r#"{"version":1,"status":"logged-in","anonymous":false,"participant":{"uuid":"u1","commitment":"1","email":"e"}}"#, CodecError::MissingField("serializedPCD") ; "logged in without pcd")]
    #[test_case(r#"{"version":1,"status":"logged-in","serializedPCD":{"type":"semaphore-signature-pcd","pcd":"{}"}}"#, CodecError::MissingField("anonymous") ; "logged in without anonymous flag")]
    #[test_case(r#"{"version":1,"status":"logged-in","anonymous":false,"serializedPCD":{"type":"semaphore-signature-pcd","pcd":"{}"}}"#, CodecError::MissingField("participant") ; "identified without participant")]
    #[test_case(r#"{"version":1,"status":"logged-in","anonymous":true,"signal":"1","externalNullifier":"2","serializedPCD":{"type":"semaphore-group-signal","pcd":"{}"}}"#, CodecError::MissingField("group") ; "anonymous without group")]
    fn test_rejected_snapshots(raw: &str, expected: CodecError) {
        assert_eq!(deserialize(raw).unwrap_err(), expected);
    }

    #[test]
    fn test_rejects_envelope_of_wrong_kind() {
        let raw = r#"{"version":1,"status":"logged-in","anonymous":true,"group":{"members":[]},"signal":"0","externalNullifier":"0","serializedPCD":{"type":"semaphore-signature-pcd","pcd":"{}"}}"#;
        assert_eq!(
            deserialize(raw).unwrap_err(),
            CodecError::WrongPcdType {
                expected: SEMAPHORE_GROUP_PCD_TYPE,
                actual: SEMAPHORE_SIGNATURE_PCD_TYPE.to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_malformed_input() {
        for raw in ["", "[]", "null", r#"{"version":"1"}"#, r#"{"version":1,"status":"logged-in","anonymous":"yes"}"#] {
            assert!(
                matches!(deserialize(raw), Err(CodecError::Malformed(_))),
                "{raw} should be malformed"
            );
        }
    }
}
