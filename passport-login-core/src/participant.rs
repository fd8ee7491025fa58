use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::field::FieldElement;

/// A passport user record, as served by the passport server.
///
/// Participants are only ever obtained by deserializing a server response (or a snapshot that was
/// written from one). They are trusted only after their commitment has been matched against a
/// verified signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    uuid: String,
    commitment: FieldElement,
    email: String,
    #[serde(default)]
    salt: Option<String>,
    #[serde(rename = "terms_agreed", alias = "termsAgreed", default)]
    terms_agreed: u32,
    /// Deployment-specific fields (name, role, residence, ...), kept so that a persisted
    /// participant round-trips unchanged.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Participant {
    /// The participant's unique identifier.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The identity commitment registered for the participant.
    #[must_use]
    pub const fn commitment(&self) -> &FieldElement {
        &self.commitment
    }

    /// The participant's email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Salt of the participant's password-derived key, if any.
    #[must_use]
    pub fn salt(&self) -> Option<&str> {
        self.salt.as_deref()
    }

    /// Version of the terms of service the participant agreed to, 0 if none.
    #[must_use]
    pub const fn terms_agreed(&self) -> u32 {
        self.terms_agreed
    }

    /// A deployment-specific field, e.g. `"name"` or `"role"`.
    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}
