//! Proof-carrying data (PCD) exchanged with the passport, and the verifier capability the login flow
//! consumes.
//!
//! The proof systems themselves live outside this crate. A [`ProofVerifier`] deserializes a PCD
//! payload into its claim and checks the proof; the login flow only ever looks at verified claims.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::field::FieldElement;

/// PCD type of an anonymous semaphore group membership proof.
pub const SEMAPHORE_GROUP_PCD_TYPE: &str = "semaphore-group-signal";

/// PCD type of a semaphore signature over a message.
pub const SEMAPHORE_SIGNATURE_PCD_TYPE: &str = "semaphore-signature-pcd";

/// PCD type of the user's semaphore identity. Only ever requested as a user-provided argument.
pub const SEMAPHORE_IDENTITY_PCD_TYPE: &str = "semaphore-identity-pcd";

/// The envelope the passport returns: a type tag plus the type-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedPcd {
    /// Names the verification procedure that applies to `pcd`.
    #[serde(rename = "type")]
    pub pcd_type: String,
    /// Opaque payload, itself serialized by the PCD package.
    pub pcd: String,
}

impl SerializedPcd {
    /// Parses a raw envelope string as delivered by the popup.
    ///
    /// # Errors
    /// Returns the JSON error if `raw` is not a `{type, pcd}` object.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Serializes the envelope back to the string form the passport produces.
    ///
    /// # Errors
    /// Only fails if serialization of a string field fails, which `serde_json` does not do.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Public claim of a group membership proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembershipClaim {
    /// Root of the group tree the prover showed membership in.
    pub merkle_root: FieldElement,
    /// Depth of that tree.
    pub depth: usize,
    /// Public signal bound into the proof.
    pub signal: FieldElement,
    /// External nullifier scoping the proof.
    pub external_nullifier: FieldElement,
    /// Unique per identity and external nullifier.
    pub nullifier_hash: FieldElement,
}

/// Public claim of a semaphore signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureClaim {
    /// Commitment of the identity that signed.
    pub identity_commitment: FieldElement,
    /// The signed message.
    pub signed_message: String,
    /// Nullifier hash of the signature.
    pub nullifier_hash: FieldElement,
}

/// A deserialized group membership PCD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMembershipPcd {
    /// Identifier assigned by the passport.
    pub id: String,
    /// The public claim.
    pub claim: GroupMembershipClaim,
    /// Proof material, only meaningful to the verifier.
    pub proof: Value,
}

/// A deserialized semaphore signature PCD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignaturePcd {
    /// Identifier assigned by the passport.
    pub id: String,
    /// The public claim.
    pub claim: SignatureClaim,
    /// Proof material, only meaningful to the verifier.
    pub proof: Value,
}

impl GroupMembershipPcd {
    /// Reads the JSON payload layout the passport's PCD packages use: `{id, claim, proof}`.
    ///
    /// # Errors
    /// Returns [`PcdError::Deserialize`] if the payload does not have that layout.
    pub fn from_json(payload: &str) -> Result<Self, PcdError> {
        serde_json::from_str(payload).map_err(|e| PcdError::Deserialize(e.to_string()))
    }
}

impl SignaturePcd {
    /// Reads the JSON payload layout the passport's PCD packages use: `{id, claim, proof}`.
    ///
    /// # Errors
    /// Returns [`PcdError::Deserialize`] if the payload does not have that layout.
    pub fn from_json(payload: &str) -> Result<Self, PcdError> {
        serde_json::from_str(payload).map_err(|e| PcdError::Deserialize(e.to_string()))
    }
}

/// A verified PCD: the envelope as received, which is what gets persisted, plus its deserialized
/// form, which is rebuilt from the envelope on reload.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential<P> {
    /// The envelope as the passport produced it.
    pub serialized: SerializedPcd,
    /// The deserialized PCD.
    pub pcd: P,
}

/// Failures reported by a [`ProofVerifier`].
#[derive(Debug, Error)]
pub enum PcdError {
    /// The payload is not a PCD of the expected type
    #[error("pcd_deserialization_error: {0}")]
    Deserialize(String),
    /// Verification could not be carried out (as opposed to the proof being invalid)
    #[error("pcd_verification_error: {0}")]
    Verify(String),
}

/// Deserialize/verify capability of the semaphore PCD packages.
///
/// Verification returns `Ok(false)` for a proof that is well formed but invalid; `Err` is reserved
/// for the verifier being unable to decide. The login flow treats both as a failed verification.
pub trait ProofVerifier {
    /// Deserializes a [`SEMAPHORE_GROUP_PCD_TYPE`] payload.
    fn deserialize_group_proof(
        &self,
        payload: &str,
    ) -> impl Future<Output = Result<GroupMembershipPcd, PcdError>>;

    /// Verifies a group membership proof.
    fn verify_group_proof(
        &self,
        pcd: &GroupMembershipPcd,
    ) -> impl Future<Output = Result<bool, PcdError>>;

    /// Deserializes a [`SEMAPHORE_SIGNATURE_PCD_TYPE`] payload.
    fn deserialize_signature_proof(
        &self,
        payload: &str,
    ) -> impl Future<Output = Result<SignaturePcd, PcdError>>;

    /// Verifies a semaphore signature.
    fn verify_signature_proof(
        &self,
        pcd: &SignaturePcd,
    ) -> impl Future<Output = Result<bool, PcdError>>;
}
