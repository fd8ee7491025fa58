#![allow(dead_code, missing_docs)]

//! Common test utilities shared across integration tests.

use std::sync::{Arc, Mutex};

use passport_login_core::{
    storage::{SnapshotStorage, StorageError, StorageResult},
    FieldElement, GroupMembershipPcd, HttpPassportServer, LoginMachine, PassportConfig,
    PassportLogin, PcdError, PopupChannel, ProofRequest, ProofVerifier, ResponseSender,
    LoginError, SemaphoreGroup, SignaturePcd, SEMAPHORE_GROUP_PCD_TYPE,
    SEMAPHORE_SIGNATURE_PCD_TYPE,
};
use semaphore_rs_poseidon::Poseidon;
use semaphore_rs_trees::lazy::LazyMerkleTree;
use serde_json::{json, Value};
use url::Url;

pub const GROUP_JSON: &str =
    r#"{"id": "1", "name": "Zuzalu Participants", "depth": 16, "members": ["11", "22", "33"]}"#;

pub const PARTICIPANT_JSON: &str = r#"{
    "uuid": "u1",
    "commitment": "77",
    "email": "u1@example.org",
    "salt": null,
    "terms_agreed": 1,
    "name": "Ada",
    "role": "resident"
}"#;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Verifier for JSON payloads of the form `{id, claim, proof: {valid: bool}}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeVerifier;

fn verdict(proof: &Value) -> Result<bool, PcdError> {
    proof
        .get("valid")
        .and_then(Value::as_bool)
        .ok_or_else(|| PcdError::Verify("proof has no verdict".to_string()))
}

impl ProofVerifier for FakeVerifier {
    async fn deserialize_group_proof(&self, payload: &str) -> Result<GroupMembershipPcd, PcdError> {
        GroupMembershipPcd::from_json(payload)
    }

    async fn verify_group_proof(&self, pcd: &GroupMembershipPcd) -> Result<bool, PcdError> {
        verdict(&pcd.proof)
    }

    async fn deserialize_signature_proof(&self, payload: &str) -> Result<SignaturePcd, PcdError> {
        SignaturePcd::from_json(payload)
    }

    async fn verify_signature_proof(&self, pcd: &SignaturePcd) -> Result<bool, PcdError> {
        verdict(&pcd.proof)
    }
}

/// A popup opened through [`RecordingChannel`].
#[derive(Debug)]
pub struct OpenedPopup {
    pub window_url: Url,
    pub request: ProofRequest,
    pub responder: ResponseSender,
}

/// Popup channel that keeps every popup it was asked to open, so tests can answer them.
#[derive(Debug, Default, Clone)]
pub struct RecordingChannel {
    opened: Arc<Mutex<Vec<OpenedPopup>>>,
}

impl RecordingChannel {
    pub fn count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn take_last(&self) -> OpenedPopup {
        self.opened.lock().unwrap().pop().expect("no popup was opened")
    }

    pub fn take_first(&self) -> OpenedPopup {
        self.opened.lock().unwrap().remove(0)
    }
}

impl PopupChannel for RecordingChannel {
    fn open(
        &self,
        window_url: &Url,
        request: &ProofRequest,
        responder: ResponseSender,
    ) -> Result<(), LoginError> {
        self.opened.lock().unwrap().push(OpenedPopup {
            window_url: window_url.clone(),
            request: request.clone(),
            responder,
        });
        Ok(())
    }
}

/// Popup channel for hosts where windows are blocked.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockedChannel;

impl PopupChannel for BlockedChannel {
    fn open(&self, _: &Url, _: &ProofRequest, _: ResponseSender) -> Result<(), LoginError> {
        Err(LoginError::Channel("popup blocked".to_string()))
    }
}

/// Storage that reads fine but refuses every write.
#[derive(Debug, Default)]
pub struct ReadOnlyStorage {
    pub snapshot: Option<String>,
}

impl SnapshotStorage for ReadOnlyStorage {
    fn read(&self) -> StorageResult<Option<String>> {
        Ok(self.snapshot.clone())
    }

    fn write_atomic(&self, _snapshot: &str) -> StorageResult<()> {
        Err(StorageError::Write("read-only".to_string()))
    }

    fn clear(&self) -> StorageResult<()> {
        Err(StorageError::Delete("read-only".to_string()))
    }
}

pub fn config(server_url: &str) -> PassportConfig {
    PassportConfig::new("https://zupass.org", server_url, "https://app.example/popup")
        .unwrap()
        .with_app_name("Test App")
}

pub fn machine(server_url: &str) -> LoginMachine<FakeVerifier, HttpPassportServer> {
    let config = config(server_url);
    let server = HttpPassportServer::new(config.clone()).with_max_retries(0);
    LoginMachine::new(config, FakeVerifier, server)
}

pub type TestLogin<P = RecordingChannel> = PassportLogin<FakeVerifier, HttpPassportServer, P>;

pub async fn session<P: PopupChannel>(
    server_url: &str,
    storage: Arc<dyn SnapshotStorage>,
    channel: P,
) -> TestLogin<P> {
    PassportLogin::load(machine(server_url), storage, channel).await
}

/// The root a semaphore prover computes for `group`, built with semaphore-rs's own lazy tree.
pub fn semaphore_root(group: &SemaphoreGroup) -> FieldElement {
    let mut tree = LazyMerkleTree::<Poseidon>::new(group.depth, group.zero_value().0).derived();
    for (index, member) in group.members.iter().enumerate() {
        tree = tree.update(index, &member.0);
    }
    FieldElement(tree.root())
}

/// A group membership response claiming the given values.
pub fn group_response(
    merkle_root: FieldElement,
    signal: FieldElement,
    external_nullifier: FieldElement,
    valid: bool,
) -> String {
    let payload = json!({
        "id": "pcd-group",
        "claim": {
            "merkleRoot": merkle_root,
            "depth": 16,
            "signal": signal,
            "externalNullifier": external_nullifier,
            "nullifierHash": "9001"
        },
        "proof": {"valid": valid}
    });
    json!({"type": SEMAPHORE_GROUP_PCD_TYPE, "pcd": payload.to_string()}).to_string()
}

/// A semaphore signature response over `message` by `commitment`.
pub fn signature_response(commitment: FieldElement, message: &str, valid: bool) -> String {
    let payload = json!({
        "id": "pcd-signature",
        "claim": {
            "identityCommitment": commitment,
            "signedMessage": message,
            "nullifierHash": "5"
        },
        "proof": {"valid": valid}
    });
    json!({"type": SEMAPHORE_SIGNATURE_PCD_TYPE, "pcd": payload.to_string()}).to_string()
}
