//! Integration tests: session.

mod common;

use std::sync::Arc;

use common::{
    init_tracing, session, signature_response, BlockedChannel, ReadOnlyStorage, RecordingChannel,
    PARTICIPANT_JSON,
};
use passport_login_core::{
    codec,
    storage::{FileSnapshotStorage, MemorySnapshotStorage, SnapshotStorage},
    AuthState, Completion, FieldElement, LoginError, LoginRequest,
};

async fn logged_in_snapshot() -> String {
    let mut server = mockito::Server::new_async().await;
    let _participant = server
        .mock("GET", "/account/user/u1")
        .with_status(200)
        .with_body(PARTICIPANT_JSON)
        .create_async()
        .await;
    let storage = Arc::new(MemorySnapshotStorage::new());
    let login = session(&server.url(), storage.clone(), RecordingChannel::default()).await;

    login.start_login(LoginRequest::Identified).await.unwrap();
    let completion = login
        .complete_login(&signature_response(FieldElement::from(77), "u1", true))
        .await
        .unwrap();
    assert!(matches!(completion, Completion::Transition(_)));

    storage.read().unwrap().unwrap()
}

#[tokio::test]
async fn test_starts_logged_out_without_snapshot() {
    let storage = Arc::new(MemorySnapshotStorage::new());
    let login = session("http://127.0.0.1:9", storage.clone(), RecordingChannel::default()).await;
    assert_eq!(login.state().unwrap(), AuthState::LoggedOut);
    assert_eq!(storage.read().unwrap(), None);
}

#[tokio::test]
async fn test_logged_in_session_survives_reload() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let snapshot = logged_in_snapshot().await;
    FileSnapshotStorage::new(&path).write_atomic(&snapshot).unwrap();

    let login = session(
        "http://127.0.0.1:9",
        Arc::new(FileSnapshotStorage::new(&path)),
        RecordingChannel::default(),
    )
    .await;
    let state = login.state().unwrap();
    let AuthState::LoggedIn(logged_in) = &state else {
        panic!("expected the stored login, got {state:?}");
    };
    assert_eq!(logged_in.participant().unwrap().uuid(), "u1");

    // what was loaded serializes back to what was stored
    assert_eq!(codec::serialize(&state).unwrap(), snapshot);

    login.logout().unwrap();
    let reloaded = session(
        "http://127.0.0.1:9",
        Arc::new(FileSnapshotStorage::new(&path)),
        RecordingChannel::default(),
    )
    .await;
    assert_eq!(reloaded.state().unwrap(), AuthState::LoggedOut);
}

#[tokio::test]
async fn test_pending_login_is_not_resumed() {
    let storage = Arc::new(MemorySnapshotStorage::new());
    let login = session("http://127.0.0.1:9", storage.clone(), RecordingChannel::default()).await;
    login.start_login(LoginRequest::Identified).await.unwrap();
    assert_eq!(
        storage.read().unwrap().as_deref(),
        Some(r#"{"version":1,"status":"logging-in","anonymous":false}"#)
    );
    drop(login);

    let reloaded =
        session("http://127.0.0.1:9", storage.clone(), RecordingChannel::default()).await;
    assert_eq!(reloaded.state().unwrap(), AuthState::LoggedOut);
    assert_eq!(
        storage.read().unwrap().as_deref(),
        Some(r#"{"version":1,"status":"logged-out"}"#)
    );
}

#[tokio::test]
async fn test_unusable_snapshots_fall_back_to_logged_out() {
    let valid = logged_in_snapshot().await;
    let unreadable_payload = valid.replace(r#""pcd":"{"#, r#""pcd":"[{"#);
    assert_ne!(unreadable_payload, valid);

    for snapshot in [
        "garbage".to_string(),
        r#"{"version":2,"status":"logged-in"}"#.to_string(),
        r#"{"version":1,"status":"logged-in","anonymous":false}"#.to_string(),
        unreadable_payload,
    ] {
        let storage = Arc::new(MemorySnapshotStorage::with_snapshot(snapshot.clone()));
        let login =
            session("http://127.0.0.1:9", storage.clone(), RecordingChannel::default()).await;
        assert_eq!(login.state().unwrap(), AuthState::LoggedOut, "{snapshot}");
        assert_eq!(
            storage.read().unwrap().as_deref(),
            Some(r#"{"version":1,"status":"logged-out"}"#)
        );
    }
}

#[tokio::test]
async fn test_failed_persist_does_not_transition() {
    let storage = Arc::new(ReadOnlyStorage::default());
    let login = session("http://127.0.0.1:9", storage, RecordingChannel::default()).await;

    let err = login.start_login(LoginRequest::Identified).await.unwrap_err();
    assert!(matches!(err, LoginError::Storage(_)));
    assert!(err.is_transient());
    assert_eq!(login.state().unwrap(), AuthState::LoggedOut);
}

#[tokio::test]
async fn test_blocked_popup_does_not_transition() {
    let storage = Arc::new(MemorySnapshotStorage::new());
    let login = session("http://127.0.0.1:9", storage.clone(), BlockedChannel).await;

    let err = login.start_login(LoginRequest::Identified).await.unwrap_err();
    assert!(matches!(err, LoginError::Channel(_)));
    assert_eq!(login.state().unwrap(), AuthState::LoggedOut);
    assert_eq!(storage.read().unwrap(), None);
}
