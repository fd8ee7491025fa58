//! Integration tests: server.

mod common;

use common::{config, GROUP_JSON, PARTICIPANT_JSON};
use passport_login_core::{
    FieldElement, HttpPassportServer, LoginError, NamedGroup, PassportServer,
};
use test_case::test_case;
use url::Url;

fn server_for(mock_url: &str) -> HttpPassportServer {
    HttpPassportServer::new(config(mock_url)).with_max_retries(0)
}

#[tokio::test]
async fn test_fetch_group() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/semaphore/1")
        .match_header("accept", "application/json")
        .with_status(200)
        .with_body(GROUP_JSON)
        .expect(1)
        .create_async()
        .await;

    let passport = server_for(&server.url());
    let url = config(&server.url()).named_group_url(NamedGroup::Participants);
    let group = passport.fetch_group(&url).await.unwrap();

    assert_eq!(group.id, "1");
    assert_eq!(group.name, "Zuzalu Participants");
    assert_eq!(
        group.members,
        [11u64, 22, 33].map(FieldElement::from).to_vec()
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_group_defaults_missing_fields() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/groups/custom")
        .with_status(200)
        .with_body(r#"{"members": ["0x0a", "11"]}"#)
        .create_async()
        .await;

    let url = Url::parse(&format!("{}/groups/custom", server.url())).unwrap();
    let group = server_for(&server.url()).fetch_group(&url).await.unwrap();
    assert_eq!(group.depth, 16);
    assert_eq!(group.members, vec![FieldElement::from(10), FieldElement::from(11)]);
}

#[test_case(404, "missing" ; "not found")]
#[test_case(200, r#"{"name": "no members"}"# ; "no members")]
#[test_case(200, r#"{"members": ["not a number"]}"# ; "bad member")]
#[tokio::test]
async fn test_fetch_group_errors(status: usize, body: &str) {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/semaphore/2")
        .with_status(status)
        .with_body(body)
        .create_async()
        .await;

    let url = config(&server.url()).named_group_url(NamedGroup::Residents);
    let err = server_for(&server.url()).fetch_group(&url).await.unwrap_err();
    match err {
        LoginError::GroupFetch {
            url: error_url,
            status: error_status,
            ..
        } => {
            assert_eq!(error_url, url.to_string());
            assert_eq!(error_status, Some(status as u16));
        }
        other => panic!("expected GroupFetch, got {other:?}"),
    }
}

#[test_case(r#"{"depth": 1, "members": ["1", "2", "3"]}"# ; "more members than leaves")]
#[test_case(
    r#"{"members": ["1", "21888242871839275222246405745257275088548364400416034343698204186575808495617"]}"#
    ; "member outside the scalar field"
)]
#[tokio::test]
async fn test_fetch_group_rejects_invalid_groups(body: &str) {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/semaphore/3")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let url = config(&server.url()).named_group_url(NamedGroup::Visitors);
    let err = server_for(&server.url()).fetch_group(&url).await.unwrap_err();
    assert!(matches!(err, LoginError::InvalidGroup(_)));
}

#[tokio::test]
async fn test_fetch_group_retries_server_errors() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/semaphore/4")
        .with_status(502)
        .expect(3)
        .create_async()
        .await;

    let url = config(&server.url()).named_group_url(NamedGroup::Organizers);
    let err = HttpPassportServer::new(config(&server.url()))
        .with_max_retries(2)
        .fetch_group(&url)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LoginError::GroupFetch {
            status: Some(502),
            ..
        }
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_lookup_participant() {
    let mut server = mockito::Server::new_async().await;
    let _found = server
        .mock("GET", "/account/user/u1")
        .with_status(200)
        .with_body(PARTICIPANT_JSON)
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/account/user/u2")
        .with_status(410)
        .create_async()
        .await;
    let _broken = server
        .mock("GET", "/account/user/u3")
        .with_status(200)
        .with_body("<html>")
        .create_async()
        .await;

    let passport = server_for(&server.url());

    let participant = passport.lookup_participant("u1").await.unwrap().unwrap();
    assert_eq!(participant.commitment(), &FieldElement::from(77));
    assert_eq!(participant.terms_agreed(), 1);

    assert_eq!(passport.lookup_participant("u2").await.unwrap(), None);

    let err = passport.lookup_participant("u3").await.unwrap_err();
    assert!(matches!(
        err,
        LoginError::ParticipantLookup { ref uuid, status: Some(200), .. } if uuid == "u3"
    ));
}
