//! The popup side of a login: the channel that carries one response back per attempt, and the
//! routing logic of the application's popup page.

use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::{error::LoginError, request::ProofRequest};

/// Identifies one login attempt. A response is only accepted for the attempt that is pending.
pub type AttemptId = Uuid;

/// Sending half handed to the popup channel. Consumed by [`Self::deliver`], so at most one response
/// can ever be delivered per attempt.
#[derive(Debug)]
pub struct ResponseSender {
    attempt: AttemptId,
    sender: oneshot::Sender<String>,
}

impl ResponseSender {
    /// The attempt this sender answers.
    #[must_use]
    pub const fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Delivers the raw passport response. Returns `false` if nobody is waiting anymore.
    pub fn deliver(self, raw_response: impl Into<String>) -> bool {
        self.sender.send(raw_response.into()).is_ok()
    }
}

/// A response delivered by the popup, tagged with the attempt it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupResponse {
    /// The attempt the popup was opened for.
    pub attempt: AttemptId,
    /// The raw `{type, pcd}` string.
    pub raw: String,
}

/// Receiving half of a login attempt, returned by `start_login`.
#[derive(Debug)]
pub struct LoginAttempt {
    id: AttemptId,
    receiver: oneshot::Receiver<String>,
}

impl LoginAttempt {
    /// The attempt id, also recorded in the pending state.
    #[must_use]
    pub const fn id(&self) -> AttemptId {
        self.id
    }

    /// Waits for the popup to deliver its response.
    ///
    /// # Errors
    /// [`LoginError::Channel`] if the popup went away without answering.
    pub async fn response(self) -> Result<PopupResponse, LoginError> {
        let raw = self
            .receiver
            .await
            .map_err(|_| LoginError::Channel("popup closed without a response".to_string()))?;
        Ok(PopupResponse {
            attempt: self.id,
            raw,
        })
    }
}

/// Creates the two halves of the one-shot channel for a new attempt.
#[must_use]
pub fn attempt_channel() -> (LoginAttempt, ResponseSender) {
    let id = Uuid::new_v4();
    let (sender, receiver) = oneshot::channel();
    (
        LoginAttempt { id, receiver },
        ResponseSender {
            attempt: id,
            sender,
        },
    )
}

/// What the login flow needs from the host to show a popup.
pub trait PopupChannel: Send + Sync {
    /// Opens a popup at `window_url` for `request`. The response, if any, must be sent through
    /// `responder`. Must not block waiting for the user.
    ///
    /// # Errors
    /// [`LoginError::Channel`] if the popup cannot be opened.
    fn open(
        &self,
        window_url: &Url,
        request: &ProofRequest,
        responder: ResponseSender,
    ) -> Result<(), LoginError>;
}

/// A channel for hosts that cannot open windows. The attempt stays pending until the host completes
/// it with [`complete_login`](crate::PassportLogin::complete_login); awaiting the attempt itself
/// fails with [`LoginError::Channel`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedPopupChannel;

impl PopupChannel for DetachedPopupChannel {
    fn open(
        &self,
        window_url: &Url,
        _request: &ProofRequest,
        responder: ResponseSender,
    ) -> Result<(), LoginError> {
        debug!(attempt = %responder.attempt(), %window_url, "popup not opened, host is detached");
        Ok(())
    }
}

/// What the popup page should do when loaded at a given URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupAction {
    /// First load: navigate to the passport's proof screen.
    RedirectToPassport(Url),
    /// The passport sent the user back with a response: relay it to the opener and close.
    DeliverResponse(String),
    /// Nothing to do.
    Idle,
}

/// Routing logic of the application's popup page.
#[derive(Debug, Clone, Copy)]
pub struct PopupPage;

impl PopupPage {
    /// Decides what the popup page does when loaded at `current_url`.
    ///
    /// The page is loaded twice per attempt: first with `proofUrl`, pointing at the passport, and
    /// then by the passport with `finished` and the serialized proof in `proof` (older passports
    /// use `encodedPCD`).
    #[must_use]
    pub fn route(current_url: &Url) -> PopupAction {
        let param = |name: &str| {
            current_url
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if let Some(proof_url) = param("proofUrl") {
            return match Url::parse(&proof_url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {
                    PopupAction::RedirectToPassport(url)
                }
                Ok(url) => {
                    warn!(scheme = url.scheme(), "refusing to redirect popup");
                    PopupAction::Idle
                }
                Err(err) => {
                    warn!("popup proofUrl is not a URL: {err}");
                    PopupAction::Idle
                }
            };
        }

        if param("finished").is_some() {
            if let Some(response) = param("proof").or_else(|| param("encodedPCD")) {
                return PopupAction::DeliverResponse(response);
            }
        }

        PopupAction::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_first_load_to_passport() {
        let url = Url::parse(
            "https://app.example/popup?proofUrl=https%3A%2F%2Fzupass.org%2F%23%2Fprove%3Frequest%3D%257B%257D",
        )
        .unwrap();
        let PopupAction::RedirectToPassport(target) = PopupPage::route(&url) else {
            panic!("expected a redirect");
        };
        assert_eq!(target.host_str(), Some("zupass.org"));
        assert_eq!(target.fragment(), Some("/prove?request=%7B%7D"));
    }

    #[test]
    fn test_routes_finished_response() {
        let url = Url::parse(
            "https://app.example/popup?finished=true&proof=%7B%22type%22%3A%22x%22%2C%22pcd%22%3A%22y%22%7D",
        )
        .unwrap();
        assert_eq!(
            PopupPage::route(&url),
            PopupAction::DeliverResponse(r#"{"type":"x","pcd":"y"}"#.to_string())
        );

        let legacy =
            Url::parse("https://app.example/popup?finished=true&encodedPCD=abc").unwrap();
        assert_eq!(
            PopupPage::route(&legacy),
            PopupAction::DeliverResponse("abc".to_string())
        );
    }

    #[test]
    fn test_idle_routes() {
        for url in [
            "https://app.example/popup",
            "https://app.example/popup?finished=true",
            "https://app.example/popup?proof=abc",
            "https://app.example/popup?proofUrl=javascript%3Aalert(1)",
            "https://app.example/popup?proofUrl=not%20a%20url",
        ] {
            assert_eq!(PopupPage::route(&Url::parse(url).unwrap()), PopupAction::Idle);
        }
    }

    #[tokio::test]
    async fn test_attempt_receives_single_response() {
        let (attempt, sender) = attempt_channel();
        assert_eq!(attempt.id(), sender.attempt());

        assert!(sender.deliver("raw"));
        let response = attempt.response().await.unwrap();
        assert_eq!(response.raw, "raw");
    }

    #[tokio::test]
    async fn test_dropped_sender_is_a_channel_error() {
        let (attempt, sender) = attempt_channel();
        drop(sender);
        assert!(matches!(
            attempt.response().await,
            Err(LoginError::Channel(_))
        ));
    }
}
