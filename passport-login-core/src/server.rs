//! Remote lookups the login flow depends on: semaphore groups and participants.

use std::future::Future;

use tracing::debug;
use url::Url;

use crate::{
    config::PassportConfig,
    error::LoginError,
    group::SemaphoreGroup,
    http_request::{NetworkError, Request},
    participant::Participant,
};

/// Status the passport server answers with when a participant does not exist.
pub const PARTICIPANT_MISSING_STATUS: u16 = 410;

/// The passport server as seen by the login flow.
pub trait PassportServer {
    /// Fetches the group served at `url`.
    ///
    /// # Errors
    /// [`LoginError::GroupFetch`] when the group cannot be retrieved or read.
    fn fetch_group(&self, url: &Url) -> impl Future<Output = Result<SemaphoreGroup, LoginError>>;

    /// Looks a participant up by uuid. `Ok(None)` means the server has no such participant.
    ///
    /// # Errors
    /// [`LoginError::ParticipantLookup`] for any other failure.
    fn lookup_participant(
        &self,
        uuid: &str,
    ) -> impl Future<Output = Result<Option<Participant>, LoginError>>;
}

/// [`PassportServer`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPassportServer {
    config: PassportConfig,
    request: Request,
}

impl HttpPassportServer {
    /// Talks to the server configured in `config`.
    #[must_use]
    pub fn new(config: PassportConfig) -> Self {
        Self {
            config,
            request: Request::new(),
        }
    }

    /// Overrides how many times a transient failure is retried.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.request = self.request.with_max_retries(max_retries);
        self
    }
}

impl PassportServer for HttpPassportServer {
    async fn fetch_group(&self, url: &Url) -> Result<SemaphoreGroup, LoginError> {
        debug!(%url, "fetching semaphore group");
        let group_fetch_error = |err: NetworkError| LoginError::GroupFetch {
            url: err.url,
            status: err.status,
            error: err.error,
        };

        let response = self
            .request
            .handle(self.request.get(url.as_str()))
            .await
            .map_err(group_fetch_error)?;
        let status = response.status();

        let body = response.text().await.map_err(|err| LoginError::GroupFetch {
            url: url.to_string(),
            status: Some(status.as_u16()),
            error: format!("failed to read response body: {err}"),
        })?;

        if !status.is_success() {
            return Err(LoginError::GroupFetch {
                url: url.to_string(),
                status: Some(status.as_u16()),
                error: truncate(&body),
            });
        }

        let group: SemaphoreGroup =
            serde_json::from_str(&body).map_err(|err| LoginError::GroupFetch {
                url: url.to_string(),
                status: Some(status.as_u16()),
                error: format!("failed to parse group: {err}"),
            })?;
        group.validate()?;

        debug!(%url, members = group.members.len(), "fetched semaphore group");
        Ok(group)
    }

    async fn lookup_participant(&self, uuid: &str) -> Result<Option<Participant>, LoginError> {
        let url = self.config.participant_url(uuid);
        debug!(%url, "looking up participant");

        let lookup_error = |status: Option<u16>, error: String| LoginError::ParticipantLookup {
            uuid: uuid.to_string(),
            status,
            error,
        };

        let response = self
            .request
            .handle(self.request.get(url.as_str()))
            .await
            .map_err(|err| lookup_error(err.status, format!("{}: {}", err.url, err.error)))?;
        let status = response.status();

        if status.as_u16() == PARTICIPANT_MISSING_STATUS {
            return Ok(None);
        }

        let body = response.text().await.map_err(|err| {
            lookup_error(
                Some(status.as_u16()),
                format!("failed to read response body: {err}"),
            )
        })?;

        if !status.is_success() {
            return Err(lookup_error(Some(status.as_u16()), truncate(&body)));
        }

        serde_json::from_str(&body).map(Some).map_err(|err| {
            lookup_error(
                Some(status.as_u16()),
                format!("failed to parse participant: {err}"),
            )
        })
    }
}

/// Keeps only the start of an error body, so an unexpected page does not end up in logs whole.
fn truncate(body: &str) -> String {
    body.chars().take(100).collect()
}
