use serde::Deserialize;
use url::Url;

use crate::{error::ConfigError, group::NamedGroup, Environment};

/// Endpoints of the passport deployment the application delegates logins to.
///
/// Every URL is validated once, here, so the login flow never has to deal with a malformed
/// endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassportConfig {
    passport_url: Url,
    server_url: Url,
    popup_url: Url,
    app_name: String,
}

/// JSON form accepted by [`PassportConfig::from_json`]. Every field is optional and falls back to the
/// defaults of `environment` (itself defaulting to production).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigDocument {
    environment: Option<Environment>,
    passport_url: Option<String>,
    server_url: Option<String>,
    popup_url: Option<String>,
    app_name: Option<String>,
}

impl PassportConfig {
    /// Popup URL for hosts that cannot open windows, e.g. server-side rendering.
    pub const NON_INTERACTIVE_POPUP_URL: &'static str = "http://url.invalid";

    /// Builds a configuration from explicit URLs.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if any URL does not parse or is not `http`/`https`.
    pub fn new(
        passport_url: &str,
        server_url: &str,
        popup_url: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            passport_url: validate_url(passport_url, "passport_url")?,
            server_url: validate_url(server_url, "server_url")?,
            popup_url: validate_url(popup_url, "popup_url")?,
            app_name: String::new(),
        })
    }

    /// Builds a configuration with the default passport endpoints of `environment`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `popup_url` does not parse or is not `http`/`https`.
    pub fn from_environment(
        environment: Environment,
        popup_url: &str,
    ) -> Result<Self, ConfigError> {
        Self::new(
            environment.passport_url(),
            environment.server_url(),
            popup_url,
        )
    }

    /// Parses a JSON configuration document, e.g.
    /// `{"environment": "development", "popupUrl": "http://localhost:8080/popup"}`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the document is not valid JSON, has unknown keys, or carries an
    /// invalid URL.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let document: ConfigDocument = serde_json::from_str(json)
            .map_err(|e| ConfigError::InvalidJson(e.to_string()))?;
        let environment = document.environment.unwrap_or(Environment::Production);

        let config = Self::new(
            document
                .passport_url
                .as_deref()
                .unwrap_or_else(|| environment.passport_url()),
            document
                .server_url
                .as_deref()
                .unwrap_or_else(|| environment.server_url()),
            document
                .popup_url
                .as_deref()
                .unwrap_or(Self::NON_INTERACTIVE_POPUP_URL),
        )?;

        Ok(config.with_app_name(document.app_name.unwrap_or_default()))
    }

    /// Sets the application name shown by the passport when asking the user for a proof.
    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// The passport client, which renders the proof screens.
    #[must_use]
    pub const fn passport_url(&self) -> &Url {
        &self.passport_url
    }

    /// The passport API server, which serves participants and semaphore groups.
    #[must_use]
    pub const fn server_url(&self) -> &Url {
        &self.server_url
    }

    /// The application's own popup page, which bounces to the passport and relays its response.
    #[must_use]
    pub const fn popup_url(&self) -> &Url {
        &self.popup_url
    }

    /// The application name shown on the passport's proof screen.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// `GET` endpoint returning the participant with the given uuid.
    #[must_use]
    pub fn participant_url(&self, uuid: &str) -> Url {
        server_endpoint(&self.server_url, &["account", "user", uuid])
    }

    /// URL of one of the server's named semaphore groups.
    #[must_use]
    pub fn named_group_url(&self, group: NamedGroup) -> Url {
        server_endpoint(&self.server_url, &["semaphore", group.id()])
    }
}

/// Appends `segments` to the server URL. Each segment is percent-encoded, so an identifier taken
/// from a proof can never change the path structure.
fn server_endpoint(server_url: &Url, segments: &[&str]) -> Url {
    let mut url = server_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn validate_url(value: &str, name: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        name: name.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::UnsupportedScheme {
            name: name.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}
