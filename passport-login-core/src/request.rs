//! Proof requests sent to the passport.
//!
//! A request names the PCD type the application wants (`proofType`), the arguments the passport
//! should prove over (`claims`) and where the passport should send the result (`returnTarget`). On
//! the wire this is the passport's `Get` request: `{type: "Get", returnUrl, pcdType, args, options}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::{form_urlencoded, Url};

use crate::{
    config::PassportConfig,
    field::FieldElement,
    group::SemaphoreGroup,
    pcd::{SEMAPHORE_GROUP_PCD_TYPE, SEMAPHORE_IDENTITY_PCD_TYPE, SEMAPHORE_SIGNATURE_PCD_TYPE},
};

/// Title of the passport's proof screen for identity-revealing logins.
pub const SIGN_IN_TITLE: &str = "Zuzalu Auth";

/// Title of the passport's proof screen for anonymous logins.
pub const ANONYMOUS_SIGN_IN_TITLE: &str = "Zuzalu Anon Auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum RequestType {
    Get,
}

/// How the passport should interpret an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgumentType {
    /// A PCD from the user's passport.
    #[serde(rename = "PCD")]
    Pcd,
    /// A string.
    String,
    /// A decimal integer string.
    BigInt,
    /// A JSON object, inline or fetched from `remoteUrl`.
    Object,
}

/// One argument of a proof request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofArgument {
    /// How the passport should interpret the argument.
    pub argument_type: ArgumentType,
    /// For PCD arguments, the PCD type to pick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcd_type: Option<String>,
    /// Value fixed by the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// For object arguments, where the passport fetches the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// Whether the user supplies the value in the passport.
    pub user_provided: bool,
}

impl ProofArgument {
    fn user_identity() -> Self {
        Self {
            argument_type: ArgumentType::Pcd,
            pcd_type: Some(SEMAPHORE_IDENTITY_PCD_TYPE.to_string()),
            value: None,
            remote_url: None,
            user_provided: true,
        }
    }

    fn user_string() -> Self {
        Self {
            argument_type: ArgumentType::String,
            pcd_type: None,
            value: None,
            remote_url: None,
            user_provided: true,
        }
    }

    fn big_int(value: FieldElement) -> Self {
        Self {
            argument_type: ArgumentType::BigInt,
            pcd_type: None,
            value: Some(Value::String(value.to_decimal_string())),
            remote_url: None,
            user_provided: false,
        }
    }

    fn object(value: Option<Value>, remote_url: Option<String>) -> Self {
        Self {
            argument_type: ArgumentType::Object,
            pcd_type: None,
            value,
            remote_url,
            user_provided: false,
        }
    }
}

/// The group in its served JSON layout, members as decimal strings.
fn inline_group(group: &SemaphoreGroup) -> Value {
    let members = group
        .members
        .iter()
        .map(|member| Value::String(member.to_string()))
        .collect();

    let mut object = Map::new();
    object.insert("id".to_string(), Value::String(group.id.clone()));
    object.insert("name".to_string(), Value::String(group.name.clone()));
    object.insert("depth".to_string(), Value::from(group.depth));
    object.insert("members".to_string(), Value::Array(members));
    Value::Object(object)
}

/// Presentation hints for the passport's proof screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveOptions {
    /// Screen title.
    pub title: String,
    /// Screen description, the requesting application's name.
    pub description: String,
    /// Marks the request as a sign-in.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sign_in: bool,
}

/// A proof request descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRequest {
    #[serde(rename = "type")]
    request_type: RequestType,
    /// Where the passport sends its response: the application's popup page.
    #[serde(rename = "returnUrl")]
    pub return_target: String,
    /// PCD type requested.
    #[serde(rename = "pcdType")]
    pub proof_type: String,
    /// Arguments of the proof, by name.
    #[serde(rename = "args")]
    pub claims: BTreeMap<String, ProofArgument>,
    /// Proof screen presentation.
    pub options: ProveOptions,
}

impl ProofRequest {
    /// Requests a semaphore signature over the user's uuid.
    #[must_use]
    pub fn identity_revealing(config: &PassportConfig) -> Self {
        let claims = BTreeMap::from([
            ("identity".to_string(), ProofArgument::user_identity()),
            ("signedMessage".to_string(), ProofArgument::user_string()),
        ]);

        Self {
            request_type: RequestType::Get,
            return_target: config.popup_url().to_string(),
            proof_type: SEMAPHORE_SIGNATURE_PCD_TYPE.to_string(),
            claims,
            options: ProveOptions {
                title: SIGN_IN_TITLE.to_string(),
                description: config.app_name().to_string(),
                sign_in: true,
            },
        }
    }

    /// Requests a proof of membership in a group, bound to `signal` and `external_nullifier`.
    ///
    /// A group with a URL is passed by reference, so the passport fetches the same snapshot; an
    /// inline group is passed whole.
    #[must_use]
    pub fn group_membership(
        config: &PassportConfig,
        group: &SemaphoreGroup,
        group_url: Option<&Url>,
        signal: FieldElement,
        external_nullifier: FieldElement,
    ) -> Self {
        let group_argument = match group_url {
            Some(url) => ProofArgument::object(None, Some(url.to_string())),
            None => ProofArgument::object(Some(inline_group(group)), None),
        };

        let claims = BTreeMap::from([
            ("externalNullifier".to_string(), ProofArgument::big_int(external_nullifier)),
            ("group".to_string(), group_argument),
            ("identity".to_string(), ProofArgument::user_identity()),
            ("signal".to_string(), ProofArgument::big_int(signal)),
        ]);

        Self {
            request_type: RequestType::Get,
            return_target: config.popup_url().to_string(),
            proof_type: SEMAPHORE_GROUP_PCD_TYPE.to_string(),
            claims,
            options: ProveOptions {
                title: ANONYMOUS_SIGN_IN_TITLE.to_string(),
                description: config.app_name().to_string(),
                sign_in: false,
            },
        }
    }

    /// Looks an argument up by name.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&ProofArgument> {
        self.claims.get(name)
    }

    /// Serializes the request as the passport expects it.
    ///
    /// # Errors
    /// Only fails if an argument value cannot be represented as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The passport page that renders this request: `<passport>/#/prove?request=<json>`.
    ///
    /// # Errors
    /// Only fails if the request cannot be serialized, see [`Self::to_json`].
    pub fn proof_url(&self, passport_url: &Url) -> Result<Url, serde_json::Error> {
        let encoded: String = form_urlencoded::byte_serialize(self.to_json()?.as_bytes()).collect();
        let mut url = passport_url.clone();
        url.set_fragment(Some(&format!("/prove?request={encoded}")));
        Ok(url)
    }

    /// The URL the popup window opens: the application's popup page, told where to bounce to.
    ///
    /// # Errors
    /// Only fails if the request cannot be serialized, see [`Self::to_json`].
    pub fn popup_window_url(&self, config: &PassportConfig) -> Result<Url, serde_json::Error> {
        let proof_url = self.proof_url(config.passport_url())?;
        let mut url = config.popup_url().clone();
        url.query_pairs_mut()
            .append_pair("proofUrl", proof_url.as_str());
        Ok(url)
    }
}
