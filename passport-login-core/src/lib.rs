#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Client-side login flow for applications that delegate authentication to a PCD passport.
//!
//! The application asks for either an identity-revealing login (a semaphore signature over the
//! user's uuid, checked against the passport server's participant record) or an anonymous login
//! (a semaphore group membership proof, checked against a locally recomputed group root). Proofs
//! are requested through a popup and verified by a host-provided [`ProofVerifier`]; the resulting
//! [`AuthState`] is persisted so sessions survive reloads.

use serde::Deserialize;
use strum::{Display, EnumString};

/// Passport deployments with known endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// A passport client and server running locally.
    Development,
    /// The public passport deployment.
    Production,
}

impl Environment {
    /// Default passport client URL.
    #[must_use]
    pub const fn passport_url(self) -> &'static str {
        match self {
            Self::Development => "http://localhost:3000",
            Self::Production => "https://zupass.org",
        }
    }

    /// Default passport server URL.
    #[must_use]
    pub const fn server_url(self) -> &'static str {
        match self {
            Self::Development => "http://localhost:3002",
            Self::Production => "https://api.pcd-passport.com",
        }
    }
}

pub mod codec;
pub mod logger;
pub mod merkle_tree;
pub mod storage;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod field;
pub use field::*;

mod group;
pub use group::*;

mod machine;
pub use machine::*;

mod participant;
pub use participant::*;

mod pcd;
pub use pcd::*;

mod popup;
pub use popup::*;

mod request;
pub use request::*;

mod server;
pub use server::*;

mod session;
pub use session::*;

mod state;
pub use state::*;

// private modules
mod http_request;
