use alloy_primitives::keccak256;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

use crate::{error::LoginError, field::FieldElement, merkle_tree::TreeHasher};

/// Tree depth of the passport's semaphore groups.
pub const DEFAULT_TREE_DEPTH: usize = 16;

/// Largest tree depth a group may declare.
pub const MAX_TREE_DEPTH: usize = 32;

const DEFAULT_GROUP_ID: &str = "1";

/// A semaphore group snapshot, in the form the passport server serves it.
///
/// Member order matters: member `i` occupies leaf `i` of the group tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaphoreGroup {
    /// Group identifier. Also seeds the value of empty leaves.
    #[serde(default = "default_group_id")]
    pub id: String,
    /// Human readable group name.
    #[serde(default)]
    pub name: String,
    /// Number of levels of the group tree.
    #[serde(default = "default_depth")]
    pub depth: usize,
    /// Identity commitments of the members.
    pub members: Vec<FieldElement>,
}

fn default_group_id() -> String {
    DEFAULT_GROUP_ID.to_string()
}

const fn default_depth() -> usize {
    DEFAULT_TREE_DEPTH
}

impl SemaphoreGroup {
    /// A group with the passport's default id and depth.
    #[must_use]
    pub fn new(members: Vec<FieldElement>) -> Self {
        Self {
            id: default_group_id(),
            name: String::new(),
            depth: DEFAULT_TREE_DEPTH,
            members,
        }
    }

    /// Checks that the group fits its tree.
    ///
    /// # Errors
    /// Returns [`LoginError::InvalidGroup`] if the depth is above [`MAX_TREE_DEPTH`], the tree has
    /// fewer leaves than the group has members, or a member is not a scalar field element.
    pub fn validate(&self) -> Result<(), LoginError> {
        if self.depth > MAX_TREE_DEPTH {
            return Err(LoginError::InvalidGroup(format!(
                "group {} has depth {} (max {MAX_TREE_DEPTH})",
                self.id, self.depth
            )));
        }
        let capacity = 1u64 << self.depth;
        if self.members.len() as u64 > capacity {
            return Err(LoginError::InvalidGroup(format!(
                "group {} has {} members, a depth {} tree holds {capacity}",
                self.id,
                self.members.len(),
                self.depth
            )));
        }
        if let Some(index) = self.members.iter().position(|m| !m.is_in_scalar_field()) {
            return Err(LoginError::InvalidGroup(format!(
                "group {} member {index} is outside the scalar field",
                self.id
            )));
        }
        Ok(())
    }

    /// Value of the group's empty leaves: `keccak256(be32(id)) >> 8`, as semaphore groups derive it.
    /// Non-numeric ids hash their UTF-8 bytes instead.
    #[must_use]
    pub fn zero_value(&self) -> FieldElement {
        let digest = match FieldElement::try_from_str(&self.id) {
            Ok(id) => keccak256(id.to_be_bytes()),
            Err(_) => keccak256(self.id.as_bytes()),
        };
        FieldElement(FieldElement::from_be_bytes(digest.0).0 >> 8usize)
    }

    /// Recomputes the group's Merkle root.
    ///
    /// # Errors
    /// Returns [`LoginError::InvalidGroup`] if the group does not fit its tree.
    pub fn merkle_root(&self, hasher: &dyn TreeHasher) -> Result<FieldElement, LoginError> {
        self.validate()?;
        Ok(hasher.root(self.depth, self.zero_value(), &self.members))
    }
}

/// Semaphore groups every passport server publishes under `/semaphore/<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NamedGroup {
    /// Everyone holding a passport.
    Participants,
    /// Long-term residents.
    Residents,
    /// Short-term visitors.
    Visitors,
    /// Event organizers.
    Organizers,
}

impl NamedGroup {
    /// Path identifier of the group on the passport server.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Participants => "1",
            Self::Residents => "2",
            Self::Visitors => "3",
            Self::Organizers => "4",
        }
    }
}

/// Where an anonymous login takes its group from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSource {
    /// A member-list snapshot the caller already holds. The passport receives it inline.
    Inline(SemaphoreGroup),
    /// A group served at this URL. Fetched before the popup opens; the passport fetches it too.
    Url(Url),
    /// One of the configured server's named groups.
    Named(NamedGroup),
}
