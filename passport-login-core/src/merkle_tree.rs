//! Local recomputation of semaphore group roots.
//!
//! A group proof only commits to a Merkle root. To know which group a proof was generated against,
//! the root of the group the login asked for is recomputed here from its member list and compared
//! with the claimed one.

use semaphore_rs_poseidon::poseidon;
use sha2::{Digest, Sha256};

use crate::field::FieldElement;

/// Computes the root of a fixed-depth binary Merkle tree.
pub trait TreeHasher: Send + Sync {
    /// Short name, for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Returns the root of a tree of `depth` levels holding `leaves` from index 0 onwards and `zero`
    /// in every remaining leaf.
    ///
    /// Callers guarantee `leaves.len() <= 2^depth`.
    fn root(&self, depth: usize, zero: FieldElement, leaves: &[FieldElement]) -> FieldElement;
}

/// Folds `leaves` level by level into a root, hashing only the populated part of each level. Empty
/// subtrees are represented by the running zero hash of their level.
pub fn fold_root<F>(
    depth: usize,
    zero: FieldElement,
    leaves: &[FieldElement],
    hash_node: F,
) -> FieldElement
where
    F: Fn(&FieldElement, &FieldElement) -> FieldElement,
{
    debug_assert!(depth >= usize::BITS as usize || leaves.len() <= 1 << depth);

    let mut level = leaves.to_vec();
    let mut empty = zero;

    for _ in 0..depth {
        if level.len() % 2 == 1 {
            level.push(empty);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| hash_node(&pair[0], &pair[1]))
            .collect();
        empty = hash_node(&empty, &empty);
    }

    level.first().copied().unwrap_or(empty)
}

/// Poseidon tree hasher matching the semaphore circuits, so roots agree with the ones the passport
/// proves against.
///
/// Leaves and the zero value must be scalar field elements; [`SemaphoreGroup::validate`] checks
/// members before a root is computed.
///
/// [`SemaphoreGroup::validate`]: crate::SemaphoreGroup::validate
#[derive(Debug, Default, Clone, Copy)]
pub struct PoseidonHasher;

impl TreeHasher for PoseidonHasher {
    fn name(&self) -> &'static str {
        "poseidon"
    }

    fn root(&self, depth: usize, zero: FieldElement, leaves: &[FieldElement]) -> FieldElement {
        fold_root(depth, zero, leaves, |left, right| {
            FieldElement(poseidon::hash2(left.0, right.0))
        })
    }
}

/// SHA-256 over the concatenated big-endian children.
///
/// Not compatible with semaphore circuits: a passport proof never commits to one of these roots.
/// Only useful for groups checked outside of a circuit.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl Sha256Hasher {
    fn hash_node(left: &FieldElement, right: &FieldElement) -> FieldElement {
        let mut hasher = Sha256::new();
        hasher.update(left.to_be_bytes());
        hasher.update(right.to_be_bytes());
        FieldElement::from_be_bytes(hasher.finalize().into())
    }
}

impl TreeHasher for Sha256Hasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn root(&self, depth: usize, zero: FieldElement, leaves: &[FieldElement]) -> FieldElement {
        fold_root(depth, zero, leaves, Self::hash_node)
    }
}

/// The hasher logins use unless told otherwise.
#[must_use]
pub fn default_hasher() -> Box<dyn TreeHasher> {
    Box::new(PoseidonHasher)
}
