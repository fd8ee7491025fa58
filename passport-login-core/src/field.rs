use std::{fmt, ops::Deref, str::FromStr};

use ruint::{aliases::U256, uint};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FieldError;

/// A numeric value of the Semaphore protocol: identity commitments, signals, external nullifiers,
/// nullifier hashes and Merkle roots.
///
/// The passport and its server exchange these values as decimal strings (`"42"`), which is also the
/// form used for serialization. Parsing additionally accepts `0x`-prefixed hex strings and plain JSON
/// integers, so values copied from block explorers or typed by hand are not rejected.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Default)]
pub struct FieldElement(pub U256);

impl FieldElement {
    /// The zero element. Used as the default signal and external nullifier.
    pub const ZERO: Self = Self(U256::ZERO);

    /// Order of the BN254 scalar field semaphore circuits compute in.
    pub const SCALAR_FIELD_ORDER: Self = Self(uint!(
        21888242871839275222246405745257275088548364400416034343698204186575808495617_U256
    ));

    /// Whether the value is a canonical element of the scalar field.
    #[must_use]
    pub fn is_in_scalar_field(&self) -> bool {
        self.0 < Self::SCALAR_FIELD_ORDER.0
    }

    /// Outputs the decimal representation, as used on the passport wire.
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        self.0.to_string()
    }

    /// Outputs a hex string representation padded to 32 bytes (plus two bytes for the `0x` prefix).
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        format!("{:#066x}", self.0)
    }

    /// Attempts to parse a decimal or `0x`-prefixed hex string.
    ///
    /// # Errors
    /// Will return [`FieldError::InvalidNumber`] if the input is empty or not a number up to 256 bits.
    pub fn try_from_str(value: &str) -> Result<Self, FieldError> {
        let trimmed = value.trim();
        let (digits, radix) = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => (hex, 16),
            None => (trimmed, 10),
        };

        if digits.is_empty() {
            return Err(FieldError::InvalidNumber(value.to_string()));
        }

        U256::from_str_radix(digits, radix)
            .map(Self)
            .map_err(|_| FieldError::InvalidNumber(value.to_string()))
    }

    /// Big-endian byte representation.
    #[must_use]
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes::<32>()
    }

    /// Builds an element from big-endian bytes.
    #[must_use]
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(U256::from_be_bytes(bytes))
    }
}

impl From<U256> for FieldElement {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<FieldElement> for U256 {
    fn from(value: FieldElement) -> Self {
        value.0
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl Deref for FieldElement {
    type Target = U256;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for FieldElement {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_str(s)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for FieldElement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldElementVisitor;

        impl de::Visitor<'_> for FieldElementVisitor {
            type Value = FieldElement;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal or 0x-prefixed hex string, or an unsigned integer")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                FieldElement::try_from_str(value).map_err(E::custom)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(FieldElement::from(value))
            }
        }

        deserializer.deserialize_any(FieldElementVisitor)
    }
}
