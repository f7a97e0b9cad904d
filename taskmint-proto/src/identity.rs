//! Account and network identifiers for the wallet boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors produced when parsing identity values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// The address is not `0x` followed by 40 hex digits.
    #[error("malformed account address: {0}")]
    Malformed(String),
    /// The chain id is not a `0x`-prefixed hex number.
    #[error("malformed chain id: {0}")]
    MalformedChain(String),
}

/// An external account address, normalized to lowercase.
///
/// Wallets report checksummed (mixed-case) addresses while the task
/// store may echo them back in any case. Normalizing on construction
/// makes ownership comparison a plain equality check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parses and normalizes an address.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Malformed`] unless the input is `0x`
    /// followed by exactly 40 hex digits.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressError::Malformed(raw.to_string()))?;
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::Malformed(raw.to_string()));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// Returns the normalized string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display, e.g. `0xab12…cd34`.
    #[must_use]
    pub fn short(&self) -> String {
        let len = self.0.len();
        format!("{}…{}", &self.0[..6], &self.0[len - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// Numeric network identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
    /// The Sepolia test network, the only network rewards are minted on.
    pub const SEPOLIA: Self = Self(11_155_111);

    /// Parses the hex form wallets use in `chainChanged` payloads.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::MalformedChain`] if the value is not a
    /// `0x`-prefixed hex number that fits in a `u64`.
    pub fn from_hex(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MalformedChain(raw.to_string()))?;
        u64::from_str_radix(hex, 16)
            .map(Self)
            .map_err(|_| AddressError::MalformedChain(raw.to_string()))
    }

    /// Well-known network name, if any.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("Ethereum Mainnet"),
            11_155_111 => Some("Sepolia"),
            _ => None,
        }
    }

    /// Name for display, falling back to the numeric id.
    #[must_use]
    pub fn label(self) -> String {
        self.name()
            .map_or_else(|| format!("chain {}", self.0), str::to_string)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
