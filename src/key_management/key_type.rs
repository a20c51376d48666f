//! Logical symmetric key types requested by callers.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Logical key type of a symmetric key.
///
/// Names that are not recognised are kept as [`KeyType::Other`] and are
/// treated as generic secrets everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// AES key usable for encrypt/decrypt
    Aes,

    /// Triple-DES key usable for encrypt/decrypt and wrap/unwrap
    Des3,

    /// Generic secret
    GenericSecret,

    /// HMAC-SHA256 key
    Sha256Hmac,

    /// HMAC-SHA384 key
    Sha384Hmac,

    /// Any other name supplied by the caller
    Other(String),
}

impl KeyType {
    /// Every recognised key type
    pub const SUPPORTED: [KeyType; 5] = [
        KeyType::Aes,
        KeyType::Des3,
        KeyType::GenericSecret,
        KeyType::Sha256Hmac,
        KeyType::Sha384Hmac,
    ];

    /// Parse a key type name. Matching is exact ("AES", "DES3",
    /// "GENERIC_SECRET", "SHA256_HMAC", "SHA384_HMAC").
    pub fn from_name(name: &str) -> Self {
        match name {
            "AES" => KeyType::Aes,
            "DES3" => KeyType::Des3,
            "GENERIC_SECRET" => KeyType::GenericSecret,
            "SHA256_HMAC" => KeyType::Sha256Hmac,
            "SHA384_HMAC" => KeyType::Sha384Hmac,
            other => KeyType::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            KeyType::Aes => "AES",
            KeyType::Des3 => "DES3",
            KeyType::GenericSecret => "GENERIC_SECRET",
            KeyType::Sha256Hmac => "SHA256_HMAC",
            KeyType::Sha384Hmac => "SHA384_HMAC",
            KeyType::Other(name) => name,
        }
    }

    /// Whether this is one of the HMAC key types
    pub fn is_hmac(&self) -> bool {
        matches!(self, KeyType::Sha256Hmac | KeyType::Sha384Hmac)
    }
}

impl FromStr for KeyType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(KeyType::from_name(s))
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
