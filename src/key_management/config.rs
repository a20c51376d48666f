//! Lifecycle configuration.
//!
//! The key-length override used to be read from the process environment on
//! every template build. It is now read once into [`LifecycleConfig`] and
//! handed to the manager at construction. Precedence: override > requested.

use crate::error::{error_codes, HsmError, HsmResult};

/// Environment variable holding the key-length override
pub const KEY_LENGTH_OVERRIDE_VAR: &str = "SECURITY_PROVIDER_CONFIG_KLEN";

/// Configuration of a [`KeyLifecycleManager`](super::KeyLifecycleManager)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Key length (bytes) that replaces every requested length
    pub key_length_override: Option<usize>,
}

impl LifecycleConfig {
    /// Configuration with an explicit override
    pub fn with_key_length_override(length: usize) -> Self {
        Self {
            key_length_override: Some(length),
        }
    }

    /// Read the configuration from the process environment
    pub fn from_env() -> HsmResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// An unset or empty override means "not set". Anything else must parse
    /// as a non-negative integer.
    pub fn from_lookup<F>(lookup: F) -> HsmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key_length_override = match lookup(KEY_LENGTH_OVERRIDE_VAR) {
            Some(raw) if !raw.trim().is_empty() => {
                let length = raw.trim().parse::<usize>().map_err(|e| {
                    HsmError::configuration_error(
                        KEY_LENGTH_OVERRIDE_VAR,
                        &format!("'{}' is not a valid key length: {}", raw, e),
                        error_codes::INVALID_KEY_LENGTH_OVERRIDE,
                    )
                })?;
                log::info!("Key length override active: {} bytes", length);
                Some(length)
            }
            _ => None,
        };

        Ok(Self {
            key_length_override,
        })
    }

    /// Apply the precedence rule to a requested length
    pub fn effective_length(&self, requested_length: usize) -> usize {
        self.key_length_override.unwrap_or(requested_length)
    }
}
