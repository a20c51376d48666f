/*!
 * Error Handling for the symmetric HSM client
 *
 * Every failure is classified as caller input (validation), payload encoding,
 * configuration, or device rejection. Each error carries an operation name,
 * a numeric code and a context map for diagnostics.
 */

use std::collections::HashMap;
use thiserror::Error;

/// Underlying diagnostic carried by a device error
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for all key lifecycle, cipher and MAC operations
#[derive(Debug, Error)]
pub enum HsmError {
    #[error("Validation failed: {operation} - {cause}")]
    ValidationError {
        operation: String,
        cause: String,
        error_code: u32,
        context: HashMap<String, String>,
    },

    #[error("Encoding error: {operation} - {cause}")]
    EncodingError {
        operation: String,
        cause: String,
        error_code: u32,
        #[source]
        source: Option<hex::FromHexError>,
    },

    #[error("Device operation failed: {operation} - {cause}")]
    DeviceError {
        operation: String,
        cause: String,
        error_code: u32,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("Configuration error: {setting} - {cause}")]
    ConfigurationError {
        setting: String,
        cause: String,
        error_code: u32,
    },
}

/// Error code constants for different error categories
pub mod error_codes {
    // Validation errors: 1000-1999
    pub const MISSING_INPUT: u32 = 1001;
    pub const INVALID_KEY_LENGTH: u32 = 1002;
    pub const CIPHERTEXT_TOO_SHORT: u32 = 1003;
    pub const INVALID_PIN: u32 = 1004;

    // Encoding errors: 2000-2999
    pub const INVALID_HEX: u32 = 2001;

    // Device errors: 3000-3999
    pub const KEY_GENERATION_FAILED: u32 = 3001;
    pub const OBJECT_CREATION_FAILED: u32 = 3002;
    pub const ENCRYPTION_FAILED: u32 = 3003;
    pub const DECRYPTION_FAILED: u32 = 3004;
    pub const SIGNING_FAILED: u32 = 3005;
    pub const SESSION_FAILED: u32 = 3006;
    pub const MALFORMED_DEVICE_OUTPUT: u32 = 3007;

    // Configuration errors: 4000-4999
    pub const INVALID_KEY_LENGTH_OVERRIDE: u32 = 4001;
    pub const INVALID_SESSION_CONFIG: u32 = 4002;
}

impl HsmError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            HsmError::ValidationError { error_code, .. } => *error_code,
            HsmError::EncodingError { error_code, .. } => *error_code,
            HsmError::DeviceError { error_code, .. } => *error_code,
            HsmError::ConfigurationError { error_code, .. } => *error_code,
        }
    }

    /// Get the error category as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            HsmError::ValidationError { .. } => "ValidationError",
            HsmError::EncodingError { .. } => "EncodingError",
            HsmError::DeviceError { .. } => "DeviceError",
            HsmError::ConfigurationError { .. } => "ConfigurationError",
        }
    }

    /// Name of the operation that failed
    pub fn operation(&self) -> &str {
        match self {
            HsmError::ValidationError { operation, .. }
            | HsmError::EncodingError { operation, .. }
            | HsmError::DeviceError { operation, .. } => operation,
            HsmError::ConfigurationError { setting, .. } => setting,
        }
    }

    /// Get technical details for debugging
    pub fn technical_details(&self) -> HashMap<String, String> {
        let mut details = HashMap::new();

        details.insert("error_code".to_string(), self.error_code().to_string());
        details.insert("error_type".to_string(), self.error_type().to_string());
        details.insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339());

        match self {
            HsmError::ValidationError {
                operation,
                cause,
                context,
                ..
            } => {
                details.insert("operation".to_string(), operation.clone());
                details.insert("cause".to_string(), cause.clone());
                details.extend(context.clone());
            }
            HsmError::EncodingError {
                operation, cause, ..
            }
            | HsmError::DeviceError {
                operation, cause, ..
            } => {
                details.insert("operation".to_string(), operation.clone());
                details.insert("cause".to_string(), cause.clone());
            }
            HsmError::ConfigurationError { setting, cause, .. } => {
                details.insert("setting".to_string(), setting.clone());
                details.insert("cause".to_string(), cause.clone());
            }
        }

        details
    }

    /// Get suggested remediation steps
    pub fn suggested_remediation(&self) -> Option<String> {
        match self {
            HsmError::ValidationError { error_code, .. } => match *error_code {
                error_codes::INVALID_KEY_LENGTH => Some(
                    "Supply the key value as whole bytes: an even number of hex digits."
                        .to_string(),
                ),
                error_codes::CIPHERTEXT_TOO_SHORT => Some(
                    "Pass the combined ciphertext exactly as returned by encrypt for the same vendor."
                        .to_string(),
                ),
                _ => Some("Provide non-empty label, key type and key value.".to_string()),
            },
            HsmError::EncodingError { .. } => {
                Some("Key values must contain only hex digits 0-9, a-f, A-F.".to_string())
            }
            HsmError::ConfigurationError { .. } => Some(
                "Leave SECURITY_PROVIDER_CONFIG_KLEN empty or set it to a non-negative integer."
                    .to_string(),
            ),
            HsmError::DeviceError { .. } => None,
        }
    }
}

/// Convenience constructors for common error types
impl HsmError {
    pub fn validation_error(operation: &str, cause: &str, error_code: u32) -> Self {
        HsmError::ValidationError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
            context: HashMap::new(),
        }
    }

    /// Validation error carrying one extra context entry
    pub fn validation_error_with(
        operation: &str,
        cause: &str,
        error_code: u32,
        key: &str,
        value: impl ToString,
    ) -> Self {
        let mut context = HashMap::new();
        context.insert(key.to_string(), value.to_string());

        HsmError::ValidationError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
            context,
        }
    }

    pub fn encoding_error(operation: &str, source: hex::FromHexError) -> Self {
        HsmError::EncodingError {
            operation: operation.to_string(),
            cause: format!("unable to convert key value to bytes, {}", source),
            error_code: error_codes::INVALID_HEX,
            source: Some(source),
        }
    }

    pub fn device_error(operation: &str, cause: &str, error_code: u32) -> Self {
        HsmError::DeviceError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
            source: None,
        }
    }

    /// Device error wrapping the underlying device diagnostic
    pub fn device_failure<E>(operation: &str, error_code: u32, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HsmError::DeviceError {
            operation: operation.to_string(),
            cause: source.to_string(),
            error_code,
            source: Some(Box::new(source)),
        }
    }

    /// Re-tag a device error with the higher-level operation that issued it
    pub(crate) fn within(self, operation: &str, error_code: u32) -> Self {
        match self {
            HsmError::DeviceError { cause, source, .. } => HsmError::DeviceError {
                operation: operation.to_string(),
                cause,
                error_code,
                source,
            },
            other => other,
        }
    }

    pub fn configuration_error(setting: &str, cause: &str, error_code: u32) -> Self {
        HsmError::ConfigurationError {
            setting: setting.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }
}

impl From<cryptoki::error::Error> for HsmError {
    fn from(err: cryptoki::error::Error) -> Self {
        HsmError::device_failure("pkcs11", error_codes::SESSION_FAILED, err)
    }
}

/// Result type alias for HSM operations
pub type HsmResult<T> = Result<T, HsmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_generation() {
        let error = HsmError::validation_error(
            "import_symmetric_key",
            "input validation failed",
            error_codes::MISSING_INPUT,
        );
        assert_eq!(error.error_code(), error_codes::MISSING_INPUT);
        assert_eq!(error.error_type(), "ValidationError");
    }

    #[test]
    fn test_validation_context_is_reported() {
        let error = HsmError::validation_error_with(
            "import_symmetric_key",
            "key length invalid (3)",
            error_codes::INVALID_KEY_LENGTH,
            "length",
            3,
        );
        let details = error.technical_details();
        assert_eq!(details.get("length").map(String::as_str), Some("3"));
        assert!(details.contains_key("timestamp"));
        assert!(error.suggested_remediation().unwrap().contains("even"));
    }

    #[test]
    fn test_encoding_error_keeps_source() {
        let source = hex::decode("zz").unwrap_err();
        let error = HsmError::encoding_error("import_symmetric_key", source);
        assert_eq!(error.error_code(), error_codes::INVALID_HEX);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_within_retags_device_errors_only() {
        let error = HsmError::device_error("encrypt", "CKR_KEY_HANDLE_INVALID", 0)
            .within("aes_gcm_encrypt", error_codes::ENCRYPTION_FAILED);
        assert_eq!(error.operation(), "aes_gcm_encrypt");
        assert_eq!(error.error_code(), error_codes::ENCRYPTION_FAILED);
        assert!(error.to_string().contains("CKR_KEY_HANDLE_INVALID"));

        let error = HsmError::validation_error("decrypt", "too short", 7)
            .within("aes_gcm_decrypt", error_codes::DECRYPTION_FAILED);
        assert_eq!(error.operation(), "decrypt");
        assert_eq!(error.error_code(), 7);
    }
}
