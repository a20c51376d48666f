/*!
 * Symmetric HSM client
 *
 * This crate drives symmetric key operations on PKCS#11 hardware security
 * modules and hides the vendor quirks that make the same request fail on one
 * token and succeed on another.
 *
 * The operations covered are:
 *
 * - Secret key generation (AES, DES3, generic secret, HMAC keys)
 * - Import of raw key material supplied as hex
 * - AES-GCM encryption and decryption with vendor IV framing
 * - HMAC-SHA384 signing
 *
 * Every cryptographic primitive runs on the token. The crate only chooses
 * mechanisms and attribute templates and reshapes the token's output.
 */

/// AES-GCM executed by the token
pub mod aes;

/// Common error types
pub mod error;

/// Token access: the `Device` trait, PKCS#11 backend and software token
pub mod hsm;

/// Templates, mechanisms, vendor profiles and the key lifecycle manager
pub mod key_management;

/// HMAC-SHA384 signing executed by the token
pub mod mac;

/// Secure memory handling utilities
pub mod secure_memory;

// Re-export main types for convenience
pub use aes::{AesGcmCipher, EncryptionResult};
pub use error::{HsmError, HsmResult};
pub use hsm::Device;
pub use key_management::{KeyLifecycleManager, KeyType, LifecycleConfig, VendorProfile};
pub use mac::HmacSigner;

/// Initialize the library.
///
/// Nothing needs to be set up today; the PKCS#11 library itself is
/// initialized by [`hsm::connect_hsm`].
///
/// # Example
///
/// ```
/// use symhsm::prelude::*;
///
/// fn main() -> Result<(), HsmError> {
///     init()?;
///
///     let manager = KeyLifecycleManager::new(SoftToken::default(), LifecycleConfig::from_env()?)?;
///     let key = manager.generate_key("session-mac", 48, &KeyType::Sha384Hmac)?;
///     let mac = manager.signer().sign_hmac_sha384(key, b"payload")?;
///     assert_eq!(mac.len(), 48);
///     Ok(())
/// }
/// ```
pub fn init() -> Result<(), HsmError> {
    Ok(())
}

/// The most commonly used types in one import
pub mod prelude {
    pub use crate::aes::AesGcmCipher;
    pub use crate::aes::EncryptionResult;
    pub use crate::error::error_codes;
    pub use crate::error::HsmError;
    pub use crate::error::HsmResult;
    pub use crate::hsm::connect_hsm;
    pub use crate::hsm::Device;
    pub use crate::hsm::HsmConfig;
    pub use crate::hsm::Pkcs11Device;
    pub use crate::hsm::SoftToken;
    pub use crate::init;
    pub use crate::key_management::build_template;
    pub use crate::key_management::select_generation_mechanism;
    pub use crate::key_management::AttributeSet;
    pub use crate::key_management::KeyLifecycleManager;
    pub use crate::key_management::KeyType;
    pub use crate::key_management::LifecycleConfig;
    pub use crate::key_management::Mechanism;
    pub use crate::key_management::VendorProfile;
    pub use crate::mac::HmacSigner;
    pub use crate::secure_memory::SecureBytes;
}
