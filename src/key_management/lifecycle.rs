/*!
 * Symmetric key lifecycle
 *
 * Generation and import of secret keys on a token. The vendor profile and
 * the key-length policy are fixed when the manager is created.
 */

use crate::aes::AesGcmCipher;
use crate::error::{error_codes, HsmError, HsmResult};
use crate::hsm::Device;
use crate::mac::HmacSigner;
use crate::secure_memory::SecureBytes;

use super::attributes::Attribute;
use super::config::LifecycleConfig;
use super::key_type::KeyType;
use super::template::TemplateBuilder;
use super::vendor::VendorProfile;

/// Generates and imports secret keys on one device session
///
/// # Examples
///
/// ```
/// use symhsm::hsm::SoftToken;
/// use symhsm::key_management::{KeyLifecycleManager, KeyType, LifecycleConfig};
///
/// let manager = KeyLifecycleManager::new(SoftToken::default(), LifecycleConfig::default()).unwrap();
/// let key = manager.generate_key("payments", 32, &KeyType::Aes).unwrap();
///
/// let sealed = manager.cipher().encrypt(key, b"card data").unwrap();
/// let opened = manager.cipher().decrypt(key, &sealed.combined, &sealed.iv).unwrap();
/// assert_eq!(opened, b"card data");
/// ```
#[derive(Debug)]
pub struct KeyLifecycleManager<D: Device> {
    device: D,
    profile: VendorProfile,
    templates: TemplateBuilder,
    config: LifecycleConfig,
}

impl<D: Device> KeyLifecycleManager<D> {
    /// Create a manager, reading the token's manufacturer id once
    pub fn new(device: D, config: LifecycleConfig) -> HsmResult<Self> {
        let manufacturer_id = device.manufacturer_id()?;
        let profile = VendorProfile::detect(&manufacturer_id);
        log::info!(
            "Selected {} vendor profile for manufacturer '{}'",
            profile,
            manufacturer_id
        );

        Ok(Self {
            device,
            profile,
            templates: TemplateBuilder::new(profile, config.key_length_override),
            config,
        })
    }

    pub fn profile(&self) -> VendorProfile {
        self.profile
    }

    pub fn config(&self) -> LifecycleConfig {
        self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// AES-GCM operations using this session's vendor framing
    pub fn cipher(&self) -> AesGcmCipher<'_, D> {
        AesGcmCipher::new(&self.device, self.profile.gcm_framing())
    }

    /// HMAC-SHA384 signing on this session
    pub fn signer(&self) -> HmacSigner<'_, D> {
        HmacSigner::new(&self.device)
    }

    /// Generate a persistent secret key on the token
    ///
    /// # Arguments
    ///
    /// * `label` - Persistent name of the key object
    /// * `requested_length` - Key length in bytes; replaced by a configured override
    /// * `key_type` - Logical key type
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the token rejects the request. The error is
    /// returned to the caller; the process is never terminated.
    pub fn generate_key(
        &self,
        label: &str,
        requested_length: usize,
        key_type: &KeyType,
    ) -> HsmResult<D::Handle> {
        let mechanism = self.profile.generation_mechanism(key_type);
        let template = self.templates.build(label, requested_length, key_type);
        log::debug!(
            "Generating {} key '{}' with {} and {}",
            key_type,
            label,
            mechanism,
            template
        );

        self.device
            .generate_key(&mechanism, &template)
            .map_err(|e| {
                log::warn!("Key generation for '{}' failed: {}", label, e);
                e.within("generate_key", error_codes::KEY_GENERATION_FAILED)
            })
    }

    /// Import raw key material supplied as a hex string
    ///
    /// The template is sized to the decoded byte count, not the number of
    /// hex characters. The decoded bytes are wiped once the object exists.
    ///
    /// # Errors
    ///
    /// * `ValidationError` if any input is empty or the hex length is odd
    /// * `EncodingError` if the hex contains a non-hex digit
    /// * `DeviceError` if the token refuses to create the object
    pub fn import_symmetric_key(
        &self,
        label: &str,
        key_type: &str,
        hex_value: &str,
    ) -> HsmResult<D::Handle> {
        const OPERATION: &str = "import_symmetric_key";

        if label.is_empty() || key_type.is_empty() || hex_value.is_empty() {
            return Err(HsmError::validation_error(
                OPERATION,
                "input validation failed",
                error_codes::MISSING_INPUT,
            ));
        }

        if hex_value.len() % 2 != 0 {
            return Err(HsmError::validation_error_with(
                OPERATION,
                &format!("key length invalid ({})", hex_value.len()),
                error_codes::INVALID_KEY_LENGTH,
                "length",
                hex_value.len(),
            ));
        }

        let key_bytes = SecureBytes::from(
            hex::decode(hex_value).map_err(|e| HsmError::encoding_error(OPERATION, e))?,
        );

        let key_type = KeyType::from_name(key_type);
        let mut template = self.templates.build(label, key_bytes.len(), &key_type);
        template.insert(Attribute::Value(key_bytes));
        log::debug!("Importing {} key '{}' with {}", key_type, label, template);

        self.device.create_object(&template).map_err(|e| {
            log::warn!("Import of '{}' failed: {}", label, e);
            e.within(OPERATION, error_codes::OBJECT_CREATION_FAILED)
        })
    }
}
