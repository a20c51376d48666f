/*!
 * Attribute templates for secret key generation and import
 *
 * Every template starts with the attributes common to all vendors (label,
 * persistence, signing) followed by the per-type group, whose last entry is
 * the key-type marker.
 */

use super::attributes::{Attribute, AttributeSet, KeyTypeMarker};
use super::key_type::KeyType;
use super::vendor::VendorProfile;

/// Builds templates for one session's vendor and length policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateBuilder {
    profile: VendorProfile,
    length_override: Option<usize>,
}

impl TemplateBuilder {
    pub fn new(profile: VendorProfile, length_override: Option<usize>) -> Self {
        Self {
            profile,
            length_override,
        }
    }

    pub fn profile(&self) -> VendorProfile {
        self.profile
    }

    /// Length actually written to the template; an override always wins
    pub fn effective_length(&self, requested_length: usize) -> usize {
        self.length_override.unwrap_or(requested_length)
    }

    pub fn build(&self, label: &str, requested_length: usize, key_type: &KeyType) -> AttributeSet {
        build_template(
            label,
            requested_length,
            key_type,
            self.profile,
            self.length_override,
        )
    }
}

/// Build the canonical attribute set for a secret key
///
/// # Arguments
///
/// * `label` - Persistent name of the key object
/// * `requested_length` - Key length in bytes asked for by the caller
/// * `key_type` - Logical key type
/// * `profile` - Vendor profile of the token
/// * `length_override` - Configured length that replaces `requested_length`
pub fn build_template(
    label: &str,
    requested_length: usize,
    key_type: &KeyType,
    profile: VendorProfile,
    length_override: Option<usize>,
) -> AttributeSet {
    let length = length_override.unwrap_or(requested_length);

    let mut template = AttributeSet::new()
        .with(Attribute::Label(label.to_string()))
        .with(Attribute::Token(true))
        .with(Attribute::Sign(true));

    let marker = match key_type {
        KeyType::Aes => {
            template.insert(Attribute::Decrypt(true));
            template.insert(Attribute::Encrypt(true));
            template.insert(Attribute::ValueLen(length));
            KeyTypeMarker::Aes
        }
        KeyType::Des3 => {
            template.insert(Attribute::Sensitive(true));
            template.insert(Attribute::Private(true));
            template.insert(Attribute::Decrypt(true));
            template.insert(Attribute::Encrypt(true));
            template.insert(Attribute::Wrap(true));
            template.insert(Attribute::Unwrap(true));
            // CloudHSM rejects an explicit length on DES3
            if length != 0 {
                template.insert(Attribute::ValueLen(length));
            }
            KeyTypeMarker::Des3
        }
        KeyType::GenericSecret
        | KeyType::Sha256Hmac
        | KeyType::Sha384Hmac
        | KeyType::Other(_) => {
            template.insert(Attribute::ValueLen(length));
            template.insert(Attribute::Sensitive(true));
            template.insert(Attribute::Private(true));
            profile
                .template_overrides(key_type)
                .unwrap_or(KeyTypeMarker::GenericSecret)
        }
    };

    template.insert(Attribute::KeyType(marker));
    template
}
