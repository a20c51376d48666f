//! Mechanisms submitted to the token, plus the GCM parameter block.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// nCipher vendor prefix (NFCK_VENDOR_NCIPHER), already inside the
/// CKM_VENDOR_DEFINED range
pub const NCIPHER_VENDOR_BASE: u64 = 0xde43_6972;

/// Authentication tag length used for every GCM operation
pub const GCM_TAG_BITS: u64 = 128;

/// Cryptographic mechanism requested from the token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mechanism {
    /// CKM_AES_KEY_GEN
    AesKeyGen,

    /// CKM_DES3_KEY_GEN
    Des3KeyGen,

    /// CKM_GENERIC_SECRET_KEY_GEN
    GenericSecretKeyGen,

    /// CKM_NC_SHA256_HMAC_KEY_GEN (nCipher vendor-defined)
    NcSha256HmacKeyGen,

    /// CKM_NC_SHA384_HMAC_KEY_GEN (nCipher vendor-defined)
    NcSha384HmacKeyGen,

    /// CKM_AES_GCM with its parameter block
    AesGcm(GcmParameters),

    /// CKM_SHA384_HMAC
    Sha384Hmac,
}

impl Mechanism {
    /// PKCS#11 CKM_* value
    pub fn code(&self) -> u64 {
        match self {
            Mechanism::AesKeyGen => 0x1080,
            Mechanism::Des3KeyGen => 0x131,
            Mechanism::GenericSecretKeyGen => 0x350,
            Mechanism::NcSha256HmacKeyGen => NCIPHER_VENDOR_BASE + 0x25,
            Mechanism::NcSha384HmacKeyGen => NCIPHER_VENDOR_BASE + 0x26,
            Mechanism::AesGcm(_) => 0x1087,
            Mechanism::Sha384Hmac => 0x261,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mechanism::AesKeyGen => "CKM_AES_KEY_GEN",
            Mechanism::Des3KeyGen => "CKM_DES3_KEY_GEN",
            Mechanism::GenericSecretKeyGen => "CKM_GENERIC_SECRET_KEY_GEN",
            Mechanism::NcSha256HmacKeyGen => "CKM_NC_SHA256_HMAC_KEY_GEN",
            Mechanism::NcSha384HmacKeyGen => "CKM_NC_SHA384_HMAC_KEY_GEN",
            Mechanism::AesGcm(_) => "CKM_AES_GCM",
            Mechanism::Sha384Hmac => "CKM_SHA384_HMAC",
        }
    }

    /// Whether the mechanism lives in a vendor-defined range
    pub fn is_vendor_defined(&self) -> bool {
        matches!(
            self,
            Mechanism::NcSha256HmacKeyGen | Mechanism::NcSha384HmacKeyGen
        )
    }

    /// GCM parameters, if this is a GCM mechanism
    pub fn gcm_parameters(&self) -> Option<&GcmParameters> {
        match self {
            Mechanism::AesGcm(params) => Some(params),
            _ => None,
        }
    }

    pub fn gcm_parameters_mut(&mut self) -> Option<&mut GcmParameters> {
        match self {
            Mechanism::AesGcm(params) => Some(params),
            _ => None,
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// CK_GCM_PARAMS equivalent.
///
/// Lives only as long as the encrypt or decrypt call that owns it and is
/// wiped when dropped.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct GcmParameters {
    iv: Vec<u8>,
    aad: Vec<u8>,
    tag_bits: u64,
}

impl GcmParameters {
    /// Parameters with an empty IV seed; the token chooses the IV
    pub fn token_generated_iv() -> Self {
        Self::with_iv(&[])
    }

    /// Parameters that reinitialize the context with a known IV
    pub fn with_iv(iv: &[u8]) -> Self {
        Self {
            iv: iv.to_vec(),
            aad: Vec::new(),
            tag_bits: GCM_TAG_BITS,
        }
    }

    /// IV as reported back through the parameter block
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Record the IV the token wrote back into the parameter block
    pub fn set_iv(&mut self, iv: &[u8]) {
        self.iv.zeroize();
        self.iv.extend_from_slice(iv);
    }

    pub fn aad(&self) -> &[u8] {
        &self.aad
    }

    pub fn tag_bits(&self) -> u64 {
        self.tag_bits
    }
}
