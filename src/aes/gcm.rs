use std::fmt;

use crate::error::{error_codes, HsmError, HsmResult};
use crate::hsm::Device;
use crate::key_management::mechanism::{GcmParameters, Mechanism};
use crate::key_management::vendor::GcmFraming;

/// Output of a token-side AES-GCM encryption
///
/// `combined` is what must be handed back to [`AesGcmCipher::decrypt`]
/// together with `iv`. The layout is vendor specific and not
/// self-describing, so results only round-trip on the same vendor.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionResult {
    /// Device-reported IV (possibly empty) followed by the raw device output
    pub combined: Vec<u8>,

    /// IV extracted from the end of the device output
    pub iv: Vec<u8>,
}

impl fmt::Debug for EncryptionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionResult")
            .field("combined_len", &self.combined.len())
            .field("iv", &hex::encode(&self.iv))
            .finish()
    }
}

/// AES-GCM with a 128-bit tag, executed by the token
///
/// The token picks the IV at encryption time. Decryption strips the trailing
/// IV suffix from the ciphertext and re-initializes the context with the IV
/// the caller kept from encryption.
pub struct AesGcmCipher<'a, D: Device> {
    device: &'a D,
    framing: GcmFraming,
}

impl<'a, D: Device> AesGcmCipher<'a, D> {
    pub fn new(device: &'a D, framing: GcmFraming) -> Self {
        Self { device, framing }
    }

    pub fn framing(&self) -> GcmFraming {
        self.framing
    }

    /// Encrypt `plaintext` under the AES key `key`
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the token fails or returns fewer bytes than
    /// the IV suffix.
    pub fn encrypt(&self, key: D::Handle, plaintext: &[u8]) -> HsmResult<EncryptionResult> {
        const OPERATION: &str = "aes_gcm_encrypt";

        let mut mechanism = Mechanism::AesGcm(GcmParameters::token_generated_iv());
        let raw = self
            .device
            .encrypt(&mut mechanism, key, plaintext)
            .map_err(|e| {
                log::warn!("AES-GCM encryption failed: {}", e);
                e.within(OPERATION, error_codes::ENCRYPTION_FAILED)
            })?;

        let suffix = self.framing.iv_suffix_len;
        if raw.len() < suffix {
            return Err(HsmError::device_error(
                OPERATION,
                &format!(
                    "device returned {} bytes, shorter than the {}-byte IV suffix",
                    raw.len(),
                    suffix
                ),
                error_codes::MALFORMED_DEVICE_OUTPUT,
            ));
        }

        // Empty unless the token wrote its IV back into the parameter block
        let reported_iv = mechanism
            .gcm_parameters()
            .map(|params| params.iv().to_vec())
            .unwrap_or_default();
        let iv = raw[raw.len() - suffix..].to_vec();

        let mut combined = reported_iv;
        combined.extend_from_slice(&raw);

        Ok(EncryptionResult { combined, iv })
    }

    /// Decrypt a `combined` ciphertext produced by [`encrypt`](Self::encrypt)
    ///
    /// # Errors
    ///
    /// * `ValidationError` if `ciphertext` is shorter than the IV suffix
    /// * `DeviceError` if the token fails, including authentication failure
    pub fn decrypt(&self, key: D::Handle, ciphertext: &[u8], iv: &[u8]) -> HsmResult<Vec<u8>> {
        const OPERATION: &str = "aes_gcm_decrypt";

        let suffix = self.framing.iv_suffix_len;
        if ciphertext.len() < suffix {
            return Err(HsmError::validation_error_with(
                OPERATION,
                &format!(
                    "ciphertext of {} bytes is shorter than the {}-byte IV suffix",
                    ciphertext.len(),
                    suffix
                ),
                error_codes::CIPHERTEXT_TOO_SHORT,
                "length",
                ciphertext.len(),
            ));
        }

        let body = &ciphertext[..ciphertext.len() - suffix];
        let mechanism = Mechanism::AesGcm(GcmParameters::with_iv(iv));
        self.device.decrypt(&mechanism, key, body).map_err(|e| {
            log::warn!("AES-GCM decryption failed: {}", e);
            e.within(OPERATION, error_codes::DECRYPTION_FAILED)
        })
    }
}

impl<D: Device> fmt::Debug for AesGcmCipher<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmCipher")
            .field("framing", &self.framing)
            .finish()
    }
}
