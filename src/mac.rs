//! HMAC-SHA384 signing on the token.

use crate::error::{error_codes, HsmResult};
use crate::hsm::Device;
use crate::key_management::mechanism::Mechanism;

/// Length in bytes of an HMAC-SHA384 tag
pub const HMAC_SHA384_LEN: usize = 48;

/// Signs messages with CKM_SHA384_HMAC
#[derive(Debug)]
pub struct HmacSigner<'a, D: Device> {
    device: &'a D,
}

impl<'a, D: Device> HmacSigner<'a, D> {
    pub fn new(device: &'a D) -> Self {
        Self { device }
    }

    /// Compute the HMAC-SHA384 of `message` under `key`
    ///
    /// The key must be a generic secret or SHA384-HMAC key with CKA_SIGN set.
    /// On failure no partial MAC is returned.
    pub fn sign_hmac_sha384(&self, key: D::Handle, message: &[u8]) -> HsmResult<Vec<u8>> {
        self.device
            .sign(&Mechanism::Sha384Hmac, key, message)
            .map_err(|e| {
                log::warn!("HMAC-SHA384 signing failed: {}", e);
                e.within("sign_hmac_sha384", error_codes::SIGNING_FAILED)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hsm::{DeviceOperation, SoftToken};
    use crate::key_management::{KeyLifecycleManager, KeyType, LifecycleConfig};
    use hmac::{Hmac, Mac};
    use sha2::Sha384;

    #[test]
    fn test_sign_matches_software_hmac() {
        let manager =
            KeyLifecycleManager::new(SoftToken::default(), LifecycleConfig::default()).unwrap();
        let key_hex = "0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b";
        let key = manager
            .import_symmetric_key("mac", "SHA384_HMAC", key_hex)
            .unwrap();

        let mac = manager.signer().sign_hmac_sha384(key, b"Hi There").unwrap();

        let mut expected = <Hmac<Sha384> as Mac>::new_from_slice(&hex::decode(key_hex).unwrap()).unwrap();
        expected.update(b"Hi There");
        assert_eq!(mac, expected.finalize().into_bytes().to_vec());
        assert_eq!(mac.len(), HMAC_SHA384_LEN);
    }

    #[test]
    fn test_rfc4231_case_2() {
        let manager =
            KeyLifecycleManager::new(SoftToken::default(), LifecycleConfig::default()).unwrap();
        // "Jefe"
        let key = manager
            .import_symmetric_key("jefe", "GENERIC_SECRET", "4a656665")
            .unwrap();

        let mac = manager
            .signer()
            .sign_hmac_sha384(key, b"what do ya want for nothing?")
            .unwrap();

        assert_eq!(
            hex::encode(mac),
            "af45d2e376484031617f78d2b58a6b1b9c7ef464f5a01b47e42ec3736322445e\
             8e2240ca5e69e2c78b3239ecfab21649"
        );
    }

    #[test]
    fn test_failure_returns_no_mac() {
        let token = SoftToken::default();
        let manager = KeyLifecycleManager::new(&token, LifecycleConfig::default()).unwrap();
        let key = manager.generate_key("mac", 48, &KeyType::GenericSecret).unwrap();
        token.fail_on(DeviceOperation::Sign);

        let err = manager.signer().sign_hmac_sha384(key, b"message").unwrap_err();

        assert_eq!(err.error_type(), "DeviceError");
        assert_eq!(err.operation(), "sign_hmac_sha384");
        assert_eq!(err.error_code(), error_codes::SIGNING_FAILED);
    }

    #[test]
    fn test_aes_key_cannot_sign() {
        let manager =
            KeyLifecycleManager::new(SoftToken::default(), LifecycleConfig::default()).unwrap();
        let key = manager.generate_key("aes", 32, &KeyType::Aes).unwrap();

        assert!(manager.signer().sign_hmac_sha384(key, b"m").is_err());
    }
}
