use super::*;
use crate::error::error_codes;
use crate::error::HsmResult;
use crate::hsm::{Device, DeviceOperation, SoftHandle, SoftToken};
use crate::key_management::{
    build_template, AttributeSet, KeyLifecycleManager, KeyType, LifecycleConfig, Mechanism,
    VendorProfile,
};

fn manager_with_key(length: usize) -> (KeyLifecycleManager<SoftToken>, SoftHandle) {
    let manager = KeyLifecycleManager::new(SoftToken::default(), LifecycleConfig::default()).unwrap();
    let key = manager.generate_key("gcm", length, &KeyType::Aes).unwrap();
    (manager, key)
}

#[test]
fn test_aes_encrypt_decrypt() {
    let (manager, key) = manager_with_key(32);
    let plaintext = b"This is a test message for AES-GCM encryption";

    let sealed = manager.cipher().encrypt(key, plaintext).unwrap();

    // Verify ciphertext is not the same as plaintext
    assert_ne!(&sealed.combined[..plaintext.len()], &plaintext[..]);

    let decrypted = manager
        .cipher()
        .decrypt(key, &sealed.combined, &sealed.iv)
        .unwrap();
    assert_eq!(&decrypted[..], &plaintext[..]);
}

#[test]
fn test_reference_framing() {
    let (manager, key) = manager_with_key(16);
    let plaintext = b"framing";

    let sealed = manager.cipher().encrypt(key, plaintext).unwrap();

    // ciphertext || tag || iv, with nothing prepended
    assert_eq!(sealed.iv.len(), 16);
    assert_eq!(sealed.combined.len(), plaintext.len() + 16 + 16);
    assert_eq!(&sealed.combined[sealed.combined.len() - 16..], &sealed.iv[..]);

    let call = manager.device().last_call().unwrap();
    match call.mechanism {
        Some(Mechanism::AesGcm(params)) => {
            assert!(params.iv().is_empty());
            assert_eq!(params.tag_bits(), 128);
        }
        other => panic!("unexpected mechanism {:?}", other),
    }
}

#[test]
fn test_decrypt_submits_body_and_iv() {
    let (manager, key) = manager_with_key(32);
    let sealed = manager.cipher().encrypt(key, b"abc").unwrap();

    manager
        .cipher()
        .decrypt(key, &sealed.combined, &sealed.iv)
        .unwrap();

    let call = manager.device().last_call().unwrap();
    assert_eq!(call.operation, DeviceOperation::Decrypt);
    match call.mechanism {
        Some(Mechanism::AesGcm(params)) => assert_eq!(params.iv(), &sealed.iv[..]),
        other => panic!("unexpected mechanism {:?}", other),
    }
}

#[test]
fn test_empty_plaintext() {
    let (manager, key) = manager_with_key(24);

    let sealed = manager.cipher().encrypt(key, b"").unwrap();
    let decrypted = manager
        .cipher()
        .decrypt(key, &sealed.combined, &sealed.iv)
        .unwrap();

    assert!(decrypted.is_empty());
}

#[test]
fn test_aes_tampering_detection() {
    let (manager, key) = manager_with_key(32);
    let mut sealed = manager.cipher().encrypt(key, b"tamper with me").unwrap();

    // Flip one bit
    sealed.combined[0] ^= 0x01;

    let err = manager
        .cipher()
        .decrypt(key, &sealed.combined, &sealed.iv)
        .unwrap_err();
    assert_eq!(err.error_type(), "DeviceError");
    assert_eq!(err.error_code(), error_codes::DECRYPTION_FAILED);
}

#[test]
fn test_wrong_iv_fails() {
    let (manager, key) = manager_with_key(32);
    let sealed = manager.cipher().encrypt(key, b"secret").unwrap();

    let wrong_iv = vec![0u8; 16];
    assert!(manager
        .cipher()
        .decrypt(key, &sealed.combined, &wrong_iv)
        .is_err());
}

#[test]
fn test_short_ciphertext_is_rejected() {
    let (manager, key) = manager_with_key(32);

    let err = manager.cipher().decrypt(key, &[0u8; 15], &[0u8; 16]).unwrap_err();

    assert_eq!(err.error_type(), "ValidationError");
    assert_eq!(err.error_code(), error_codes::CIPHERTEXT_TOO_SHORT);
    assert_eq!(manager.device().last_call().unwrap().operation, DeviceOperation::GenerateKey);
}

#[test]
fn test_device_failure_is_wrapped() {
    let (manager, key) = manager_with_key(32);
    manager.device().fail_on(DeviceOperation::Encrypt);

    let err = manager.cipher().encrypt(key, b"x").unwrap_err();

    assert_eq!(err.operation(), "aes_gcm_encrypt");
    assert_eq!(err.error_code(), error_codes::ENCRYPTION_FAILED);
}

#[test]
fn test_key_without_encrypt_flag_is_refused() {
    let manager = KeyLifecycleManager::new(SoftToken::default(), LifecycleConfig::default()).unwrap();
    let key = manager
        .import_symmetric_key("mac", "GENERIC_SECRET", "00112233445566778899aabbccddeeff")
        .unwrap();

    let err = manager.cipher().encrypt(key, b"x").unwrap_err();
    assert!(err.to_string().contains("CKR_KEY_TYPE_INCONSISTENT"));
}

/// Token that writes a fixed IV back into the GCM parameter block
struct IvReportingToken {
    inner: SoftToken,
    reported_iv: Vec<u8>,
}

impl Device for IvReportingToken {
    type Handle = SoftHandle;

    fn manufacturer_id(&self) -> HsmResult<String> {
        self.inner.manufacturer_id()
    }

    fn generate_key(&self, mechanism: &Mechanism, template: &AttributeSet) -> HsmResult<SoftHandle> {
        self.inner.generate_key(mechanism, template)
    }

    fn create_object(&self, template: &AttributeSet) -> HsmResult<SoftHandle> {
        self.inner.create_object(template)
    }

    fn encrypt(&self, mechanism: &mut Mechanism, key: SoftHandle, data: &[u8]) -> HsmResult<Vec<u8>> {
        let output = self.inner.encrypt(mechanism, key, data)?;
        if let Some(params) = mechanism.gcm_parameters_mut() {
            params.set_iv(&self.reported_iv);
        }
        Ok(output)
    }

    fn decrypt(&self, mechanism: &Mechanism, key: SoftHandle, data: &[u8]) -> HsmResult<Vec<u8>> {
        self.inner.decrypt(mechanism, key, data)
    }

    fn sign(&self, mechanism: &Mechanism, key: SoftHandle, data: &[u8]) -> HsmResult<Vec<u8>> {
        self.inner.sign(mechanism, key, data)
    }
}

#[test]
fn test_reported_iv_is_prepended() {
    let token = IvReportingToken {
        inner: SoftToken::default(),
        reported_iv: vec![0xa5; 12],
    };
    let template = build_template("gcm", 32, &KeyType::Aes, VendorProfile::Reference, None);
    let key = token.generate_key(&Mechanism::AesKeyGen, &template).unwrap();
    let cipher = AesGcmCipher::new(&token, VendorProfile::Reference.gcm_framing());

    let sealed = cipher.encrypt(key, b"reported").unwrap();

    // reported iv || ciphertext || tag || iv
    assert_eq!(&sealed.combined[..12], &[0xa5; 12][..]);
    assert_eq!(sealed.combined.len(), 12 + 8 + 16 + 16);
    assert_eq!(&sealed.combined[sealed.combined.len() - 16..], &sealed.iv[..]);
    assert_ne!(sealed.iv, vec![0xa5; 12]);
}
