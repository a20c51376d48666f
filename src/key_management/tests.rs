use super::*;
use crate::error::error_codes;
use crate::hsm::{DeviceOperation, SoftToken};

fn manager_for(manufacturer_id: &str) -> KeyLifecycleManager<SoftToken> {
    KeyLifecycleManager::new(SoftToken::new(manufacturer_id), LifecycleConfig::default()).unwrap()
}

#[test]
fn test_profile_is_selected_from_manufacturer() {
    assert_eq!(manager_for("nCipher Corp. Ltd").profile(), VendorProfile::NCipher);
    assert_eq!(manager_for("SafeNet, Inc.").profile(), VendorProfile::Reference);
}

#[test]
fn test_generate_aes_key() {
    let manager = manager_for("SoftHSM");

    let key = manager.generate_key("aes-256", 32, &KeyType::Aes).unwrap();

    let call = manager.device().last_call().unwrap();
    assert_eq!(call.operation, DeviceOperation::GenerateKey);
    assert_eq!(call.mechanism, Some(Mechanism::AesKeyGen));

    let template = manager.device().object_template(key).unwrap();
    assert_eq!(template.label(), Some("aes-256"));
    assert_eq!(template.key_type(), Some(KeyTypeMarker::Aes));
    assert_eq!(manager.device().object_len(key), Some(32));
}

#[test]
fn test_generate_des3_without_length() {
    let manager = manager_for("AWS CloudHSM");

    let key = manager.generate_key("des3", 0, &KeyType::Des3).unwrap();

    let template = manager.device().object_template(key).unwrap();
    assert!(!template.contains(AttributeKind::ValueLen));
    assert_eq!(manager.device().object_len(key), Some(24));
}

#[test]
fn test_generate_hmac_key_per_vendor() {
    let ncipher = manager_for("nCipher Corp. Ltd");
    let key = ncipher.generate_key("mac", 48, &KeyType::Sha384Hmac).unwrap();
    assert_eq!(
        ncipher.device().last_call().unwrap().mechanism,
        Some(Mechanism::NcSha384HmacKeyGen)
    );
    assert_eq!(
        ncipher.device().object_template(key).unwrap().key_type(),
        Some(KeyTypeMarker::Sha384Hmac)
    );

    let reference = manager_for("SafeNet, Inc.");
    let key = reference.generate_key("mac", 48, &KeyType::Sha384Hmac).unwrap();
    assert_eq!(
        reference.device().last_call().unwrap().mechanism,
        Some(Mechanism::GenericSecretKeyGen)
    );
    assert_eq!(
        reference.device().object_template(key).unwrap().key_type(),
        Some(KeyTypeMarker::GenericSecret)
    );
}

#[test]
fn test_generation_failure_is_returned() {
    let manager = manager_for("SoftHSM");
    manager.device().fail_on(DeviceOperation::GenerateKey);

    let err = manager.generate_key("k", 32, &KeyType::Aes).unwrap_err();

    assert_eq!(err.error_type(), "DeviceError");
    assert_eq!(err.operation(), "generate_key");
    assert_eq!(err.error_code(), error_codes::KEY_GENERATION_FAILED);
    assert!(err.to_string().contains("CKR_DEVICE_ERROR"));
}

#[test]
fn test_import_sizes_template_by_decoded_bytes() {
    let manager = manager_for("SoftHSM");
    let hex_key = "00112233445566778899AABBCCDDEEFF";

    let key = manager.import_symmetric_key("imported", "AES", hex_key).unwrap();

    let template = manager.device().object_template(key).unwrap();
    assert_eq!(template.value_len(), Some(16));
    assert_eq!(template.value().map(|v| v.len()), Some(16));
    assert_eq!(template.kinds().last(), Some(&AttributeKind::Value));
}

#[test]
fn test_import_rejects_bad_input_before_device() {
    let manager = manager_for("SoftHSM");

    for (label, key_type, value) in [("", "AES", "aa"), ("L", "", "aa"), ("L", "AES", "")] {
        let err = manager.import_symmetric_key(label, key_type, value).unwrap_err();
        assert_eq!(err.error_type(), "ValidationError");
        assert_eq!(err.error_code(), error_codes::MISSING_INPUT);
    }

    let err = manager.import_symmetric_key("L", "AES", "abc").unwrap_err();
    assert_eq!(err.error_code(), error_codes::INVALID_KEY_LENGTH);
    assert!(err.to_string().contains("(3)"));

    let err = manager.import_symmetric_key("L", "AES", "zz").unwrap_err();
    assert_eq!(err.error_type(), "EncodingError");

    assert!(manager.device().calls().is_empty());
}

#[test]
fn test_import_device_failure_is_wrapped() {
    let manager = manager_for("SoftHSM");
    manager.device().fail_on(DeviceOperation::CreateObject);

    let err = manager
        .import_symmetric_key("L", "GENERIC_SECRET", "0011223344556677")
        .unwrap_err();

    assert_eq!(err.error_type(), "DeviceError");
    assert_eq!(err.operation(), "import_symmetric_key");
    assert_eq!(err.error_code(), error_codes::OBJECT_CREATION_FAILED);
    assert!(std::error::Error::source(&err).is_none());
}

#[test]
fn test_override_applies_to_generation() {
    let manager = KeyLifecycleManager::new(
        SoftToken::default(),
        LifecycleConfig::with_key_length_override(16),
    )
    .unwrap();

    let aes = manager.generate_key("a", 32, &KeyType::Aes).unwrap();
    let generic = manager.generate_key("g", 64, &KeyType::GenericSecret).unwrap();

    assert_eq!(manager.device().object_len(aes), Some(16));
    assert_eq!(manager.device().object_len(generic), Some(16));
}
