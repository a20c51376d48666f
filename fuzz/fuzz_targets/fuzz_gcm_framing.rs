#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use symhsm::hsm::SoftToken;
use symhsm::key_management::{KeyLifecycleManager, KeyType, LifecycleConfig};

#[derive(Arbitrary, Debug)]
struct GcmFuzzInput {
    plaintext: Vec<u8>,
    ciphertext: Vec<u8>,
    iv: Vec<u8>,
    key_len: u8,
}

fuzz_target!(|input: GcmFuzzInput| {
    let manager = match KeyLifecycleManager::new(SoftToken::default(), LifecycleConfig::default()) {
        Ok(manager) => manager,
        Err(_) => return,
    };
    let key_len = [16, 24, 32][input.key_len as usize % 3];
    let key = match manager.generate_key("fuzz", key_len, &KeyType::Aes) {
        Ok(key) => key,
        Err(_) => return,
    };
    let cipher = manager.cipher();

    // Valid round trip
    if let Ok(sealed) = cipher.encrypt(key, &input.plaintext) {
        let opened = cipher.decrypt(key, &sealed.combined, &sealed.iv);
        assert_eq!(opened.ok().as_deref(), Some(&input.plaintext[..]));
    }

    // Arbitrary ciphertext and IV must fail cleanly
    let _ = cipher.decrypt(key, &input.ciphertext, &input.iv);
});
