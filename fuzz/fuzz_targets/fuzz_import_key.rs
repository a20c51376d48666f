#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use symhsm::hsm::SoftToken;
use symhsm::key_management::{KeyLifecycleManager, LifecycleConfig};
use symhsm::HsmError;

#[derive(Arbitrary, Debug)]
struct ImportFuzzInput {
    label: String,
    key_type: String,
    hex_value: String,
    ncipher: bool,
    length_override: Option<u8>,
}

fuzz_target!(|input: ImportFuzzInput| {
    let manufacturer = if input.ncipher { "nCipher Corp. Ltd" } else { "SafeNet, Inc." };
    let config = match input.length_override {
        Some(length) => LifecycleConfig::with_key_length_override(length as usize),
        None => LifecycleConfig::default(),
    };
    let manager = match KeyLifecycleManager::new(SoftToken::new(manufacturer), config) {
        Ok(manager) => manager,
        Err(_) => return,
    };

    match manager.import_symmetric_key(&input.label, &input.key_type, &input.hex_value) {
        Ok(_) => {
            assert!(!input.label.is_empty() && !input.key_type.is_empty());
            assert_eq!(input.hex_value.len() % 2, 0);
        }
        // Input errors must be raised before the token sees anything
        Err(HsmError::ValidationError { .. }) | Err(HsmError::EncodingError { .. }) => {
            assert!(manager.device().calls().is_empty());
        }
        Err(_) => {}
    }
});
