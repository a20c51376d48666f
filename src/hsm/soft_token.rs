/*!
 * Software token emulator
 *
 * An in-memory [`Device`] for tests and development. It keeps secret key
 * objects, performs AES-GCM and HMAC-SHA384 in software, and mimics the
 * behaviour of the reference vendor where the client depends on it:
 *
 * - GCM output is `ciphertext || tag || iv` with a 16-byte token-chosen IV,
 *   and the IV is not reported back through the parameter block.
 * - nCipher vendor mechanisms are only available when the manufacturer id
 *   names nCipher.
 *
 * Every call is journaled so tests can inspect the exact mechanism and
 * template the client submitted, and failures can be injected per operation.
 */

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Nonce, Payload};
use aes_gcm::AesGcm;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha384;

use super::Device;
use crate::error::{error_codes, HsmError, HsmResult};
use crate::key_management::attributes::{AttributeKind, AttributeSet, KeyTypeMarker};
use crate::key_management::mechanism::{Mechanism, GCM_TAG_BITS};
use crate::key_management::vendor::case_insensitive_contains;
use crate::secure_memory::SecureBytes;

/// Manufacturer id reported by default
pub const SOFT_TOKEN_MANUFACTURER: &str = "SoftToken Project";

/// IV length chosen by the emulator for GCM
pub const SOFT_TOKEN_GCM_IV_LEN: usize = 16;

const DES3_KEY_LEN: usize = 24;

/// Largest secret the emulator generates, in bytes
pub const MAX_SECRET_KEY_LEN: usize = 1024;

/// Number of calls kept in the journal; older entries are dropped
pub const JOURNAL_CAPACITY: usize = 1024;

type Aes128Gcm16 = AesGcm<Aes128, U16>;
type Aes192Gcm16 = AesGcm<Aes192, U16>;
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Token operations, used for journaling and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOperation {
    GenerateKey,
    CreateObject,
    Encrypt,
    Decrypt,
    Sign,
}

impl DeviceOperation {
    fn name(self) -> &'static str {
        match self {
            DeviceOperation::GenerateKey => "C_GenerateKey",
            DeviceOperation::CreateObject => "C_CreateObject",
            DeviceOperation::Encrypt => "C_Encrypt",
            DeviceOperation::Decrypt => "C_Decrypt",
            DeviceOperation::Sign => "C_Sign",
        }
    }

    fn error_code(self) -> u32 {
        match self {
            DeviceOperation::GenerateKey => error_codes::KEY_GENERATION_FAILED,
            DeviceOperation::CreateObject => error_codes::OBJECT_CREATION_FAILED,
            DeviceOperation::Encrypt => error_codes::ENCRYPTION_FAILED,
            DeviceOperation::Decrypt => error_codes::DECRYPTION_FAILED,
            DeviceOperation::Sign => error_codes::SIGNING_FAILED,
        }
    }

    fn reject(self, return_value: &str) -> HsmError {
        HsmError::device_error(self.name(), return_value, self.error_code())
    }
}

/// One journaled call
#[derive(Debug, Clone)]
pub struct DeviceCall {
    pub operation: DeviceOperation,
    pub mechanism: Option<Mechanism>,
    pub template: Option<AttributeSet>,
    pub key: Option<SoftHandle>,
}

/// Object handle issued by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoftHandle(u64);

impl SoftHandle {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SoftHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

struct SoftObject {
    template: AttributeSet,
    value: SecureBytes,
}

#[derive(Default)]
struct TokenState {
    objects: HashMap<u64, SoftObject>,
    next_handle: u64,
    calls: Vec<DeviceCall>,
    failures: HashSet<DeviceOperation>,
}

impl TokenState {
    fn record(
        &mut self,
        operation: DeviceOperation,
        mechanism: Option<&Mechanism>,
        template: Option<&AttributeSet>,
        key: Option<SoftHandle>,
    ) -> HsmResult<()> {
        if self.calls.len() == JOURNAL_CAPACITY {
            self.calls.remove(0);
        }
        self.calls.push(DeviceCall {
            operation,
            mechanism: mechanism.cloned(),
            template: template.cloned(),
            key,
        });
        if self.failures.contains(&operation) {
            return Err(operation.reject("CKR_DEVICE_ERROR"));
        }
        Ok(())
    }

    fn store(&mut self, template: &AttributeSet, value: SecureBytes) -> SoftHandle {
        self.next_handle += 1;
        let handle = self.next_handle;
        self.objects.insert(
            handle,
            SoftObject {
                template: template.clone(),
                value,
            },
        );
        SoftHandle(handle)
    }

    fn object(&self, operation: DeviceOperation, key: SoftHandle) -> HsmResult<&SoftObject> {
        self.objects
            .get(&key.0)
            .ok_or_else(|| operation.reject("CKR_KEY_HANDLE_INVALID"))
    }
}

/// In-memory token
pub struct SoftToken {
    manufacturer_id: String,
    state: Mutex<TokenState>,
}

impl SoftToken {
    /// Create an empty token reporting the given manufacturer id
    pub fn new(manufacturer_id: &str) -> Self {
        Self {
            manufacturer_id: manufacturer_id.to_string(),
            state: Mutex::new(TokenState::default()),
        }
    }

    /// Make every subsequent call of `operation` fail with CKR_DEVICE_ERROR
    pub fn fail_on(&self, operation: DeviceOperation) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.insert(operation);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.clear();
        }
    }

    /// Journal of all calls so far
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    pub fn last_call(&self) -> Option<DeviceCall> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.calls.last().cloned())
    }

    /// Template an object was created with
    pub fn object_template(&self, key: SoftHandle) -> Option<AttributeSet> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.objects.get(&key.0).map(|o| o.template.clone()))
    }

    /// Length of an object's key material
    pub fn object_len(&self, key: SoftHandle) -> Option<usize> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.objects.get(&key.0).map(|o| o.value.len()))
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().map(|state| state.objects.len()).unwrap_or(0)
    }

    fn lock(&self, operation: DeviceOperation) -> HsmResult<MutexGuard<'_, TokenState>> {
        self.state
            .lock()
            .map_err(|_| operation.reject("token state lock poisoned"))
    }

    fn supports(&self, mechanism: &Mechanism) -> bool {
        !mechanism.is_vendor_defined()
            || case_insensitive_contains(&self.manufacturer_id, "ncipher")
    }
}

impl Default for SoftToken {
    fn default() -> Self {
        Self::new(SOFT_TOKEN_MANUFACTURER)
    }
}

impl fmt::Debug for SoftToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftToken")
            .field("manufacturer_id", &self.manufacturer_id)
            .field("objects", &self.object_count())
            .finish()
    }
}

impl Device for SoftToken {
    type Handle = SoftHandle;

    fn manufacturer_id(&self) -> HsmResult<String> {
        Ok(self.manufacturer_id.clone())
    }

    fn generate_key(&self, mechanism: &Mechanism, template: &AttributeSet) -> HsmResult<SoftHandle> {
        let op = DeviceOperation::GenerateKey;
        let mut state = self.lock(op)?;
        state.record(op, Some(mechanism), Some(template), None)?;

        if !self.supports(mechanism) {
            return Err(op.reject("CKR_MECHANISM_INVALID"));
        }
        let expected_marker = match mechanism {
            Mechanism::AesKeyGen => KeyTypeMarker::Aes,
            Mechanism::Des3KeyGen => KeyTypeMarker::Des3,
            Mechanism::GenericSecretKeyGen => KeyTypeMarker::GenericSecret,
            Mechanism::NcSha256HmacKeyGen => KeyTypeMarker::Sha256Hmac,
            Mechanism::NcSha384HmacKeyGen => KeyTypeMarker::Sha384Hmac,
            Mechanism::AesGcm(_) | Mechanism::Sha384Hmac => {
                return Err(op.reject("CKR_MECHANISM_INVALID"))
            }
        };
        let marker = template
            .key_type()
            .ok_or_else(|| op.reject("CKR_TEMPLATE_INCOMPLETE"))?;
        if marker != expected_marker || template.contains(AttributeKind::Value) {
            return Err(op.reject("CKR_TEMPLATE_INCONSISTENT"));
        }

        let length = match (marker, template.value_len()) {
            (KeyTypeMarker::Des3, None) | (KeyTypeMarker::Des3, Some(DES3_KEY_LEN)) => DES3_KEY_LEN,
            (KeyTypeMarker::Des3, Some(_)) => return Err(op.reject("CKR_KEY_SIZE_RANGE")),
            (KeyTypeMarker::Aes, Some(len)) if matches!(len, 16 | 24 | 32) => len,
            (KeyTypeMarker::Aes, Some(_)) => return Err(op.reject("CKR_KEY_SIZE_RANGE")),
            (_, Some(len)) if len > 0 && len <= MAX_SECRET_KEY_LEN => len,
            (_, Some(_)) => return Err(op.reject("CKR_KEY_SIZE_RANGE")),
            (_, None) => return Err(op.reject("CKR_TEMPLATE_INCOMPLETE")),
        };

        let mut material = vec![0u8; length];
        rand::thread_rng().fill_bytes(&mut material);
        Ok(state.store(template, SecureBytes::from(material)))
    }

    fn create_object(&self, template: &AttributeSet) -> HsmResult<SoftHandle> {
        let op = DeviceOperation::CreateObject;
        let mut state = self.lock(op)?;
        state.record(op, None, Some(template), None)?;

        let value = template
            .value()
            .cloned()
            .ok_or_else(|| op.reject("CKR_TEMPLATE_INCOMPLETE"))?;
        let marker = template
            .key_type()
            .ok_or_else(|| op.reject("CKR_TEMPLATE_INCOMPLETE"))?;
        if let Some(len) = template.value_len() {
            if len != value.len() {
                return Err(op.reject("CKR_ATTRIBUTE_VALUE_INVALID"));
            }
        }
        let valid_len = match marker {
            KeyTypeMarker::Aes => matches!(value.len(), 16 | 24 | 32),
            KeyTypeMarker::Des3 => value.len() == DES3_KEY_LEN,
            _ => !value.is_empty(),
        };
        if !valid_len {
            return Err(op.reject("CKR_ATTRIBUTE_VALUE_INVALID"));
        }

        Ok(state.store(template, value))
    }

    fn encrypt(&self, mechanism: &mut Mechanism, key: SoftHandle, data: &[u8]) -> HsmResult<Vec<u8>> {
        let op = DeviceOperation::Encrypt;
        let mut state = self.lock(op)?;
        state.record(op, Some(&*mechanism), None, Some(key))?;

        // Like the reference vendor, the chosen IV is only appended to the
        // output and never written back into the parameter block
        let params = gcm_parameters(op, &*mechanism)?;
        let object = state.object(op, key)?;
        check_usage(op, object, KeyTypeMarker::Aes, AttributeKind::Encrypt)?;

        let mut iv = params.iv().to_vec();
        if iv.is_empty() {
            iv = vec![0u8; SOFT_TOKEN_GCM_IV_LEN];
            rand::thread_rng().fill_bytes(&mut iv);
        } else if iv.len() != SOFT_TOKEN_GCM_IV_LEN {
            return Err(op.reject("CKR_MECHANISM_PARAM_INVALID"));
        }

        let mut output = gcm_apply(object.value.as_bytes(), &iv, params.aad(), data, true)
            .map_err(|_| op.reject("CKR_FUNCTION_FAILED"))?;
        output.extend_from_slice(&iv);
        Ok(output)
    }

    fn decrypt(&self, mechanism: &Mechanism, key: SoftHandle, data: &[u8]) -> HsmResult<Vec<u8>> {
        let op = DeviceOperation::Decrypt;
        let mut state = self.lock(op)?;
        state.record(op, Some(mechanism), None, Some(key))?;

        let params = gcm_parameters(op, mechanism)?;
        let object = state.object(op, key)?;
        check_usage(op, object, KeyTypeMarker::Aes, AttributeKind::Decrypt)?;

        if params.iv().len() != SOFT_TOKEN_GCM_IV_LEN {
            return Err(op.reject("CKR_MECHANISM_PARAM_INVALID"));
        }

        gcm_apply(object.value.as_bytes(), params.iv(), params.aad(), data, false)
            .map_err(|_| op.reject("CKR_ENCRYPTED_DATA_INVALID"))
    }

    fn sign(&self, mechanism: &Mechanism, key: SoftHandle, data: &[u8]) -> HsmResult<Vec<u8>> {
        let op = DeviceOperation::Sign;
        let mut state = self.lock(op)?;
        state.record(op, Some(mechanism), None, Some(key))?;

        if *mechanism != Mechanism::Sha384Hmac {
            return Err(op.reject("CKR_MECHANISM_INVALID"));
        }
        let object = state.object(op, key)?;
        match object.template.key_type() {
            Some(KeyTypeMarker::GenericSecret) | Some(KeyTypeMarker::Sha384Hmac) => {}
            _ => return Err(op.reject("CKR_KEY_TYPE_INCONSISTENT")),
        }
        if object.template.flag(AttributeKind::Sign) != Some(true) {
            return Err(op.reject("CKR_KEY_FUNCTION_NOT_PERMITTED"));
        }

        let mut mac = <Hmac<Sha384> as Mac>::new_from_slice(object.value.as_bytes())
            .map_err(|_| op.reject("CKR_KEY_SIZE_RANGE"))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn gcm_parameters(
    op: DeviceOperation,
    mechanism: &Mechanism,
) -> HsmResult<&crate::key_management::mechanism::GcmParameters> {
    let params = mechanism
        .gcm_parameters()
        .ok_or_else(|| op.reject("CKR_MECHANISM_INVALID"))?;
    if params.tag_bits() != GCM_TAG_BITS {
        return Err(op.reject("CKR_MECHANISM_PARAM_INVALID"));
    }
    Ok(params)
}

fn check_usage(
    op: DeviceOperation,
    object: &SoftObject,
    marker: KeyTypeMarker,
    usage: AttributeKind,
) -> HsmResult<()> {
    if object.template.key_type() != Some(marker) {
        return Err(op.reject("CKR_KEY_TYPE_INCONSISTENT"));
    }
    if object.template.flag(usage) != Some(true) {
        return Err(op.reject("CKR_KEY_FUNCTION_NOT_PERMITTED"));
    }
    Ok(())
}

fn gcm_apply(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    data: &[u8],
    seal: bool,
) -> Result<Vec<u8>, aes_gcm::Error> {
    match key.len() {
        16 => gcm_with::<Aes128Gcm16>(key, iv, aad, data, seal),
        24 => gcm_with::<Aes192Gcm16>(key, iv, aad, data, seal),
        32 => gcm_with::<Aes256Gcm16>(key, iv, aad, data, seal),
        _ => Err(aes_gcm::Error),
    }
}

fn gcm_with<C>(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    data: &[u8],
    seal: bool,
) -> Result<Vec<u8>, aes_gcm::Error>
where
    C: Aead + KeyInit,
{
    let cipher = C::new_from_slice(key).map_err(|_| aes_gcm::Error)?;
    let nonce = Nonce::<C>::from_slice(iv);
    let payload = Payload { msg: data, aad };
    if seal {
        cipher.encrypt(nonce, payload)
    } else {
        cipher.decrypt(nonce, payload)
    }
}
