/*!
 * PKCS#11 token access via cryptoki
 *
 * Opens a read/write session on a slot, logs in, and implements [`Device`]
 * by translating this crate's mechanism and attribute model into cryptoki
 * values.
 */

use std::fmt;
use std::path::Path;

use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::mechanism::aead::GcmParams;
use cryptoki::mechanism::vendor_defined::VendorDefinedMechanism;
use cryptoki::mechanism::{Mechanism as CkMechanism, MechanismType};
use cryptoki::object::{Attribute as CkAttribute, KeyType as CkKeyType, ObjectHandle};
use cryptoki::session::{Session, UserType};
use cryptoki::slot::Slot;
use cryptoki::types::{AuthPin, Ulong};
use zeroize::Zeroize;

use super::Device;
use crate::error::{error_codes, HsmError, HsmResult};
use crate::key_management::attributes::{Attribute, AttributeSet, KeyTypeMarker};
use crate::key_management::mechanism::{GcmParameters, Mechanism};
use crate::secure_memory::SecureBytes;

/// Library used when `PKCS11_LIBRARY` is not set
pub const DEFAULT_LIBRARY_PATH: &str = "/usr/lib/softhsm/libsofthsm2.so";

/// Session configuration
#[derive(Clone)]
pub struct HsmConfig {
    /// Path to the PKCS#11 library
    pub library_path: String,

    /// Slot ID to use
    pub slot_id: Option<u64>,

    /// Token label to use when no slot ID is given
    pub token_label: Option<String>,

    /// User PIN for authentication
    pub user_pin: Option<SecureBytes>,
}

impl fmt::Debug for HsmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HsmConfig")
            .field("library_path", &self.library_path)
            .field("slot_id", &self.slot_id)
            .field("token_label", &self.token_label)
            .field("user_pin", &"[REDACTED]")
            .finish()
    }
}

impl HsmConfig {
    /// Read `PKCS11_LIBRARY`, `PKCS11_SLOT`, `PKCS11_TOKEN_LABEL` and
    /// `PKCS11_PIN` from the process environment
    pub fn from_env() -> HsmResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> HsmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let slot_id = match non_empty("PKCS11_SLOT") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
                HsmError::configuration_error(
                    "PKCS11_SLOT",
                    &format!("'{}' is not a valid slot id: {}", raw, e),
                    error_codes::INVALID_SESSION_CONFIG,
                )
            })?),
            None => None,
        };

        Ok(Self {
            library_path: non_empty("PKCS11_LIBRARY")
                .unwrap_or_else(|| DEFAULT_LIBRARY_PATH.to_string()),
            slot_id,
            token_label: non_empty("PKCS11_TOKEN_LABEL"),
            user_pin: non_empty("PKCS11_PIN").map(|pin| SecureBytes::from(pin.into_bytes())),
        })
    }
}

/// An open session on a PKCS#11 token
pub struct Pkcs11Device {
    context: Pkcs11,
    session: Option<Session>,
    is_logged_in: bool,
    manufacturer_id: String,
    slot: Slot,
}

fn session_error(operation: &str, cause: &str) -> HsmError {
    HsmError::device_error(operation, cause, error_codes::SESSION_FAILED)
}

/// Connect to a token: load the library, pick a slot and open a R/W session
///
/// The slot is chosen by `slot_id`, else by `token_label`, else the first
/// slot holding a token. The session is not logged in.
pub fn connect_hsm(config: &HsmConfig) -> HsmResult<Pkcs11Device> {
    if !Path::new(&config.library_path).exists() {
        return Err(HsmError::configuration_error(
            "library_path",
            &format!("PKCS#11 library not found: {}", config.library_path),
            error_codes::INVALID_SESSION_CONFIG,
        ));
    }

    log::info!("Initializing PKCS#11 library: {}", config.library_path);

    let context = Pkcs11::new(&config.library_path).map_err(|e| {
        session_error("connect_hsm", &format!("Failed to load PKCS#11 library: {}", e))
    })?;

    context.initialize(CInitializeArgs::OsThreads).map_err(|e| {
        session_error(
            "connect_hsm",
            &format!("Failed to initialize PKCS#11 library: {}", e),
        )
    })?;

    let manufacturer_id = context
        .get_library_info()
        .map_err(|e| session_error("connect_hsm", &format!("Failed to read library info: {}", e)))?
        .manufacturer_id()
        .trim()
        .to_string();

    let slots = context
        .get_slots_with_token()
        .map_err(|e| session_error("connect_hsm", &format!("Failed to get slots: {}", e)))?;

    let slot = if let Some(slot_id) = config.slot_id {
        slots
            .into_iter()
            .find(|s| s.id() == slot_id)
            .ok_or_else(|| session_error("connect_hsm", &format!("Slot {} not found", slot_id)))?
    } else if let Some(ref token_label) = config.token_label {
        slots
            .into_iter()
            .find(|slot| {
                context
                    .get_token_info(*slot)
                    .map(|info| info.label().trim() == token_label.trim())
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                session_error(
                    "connect_hsm",
                    &format!("Token with label '{}' not found", token_label),
                )
            })?
    } else {
        slots
            .into_iter()
            .next()
            .ok_or_else(|| session_error("connect_hsm", "No slots with tokens found"))?
    };

    log::info!("Using slot {:?} (manufacturer '{}')", slot.id(), manufacturer_id);

    let session = context
        .open_rw_session(slot)
        .map_err(|e| session_error("connect_hsm", &format!("Failed to open session: {}", e)))?;

    Ok(Pkcs11Device {
        context,
        session: Some(session),
        is_logged_in: false,
        manufacturer_id,
        slot,
    })
}

impl Pkcs11Device {
    /// Connect and, when the configuration carries a PIN, log in
    pub fn open(config: &HsmConfig) -> HsmResult<Self> {
        let mut device = connect_hsm(config)?;
        if let Some(pin) = &config.user_pin {
            device.login(pin.as_bytes())?;
        }
        Ok(device)
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }

    /// Log in as the normal user; a no-op when already logged in
    pub fn login(&mut self, pin: &[u8]) -> HsmResult<()> {
        if self.is_logged_in {
            return Ok(());
        }
        if pin.is_empty() {
            return Err(HsmError::validation_error(
                "login",
                "empty PIN",
                error_codes::INVALID_PIN,
            ));
        }

        let session = self.session("login")?;

        log::info!("Logging in to HSM");
        let auth_pin = AuthPin::new(String::from_utf8_lossy(pin).into_owned());
        session
            .login(UserType::User, Some(&auth_pin))
            .map_err(|e| session_error("login", &format!("Failed to login to HSM: {}", e)))?;

        self.is_logged_in = true;
        Ok(())
    }

    pub fn logout(&mut self) -> HsmResult<()> {
        if !self.is_logged_in {
            return Ok(());
        }

        log::info!("Logging out from HSM");
        self.session("logout")?
            .logout()
            .map_err(|e| session_error("logout", &format!("Failed to logout from HSM: {}", e)))?;

        self.is_logged_in = false;
        Ok(())
    }

    /// Log out, close the session and finalize the library
    pub fn close(mut self) -> HsmResult<()> {
        self.logout()?;
        // Dropping the session closes it; dropping the context finalizes
        drop(self.session.take());
        drop(self.context);
        log::info!("Closed PKCS#11 session");
        Ok(())
    }

    fn session(&self, operation: &str) -> HsmResult<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| session_error(operation, "No active session"))
    }
}

impl fmt::Debug for Pkcs11Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkcs11Device")
            .field("manufacturer_id", &self.manufacturer_id)
            .field("slot", &self.slot.id())
            .field("is_logged_in", &self.is_logged_in)
            .finish()
    }
}

impl Device for Pkcs11Device {
    type Handle = ObjectHandle;

    fn manufacturer_id(&self) -> HsmResult<String> {
        Ok(self.manufacturer_id.clone())
    }

    fn generate_key(&self, mechanism: &Mechanism, template: &AttributeSet) -> HsmResult<ObjectHandle> {
        let session = self.session("C_GenerateKey")?;
        let ck_template = to_cryptoki_template(template);
        log::debug!("C_GenerateKey {} {}", mechanism, template);

        let (handle, _) = with_cryptoki_mechanism(
            mechanism,
            "C_GenerateKey",
            error_codes::KEY_GENERATION_FAILED,
            |ck_mechanism| session.generate_key(ck_mechanism, &ck_template),
        )?;
        Ok(handle)
    }

    fn create_object(&self, template: &AttributeSet) -> HsmResult<ObjectHandle> {
        let session = self.session("C_CreateObject")?;
        let mut ck_template = to_cryptoki_template(template);
        log::debug!("C_CreateObject {}", template);

        let result = session.create_object(&ck_template);
        for attribute in ck_template.iter_mut() {
            if let CkAttribute::Value(bytes) = attribute {
                bytes.zeroize();
            }
        }
        result.map_err(|e| {
            HsmError::device_failure("C_CreateObject", error_codes::OBJECT_CREATION_FAILED, e)
        })
    }

    fn encrypt(&self, mechanism: &mut Mechanism, key: ObjectHandle, data: &[u8]) -> HsmResult<Vec<u8>> {
        let session = self.session("C_Encrypt")?;
        let (output, reported_iv) = with_cryptoki_mechanism(
            mechanism,
            "C_Encrypt",
            error_codes::ENCRYPTION_FAILED,
            |ck_mechanism| session.encrypt(ck_mechanism, key, data),
        )?;

        if let (Some(params), Some(iv)) = (mechanism.gcm_parameters_mut(), reported_iv) {
            params.set_iv(&iv);
        }
        Ok(output)
    }

    fn decrypt(&self, mechanism: &Mechanism, key: ObjectHandle, data: &[u8]) -> HsmResult<Vec<u8>> {
        let session = self.session("C_Decrypt")?;
        let (output, _) = with_cryptoki_mechanism(
            mechanism,
            "C_Decrypt",
            error_codes::DECRYPTION_FAILED,
            |ck_mechanism| session.decrypt(ck_mechanism, key, data),
        )?;
        Ok(output)
    }

    fn sign(&self, mechanism: &Mechanism, key: ObjectHandle, data: &[u8]) -> HsmResult<Vec<u8>> {
        let session = self.session("C_Sign")?;
        let (mac, _) = with_cryptoki_mechanism(
            mechanism,
            "C_Sign",
            error_codes::SIGNING_FAILED,
            |ck_mechanism| session.sign(ck_mechanism, key, data),
        )?;
        Ok(mac)
    }
}

/// Inputs of a CK_GCM_PARAMS block. The IV buffer is handed to the token
/// mutably and holds whatever IV the token wrote back after the call.
struct GcmBlock {
    iv: Vec<u8>,
    aad: Vec<u8>,
    tag_bits: Ulong,
}

impl GcmBlock {
    fn from_parameters(params: &GcmParameters) -> Self {
        Self {
            iv: params.iv().to_vec(),
            aad: params.aad().to_vec(),
            tag_bits: Ulong::from(params.tag_bits()),
        }
    }
}

/// Build the cryptoki mechanism for `mechanism` and run `call` with it
///
/// For CKM_AES_GCM the parameter block lives only for the duration of the
/// call, and the IV buffer as left by the token is returned alongside the
/// result.
fn with_cryptoki_mechanism<R, F>(
    mechanism: &Mechanism,
    operation: &str,
    error_code: u32,
    call: F,
) -> HsmResult<(R, Option<Vec<u8>>)>
where
    F: FnOnce(&CkMechanism<'_>) -> cryptoki::error::Result<R>,
{
    let failure = |e: cryptoki::error::Error| HsmError::device_failure(operation, error_code, e);

    match mechanism {
        Mechanism::AesGcm(params) => {
            let mut block = GcmBlock::from_parameters(params);
            let result = {
                let gcm = GcmParams::new(&mut block.iv, &block.aad, block.tag_bits).map_err(failure)?;
                call(&CkMechanism::AesGcm(gcm)).map_err(failure)?
            };
            Ok((result, Some(block.iv)))
        }
        other => {
            let ck_mechanism = to_cryptoki_mechanism(other)?;
            Ok((call(&ck_mechanism).map_err(failure)?, None))
        }
    }
}

/// Mechanisms that carry no parameter block
fn to_cryptoki_mechanism(mechanism: &Mechanism) -> HsmResult<CkMechanism<'static>> {
    let ck_mechanism = match mechanism {
        Mechanism::AesKeyGen => CkMechanism::AesKeyGen,
        Mechanism::Des3KeyGen => CkMechanism::Des3KeyGen,
        Mechanism::GenericSecretKeyGen => CkMechanism::GenericSecretKeyGen,
        Mechanism::NcSha256HmacKeyGen | Mechanism::NcSha384HmacKeyGen => {
            // The nCipher codes already carry the CKM_VENDOR_DEFINED bit
            let mechanism_type = MechanismType::new_vendor_defined(mechanism.code())
                .map_err(|e| HsmError::device_failure(mechanism.name(), error_codes::SESSION_FAILED, e))?;
            CkMechanism::VendorDefined(VendorDefinedMechanism::new::<()>(mechanism_type, None))
        }
        Mechanism::Sha384Hmac => CkMechanism::Sha384Hmac,
        Mechanism::AesGcm(_) => {
            return Err(HsmError::device_error(
                mechanism.name(),
                "CKM_AES_GCM requires a parameter block",
                error_codes::SESSION_FAILED,
            ))
        }
    };
    Ok(ck_mechanism)
}

fn to_cryptoki_key_type(marker: KeyTypeMarker) -> CkKeyType {
    match marker {
        KeyTypeMarker::GenericSecret => CkKeyType::GENERIC_SECRET,
        KeyTypeMarker::Des3 => CkKeyType::DES3,
        KeyTypeMarker::Aes => CkKeyType::AES,
        KeyTypeMarker::Sha256Hmac => CkKeyType::SHA256_HMAC,
        KeyTypeMarker::Sha384Hmac => CkKeyType::SHA384_HMAC,
    }
}

fn to_cryptoki_template(template: &AttributeSet) -> Vec<CkAttribute> {
    template
        .iter()
        .map(|attribute| match attribute {
            Attribute::Label(label) => CkAttribute::Label(label.as_bytes().to_vec()),
            Attribute::Token(v) => CkAttribute::Token(*v),
            Attribute::Sign(v) => CkAttribute::Sign(*v),
            Attribute::Encrypt(v) => CkAttribute::Encrypt(*v),
            Attribute::Decrypt(v) => CkAttribute::Decrypt(*v),
            Attribute::Sensitive(v) => CkAttribute::Sensitive(*v),
            Attribute::Private(v) => CkAttribute::Private(*v),
            Attribute::Wrap(v) => CkAttribute::Wrap(*v),
            Attribute::Unwrap(v) => CkAttribute::Unwrap(*v),
            Attribute::ValueLen(len) => CkAttribute::ValueLen(Ulong::from(*len as u64)),
            Attribute::KeyType(marker) => CkAttribute::KeyType(to_cryptoki_key_type(*marker)),
            Attribute::Value(bytes) => CkAttribute::Value(bytes.to_vec()),
        })
        .collect()
}
