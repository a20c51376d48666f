/*!
 * Token access
 *
 * The [`Device`] trait is the only way the key lifecycle, cipher and MAC
 * code reaches a token. Opening the session and logging in happen before a
 * device value exists; closing happens after it is no longer used.
 *
 * A device is one logical session. Implementations are not required to be
 * `Sync`, and nothing in this crate serializes concurrent calls: give each
 * thread its own session or route all calls through a single owner.
 */

use std::fmt;

use crate::error::HsmResult;
use crate::key_management::attributes::AttributeSet;
use crate::key_management::mechanism::Mechanism;

pub mod pkcs11;
pub mod soft_token;

pub use pkcs11::{connect_hsm, HsmConfig, Pkcs11Device};
pub use soft_token::{DeviceCall, DeviceOperation, SoftHandle, SoftToken};

/// Minimum token capability needed for symmetric key lifecycle, AES-GCM and
/// HMAC operations
pub trait Device {
    /// Opaque object handle issued by the token
    type Handle: Copy + Eq + fmt::Debug;

    /// Manufacturer identity reported by the token
    fn manufacturer_id(&self) -> HsmResult<String>;

    /// C_GenerateKey
    fn generate_key(&self, mechanism: &Mechanism, template: &AttributeSet)
        -> HsmResult<Self::Handle>;

    /// C_CreateObject
    fn create_object(&self, template: &AttributeSet) -> HsmResult<Self::Handle>;

    /// C_EncryptInit followed by single-part C_Encrypt
    ///
    /// A token that reports the IV it chose writes it back into the
    /// mechanism's GCM parameter block.
    fn encrypt(&self, mechanism: &mut Mechanism, key: Self::Handle, data: &[u8])
        -> HsmResult<Vec<u8>>;

    /// C_DecryptInit followed by single-part C_Decrypt
    fn decrypt(&self, mechanism: &Mechanism, key: Self::Handle, data: &[u8])
        -> HsmResult<Vec<u8>>;

    /// C_SignInit followed by single-part C_Sign
    fn sign(&self, mechanism: &Mechanism, key: Self::Handle, data: &[u8]) -> HsmResult<Vec<u8>>;
}

impl<D: Device + ?Sized> Device for &D {
    type Handle = D::Handle;

    fn manufacturer_id(&self) -> HsmResult<String> {
        (**self).manufacturer_id()
    }

    fn generate_key(
        &self,
        mechanism: &Mechanism,
        template: &AttributeSet,
    ) -> HsmResult<Self::Handle> {
        (**self).generate_key(mechanism, template)
    }

    fn create_object(&self, template: &AttributeSet) -> HsmResult<Self::Handle> {
        (**self).create_object(template)
    }

    fn encrypt(
        &self,
        mechanism: &mut Mechanism,
        key: Self::Handle,
        data: &[u8],
    ) -> HsmResult<Vec<u8>> {
        (**self).encrypt(mechanism, key, data)
    }

    fn decrypt(
        &self,
        mechanism: &Mechanism,
        key: Self::Handle,
        data: &[u8],
    ) -> HsmResult<Vec<u8>> {
        (**self).decrypt(mechanism, key, data)
    }

    fn sign(&self, mechanism: &Mechanism, key: Self::Handle, data: &[u8]) -> HsmResult<Vec<u8>> {
        (**self).sign(mechanism, key, data)
    }
}
