//! Secure Memory Handling
//!
//! Imported key material and login PINs pass through the client on their way
//! into the token. They are held in [`SecureBytes`], which zeroes its buffer
//! when dropped and never prints its contents.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A byte container for sensitive data that is zeroed on drop.
///
/// # Example
///
/// ```
/// use symhsm::secure_memory::SecureBytes;
///
/// let key = SecureBytes::new(&[0x01, 0x02, 0x03, 0x04]);
/// assert_eq!(key.len(), 4);
/// assert_eq!(format!("{:?}", key), "SecureBytes([REDACTED; 4])");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes {
    bytes: Vec<u8>,
}

impl SecureBytes {
    /// Copy `data` into a new secure container
    pub fn new(data: &[u8]) -> Self {
        Self {
            bytes: data.to_vec(),
        }
    }

    /// Read-only access to the protected bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copy the bytes out into a plain vector.
    ///
    /// The copy is not zeroed on drop; callers handing bytes to a foreign
    /// API must wipe it themselves.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBytes([REDACTED; {}])", self.bytes.len())
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl From<&[u8]> for SecureBytes {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl AsRef<[u8]> for SecureBytes {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
