/*!
 * AES-GCM on the token
 *
 * This module drives CKM_AES_GCM on a device and handles the vendor's
 * ciphertext/IV framing so that encrypt and decrypt stay symmetric.
 */

mod gcm;

pub use gcm::*;

#[cfg(test)]
mod tests;
