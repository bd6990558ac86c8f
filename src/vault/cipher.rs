use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use zeroize::Zeroizing;

use super::kdf::KEY_LEN;
use crate::error::{Error, Result};

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Encrypt a secret under the given key.
///
/// A fresh random nonce is drawn from the OS RNG inside this function on
/// every call; callers cannot supply one, so nonce reuse under a key is
/// structurally impossible.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN])> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| Error::AuthenticationFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&nonce);
    Ok((ciphertext, nonce_bytes))
}

/// Decrypt a secret.
///
/// Fails with `AuthenticationFailed` when the authentication tag does not
/// match: wrong key, corrupted data, or tampering are indistinguishable here.
/// The wrong-password case is ruled out one level up by the verifier check.
pub fn decrypt(
    key: &[u8; KEY_LEN],
    ciphertext: &[u8],
    nonce: &[u8; NONCE_LEN],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::AuthenticationFailed)?;
    Ok(Zeroizing::new(plaintext))
}
