use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// PBKDF2-HMAC-SHA256 iteration count for newly written material.
///
/// Stored alongside each credential and verifier row, so existing rows keep
/// decrypting if this constant is raised later.
pub const KDF_ITERATIONS: u32 = 200_000;

/// Random salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Context label mixed into the salt when deriving the encryption key.
const KEY_CONTEXT: &[u8] = b"gitvault.key.v1";

/// Context label mixed into the salt when deriving the password verifier.
/// Distinct from `KEY_CONTEXT`, so verifier output can never double as the
/// encryption key even when both are derived from the same salt.
const VERIFIER_CONTEXT: &[u8] = b"gitvault.verifier.v1";

/// Generate a fresh random salt from the OS RNG.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive the symmetric encryption key for a password and salt.
///
/// Deterministic: the same password, salt and iteration count always produce
/// the same key. Never fails on well-formed input.
pub fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    derive(password, salt, iterations, KEY_CONTEXT)
}

/// Derive the password verifier value for a password and salt.
pub fn derive_verifier(password: &[u8], salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    derive(password, salt, iterations, VERIFIER_CONTEXT)
}

/// Constant-time check of a candidate password against a stored verifier.
pub fn verifier_matches(password: &[u8], salt: &[u8], iterations: u32, stored: &[u8]) -> bool {
    let computed = derive_verifier(password, salt, iterations);
    computed[..].ct_eq(stored).into()
}

fn derive(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    context: &[u8],
) -> Zeroizing<[u8; KEY_LEN]> {
    let mut salted = Vec::with_capacity(salt.len() + context.len());
    salted.extend_from_slice(salt);
    salted.extend_from_slice(context);

    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, &salted, iterations, &mut *out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low iteration count keeps the test suite fast; production writes use
    // KDF_ITERATIONS.
    const TEST_ITERS: u32 = 1_000;

    #[test]
    fn test_derivation_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_key(b"hunter2", &salt, TEST_ITERS);
        let b = derive_key(b"hunter2", &salt, TEST_ITERS);
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_different_salts_give_different_keys() {
        let a = derive_key(b"hunter2", &[1u8; SALT_LEN], TEST_ITERS);
        let b = derive_key(b"hunter2", &[2u8; SALT_LEN], TEST_ITERS);
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_different_iterations_give_different_keys() {
        let salt = [3u8; SALT_LEN];
        let a = derive_key(b"hunter2", &salt, TEST_ITERS);
        let b = derive_key(b"hunter2", &salt, TEST_ITERS + 1);
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_key_and_verifier_are_not_interchangeable() {
        let salt = [9u8; SALT_LEN];
        let key = derive_key(b"hunter2", &salt, TEST_ITERS);
        let verifier = derive_verifier(b"hunter2", &salt, TEST_ITERS);
        assert_ne!(*key, *verifier);
    }

    #[test]
    fn test_verifier_matches_correct_password() {
        let salt = generate_salt();
        let stored = derive_verifier(b"correct horse", &salt, TEST_ITERS);
        assert!(verifier_matches(b"correct horse", &salt, TEST_ITERS, &stored[..]));
        assert!(!verifier_matches(b"battery staple", &salt, TEST_ITERS, &stored[..]));
    }

    #[test]
    fn test_verifier_rejects_wrong_length() {
        let salt = generate_salt();
        assert!(!verifier_matches(b"pw", &salt, TEST_ITERS, &[0u8; 16]));
        assert!(!verifier_matches(b"pw", &salt, TEST_ITERS, &[]));
    }

    #[test]
    fn test_generated_salts_are_unique() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn test_iteration_constant_meets_minimum() {
        assert!(KDF_ITERATIONS >= 100_000);
    }
}
