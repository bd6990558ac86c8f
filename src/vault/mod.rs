pub mod cipher;
pub mod kdf;

use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::store::{CredentialRow, VaultStore, VerifierRow};

/// Fixed, non-secret passphrase used to encrypt the credential when no local
/// password is configured. Weak mode guards against casual file reads only:
/// anyone with this source code can decrypt a weak-mode credential. The CLI
/// must surface that whenever it applies.
pub const WEAK_MODE_PASSPHRASE: &str = "gitvault-no-password-v1";

/// Observable state of one installation's vault.
///
/// The state is derived from what is persisted, never stored separately:
/// a verifier row means a password is set; a credential row without a
/// verifier means weak mode; neither means uninitialized. The transient
/// "unlocked" condition is a decrypted token held in memory by the caller
/// for the duration of one CLI invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    /// Nothing persisted yet.
    Uninitialized,
    /// A credential is stored under the fixed weak-mode passphrase.
    NoPassword,
    /// A password verifier is stored; unlock requires the password.
    PasswordSet,
}

/// Decrypted token together with its cleartext metadata.
pub struct UnlockedToken {
    pub token: Zeroizing<String>,
    pub label: Option<String>,
    pub scopes: Option<String>,
}

/// Cleartext metadata readable without unlocking. Labels and scopes are not
/// secret.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub label: Option<String>,
    pub scopes: Option<String>,
}

/// Orchestrates key derivation and the credential cipher against persisted
/// storage.
///
/// Every operation that touches ciphertext verifies the password first (when
/// one is set) and only then derives a key and decrypts; cipher-level errors
/// never surface raw. Multi-value updates go through the store's atomic
/// replacement so a crash can never leave a half-written salt/verifier/
/// ciphertext mix.
pub struct CredentialVault<'a, S: VaultStore> {
    store: &'a mut S,
}

impl<'a, S: VaultStore> CredentialVault<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Current state of the vault.
    pub fn status(&self) -> Result<VaultStatus> {
        if self.store.verifier()?.is_some() {
            Ok(VaultStatus::PasswordSet)
        } else if self.store.credential()?.is_some() {
            Ok(VaultStatus::NoPassword)
        } else {
            Ok(VaultStatus::Uninitialized)
        }
    }

    /// Set up the vault.
    ///
    /// Without a password this is weak mode: nothing is persisted until a
    /// token is stored, and the fixed passphrase is used from then on. With a
    /// password, a fresh verifier is written; a credential already stored in
    /// weak mode is re-encrypted under the new password in the same atomic
    /// write. Fails with `PasswordAlreadySet` when a verifier already exists.
    pub fn initialize(&mut self, password: Option<&str>) -> Result<()> {
        let Some(new_password) = password else {
            return Ok(());
        };
        if self.store.verifier()?.is_some() {
            return Err(Error::PasswordAlreadySet);
        }
        self.rekey(None, new_password)
    }

    /// Return the decrypted token, or `None` when no credential is stored.
    ///
    /// With a password set, the verifier is checked first (constant-time) and
    /// a mismatch fails with `InvalidPassword` before any decryption is
    /// attempted. A credential that fails to decrypt after a successful
    /// verifier check is reported as `VaultCorrupted`.
    pub fn unlock(&self, password: Option<&str>) -> Result<Option<UnlockedToken>> {
        let secret = self.effective_secret(password)?;
        let Some(row) = self.store.credential()? else {
            return Ok(None);
        };
        let token = decrypt_credential(&secret, &row)?;
        Ok(Some(UnlockedToken {
            token,
            label: row.label,
            scopes: row.scopes,
        }))
    }

    /// Encrypt and persist a token, replacing any previous credential.
    ///
    /// Requires the password when one is set. A fresh salt and nonce are used
    /// for every write; the row is replaced in a single atomic statement.
    pub fn store_token(
        &mut self,
        password: Option<&str>,
        token: &str,
        label: Option<&str>,
        scopes: Option<&str>,
    ) -> Result<()> {
        let secret = self.effective_secret(password)?;
        let row = encrypt_credential(&secret, token, label, scopes)?;
        self.store.put_credential(&row)
    }

    /// Re-key the vault under a new password.
    ///
    /// With a verifier present, `old` must match it or the call fails with
    /// `InvalidPassword` before anything is touched. The stored credential
    /// (if any) is decrypted under the old key, re-encrypted under the new
    /// one, and the new salt, verifier, ciphertext and nonce are persisted as
    /// one atomic replacement: a failure at any point leaves the old,
    /// still-valid state intact. The token is not re-validated against the
    /// remote API; this is a purely local operation.
    pub fn change_password(&mut self, old: Option<&str>, new: &str) -> Result<()> {
        match self.store.verifier()? {
            Some(_) => {
                let old_password = old.ok_or(Error::InvalidPassword)?;
                self.verify_password(old_password)?;
                self.rekey(Some(old_password), new)
            }
            // No verifier yet: behaves as the initial password set, with any
            // weak-mode credential re-encrypted.
            None => self.rekey(None, new),
        }
    }

    /// Delete the stored credential, keeping the password verifier.
    pub fn delete_token(&mut self) -> Result<()> {
        self.store.clear_credential()
    }

    /// Remove the password, and with it the stored credential.
    ///
    /// Keeping the credential would silently downgrade it to weak-mode
    /// protection, so it is deleted instead and must be re-entered.
    pub fn delete_password(&mut self, password: &str) -> Result<()> {
        if self.store.verifier()?.is_none() {
            return Ok(());
        }
        self.verify_password(password)?;
        self.store.clear_all()
    }

    /// Delete credential and verifier unconditionally. Irreversible.
    /// Confirmation is the CLI's concern, not this component's.
    pub fn reset(&mut self) -> Result<()> {
        self.store.clear_all()
    }

    /// Cleartext label and scopes of the stored credential, without unlock.
    pub fn token_info(&self) -> Result<Option<TokenInfo>> {
        Ok(self.store.credential()?.map(|row| TokenInfo {
            label: row.label,
            scopes: row.scopes,
        }))
    }

    /// Check a password against the stored verifier without touching the
    /// credential.
    pub fn check_password(&self, password: &str) -> Result<()> {
        self.verify_password(password)
    }

    /// The secret that encrypts the credential in the current mode: the
    /// verified password when one is set, the weak-mode passphrase otherwise.
    fn effective_secret(&self, password: Option<&str>) -> Result<Zeroizing<String>> {
        match self.store.verifier()? {
            Some(_) => {
                let password = password.ok_or(Error::InvalidPassword)?;
                self.verify_password(password)?;
                Ok(Zeroizing::new(password.to_string()))
            }
            None => Ok(Zeroizing::new(WEAK_MODE_PASSPHRASE.to_string())),
        }
    }

    fn verify_password(&self, password: &str) -> Result<()> {
        let row = self.store.verifier()?.ok_or(Error::InvalidPassword)?;
        if row.salt.len() != kdf::SALT_LEN {
            return Err(Error::VaultCorrupted(
                "verifier salt has the wrong length".to_string(),
            ));
        }
        if kdf::verifier_matches(
            password.as_bytes(),
            &row.salt,
            row.kdf_iterations,
            &row.verifier,
        ) {
            Ok(())
        } else {
            Err(Error::InvalidPassword)
        }
    }

    fn rekey(&mut self, old: Option<&str>, new_password: &str) -> Result<()> {
        // Decrypt whatever is currently stored before writing anything.
        let existing = match self.store.credential()? {
            Some(row) => {
                let old_secret = Zeroizing::new(
                    old.unwrap_or(WEAK_MODE_PASSPHRASE).to_string(),
                );
                let token = decrypt_credential(&old_secret, &row)?;
                Some((token, row.label, row.scopes))
            }
            None => None,
        };

        let verifier_salt = kdf::generate_salt();
        let verifier = kdf::derive_verifier(
            new_password.as_bytes(),
            &verifier_salt,
            kdf::KDF_ITERATIONS,
        );
        let verifier_row = VerifierRow {
            verifier: verifier.to_vec(),
            salt: verifier_salt.to_vec(),
            kdf_iterations: kdf::KDF_ITERATIONS,
        };

        let new_secret = Zeroizing::new(new_password.to_string());
        let credential_row = match &existing {
            Some((token, label, scopes)) => Some(encrypt_credential(
                &new_secret,
                token.as_str(),
                label.as_deref(),
                scopes.as_deref(),
            )?),
            None => None,
        };

        self.store
            .replace_all(&verifier_row, credential_row.as_ref())
    }
}

fn encrypt_credential(
    secret: &Zeroizing<String>,
    token: &str,
    label: Option<&str>,
    scopes: Option<&str>,
) -> Result<CredentialRow> {
    let salt = kdf::generate_salt();
    let key = kdf::derive_key(secret.as_bytes(), &salt, kdf::KDF_ITERATIONS);
    let (ciphertext, nonce) = cipher::encrypt(&key, token.as_bytes())?;
    Ok(CredentialRow {
        ciphertext,
        nonce: nonce.to_vec(),
        salt: salt.to_vec(),
        kdf_iterations: kdf::KDF_ITERATIONS,
        label: label.map(str::to_string),
        scopes: scopes.map(str::to_string),
    })
}

fn decrypt_credential(
    secret: &Zeroizing<String>,
    row: &CredentialRow,
) -> Result<Zeroizing<String>> {
    if row.salt.len() != kdf::SALT_LEN {
        return Err(Error::VaultCorrupted(
            "credential salt has the wrong length".to_string(),
        ));
    }
    let nonce: [u8; cipher::NONCE_LEN] = row.nonce.as_slice().try_into().map_err(|_| {
        Error::VaultCorrupted("credential nonce has the wrong length".to_string())
    })?;

    let key = kdf::derive_key(secret.as_bytes(), &row.salt, row.kdf_iterations);
    // The password (or weak-mode passphrase) is already established at this
    // point, so an authentication failure means inconsistent stored data.
    let plaintext = cipher::decrypt(&key, &row.ciphertext, &nonce).map_err(|_| {
        Error::VaultCorrupted("credential cannot be decrypted with the verified password".to_string())
    })?;

    let token = String::from_utf8(plaintext.to_vec())
        .map_err(|_| Error::VaultCorrupted("decrypted credential is not valid UTF-8".to_string()))?;
    Ok(Zeroizing::new(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn memory_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_fresh_vault_is_uninitialized() {
        let mut store = memory_store();
        let vault = CredentialVault::new(&mut store);
        assert_eq!(vault.status().unwrap(), VaultStatus::Uninitialized);
        assert!(vault.unlock(None).unwrap().is_none());
    }

    #[test]
    fn test_initialize_with_password_transitions_to_password_set() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        assert_eq!(vault.status().unwrap(), VaultStatus::PasswordSet);
    }

    #[test]
    fn test_initialize_twice_with_password_is_rejected() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        assert!(matches!(
            vault.initialize(Some("pw2")),
            Err(Error::PasswordAlreadySet)
        ));
    }

    #[test]
    fn test_store_and_unlock_roundtrip() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        vault
            .store_token(Some("pw1"), "ghp_abc123", Some("work"), Some("repo"))
            .unwrap();

        let unlocked = vault.unlock(Some("pw1")).unwrap().unwrap();
        assert_eq!(unlocked.token.as_str(), "ghp_abc123");
        assert_eq!(unlocked.label.as_deref(), Some("work"));
        assert_eq!(unlocked.scopes.as_deref(), Some("repo"));
    }

    #[test]
    fn test_wrong_password_fails_before_any_decryption() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        vault
            .store_token(Some("pw1"), "ghp_abc123", None, None)
            .unwrap();

        // Corrupt the ciphertext: if unlock ever attempted decryption with
        // the wrong password it would report VaultCorrupted, not
        // InvalidPassword.
        let mut row = store.credential().unwrap().unwrap();
        row.ciphertext = vec![0u8; row.ciphertext.len()];
        store.put_credential(&row).unwrap();

        let vault = CredentialVault::new(&mut store);
        assert!(matches!(
            vault.unlock(Some("wrong")),
            Err(Error::InvalidPassword)
        ));
    }

    #[test]
    fn test_missing_password_is_invalid_when_password_set() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        assert!(matches!(vault.unlock(None), Err(Error::InvalidPassword)));
    }

    #[test]
    fn test_weak_mode_roundtrip_without_password() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(None).unwrap();
        vault
            .store_token(None, "ghp_weak", Some("personal"), None)
            .unwrap();

        assert_eq!(vault.status().unwrap(), VaultStatus::NoPassword);
        let unlocked = vault.unlock(None).unwrap().unwrap();
        assert_eq!(unlocked.token.as_str(), "ghp_weak");
    }

    #[test]
    fn test_change_password_preserves_token() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        vault
            .store_token(Some("pw1"), "ghp_abc123", Some("work"), None)
            .unwrap();

        vault.change_password(Some("pw1"), "pw2").unwrap();

        let unlocked = vault.unlock(Some("pw2")).unwrap().unwrap();
        assert_eq!(unlocked.token.as_str(), "ghp_abc123");
        assert_eq!(unlocked.label.as_deref(), Some("work"));
        assert!(matches!(
            vault.unlock(Some("pw1")),
            Err(Error::InvalidPassword)
        ));
    }

    #[test]
    fn test_change_password_with_wrong_old_changes_nothing() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        vault
            .store_token(Some("pw1"), "ghp_abc123", None, None)
            .unwrap();

        assert!(matches!(
            vault.change_password(Some("nope"), "pw2"),
            Err(Error::InvalidPassword)
        ));
        let unlocked = vault.unlock(Some("pw1")).unwrap().unwrap();
        assert_eq!(unlocked.token.as_str(), "ghp_abc123");
    }

    #[test]
    fn test_change_password_from_weak_mode_reencrypts() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault
            .store_token(None, "ghp_weak", Some("personal"), None)
            .unwrap();
        assert_eq!(vault.status().unwrap(), VaultStatus::NoPassword);

        vault.change_password(None, "pw1").unwrap();
        assert_eq!(vault.status().unwrap(), VaultStatus::PasswordSet);

        // Old weak-mode access no longer works, the password does.
        assert!(matches!(vault.unlock(None), Err(Error::InvalidPassword)));
        let unlocked = vault.unlock(Some("pw1")).unwrap().unwrap();
        assert_eq!(unlocked.token.as_str(), "ghp_weak");
        assert_eq!(unlocked.label.as_deref(), Some("personal"));
    }

    #[test]
    fn test_store_token_generates_fresh_salt_and_nonce() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();

        vault.store_token(Some("pw1"), "tok", None, None).unwrap();
        let first = store.credential().unwrap().unwrap();

        let mut vault = CredentialVault::new(&mut store);
        vault.store_token(Some("pw1"), "tok", None, None).unwrap();
        let second = store.credential().unwrap().unwrap();

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_delete_token_keeps_password() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        vault.store_token(Some("pw1"), "tok", None, None).unwrap();

        vault.delete_token().unwrap();
        assert_eq!(vault.status().unwrap(), VaultStatus::PasswordSet);
        assert!(vault.unlock(Some("pw1")).unwrap().is_none());
    }

    #[test]
    fn test_delete_password_also_deletes_credential() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        vault.store_token(Some("pw1"), "tok", None, None).unwrap();

        vault.delete_password("pw1").unwrap();
        assert_eq!(vault.status().unwrap(), VaultStatus::Uninitialized);
    }

    #[test]
    fn test_delete_password_requires_correct_password() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();

        assert!(matches!(
            vault.delete_password("wrong"),
            Err(Error::InvalidPassword)
        ));
        assert_eq!(vault.status().unwrap(), VaultStatus::PasswordSet);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        vault.store_token(Some("pw1"), "tok", None, None).unwrap();

        vault.reset().unwrap();
        assert_eq!(vault.status().unwrap(), VaultStatus::Uninitialized);
        assert!(vault.unlock(None).unwrap().is_none());
    }

    #[test]
    fn test_token_info_readable_without_unlock() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        vault
            .store_token(Some("pw1"), "tok", Some("ci token"), Some("repo,user"))
            .unwrap();

        let info = vault.token_info().unwrap().unwrap();
        assert_eq!(info.label.as_deref(), Some("ci token"));
        assert_eq!(info.scopes.as_deref(), Some("repo,user"));
    }

    #[test]
    fn test_truncated_nonce_reports_corruption() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        vault.store_token(Some("pw1"), "tok", None, None).unwrap();

        let mut row = store.credential().unwrap().unwrap();
        row.nonce.truncate(4);
        store.put_credential(&row).unwrap();

        let vault = CredentialVault::new(&mut store);
        assert!(matches!(
            vault.unlock(Some("pw1")),
            Err(Error::VaultCorrupted(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_reports_corruption_after_verifier_success() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        vault.store_token(Some("pw1"), "tok", None, None).unwrap();

        let mut row = store.credential().unwrap().unwrap();
        row.ciphertext[0] ^= 0xff;
        store.put_credential(&row).unwrap();

        let vault = CredentialVault::new(&mut store);
        assert!(matches!(
            vault.unlock(Some("pw1")),
            Err(Error::VaultCorrupted(_))
        ));
    }

    /// Store wrapper that fails on atomic replacement, simulating a crash
    /// mid change-password.
    struct FailingStore<S: VaultStore> {
        inner: S,
    }

    impl<S: VaultStore> VaultStore for FailingStore<S> {
        fn credential(&self) -> crate::error::Result<Option<CredentialRow>> {
            self.inner.credential()
        }
        fn verifier(&self) -> crate::error::Result<Option<crate::store::VerifierRow>> {
            self.inner.verifier()
        }
        fn put_credential(&mut self, row: &CredentialRow) -> crate::error::Result<()> {
            self.inner.put_credential(row)
        }
        fn put_verifier(&mut self, row: &crate::store::VerifierRow) -> crate::error::Result<()> {
            self.inner.put_verifier(row)
        }
        fn replace_all(
            &mut self,
            _verifier: &crate::store::VerifierRow,
            _credential: Option<&CredentialRow>,
        ) -> crate::error::Result<()> {
            Err(Error::Unknown("injected write failure".to_string()))
        }
        fn clear_credential(&mut self) -> crate::error::Result<()> {
            self.inner.clear_credential()
        }
        fn clear_all(&mut self) -> crate::error::Result<()> {
            self.inner.clear_all()
        }
    }

    #[test]
    fn test_failed_change_password_leaves_old_state_usable() {
        let mut store = memory_store();
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some("pw1")).unwrap();
        vault
            .store_token(Some("pw1"), "ghp_abc123", None, None)
            .unwrap();

        let mut failing = FailingStore { inner: store };
        let mut vault = CredentialVault::new(&mut failing);
        assert!(vault.change_password(Some("pw1"), "pw2").is_err());

        // Old password still unlocks the original token; the new one never
        // works, not even partially.
        let vault = CredentialVault::new(&mut failing);
        let unlocked = vault.unlock(Some("pw1")).unwrap().unwrap();
        assert_eq!(unlocked.token.as_str(), "ghp_abc123");
        assert!(matches!(
            vault.unlock(Some("pw2")),
            Err(Error::InvalidPassword)
        ));
    }
}
