//! End-to-end vault behavior over a real database file.

use std::fs;

use tempfile::TempDir;

use gitvault::error::Error;
use gitvault::store::{SqliteStore, VaultStore};
use gitvault::vault::{CredentialVault, VaultStatus};

fn open_store(dir: &TempDir) -> SqliteStore {
    SqliteStore::open(&dir.path().join("vault.db")).unwrap()
}

/// Every byte the store wrote to disk, across the database and any
/// journal files.
fn disk_bytes(dir: &TempDir) -> Vec<u8> {
    let mut all = Vec::new();
    for entry in fs::read_dir(dir.path()).unwrap() {
        let path = entry.unwrap().path();
        if path.is_file() {
            all.extend(fs::read(&path).unwrap());
        }
    }
    all
}

#[test]
fn test_weak_mode_roundtrip_without_password() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let mut vault = CredentialVault::new(&mut store);

    assert_eq!(vault.status().unwrap(), VaultStatus::Uninitialized);
    assert!(vault.unlock(None).unwrap().is_none());

    vault
        .store_token(None, "ghp_weakmode", Some("ci token"), Some("repo"))
        .unwrap();
    assert_eq!(vault.status().unwrap(), VaultStatus::NoPassword);

    let unlocked = vault.unlock(None).unwrap().unwrap();
    assert_eq!(unlocked.token.as_str(), "ghp_weakmode");
    assert_eq!(unlocked.label.as_deref(), Some("ci token"));
    assert_eq!(unlocked.scopes.as_deref(), Some("repo"));
}

#[test]
fn test_token_is_not_stored_in_cleartext() {
    let dir = TempDir::new().unwrap();
    let token = "ghp_supersecretvalue1234567890";
    {
        let mut store = open_store(&dir);
        let mut vault = CredentialVault::new(&mut store);
        vault.store_token(None, token, None, None).unwrap();
    }

    let raw = disk_bytes(&dir);
    let needle = token.as_bytes();
    assert!(
        !raw.windows(needle.len()).any(|window| window == needle),
        "token appears in cleartext on disk"
    );
}

#[test]
fn test_vault_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open_store(&dir);
        let mut vault = CredentialVault::new(&mut store);
        vault.store_token(None, "ghp_persist", None, None).unwrap();
        vault.initialize(Some("hunter2")).unwrap();
    }

    let mut store = open_store(&dir);
    let vault = CredentialVault::new(&mut store);
    assert_eq!(vault.status().unwrap(), VaultStatus::PasswordSet);
    let unlocked = vault.unlock(Some("hunter2")).unwrap().unwrap();
    assert_eq!(unlocked.token.as_str(), "ghp_persist");
}

#[test]
fn test_password_gates_unlock() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let mut vault = CredentialVault::new(&mut store);

    vault.store_token(None, "ghp_gated", None, None).unwrap();
    vault.initialize(Some("hunter2")).unwrap();
    assert_eq!(vault.status().unwrap(), VaultStatus::PasswordSet);

    // The weak-mode path is closed once a password exists.
    assert!(matches!(vault.unlock(None), Err(Error::InvalidPassword)));
    // A wrong password is rejected by the verifier, not by decryption.
    assert!(matches!(
        vault.unlock(Some("wrong")),
        Err(Error::InvalidPassword)
    ));
    // The weak-mode passphrase itself must not work as a password.
    assert!(matches!(
        vault.unlock(Some(gitvault::vault::WEAK_MODE_PASSPHRASE)),
        Err(Error::InvalidPassword)
    ));

    let unlocked = vault.unlock(Some("hunter2")).unwrap().unwrap();
    assert_eq!(unlocked.token.as_str(), "ghp_gated");
}

#[test]
fn test_initialize_twice_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let mut vault = CredentialVault::new(&mut store);

    vault.initialize(Some("first")).unwrap();
    assert!(matches!(
        vault.initialize(Some("second")),
        Err(Error::PasswordAlreadySet)
    ));
    // Skipping password creation is always a no-op.
    vault.initialize(None).unwrap();
    assert_eq!(vault.status().unwrap(), VaultStatus::PasswordSet);
}

#[test]
fn test_change_password_reencrypts_credential() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let mut vault = CredentialVault::new(&mut store);

    vault.store_token(None, "ghp_rotate", None, None).unwrap();
    vault.initialize(Some("old-password")).unwrap();

    // A wrong old password changes nothing.
    assert!(matches!(
        vault.change_password(Some("nope"), "new-password"),
        Err(Error::InvalidPassword)
    ));
    let unlocked = vault.unlock(Some("old-password")).unwrap().unwrap();
    assert_eq!(unlocked.token.as_str(), "ghp_rotate");

    vault
        .change_password(Some("old-password"), "new-password")
        .unwrap();
    assert!(matches!(
        vault.unlock(Some("old-password")),
        Err(Error::InvalidPassword)
    ));
    let unlocked = vault.unlock(Some("new-password")).unwrap().unwrap();
    assert_eq!(unlocked.token.as_str(), "ghp_rotate");
}

#[test]
fn test_delete_password_removes_token_too() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let mut vault = CredentialVault::new(&mut store);

    vault.store_token(None, "ghp_doomed", None, None).unwrap();
    vault.initialize(Some("pw")).unwrap();

    assert!(matches!(
        vault.delete_password("wrong"),
        Err(Error::InvalidPassword)
    ));
    assert_eq!(vault.status().unwrap(), VaultStatus::PasswordSet);

    vault.delete_password("pw").unwrap();
    // Dropping the password without the token would silently downgrade the
    // credential to weak mode, so both go.
    assert_eq!(vault.status().unwrap(), VaultStatus::Uninitialized);
    assert!(vault.unlock(None).unwrap().is_none());
}

#[test]
fn test_reset_clears_everything() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let mut vault = CredentialVault::new(&mut store);

    vault.store_token(None, "ghp_reset", None, None).unwrap();
    vault.initialize(Some("pw")).unwrap();

    vault.reset().unwrap();
    assert_eq!(vault.status().unwrap(), VaultStatus::Uninitialized);
    assert!(vault.unlock(None).unwrap().is_none());
}

#[test]
fn test_tampered_ciphertext_is_reported_as_corruption() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    {
        let mut vault = CredentialVault::new(&mut store);
        vault.store_token(None, "ghp_tamper", None, None).unwrap();
        vault.initialize(Some("pw")).unwrap();
    }

    let mut row = store.credential().unwrap().unwrap();
    row.ciphertext[0] ^= 0xff;
    store.put_credential(&row).unwrap();

    // The password verifies, so the failure is corruption, not a bad
    // password.
    let vault = CredentialVault::new(&mut store);
    match vault.unlock(Some("pw")) {
        Err(Error::VaultCorrupted(_)) => {}
        Err(other) => panic!("expected VaultCorrupted, got {other:?}"),
        Ok(_) => panic!("expected VaultCorrupted, got a successful unlock"),
    }
}
