//! Command handler modules
//!
//! One module per command group, organized by functionality area. Shared
//! plumbing (store access, vault unlock, confirmation prompts, history
//! recording) lives here.

pub mod content;
pub mod history;
pub mod repos;
pub mod settings;

// Re-export all public handler functions for convenient use
pub use content::{
    handle_apply_template, handle_delete_file, handle_delete_folder, handle_list, handle_rename,
    handle_upload, handle_visibility,
};
pub use history::handle_history;
pub use repos::{handle_create_repo, handle_delete_repo, handle_list_repos};
pub use settings::{
    handle_change_password, handle_create_password, handle_delete_password, handle_delete_token,
    handle_reset, handle_set_token, handle_show_token,
};

use anyhow::{bail, Context, Result};
use colored::Colorize;
use log::warn;
use zeroize::Zeroizing;

use crate::config::{AppConfig, ConfigManager};
use crate::error::Error;
use crate::github::GitHubTransport;
use crate::history::{ActionKind, ActionRecord};
use crate::store::{SqliteStore, VaultStore};
use crate::vault::{CredentialVault, VaultStatus};

const MAX_PASSWORD_ATTEMPTS: usize = 3;

/// Open the vault store in the config directory, creating the directory on
/// first use.
pub(crate) fn open_store() -> Result<SqliteStore> {
    ConfigManager::ensure_config_dir()?;
    let path = ConfigManager::vault_db_path()?;
    SqliteStore::open(&path)
        .with_context(|| format!("Failed to open vault store at {}", path.display()))
}

pub(crate) fn transport(config: &AppConfig, token: Option<&str>) -> Result<GitHubTransport> {
    let api = GitHubTransport::new(&config.api_base, config.request_timeout_secs, token)?;
    Ok(api)
}

/// Decrypted token and its cleartext metadata, held for one invocation.
pub(crate) struct Session {
    pub token: Zeroizing<String>,
    pub label: Option<String>,
    pub scopes: Option<String>,
}

/// Unlock the vault, prompting for the password when one is set.
///
/// Up to three attempts; weak mode skips the prompt but is called out so
/// the degraded protection is never silent.
pub(crate) fn open_session(store: &mut SqliteStore) -> Result<Session> {
    let vault = CredentialVault::new(store);
    let unlocked = match vault.status()? {
        VaultStatus::Uninitialized => None,
        VaultStatus::NoPassword => {
            println!(
                "{}",
                "Note: the token is stored without a password (weak mode).".yellow()
            );
            vault.unlock(None)?
        }
        VaultStatus::PasswordSet => {
            let password = prompt_verified_password(&vault, "Vault password:")?;
            vault.unlock(Some(&password))?
        }
    };

    let unlocked = unlocked.ok_or_else(|| {
        anyhow::anyhow!("No token stored. Run 'gitvault settings set-token' first.")
    })?;
    Ok(Session {
        token: unlocked.token,
        label: unlocked.label,
        scopes: unlocked.scopes,
    })
}

/// Open the store, unlock it, and build an authenticated transport in one
/// step, for handlers that talk to the API.
pub(crate) fn remote_context() -> Result<(SqliteStore, GitHubTransport)> {
    let config = AppConfig::load()?;
    let mut store = open_store()?;
    let session = open_session(&mut store)?;
    let api = transport(&config, Some(&session.token))?;
    Ok((store, api))
}

/// Prompt for the vault password until it verifies, up to the attempt
/// limit. Verification only compares the verifier; the credential is not
/// touched.
pub(crate) fn prompt_verified_password<S: VaultStore>(
    vault: &CredentialVault<'_, S>,
    prompt: &str,
) -> Result<Zeroizing<String>> {
    ensure_interactive("the vault password")?;
    for attempt in 1..=MAX_PASSWORD_ATTEMPTS {
        let password = Zeroizing::new(
            inquire::Password::new(prompt)
                .without_confirmation()
                .prompt()
                .context("Password prompt was cancelled")?,
        );
        match vault.check_password(&password) {
            Ok(()) => return Ok(password),
            Err(Error::InvalidPassword) if attempt < MAX_PASSWORD_ATTEMPTS => {
                println!(
                    "{}",
                    format!("Invalid password (attempt {attempt}/{MAX_PASSWORD_ATTEMPTS}).").red()
                );
            }
            Err(Error::InvalidPassword) => break,
            Err(other) => return Err(other.into()),
        }
    }
    bail!("Too many incorrect password attempts.")
}

pub(crate) fn ensure_interactive(what: &str) -> Result<()> {
    if !atty::is(atty::Stream::Stdin) {
        bail!("Cannot prompt for {what}: no interactive terminal.");
    }
    Ok(())
}

/// Ask the user to confirm a destructive action. `--yes` skips the prompt
/// for scripting.
pub(crate) fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    ensure_interactive("confirmation")?;
    let confirmed = inquire::Confirm::new(question)
        .with_default(false)
        .prompt()
        .context("Confirmation prompt was cancelled")?;
    Ok(confirmed)
}

/// Append a history record; a failed append is logged, never fatal.
pub(crate) fn record(store: &mut SqliteStore, entry: ActionRecord) {
    if let Err(err) = store.append_history(&entry) {
        warn!("could not append history record: {err}");
    }
}

/// Record the outcome of one user-level action.
pub(crate) fn record_result<T>(
    store: &mut SqliteStore,
    action: ActionKind,
    target: &str,
    result: &crate::error::Result<T>,
) {
    let entry = match result {
        Ok(_) => ActionRecord::success(action, target),
        Err(err) => ActionRecord::failure(action, target, error_detail(err)),
    };
    record(store, entry);
}

/// The history/log form of an error: the display message plus any raw
/// payload the display deliberately omits.
pub(crate) fn error_detail(err: &Error) -> String {
    match err.detail() {
        Some(raw) => format!("{err}: {raw}"),
        None => err.to_string(),
    }
}
