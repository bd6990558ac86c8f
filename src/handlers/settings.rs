//! Vault settings handlers
//!
//! Token storage and password lifecycle: set/show/delete token,
//! create/change/delete password, and full reset.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::{Password, Text};
use zeroize::Zeroizing;

use crate::config::AppConfig;
use crate::github::ContentApi;
use crate::history::{ActionKind, ActionRecord};
use crate::vault::{CredentialVault, VaultStatus};

use super::{
    confirm, ensure_interactive, error_detail, open_session, open_store, prompt_verified_password,
    record, record_result, transport,
};

/// Prompt for a token, validate it against the API, and store it encrypted.
///
/// Nothing is persisted until the token has answered a live `GET /user`;
/// a mistyped token never reaches the vault.
pub fn handle_set_token() -> Result<()> {
    let config = AppConfig::load()?;
    let mut store = open_store()?;
    ensure_interactive("the token")?;

    let (password, protected) = {
        let vault = CredentialVault::new(&mut store);
        match vault.status()? {
            VaultStatus::PasswordSet => (
                Some(prompt_verified_password(&vault, "Vault password:")?),
                true,
            ),
            _ => (None, false),
        }
    };

    let token = Zeroizing::new(
        Password::new("GitHub personal access token:")
            .without_confirmation()
            .prompt()
            .context("Token prompt was cancelled")?,
    );
    if token.trim().is_empty() {
        bail!("Token cannot be empty.");
    }
    let label = Text::new("Label (optional):")
        .with_help_message("A note to remind you which token this is")
        .prompt()
        .context("Label prompt was cancelled")?;
    let label = {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    };

    // Validate against the API before anything is persisted.
    let api = transport(&config, Some(token.trim()))?;
    let validation = api.current_user();
    if let Err(err) = &validation {
        record(
            &mut store,
            ActionRecord::failure(ActionKind::SetToken, "token", error_detail(err)),
        );
    }
    let identity = validation.context("Token validation failed; nothing was stored")?;

    let result = {
        let mut vault = CredentialVault::new(&mut store);
        vault.store_token(
            password.as_ref().map(|p| p.as_str()),
            token.trim(),
            label.as_deref(),
            identity.scopes.as_deref(),
        )
    };
    record_result(&mut store, ActionKind::SetToken, &identity.login, &result);
    result.context("Failed to store the token")?;

    println!(
        "{} Token for {} stored.",
        "SUCCESS:".green().bold(),
        identity.login.bold()
    );
    if let Some(scopes) = &identity.scopes {
        println!("  {} {}", "Scopes:".dimmed(), scopes);
    }
    if !protected {
        println!(
            "{}",
            "Warning: the token is stored without a password (weak mode). Run 'gitvault settings create-password' to protect it."
                .yellow()
        );
    }
    Ok(())
}

/// Print the stored token after unlocking the vault.
///
/// Deliberately absent from history: the record would outlive the token's
/// secrecy.
pub fn handle_show_token() -> Result<()> {
    let mut store = open_store()?;
    let session = open_session(&mut store)?;

    println!("{}", session.token.as_str());
    if let Some(label) = &session.label {
        println!("{} {}", "Label:".dimmed(), label);
    }
    if let Some(scopes) = &session.scopes {
        println!("{} {}", "Scopes:".dimmed(), scopes);
    }
    Ok(())
}

pub fn handle_delete_token(yes: bool) -> Result<()> {
    let mut store = open_store()?;

    {
        let vault = CredentialVault::new(&mut store);
        if vault.token_info()?.is_none() {
            println!("{}", "No token stored.".yellow());
            return Ok(());
        }
    }

    if !confirm("Delete the stored token?", yes)? {
        println!("{}", "Aborted.".yellow());
        return Ok(());
    }

    let result = {
        let mut vault = CredentialVault::new(&mut store);
        vault.delete_token()
    };
    record_result(&mut store, ActionKind::DeleteToken, "token", &result);
    result.context("Failed to delete the token")?;

    println!("{} Token deleted.", "SUCCESS:".green().bold());
    Ok(())
}

pub fn handle_create_password() -> Result<()> {
    let mut store = open_store()?;
    ensure_interactive("a new password")?;

    {
        let vault = CredentialVault::new(&mut store);
        if vault.status()? == VaultStatus::PasswordSet {
            bail!("A password is already set. Use 'gitvault settings change-password'.");
        }
    }

    let password = Zeroizing::new(
        Password::new("New vault password:")
            .prompt()
            .context("Password prompt was cancelled")?,
    );
    if password.is_empty() {
        bail!("Password cannot be empty.");
    }

    let result = {
        let mut vault = CredentialVault::new(&mut store);
        vault.initialize(Some(&password))
    };
    record_result(&mut store, ActionKind::CreatePassword, "vault", &result);
    result.context("Failed to set the password")?;

    println!("{} Vault password set.", "SUCCESS:".green().bold());
    Ok(())
}

pub fn handle_change_password() -> Result<()> {
    let mut store = open_store()?;
    ensure_interactive("the vault password")?;

    let (old, has_token) = {
        let vault = CredentialVault::new(&mut store);
        if vault.status()? != VaultStatus::PasswordSet {
            bail!("No password is set. Use 'gitvault settings create-password'.");
        }
        let old = prompt_verified_password(&vault, "Current password:")?;
        let has_token = vault.token_info()?.is_some();
        (old, has_token)
    };

    let new = Zeroizing::new(
        Password::new("New vault password:")
            .prompt()
            .context("Password prompt was cancelled")?,
    );
    if new.is_empty() {
        bail!("Password cannot be empty.");
    }

    let result = {
        let mut vault = CredentialVault::new(&mut store);
        vault.change_password(Some(&old), &new)
    };
    record_result(&mut store, ActionKind::ChangePassword, "vault", &result);
    result.context("Failed to change the password")?;

    if has_token {
        println!(
            "{} Password changed; the stored token was re-encrypted.",
            "SUCCESS:".green().bold()
        );
    } else {
        println!("{} Password changed.", "SUCCESS:".green().bold());
    }
    Ok(())
}

pub fn handle_delete_password(yes: bool) -> Result<()> {
    let mut store = open_store()?;

    {
        let vault = CredentialVault::new(&mut store);
        if vault.status()? != VaultStatus::PasswordSet {
            println!("{}", "No password is set.".yellow());
            return Ok(());
        }
    }

    println!(
        "{}",
        "Removing the password also deletes the stored token; you will need to set it again."
            .yellow()
    );
    if !confirm("Remove the vault password?", yes)? {
        println!("{}", "Aborted.".yellow());
        return Ok(());
    }

    let result = {
        let mut vault = CredentialVault::new(&mut store);
        let password = prompt_verified_password(&vault, "Current password:")?;
        vault.delete_password(&password)
    };
    record_result(&mut store, ActionKind::DeletePassword, "vault", &result);
    result.context("Failed to remove the password")?;

    println!(
        "{} Password removed; the stored token was deleted.",
        "SUCCESS:".green().bold()
    );
    Ok(())
}

pub fn handle_reset(yes: bool) -> Result<()> {
    let mut store = open_store()?;

    {
        let vault = CredentialVault::new(&mut store);
        if vault.status()? == VaultStatus::Uninitialized {
            println!("{}", "The vault is already empty.".yellow());
            return Ok(());
        }
    }

    println!(
        "{}",
        "This deletes the stored token and the vault password. It cannot be undone.".red()
    );
    if !confirm("Reset the vault?", yes)? {
        println!("{}", "Aborted.".yellow());
        return Ok(());
    }

    let result = {
        let mut vault = CredentialVault::new(&mut store);
        vault.reset()
    };
    record_result(&mut store, ActionKind::Reset, "vault", &result);
    result.context("Failed to reset the vault")?;

    println!("{} Vault reset.", "SUCCESS:".green().bold());
    Ok(())
}
