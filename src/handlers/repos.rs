//! Repository-level command handlers
//!
//! Create, list, and delete repositories for the authenticated user.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::Text;

use crate::config::AppConfig;
use crate::directory::RepoReference;
use crate::github::types::CreateRepoRequest;
use crate::github::ContentApi;
use crate::history::ActionKind;

use super::{
    confirm, ensure_interactive, open_session, open_store, record_result, remote_context,
    transport,
};

pub fn handle_create_repo(
    name: Option<String>,
    description: Option<String>,
    private: bool,
    auto_init: bool,
    gitignore: Option<String>,
    license: Option<String>,
) -> Result<()> {
    let (mut store, api) = remote_context()?;

    let name = match name {
        Some(name) => name,
        None => {
            ensure_interactive("the repository name")?;
            Text::new("Repository name:")
                .prompt()
                .context("Prompt was cancelled")?
        }
    };
    let name = name.trim().to_string();
    if name.is_empty() {
        bail!("Repository name cannot be empty.");
    }

    let request = CreateRepoRequest {
        name: name.clone(),
        description: description.filter(|d| !d.trim().is_empty()),
        private,
        auto_init,
        gitignore_template: gitignore,
        license_template: license,
    };

    let result = api.create_repo(&request);
    record_result(&mut store, ActionKind::CreateRepo, &name, &result);
    let repo = result.with_context(|| format!("Failed to create repository '{name}'"))?;

    let visibility = if repo.private {
        "private".red()
    } else {
        "public".green()
    };
    println!(
        "{} Created {} [{}]",
        "SUCCESS:".green().bold(),
        repo.full_name.bold(),
        visibility
    );
    println!("  {}", repo.html_url.dimmed());
    Ok(())
}

pub fn handle_list_repos(user: Option<String>) -> Result<()> {
    let config = AppConfig::load()?;
    let mut store = open_store()?;

    // Another user's public repositories need no credential at all.
    let (result, target) = match &user {
        Some(username) => {
            let api = transport(&config, None)?;
            (api.list_public_repos(username), username.clone())
        }
        None => {
            let session = open_session(&mut store)?;
            let api = transport(&config, Some(&session.token))?;
            (api.list_own_repos(), "own".to_string())
        }
    };
    record_result(&mut store, ActionKind::ListRepos, &target, &result);
    let repos = result.context("Failed to list repositories")?;

    if repos.is_empty() {
        println!("{}", "No repositories found.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("{} repositories", repos.len()).cyan().bold()
    );
    for repo in &repos {
        let visibility = if repo.private {
            "private".red()
        } else {
            "public".green()
        };
        println!("  {} [{}]", repo.full_name.bold(), visibility);
        if let Some(description) = &repo.description {
            if !description.is_empty() {
                println!("    {}", description.dimmed());
            }
        }
    }
    Ok(())
}

pub fn handle_delete_repo(name: &str, yes: bool) -> Result<()> {
    let (mut store, api) = remote_context()?;

    // A bare name targets the caller's own account.
    let (owner, repo_name) = if name.contains('/') {
        let reference = RepoReference::parse(name)?;
        (reference.owner, reference.name)
    } else {
        let identity = api
            .current_user()
            .context("Failed to resolve the repository owner")?;
        (identity.login, name.trim().to_string())
    };
    let full_name = format!("{owner}/{repo_name}");

    if !confirm(
        &format!("Delete repository '{full_name}'? This cannot be undone."),
        yes,
    )? {
        println!("{}", "Aborted.".yellow());
        return Ok(());
    }

    let result = api.delete_repo(&owner, &repo_name);
    record_result(&mut store, ActionKind::DeleteRepo, &full_name, &result);
    result.with_context(|| format!("Failed to delete repository '{full_name}'"))?;

    println!("{} Deleted {}", "SUCCESS:".green().bold(), full_name.bold());
    Ok(())
}
