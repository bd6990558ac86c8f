//! Content command handlers for one repository
//!
//! Implements the `setup` subcommands: upload, delete, list, rename,
//! folder delete, visibility, and template application.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::Select;

use crate::directory::RepoReference;
use crate::error::Error;
use crate::github::{ContentApi, GitHubTransport};
use crate::history::ActionKind;
use crate::orchestrator::{self, ContentOrchestrator, EntryKind, TemplateKind};

use super::{confirm, record_result, remote_context};

pub fn handle_upload(
    repo: &str,
    branch: Option<String>,
    file: &Path,
    dest: Option<String>,
    message: Option<String>,
) -> Result<()> {
    let reference = RepoReference::parse(repo)?.with_branch(branch);
    let dest_path = match dest {
        Some(dest) => dest,
        None => file
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow::anyhow!("Cannot derive a destination name from {}", file.display())
            })?,
    };

    let (mut store, api) = remote_context()?;
    let op_target = format!("{reference}:{dest_path}");

    // Check the size before pulling the whole file into memory.
    let metadata =
        fs::metadata(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let size_check = orchestrator::ensure_upload_size(metadata.len());
    if size_check.is_err() {
        record_result(&mut store, ActionKind::Upload, &op_target, &size_check);
    }
    size_check.with_context(|| format!("Cannot upload {}", file.display()))?;

    let data = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let message = message.unwrap_or_else(|| format!("Upload {dest_path}"));

    let orchestrator = ContentOrchestrator::new(&api);
    let result = orchestrator.upload(&reference, &dest_path, &data, &message);
    record_result(&mut store, ActionKind::Upload, &op_target, &result);
    let outcome = result.with_context(|| format!("Failed to upload {}", file.display()))?;

    let verb = if outcome.updated { "Updated" } else { "Created" };
    println!(
        "{} {} '{}' ({})",
        "SUCCESS:".green().bold(),
        verb,
        outcome.path.bold(),
        short_sha(&outcome.commit).dimmed()
    );
    Ok(())
}

pub fn handle_delete_file(
    repo: &str,
    branch: Option<String>,
    path: &str,
    message: Option<String>,
    yes: bool,
) -> Result<()> {
    let reference = RepoReference::parse(repo)?.with_branch(branch);

    if !confirm(&format!("Delete '{path}' from {reference}?"), yes)? {
        println!("{}", "Aborted.".yellow());
        return Ok(());
    }

    let (mut store, api) = remote_context()?;
    let orchestrator = ContentOrchestrator::new(&api);
    let message = message.unwrap_or_else(|| format!("Delete {path}"));

    let result = orchestrator.delete_file(&reference, path, &message);
    record_result(
        &mut store,
        ActionKind::DeleteFile,
        &format!("{reference}:{path}"),
        &result,
    );
    result.with_context(|| format!("Failed to delete '{path}'"))?;

    println!("{} Deleted '{}'", "SUCCESS:".green().bold(), path.bold());
    Ok(())
}

pub fn handle_list(
    repo: &str,
    branch: Option<String>,
    path: Option<String>,
    recursive: bool,
) -> Result<()> {
    let reference = RepoReference::parse(repo)?.with_branch(branch);
    let (mut store, api) = remote_context()?;
    let orchestrator = ContentOrchestrator::new(&api);

    let op_target = match &path {
        Some(prefix) => format!("{reference}:{prefix}"),
        None => reference.to_string(),
    };
    let result = orchestrator.list_tree(&reference, path.as_deref(), recursive);
    record_result(&mut store, ActionKind::ListTree, &op_target, &result);
    let entries = result.with_context(|| format!("Failed to list {op_target}"))?;

    if entries.is_empty() {
        println!("{}", "No entries.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("{op_target} ({} entries)", entries.len())
            .cyan()
            .bold()
    );
    for entry in &entries {
        match entry.kind {
            EntryKind::Tree => println!("  {}/", entry.path.blue().bold()),
            EntryKind::Blob => {
                let size = entry.size.map(format_size).unwrap_or_default();
                println!("  {}  {}", entry.path, size.dimmed());
            }
        }
    }
    Ok(())
}

pub fn handle_rename(
    repo: &str,
    branch: Option<String>,
    old_path: &str,
    new_path: &str,
    message: Option<String>,
) -> Result<()> {
    let reference = RepoReference::parse(repo)?.with_branch(branch);
    let (mut store, api) = remote_context()?;
    let orchestrator = ContentOrchestrator::new(&api);
    let message = message.unwrap_or_else(|| format!("Rename {old_path} to {new_path}"));

    let result = orchestrator.rename(&reference, old_path, new_path, &message);
    record_result(
        &mut store,
        ActionKind::Rename,
        &format!("{reference}:{old_path} -> {new_path}"),
        &result,
    );
    match result {
        Ok(outcome) => {
            println!(
                "{} Renamed '{}' to '{}' ({})",
                "SUCCESS:".green().bold(),
                old_path,
                outcome.path.bold(),
                short_sha(&outcome.commit).dimmed()
            );
            Ok(())
        }
        Err(err @ Error::PartialRename { .. }) => {
            println!(
                "{}",
                "The new file was created but the old one could not be deleted; both paths exist."
                    .red()
            );
            println!(
                "{}",
                format!("Delete '{old_path}' manually once the repository settles.").yellow()
            );
            Err(err.into())
        }
        Err(err) => Err(anyhow::Error::from(err)
            .context(format!("Failed to rename '{old_path}' to '{new_path}'"))),
    }
}

pub fn handle_delete_folder(
    repo: &str,
    branch: Option<String>,
    folder: &str,
    yes: bool,
) -> Result<()> {
    let reference = RepoReference::parse(repo)?.with_branch(branch);

    if !confirm(
        &format!("Delete folder '{folder}' and everything under it from {reference}?"),
        yes,
    )? {
        println!("{}", "Aborted.".yellow());
        return Ok(());
    }

    let (mut store, api) = remote_context()?;
    let orchestrator = ContentOrchestrator::new(&api);
    let message = format!("Delete folder {folder}");

    let result = orchestrator.delete_recursive(&reference, folder, &message);
    record_result(
        &mut store,
        ActionKind::DeleteFolder,
        &format!("{reference}:{folder}"),
        &result,
    );
    match result {
        Ok(count) => {
            println!(
                "{} Deleted {} file(s) under '{}'",
                "SUCCESS:".green().bold(),
                count,
                folder.bold()
            );
            Ok(())
        }
        Err(err @ Error::ConcurrentModification { .. }) => {
            println!(
                "{}",
                "The folder changed while it was being deleted.".red()
            );
            println!(
                "{}",
                "List the folder again to see what remains, then re-run.".yellow()
            );
            Err(err.into())
        }
        Err(err) => {
            Err(anyhow::Error::from(err).context(format!("Failed to delete folder '{folder}'")))
        }
    }
}

pub fn handle_visibility(repo: &str, private: bool) -> Result<()> {
    let reference = RepoReference::parse(repo)?;
    let (mut store, api) = remote_context()?;
    let orchestrator = ContentOrchestrator::new(&api);

    let result = orchestrator.change_visibility(&reference, private);
    record_result(
        &mut store,
        ActionKind::ChangeVisibility,
        &reference.to_string(),
        &result,
    );
    let repo_meta =
        result.with_context(|| format!("Failed to change the visibility of {reference}"))?;

    let visibility = if repo_meta.private {
        "private".red()
    } else {
        "public".green()
    };
    println!(
        "{} {} is now {}",
        "SUCCESS:".green().bold(),
        repo_meta.full_name.bold(),
        visibility
    );
    Ok(())
}

pub fn handle_apply_template(
    repo: &str,
    branch: Option<String>,
    kind: TemplateKind,
    template: Option<String>,
) -> Result<()> {
    let reference = RepoReference::parse(repo)?.with_branch(branch);
    let (mut store, api) = remote_context()?;
    let orchestrator = ContentOrchestrator::new(&api);

    let template = match template {
        Some(template) => template,
        None => select_template(&api, kind)?,
    };

    let result = orchestrator.apply_template(&reference, kind, &template);
    record_result(
        &mut store,
        ActionKind::ApplyTemplate,
        &format!("{reference}:{}", kind.target_path()),
        &result,
    );
    let outcome = result.with_context(|| format!("Failed to apply template '{template}'"))?;

    let verb = if outcome.updated { "Updated" } else { "Created" };
    println!(
        "{} {} '{}' from template '{}'",
        "SUCCESS:".green().bold(),
        verb,
        outcome.path.bold(),
        template
    );
    Ok(())
}

/// Fetch the available templates and let the user pick one. Without a
/// terminal the list is printed instead so the name can be passed on the
/// next run.
fn select_template(api: &GitHubTransport, kind: TemplateKind) -> Result<String> {
    let options: Vec<String> = match kind {
        TemplateKind::Gitignore => api
            .gitignore_templates()
            .context("Failed to fetch gitignore templates")?,
        TemplateKind::License => api
            .licenses()
            .context("Failed to fetch licenses")?
            .into_iter()
            .map(|license| format!("{} ({})", license.key, license.name))
            .collect(),
    };
    if options.is_empty() {
        bail!("No templates available.");
    }

    if !atty::is(atty::Stream::Stdin) {
        println!("{}", "Available templates:".cyan().bold());
        for option in &options {
            println!("  {option}");
        }
        bail!("Pass a template name to use one.");
    }

    let chosen = Select::new("Template:", options)
        .prompt()
        .context("Template selection was cancelled")?;
    Ok(match kind {
        TemplateKind::Gitignore => chosen,
        // License options carry the display name; the key is the first word.
        TemplateKind::License => chosen
            .split_whitespace()
            .next()
            .unwrap_or(chosen.as_str())
            .to_string(),
    })
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sha_truncates() {
        assert_eq!(short_sha("0123456789abcdef"), "0123456");
        assert_eq!(short_sha("abc"), "abc");
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
