//! Repository reference parsing and branch resolution.

use log::debug;

use crate::error::{Error, Result};
use crate::github::ContentApi;

/// A repository addressed by owner and name, with an optional caller-chosen
/// branch. Parsing never fills `branch`; it comes from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReference {
    pub owner: String,
    pub name: String,
    pub branch: Option<String>,
}

impl RepoReference {
    /// Parse `owner/name` shorthand or a GitHub URL
    /// (`https://github.com/owner/name`, optional `.git` suffix, optional
    /// trailing slash, `http` and a missing scheme both accepted). Anything
    /// else is a malformed reference.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let (owner, name) = match github_url_path(trimmed) {
            Some(path) => {
                let path = path.trim_end_matches('/');
                let path = path.strip_suffix(".git").unwrap_or(path);
                split_owner_name(path).ok_or_else(|| malformed(input))?
            }
            None => split_owner_name(trimmed).ok_or_else(|| malformed(input))?,
        };
        if !valid_owner(owner) || !valid_name(name) {
            return Err(malformed(input));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            branch: None,
        })
    }

    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Pick the branch to operate on.
///
/// Order: the explicit branch verbatim (never verified; a typo surfaces as
/// `NotFound` on first use), then the repository's default branch, then
/// `main` if it exists, then `master`. A metadata lookup that fails or
/// reports no default branch does not abort resolution; the well-known
/// names are still tried. A repository where none of these resolve (no
/// commits at all) is `BranchUnresolved`.
pub fn resolve_branch(api: &impl ContentApi, reference: &RepoReference) -> Result<String> {
    if let Some(branch) = &reference.branch {
        return Ok(branch.clone());
    }

    match api.repo_metadata(&reference.owner, &reference.name) {
        Ok(metadata) => {
            if let Some(default_branch) = metadata.default_branch {
                if !default_branch.is_empty() {
                    return Ok(default_branch);
                }
            }
        }
        Err(err) => {
            debug!(
                "Metadata lookup for {} failed ({}); trying well-known branches",
                reference.full_name(),
                err
            );
        }
    }

    for candidate in ["main", "master"] {
        if api
            .branch_head(&reference.owner, &reference.name, candidate)?
            .is_some()
        {
            return Ok(candidate.to_string());
        }
    }

    Err(Error::BranchUnresolved {
        repo: reference.full_name(),
    })
}

fn malformed(input: &str) -> Error {
    Error::MalformedReference(input.trim().to_string())
}

/// The `owner/name[...]` remainder of a GitHub URL, or `None` when the input
/// is not URL-shaped.
fn github_url_path(input: &str) -> Option<&str> {
    let rest = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))
        .unwrap_or(input);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    rest.strip_prefix("github.com/")
}

fn split_owner_name(path: &str) -> Option<(&str, &str)> {
    let mut parts = path.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
            Some((owner, name))
        }
        _ => None,
    }
}

fn valid_owner(owner: &str) -> bool {
    owner
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn valid_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
