//! Multi-step content operations against one repository.
//!
//! Every operation resolves the working branch first, runs its preflight
//! checks locally, and only then issues remote calls. Rename and recursive
//! delete are not atomic on the remote side; their partial-failure states
//! are explicit error variants rather than generic failures so callers can
//! retry the right half.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, info};

use crate::directory::{self, RepoReference};
use crate::error::{Error, Result};
use crate::github::types::{
    ContentFile, DeleteContentsRequest, PutContentsRequest, Repository, TreeItem,
};
use crate::github::{ContentApi, MAX_CONTENT_UPLOAD_BYTES};

/// Entry kind in a tree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Blob,
    Tree,
}

/// One row of a tree listing, a snapshot of a single listing call. Stale
/// after any mutation; re-fetch instead of reusing across writes.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEntry {
    pub path: String,
    pub kind: EntryKind,
    pub sha: String,
    pub size: Option<u64>,
}

/// Result of a successful upload-shaped operation.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub path: String,
    /// Sha of the commit the write produced.
    pub commit: String,
    /// True when an existing file was replaced rather than created.
    pub updated: bool,
}

/// Which conventional file a template lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Gitignore,
    License,
}

impl TemplateKind {
    pub fn target_path(&self) -> &'static str {
        match self {
            TemplateKind::Gitignore => ".gitignore",
            TemplateKind::License => "LICENSE",
        }
    }
}

/// Reject payloads over the single-request content limit. Called before any
/// bytes are read off disk or sent anywhere.
pub fn ensure_upload_size(size: u64) -> Result<()> {
    if size > MAX_CONTENT_UPLOAD_BYTES {
        return Err(Error::PayloadTooLarge {
            size,
            limit: MAX_CONTENT_UPLOAD_BYTES,
        });
    }
    Ok(())
}

pub struct ContentOrchestrator<'a, A: ContentApi> {
    api: &'a A,
}

impl<'a, A: ContentApi> ContentOrchestrator<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Upload `data` to `dest_path`, creating the file or replacing it.
    ///
    /// The current sha is looked up first so an update carries it; each
    /// upload is one independent commit on the resolved branch.
    pub fn upload(
        &self,
        reference: &RepoReference,
        dest_path: &str,
        data: &[u8],
        message: &str,
    ) -> Result<UploadOutcome> {
        ensure_upload_size(data.len() as u64)?;
        let branch = directory::resolve_branch(self.api, reference)?;
        let dest_path = dest_path.trim_matches('/');

        let existing =
            self.api
                .file_entry(&reference.owner, &reference.name, dest_path, &branch)?;
        let request = PutContentsRequest {
            message: message.to_string(),
            content: STANDARD.encode(data),
            branch,
            sha: existing.as_ref().map(|file| file.sha.clone()),
        };
        let response = self
            .api
            .put_file(&reference.owner, &reference.name, dest_path, &request)?;

        info!(
            "uploaded '{}' to {} ({})",
            dest_path,
            reference,
            if existing.is_some() { "update" } else { "create" }
        );
        Ok(UploadOutcome {
            path: dest_path.to_string(),
            commit: response.commit.sha,
            updated: existing.is_some(),
        })
    }

    /// Delete one file. The file's current sha is required by the API, so a
    /// path that does not exist on the branch is `NotFound` before any write.
    pub fn delete_file(
        &self,
        reference: &RepoReference,
        path: &str,
        message: &str,
    ) -> Result<()> {
        let branch = directory::resolve_branch(self.api, reference)?;
        let path = path.trim_matches('/');

        let entry = self
            .api
            .file_entry(&reference.owner, &reference.name, path, &branch)?
            .ok_or_else(|| Error::NotFound(format!("'{path}' on branch '{branch}'")))?;

        let request = DeleteContentsRequest {
            message: message.to_string(),
            sha: entry.sha,
            branch,
        };
        self.api
            .delete_file(&reference.owner, &reference.name, path, &request)?;
        info!("deleted '{}' from {}", path, reference);
        Ok(())
    }

    /// List the tree of the resolved branch, optionally scoped to a path.
    ///
    /// Non-recursive mode keeps only direct children of the scope. A
    /// server-truncated tree fails with `TreeTruncated` instead of returning
    /// a partial listing.
    pub fn list_tree(
        &self,
        reference: &RepoReference,
        path: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<TreeEntry>> {
        let branch = directory::resolve_branch(self.api, reference)?;
        let head = self.require_branch_head(reference, &branch)?;
        let tree = self.api.tree(&reference.owner, &reference.name, &head)?;
        if tree.truncated {
            return Err(Error::TreeTruncated);
        }
        Ok(scope_entries(&tree.tree, path, recursive))
    }

    /// Move a file by uploading it at `new_path` and deleting `old_path`.
    ///
    /// Not atomic remotely: when the delete half fails after a successful
    /// upload, both paths exist and the error is `PartialRename` so the
    /// caller can re-check and retry only the delete.
    pub fn rename(
        &self,
        reference: &RepoReference,
        old_path: &str,
        new_path: &str,
        message: &str,
    ) -> Result<UploadOutcome> {
        let old_path = old_path.trim_matches('/');
        let new_path = new_path.trim_matches('/');
        // Uploading then deleting the same path would destroy the file.
        if old_path == new_path {
            return Err(Error::ConflictingWrite {
                path: new_path.to_string(),
            });
        }
        let branch = directory::resolve_branch(self.api, reference)?;

        let source = self
            .api
            .file_entry(&reference.owner, &reference.name, old_path, &branch)?
            .ok_or_else(|| Error::NotFound(format!("'{old_path}' on branch '{branch}'")))?;
        let data = self.file_bytes(reference, &source)?;

        let existing =
            self.api
                .file_entry(&reference.owner, &reference.name, new_path, &branch)?;
        let put = PutContentsRequest {
            message: message.to_string(),
            content: STANDARD.encode(&data),
            branch: branch.clone(),
            sha: existing.as_ref().map(|file| file.sha.clone()),
        };
        let created = self
            .api
            .put_file(&reference.owner, &reference.name, new_path, &put)?;

        let delete = DeleteContentsRequest {
            message: message.to_string(),
            sha: source.sha,
            branch,
        };
        if let Err(cause) =
            self.api
                .delete_file(&reference.owner, &reference.name, old_path, &delete)
        {
            return Err(Error::PartialRename {
                new_path: new_path.to_string(),
                old_path: old_path.to_string(),
                cause: Box::new(cause),
            });
        }

        info!("renamed '{}' to '{}' in {}", old_path, new_path, reference);
        Ok(UploadOutcome {
            path: new_path.to_string(),
            commit: created.commit.sha,
            updated: existing.is_some(),
        })
    }

    /// Delete every blob under `folder`, deepest paths first.
    ///
    /// The head commit is captured at listing time and re-read immediately
    /// before the first delete; if it moved, the folder is listed once more
    /// and the operation only proceeds when its contents are unchanged.
    /// Any drift, before or during the delete sequence, is
    /// `ConcurrentModification` carrying how many entries were already
    /// removed.
    pub fn delete_recursive(
        &self,
        reference: &RepoReference,
        folder: &str,
        message: &str,
    ) -> Result<usize> {
        let branch = directory::resolve_branch(self.api, reference)?;
        let folder = folder.trim_matches('/');

        let first_head = self.require_branch_head(reference, &branch)?;
        let first_tree = self.api.tree(&reference.owner, &reference.name, &first_head)?;
        if first_tree.truncated {
            return Err(Error::TreeTruncated);
        }
        let mut planned = blobs_under(&first_tree.tree, folder);
        if planned.is_empty() {
            return Err(Error::NotFound(format!(
                "folder '{folder}' on branch '{branch}'"
            )));
        }

        let current_head = match self
            .api
            .branch_head(&reference.owner, &reference.name, &branch)?
        {
            Some(sha) => sha,
            None => return Err(Error::ConcurrentModification { deleted: 0 }),
        };
        if current_head != first_head {
            debug!(
                "head of '{}' moved from {} to {} since listing",
                branch, first_head, current_head
            );
            let second_tree = self
                .api
                .tree(&reference.owner, &reference.name, &current_head)?;
            if second_tree.truncated {
                return Err(Error::TreeTruncated);
            }
            let replanned = blobs_under(&second_tree.tree, folder);
            if replanned != planned {
                return Err(Error::ConcurrentModification { deleted: 0 });
            }
            planned = replanned;
        }

        order_deepest_first(&mut planned);
        let mut deleted = 0usize;
        for (path, sha) in &planned {
            let request = DeleteContentsRequest {
                message: message.to_string(),
                sha: sha.clone(),
                branch: branch.clone(),
            };
            match self
                .api
                .delete_file(&reference.owner, &reference.name, path, &request)
            {
                Ok(()) => deleted += 1,
                // A stale sha or a vanished file mid-sequence means someone
                // else is writing; stop and report how far we got.
                Err(Error::ConflictingWrite { .. }) | Err(Error::NotFound(_)) => {
                    return Err(Error::ConcurrentModification { deleted });
                }
                Err(other) => return Err(other),
            }
        }

        info!("deleted {} files under '{}' in {}", deleted, folder, reference);
        Ok(deleted)
    }

    /// Flip the repository between public and private.
    pub fn change_visibility(
        &self,
        reference: &RepoReference,
        private: bool,
    ) -> Result<Repository> {
        self.api
            .update_visibility(&reference.owner, &reference.name, private)
    }

    /// Fetch a gitignore or license template and commit it at its
    /// conventional path.
    pub fn apply_template(
        &self,
        reference: &RepoReference,
        kind: TemplateKind,
        template: &str,
    ) -> Result<UploadOutcome> {
        let body = match kind {
            TemplateKind::Gitignore => self.api.gitignore_template(template)?.source,
            TemplateKind::License => self.api.license(template)?.body,
        };
        let message = format!("Add {} from template '{}'", kind.target_path(), template);
        self.upload(reference, kind.target_path(), body.as_bytes(), &message)
    }

    fn require_branch_head(&self, reference: &RepoReference, branch: &str) -> Result<String> {
        self.api
            .branch_head(&reference.owner, &reference.name, branch)?
            .ok_or_else(|| Error::NotFound(format!("branch '{branch}' in {reference}")))
    }

    /// Raw bytes of a file, from the inline contents body when present or
    /// the blob endpoint otherwise (the contents API stops inlining above
    /// its own cutoff and reports encoding "none").
    fn file_bytes(&self, reference: &RepoReference, file: &ContentFile) -> Result<Vec<u8>> {
        if file.encoding.as_deref() == Some("base64") {
            if let Some(content) = &file.content {
                return decode_remote_base64(content);
            }
        }
        let blob = self.api.blob(&reference.owner, &reference.name, &file.sha)?;
        match blob.encoding.as_str() {
            "base64" => decode_remote_base64(&blob.content),
            "utf-8" => Ok(blob.content.into_bytes()),
            other => Err(Error::Api {
                status: 200,
                detail: format!("unexpected blob encoding '{other}'"),
            }),
        }
    }
}

/// Decode a base64 body as the API sends it, with embedded line breaks.
fn decode_remote_base64(content: &str) -> Result<Vec<u8>> {
    let compact: String = content.split_whitespace().collect();
    STANDARD.decode(compact.as_bytes()).map_err(|err| Error::Api {
        status: 200,
        detail: format!("content response is not valid base64: {err}"),
    })
}

/// Convert and filter raw tree items to the entries visible within `path`.
/// The scope folder itself is not part of its own listing; submodule
/// entries are skipped.
fn scope_entries(items: &[TreeItem], path: Option<&str>, recursive: bool) -> Vec<TreeEntry> {
    let prefix = path.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty());
    items
        .iter()
        .filter_map(|item| {
            let kind = match item.kind.as_str() {
                "blob" => EntryKind::Blob,
                "tree" => EntryKind::Tree,
                _ => return None,
            };
            let relative = match prefix {
                None => item.path.as_str(),
                Some(p) if item.path == p => {
                    if kind == EntryKind::Tree {
                        return None;
                    }
                    ""
                }
                Some(p) => match item
                    .path
                    .strip_prefix(p)
                    .and_then(|rest| rest.strip_prefix('/'))
                {
                    Some(rest) => rest,
                    None => return None,
                },
            };
            if !recursive && relative.contains('/') {
                return None;
            }
            Some(TreeEntry {
                path: item.path.clone(),
                kind,
                sha: item.sha.clone(),
                size: item.size,
            })
        })
        .collect()
}

/// All blobs strictly under `folder`, sorted by path so two listings can be
/// compared for drift.
fn blobs_under(items: &[TreeItem], folder: &str) -> Vec<(String, String)> {
    let prefix = format!("{folder}/");
    let mut blobs: Vec<(String, String)> = items
        .iter()
        .filter(|item| item.kind == "blob" && item.path.starts_with(&prefix))
        .map(|item| (item.path.clone(), item.sha.clone()))
        .collect();
    blobs.sort();
    blobs
}

fn order_deepest_first(blobs: &mut [(String, String)]) {
    blobs.sort_by(|a, b| {
        let depth_a = a.0.matches('/').count();
        let depth_b = b.0.matches('/').count();
        depth_b.cmp(&depth_a).then_with(|| b.0.cmp(&a.0))
    });
}
