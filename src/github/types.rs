//! Request and response shapes for the GitHub REST v3 endpoints this tool
//! touches. Response types keep only the fields the rest of the crate
//! consumes.

use serde::{Deserialize, Serialize};

/// Response of `GET /user`. Scopes arrive in the `X-OAuth-Scopes` header,
/// not the body; the transport pairs them up in [`super::TokenIdentity`].
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatedUser {
    pub login: String,
}

/// A repository as returned by the repo endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,

    pub full_name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub private: bool,

    /// Absent on bare repositories that have no commits yet.
    #[serde(default)]
    pub default_branch: Option<String>,

    pub html_url: String,
}

/// Payload for `POST /user/repos`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRepoRequest {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub private: bool,

    pub auto_init: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitignore_template: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_template: Option<String>,
}

/// Payload for `PATCH /repos/{owner}/{repo}`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRepoRequest {
    pub private: bool,
}

/// A single file object from `GET /repos/{owner}/{repo}/contents/{path}`.
///
/// `content`/`encoding` are present for file responses below GitHub's inline
/// size cutoff; `sha` is always present and is what write operations must
/// echo back.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentFile {
    pub path: String,

    pub sha: String,

    #[serde(default)]
    pub size: Option<u64>,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub encoding: Option<String>,
}

/// Response of a contents GET: a single object for a file, an array for a
/// directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentsResponse {
    File(ContentFile),
    Directory(Vec<ContentFile>),
}

/// Payload for `PUT /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Clone, Serialize)]
pub struct PutContentsRequest {
    pub message: String,

    /// Base64 of the raw file bytes, standard alphabet.
    pub content: String,

    pub branch: String,

    /// Current blob sha when updating an existing file; omitted on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Payload for `DELETE /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteContentsRequest {
    pub message: String,

    pub sha: String,

    pub branch: String,
}

/// Commit half of a contents write response.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

/// Response of a contents PUT. `content` is null on some delete responses,
/// so it stays optional here too.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentWriteResponse {
    #[serde(default)]
    pub content: Option<ContentFile>,

    pub commit: CommitRef,
}

/// Response of `GET /repos/{owner}/{repo}/git/blobs/{sha}`. Unlike the
/// contents endpoint, this returns the body for blobs up to the full API
/// size limit.
#[derive(Debug, Clone, Deserialize)]
pub struct GitBlob {
    pub content: String,

    pub encoding: String,

    #[serde(default)]
    pub size: Option<u64>,
}

/// Response of `GET /repos/{owner}/{repo}/git/refs/heads/{branch}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    pub object: GitRefObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRefObject {
    pub sha: String,
}

/// One entry of a git tree. `type` is `blob` for files and `tree` for
/// directories.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeItem {
    pub path: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub sha: String,

    #[serde(default)]
    pub size: Option<u64>,
}

/// Response of `GET /repos/{owner}/{repo}/git/trees/{sha}?recursive=1`.
///
/// `truncated` set means the server cut the listing short; callers must not
/// act on a partial view.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeResponse {
    pub sha: String,

    pub tree: Vec<TreeItem>,

    #[serde(default)]
    pub truncated: bool,
}

/// Response of `GET /gitignore/templates/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitignoreTemplate {
    pub name: String,

    pub source: String,
}

/// One entry of `GET /licenses`.
#[derive(Debug, Clone, Deserialize)]
pub struct LicenseSummary {
    pub key: String,

    pub name: String,
}

/// Response of `GET /licenses/{key}`, including the full license text.
#[derive(Debug, Clone, Deserialize)]
pub struct License {
    pub key: String,

    pub name: String,

    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_tolerates_missing_optional_fields() {
        let json = r#"{
            "name": "demo",
            "full_name": "alice/demo",
            "private": false,
            "html_url": "https://github.com/alice/demo"
        }"#;
        let repo: Repository = serde_json::from_str(json).unwrap();
        assert_eq!(repo.name, "demo");
        assert!(repo.description.is_none());
        assert!(repo.default_branch.is_none());
    }

    #[test]
    fn test_put_request_omits_sha_on_create() {
        let req = PutContentsRequest {
            message: "add file".to_string(),
            content: "aGVsbG8=".to_string(),
            branch: "main".to_string(),
            sha: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("\"sha\""));

        let req = PutContentsRequest { sha: Some("abc".to_string()), ..req };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"sha\":\"abc\""));
    }

    #[test]
    fn test_tree_response_defaults_truncated_to_false() {
        let json = r#"{
            "sha": "deadbeef",
            "tree": [
                {"path": "src/main.rs", "type": "blob", "sha": "a1", "size": 120},
                {"path": "src", "type": "tree", "sha": "b2"}
            ]
        }"#;
        let tree: TreeResponse = serde_json::from_str(json).unwrap();
        assert!(!tree.truncated);
        assert_eq!(tree.tree.len(), 2);
        assert_eq!(tree.tree[0].kind, "blob");
        assert!(tree.tree[1].size.is_none());
    }

    #[test]
    fn test_contents_response_distinguishes_file_from_directory() {
        let file = r#"{"path": "a.txt", "sha": "s1", "type": "file", "size": 3}"#;
        assert!(matches!(
            serde_json::from_str::<ContentsResponse>(file).unwrap(),
            ContentsResponse::File(_)
        ));

        let dir = r#"[{"path": "d/a.txt", "sha": "s1", "type": "file"}]"#;
        assert!(matches!(
            serde_json::from_str::<ContentsResponse>(dir).unwrap(),
            ContentsResponse::Directory(entries) if entries.len() == 1
        ));
    }

    #[test]
    fn test_create_repo_request_skips_absent_templates() {
        let req = CreateRepoRequest {
            name: "demo".to_string(),
            description: None,
            private: true,
            auto_init: true,
            gitignore_template: Some("Rust".to_string()),
            license_template: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"gitignore_template\":\"Rust\""));
        assert!(!json.contains("description"));
        assert!(!json.contains("license_template"));
    }
}
