//! GitHub REST v3 transport.
//!
//! All remote access goes through the [`ContentApi`] trait so the layers
//! above can be tested against an in-memory implementation. The real
//! transport is a blocking reqwest client with a fixed request timeout.

pub mod types;

use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::logger;
use types::{
    AuthenticatedUser, ContentFile, ContentWriteResponse, ContentsResponse, CreateRepoRequest,
    DeleteContentsRequest, GitBlob, GitRef, GitignoreTemplate, License, LicenseSummary,
    PutContentsRequest, Repository, TreeResponse, UpdateRepoRequest,
};

/// Hard ceiling on the raw byte size of a single contents-API upload.
/// Checked locally before any request is made.
pub const MAX_CONTENT_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

const ACCEPT_VALUE: &str = "application/vnd.github.v3+json";
const USER_AGENT_VALUE: &str = concat!("gitvault/", env!("CARGO_PKG_VERSION"));
const REPOS_PER_PAGE: u32 = 100;

/// Who a token belongs to and what it may do, from `GET /user` plus the
/// `X-OAuth-Scopes` response header.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub login: String,
    pub scopes: Option<String>,
}

/// The remote operations the rest of the crate needs, one method per
/// endpoint shape.
///
/// Lookups that probe for existence (`file_entry`, `branch_head`) return
/// `Ok(None)` on 404 instead of an error; everything else maps HTTP status
/// codes through the shared taxonomy.
pub trait ContentApi {
    /// Validate the configured token and report its identity and scopes.
    fn current_user(&self) -> Result<TokenIdentity>;

    /// All repositories of the authenticated user, across pages.
    fn list_own_repos(&self) -> Result<Vec<Repository>>;

    /// Public repositories of another user. Works without a token.
    fn list_public_repos(&self, username: &str) -> Result<Vec<Repository>>;

    fn create_repo(&self, request: &CreateRepoRequest) -> Result<Repository>;

    fn delete_repo(&self, owner: &str, name: &str) -> Result<()>;

    fn repo_metadata(&self, owner: &str, name: &str) -> Result<Repository>;

    fn update_visibility(&self, owner: &str, name: &str, private: bool) -> Result<Repository>;

    /// The file at `path` on `branch`, or `None` when nothing is there or
    /// the path is a directory.
    fn file_entry(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<ContentFile>>;

    fn put_file(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        request: &PutContentsRequest,
    ) -> Result<ContentWriteResponse>;

    fn delete_file(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        request: &DeleteContentsRequest,
    ) -> Result<()>;

    /// Commit sha at the head of `branch`, or `None` when the branch does
    /// not exist.
    fn branch_head(&self, owner: &str, name: &str, branch: &str) -> Result<Option<String>>;

    /// Recursive tree rooted at a commit or tree sha.
    fn tree(&self, owner: &str, name: &str, sha: &str) -> Result<TreeResponse>;

    /// Raw blob by sha, for file bodies the contents endpoint does not
    /// inline.
    fn blob(&self, owner: &str, name: &str, sha: &str) -> Result<GitBlob>;

    fn gitignore_templates(&self) -> Result<Vec<String>>;

    fn gitignore_template(&self, name: &str) -> Result<GitignoreTemplate>;

    fn licenses(&self) -> Result<Vec<LicenseSummary>>;

    fn license(&self, key: &str) -> Result<License>;
}

/// Blocking HTTP client against the GitHub REST API.
pub struct GitHubTransport {
    client: Client,
    api_base: String,
}

impl GitHubTransport {
    /// Build a client for `api_base` with a fixed timeout. When a token is
    /// given it is sent as `Authorization: token ...` on every request; the
    /// header is marked sensitive so it never appears in debug output.
    pub fn new(api_base: &str, timeout_secs: u64, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("token {token}"))
                .map_err(|_| Error::Unauthorized("token contains characters that cannot be sent in a header".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT_VALUE)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    /// Send a read-only request and parse the JSON body. Network failures
    /// are plain transport errors; reads are always safe to retry.
    fn send_read<T: DeserializeOwned>(&self, request: RequestBuilder, target: &str) -> Result<T> {
        let response = request.send()?;
        let response = check_status(response, target)?;
        read_json(response, target)
    }

    /// Send a mutating request. A timeout here means the request may have
    /// reached the server, so it maps to `Unknown` rather than a retryable
    /// transport error.
    fn send_mutation(
        &self,
        request: RequestBuilder,
        target: &str,
        action: &str,
    ) -> Result<Response> {
        let response = request.send().map_err(|err| {
            if err.is_timeout() {
                Error::Unknown(action.to_string())
            } else {
                Error::Transport(err)
            }
        })?;
        check_status(response, target)
    }

    fn list_repo_pages(&self, path: &str, target: &str) -> Result<Vec<Repository>> {
        let mut repos = Vec::new();
        for page in 1u32.. {
            debug!("GET {} page {}", path, page);
            let batch: Vec<Repository> = self.send_read(
                self.client.get(self.url(path)).query(&[
                    ("per_page", REPOS_PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ]),
                target,
            )?;
            if batch.is_empty() {
                break;
            }
            repos.extend(batch);
        }
        Ok(repos)
    }
}

impl ContentApi for GitHubTransport {
    fn current_user(&self) -> Result<TokenIdentity> {
        debug!("GET user");
        let response = self.client.get(self.url("user")).send()?;
        let response = check_status(response, "the configured token")?;
        let scopes = response
            .headers()
            .get("x-oauth-scopes")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|scopes| !scopes.is_empty())
            .map(str::to_string);
        let user: AuthenticatedUser = read_json(response, "the configured token")?;
        Ok(TokenIdentity {
            login: user.login,
            scopes,
        })
    }

    fn list_own_repos(&self) -> Result<Vec<Repository>> {
        self.list_repo_pages("user/repos", "repository listing")
    }

    fn list_public_repos(&self, username: &str) -> Result<Vec<Repository>> {
        self.list_repo_pages(
            &format!("users/{username}/repos"),
            &format!("repositories of '{username}'"),
        )
    }

    fn create_repo(&self, request: &CreateRepoRequest) -> Result<Repository> {
        debug!("POST user/repos name={}", request.name);
        let response = self.send_mutation(
            self.client.post(self.url("user/repos")).json(request),
            &request.name,
            &format!("creation of repository '{}'", request.name),
        )?;
        read_json(response, &request.name)
    }

    fn delete_repo(&self, owner: &str, name: &str) -> Result<()> {
        debug!("DELETE repos/{}/{}", owner, name);
        self.send_mutation(
            self.client.delete(self.url(&format!("repos/{owner}/{name}"))),
            &format!("repository {owner}/{name}"),
            &format!("deletion of repository {owner}/{name}"),
        )?;
        Ok(())
    }

    fn repo_metadata(&self, owner: &str, name: &str) -> Result<Repository> {
        debug!("GET repos/{}/{}", owner, name);
        self.send_read(
            self.client.get(self.url(&format!("repos/{owner}/{name}"))),
            &format!("repository {owner}/{name}"),
        )
    }

    fn update_visibility(&self, owner: &str, name: &str, private: bool) -> Result<Repository> {
        debug!("PATCH repos/{}/{} private={}", owner, name, private);
        let target = format!("repository {owner}/{name}");
        let response = self.send_mutation(
            self.client
                .patch(self.url(&format!("repos/{owner}/{name}")))
                .json(&UpdateRepoRequest { private }),
            &target,
            &format!("visibility change of {owner}/{name}"),
        )?;
        read_json(response, &target)
    }

    fn file_entry(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<ContentFile>> {
        debug!("GET repos/{}/{}/contents/{}", owner, name, path);
        let response = self
            .client
            .get(self.url(&format!("repos/{owner}/{name}/contents/{path}")))
            .query(&[("ref", branch)])
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response, path)?;
        match read_json(response, path)? {
            ContentsResponse::File(file) => Ok(Some(file)),
            ContentsResponse::Directory(_) => Ok(None),
        }
    }

    fn put_file(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        request: &PutContentsRequest,
    ) -> Result<ContentWriteResponse> {
        debug!("PUT repos/{}/{}/contents/{}", owner, name, path);
        let response = self.send_mutation(
            self.client
                .put(self.url(&format!("repos/{owner}/{name}/contents/{path}")))
                .json(request),
            path,
            &format!("upload of '{path}'"),
        )?;
        read_json(response, path)
    }

    fn delete_file(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        request: &DeleteContentsRequest,
    ) -> Result<()> {
        debug!("DELETE repos/{}/{}/contents/{}", owner, name, path);
        self.send_mutation(
            self.client
                .delete(self.url(&format!("repos/{owner}/{name}/contents/{path}")))
                .json(request),
            path,
            &format!("deletion of '{path}'"),
        )?;
        Ok(())
    }

    fn branch_head(&self, owner: &str, name: &str, branch: &str) -> Result<Option<String>> {
        debug!("GET repos/{}/{}/git/refs/heads/{}", owner, name, branch);
        let response = self
            .client
            .get(self.url(&format!("repos/{owner}/{name}/git/refs/heads/{branch}")))
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let target = format!("branch '{branch}'");
        let response = check_status(response, &target)?;
        let git_ref: GitRef = read_json(response, &target)?;
        Ok(Some(git_ref.object.sha))
    }

    fn tree(&self, owner: &str, name: &str, sha: &str) -> Result<TreeResponse> {
        debug!("GET repos/{}/{}/git/trees/{}", owner, name, sha);
        self.send_read(
            self.client
                .get(self.url(&format!("repos/{owner}/{name}/git/trees/{sha}")))
                .query(&[("recursive", "1")]),
            &format!("tree of {owner}/{name}"),
        )
    }

    fn blob(&self, owner: &str, name: &str, sha: &str) -> Result<GitBlob> {
        debug!("GET repos/{}/{}/git/blobs/{}", owner, name, sha);
        self.send_read(
            self.client
                .get(self.url(&format!("repos/{owner}/{name}/git/blobs/{sha}"))),
            &format!("blob {sha}"),
        )
    }

    fn gitignore_templates(&self) -> Result<Vec<String>> {
        self.send_read(
            self.client.get(self.url("gitignore/templates")),
            "gitignore templates",
        )
    }

    fn gitignore_template(&self, name: &str) -> Result<GitignoreTemplate> {
        self.send_read(
            self.client.get(self.url(&format!("gitignore/templates/{name}"))),
            &format!("gitignore template '{name}'"),
        )
    }

    fn licenses(&self) -> Result<Vec<LicenseSummary>> {
        self.send_read(self.client.get(self.url("licenses")), "licenses")
    }

    fn license(&self, key: &str) -> Result<License> {
        self.send_read(
            self.client.get(self.url(&format!("licenses/{key}"))),
            &format!("license '{key}'"),
        )
    }
}

/// Map a non-2xx response to the error taxonomy. The raw body goes to the
/// log file; the returned error only names the target.
fn check_status(response: Response, target: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    logger::log_to_file(&format!("api error {} for {}: {}", status, target, body.trim())).ok();
    Err(error_for_status(status, target, body))
}

/// Decode a 2xx body. A success whose body does not have the promised shape
/// is an `Api` error carrying the decode failure as detail, not a transport
/// error; the offending body goes to the log file.
fn read_json<T: DeserializeOwned>(response: Response, target: &str) -> Result<T> {
    let status = response.status().as_u16();
    let body = response.text()?;
    decode_body(status, &body, target)
}

fn decode_body<T: DeserializeOwned>(status: u16, body: &str, target: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|err| {
        logger::log_to_file(&format!(
            "malformed api body {} for {}: {}",
            status,
            target,
            body.trim()
        ))
        .ok();
        Error::Api {
            status,
            detail: err.to_string(),
        }
    })
}

fn error_for_status(status: StatusCode, target: &str, detail: String) -> Error {
    match status.as_u16() {
        401 => Error::Unauthorized(target.to_string()),
        403 => Error::InsufficientPermission(target.to_string()),
        404 => Error::NotFound(target.to_string()),
        409 | 422 => Error::ConflictingWrite {
            path: target.to_string(),
        },
        413 => Error::PayloadTooLarge {
            size: 0,
            limit: MAX_CONTENT_UPLOAD_BYTES,
        },
        _ => Error::Api {
            status: status.as_u16(),
            detail,
        },
    }
}
