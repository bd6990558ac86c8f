use thiserror::Error;

/// Result alias used throughout the core modules.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the vault, directory, transport and orchestrator.
///
/// Each variant's `Display` string is the human-readable category shown to the
/// user. Raw transport payloads are never part of these messages; they are
/// preserved separately for the history sink and the log file.
#[derive(Debug, Error)]
pub enum Error {
    /// The supplied password does not match the stored verifier.
    #[error("invalid password")]
    InvalidPassword,

    /// Authenticated decryption failed: wrong key, corrupted data, or
    /// tampering. Indistinguishable by design at the cipher layer.
    #[error("decryption failed: data could not be authenticated")]
    AuthenticationFailed,

    /// Stored credential material is inconsistent with its metadata
    /// (truncated row, wrong-length salt or nonce, undecryptable ciphertext
    /// after a successful password check).
    #[error("credential store is corrupted: {0}")]
    VaultCorrupted(String),

    /// `initialize` was called with a password while one is already set.
    /// Re-keying requires the old password; use change-password.
    #[error("a password is already set; use change-password")]
    PasswordAlreadySet,

    /// The repository reference is neither `owner/name` nor a GitHub URL.
    #[error("malformed repository reference '{0}': expected owner/name or a GitHub URL")]
    MalformedReference(String),

    /// No explicit branch, no default branch, and neither `main` nor
    /// `master` exists on the repository.
    #[error("could not resolve a branch for {repo}: no default branch and neither 'main' nor 'master' exists")]
    BranchUnresolved { repo: String },

    /// The payload exceeds the content API's single-request limit. `size` is
    /// zero when the rejection came from the server rather than preflight.
    #[error("payload exceeds the content API upload limit ({limit} bytes)")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// The server rejected a write because remote state does not match the
    /// request: a stale or missing sha for an existing path, or a name that
    /// is already taken.
    #[error("conflicting write on '{path}': remote state does not match the request")]
    ConflictingWrite { path: String },

    /// The requested repository, file, ref, or template does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server truncated a recursive tree listing; the result would be
    /// incomplete and must not be acted on.
    #[error("tree listing is incomplete: the server truncated the response")]
    TreeTruncated,

    /// The upload half of a rename succeeded but the delete half failed, so
    /// both paths currently exist. Retry only the delete after re-checking.
    #[error("rename incomplete: '{new_path}' was created but '{old_path}' could not be deleted")]
    PartialRename {
        new_path: String,
        old_path: String,
        #[source]
        cause: Box<Error>,
    },

    /// The folder changed between listing and deletion. `deleted` reports how
    /// many entries had already been removed (zero when detected up front).
    #[error("folder contents changed during recursive delete ({deleted} entries already removed); re-list before retrying")]
    ConcurrentModification { deleted: usize },

    /// The token is valid but lacks the scope or role for this operation.
    #[error("permission denied: {0}")]
    InsufficientPermission(String),

    /// The token is missing, invalid, or expired.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Network-level failure before a response was received. Retryable by the
    /// caller at whole-operation granularity only.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A mutating call timed out or the connection dropped after the request
    /// was sent; the operation may or may not have completed. The caller must
    /// re-query state before retrying.
    #[error("outcome unknown: {0} may or may not have completed; re-check remote state before retrying")]
    Unknown(String),

    /// Response outside the taxonomy: an unexpected status code, or a 2xx
    /// whose body does not have the promised shape.
    #[error("unexpected api response (status {status})")]
    Api { status: u16, detail: String },

    /// Local persistence failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl Error {
    /// Detail string destined for the history sink and the log file. Carries
    /// raw server payloads where the display message deliberately does not.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::Api { detail, .. } => Some(detail),
            _ => None,
        }
    }
}
