//! # gitvault
//!
//! A command-line tool for managing GitHub repositories and their contents, with the
//! access token kept in a locally encrypted vault.
//!
//! ## Overview
//!
//! `gitvault` covers the everyday repository chores that do not justify a clone: creating,
//! listing, and deleting repositories, uploading and deleting files, renaming, listing and
//! pruning folders, switching visibility, and dropping in `.gitignore` or `LICENSE` files
//! from GitHub's templates. All of it runs over the REST content API against a branch
//! resolved from the repository's metadata.
//!
//! The personal access token that authorizes these calls never touches disk in cleartext.
//! It lives in a small SQLite vault, encrypted with AES-256-GCM under a key derived from a
//! user password (or from a fixed fallback passphrase until one is set, so the at-rest
//! format never varies).
//!
//! ## Key Features
//!
//! - **Encrypted token storage**: PBKDF2-derived keys, authenticated encryption, and a
//!   password verifier checked before any decryption is attempted
//! - **Repository management**: create, list, and delete repositories from the terminal
//! - **Content operations**: upload, delete, list, rename, and recursive folder deletion,
//!   with drift detection when the remote changes mid-operation
//! - **Template support**: apply gitignore and license templates straight from the API
//! - **Action history**: every repository-changing action is recorded locally with its
//!   outcome for later review
//!
//! ## Architecture
//!
//! The library is organized into modules that handle different aspects of the tool:
//!
//! - Configuration and persistence ([`config`], [`store`])
//! - Credential encryption ([`vault`])
//! - GitHub API transport and wire types ([`github`])
//! - Reference parsing and branch resolution ([`directory`])
//! - Multi-step content operations ([`orchestrator`])
//! - Command handling and recording ([`handlers`], [`history`], [`logger`])

/// Platform-agnostic configuration directory management for gitvault.
///
/// Provides utilities for locating the configuration directory following platform
/// conventions (XDG on Linux, Application Support on macOS, AppData on Windows),
/// plus the on-disk application settings loaded from `config.toml`.
pub mod config;

/// Repository reference parsing and branch resolution.
///
/// Accepts `owner/name` shorthand or full GitHub URLs and normalizes them into a
/// typed reference. Resolves the branch to operate on from an explicit override,
/// the repository's default branch, or a probe of the conventional branch names.
pub mod directory;

/// Error taxonomy shared by the vault, transport, and orchestrator layers.
///
/// Remote failures are classified by HTTP status into stable variants so callers
/// can match on meaning rather than on status codes. Raw response payloads are
/// kept out of display messages and surfaced separately for logs and history.
pub mod error;

/// GitHub REST API transport and wire types.
///
/// A blocking HTTP client with the authorization header, API version header, and
/// pagination handled in one place, behind a trait so multi-step operations can
/// be tested without a network.
pub mod github;

/// Command handler modules.
///
/// One module per command group: repository management, content operations,
/// vault settings, and history display. Shared session plumbing (store access,
/// vault unlock, confirmation prompts) lives in the module root.
pub mod handlers;

/// Action history records and their encoding.
///
/// Every repository-changing action is recorded with a timestamp, target, and
/// outcome. Failure records carry the full error detail, including raw API
/// payloads that display messages omit.
pub mod history;

/// Logging configuration and utilities.
///
/// Sets up dual logging to both console (configurable via `RUST_LOG` environment
/// variable) and a persistent log file in the config directory. Includes automatic
/// log rotation when files exceed size limits.
pub mod logger;

/// Multi-step content operations over the GitHub content API.
///
/// Composes the low-level API calls into user-level operations: upload with a
/// size preflight, rename as copy-then-delete, recursive folder deletion with
/// drift detection, and template application.
pub mod orchestrator;

/// SQLite-backed persistence for the credential vault and action history.
///
/// Single-slot tables hold the encrypted credential and the password verifier;
/// an append-only table holds the action history. Storage is behind a trait so
/// the vault logic can be tested against scripted failures.
pub mod store;

/// Encrypted credential vault.
///
/// Encrypts the access token with AES-256-GCM under a PBKDF2-derived key. A
/// separately derived verifier distinguishes a wrong password from corrupted
/// data before any decryption is attempted. Without a password the same path
/// runs under a fixed fallback passphrase, so the at-rest format never varies.
pub mod vault;
