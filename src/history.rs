use chrono::{DateTime, Utc};

/// Kind of user-level action recorded in the history log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    CreateRepo,
    ListRepos,
    DeleteRepo,
    Upload,
    DeleteFile,
    ListTree,
    Rename,
    DeleteFolder,
    ChangeVisibility,
    ApplyTemplate,
    SetToken,
    DeleteToken,
    CreatePassword,
    ChangePassword,
    DeletePassword,
    Reset,
}

impl ActionKind {
    /// Returns the stable string form used in the history table
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreateRepo => "create_repo",
            ActionKind::ListRepos => "list_repos",
            ActionKind::DeleteRepo => "delete_repo",
            ActionKind::Upload => "upload",
            ActionKind::DeleteFile => "delete_file",
            ActionKind::ListTree => "list_tree",
            ActionKind::Rename => "rename",
            ActionKind::DeleteFolder => "delete_folder",
            ActionKind::ChangeVisibility => "change_visibility",
            ActionKind::ApplyTemplate => "apply_template",
            ActionKind::SetToken => "set_token",
            ActionKind::DeleteToken => "delete_token",
            ActionKind::CreatePassword => "create_password",
            ActionKind::ChangePassword => "change_password",
            ActionKind::DeletePassword => "delete_password",
            ActionKind::Reset => "reset",
        }
    }

    /// Parse the stable string form back into a kind
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create_repo" => Some(ActionKind::CreateRepo),
            "list_repos" => Some(ActionKind::ListRepos),
            "delete_repo" => Some(ActionKind::DeleteRepo),
            "upload" => Some(ActionKind::Upload),
            "delete_file" => Some(ActionKind::DeleteFile),
            "list_tree" => Some(ActionKind::ListTree),
            "rename" => Some(ActionKind::Rename),
            "delete_folder" => Some(ActionKind::DeleteFolder),
            "change_visibility" => Some(ActionKind::ChangeVisibility),
            "apply_template" => Some(ActionKind::ApplyTemplate),
            "set_token" => Some(ActionKind::SetToken),
            "delete_token" => Some(ActionKind::DeleteToken),
            "create_password" => Some(ActionKind::CreatePassword),
            "change_password" => Some(ActionKind::ChangePassword),
            "delete_password" => Some(ActionKind::DeletePassword),
            "reset" => Some(ActionKind::Reset),
            _ => None,
        }
    }
}

/// Whether the recorded action completed or failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Outcome::Success),
            "failure" => Some(Outcome::Failure),
            _ => None,
        }
    }
}

/// One append-only history entry. Records are never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    /// When the action finished
    pub timestamp: DateTime<Utc>,

    /// What was attempted
    pub action: ActionKind,

    /// The object acted on (repo, path, or a fixed marker for vault actions)
    pub target: String,

    /// Whether it completed
    pub outcome: Outcome,

    /// Raw error or transport payload preserved for diagnosis; not shown as
    /// the top-level user message
    pub detail: Option<String>,
}

impl ActionRecord {
    /// Record a completed action
    pub fn success(action: ActionKind, target: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            target: target.into(),
            outcome: Outcome::Success,
            detail: None,
        }
    }

    /// Record a failed action with its error detail
    pub fn failure(action: ActionKind, target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            target: target.into(),
            outcome: Outcome::Failure,
            detail: Some(detail.into()),
        }
    }
}
