use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use gitvault::handlers;
use gitvault::logger;
use gitvault::orchestrator::TemplateKind;

#[derive(Parser)]
#[command(name = "gitvault")]
#[command(
    about = "Manage GitHub repositories and their contents with an encrypted token vault",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new repository on the authenticated account
    CreateRepo {
        /// Repository name (prompted when omitted)
        name: Option<String>,

        /// Repository description
        #[arg(short, long)]
        description: Option<String>,

        /// Create the repository as private
        #[arg(long)]
        private: bool,

        /// Skip the initial commit, leaving the repository without branches
        #[arg(long)]
        no_init: bool,

        /// Gitignore template to initialize with (e.g. "Rust")
        #[arg(long)]
        gitignore: Option<String>,

        /// License template to initialize with (e.g. "mit")
        #[arg(long)]
        license: Option<String>,
    },

    /// List repositories
    ListRepos {
        /// List another user's public repositories instead of your own
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Delete a repository
    DeleteRepo {
        /// Repository name, or owner/name for another account
        name: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Work with the contents of one repository
    Setup {
        /// Repository as owner/name or a GitHub URL
        repo: String,

        /// Branch to operate on (defaults to the repository's default branch)
        #[arg(short, long)]
        branch: Option<String>,

        #[command(subcommand)]
        action: SetupAction,
    },

    /// Manage the stored token and vault password
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show recent actions and their outcomes
    History {
        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum SetupAction {
    /// Upload a local file to the repository
    Upload {
        /// Local file to upload
        file: PathBuf,

        /// Destination path in the repository (defaults to the file name)
        #[arg(short, long)]
        dest: Option<String>,

        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Delete a single file
    Delete {
        /// Path of the file to delete
        path: String,

        /// Commit message
        #[arg(short, long)]
        message: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// List files and folders
    List {
        /// Folder to list (defaults to the repository root)
        path: Option<String>,

        /// Recurse into subfolders
        #[arg(short, long)]
        recursive: bool,
    },

    /// Move or rename a file
    Rename {
        /// Current path
        old_path: String,

        /// New path
        new_path: String,

        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Delete a folder and everything under it
    DeleteFolder {
        /// Folder to delete
        path: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Switch the repository between public and private
    Visibility {
        /// Target visibility
        #[arg(value_enum)]
        state: VisibilityState,
    },

    /// Add a .gitignore file from a template
    Gitignore {
        /// Template name (interactive selection when omitted)
        template: Option<String>,
    },

    /// Add a LICENSE file from a template
    License {
        /// Template key such as "mit" (interactive selection when omitted)
        template: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Store a GitHub personal access token (validated before saving)
    SetToken,

    /// Print the stored token
    ShowToken,

    /// Delete the stored token, keeping any password
    DeleteToken {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Protect the vault with a password
    CreatePassword,

    /// Change the vault password
    ChangePassword,

    /// Remove the vault password (deletes the stored token too)
    DeletePassword {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Delete everything in the vault
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum VisibilityState {
    Public,
    Private,
}

fn main() -> Result<()> {
    logger::rotate_log_if_needed().ok();
    logger::init_logger()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::CreateRepo {
            name,
            description,
            private,
            no_init,
            gitignore,
            license,
        } => {
            handlers::handle_create_repo(name, description, private, !no_init, gitignore, license)?;
        }
        Commands::ListRepos { user } => {
            handlers::handle_list_repos(user)?;
        }
        Commands::DeleteRepo { name, yes } => {
            handlers::handle_delete_repo(&name, yes)?;
        }
        Commands::Setup {
            repo,
            branch,
            action,
        } => match action {
            SetupAction::Upload {
                file,
                dest,
                message,
            } => {
                handlers::handle_upload(&repo, branch, &file, dest, message)?;
            }
            SetupAction::Delete { path, message, yes } => {
                handlers::handle_delete_file(&repo, branch, &path, message, yes)?;
            }
            SetupAction::List { path, recursive } => {
                handlers::handle_list(&repo, branch, path, recursive)?;
            }
            SetupAction::Rename {
                old_path,
                new_path,
                message,
            } => {
                handlers::handle_rename(&repo, branch, &old_path, &new_path, message)?;
            }
            SetupAction::DeleteFolder { path, yes } => {
                handlers::handle_delete_folder(&repo, branch, &path, yes)?;
            }
            SetupAction::Visibility { state } => {
                handlers::handle_visibility(&repo, matches!(state, VisibilityState::Private))?;
            }
            SetupAction::Gitignore { template } => {
                handlers::handle_apply_template(&repo, branch, TemplateKind::Gitignore, template)?;
            }
            SetupAction::License { template } => {
                handlers::handle_apply_template(&repo, branch, TemplateKind::License, template)?;
            }
        },
        Commands::Settings { action } => match action {
            SettingsAction::SetToken => {
                handlers::handle_set_token()?;
            }
            SettingsAction::ShowToken => {
                handlers::handle_show_token()?;
            }
            SettingsAction::DeleteToken { yes } => {
                handlers::handle_delete_token(yes)?;
            }
            SettingsAction::CreatePassword => {
                handlers::handle_create_password()?;
            }
            SettingsAction::ChangePassword => {
                handlers::handle_change_password()?;
            }
            SettingsAction::DeletePassword { yes } => {
                handlers::handle_delete_password(yes)?;
            }
            SettingsAction::Reset { yes } => {
                handlers::handle_reset(yes)?;
            }
        },
        Commands::History { limit } => {
            handlers::handle_history(limit)?;
        }
    }

    Ok(())
}
