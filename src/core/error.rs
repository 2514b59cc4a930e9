use rusqlite;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrcError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(
        "Refusing to delete {id} at {}: working tree has {modified} modified and {untracked} untracked file(s). Commit or discard the changes, or re-run with --force.",
        path.display()
    )]
    DirtyWorktree {
        id: String,
        path: PathBuf,
        modified: usize,
        untracked: usize,
    },
    #[error(
        "Refusing to delete {id} at {}: could not determine whether the working tree is dirty ({reason}). Re-run with --force to delete anyway.",
        path.display()
    )]
    DirtyUnknown {
        id: String,
        path: PathBuf,
        reason: String,
    },
    #[error("Effect {effect} failed: {reason}")]
    Effect { effect: String, reason: String },
    #[error("Workshop {0} is locked by another apply in progress")]
    Locked(String),
}
