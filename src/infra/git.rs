//! Version-control working-tree adapter.

use crate::infra::descriptor::CONTROL_DIR;
use crate::infra::runner::{CommandRunner, ProcessRunner};
use serde::Serialize;
use std::path::Path;

/// Result of inspecting a directory for uncommitted work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DirtyState {
    Clean,
    Dirty { modified: usize, untracked: usize },
    /// No `.git` entry: not a version-controlled tree.
    NotTracked,
    /// The tree is version controlled but inspection failed.
    Unknown { reason: String },
}

impl DirtyState {
    /// Planning view: inspection failures count as not dirty.
    pub fn is_dirty(&self) -> bool {
        matches!(self, DirtyState::Dirty { .. })
    }
}

pub trait WorktreeAdapter {
    fn is_worktree(&self, path: &Path) -> bool;
    fn dirty_state(&self, path: &Path) -> DirtyState;
    /// `git worktree add` of `branch` from `repo` at `path`, creating the branch if needed.
    fn add_worktree(&self, repo: &Path, path: &Path, branch: &str) -> Result<(), String>;
}

pub struct GitCli<R: CommandRunner = ProcessRunner> {
    runner: R,
}

impl GitCli<ProcessRunner> {
    pub fn new() -> Self {
        Self {
            runner: ProcessRunner,
        }
    }
}

impl Default for GitCli<ProcessRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> GitCli<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}

impl<R: CommandRunner> WorktreeAdapter for GitCli<R> {
    fn is_worktree(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    fn dirty_state(&self, path: &Path) -> DirtyState {
        if !self.is_worktree(path) {
            return DirtyState::NotTracked;
        }
        let dir = path.to_string_lossy();
        match self
            .runner
            .run("git", &["-C", dir.as_ref(), "status", "--porcelain"])
        {
            Ok(out) => {
                let (modified, untracked) = count_porcelain(&out);
                if modified == 0 && untracked == 0 {
                    DirtyState::Clean
                } else {
                    DirtyState::Dirty {
                        modified,
                        untracked,
                    }
                }
            }
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "git status failed");
                DirtyState::Unknown { reason }
            }
        }
    }

    fn add_worktree(&self, repo: &Path, path: &Path, branch: &str) -> Result<(), String> {
        let repo = repo.to_string_lossy();
        let target = path.to_string_lossy();
        let first = self.runner.run(
            "git",
            &["-C", repo.as_ref(), "worktree", "add", "-b", branch, target.as_ref()],
        );
        if first.is_ok() {
            return Ok(());
        }
        // Branch may already exist: check it out instead of creating it.
        self.runner
            .run(
                "git",
                &["-C", repo.as_ref(), "worktree", "add", target.as_ref(), branch],
            )
            .map(|_| ())
            .map_err(|stderr| format!("git worktree add failed: {}", stderr))
    }
}

/// `(modified, untracked)` from `git status --porcelain` output. Entries under
/// the control directory are ours and never count.
pub fn count_porcelain(output: &str) -> (usize, usize) {
    let mut modified = 0;
    let mut untracked = 0;
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let entry = line.get(3..).unwrap_or("").trim_matches('"');
        if entry == CONTROL_DIR || entry.starts_with(&format!("{}/", CONTROL_DIR)) {
            continue;
        }
        if line.starts_with("??") {
            untracked += 1;
        } else {
            modified += 1;
        }
    }
    (modified, untracked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::runner::MockRunner;

    #[test]
    fn porcelain_counts_split_untracked() {
        let out = " M src/lib.rs\nA  new.rs\n?? scratch.txt\n\n";
        assert_eq!(count_porcelain(out), (2, 1));
        assert_eq!(count_porcelain(""), (0, 0));
    }

    #[test]
    fn control_dir_entries_are_ignored() {
        let out = "?? .orc/\n M .orc/config.json\n?? notes.md\n";
        assert_eq!(count_porcelain(out), (0, 1));
    }

    #[test]
    fn directory_without_git_is_not_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::with_runner(MockRunner::new());
        assert_eq!(git.dirty_state(dir.path()), DirtyState::NotTracked);
        assert!(git.runner().executed_commands().is_empty());
    }

    #[test]
    fn failed_status_is_unknown_and_not_dirty_for_planning() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let git = GitCli::with_runner(MockRunner::with_responses(vec![Err(
            "fatal: not a git repository".into(),
        )]));
        let state = git.dirty_state(dir.path());
        assert!(matches!(state, DirtyState::Unknown { .. }));
        assert!(!state.is_dirty());
    }

    #[test]
    fn dirty_status_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".git"), "gitdir: /elsewhere").unwrap();
        let git = GitCli::with_runner(MockRunner::with_responses(vec![Ok(
            " M a\n M b\n?? c\n".into(),
        )]));
        assert_eq!(
            git.dirty_state(dir.path()),
            DirtyState::Dirty {
                modified: 2,
                untracked: 1
            }
        );
    }

    #[test]
    fn add_worktree_falls_back_to_existing_branch() {
        let git = GitCli::with_runner(MockRunner::with_responses(vec![
            Err("fatal: a branch named 'orc/a' already exists".into()),
            Ok(String::new()),
        ]));
        git.add_worktree(Path::new("/repo"), Path::new("/w/a"), "orc/a")
            .unwrap();
        let cmds = git.runner().executed_commands();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0], "git -C /repo worktree add -b orc/a /w/a");
        assert_eq!(cmds[1], "git -C /repo worktree add /w/a orc/a");
    }
}
