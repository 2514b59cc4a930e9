//! Effects: data describing one atomic mutation, applied by an executor.
//!
//! Apply never touches the filesystem, git or tmux directly; it emits `Effect`
//! values and hands them to an `EffectExecutor`. Executors fail fast on the first
//! error and do not undo effects that already succeeded.

use crate::core::error::OrcError;
use crate::infra::git::WorktreeAdapter;
use crate::infra::tmux::TmuxAdapter;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Effect {
    Mkdir {
        path: PathBuf,
    },
    WriteFile {
        path: PathBuf,
        contents: String,
    },
    GitWorktreeAdd {
        repo: PathBuf,
        path: PathBuf,
        branch: String,
    },
    RemoveDir {
        path: PathBuf,
    },
    TmuxCreateSession {
        name: String,
        cwd: PathBuf,
        workshop_id: String,
    },
    TmuxRenameWindow {
        target: String,
        name: String,
    },
    TmuxCreateWindow {
        session: String,
        index: u32,
        name: String,
        cwd: PathBuf,
    },
    TmuxSetupPanes {
        target: String,
        cwd: PathBuf,
        editor_command: String,
        agent_command: String,
    },
    TmuxSetOption {
        target: String,
        key: String,
        value: String,
    },
    TmuxKillWindow {
        target: String,
    },
    TmuxKillSession {
        name: String,
    },
}

impl Effect {
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Mkdir { .. } => "mkdir",
            Effect::WriteFile { .. } => "write-file",
            Effect::GitWorktreeAdd { .. } => "git-worktree-add",
            Effect::RemoveDir { .. } => "remove-dir",
            Effect::TmuxCreateSession { .. } => "tmux-create-session",
            Effect::TmuxRenameWindow { .. } => "tmux-rename-window",
            Effect::TmuxCreateWindow { .. } => "tmux-create-window",
            Effect::TmuxSetupPanes { .. } => "tmux-setup-panes",
            Effect::TmuxSetOption { .. } => "tmux-set-option",
            Effect::TmuxKillWindow { .. } => "tmux-kill-window",
            Effect::TmuxKillSession { .. } => "tmux-kill-session",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Mkdir { path } | Effect::RemoveDir { path } => {
                write!(f, "{} {}", self.kind(), path.display())
            }
            Effect::WriteFile { path, .. } => write!(f, "{} {}", self.kind(), path.display()),
            Effect::GitWorktreeAdd { repo, path, branch } => write!(
                f,
                "{} {} -> {} ({})",
                self.kind(),
                repo.display(),
                path.display(),
                branch
            ),
            Effect::TmuxCreateSession { name, .. } | Effect::TmuxKillSession { name } => {
                write!(f, "{} {}", self.kind(), name)
            }
            Effect::TmuxRenameWindow { target, name } => {
                write!(f, "{} {} {}", self.kind(), target, name)
            }
            Effect::TmuxCreateWindow {
                session,
                index,
                name,
                ..
            } => write!(f, "{} {}:{} {}", self.kind(), session, index, name),
            Effect::TmuxSetupPanes { target, .. } | Effect::TmuxKillWindow { target } => {
                write!(f, "{} {}", self.kind(), target)
            }
            Effect::TmuxSetOption { target, key, value } => {
                write!(f, "{} {} {}={}", self.kind(), target, key, value)
            }
        }
    }
}

/// What applying one effect reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Index the multiplexer actually gave a created window.
    WindowCreated { index: u32 },
}

impl Outcome {
    /// Outcome assumed when an effect is recorded but not applied.
    fn presumed(effect: &Effect) -> Self {
        match effect {
            Effect::TmuxCreateWindow { index, .. } => Outcome::WindowCreated { index: *index },
            _ => Outcome::Done,
        }
    }
}

pub trait EffectExecutor {
    fn apply_effect(&mut self, effect: &Effect) -> Result<Outcome, OrcError>;

    /// Apply `effects` in order, stopping at the first failure.
    fn execute(&mut self, effects: &[Effect]) -> Result<(), OrcError> {
        for effect in effects {
            self.apply_effect(effect)?;
        }
        Ok(())
    }
}

fn failed(effect: &Effect, reason: impl fmt::Display) -> OrcError {
    OrcError::Effect {
        effect: effect.to_string(),
        reason: reason.to_string(),
    }
}

/// Applies effects to the real filesystem and the injected adapters.
pub struct SystemExecutor<'a> {
    git: &'a dyn WorktreeAdapter,
    tmux: Option<&'a dyn TmuxAdapter>,
}

impl<'a> SystemExecutor<'a> {
    pub fn new(git: &'a dyn WorktreeAdapter, tmux: Option<&'a dyn TmuxAdapter>) -> Self {
        Self { git, tmux }
    }

    fn tmux(&self, effect: &Effect) -> Result<&'a dyn TmuxAdapter, OrcError> {
        self.tmux
            .ok_or_else(|| failed(effect, "no multiplexer adapter configured"))
    }

    fn apply_one(&self, effect: &Effect) -> Result<Outcome, OrcError> {
        if let Effect::TmuxCreateWindow {
            session,
            index,
            name,
            cwd,
        } = effect
        {
            return self
                .tmux(effect)?
                .create_window(session, *index, name, cwd)
                .map(|index| Outcome::WindowCreated { index })
                .map_err(|e| failed(effect, e));
        }
        self.apply_plain(effect).map(|()| Outcome::Done)
    }

    fn apply_plain(&self, effect: &Effect) -> Result<(), OrcError> {
        match effect {
            Effect::Mkdir { path } => fs::create_dir_all(path).map_err(|e| failed(effect, e)),
            Effect::WriteFile { path, contents } => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|e| failed(effect, e))?;
                }
                fs::write(path, contents).map_err(|e| failed(effect, e))
            }
            Effect::GitWorktreeAdd { repo, path, branch } => self
                .git
                .add_worktree(repo, path, branch)
                .map_err(|e| failed(effect, e)),
            Effect::RemoveDir { path } => match fs::remove_dir_all(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(failed(effect, e)),
            },
            Effect::TmuxCreateSession {
                name,
                cwd,
                workshop_id,
            } => self
                .tmux(effect)?
                .create_session(name, cwd, workshop_id)
                .map_err(|e| failed(effect, e)),
            Effect::TmuxRenameWindow { target, name } => self
                .tmux(effect)?
                .rename_window(target, name)
                .map_err(|e| failed(effect, e)),
            Effect::TmuxCreateWindow { .. } => self.apply_one(effect).map(|_| ()),
            Effect::TmuxSetupPanes {
                target,
                cwd,
                editor_command,
                agent_command,
            } => self
                .tmux(effect)?
                .setup_panes(target, cwd, editor_command, agent_command)
                .map_err(|e| failed(effect, e)),
            Effect::TmuxSetOption { target, key, value } => self
                .tmux(effect)?
                .set_window_option(target, key, value)
                .map_err(|e| failed(effect, e)),
            Effect::TmuxKillWindow { target } => self
                .tmux(effect)?
                .kill_window(target)
                .map_err(|e| failed(effect, e)),
            Effect::TmuxKillSession { name } => self
                .tmux(effect)?
                .kill_session(name)
                .map_err(|e| failed(effect, e)),
        }
    }
}

impl EffectExecutor for SystemExecutor<'_> {
    fn apply_effect(&mut self, effect: &Effect) -> Result<Outcome, OrcError> {
        tracing::debug!(effect = %effect, "applying");
        self.apply_one(effect)
    }
}

/// Records every effect it is handed, optionally forwarding to an inner executor.
///
/// Without an inner executor nothing is applied, which makes it a no-op executor.
/// `fail_on` makes the first effect of that kind fail, for failure-path tests.
#[derive(Default)]
pub struct RecordingExecutor<'a> {
    pub effects: Vec<Effect>,
    inner: Option<Box<dyn EffectExecutor + 'a>>,
    fail_on: Option<&'static str>,
}

impl<'a> RecordingExecutor<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarding(inner: impl EffectExecutor + 'a) -> Self {
        Self {
            effects: Vec::new(),
            inner: Some(Box::new(inner)),
            fail_on: None,
        }
    }

    pub fn fail_on(mut self, kind: &'static str) -> Self {
        self.fail_on = Some(kind);
        self
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.effects.iter().map(Effect::kind).collect()
    }

    pub fn of_kind(&self, kind: &str) -> Vec<&Effect> {
        self.effects.iter().filter(|e| e.kind() == kind).collect()
    }
}

impl EffectExecutor for RecordingExecutor<'_> {
    fn apply_effect(&mut self, effect: &Effect) -> Result<Outcome, OrcError> {
        if self.fail_on == Some(effect.kind()) {
            self.fail_on = None;
            return Err(failed(effect, "injected failure"));
        }
        self.effects.push(effect.clone());
        match self.inner.as_mut() {
            Some(inner) => inner.apply_effect(effect),
            None => Ok(Outcome::presumed(effect)),
        }
    }
}
