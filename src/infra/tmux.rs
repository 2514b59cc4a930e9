//! Terminal multiplexer adapter.
//!
//! `TmuxCli` drives the tmux binary through a `CommandRunner`. Queries degrade to
//! "absent" on failure: a missing server, session or window is a valid observation.

use crate::infra::layout::{WORKSHOP_ENV, WORKSHOP_OPTION, path_string};
use crate::infra::runner::{CommandRunner, ProcessRunner};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub index: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneInfo {
    pub index: u32,
    pub start_path: String,
    pub start_command: String,
}

pub trait TmuxAdapter {
    /// Session tagged with `workshop_id`, if any.
    fn find_session(&self, workshop_id: &str) -> Option<String>;
    fn list_windows(&self, session: &str) -> Vec<WindowInfo>;
    fn window_option(&self, target: &str, key: &str) -> Option<String>;
    /// Panes of a window in pane-index order.
    fn list_panes(&self, target: &str) -> Vec<PaneInfo>;

    fn create_session(&self, name: &str, cwd: &Path, workshop_id: &str) -> Result<(), String>;
    fn rename_window(&self, target: &str, name: &str) -> Result<(), String>;
    /// Create a window at `index`, or append it when that index is taken.
    /// Returns the index the window actually got.
    fn create_window(&self, session: &str, index: u32, name: &str, cwd: &Path)
    -> Result<u32, String>;
    /// Pane 1 runs the editor, pane 2 the agent command, pane 3 a shell; all at `cwd`.
    fn setup_panes(
        &self,
        target: &str,
        cwd: &Path,
        editor_command: &str,
        agent_command: &str,
    ) -> Result<(), String>;
    fn set_window_option(&self, target: &str, key: &str, value: &str) -> Result<(), String>;
    fn kill_window(&self, target: &str) -> Result<(), String>;
    fn kill_session(&self, session: &str) -> Result<(), String>;
}

pub struct TmuxCli<R: CommandRunner = ProcessRunner> {
    runner: R,
}

impl TmuxCli<ProcessRunner> {
    pub fn new() -> Self {
        Self {
            runner: ProcessRunner,
        }
    }
}

impl Default for TmuxCli<ProcessRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> TmuxCli<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn tmux(&self, args: &[&str]) -> Result<String, String> {
        self.runner.run("tmux", args)
    }
}

impl<R: CommandRunner> TmuxAdapter for TmuxCli<R> {
    fn find_session(&self, workshop_id: &str) -> Option<String> {
        let out = self.tmux(&["list-sessions", "-F", "#{session_name}"]).ok()?;
        let mut sessions = parse_list_sessions(&out);
        sessions.sort();
        sessions.into_iter().find(|session| {
            self.tmux(&["show-environment", "-t", session, WORKSHOP_ENV])
                .ok()
                .and_then(|line| parse_environment_value(&line, WORKSHOP_ENV))
                .is_some_and(|value| value == workshop_id)
        })
    }

    fn list_windows(&self, session: &str) -> Vec<WindowInfo> {
        match self.tmux(&[
            "list-windows",
            "-t",
            session,
            "-F",
            "#{window_index}\t#{window_name}",
        ]) {
            Ok(out) => parse_list_windows(&out),
            Err(e) => {
                tracing::debug!(session, error = %e, "list-windows failed");
                Vec::new()
            }
        }
    }

    fn window_option(&self, target: &str, key: &str) -> Option<String> {
        let out = self
            .tmux(&["show-options", "-w", "-v", "-t", target, key])
            .ok()?;
        let value = out.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    fn list_panes(&self, target: &str) -> Vec<PaneInfo> {
        match self.tmux(&[
            "list-panes",
            "-t",
            target,
            "-F",
            "#{pane_index}\t#{pane_start_path}\t#{pane_start_command}",
        ]) {
            Ok(out) => parse_list_panes(&out),
            Err(e) => {
                tracing::debug!(target, error = %e, "list-panes failed");
                Vec::new()
            }
        }
    }

    fn create_session(&self, name: &str, cwd: &Path, workshop_id: &str) -> Result<(), String> {
        let cwd = path_string(cwd);
        self.tmux(&["new-session", "-d", "-s", name, "-c", &cwd])?;
        self.tmux(&["set-environment", "-t", name, WORKSHOP_ENV, workshop_id])?;
        self.tmux(&["set-option", "-t", name, WORKSHOP_OPTION, workshop_id])?;
        Ok(())
    }

    fn rename_window(&self, target: &str, name: &str) -> Result<(), String> {
        self.tmux(&["rename-window", "-t", target, name]).map(|_| ())
    }

    fn create_window(
        &self,
        session: &str,
        index: u32,
        name: &str,
        cwd: &Path,
    ) -> Result<u32, String> {
        let cwd = path_string(cwd);
        let at_index = format!("{}:{}", session, index);
        let out = match self.tmux(&[
            "new-window", "-d", "-P", "-F", "#{window_index}", "-t", &at_index, "-n", name,
            "-c", &cwd,
        ]) {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!(session, index, name, error = %e, "index taken; appending window");
                let append = format!("{}:", session);
                self.tmux(&[
                    "new-window", "-d", "-P", "-F", "#{window_index}", "-t", &append, "-n", name,
                    "-c", &cwd,
                ])?
            }
        };
        out.trim()
            .parse::<u32>()
            .map_err(|_| format!("new-window printed no window index: {:?}", out.trim()))
    }

    fn setup_panes(
        &self,
        target: &str,
        cwd: &Path,
        editor_command: &str,
        agent_command: &str,
    ) -> Result<(), String> {
        let cwd = path_string(cwd);
        self.tmux(&["respawn-pane", "-k", "-t", target, "-c", &cwd, editor_command])?;
        // Detached splits leave no "last" pane behind, so address the agent pane by id.
        let out = self.tmux(&[
            "split-window", "-d", "-h", "-P", "-F", "#{pane_id}", "-t", target, "-c", &cwd,
            agent_command,
        ])?;
        let agent_pane = out.trim();
        if agent_pane.is_empty() {
            return Err("split-window printed no pane id".to_string());
        }
        self.tmux(&["split-window", "-d", "-v", "-t", agent_pane, "-c", &cwd])?;
        Ok(())
    }

    fn set_window_option(&self, target: &str, key: &str, value: &str) -> Result<(), String> {
        self.tmux(&["set-option", "-w", "-t", target, key, value])
            .map(|_| ())
    }

    fn kill_window(&self, target: &str) -> Result<(), String> {
        self.tmux(&["kill-window", "-t", target]).map(|_| ())
    }

    fn kill_session(&self, session: &str) -> Result<(), String> {
        self.tmux(&["kill-session", "-t", session]).map(|_| ())
    }
}

pub fn parse_list_sessions(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// `KEY=value` from `show-environment`; `-KEY` (removed) yields `None`.
pub fn parse_environment_value(output: &str, key: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        (k == key).then(|| v.to_string())
    })
}

/// Lines of `index<TAB>name`.
pub fn parse_list_windows(output: &str) -> Vec<WindowInfo> {
    let mut windows = Vec::new();
    for line in output.lines() {
        let Some((index, name)) = line.split_once('\t') else {
            continue;
        };
        let Ok(index) = index.trim().parse::<u32>() else {
            continue;
        };
        windows.push(WindowInfo {
            index,
            name: name.to_string(),
        });
    }
    windows
}

/// Lines of `index<TAB>start_path<TAB>start_command`, sorted by index.
pub fn parse_list_panes(output: &str) -> Vec<PaneInfo> {
    let mut panes = Vec::new();
    for line in output.lines() {
        let parts: Vec<&str> = line.splitn(3, '\t').collect();
        if parts.len() < 2 {
            continue;
        }
        let Ok(index) = parts[0].trim().parse::<u32>() else {
            continue;
        };
        panes.push(PaneInfo {
            index,
            start_path: parts[1].to_string(),
            start_command: normalize_start_command(parts.get(2).copied().unwrap_or("")),
        });
    }
    panes.sort_by_key(|p| p.index);
    panes
}

/// tmux reports start commands wrapped in double quotes; strip one matching pair.
pub fn normalize_start_command(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}
