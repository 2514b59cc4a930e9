//! In-memory multiplexer for tests.
//!
//! Keeps just enough state (sessions, windows, window options, panes) to apply a
//! plan and observe the result again, and records every mutating call in order.

use crate::infra::layout::path_string;
use crate::infra::tmux::{PaneInfo, TmuxAdapter, WindowInfo};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

/// Name tmux gives the placeholder window of a fresh session.
pub const PLACEHOLDER_WINDOW: &str = "shell";

#[derive(Debug, Clone, Default)]
pub struct MemoryWindow {
    pub name: String,
    pub path: String,
    pub options: BTreeMap<String, String>,
    pub panes: Vec<PaneInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    pub workshop_id: Option<String>,
    pub windows: BTreeMap<u32, MemoryWindow>,
}

#[derive(Default)]
struct State {
    sessions: BTreeMap<String, MemorySession>,
    calls: Vec<String>,
    fail_kills: bool,
}

pub struct MemoryTmux {
    base_index: u32,
    state: RefCell<State>,
}

impl Default for MemoryTmux {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MemoryTmux {
    /// `base_index` is the index the placeholder window of a new session gets.
    pub fn new(base_index: u32) -> Self {
        Self {
            base_index,
            state: RefCell::new(State::default()),
        }
    }

    /// Seed a session tagged with `workshop_id` and no windows.
    pub fn add_session(&self, name: &str, workshop_id: &str) {
        self.state.borrow_mut().sessions.insert(
            name.to_string(),
            MemorySession {
                workshop_id: Some(workshop_id.to_string()),
                windows: BTreeMap::new(),
            },
        );
    }

    /// Seed a window with a single shell pane at `path`.
    pub fn add_window(&self, session: &str, index: u32, name: &str, path: &str) {
        let mut state = self.state.borrow_mut();
        let s = state.sessions.entry(session.to_string()).or_default();
        s.windows.insert(index, shell_window(name, path));
    }

    pub fn set_option(&self, session: &str, index: u32, key: &str, value: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(w) = state
            .sessions
            .get_mut(session)
            .and_then(|s| s.windows.get_mut(&index))
        {
            w.options.insert(key.to_string(), value.to_string());
        }
    }

    pub fn set_panes(&self, session: &str, index: u32, panes: Vec<PaneInfo>) {
        let mut state = self.state.borrow_mut();
        if let Some(w) = state
            .sessions
            .get_mut(session)
            .and_then(|s| s.windows.get_mut(&index))
        {
            w.panes = panes;
        }
    }

    /// Make every kill-window call fail, as if the window were already gone.
    pub fn fail_kills(&self) {
        self.state.borrow_mut().fail_kills = true;
    }

    pub fn session_names(&self) -> Vec<String> {
        self.state.borrow().sessions.keys().cloned().collect()
    }

    pub fn session(&self, name: &str) -> Option<MemorySession> {
        self.state.borrow().sessions.get(name).cloned()
    }

    /// `(index, name)` pairs in index order.
    pub fn windows(&self, session: &str) -> Vec<(u32, String)> {
        self.state
            .borrow()
            .sessions
            .get(session)
            .map(|s| {
                s.windows
                    .iter()
                    .map(|(i, w)| (*i, w.name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Mutating calls in the order they were made, e.g. `rename-window s:^ goblin-001`.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    fn record(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }

    fn with_window<T>(
        &self,
        target: &str,
        f: impl FnOnce(&mut MemoryWindow) -> T,
    ) -> Result<T, String> {
        let mut state = self.state.borrow_mut();
        let (session, window) = split_target(target);
        let s = state
            .sessions
            .get_mut(session)
            .ok_or_else(|| format!("can't find session: {}", session))?;
        let index = resolve_window(s, window)
            .ok_or_else(|| format!("can't find window: {}", target))?;
        let w = s
            .windows
            .get_mut(&index)
            .ok_or_else(|| format!("can't find window: {}", target))?;
        Ok(f(w))
    }
}

fn shell_window(name: &str, path: &str) -> MemoryWindow {
    MemoryWindow {
        name: name.to_string(),
        path: path.to_string(),
        options: BTreeMap::new(),
        panes: vec![PaneInfo {
            index: 0,
            start_path: path.to_string(),
            start_command: String::new(),
        }],
    }
}

fn split_target(target: &str) -> (&str, &str) {
    target.split_once(':').unwrap_or((target, "^"))
}

fn resolve_window(session: &MemorySession, window: &str) -> Option<u32> {
    if window == "^" || window.is_empty() {
        return session.windows.keys().next().copied();
    }
    if let Ok(index) = window.parse::<u32>() {
        return session.windows.contains_key(&index).then_some(index);
    }
    session
        .windows
        .iter()
        .find(|(_, w)| w.name == window)
        .map(|(i, _)| *i)
}

impl TmuxAdapter for MemoryTmux {
    fn find_session(&self, workshop_id: &str) -> Option<String> {
        self.state
            .borrow()
            .sessions
            .iter()
            .find(|(_, s)| s.workshop_id.as_deref() == Some(workshop_id))
            .map(|(name, _)| name.clone())
    }

    fn list_windows(&self, session: &str) -> Vec<WindowInfo> {
        self.windows(session)
            .into_iter()
            .map(|(index, name)| WindowInfo { index, name })
            .collect()
    }

    fn window_option(&self, target: &str, key: &str) -> Option<String> {
        self.with_window(target, |w| w.options.get(key).cloned())
            .ok()
            .flatten()
    }

    fn list_panes(&self, target: &str) -> Vec<PaneInfo> {
        self.with_window(target, |w| w.panes.clone())
            .unwrap_or_default()
    }

    fn create_session(&self, name: &str, cwd: &Path, workshop_id: &str) -> Result<(), String> {
        let cwd = path_string(cwd);
        self.record(format!("new-session {} {}", name, cwd));
        let mut state = self.state.borrow_mut();
        if state.sessions.contains_key(name) {
            return Err(format!("duplicate session: {}", name));
        }
        let mut windows = BTreeMap::new();
        windows.insert(self.base_index, shell_window(PLACEHOLDER_WINDOW, &cwd));
        state.sessions.insert(
            name.to_string(),
            MemorySession {
                workshop_id: Some(workshop_id.to_string()),
                windows,
            },
        );
        Ok(())
    }

    fn rename_window(&self, target: &str, name: &str) -> Result<(), String> {
        self.record(format!("rename-window {} {}", target, name));
        self.with_window(target, |w| w.name = name.to_string())
    }

    fn create_window(
        &self,
        session: &str,
        index: u32,
        name: &str,
        cwd: &Path,
    ) -> Result<u32, String> {
        let cwd = path_string(cwd);
        self.record(format!("new-window {}:{} {}", session, index, name));
        let mut state = self.state.borrow_mut();
        let s = state
            .sessions
            .get_mut(session)
            .ok_or_else(|| format!("can't find session: {}", session))?;
        let index = if s.windows.contains_key(&index) {
            s.windows.keys().next_back().map_or(index, |last| last + 1)
        } else {
            index
        };
        s.windows.insert(index, shell_window(name, &cwd));
        Ok(index)
    }

    fn setup_panes(
        &self,
        target: &str,
        cwd: &Path,
        editor_command: &str,
        agent_command: &str,
    ) -> Result<(), String> {
        let cwd = path_string(cwd);
        self.record(format!("setup-panes {}", target));
        self.with_window(target, |w| {
            w.panes = [editor_command, agent_command, ""]
                .iter()
                .enumerate()
                .map(|(i, cmd)| PaneInfo {
                    index: i as u32,
                    start_path: cwd.clone(),
                    start_command: cmd.to_string(),
                })
                .collect();
        })
    }

    fn set_window_option(&self, target: &str, key: &str, value: &str) -> Result<(), String> {
        self.record(format!("set-option {} {} {}", target, key, value));
        self.with_window(target, |w| {
            w.options.insert(key.to_string(), value.to_string());
        })
    }

    fn kill_window(&self, target: &str) -> Result<(), String> {
        self.record(format!("kill-window {}", target));
        if self.state.borrow().fail_kills {
            return Err(format!("can't find window: {}", target));
        }
        let mut state = self.state.borrow_mut();
        let (session, window) = split_target(target);
        let s = state
            .sessions
            .get_mut(session)
            .ok_or_else(|| format!("can't find session: {}", session))?;
        let index = resolve_window(s, window)
            .ok_or_else(|| format!("can't find window: {}", target))?;
        s.windows.remove(&index);
        Ok(())
    }

    fn kill_session(&self, session: &str) -> Result<(), String> {
        self.record(format!("kill-session {}", session));
        self.state
            .borrow_mut()
            .sessions
            .remove(session)
            .map(|_| ())
            .ok_or_else(|| format!("can't find session: {}", session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_placeholder_at_base_index() {
        let tmux = MemoryTmux::new(1);
        tmux.create_session("s", Path::new("/g"), "WORK-001").unwrap();
        assert_eq!(tmux.find_session("WORK-001"), Some("s".to_string()));
        assert_eq!(tmux.windows("s"), vec![(1, PLACEHOLDER_WINDOW.to_string())]);
    }

    #[test]
    fn first_window_target_resolves_lowest_index() {
        let tmux = MemoryTmux::new(1);
        tmux.create_session("s", Path::new("/g"), "WORK-001").unwrap();
        tmux.create_window("s", 2, "bench.a", Path::new("/w/bench.a"))
            .unwrap();
        tmux.rename_window("s:^", "goblin-001").unwrap();
        assert_eq!(
            tmux.windows("s"),
            vec![(1, "goblin-001".to_string()), (2, "bench.a".to_string())]
        );
    }

    #[test]
    fn taken_index_appends() {
        let tmux = MemoryTmux::new(1);
        tmux.add_session("s", "WORK-001");
        tmux.add_window("s", 1, "a", "/w/a");
        let index = tmux.create_window("s", 1, "b", Path::new("/w/b")).unwrap();
        assert_eq!(index, 2);
        assert_eq!(tmux.windows("s")[1], (2, "b".to_string()));
    }

    #[test]
    fn setup_panes_records_three_panes() {
        let tmux = MemoryTmux::new(1);
        tmux.add_session("s", "WORK-001");
        tmux.add_window("s", 1, "a", "/w/a");
        tmux.setup_panes("s:1", Path::new("/w/a"), "vim", "orc connect IMP-a@BENCH-001")
            .unwrap();
        let panes = tmux.list_panes("s:1");
        assert_eq!(panes.len(), 3);
        assert_eq!(panes[1].start_command, "orc connect IMP-a@BENCH-001");
        assert!(panes.iter().all(|p| p.start_path == "/w/a"));
    }

    #[test]
    fn failing_kills_leave_windows_in_place() {
        let tmux = MemoryTmux::new(1);
        tmux.add_session("s", "WORK-001");
        tmux.add_window("s", 3, "stray", "/tmp");
        tmux.fail_kills();
        assert!(tmux.kill_window("s:3").is_err());
        assert_eq!(tmux.windows("s").len(), 1);
    }
}
