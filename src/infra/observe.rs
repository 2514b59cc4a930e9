//! Observed-state providers.
//!
//! Every query here answers "absent" instead of failing.

use crate::infra::layout::{AGENT_OPTION, window_target};
use crate::infra::tmux::{PaneInfo, TmuxAdapter};
use serde::Serialize;
use std::path::Path;

/// Panes checked per window.
pub const VERIFIED_PANES: usize = 3;

pub fn dir_exists(path: &Path) -> bool {
    path.is_dir()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedWindow {
    pub index: u32,
    pub name: String,
    pub agent: Option<String>,
    /// At most `VERIFIED_PANES`, in pane-index order.
    pub panes: Vec<PaneInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedSession {
    pub name: String,
    pub windows: Vec<ObservedWindow>,
}

/// Live view of the session tagged with `workshop_id`, if one exists.
pub fn observe_session(tmux: &dyn TmuxAdapter, workshop_id: &str) -> Option<ObservedSession> {
    let name = tmux.find_session(workshop_id)?;
    let mut windows: Vec<ObservedWindow> = tmux
        .list_windows(&name)
        .into_iter()
        .map(|w| {
            let target = window_target(&name, w.index);
            let mut panes = tmux.list_panes(&target);
            panes.truncate(VERIFIED_PANES);
            ObservedWindow {
                index: w.index,
                agent: tmux.window_option(&target, AGENT_OPTION),
                name: w.name,
                panes,
            }
        })
        .collect();
    windows.sort_by_key(|w| w.index);
    tracing::debug!(session = %name, windows = windows.len(), "observed session");
    Some(ObservedSession { name, windows })
}
