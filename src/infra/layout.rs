//! Filesystem layout and multiplexer naming conventions.
//!
//! - workbench trees: `<workbenches_root>/<workbench-name>`
//! - gatehouses: `<gatehouses_root>/<workshop-id>`
//! - one tmux session per workshop, tagged with the workshop id
//! - bootstrap window `goblin-<NNN>` from the gatehouse id suffix; workbench windows
//!   are named after the workbench
//! - window option `@orc_agent` holds `ROLE-NAME@ID`

use crate::catalog::{Workbench, Workshop, id_suffix};
use std::path::{Path, PathBuf};

pub const BOOTSTRAP_WINDOW_PREFIX: &str = "goblin";
pub const BOOTSTRAP_ROLE: &str = "GOBLIN";
pub const WORKBENCH_ROLE: &str = "IMP";
pub const AGENT_OPTION: &str = "@orc_agent";
pub const WORKSHOP_OPTION: &str = "@orc_workshop";
pub const WORKSHOP_ENV: &str = "ORC_WORKSHOP_ID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub workbenches_root: PathBuf,
    pub gatehouses_root: PathBuf,
}

impl Layout {
    pub fn new(workbenches_root: impl Into<PathBuf>, gatehouses_root: impl Into<PathBuf>) -> Self {
        Self {
            workbenches_root: workbenches_root.into(),
            gatehouses_root: gatehouses_root.into(),
        }
    }

    pub fn workbench_path(&self, workbench_name: &str) -> PathBuf {
        self.workbenches_root.join(workbench_name)
    }

    pub fn gatehouse_path(&self, workshop_id: &str) -> PathBuf {
        self.gatehouses_root.join(workshop_id)
    }
}

/// Session name for a newly created session. Existing sessions are found by tag.
pub fn session_name(workshop: &Workshop) -> String {
    format!("{}-{}", workshop.name, workshop.id)
        .chars()
        .map(|c| if c == '.' || c == ':' { '_' } else { c })
        .collect()
}

pub fn bootstrap_window_name(gatehouse_id: &str) -> String {
    let suffix = id_suffix(gatehouse_id).unwrap_or(gatehouse_id);
    format!("{}-{}", BOOTSTRAP_WINDOW_PREFIX, suffix)
}

pub fn is_bootstrap_window_name(name: &str) -> bool {
    name.strip_prefix(BOOTSTRAP_WINDOW_PREFIX)
        .is_some_and(|rest| rest.starts_with('-'))
}

pub fn agent_tag(role: &str, name: &str, id: &str) -> String {
    format!("{}-{}@{}", role, name, id)
}

pub fn bootstrap_agent_tag(workshop: &Workshop, gatehouse_id: &str) -> String {
    agent_tag(BOOTSTRAP_ROLE, &workshop.name, gatehouse_id)
}

pub fn workbench_agent_tag(workbench: &Workbench) -> String {
    agent_tag(WORKBENCH_ROLE, &workbench.name, &workbench.id)
}

pub fn agent_connect_command(agent_command: &str, tag: &str) -> String {
    format!("{} {}", agent_command, tag)
}

pub fn window_target(session: &str, index: u32) -> String {
    format!("{}:{}", session, index)
}

/// Target for the lowest-numbered window of a session (the placeholder after creation).
pub fn first_window_target(session: &str) -> String {
    format!("{}:^", session)
}

pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RecordStatus;

    fn workshop() -> Workshop {
        Workshop {
            id: "WORK-004".into(),
            name: "forge.v2".into(),
            factory_id: "FACT-001".into(),
            status: RecordStatus::Active,
        }
    }

    #[test]
    fn paths_are_derived_from_names_and_ids() {
        let layout = Layout::new("/w", "/g");
        assert_eq!(layout.workbench_path("bench-a"), PathBuf::from("/w/bench-a"));
        assert_eq!(layout.gatehouse_path("WORK-004"), PathBuf::from("/g/WORK-004"));
    }

    #[test]
    fn bootstrap_window_uses_gatehouse_suffix() {
        assert_eq!(bootstrap_window_name("GATE-003"), "goblin-003");
        assert!(is_bootstrap_window_name("goblin-003"));
        assert!(!is_bootstrap_window_name("goblinoid"));
    }

    #[test]
    fn session_name_avoids_target_separators() {
        assert_eq!(session_name(&workshop()), "forge_v2-WORK-004");
    }

    #[test]
    fn agent_tags_follow_role_name_at_id() {
        assert_eq!(
            bootstrap_agent_tag(&workshop(), "GATE-003"),
            "GOBLIN-forge.v2@GATE-003"
        );
        assert_eq!(
            agent_connect_command("orc connect", "IMP-a@BENCH-001"),
            "orc connect IMP-a@BENCH-001"
        );
    }
}
