//! Plan generation: a pure diff of desired against observed state.
//!
//! `generate_plan` does no I/O. The same snapshot always produces the same plan.

use crate::infra::git::DirtyState;
use crate::infra::layout::{
    agent_connect_command, bootstrap_agent_tag, bootstrap_window_name, is_bootstrap_window_name,
    path_string, workbench_agent_tag,
};
use crate::infra::observe::{ObservedSession, ObservedWindow, VERIFIED_PANES};
use crate::infra::snapshot::{OrphanState, Snapshot};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    Create,
    Delete,
    /// Cataloged but physically absent; must be recreated.
    Missing,
    NoOp,
}

impl OpStatus {
    pub fn needs_action(&self) -> bool {
        !matches!(self, OpStatus::NoOp)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpStatus::Create => "create",
            OpStatus::Delete => "delete",
            OpStatus::Missing => "missing",
            OpStatus::NoOp => "noop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatehouseOp {
    /// `None` until apply creates the catalog record.
    pub id: Option<String>,
    pub path: PathBuf,
    pub status: OpStatus,
    pub config_status: OpStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkbenchOp {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub repo_id: Option<String>,
    pub branch: String,
    pub status: OpStatus,
    pub config_status: OpStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanOp {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub dirty: DirtyState,
    pub status: OpStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum WindowKey {
    Bootstrap,
    Workbench(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaneCheck {
    /// 1-based position among the window's panes.
    pub position: u32,
    pub expected_path: String,
    pub actual_path: Option<String>,
    /// `None` means any command is accepted (the shell pane).
    pub expected_command: Option<String>,
    pub actual_command: Option<String>,
    pub path_ok: bool,
    pub command_ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowOp {
    pub key: WindowKey,
    /// `None` for the bootstrap window while no gatehouse record exists.
    pub name: Option<String>,
    pub index: u32,
    pub path: PathBuf,
    pub expected_agent: Option<String>,
    pub actual_agent: Option<String>,
    pub exists: bool,
    pub status: OpStatus,
    pub agent_ok: bool,
    pub panes: Vec<PaneCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanWindowOp {
    pub index: u32,
    pub name: String,
    pub status: OpStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TmuxSessionOp {
    pub name: String,
    pub exists: bool,
    pub status: OpStatus,
    pub windows: Vec<WindowOp>,
    pub orphan_windows: Vec<OrphanWindowOp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub workshop_id: String,
    pub workshop_name: String,
    pub factory_id: String,
    pub factory_name: String,
    pub workshop_archived: bool,
    pub gatehouse: GatehouseOp,
    pub workbenches: Vec<WorkbenchOp>,
    pub orphan_workbenches: Vec<OrphanOp>,
    pub orphan_gatehouses: Vec<OrphanOp>,
    /// `None` when no multiplexer is configured.
    pub tmux: Option<TmuxSessionOp>,
}

impl Plan {
    /// Whether anything is Create, Missing or Delete. Agent tag mismatches alone do
    /// not count.
    pub fn needs_action(&self) -> bool {
        let gatehouse =
            self.gatehouse.status.needs_action() || self.gatehouse.config_status.needs_action();
        let workbenches = self
            .workbenches
            .iter()
            .any(|w| w.status.needs_action() || w.config_status.needs_action());
        let orphans = self
            .orphan_workbenches
            .iter()
            .chain(&self.orphan_gatehouses)
            .any(|o| o.status.needs_action());
        let tmux = self.tmux.as_ref().is_some_and(|t| {
            t.status.needs_action()
                || t.windows.iter().any(|w| w.status.needs_action())
                || t.orphan_windows.iter().any(|w| w.status.needs_action())
        });
        gatehouse || workbenches || orphans || tmux
    }
}

fn presence(exists: bool, absent: OpStatus) -> OpStatus {
    if exists { OpStatus::NoOp } else { absent }
}

pub fn generate_plan(snapshot: &Snapshot) -> Plan {
    let gh = &snapshot.gatehouse;
    let gatehouse = match &gh.record {
        Some(record) => GatehouseOp {
            id: Some(record.id.clone()),
            path: gh.path.clone(),
            status: presence(gh.dir_exists, OpStatus::Missing),
            config_status: presence(gh.config_current, OpStatus::Create),
        },
        None => GatehouseOp {
            id: None,
            path: gh.path.clone(),
            status: OpStatus::Create,
            config_status: OpStatus::Create,
        },
    };

    let workbenches = snapshot
        .workbenches
        .iter()
        .map(|w| WorkbenchOp {
            id: w.workbench.id.clone(),
            name: w.workbench.name.clone(),
            path: w.path.clone(),
            repo_id: w.workbench.repo_id.clone(),
            branch: w.branch.clone(),
            status: presence(w.dir_exists, OpStatus::Create),
            config_status: presence(w.config_current, OpStatus::Create),
        })
        .collect();

    let tmux = snapshot.tmux_enabled.then(|| plan_session(snapshot));

    Plan {
        workshop_id: snapshot.workshop.id.clone(),
        workshop_name: snapshot.workshop.name.clone(),
        factory_id: snapshot.factory.id.clone(),
        factory_name: snapshot.factory.name.clone(),
        workshop_archived: snapshot.workshop.is_archived(),
        gatehouse,
        workbenches,
        orphan_workbenches: orphan_ops(&snapshot.orphan_workbenches),
        orphan_gatehouses: orphan_ops(&snapshot.orphan_gatehouses),
        tmux,
    }
}

fn orphan_ops(orphans: &[OrphanState]) -> Vec<OrphanOp> {
    orphans
        .iter()
        .map(|o| OrphanOp {
            id: o.orphan.id.clone(),
            name: o.orphan.name.clone(),
            path: o.orphan.path.clone(),
            dirty: o.dirty.clone(),
            status: OpStatus::Delete,
        })
        .collect()
}

/// A window the workshop should have, before it is matched against observation.
struct Expected {
    key: WindowKey,
    name: Option<String>,
    path: PathBuf,
    agent: Option<String>,
}

fn expected_windows(snapshot: &Snapshot) -> Vec<Expected> {
    if snapshot.workshop.is_archived() {
        return Vec::new();
    }
    let gatehouse_id = snapshot.gatehouse.record.as_ref().map(|g| g.id.as_str());
    let mut expected = vec![Expected {
        key: WindowKey::Bootstrap,
        name: gatehouse_id.map(bootstrap_window_name),
        path: snapshot.gatehouse.path.clone(),
        agent: gatehouse_id.map(|id| bootstrap_agent_tag(&snapshot.workshop, id)),
    }];
    expected.extend(snapshot.workbenches.iter().map(|w| Expected {
        key: WindowKey::Workbench(w.workbench.id.clone()),
        name: Some(w.workbench.name.clone()),
        path: w.path.clone(),
        agent: Some(workbench_agent_tag(&w.workbench)),
    }));
    expected
}

fn plan_session(snapshot: &Snapshot) -> TmuxSessionOp {
    let archived = snapshot.workshop.is_archived();
    let observed: Option<&ObservedSession> = snapshot.session.as_ref();
    let observed_windows: &[ObservedWindow] = observed.map_or(&[], |s| s.windows.as_slice());

    let mut claimed: HashSet<u32> = HashSet::new();
    let mut occupied: HashSet<u32> = observed_windows.iter().map(|w| w.index).collect();
    let mut windows = Vec::new();

    for (position, exp) in expected_windows(snapshot).into_iter().enumerate() {
        let found = exp.name.as_deref().and_then(|name| {
            observed_windows
                .iter()
                .find(|w| w.name == name && !claimed.contains(&w.index))
        });
        let op = match found {
            Some(win) => {
                claimed.insert(win.index);
                let panes = verify_panes(snapshot, &exp, win);
                WindowOp {
                    agent_ok: exp.agent.is_some() && exp.agent == win.agent,
                    key: exp.key,
                    name: exp.name,
                    index: win.index,
                    path: exp.path,
                    expected_agent: exp.agent,
                    actual_agent: win.agent.clone(),
                    exists: true,
                    status: OpStatus::NoOp,
                    panes,
                }
            }
            None => {
                let mut index = snapshot.conventions.base_index + position as u32;
                while occupied.contains(&index) {
                    index += 1;
                }
                occupied.insert(index);
                WindowOp {
                    key: exp.key,
                    name: exp.name,
                    index,
                    path: exp.path,
                    expected_agent: exp.agent,
                    actual_agent: None,
                    exists: false,
                    status: OpStatus::Create,
                    agent_ok: false,
                    panes: Vec::new(),
                }
            }
        };
        windows.push(op);
    }

    // With no gatehouse record the bootstrap name is unknown, so an existing
    // bootstrap window cannot be matched; leave it alone rather than kill it.
    let bootstrap_unresolved = windows
        .iter()
        .any(|w| w.key == WindowKey::Bootstrap && w.name.is_none());
    let orphan_windows = observed_windows
        .iter()
        .filter(|w| !claimed.contains(&w.index))
        .filter(|w| !(bootstrap_unresolved && is_bootstrap_window_name(&w.name)))
        .map(|w| OrphanWindowOp {
            index: w.index,
            name: w.name.clone(),
            status: OpStatus::Delete,
        })
        .collect();

    let exists = observed.is_some();
    let status = match (archived, exists) {
        (true, true) => OpStatus::Delete,
        (true, false) | (false, true) => OpStatus::NoOp,
        (false, false) => OpStatus::Create,
    };
    TmuxSessionOp {
        name: observed.map_or_else(
            || snapshot.conventions.session_name.clone(),
            |s| s.name.clone(),
        ),
        exists,
        status,
        windows,
        orphan_windows,
    }
}

/// Pane 1 runs the editor, pane 2 the agent connect command, pane 3 is a shell.
/// All three start at the window path.
fn verify_panes(snapshot: &Snapshot, exp: &Expected, win: &ObservedWindow) -> Vec<PaneCheck> {
    let conv = &snapshot.conventions;
    let expected_path = path_string(&exp.path);
    let tag = exp.agent.as_deref().unwrap_or_default();
    let commands = [
        Some(conv.editor_command.clone()),
        Some(agent_connect_command(&conv.agent_command, tag)),
        None,
    ];
    commands
        .into_iter()
        .take(VERIFIED_PANES)
        .enumerate()
        .map(|(i, expected_command)| {
            let actual = win.panes.get(i);
            let path_ok = actual.is_some_and(|p| p.start_path == expected_path);
            let command_ok = match (&expected_command, actual) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(cmd), Some(p)) => &p.start_command == cmd,
            };
            PaneCheck {
                position: i as u32 + 1,
                expected_path: expected_path.clone(),
                actual_path: actual.map(|p| p.start_path.clone()),
                expected_command,
                actual_command: actual.map(|p| p.start_command.clone()),
                path_ok,
                command_ok,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Factory, Gatehouse, RecordStatus, Workbench, Workshop};
    use crate::infra::orphan::Orphan;
    use crate::infra::snapshot::{Conventions, GatehouseState, WorkbenchState};
    use crate::infra::tmux::PaneInfo;

    fn bench(id: &str, name: &str, exists: bool) -> WorkbenchState {
        WorkbenchState {
            workbench: Workbench {
                id: id.into(),
                name: name.into(),
                workshop_id: "WORK-001".into(),
                repo_id: None,
                home_branch: String::new(),
                status: RecordStatus::Active,
            },
            path: PathBuf::from(format!("/w/{}", name)),
            branch: format!("orc/{}", name),
            dir_exists: exists,
            config_current: exists,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            workshop: Workshop {
                id: "WORK-001".into(),
                name: "forge".into(),
                factory_id: "FACT-001".into(),
                status: RecordStatus::Active,
            },
            factory: Factory {
                id: "FACT-001".into(),
                name: "main".into(),
            },
            gatehouse: GatehouseState {
                record: Some(Gatehouse {
                    id: "GATE-001".into(),
                    workshop_id: "WORK-001".into(),
                    status: RecordStatus::Active,
                }),
                path: PathBuf::from("/g/WORK-001"),
                dir_exists: true,
                config_current: true,
            },
            workbenches: vec![bench("BENCH-001", "a", true), bench("BENCH-002", "b", false)],
            orphan_workbenches: vec![OrphanState {
                orphan: Orphan {
                    id: "BENCH-099".into(),
                    name: "stale".into(),
                    path: PathBuf::from("/w/stale"),
                },
                dirty: DirtyState::Clean,
            }],
            orphan_gatehouses: Vec::new(),
            tmux_enabled: true,
            session: Some(ObservedSession {
                name: "forge-WORK-001".into(),
                windows: vec![
                    ObservedWindow {
                        index: 1,
                        name: "goblin-001".into(),
                        agent: Some("GOBLIN-forge@GATE-001".into()),
                        panes: vec![
                            pane(0, "/g/WORK-001", "vim"),
                            pane(1, "/g/WORK-001", "orc connect GOBLIN-forge@GATE-001"),
                            pane(2, "/tmp", ""),
                        ],
                    },
                    ObservedWindow {
                        index: 2,
                        name: "a".into(),
                        agent: Some("IMP-a@BENCH-007".into()),
                        panes: vec![pane(0, "/w/a", "vim")],
                    },
                    ObservedWindow {
                        index: 3,
                        name: "stray".into(),
                        agent: None,
                        panes: Vec::new(),
                    },
                ],
            }),
            conventions: Conventions {
                session_name: "forge-WORK-001".into(),
                base_index: 1,
                editor_command: "vim".into(),
                agent_command: "orc connect".into(),
            },
        }
    }

    fn pane(index: u32, path: &str, cmd: &str) -> PaneInfo {
        PaneInfo {
            index,
            start_path: path.into(),
            start_command: cmd.into(),
        }
    }

    #[test]
    fn same_snapshot_same_plan() {
        let snap = snapshot();
        let first = generate_plan(&snap);
        let second = generate_plan(&snap);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn classifies_workbenches_and_orphans() {
        let plan = generate_plan(&snapshot());
        assert_eq!(plan.workbenches[0].status, OpStatus::NoOp);
        assert_eq!(plan.workbenches[1].status, OpStatus::Create);
        assert_eq!(plan.workbenches[1].config_status, OpStatus::Create);
        assert_eq!(plan.orphan_workbenches.len(), 1);
        assert_eq!(plan.orphan_workbenches[0].status, OpStatus::Delete);
        assert!(plan.needs_action());
    }

    #[test]
    fn cataloged_gatehouse_without_directory_is_missing() {
        let mut snap = snapshot();
        snap.gatehouse.dir_exists = false;
        snap.gatehouse.config_current = false;
        let plan = generate_plan(&snap);
        assert_eq!(plan.gatehouse.status, OpStatus::Missing);
        assert_eq!(plan.gatehouse.config_status, OpStatus::Create);
    }

    #[test]
    fn windows_follow_bootstrap_then_catalog_order() {
        let plan = generate_plan(&snapshot());
        let tmux = plan.tmux.unwrap();
        assert_eq!(tmux.status, OpStatus::NoOp);
        let keys: Vec<_> = tmux.windows.iter().map(|w| w.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                WindowKey::Bootstrap,
                WindowKey::Workbench("BENCH-001".into()),
                WindowKey::Workbench("BENCH-002".into()),
            ]
        );
        assert!(tmux.windows[0].agent_ok);
        assert!(!tmux.windows[1].agent_ok);
        // Window b is missing; index 3 is taken by the stray window.
        assert_eq!(tmux.windows[2].status, OpStatus::Create);
        assert_eq!(tmux.windows[2].index, 4);
        assert_eq!(tmux.orphan_windows.len(), 1);
        assert_eq!(tmux.orphan_windows[0].name, "stray");
    }

    #[test]
    fn panes_are_verified_by_position() {
        let plan = generate_plan(&snapshot());
        let tmux = plan.tmux.unwrap();
        let goblin = &tmux.windows[0].panes;
        assert_eq!(goblin.len(), 3);
        assert!(goblin[0].path_ok && goblin[0].command_ok);
        assert!(goblin[1].path_ok && goblin[1].command_ok);
        assert!(!goblin[2].path_ok);
        assert!(goblin[2].command_ok);

        let a = &tmux.windows[1].panes;
        assert!(a[0].path_ok && a[0].command_ok);
        assert_eq!(
            a[1].expected_command.as_deref(),
            Some("orc connect IMP-a@BENCH-001")
        );
        assert!(!a[1].path_ok && !a[1].command_ok);
        assert!(tmux.windows[2].panes.is_empty());
    }

    #[test]
    fn archived_workshop_tears_down_session_only() {
        let mut snap = snapshot();
        snap.workshop.status = RecordStatus::Archived;
        let plan = generate_plan(&snap);
        let tmux = plan.tmux.as_ref().unwrap();
        assert!(tmux.windows.is_empty());
        assert_eq!(tmux.orphan_windows.len(), 3);
        assert_eq!(tmux.status, OpStatus::Delete);
        assert_eq!(plan.workbenches.len(), 2);
        assert_eq!(plan.workbenches[1].status, OpStatus::Create);
    }

    #[test]
    fn unresolved_bootstrap_keeps_existing_goblin_windows() {
        let mut snap = snapshot();
        snap.gatehouse.record = None;
        let plan = generate_plan(&snap);
        assert_eq!(plan.gatehouse.status, OpStatus::Create);
        let tmux = plan.tmux.unwrap();
        assert_eq!(tmux.windows[0].name, None);
        assert_eq!(tmux.windows[0].status, OpStatus::Create);
        assert!(tmux.orphan_windows.iter().all(|w| w.name != "goblin-001"));
    }

    #[test]
    fn no_session_means_create_everything() {
        let mut snap = snapshot();
        snap.session = None;
        let tmux = generate_plan(&snap).tmux.unwrap();
        assert_eq!(tmux.status, OpStatus::Create);
        let indexes: Vec<u32> = tmux.windows.iter().map(|w| w.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
        assert!(tmux.windows.iter().all(|w| w.status == OpStatus::Create));
    }

    #[test]
    fn tmux_disabled_has_no_session_op() {
        let mut snap = snapshot();
        snap.tmux_enabled = false;
        assert!(generate_plan(&snap).tmux.is_none());
    }
}
