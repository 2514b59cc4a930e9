//! One consolidated read of desired and observed state, the sole input to planning.

use crate::catalog::{Catalog, Factory, Gatehouse, Workbench, Workshop};
use crate::core::error::OrcError;
use crate::infra::Settings;
use crate::infra::descriptor::{descriptor_path, read_descriptor};
use crate::infra::git::{DirtyState, WorktreeAdapter};
use crate::infra::layout::session_name;
use crate::infra::observe::{ObservedSession, dir_exists, observe_session};
use crate::infra::orphan::{Orphan, PlaceFamily, scan_orphans};
use crate::infra::tmux::TmuxAdapter;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatehouseState {
    pub record: Option<Gatehouse>,
    pub path: PathBuf,
    pub dir_exists: bool,
    /// The descriptor exists and names this gatehouse's record.
    pub config_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkbenchState {
    pub workbench: Workbench,
    pub path: PathBuf,
    /// Catalog home branch, or the configured derived branch when that is empty.
    pub branch: String,
    pub dir_exists: bool,
    /// The descriptor exists and names this workbench's record. A descriptor left by
    /// an earlier record of the same name is not current and gets rewritten.
    pub config_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanState {
    pub orphan: Orphan,
    pub dirty: DirtyState,
}

/// Naming and pane conventions the plan is computed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conventions {
    /// Name used if the session has to be created.
    pub session_name: String,
    pub base_index: u32,
    pub editor_command: String,
    pub agent_command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub workshop: Workshop,
    pub factory: Factory,
    pub gatehouse: GatehouseState,
    /// Active workbenches only, in catalog order.
    pub workbenches: Vec<WorkbenchState>,
    pub orphan_workbenches: Vec<OrphanState>,
    pub orphan_gatehouses: Vec<OrphanState>,
    pub tmux_enabled: bool,
    pub session: Option<ObservedSession>,
    pub conventions: Conventions,
}

fn descriptor_names(managed_dir: &Path, place_id: &str) -> bool {
    read_descriptor(&descriptor_path(managed_dir)).is_some_and(|d| d.place_id == place_id)
}

pub fn collect_snapshot(
    catalog: &dyn Catalog,
    git: &dyn WorktreeAdapter,
    tmux: Option<&dyn TmuxAdapter>,
    settings: &Settings,
    workshop_id: &str,
) -> Result<Snapshot, OrcError> {
    let workshop = catalog
        .get_workshop(workshop_id)?
        .ok_or_else(|| OrcError::NotFound(format!("workshop {}", workshop_id)))?;
    let factory = catalog
        .get_factory(&workshop.factory_id)?
        .ok_or_else(|| OrcError::NotFound(format!("factory {}", workshop.factory_id)))?;

    let layout = &settings.layout;
    let record = catalog.gatehouse_for_workshop(&workshop.id)?;
    let gatehouse_path = layout.gatehouse_path(&workshop.id);
    let gatehouse = GatehouseState {
        dir_exists: dir_exists(&gatehouse_path),
        config_current: record
            .as_ref()
            .is_some_and(|g| descriptor_names(&gatehouse_path, &g.id)),
        path: gatehouse_path,
        record,
    };

    let all_workbenches = catalog.list_workbenches(&workshop.id)?;
    let known_workbenches: HashSet<String> =
        all_workbenches.iter().map(|w| w.id.clone()).collect();
    let workbenches = all_workbenches
        .into_iter()
        .filter(|w| !w.is_archived())
        .map(|workbench| {
            let path = layout.workbench_path(&workbench.name);
            WorkbenchState {
                branch: settings.branch_for(&workbench),
                dir_exists: dir_exists(&path),
                config_current: descriptor_names(&path, &workbench.id),
                path,
                workbench,
            }
        })
        .collect();

    let known_gatehouses: HashSet<String> =
        gatehouse.record.iter().map(|g| g.id.clone()).collect();
    let with_dirt = |orphans: Vec<Orphan>| -> Vec<OrphanState> {
        orphans
            .into_iter()
            .map(|orphan| OrphanState {
                dirty: git.dirty_state(&orphan.path),
                orphan,
            })
            .collect()
    };
    let orphan_workbenches = with_dirt(scan_orphans(
        &layout.workbenches_root,
        PlaceFamily::Workbench,
        &known_workbenches,
        catalog,
    )?);
    let orphan_gatehouses = with_dirt(scan_orphans(
        &layout.gatehouses_root,
        PlaceFamily::Gatehouse,
        &known_gatehouses,
        catalog,
    )?);

    let session = tmux.and_then(|t| observe_session(t, &workshop.id));
    let conventions = Conventions {
        session_name: session_name(&workshop),
        base_index: settings.base_index,
        editor_command: settings.editor_command.clone(),
        agent_command: settings.agent_command.clone(),
    };

    Ok(Snapshot {
        workshop,
        factory,
        gatehouse,
        workbenches,
        orphan_workbenches,
        orphan_gatehouses,
        tmux_enabled: tmux.is_some(),
        session,
        conventions,
    })
}
