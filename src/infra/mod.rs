//! Infrastructure reconciliation: observe, plan, apply.
//!
//! A `Reconciler` is built from injected ports (catalog, git, optional tmux) and
//! resolved settings. `plan` is read-only; `apply` walks a plan and issues effects.

pub mod apply;
pub mod descriptor;
pub mod effects;
pub mod git;
pub mod layout;
pub mod mock;
pub mod observe;
pub mod orphan;
pub mod plan;
pub mod render;
pub mod runner;
pub mod snapshot;
pub mod tmux;

use crate::catalog::{Catalog, Workbench};
use crate::core::config::{OrcConfig, ResolvedPaths};
use crate::core::error::OrcError;
use apply::{ApplyOptions, ApplyResult};
use effects::EffectExecutor;
use git::WorktreeAdapter;
use layout::Layout;
use plan::Plan;
use std::path::PathBuf;
use tmux::TmuxAdapter;

/// Everything the engine needs from configuration, resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub layout: Layout,
    pub state_dir: PathBuf,
    pub branch_prefix: String,
    pub base_index: u32,
    pub editor_command: String,
    pub agent_command: String,
    pub unknown_dirty_blocks_delete: bool,
}

impl Settings {
    pub fn from_config(config: &OrcConfig, paths: &ResolvedPaths) -> Self {
        Self {
            layout: Layout::new(&paths.workbenches_root, &paths.gatehouses_root),
            state_dir: paths.state_dir.clone(),
            branch_prefix: config.git.branch_prefix.clone(),
            base_index: config.tmux.base_index,
            editor_command: config.tmux.editor_command.clone(),
            agent_command: config.tmux.agent_command.clone(),
            unknown_dirty_blocks_delete: config.safety.unknown_dirty_blocks_delete,
        }
    }

    /// Branch a workbench tree is checked out on.
    pub fn branch_for(&self, workbench: &Workbench) -> String {
        if workbench.home_branch.trim().is_empty() {
            format!("{}/{}", self.branch_prefix, workbench.name)
        } else {
            workbench.home_branch.clone()
        }
    }
}

pub struct Reconciler<'a> {
    catalog: &'a dyn Catalog,
    git: &'a dyn WorktreeAdapter,
    tmux: Option<&'a dyn TmuxAdapter>,
    settings: Settings,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        git: &'a dyn WorktreeAdapter,
        tmux: Option<&'a dyn TmuxAdapter>,
        settings: Settings,
    ) -> Self {
        Self {
            catalog,
            git,
            tmux,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Observe and diff. Fails only when the workshop or its factory is missing or
    /// the catalog cannot be read.
    pub fn plan(&self, workshop_id: &str) -> Result<Plan, OrcError> {
        let _span = tracing::info_span!("plan", workshop = workshop_id).entered();
        let snapshot = snapshot::collect_snapshot(
            self.catalog,
            self.git,
            self.tmux,
            &self.settings,
            workshop_id,
        )?;
        let plan = plan::generate_plan(&snapshot);
        tracing::info!(needs_action = plan.needs_action(), "plan generated");
        Ok(plan)
    }

    pub fn apply(
        &self,
        plan: &Plan,
        options: ApplyOptions,
        executor: &mut dyn EffectExecutor,
    ) -> Result<ApplyResult, OrcError> {
        apply::apply(
            apply::ApplyContext {
                catalog: self.catalog,
                git: self.git,
                tmux_enabled: self.tmux.is_some(),
                settings: &self.settings,
            },
            plan,
            options,
            executor,
        )
    }
}
