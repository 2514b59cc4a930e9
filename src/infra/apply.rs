//! Apply driver: walk a plan and issue effects.
//!
//! Order is gatehouse, workbenches, orphan deletions, multiplexer. Failures while
//! materializing abort the run; nothing already applied is rolled back, and the
//! next plan/apply picks up whatever is still missing.

use crate::catalog::{Catalog, Gatehouse, Workbench, Workshop};
use crate::core::error::OrcError;
use crate::core::lock;
use crate::core::time::{new_run_id, now_epoch_z};
use crate::infra::Settings;
use crate::infra::descriptor::{Descriptor, descriptor_path, read_descriptor};
use crate::infra::effects::{Effect, EffectExecutor, Outcome};
use crate::infra::git::{DirtyState, WorktreeAdapter};
use crate::infra::layout::{
    AGENT_OPTION, agent_connect_command, bootstrap_agent_tag, bootstrap_window_name,
    first_window_target, window_target, workbench_agent_tag,
};
use crate::infra::observe::dir_exists;
use crate::infra::plan::{OpStatus, OrphanOp, Plan, TmuxSessionOp, WindowKey};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Delete orphans even when their working tree is dirty.
    pub force: bool,
    /// Skip every orphan and window deletion.
    pub no_delete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub run_id: String,
    pub started_at: String,
    pub gatehouse_id: Option<String>,
    pub gatehouse_record_created: bool,
    /// The gatehouse directory was created or recreated.
    pub gatehouse_created: bool,
    pub workbenches_created: usize,
    pub configs_created: usize,
    pub workbenches_deleted: usize,
    pub gatehouses_deleted: usize,
    pub session_created: bool,
    pub session_killed: bool,
    pub windows_created: usize,
    pub windows_renamed: usize,
    pub windows_killed: usize,
    pub agent_tags_set: usize,
    pub nothing_to_do: bool,
}

pub struct ApplyContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub git: &'a dyn WorktreeAdapter,
    pub tmux_enabled: bool,
    pub settings: &'a Settings,
}

fn run(executor: &mut dyn EffectExecutor, effect: Effect) -> Result<(), OrcError> {
    executor.apply_effect(&effect).map(|_| ())
}

/// Failures are logged and dropped.
fn best_effort(executor: &mut dyn EffectExecutor, effect: Effect) -> bool {
    match executor.apply_effect(&effect) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(effect = %effect, error = %e, "best-effort effect failed");
            false
        }
    }
}

fn write_descriptor(
    executor: &mut dyn EffectExecutor,
    managed_dir: &Path,
    place_id: &str,
) -> Result<(), OrcError> {
    run(
        executor,
        Effect::WriteFile {
            path: descriptor_path(managed_dir),
            contents: Descriptor::new(place_id).render()?,
        },
    )
}

fn materializes(status: OpStatus) -> bool {
    matches!(status, OpStatus::Create | OpStatus::Missing)
}

pub fn apply(
    ctx: ApplyContext<'_>,
    plan: &Plan,
    options: ApplyOptions,
    executor: &mut dyn EffectExecutor,
) -> Result<ApplyResult, OrcError> {
    let mut result = ApplyResult {
        run_id: new_run_id(),
        started_at: now_epoch_z(),
        gatehouse_id: plan.gatehouse.id.clone(),
        ..ApplyResult::default()
    };
    let _span = tracing::info_span!(
        "apply",
        workshop = %plan.workshop_id,
        run_id = %result.run_id
    )
    .entered();

    if !plan.needs_action() {
        tracing::info!("nothing to do");
        result.nothing_to_do = true;
        return Ok(result);
    }

    let _lock = lock::acquire(&ctx.settings.state_dir, &plan.workshop_id)?;

    let workshop = ctx
        .catalog
        .get_workshop(&plan.workshop_id)?
        .ok_or_else(|| OrcError::NotFound(format!("workshop {}", plan.workshop_id)))?;
    let rows: HashMap<String, Workbench> = ctx
        .catalog
        .list_workbenches(&workshop.id)?
        .into_iter()
        .map(|w| (w.id.clone(), w))
        .collect();

    let gatehouse = apply_gatehouse(&ctx, plan, executor, &mut result)?;
    apply_workbenches(&ctx, plan, &rows, executor, &mut result)?;

    if options.no_delete {
        tracing::info!("deletions skipped");
    } else {
        result.workbenches_deleted =
            delete_orphans(&ctx, &plan.orphan_workbenches, options, executor)?;
        result.gatehouses_deleted =
            delete_orphans(&ctx, &plan.orphan_gatehouses, options, executor)?;
    }

    if let (true, Some(session)) = (ctx.tmux_enabled, plan.tmux.as_ref()) {
        apply_tmux(
            &ctx,
            &workshop,
            &gatehouse,
            session,
            &rows,
            options,
            executor,
            &mut result,
        )?;
    }

    tracing::info!(
        workbenches_created = result.workbenches_created,
        configs_created = result.configs_created,
        deleted = result.workbenches_deleted + result.gatehouses_deleted,
        "apply finished"
    );
    Ok(result)
}

fn apply_gatehouse(
    ctx: &ApplyContext<'_>,
    plan: &Plan,
    executor: &mut dyn EffectExecutor,
    result: &mut ApplyResult,
) -> Result<Gatehouse, OrcError> {
    let gatehouse = match ctx.catalog.gatehouse_for_workshop(&plan.workshop_id)? {
        Some(existing) => existing,
        None => {
            result.gatehouse_record_created = true;
            ctx.catalog.create_gatehouse(&plan.workshop_id)?
        }
    };
    result.gatehouse_id = Some(gatehouse.id.clone());

    let op = &plan.gatehouse;
    if materializes(op.status) {
        run(executor, Effect::Mkdir { path: op.path.clone() })?;
        result.gatehouse_created = true;
    }
    if op.config_status == OpStatus::Create {
        write_descriptor(executor, &op.path, &gatehouse.id)?;
        result.configs_created += 1;
    }
    Ok(gatehouse)
}

fn apply_workbenches(
    ctx: &ApplyContext<'_>,
    plan: &Plan,
    rows: &HashMap<String, Workbench>,
    executor: &mut dyn EffectExecutor,
    result: &mut ApplyResult,
) -> Result<(), OrcError> {
    for op in &plan.workbenches {
        let tree = materializes(op.status);
        if !tree && op.config_status != OpStatus::Create {
            continue;
        }
        let Some(row) = rows.get(&op.id).filter(|w| !w.is_archived()) else {
            tracing::warn!(workbench = %op.id, "no longer an active catalog record; skipping");
            continue;
        };
        let path = ctx.settings.layout.workbench_path(&row.name);

        if tree {
            match &row.repo_id {
                Some(repo_id) => {
                    let repo = ctx
                        .catalog
                        .get_repo(repo_id)?
                        .ok_or_else(|| OrcError::NotFound(format!("repo {}", repo_id)))?;
                    run(
                        executor,
                        Effect::GitWorktreeAdd {
                            repo: PathBuf::from(&repo.local_path),
                            path: path.clone(),
                            branch: ctx.settings.branch_for(row),
                        },
                    )?;
                }
                None => run(executor, Effect::Mkdir { path: path.clone() })?,
            }
            result.workbenches_created += 1;
        }
        write_descriptor(executor, &path, &row.id)?;
        result.configs_created += 1;
        tracing::info!(workbench = %row.id, path = %path.display(), tree, "workbench materialized");
    }
    Ok(())
}

/// Delete one category of orphans. Every candidate is checked before anything is
/// removed, so a dirty tree blocks the whole category.
fn delete_orphans(
    ctx: &ApplyContext<'_>,
    orphans: &[OrphanOp],
    options: ApplyOptions,
    executor: &mut dyn EffectExecutor,
) -> Result<usize, OrcError> {
    let mut doomed = Vec::new();
    for op in orphans.iter().filter(|o| o.status == OpStatus::Delete) {
        if !dir_exists(&op.path) {
            continue;
        }
        let current = read_descriptor(&descriptor_path(&op.path)).map(|d| d.place_id);
        if current.as_deref() != Some(op.id.as_str()) {
            tracing::warn!(orphan = %op.id, path = %op.path.display(), "descriptor changed since plan; skipping");
            continue;
        }
        if !options.force {
            match ctx.git.dirty_state(&op.path) {
                DirtyState::Dirty {
                    modified,
                    untracked,
                } => {
                    return Err(OrcError::DirtyWorktree {
                        id: op.id.clone(),
                        path: op.path.clone(),
                        modified,
                        untracked,
                    });
                }
                DirtyState::Unknown { reason } if ctx.settings.unknown_dirty_blocks_delete => {
                    return Err(OrcError::DirtyUnknown {
                        id: op.id.clone(),
                        path: op.path.clone(),
                        reason,
                    });
                }
                _ => {}
            }
        }
        doomed.push(op);
    }

    for op in &doomed {
        run(executor, Effect::RemoveDir { path: op.path.clone() })?;
        tracing::info!(orphan = %op.id, path = %op.path.display(), "orphan removed");
    }
    Ok(doomed.len())
}

#[allow(clippy::too_many_arguments)]
fn apply_tmux(
    ctx: &ApplyContext<'_>,
    workshop: &Workshop,
    gatehouse: &Gatehouse,
    session: &TmuxSessionOp,
    rows: &HashMap<String, Workbench>,
    options: ApplyOptions,
    executor: &mut dyn EffectExecutor,
    result: &mut ApplyResult,
) -> Result<(), OrcError> {
    let name = session.name.as_str();

    if session.status == OpStatus::Create {
        run(
            executor,
            Effect::TmuxCreateSession {
                name: name.to_string(),
                cwd: gatehouse_dir(ctx, workshop),
                workshop_id: workshop.id.clone(),
            },
        )?;
        result.session_created = true;
    }

    // A new session comes with one placeholder window; the first expected window
    // takes it over by rename.
    let mut placeholder = result.session_created;
    for window in &session.windows {
        let (window_name, agent) = match &window.key {
            WindowKey::Bootstrap => (
                bootstrap_window_name(&gatehouse.id),
                bootstrap_agent_tag(workshop, &gatehouse.id),
            ),
            WindowKey::Workbench(id) => match rows.get(id).filter(|w| !w.is_archived()) {
                Some(row) => (row.name.clone(), workbench_agent_tag(row)),
                None => {
                    tracing::warn!(workbench = %id, "window skipped: workbench no longer active");
                    continue;
                }
            },
        };

        if window.status == OpStatus::Create {
            let target = if placeholder {
                let target = first_window_target(name);
                run(
                    executor,
                    Effect::TmuxRenameWindow {
                        target: target.clone(),
                        name: window_name.clone(),
                    },
                )?;
                result.windows_renamed += 1;
                placeholder = false;
                target
            } else {
                let outcome = executor.apply_effect(&Effect::TmuxCreateWindow {
                    session: name.to_string(),
                    index: window.index,
                    name: window_name.clone(),
                    cwd: window.path.clone(),
                })?;
                let index = match outcome {
                    Outcome::WindowCreated { index } => index,
                    Outcome::Done => window.index,
                };
                if index != window.index {
                    tracing::warn!(window = %window_name, planned = window.index, index, "window landed at another index");
                }
                result.windows_created += 1;
                window_target(name, index)
            };
            run(
                executor,
                Effect::TmuxSetupPanes {
                    target: target.clone(),
                    cwd: window.path.clone(),
                    editor_command: ctx.settings.editor_command.clone(),
                    agent_command: agent_connect_command(&ctx.settings.agent_command, &agent),
                },
            )?;
            if set_agent_tag(executor, target, &agent) {
                result.agent_tags_set += 1;
            }
        } else if !window.agent_ok
            && set_agent_tag(executor, window_target(name, window.index), &agent)
        {
            result.agent_tags_set += 1;
        }
    }

    if options.no_delete {
        return Ok(());
    }
    let mut orphans: Vec<_> = session.orphan_windows.iter().collect();
    orphans.sort_by(|a, b| b.index.cmp(&a.index));
    for orphan in orphans {
        let killed = best_effort(
            executor,
            Effect::TmuxKillWindow {
                target: window_target(name, orphan.index),
            },
        );
        if killed {
            result.windows_killed += 1;
        }
    }
    if session.status == OpStatus::Delete {
        result.session_killed = best_effort(
            executor,
            Effect::TmuxKillSession {
                name: name.to_string(),
            },
        );
    }
    Ok(())
}

fn gatehouse_dir(ctx: &ApplyContext<'_>, workshop: &Workshop) -> PathBuf {
    ctx.settings.layout.gatehouse_path(&workshop.id)
}

fn set_agent_tag(executor: &mut dyn EffectExecutor, target: String, agent: &str) -> bool {
    best_effort(
        executor,
        Effect::TmuxSetOption {
            target,
            key: AGENT_OPTION.to_string(),
            value: agent.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::infra::effects::RecordingExecutor;
    use crate::infra::git::GitCli;
    use crate::infra::layout::Layout;
    use crate::infra::plan::{GatehouseOp, Plan};
    use crate::infra::runner::MockRunner;

    fn settings(root: &Path) -> Settings {
        Settings {
            layout: Layout::new(root.join("w"), root.join("g")),
            state_dir: root.join("state"),
            branch_prefix: "orc".into(),
            base_index: 1,
            editor_command: "vim".into(),
            agent_command: "orc connect".into(),
            unknown_dirty_blocks_delete: true,
        }
    }

    fn settled_plan(root: &Path) -> Plan {
        Plan {
            workshop_id: "WORK-001".into(),
            workshop_name: "forge".into(),
            factory_id: "FACT-001".into(),
            factory_name: "main".into(),
            workshop_archived: false,
            gatehouse: GatehouseOp {
                id: Some("GATE-001".into()),
                path: root.join("g/WORK-001"),
                status: OpStatus::NoOp,
                config_status: OpStatus::NoOp,
            },
            workbenches: Vec::new(),
            orphan_workbenches: Vec::new(),
            orphan_gatehouses: Vec::new(),
            tmux: None,
        }
    }

    #[test]
    fn settled_plan_is_nothing_to_do_without_effects_or_lock() {
        let dir = tempfile::tempdir().unwrap();
        let cat = SqliteCatalog::open(&dir.path().join("orc.db")).unwrap();
        let git = GitCli::with_runner(MockRunner::new());
        let settings = settings(dir.path());
        let mut exec = RecordingExecutor::new();
        let result = apply(
            ApplyContext {
                catalog: &cat,
                git: &git,
                tmux_enabled: false,
                settings: &settings,
            },
            &settled_plan(dir.path()),
            ApplyOptions::default(),
            &mut exec,
        )
        .unwrap();
        assert!(result.nothing_to_do);
        assert_eq!(result.run_id.len(), 26);
        assert!(exec.effects.is_empty());
        assert!(!settings.state_dir.join("locks").exists());
    }

    #[test]
    fn held_lock_blocks_apply() {
        let dir = tempfile::tempdir().unwrap();
        let cat = SqliteCatalog::open(&dir.path().join("orc.db")).unwrap();
        let git = GitCli::with_runner(MockRunner::new());
        let settings = settings(dir.path());
        let mut plan = settled_plan(dir.path());
        plan.gatehouse.status = OpStatus::Missing;

        let _held = lock::acquire(&settings.state_dir, "WORK-001").unwrap();
        let err = apply(
            ApplyContext {
                catalog: &cat,
                git: &git,
                tmux_enabled: false,
                settings: &settings,
            },
            &plan,
            ApplyOptions::default(),
            &mut RecordingExecutor::new(),
        )
        .unwrap_err();
        assert!(matches!(err, OrcError::Locked(_)));
    }

    #[test]
    fn rewritten_descriptor_is_not_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let cat = SqliteCatalog::open(&dir.path().join("orc.db")).unwrap();
        let git = GitCli::with_runner(MockRunner::new());
        let settings = settings(dir.path());
        let orphan_dir = dir.path().join("g/WORK-009");
        std::fs::create_dir_all(orphan_dir.join(".orc")).unwrap();
        std::fs::write(
            descriptor_path(&orphan_dir),
            Descriptor::new("GATE-004").render().unwrap(),
        )
        .unwrap();

        let ctx = ApplyContext {
            catalog: &cat,
            git: &git,
            tmux_enabled: false,
            settings: &settings,
        };
        let orphans = vec![OrphanOp {
            id: "GATE-002".into(),
            name: "WORK-009".into(),
            path: orphan_dir.clone(),
            dirty: DirtyState::NotTracked,
            status: OpStatus::Delete,
        }];
        let mut exec = RecordingExecutor::new();
        let deleted = delete_orphans(&ctx, &orphans, ApplyOptions::default(), &mut exec).unwrap();
        assert_eq!(deleted, 0);
        assert!(exec.effects.is_empty());
    }
}
