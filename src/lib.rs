//! orc: infrastructure reconciliation for agent workshops.
//!
//! A workshop groups workbenches (isolated git worktrees, one per agent) under a
//! factory, with one gatehouse directory acting as its control plane. The catalog
//! (SQLite) says what should exist; `orc` makes the filesystem and tmux agree.
//!
//! # Architecture
//!
//! ## Plan
//!
//! `infra::snapshot` reads the catalog, stats the workbench and gatehouse
//! directories, scans for orphaned descriptors and inspects the workshop's tmux
//! session. `infra::plan::generate_plan` turns that snapshot into a `Plan` without
//! any I/O, classifying every resource as create, missing, delete or noop.
//!
//! ## Apply
//!
//! `infra::apply` walks a plan and emits `Effect` values to an `EffectExecutor`:
//! - gatehouse record (created lazily), directory and descriptor
//! - workbench trees via `git worktree add`, or plain directories
//! - orphan deletion behind the dirty-worktree guard
//! - tmux session, windows, panes and agent tags
//!
//! Apply holds an advisory lock per workshop under `<state_dir>/locks/`.
//!
//! ## Layout
//!
//! - Workbench trees: `<workbenches_root>/<name>/`
//! - Gatehouses: `<gatehouses_root>/<workshop-id>/`
//! - Descriptor: `<dir>/.orc/config.json` = `{"version": "1.0", "place_id": "<ID>"}`
//!
//! # Examples
//!
//! ```bash
//! orc catalog factory add main
//! orc catalog workshop add forge --factory FACT-001
//! orc catalog workbench add bench-a --workshop WORK-001
//! orc infra plan --workshop WORK-001
//! orc infra apply --workshop WORK-001
//! ```

pub mod catalog;
pub(crate) mod cli;
pub mod core;
pub mod infra;

use crate::catalog::{RecordStatus, SqliteCatalog};
use crate::cli::{
    CatalogCommand, Cli, Command, FactoryCommand, InfraCommand, RepoCommand, WorkbenchCommand,
    WorkshopCommand,
};
use crate::core::config::{OrcConfig, ResolvedPaths, load_config};
use crate::core::error::OrcError;
use crate::core::logging;
use crate::core::output::{OutputFormat, to_json};
use crate::infra::apply::ApplyOptions;
use crate::infra::effects::SystemExecutor;
use crate::infra::git::GitCli;
use crate::infra::render;
use crate::infra::tmux::{TmuxAdapter, TmuxCli};
use crate::infra::{Reconciler, Settings};
use clap::Parser;

pub fn run() -> Result<(), OrcError> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let mut paths = config.resolve_paths()?;
    if let Some(catalog) = cli.catalog {
        paths.catalog = catalog;
    }
    tracing::debug!(catalog = %paths.catalog.display(), "resolved paths");

    match cli.command {
        Command::Infra(infra) => run_infra(infra.command, &config, &paths),
        Command::Catalog(cat) => run_catalog(cat.command, &paths),
    }
}

fn run_infra(
    command: InfraCommand,
    config: &OrcConfig,
    paths: &ResolvedPaths,
) -> Result<(), OrcError> {
    let catalog = SqliteCatalog::open(&paths.catalog)?;
    let git = GitCli::new();
    let tmux = TmuxCli::new();
    let tmux: Option<&dyn TmuxAdapter> = if config.tmux.enabled {
        Some(&tmux)
    } else {
        None
    };
    let reconciler = Reconciler::new(&catalog, &git, tmux, Settings::from_config(config, paths));

    match command {
        InfraCommand::Plan { workshop, format } => {
            let plan = reconciler.plan(&workshop)?;
            match format {
                OutputFormat::Text => print!("{}", render::plan_text(&plan)),
                OutputFormat::Json => print!("{}", to_json(&plan)?),
            }
        }
        InfraCommand::Apply {
            workshop,
            force,
            no_delete,
            format,
        } => {
            let plan = reconciler.plan(&workshop)?;
            let mut executor = SystemExecutor::new(&git, tmux);
            let result =
                reconciler.apply(&plan, ApplyOptions { force, no_delete }, &mut executor)?;
            match format {
                OutputFormat::Text => print!("{}", render::apply_text(&result)),
                OutputFormat::Json => print!("{}", to_json(&result)?),
            }
        }
    }
    Ok(())
}

fn run_catalog(command: CatalogCommand, paths: &ResolvedPaths) -> Result<(), OrcError> {
    let catalog = SqliteCatalog::open(&paths.catalog)?;
    match command {
        CatalogCommand::Init => println!("{}", paths.catalog.display()),
        CatalogCommand::Factory {
            command: FactoryCommand::Add { name },
        } => println!("{}", catalog.create_factory(&name)?.id),
        CatalogCommand::Workshop { command } => match command {
            WorkshopCommand::Add { name, factory } => {
                println!("{}", catalog.create_workshop(&name, &factory)?.id)
            }
            WorkshopCommand::Archive { id } => {
                catalog.set_workshop_status(&id, RecordStatus::Archived)?;
                println!("{}", id);
            }
        },
        CatalogCommand::Repo {
            command: RepoCommand::Add { name, path },
        } => println!("{}", catalog.create_repo(&name, &path)?.id),
        CatalogCommand::Workbench { command } => match command {
            WorkbenchCommand::Add {
                name,
                workshop,
                repo,
                branch,
            } => {
                let bench = catalog.create_workbench(
                    &name,
                    &workshop,
                    repo.as_deref(),
                    branch.as_deref().unwrap_or(""),
                )?;
                println!("{}", bench.id);
            }
            WorkbenchCommand::Archive { id } => {
                catalog.set_workbench_status(&id, RecordStatus::Archived)?;
                println!("{}", id);
            }
        },
    }
    Ok(())
}
