//! CLI struct definitions for the `orc` command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use crate::core::output::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "orc",
    version = env!("CARGO_PKG_VERSION"),
    about = "Provision and reconcile workshop infrastructure: gatehouses, workbench worktrees and tmux sessions."
)]
pub(crate) struct Cli {
    /// Config file (defaults to $ORC_CONFIG, then ~/.orc/config.toml).
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    /// Catalog database, overriding the configured path.
    #[clap(long, global = true)]
    pub catalog: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug). ORC_LOG overrides.
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Plan and apply workshop infrastructure
    Infra(InfraCli),
    /// Seed and inspect catalog records
    Catalog(CatalogCli),
}

#[derive(clap::Args, Debug)]
pub(crate) struct InfraCli {
    #[clap(subcommand)]
    pub command: InfraCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum InfraCommand {
    /// Show what apply would change, without changing anything
    Plan {
        #[clap(long)]
        workshop: String,
        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Converge the workshop's infrastructure to the catalog
    Apply {
        #[clap(long)]
        workshop: String,
        /// Delete orphaned trees even if they have uncommitted work
        #[clap(long)]
        force: bool,
        /// Never delete orphaned trees or windows
        #[clap(long)]
        no_delete: bool,
        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct CatalogCli {
    #[clap(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CatalogCommand {
    /// Create the catalog database if it does not exist
    Init,
    Factory {
        #[clap(subcommand)]
        command: FactoryCommand,
    },
    Workshop {
        #[clap(subcommand)]
        command: WorkshopCommand,
    },
    Repo {
        #[clap(subcommand)]
        command: RepoCommand,
    },
    Workbench {
        #[clap(subcommand)]
        command: WorkbenchCommand,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum FactoryCommand {
    Add { name: String },
}

#[derive(Subcommand, Debug)]
pub(crate) enum WorkshopCommand {
    Add {
        name: String,
        #[clap(long)]
        factory: String,
    },
    Archive { id: String },
}

#[derive(Subcommand, Debug)]
pub(crate) enum RepoCommand {
    Add {
        name: String,
        /// Local clone the workbench worktrees are added from
        #[clap(long)]
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum WorkbenchCommand {
    Add {
        name: String,
        #[clap(long)]
        workshop: String,
        #[clap(long)]
        repo: Option<String>,
        /// Home branch; defaults to `<branch_prefix>/<name>`
        #[clap(long)]
        branch: Option<String>,
    },
    Archive { id: String },
}
