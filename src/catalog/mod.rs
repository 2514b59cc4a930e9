//! Catalog ports consumed by the reconciliation engine.
//!
//! The engine only reads workshops, factories, repos and workbenches. The one write
//! it performs is lazily creating a gatehouse record on first apply. Records are
//! authored by the CRUD services; `SqliteCatalog` carries minimal seeding helpers
//! standing in for them.

pub mod sqlite;

use crate::core::error::OrcError;
use serde::{Deserialize, Serialize};

pub use sqlite::SqliteCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Archived,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Archived => "archived",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, OrcError> {
        match raw {
            "active" => Ok(RecordStatus::Active),
            "archived" => Ok(RecordStatus::Archived),
            other => Err(OrcError::Validation(format!(
                "unknown record status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factory {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workshop {
    pub id: String,
    pub name: String,
    pub factory_id: String,
    pub status: RecordStatus,
}

impl Workshop {
    pub fn is_archived(&self) -> bool {
        self.status == RecordStatus::Archived
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gatehouse {
    pub id: String,
    pub workshop_id: String,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbench {
    pub id: String,
    pub name: String,
    pub workshop_id: String,
    pub repo_id: Option<String>,
    pub home_branch: String,
    pub status: RecordStatus,
}

impl Workbench {
    pub fn is_archived(&self) -> bool {
        self.status == RecordStatus::Archived
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub id: String,
    pub name: String,
    pub local_path: String,
}

pub trait FactoryStore {
    fn get_factory(&self, id: &str) -> Result<Option<Factory>, OrcError>;
}

pub trait WorkshopStore {
    fn get_workshop(&self, id: &str) -> Result<Option<Workshop>, OrcError>;
}

pub trait RepoStore {
    fn get_repo(&self, id: &str) -> Result<Option<Repo>, OrcError>;
}

pub trait WorkbenchStore {
    /// All workbenches of a workshop, archived included, in catalog order.
    fn list_workbenches(&self, workshop_id: &str) -> Result<Vec<Workbench>, OrcError>;
    fn workbench_exists(&self, id: &str) -> Result<bool, OrcError>;
    /// Whether any workbench record, in any workshop or status, has this name.
    fn workbench_name_exists(&self, name: &str) -> Result<bool, OrcError>;
}

pub trait GatehouseStore {
    fn gatehouse_for_workshop(&self, workshop_id: &str) -> Result<Option<Gatehouse>, OrcError>;
    fn gatehouse_exists(&self, id: &str) -> Result<bool, OrcError>;
    fn create_gatehouse(&self, workshop_id: &str) -> Result<Gatehouse, OrcError>;
}

/// Everything the engine reads from (or lazily writes to) the catalog.
pub trait Catalog: FactoryStore + WorkshopStore + RepoStore + WorkbenchStore + GatehouseStore {}

impl<T> Catalog for T where T: FactoryStore + WorkshopStore + RepoStore + WorkbenchStore + GatehouseStore {}

/// `<prefix>-<NNN>` with at least three digits.
pub fn format_id(prefix: &str, n: u64) -> String {
    format!("{}-{:03}", prefix, n)
}

/// Numeric suffix of a `<PREFIX>-<digits>` identifier.
pub fn id_suffix(id: &str) -> Option<&str> {
    let (_, suffix) = id.rsplit_once('-')?;
    if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
        Some(suffix)
    } else {
        None
    }
}
