//! Catalog schema definitions.
//!
//! The catalog is a single SQLite database holding the records the reconciliation
//! engine reads. Identifiers are `<PREFIX>-<NNN>` strings allocated per table.

pub const CATALOG_DB_NAME: &str = "orc.db";

pub const FACTORY_ID_PREFIX: &str = "FACT";
pub const WORKSHOP_ID_PREFIX: &str = "WORK";
pub const REPO_ID_PREFIX: &str = "REPO";
pub const WORKBENCH_ID_PREFIX: &str = "BENCH";
pub const GATEHOUSE_ID_PREFIX: &str = "GATE";

pub const CATALOG_SCHEMA_FACTORIES: &str = "
    CREATE TABLE IF NOT EXISTS factories (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
";

pub const CATALOG_SCHEMA_WORKSHOPS: &str = "
    CREATE TABLE IF NOT EXISTS workshops (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        factory_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY(factory_id) REFERENCES factories(id)
    )
";

pub const CATALOG_SCHEMA_REPOS: &str = "
    CREATE TABLE IF NOT EXISTS repos (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        local_path TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
";

pub const CATALOG_SCHEMA_WORKBENCHES: &str = "
    CREATE TABLE IF NOT EXISTS workbenches (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        workshop_id TEXT NOT NULL,
        repo_id TEXT,
        home_branch TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'active',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY(workshop_id) REFERENCES workshops(id),
        FOREIGN KEY(repo_id) REFERENCES repos(id)
    )
";
pub const CATALOG_SCHEMA_WORKBENCHES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_workbenches_workshop ON workbenches(workshop_id)";

// UNIQUE(workshop_id): at most one gatehouse per workshop.
pub const CATALOG_SCHEMA_GATEHOUSES: &str = "
    CREATE TABLE IF NOT EXISTS gatehouses (
        id TEXT PRIMARY KEY,
        workshop_id TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TEXT NOT NULL,
        FOREIGN KEY(workshop_id) REFERENCES workshops(id)
    )
";

pub fn catalog_schema() -> [&'static str; 6] {
    [
        CATALOG_SCHEMA_FACTORIES,
        CATALOG_SCHEMA_WORKSHOPS,
        CATALOG_SCHEMA_REPOS,
        CATALOG_SCHEMA_WORKBENCHES,
        CATALOG_SCHEMA_WORKBENCHES_INDEX,
        CATALOG_SCHEMA_GATEHOUSES,
    ]
}
