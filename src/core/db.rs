use crate::core::error;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, error::OrcError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::OrcError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::OrcError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::OrcError::RusqliteError)?;
    Ok(conn)
}

pub fn catalog_db_path(state_dir: &Path) -> PathBuf {
    state_dir.join(schemas::CATALOG_DB_NAME)
}

/// Open (creating if needed) the catalog database and apply the schema.
pub fn open_catalog(db_path: &Path) -> Result<Connection, error::OrcError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(error::OrcError::IoError)?;
        }
    }
    let conn = db_connect(&db_path.to_string_lossy())?;
    for stmt in schemas::catalog_schema() {
        conn.execute(stmt, [])?;
    }
    Ok(conn)
}
