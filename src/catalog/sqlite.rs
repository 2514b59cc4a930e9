use super::{
    Factory, FactoryStore, Gatehouse, GatehouseStore, RecordStatus, Repo, RepoStore, Workbench,
    WorkbenchStore, Workshop, WorkshopStore, format_id,
};
use crate::core::db;
use crate::core::error::OrcError;
use crate::core::schemas;
use crate::core::time::now_epoch_z;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::OnceLock;

/// Catalog backed by the SQLite database at `[paths] catalog`.
pub struct SqliteCatalog {
    conn: Connection,
}

fn name_pattern() -> &'static Regex {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$").expect("static regex"))
}

/// Names become directory names and tmux window names.
fn validate_name(kind: &str, name: &str) -> Result<(), OrcError> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(OrcError::Validation(format!(
            "invalid {} name '{}': use letters, digits, '.', '_' or '-'",
            kind, name
        )))
    }
}

impl SqliteCatalog {
    pub fn open(db_path: &Path) -> Result<Self, OrcError> {
        Ok(Self {
            conn: db::open_catalog(db_path)?,
        })
    }

    fn next_id(&self, table: &str, prefix: &str) -> Result<String, OrcError> {
        let query = format!(
            "SELECT COALESCE(MAX(CAST(SUBSTR(id, ?1) AS INTEGER)), 0) FROM {} WHERE id LIKE ?2",
            table
        );
        let max: i64 = self.conn.query_row(
            &query,
            params![prefix.len() as i64 + 2, format!("{}-%", prefix)],
            |row| row.get(0),
        )?;
        Ok(format_id(prefix, max as u64 + 1))
    }

    pub fn create_factory(&self, name: &str) -> Result<Factory, OrcError> {
        validate_name("factory", name)?;
        let id = self.next_id("factories", schemas::FACTORY_ID_PREFIX)?;
        self.conn.execute(
            "INSERT INTO factories (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id, name, now_epoch_z()],
        )?;
        Ok(Factory {
            id,
            name: name.to_string(),
        })
    }

    pub fn create_workshop(&self, name: &str, factory_id: &str) -> Result<Workshop, OrcError> {
        validate_name("workshop", name)?;
        if self.get_factory(factory_id)?.is_none() {
            return Err(OrcError::NotFound(format!("factory {}", factory_id)));
        }
        let id = self.next_id("workshops", schemas::WORKSHOP_ID_PREFIX)?;
        let ts = now_epoch_z();
        self.conn.execute(
            "INSERT INTO workshops (id, name, factory_id, status, created_at, updated_at) VALUES (?1, ?2, ?3, 'active', ?4, ?4)",
            params![id, name, factory_id, ts],
        )?;
        Ok(Workshop {
            id,
            name: name.to_string(),
            factory_id: factory_id.to_string(),
            status: RecordStatus::Active,
        })
    }

    pub fn create_repo(&self, name: &str, local_path: &Path) -> Result<Repo, OrcError> {
        validate_name("repo", name)?;
        let id = self.next_id("repos", schemas::REPO_ID_PREFIX)?;
        let local_path = local_path.to_string_lossy().to_string();
        self.conn.execute(
            "INSERT INTO repos (id, name, local_path, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, local_path, now_epoch_z()],
        )?;
        Ok(Repo {
            id,
            name: name.to_string(),
            local_path,
        })
    }

    pub fn create_workbench(
        &self,
        name: &str,
        workshop_id: &str,
        repo_id: Option<&str>,
        home_branch: &str,
    ) -> Result<Workbench, OrcError> {
        validate_name("workbench", name)?;
        if self.get_workshop(workshop_id)?.is_none() {
            return Err(OrcError::NotFound(format!("workshop {}", workshop_id)));
        }
        if let Some(repo_id) = repo_id {
            if self.get_repo(repo_id)?.is_none() {
                return Err(OrcError::NotFound(format!("repo {}", repo_id)));
            }
        }
        let id = self.next_id("workbenches", schemas::WORKBENCH_ID_PREFIX)?;
        let ts = now_epoch_z();
        self.conn.execute(
            "INSERT INTO workbenches (id, name, workshop_id, repo_id, home_branch, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?6)",
            params![id, name, workshop_id, repo_id, home_branch, ts],
        )?;
        Ok(Workbench {
            id,
            name: name.to_string(),
            workshop_id: workshop_id.to_string(),
            repo_id: repo_id.map(str::to_string),
            home_branch: home_branch.to_string(),
            status: RecordStatus::Active,
        })
    }

    pub fn set_workbench_status(&self, id: &str, status: RecordStatus) -> Result<(), OrcError> {
        let changed = self.conn.execute(
            "UPDATE workbenches SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now_epoch_z(), id],
        )?;
        if changed == 0 {
            return Err(OrcError::NotFound(format!("workbench {}", id)));
        }
        Ok(())
    }

    pub fn set_workshop_status(&self, id: &str, status: RecordStatus) -> Result<(), OrcError> {
        let changed = self.conn.execute(
            "UPDATE workshops SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now_epoch_z(), id],
        )?;
        if changed == 0 {
            return Err(OrcError::NotFound(format!("workshop {}", id)));
        }
        Ok(())
    }

    /// Removes a workbench record; used to exercise orphan detection.
    pub fn delete_workbench(&self, id: &str) -> Result<(), OrcError> {
        self.conn
            .execute("DELETE FROM workbenches WHERE id = ?1", params![id])?;
        Ok(())
    }
}

impl FactoryStore for SqliteCatalog {
    fn get_factory(&self, id: &str) -> Result<Option<Factory>, OrcError> {
        let factory = self
            .conn
            .query_row(
                "SELECT id, name FROM factories WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Factory {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(factory)
    }
}

impl WorkshopStore for SqliteCatalog {
    fn get_workshop(&self, id: &str) -> Result<Option<Workshop>, OrcError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, factory_id, status FROM workshops WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, name, factory_id, status)) => Ok(Some(Workshop {
                id,
                name,
                factory_id,
                status: RecordStatus::parse(&status)?,
            })),
            None => Ok(None),
        }
    }
}

impl RepoStore for SqliteCatalog {
    fn get_repo(&self, id: &str) -> Result<Option<Repo>, OrcError> {
        let repo = self
            .conn
            .query_row(
                "SELECT id, name, local_path FROM repos WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Repo {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        local_path: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(repo)
    }
}

impl WorkbenchStore for SqliteCatalog {
    fn list_workbenches(&self, workshop_id: &str) -> Result<Vec<Workbench>, OrcError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, workshop_id, repo_id, home_branch, status FROM workbenches WHERE workshop_id = ?1 ORDER BY CAST(SUBSTR(id, ?2) AS INTEGER) ASC, id ASC",
        )?;
        // Numeric order, so BENCH-1000 sorts after BENCH-999.
        let suffix_start = schemas::WORKBENCH_ID_PREFIX.len() as i64 + 2;
        let mut rows = stmt.query(params![workshop_id, suffix_start])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let status: String = row.get(5)?;
            out.push(Workbench {
                id: row.get(0)?,
                name: row.get(1)?,
                workshop_id: row.get(2)?,
                repo_id: row.get(3)?,
                home_branch: row.get(4)?,
                status: RecordStatus::parse(&status)?,
            });
        }
        Ok(out)
    }

    fn workbench_exists(&self, id: &str) -> Result<bool, OrcError> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM workbenches WHERE id = ?1", params![id], |_| {
                Ok(true)
            })
            .optional()?;
        Ok(found.unwrap_or(false))
    }

    fn workbench_name_exists(&self, name: &str) -> Result<bool, OrcError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM workbenches WHERE name = ?1",
                params![name],
                |_| Ok(true),
            )
            .optional()?;
        Ok(found.unwrap_or(false))
    }
}

impl GatehouseStore for SqliteCatalog {
    fn gatehouse_for_workshop(&self, workshop_id: &str) -> Result<Option<Gatehouse>, OrcError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, workshop_id, status FROM gatehouses WHERE workshop_id = ?1",
                params![workshop_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, workshop_id, status)) => Ok(Some(Gatehouse {
                id,
                workshop_id,
                status: RecordStatus::parse(&status)?,
            })),
            None => Ok(None),
        }
    }

    fn gatehouse_exists(&self, id: &str) -> Result<bool, OrcError> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM gatehouses WHERE id = ?1", params![id], |_| {
                Ok(true)
            })
            .optional()?;
        Ok(found.unwrap_or(false))
    }

    fn create_gatehouse(&self, workshop_id: &str) -> Result<Gatehouse, OrcError> {
        if let Some(existing) = self.gatehouse_for_workshop(workshop_id)? {
            return Ok(existing);
        }
        let id = self.next_id("gatehouses", schemas::GATEHOUSE_ID_PREFIX)?;
        self.conn.execute(
            "INSERT INTO gatehouses (id, workshop_id, status, created_at) VALUES (?1, ?2, 'active', ?3)",
            params![id, workshop_id, now_epoch_z()],
        )?;
        tracing::info!(gatehouse = %id, workshop = %workshop_id, "created gatehouse record");
        Ok(Gatehouse {
            id,
            workshop_id: workshop_id.to_string(),
            status: RecordStatus::Active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> (tempfile::TempDir, SqliteCatalog) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SqliteCatalog::open(&dir.path().join("orc.db")).unwrap();
        (dir, catalog)
    }

    #[test]
    fn ids_are_allocated_sequentially_per_table() {
        let (_dir, cat) = catalog();
        let f = cat.create_factory("alpha").unwrap();
        assert_eq!(f.id, "FACT-001");
        let w1 = cat.create_workshop("one", &f.id).unwrap();
        let w2 = cat.create_workshop("two", &f.id).unwrap();
        assert_eq!(w1.id, "WORK-001");
        assert_eq!(w2.id, "WORK-002");
    }

    #[test]
    fn create_gatehouse_is_one_per_workshop() {
        let (_dir, cat) = catalog();
        let f = cat.create_factory("alpha").unwrap();
        let w = cat.create_workshop("one", &f.id).unwrap();
        assert!(cat.gatehouse_for_workshop(&w.id).unwrap().is_none());

        let g1 = cat.create_gatehouse(&w.id).unwrap();
        let g2 = cat.create_gatehouse(&w.id).unwrap();
        assert_eq!(g1, g2);
        assert_eq!(g1.id, "GATE-001");
        assert!(cat.gatehouse_exists("GATE-001").unwrap());
        assert!(!cat.gatehouse_exists("GATE-002").unwrap());
    }

    #[test]
    fn workbenches_list_in_catalog_order_including_archived() {
        let (_dir, cat) = catalog();
        let f = cat.create_factory("alpha").unwrap();
        let w = cat.create_workshop("one", &f.id).unwrap();
        let b1 = cat.create_workbench("bench-a", &w.id, None, "").unwrap();
        let b2 = cat.create_workbench("bench-b", &w.id, None, "main").unwrap();
        cat.set_workbench_status(&b1.id, RecordStatus::Archived).unwrap();

        let list = cat.list_workbenches(&w.id).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, b1.id);
        assert!(list[0].is_archived());
        assert_eq!(list[1].id, b2.id);
        assert_eq!(list[1].home_branch, "main");
    }

    #[test]
    fn workbenches_list_in_numeric_id_order_past_three_digits() {
        let (_dir, cat) = catalog();
        let f = cat.create_factory("alpha").unwrap();
        let w = cat.create_workshop("one", &f.id).unwrap();
        for (id, name) in [("BENCH-1000", "late"), ("BENCH-999", "early")] {
            cat.conn
                .execute(
                    "INSERT INTO workbenches (id, name, workshop_id, repo_id, home_branch, status, created_at, updated_at) VALUES (?1, ?2, ?3, NULL, '', 'active', ?4, ?4)",
                    params![id, name, w.id, now_epoch_z()],
                )
                .unwrap();
        }

        let ids: Vec<String> = cat
            .list_workbenches(&w.id)
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec!["BENCH-999", "BENCH-1000"]);

        let next = cat.create_workbench("next", &w.id, None, "").unwrap();
        assert_eq!(next.id, "BENCH-1001");
        let last = cat.list_workbenches(&w.id).unwrap().pop().unwrap();
        assert_eq!(last.id, "BENCH-1001");
    }

    #[test]
    fn create_workbench_requires_known_workshop_and_repo() {
        let (_dir, cat) = catalog();
        let err = cat.create_workbench("x", "WORK-404", None, "").unwrap_err();
        assert!(matches!(err, OrcError::NotFound(_)));

        let f = cat.create_factory("alpha").unwrap();
        let w = cat.create_workshop("one", &f.id).unwrap();
        let err = cat
            .create_workbench("x", &w.id, Some("REPO-404"), "")
            .unwrap_err();
        assert!(matches!(err, OrcError::NotFound(_)));
    }

    #[test]
    fn names_must_be_path_safe() {
        let (_dir, cat) = catalog();
        assert!(cat.create_factory("../escape").is_err());
        assert!(cat.create_factory("has space").is_err());
        assert!(cat.create_factory("ok_name-1.2").is_ok());
    }

    #[test]
    fn status_updates_report_missing_records() {
        let (_dir, cat) = catalog();
        let err = cat
            .set_workshop_status("WORK-404", RecordStatus::Archived)
            .unwrap_err();
        assert!(matches!(err, OrcError::NotFound(_)));
    }
}
