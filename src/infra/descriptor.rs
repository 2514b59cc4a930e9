//! Descriptor files: `<dir>/.orc/config.json` holding `{version, place_id}`.
//!
//! The descriptor is the only link from a directory on disk back to its catalog
//! record; the orphan scanner depends on this schema staying stable.

use crate::core::error::OrcError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DESCRIPTOR_VERSION: &str = "1.0";
pub const CONTROL_DIR: &str = ".orc";
pub const DESCRIPTOR_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub version: String,
    pub place_id: String,
}

impl Descriptor {
    pub fn new(place_id: &str) -> Self {
        Self {
            version: DESCRIPTOR_VERSION.to_string(),
            place_id: place_id.to_string(),
        }
    }

    pub fn render(&self) -> Result<String, OrcError> {
        let mut body = serde_json::to_string_pretty(self)?;
        body.push('\n');
        Ok(body)
    }
}

pub fn control_dir(managed_dir: &Path) -> PathBuf {
    managed_dir.join(CONTROL_DIR)
}

pub fn descriptor_path(managed_dir: &Path) -> PathBuf {
    control_dir(managed_dir).join(DESCRIPTOR_FILE)
}

/// Read a descriptor file; unreadable or malformed files yield `None`.
pub fn read_descriptor(path: &Path) -> Option<Descriptor> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Descriptor>(&raw) {
        Ok(d) if !d.place_id.trim().is_empty() => Some(d),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ignoring malformed descriptor");
            None
        }
    }
}
