//! Store reader for the analysis stage

use std::path::{Path, PathBuf};

use super::{StoreId, TIMESTAMP_COLUMN};
use crate::errors::SeriesError;
use crate::models::EntityKind;

/// Content of one per-entity store.
///
/// `header` is `None` for stores whose header row was suppressed at
/// write time; their columns are identified positionally. The first row
/// is recognized as a header by its final field: the timestamp column is
/// always written last, so a header ends in the literal column name
/// while a data row ends in an integer.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRows {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

/// Reads the per-entity stores of one collection run.
pub struct SeriesReader {
    run_dir: PathBuf,
}

impl SeriesReader {
    pub fn new(root: impl Into<PathBuf>, run_id: &str) -> Self {
        Self {
            run_dir: root.into().join(run_id),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn exists(&self) -> bool {
        self.run_dir.is_dir()
    }

    /// Stores of one kind within the run, sorted by store key so repeated
    /// analysis passes see a stable order.
    pub fn list_stores(&self, kind: EntityKind) -> Result<Vec<StoreId>, SeriesError> {
        let kind_dir = self.run_dir.join(kind.store_dir());
        if !kind_dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&kind_dir).map_err(|source| SeriesError::Io {
            path: kind_dir.clone(),
            source,
        })?;

        let mut stores = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SeriesError::Io {
                path: kind_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stores.push(StoreId {
                    kind,
                    key: stem.to_string(),
                });
            }
        }
        stores.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(stores)
    }

    pub fn read_store(&self, id: &StoreId) -> Result<StoreRows, SeriesError> {
        let path = self.run_dir.join(id.kind.store_dir()).join(id.file_name());
        let content = std::fs::read_to_string(&path).map_err(|source| SeriesError::Io {
            path: path.clone(),
            source,
        })?;

        let mut header = None;
        let mut rows = Vec::new();
        for (index, line) in content.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            let fields: Vec<String> = line.split(',').map(str::to_string).collect();
            let is_header =
                index == 0 && fields.last().map(String::as_str) == Some(TIMESTAMP_COLUMN);
            if is_header {
                header = Some(fields);
            } else {
                rows.push(fields);
            }
        }

        Ok(StoreRows { header, rows })
    }
}
