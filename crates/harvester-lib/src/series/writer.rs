//! Append-only store writer

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{StoreId, TIMESTAMP_COLUMN};
use crate::errors::SeriesError;
use crate::models::Sample;

/// Writes per-entity series files for one collection run.
///
/// The field order of a store is established by the first append this
/// writer performs against it and enforced on every later append. A
/// record whose key set differs fails with
/// [`SeriesError::SchemaDrift`] before anything is written, so the
/// store's prior content is never touched by a drifting sample.
///
/// Header rule: a header row is written only when the store file does
/// not exist yet and the entity is not newly discovered this run
/// (`is_first_for_run == false`). New entities rely on positional
/// stability instead, so ticks interleaving across pre-existing and
/// newly discovered entities cannot produce duplicate headers.
pub struct SeriesWriter {
    run_dir: PathBuf,
    established: HashMap<PathBuf, Vec<String>>,
}

impl SeriesWriter {
    pub fn new(root: impl Into<PathBuf>, run_id: &str) -> Self {
        Self {
            run_dir: root.into().join(run_id),
            established: HashMap::new(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn store_path(&self, id: &StoreId) -> PathBuf {
        self.run_dir.join(id.kind.store_dir()).join(id.file_name())
    }

    /// Append one sample to the entity's store, creating it on demand.
    pub fn append(
        &mut self,
        id: &StoreId,
        sample: &Sample,
        is_first_for_run: bool,
    ) -> Result<(), SeriesError> {
        let path = self.store_path(id);

        let keys: Vec<String> = sample.fields.keys().map(str::to_string).collect();
        match self.established.get(&path) {
            Some(expected) if *expected != keys => {
                return Err(SeriesError::SchemaDrift {
                    store: id.to_string(),
                    expected: expected.clone(),
                    actual: keys,
                });
            }
            Some(_) => {}
            None => {
                self.established.insert(path.clone(), keys.clone());
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SeriesError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let exists = path.exists();
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|source| SeriesError::Io {
                path: path.clone(),
                source,
            })?;

        if !exists && !is_first_for_run {
            let mut header = keys.join(",");
            header.push(',');
            header.push_str(TIMESTAMP_COLUMN);
            header.push('\n');
            file.write_all(header.as_bytes())
                .map_err(|source| SeriesError::Io {
                    path: path.clone(),
                    source,
                })?;
            debug!(store = %id, "wrote store header");
        }

        let mut row = sample.fields.values().collect::<Vec<_>>().join(",");
        row.push(',');
        row.push_str(&sample.timestamp.to_string());
        row.push('\n');
        file.write_all(row.as_bytes())
            .map_err(|source| SeriesError::Io {
                path: path.clone(),
                source,
            })?;
        file.flush().map_err(|source| SeriesError::Io {
            path,
            source,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, Record};
    use tempfile::TempDir;

    fn sample(ts: i64, cpu: &str, mem: &str) -> Sample {
        let mut fields = Record::new();
        fields.insert("NAME", "web-0");
        fields.insert("CPU(cores)", cpu);
        fields.insert("MEMORY(bytes)", mem);
        Sample::new(ts, fields)
    }

    fn read(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_append_writes_header_once_for_restarted_store() {
        let dir = TempDir::new().unwrap();
        let mut writer = SeriesWriter::new(dir.path(), "run-1");
        let id = StoreId::for_entity(&Entity::pod("web-0", Some("prod".to_string())));

        writer.append(&id, &sample(100, "10m", "20Mi"), false).unwrap();
        writer.append(&id, &sample(101, "15m", "25Mi"), false).unwrap();

        let lines = read(&writer.store_path(&id));
        assert_eq!(
            lines,
            vec![
                "NAME,CPU(cores),MEMORY(bytes),timestamp",
                "web-0,10m,20Mi,100",
                "web-0,15m,25Mi,101",
            ]
        );
    }

    #[test]
    fn test_append_suppresses_header_for_new_entity() {
        let dir = TempDir::new().unwrap();
        let mut writer = SeriesWriter::new(dir.path(), "run-1");
        let id = StoreId::for_entity(&Entity::pod("web-0", None));

        writer.append(&id, &sample(100, "10m", "20Mi"), true).unwrap();
        // Tick 2: entity is already tracked, but the store exists now, so
        // still no header.
        writer.append(&id, &sample(101, "15m", "25Mi"), false).unwrap();

        let lines = read(&writer.store_path(&id));
        assert_eq!(lines, vec!["web-0,10m,20Mi,100", "web-0,15m,25Mi,101"]);
    }

    #[test]
    fn test_append_never_rewrites_header_on_existing_store() {
        let dir = TempDir::new().unwrap();
        let id = StoreId::for_entity(&Entity::node("worker-1"));

        let mut first = SeriesWriter::new(dir.path(), "run-1");
        first.append(&id, &sample(100, "10m", "20Mi"), false).unwrap();

        // Fresh writer against the same run directory, as after a restart.
        let mut second = SeriesWriter::new(dir.path(), "run-1");
        second.append(&id, &sample(101, "15m", "25Mi"), false).unwrap();

        let lines = read(&second.store_path(&id));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "NAME,CPU(cores),MEMORY(bytes),timestamp");
        assert_eq!(
            lines.iter().filter(|l| l.ends_with(",timestamp")).count(),
            1
        );
    }

    #[test]
    fn test_append_rejects_schema_drift_and_keeps_store_intact() {
        let dir = TempDir::new().unwrap();
        let mut writer = SeriesWriter::new(dir.path(), "run-1");
        let id = StoreId::for_entity(&Entity::pod("web-0", None));

        writer.append(&id, &sample(100, "10m", "20Mi"), false).unwrap();
        let before = read(&writer.store_path(&id));

        let mut drifted = Record::new();
        drifted.insert("NAME", "web-0");
        drifted.insert("CPU(cores)", "11m");
        let err = writer
            .append(&id, &Sample::new(101, drifted), false)
            .unwrap_err();

        match err {
            SeriesError::SchemaDrift {
                store,
                expected,
                actual,
            } => {
                assert_eq!(store, "pods/web-0");
                assert_eq!(expected, vec!["NAME", "CPU(cores)", "MEMORY(bytes)"]);
                assert_eq!(actual, vec!["NAME", "CPU(cores)"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(read(&writer.store_path(&id)), before);
    }

    #[test]
    fn test_stores_separated_by_kind() {
        let dir = TempDir::new().unwrap();
        let mut writer = SeriesWriter::new(dir.path(), "run-1");

        let pod = StoreId::for_entity(&Entity::pod("shared-name", None));
        let node = StoreId::for_entity(&Entity::node("shared-name"));
        writer.append(&pod, &sample(100, "10m", "20Mi"), false).unwrap();
        writer.append(&node, &sample(100, "1000m", "4096Mi"), false).unwrap();

        assert_ne!(writer.store_path(&pod), writer.store_path(&node));
        assert!(writer.store_path(&pod).ends_with("pods/shared-name.csv"));
        assert!(writer.store_path(&node).ends_with("nodes/shared-name.csv"));
    }
}
