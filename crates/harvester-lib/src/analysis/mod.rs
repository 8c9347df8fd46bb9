//! Post-run analysis
//!
//! Recomputes per-entity min/max/avg statistics from the persisted
//! series of one run. Reports are always computed locally; an optional
//! export sink receives the raw rows but can never block or invalidate
//! the local result.

mod normalize;

pub use normalize::normalize;

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::AnalysisError;
use crate::export::{ExportRow, ExportSink};
use crate::models::{AnalysisReport, EntityKind, FieldStats};
use crate::series::{SeriesReader, StoreId, StoreRows};

/// Options for one analysis pass.
#[derive(Default)]
pub struct AnalysisOptions {
    /// Re-sort reports by this field's average, descending. Entities
    /// without the field keep their relative order at the end.
    pub sort_by: Option<String>,
    /// Forward the run's raw rows to this sink after computing reports.
    pub export: Option<Arc<dyn ExportSink>>,
}

pub struct AnalysisEngine {
    root: PathBuf,
}

impl AnalysisEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Analyze every per-entity store of a run, pods before nodes, each
    /// kind in store order.
    pub async fn analyze(
        &self,
        run_id: &str,
        options: &AnalysisOptions,
    ) -> Result<Vec<AnalysisReport>, AnalysisError> {
        let reader = SeriesReader::new(&self.root, run_id);
        if !reader.exists() {
            return Err(AnalysisError::MissingRun {
                path: reader.run_dir().to_path_buf(),
            });
        }

        let mut reports = Vec::new();
        let mut export_rows = Vec::new();
        for kind in [EntityKind::Pod, EntityKind::Node] {
            for id in reader.list_stores(kind)? {
                let store = reader.read_store(&id)?;
                if options.export.is_some() {
                    export_rows.extend(rows_for_export(&id, &store));
                }
                reports.push(compute_report(&id, &store));
            }
        }
        info!(run = run_id, entities = reports.len(), "analysis complete");

        if let Some(field) = options.sort_by.as_deref() {
            reports.sort_by(|a, b| {
                let left = a.field(field).map(|s| s.avg);
                let right = b.field(field).map(|s| s.avg);
                right.partial_cmp(&left).unwrap_or(Ordering::Equal)
            });
        }

        if let Some(sink) = &options.export {
            export_rows.sort_by_key(|row| row.timestamp);
            match sink.send(&export_rows).await {
                Ok(()) => {
                    let destination = sink.destination();
                    info!(run = run_id, destination = %destination, rows = export_rows.len(), "exported run rows");
                    for report in &mut reports {
                        report.export_marker = Some(destination.clone());
                    }
                }
                Err(e) => {
                    warn!(run = run_id, error = %e, "export failed, report remains local");
                }
            }
        }

        Ok(reports)
    }
}

/// Column names for a store: header names when present, positional
/// names otherwise. The trailing timestamp column is not a field.
fn column_names(store: &StoreRows) -> Vec<String> {
    match &store.header {
        Some(header) => header[..header.len().saturating_sub(1)].to_vec(),
        None => {
            let width = store
                .rows
                .first()
                .map(|row| row.len().saturating_sub(1))
                .unwrap_or(0);
            (1..=width).map(|i| format!("column_{i}")).collect()
        }
    }
}

fn compute_report(id: &StoreId, store: &StoreRows) -> AnalysisReport {
    let names = column_names(store);

    let mut stats = Vec::new();
    for (index, name) in names.iter().enumerate() {
        let values: Vec<f64> = store
            .rows
            .iter()
            .filter_map(|row| row.get(index))
            .filter_map(|value| normalize(value))
            .collect();
        if values.is_empty() {
            continue;
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        stats.push((
            name.clone(),
            FieldStats {
                min,
                max,
                avg,
                samples: values.len(),
            },
        ));
    }

    AnalysisReport {
        entity_name: id.key.clone(),
        kind: id.kind,
        stats,
        export_marker: None,
    }
}

fn rows_for_export(id: &StoreId, store: &StoreRows) -> Vec<ExportRow> {
    store
        .rows
        .iter()
        .map(|row| {
            let timestamp = row
                .last()
                .and_then(|value| value.parse().ok())
                .unwrap_or(0);
            ExportRow {
                entity: id.key.clone(),
                kind: id.kind,
                timestamp,
                columns: row[..row.len().saturating_sub(1)].to_vec(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExportError;
    use crate::models::{Entity, Record, Sample};
    use crate::series::SeriesWriter;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write_series(root: &std::path::Path, entity: &Entity, cpu_values: &[&str]) {
        let mut writer = SeriesWriter::new(root, "run-1");
        let id = StoreId::for_entity(entity);
        for (i, cpu) in cpu_values.iter().enumerate() {
            let mut fields = Record::new();
            fields.insert("NAME", entity.name.as_str());
            fields.insert("CPU(cores)", *cpu);
            fields.insert("MEMORY(bytes)", "20Mi");
            writer
                .append(&id, &Sample::new(100 + i as i64, fields), false)
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_analyze_computes_min_max_avg() {
        let dir = TempDir::new().unwrap();
        write_series(dir.path(), &Entity::pod("web-0", None), &["100m", "200m", "300m"]);

        let engine = AnalysisEngine::new(dir.path());
        let reports = engine
            .analyze("run-1", &AnalysisOptions::default())
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.entity_name, "web-0");

        let cpu = report.field("CPU(cores)").unwrap();
        assert_eq!(cpu.min, 100.0);
        assert_eq!(cpu.max, 300.0);
        assert_eq!(cpu.avg, 200.0);
        assert_eq!(cpu.samples, 3);
    }

    #[tokio::test]
    async fn test_analyze_excludes_name_and_timestamp_fields() {
        let dir = TempDir::new().unwrap();
        write_series(dir.path(), &Entity::pod("web-0", None), &["100m"]);

        let engine = AnalysisEngine::new(dir.path());
        let reports = engine
            .analyze("run-1", &AnalysisOptions::default())
            .await
            .unwrap();

        let fields: Vec<&str> = reports[0].stats.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(fields, vec!["CPU(cores)", "MEMORY(bytes)"]);
    }

    #[tokio::test]
    async fn test_analyze_skips_non_normalizable_values_only() {
        let dir = TempDir::new().unwrap();
        write_series(
            dir.path(),
            &Entity::pod("web-0", None),
            &["100m", "<unknown>", "300m"],
        );

        let engine = AnalysisEngine::new(dir.path());
        let reports = engine
            .analyze("run-1", &AnalysisOptions::default())
            .await
            .unwrap();

        let cpu = reports[0].field("CPU(cores)").unwrap();
        assert_eq!(cpu.samples, 2);
        assert_eq!(cpu.avg, 200.0);
        // The entity itself is not excluded: the memory field saw every
        // sample.
        assert_eq!(reports[0].field("MEMORY(bytes)").unwrap().samples, 3);
    }

    #[tokio::test]
    async fn test_analyze_headerless_store_uses_positional_names() {
        let dir = TempDir::new().unwrap();
        let mut writer = SeriesWriter::new(dir.path(), "run-1");
        let id = StoreId::for_entity(&Entity::pod("web-0", None));
        let mut fields = Record::new();
        fields.insert("NAME", "web-0");
        fields.insert("CPU(cores)", "100m");
        writer.append(&id, &Sample::new(100, fields), true).unwrap();

        let engine = AnalysisEngine::new(dir.path());
        let reports = engine
            .analyze("run-1", &AnalysisOptions::default())
            .await
            .unwrap();

        let cpu = reports[0].field("column_2").unwrap();
        assert_eq!(cpu.avg, 100.0);
    }

    #[tokio::test]
    async fn test_analyze_missing_run_fails() {
        let dir = TempDir::new().unwrap();
        let engine = AnalysisEngine::new(dir.path());
        let err = engine
            .analyze("no-such-run", &AnalysisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingRun { .. }));
    }

    #[tokio::test]
    async fn test_analyze_sort_by_average_descending() {
        let dir = TempDir::new().unwrap();
        write_series(dir.path(), &Entity::pod("small", None), &["100m"]);
        write_series(dir.path(), &Entity::pod("big", None), &["900m"]);

        let engine = AnalysisEngine::new(dir.path());
        let options = AnalysisOptions {
            sort_by: Some("CPU(cores)".to_string()),
            export: None,
        };
        let reports = engine.analyze("run-1", &options).await.unwrap();

        let names: Vec<&str> = reports.iter().map(|r| r.entity_name.as_str()).collect();
        assert_eq!(names, vec!["big", "small"]);
    }

    struct RecordingSink {
        rows: Mutex<Vec<ExportRow>>,
    }

    #[async_trait]
    impl ExportSink for RecordingSink {
        fn destination(&self) -> String {
            "recording".to_string()
        }

        async fn send(&self, rows: &[ExportRow]) -> Result<(), ExportError> {
            self.rows.lock().unwrap().extend_from_slice(rows);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ExportSink for FailingSink {
        fn destination(&self) -> String {
            "failing".to_string()
        }

        async fn send(&self, _rows: &[ExportRow]) -> Result<(), ExportError> {
            Err(ExportError {
                destination: self.destination(),
                reason: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_analyze_forwards_rows_in_timestamp_order() {
        let dir = TempDir::new().unwrap();
        write_series(dir.path(), &Entity::pod("web-0", None), &["100m", "200m"]);
        write_series(dir.path(), &Entity::pod("api-0", None), &["50m"]);

        let sink = Arc::new(RecordingSink {
            rows: Mutex::new(Vec::new()),
        });
        let engine = AnalysisEngine::new(dir.path());
        let options = AnalysisOptions {
            sort_by: None,
            export: Some(sink.clone()),
        };
        let reports = engine.analyze("run-1", &options).await.unwrap();

        assert!(reports
            .iter()
            .all(|r| r.export_marker.as_deref() == Some("recording")));

        let rows = sink.rows.lock().unwrap();
        assert_eq!(rows.len(), 3);
        let timestamps: Vec<i64> = rows.iter().map(|r| r.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_unstable();
        assert_eq!(timestamps, sorted);
        assert_eq!(rows[0].columns.len(), 3);
    }

    #[tokio::test]
    async fn test_analyze_export_failure_keeps_local_report() {
        let dir = TempDir::new().unwrap();
        write_series(dir.path(), &Entity::pod("web-0", None), &["100m"]);

        let engine = AnalysisEngine::new(dir.path());
        let options = AnalysisOptions {
            sort_by: None,
            export: Some(Arc::new(FailingSink)),
        };
        let reports = engine.analyze("run-1", &options).await.unwrap();

        assert_eq!(reports.len(), 1);
        assert!(reports[0].field("CPU(cores)").is_some());
        assert_eq!(reports[0].export_marker, None);
    }
}
