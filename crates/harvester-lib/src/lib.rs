//! Cluster harvester library
//!
//! Periodic resource sampling for pods and nodes: tabular output from
//! the metrics source is parsed, appended to per-entity series stores,
//! and summarized after a run into min/max/avg reports. Collection runs
//! as cancellable sessions coordinated through a shared registry, with
//! Prometheus metrics and component health tracking for the daemon.

pub mod analysis;
pub mod errors;
pub mod export;
pub mod health;
pub mod models;
pub mod observability;
pub mod parser;
pub mod series;
pub mod session;
pub mod source;

pub use analysis::{AnalysisEngine, AnalysisOptions};
pub use export::{ExportRow, ExportSink, JsonFileSink};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::HarvesterMetrics;
pub use series::{SeriesReader, SeriesWriter, StoreId};
pub use session::{CancellationToken, CollectionSession, SessionRegistry, SessionState};
pub use source::{KubectlSource, MetricsSource};
