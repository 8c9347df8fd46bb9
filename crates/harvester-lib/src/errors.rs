//! Error taxonomy for the harvester core
//!
//! Per-entity and per-sample failures are absorbed where they occur and
//! never outlive the tick that produced them. Structural failures (schema
//! drift, drain timeout) propagate to the owner because the collected data
//! or the shutdown guarantee can no longer be trusted.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Metrics source failure scoped to one entity on one tick.
///
/// Sessions log these and skip the entity for the tick; they are never
/// fatal to a collection run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("usage query for {entity} failed: {reason}")]
    Query { entity: String, reason: String },

    #[error("entity listing for {scope} failed: {reason}")]
    List { scope: String, reason: String },

    #[error("usage query for {entity} timed out after {timeout:?}")]
    Timeout { entity: String, timeout: Duration },
}

/// Raw table text that cannot be aligned against its header row.
///
/// Downstream numeric parsing assumes positional correctness, so a
/// misaligned row is rejected outright instead of padded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableParseError {
    #[error("table has no header row")]
    Empty,

    #[error("row {line} has {actual} tokens, header has {expected}")]
    MalformedRow {
        line: usize,
        expected: usize,
        actual: usize,
    },
}

/// Per-entity series store failures.
#[derive(Debug, Error)]
pub enum SeriesError {
    /// The field set of an append no longer matches the store's established
    /// header. Fatal to the owning session: the monitored entity's output
    /// format changed mid-run in a way that would corrupt the time series.
    #[error("store {store}: field set changed from {expected:?} to {actual:?}")]
    SchemaDrift {
        store: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("store io failure at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure that terminates a collection session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error("session task panicked: {0}")]
    Panicked(String),
}

/// Coordinated-shutdown failure. The owner must treat the run's shutdown
/// as failed and must not analyze a store that may still receive writes.
#[derive(Debug, Error)]
pub enum DrainError {
    #[error("session {session} did not stop within {waited:?}")]
    Timeout { session: String, waited: Duration },
}

/// Analysis-stage failures.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("run directory {path} does not exist")]
    MissingRun { path: PathBuf },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Export sink failure. Logged and reported, but the locally computed
/// report remains the authoritative result of the analysis stage.
#[derive(Debug, Error)]
#[error("export to {destination} failed: {reason}")]
pub struct ExportError {
    pub destination: String,
    pub reason: String,
}
