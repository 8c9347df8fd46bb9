//! Metrics source seam
//!
//! Sessions talk to the cluster exclusively through [`MetricsSource`],
//! so tests substitute mock sources and the collection loop never knows
//! which backend produced its tables.

mod kubectl;

pub use kubectl::KubectlSource;

use async_trait::async_trait;

use crate::errors::SourceError;
use crate::models::{Entity, EntityStatus, Scope};

/// Backend that can enumerate entities and sample their usage.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// All entities in the scope with their readiness at list time.
    async fn list_entities(&self, scope: &Scope) -> Result<Vec<EntityStatus>, SourceError>;

    /// Raw tabular usage text for one entity, as produced by the backend.
    async fn sample_usage(&self, entity: &Entity) -> Result<String, SourceError>;
}
