//! Per-entity time-series persistence
//!
//! A collection run owns one directory under the store root:
//!
//! ```text
//! <root>/<run_id>/pods/<store_key>.csv
//! <root>/<run_id>/nodes/<store_key>.csv
//! ```
//!
//! Each file is the append-only series of one entity. Rows carry the
//! entity's raw metric columns in the order established by the first
//! append, with the collection timestamp as the final column. The header
//! row is written at most once per store; rows rely on positional
//! stability after that.

mod reader;
mod writer;

pub use reader::{SeriesReader, StoreRows};
pub use writer::SeriesWriter;

use crate::models::{Entity, EntityKind};

/// Timestamp column appended to every row. Always last, so a header row
/// is distinguishable from data by its final field.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Identifies one entity's store within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreId {
    pub kind: EntityKind,
    pub key: String,
}

impl StoreId {
    pub fn for_entity(entity: &Entity) -> Self {
        Self {
            kind: entity.kind,
            key: entity.store_key(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.key)
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind.store_dir(), self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_id_from_entity() {
        let pod = Entity::pod("web-0", Some("prod".to_string()));
        let id = StoreId::for_entity(&pod);
        assert_eq!(id.kind, EntityKind::Pod);
        assert_eq!(id.key, "prod_web-0");
        assert_eq!(id.file_name(), "prod_web-0.csv");
        assert_eq!(id.to_string(), "pods/prod_web-0");
    }
}
