//! Core data models for the cluster usage harvester

use serde::{Deserialize, Serialize};

/// Kind of monitored entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Pod,
    Node,
}

impl EntityKind {
    /// Directory name grouping stores of this kind within a run
    pub fn store_dir(&self) -> &'static str {
        match self {
            EntityKind::Pod => "pods",
            EntityKind::Node => "nodes",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Pod => write!(f, "pod"),
            EntityKind::Node => write!(f, "node"),
        }
    }
}

/// A monitored pod or node. Identity is (kind, namespace, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl Entity {
    pub fn pod(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            kind: EntityKind::Pod,
            namespace,
            name: name.into(),
        }
    }

    pub fn node(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Node,
            namespace: None,
            name: name.into(),
        }
    }

    /// Store file stem for this entity, namespace-qualified so two pods
    /// with the same name in different namespaces never share a store.
    pub fn store_key(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}_{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Discovery result: an entity plus its readiness at list time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStatus {
    pub entity: Entity,
    pub ready: bool,
}

/// An ordered field set. Insertion order is preserved so rows written from
/// a record keep positional stability across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Insert a field, replacing the value in place if the key exists
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One measurement of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix seconds at collection time
    pub timestamp: i64,
    /// Entity name plus raw metric columns, in table order
    pub fields: Record,
}

impl Sample {
    pub fn new(timestamp: i64, fields: Record) -> Self {
        Self { timestamp, fields }
    }
}

/// Entity filter driving a collection session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Scope {
    /// Sample a fixed set of named entities unconditionally
    Fixed(Vec<Entity>),
    /// Discover ready entities of one kind each tick
    Discover {
        kind: EntityKind,
        namespace: Option<String>,
    },
}

impl Scope {
    pub fn fixed(entity: Entity) -> Self {
        Scope::Fixed(vec![entity])
    }

    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            Scope::Fixed(entities) => entities.first().map(|e| e.kind),
            Scope::Discover { kind, .. } => Some(*kind),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Scope::Fixed(entities) => entities.first().and_then(|e| e.namespace.as_deref()),
            Scope::Discover { namespace, .. } => namespace.as_deref(),
        }
    }
}

/// Aggregate statistics for one numeric field of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    /// Exact mean; round with [`FieldStats::avg_rounded`] for display
    pub avg: f64,
    /// Samples that contributed (non-normalizable values are excluded)
    pub samples: usize,
}

impl FieldStats {
    /// Mean rounded to two decimals, matching the report display precision
    pub fn avg_rounded(&self) -> f64 {
        (self.avg * 100.0).round() / 100.0
    }
}

/// Per-entity analysis output, recomputed fresh from the series each run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub entity_name: String,
    pub kind: EntityKind,
    /// (field name, stats) in the series' column order
    pub stats: Vec<(String, FieldStats)>,
    /// Destination description when rows were forwarded to an export sink
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_marker: Option<String>,
}

impl AnalysisReport {
    pub fn field(&self, name: &str) -> Option<&FieldStats> {
        self.stats
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, stats)| stats)
    }
}
