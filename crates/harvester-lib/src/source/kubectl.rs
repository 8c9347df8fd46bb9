//! kubectl-backed metrics source
//!
//! Shells out to `kubectl top` for usage tables and `kubectl get -o json`
//! for discovery. Readiness predicates: a pod is ready when every
//! container status reports ready, a node when its Ready condition is
//! True.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use super::MetricsSource;
use crate::errors::SourceError;
use crate::models::{Entity, EntityKind, EntityStatus, Scope};

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct KubectlSource {
    kubectl: String,
    query_timeout: Duration,
}

impl Default for KubectlSource {
    fn default() -> Self {
        Self::new()
    }
}

impl KubectlSource {
    pub fn new() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Override the binary path and per-invocation timeout (for testing
    /// against a stub executable).
    pub fn with_command(kubectl: impl Into<String>, query_timeout: Duration) -> Self {
        Self {
            kubectl: kubectl.into(),
            query_timeout,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, String> {
        debug!(command = %self.kubectl, ?args, "invoking kubectl");
        let output = Command::new(&self.kubectl)
            .args(args)
            .output()
            .await
            .map_err(|e| format!("failed to spawn {}: {}", self.kubectl, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                self.kubectl,
                output.status,
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Extract pod statuses from `kubectl get pods -o json` output.
    pub fn parse_pod_list(raw: &str, namespace: Option<&str>) -> Result<Vec<EntityStatus>, String> {
        let doc: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        let items = doc["items"].as_array().ok_or("missing items array")?;

        let mut statuses = Vec::new();
        for item in items {
            let name = match item["metadata"]["name"].as_str() {
                Some(name) => name.to_string(),
                None => continue,
            };
            let ns = item["metadata"]["namespace"]
                .as_str()
                .map(str::to_string)
                .or_else(|| namespace.map(str::to_string));

            let ready = match item["status"]["containerStatuses"].as_array() {
                Some(containers) if !containers.is_empty() => containers
                    .iter()
                    .all(|c| c["ready"].as_bool().unwrap_or(false)),
                _ => false,
            };

            statuses.push(EntityStatus {
                entity: Entity::pod(name, ns),
                ready,
            });
        }
        Ok(statuses)
    }

    /// Extract node statuses from `kubectl get nodes -o json` output.
    pub fn parse_node_list(raw: &str) -> Result<Vec<EntityStatus>, String> {
        let doc: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        let items = doc["items"].as_array().ok_or("missing items array")?;

        let mut statuses = Vec::new();
        for item in items {
            let name = match item["metadata"]["name"].as_str() {
                Some(name) => name.to_string(),
                None => continue,
            };

            let ready = item["status"]["conditions"]
                .as_array()
                .map(|conditions| {
                    conditions.iter().any(|c| {
                        c["type"].as_str() == Some("Ready")
                            && c["status"].as_str() == Some("True")
                    })
                })
                .unwrap_or(false);

            statuses.push(EntityStatus {
                entity: Entity::node(name),
                ready,
            });
        }
        Ok(statuses)
    }

    async fn discover(
        &self,
        kind: EntityKind,
        namespace: Option<&str>,
    ) -> Result<Vec<EntityStatus>, SourceError> {
        let scope_label = match namespace {
            Some(ns) => format!("{kind}s in {ns}"),
            None => format!("{kind}s"),
        };

        let mut args: Vec<&str> = vec!["get"];
        match kind {
            EntityKind::Pod => args.push("pods"),
            EntityKind::Node => args.push("nodes"),
        }
        if let Some(ns) = namespace {
            args.extend(["-n", ns]);
        }
        args.extend(["-o", "json"]);

        let raw = tokio::time::timeout(self.query_timeout, self.run(&args))
            .await
            .map_err(|_| SourceError::List {
                scope: scope_label.clone(),
                reason: format!("timed out after {:?}", self.query_timeout),
            })?
            .map_err(|reason| SourceError::List {
                scope: scope_label.clone(),
                reason,
            })?;

        let parsed = match kind {
            EntityKind::Pod => Self::parse_pod_list(&raw, namespace),
            EntityKind::Node => Self::parse_node_list(&raw),
        };
        parsed.map_err(|reason| SourceError::List {
            scope: scope_label,
            reason,
        })
    }
}

#[async_trait]
impl MetricsSource for KubectlSource {
    async fn list_entities(&self, scope: &Scope) -> Result<Vec<EntityStatus>, SourceError> {
        match scope {
            // Fixed entities are targeted unconditionally.
            Scope::Fixed(entities) => Ok(entities
                .iter()
                .cloned()
                .map(|entity| EntityStatus {
                    entity,
                    ready: true,
                })
                .collect()),
            Scope::Discover { kind, namespace } => {
                self.discover(*kind, namespace.as_deref()).await
            }
        }
    }

    async fn sample_usage(&self, entity: &Entity) -> Result<String, SourceError> {
        let mut args: Vec<&str> = vec!["top"];
        match entity.kind {
            EntityKind::Pod => args.push("pod"),
            EntityKind::Node => args.push("node"),
        }
        args.push(&entity.name);
        if let Some(ns) = entity.namespace.as_deref() {
            args.extend(["-n", ns]);
        }

        tokio::time::timeout(self.query_timeout, self.run(&args))
            .await
            .map_err(|_| SourceError::Timeout {
                entity: entity.to_string(),
                timeout: self.query_timeout,
            })?
            .map_err(|reason| SourceError::Query {
                entity: entity.to_string(),
                reason,
            })
    }
}
