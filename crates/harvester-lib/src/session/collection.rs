//! The per-scope sampling loop

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CancellationToken, SessionHandle, SessionState, StateCell};
use crate::errors::{SeriesError, SessionError, SourceError, TableParseError};
use crate::models::{Entity, Record, Sample, Scope};
use crate::observability::HarvesterMetrics;
use crate::parser::{parse_table, ENTITY_NAME_KEY};
use crate::series::{SeriesWriter, StoreId};
use crate::source::MetricsSource;

/// One collection session: samples every ready entity of its scope once
/// per interval and appends the results to per-entity stores.
///
/// The session task is the sole owner of its `tracked` set and its
/// writer, so the first-observation classification of an entity happens
/// exactly once per run and cannot race with other sessions.
pub struct CollectionSession {
    name: String,
    scope: Scope,
    interval: Duration,
    source: Arc<dyn MetricsSource>,
    writer: SeriesWriter,
    token: CancellationToken,
    tracked: HashSet<Entity>,
    state: Arc<StateCell>,
    metrics: HarvesterMetrics,
}

enum SampleFailure {
    Source(SourceError),
    Parse(TableParseError),
    Series(SeriesError),
}

impl CollectionSession {
    pub fn new(
        name: impl Into<String>,
        scope: Scope,
        interval: Duration,
        source: Arc<dyn MetricsSource>,
        writer: SeriesWriter,
        token: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            scope,
            interval,
            source,
            writer,
            token,
            tracked: HashSet::new(),
            state: Arc::new(StateCell::new(SessionState::Created)),
            metrics: HarvesterMetrics::new(),
        }
    }

    /// Spawn the session task and return its handle for the registry.
    pub fn spawn(self) -> SessionHandle {
        let name = self.name.clone();
        let state = Arc::clone(&self.state);
        let join = tokio::spawn(self.run());
        SessionHandle::new(name, state, join)
    }

    async fn run(mut self) -> Result<(), SessionError> {
        info!(
            session = %self.name,
            interval_secs = self.interval.as_secs_f64(),
            "starting collection session"
        );
        self.state.set(SessionState::Running);
        self.metrics.inc_sessions_active();

        let result = self.collect_until_stopped().await;

        self.state.set(SessionState::Stopped);
        self.metrics.dec_sessions_active();
        match &result {
            Ok(()) => info!(session = %self.name, "collection session stopped"),
            Err(e) => warn!(session = %self.name, error = %e, "collection session failed"),
        }
        result
    }

    async fn collect_until_stopped(&mut self) -> Result<(), SessionError> {
        loop {
            if self.token.is_stop_requested() {
                return Ok(());
            }

            let start = Instant::now();
            self.tick().await?;
            self.metrics
                .observe_tick_duration(start.elapsed().as_secs_f64());

            // Interruptible sleep: a stop request during the interval
            // wakes the session immediately, so shutdown latency is a
            // small fraction of the interval.
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.token.cancelled() => {}
            }
            if self.token.is_stop_requested() {
                self.state.set(SessionState::Draining);
            }
        }
    }

    /// One sampling pass over the scope's current ready entities.
    ///
    /// A listing failure skips the whole tick; per-entity source and
    /// parse failures skip that entity. Store failures are fatal.
    async fn tick(&mut self) -> Result<(), SessionError> {
        let statuses = match self.source.list_entities(&self.scope).await {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!(session = %self.name, error = %e, "entity listing failed, skipping tick");
                self.metrics.inc_collection_errors();
                return Ok(());
            }
        };

        let ready: Vec<Entity> = statuses
            .into_iter()
            .filter(|s| s.ready)
            .map(|s| s.entity)
            .collect();
        self.metrics.set_entities_last_tick(ready.len() as i64);
        debug!(session = %self.name, entities = ready.len(), "tick resolved entity set");

        for entity in &ready {
            match self.sample_entity(entity).await {
                Ok(()) => {}
                Err(SampleFailure::Source(e)) => {
                    warn!(session = %self.name, entity = %entity, error = %e, "sample failed, skipping entity");
                    self.metrics.inc_collection_errors();
                }
                Err(SampleFailure::Parse(e)) => {
                    warn!(session = %self.name, entity = %entity, error = %e, "malformed usage table, discarding sample");
                    self.metrics.inc_parse_errors();
                }
                Err(SampleFailure::Series(e)) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn sample_entity(&mut self, entity: &Entity) -> Result<(), SampleFailure> {
        let raw = self
            .source
            .sample_usage(entity)
            .await
            .map_err(SampleFailure::Source)?;
        let records = parse_table(&raw).map_err(SampleFailure::Parse)?;

        let row = records
            .iter()
            .find(|(name, _)| *name == entity.name)
            .or_else(|| records.first());
        let Some((_, record)) = row else {
            debug!(session = %self.name, entity = %entity, "usage table had no rows");
            return Ok(());
        };

        let mut fields = Record::new();
        for (key, value) in record.iter() {
            if key != ENTITY_NAME_KEY {
                fields.insert(key, value);
            }
        }

        // insert() returning true is the one and only first-observation
        // classification this entity gets for the whole run.
        let is_first_for_run = self.tracked.insert(entity.clone());
        let sample = Sample::new(chrono::Utc::now().timestamp(), fields);
        self.writer
            .append(&StoreId::for_entity(entity), &sample, is_first_for_run)
            .map_err(SampleFailure::Series)?;
        self.metrics.inc_samples_appended();
        Ok(())
    }
}
