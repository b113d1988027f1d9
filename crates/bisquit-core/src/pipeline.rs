//! Stage pipelines over envelopes
//!
//! A pipeline is a left fold: each [`Stage`] inspects the current envelope
//! and returns a [`StageUpdate`], which [`apply_update`] merges in before the
//! next stage runs. Stages never touch the envelope directly, so every stage
//! leaves exactly one provenance label behind.
//!
//! Stages are registered by key in a [`StageRegistry`] at start-up and
//! assembled into pipelines from key lists.

use crate::envelope::{validate_label, Envelope};
use crate::error::{BisquitError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Partial update produced by one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageUpdate {
    /// Replacement content; `None` keeps the current content
    pub content: Option<Value>,
    /// Metadata keys to add or overwrite
    pub metadata: HashMap<String, Value>,
}

impl StageUpdate {
    /// An update that only records the trace
    pub fn none() -> Self {
        Self::default()
    }

    pub fn content(content: Value) -> Self {
        Self {
            content: Some(content),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// One processing step
pub trait Stage: Send + Sync {
    /// Provenance label recorded for this stage (`actor:action`)
    fn label(&self) -> &str;

    fn apply(&self, envelope: &Envelope) -> Result<StageUpdate>;
}

/// Merge a stage's update into an envelope
///
/// Content is replaced only if the update carries some. Metadata keys are
/// overwritten one by one. `label` is appended to the provenance.
pub fn apply_update(envelope: Envelope, label: &str, update: StageUpdate) -> Result<Envelope> {
    let StageUpdate { content, metadata } = update;

    let envelope = match content {
        Some(content) => envelope.map_content(label, |_| content)?,
        None => envelope.trace(label)?,
    };

    Ok(metadata
        .into_iter()
        .fold(envelope, |env, (key, value)| env.with_metadata(key, value)))
}

/// Ordered list of stages
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage (builder pattern)
    pub fn with_stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn push(&mut self, stage: Arc<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage labels in execution order
    pub fn labels(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.label()).collect()
    }

    /// Run every stage in order
    ///
    /// The first failing stage aborts the run and its error is returned.
    pub fn run(&self, envelope: Envelope) -> Result<Envelope> {
        self.stages.iter().try_fold(envelope, |envelope, stage| {
            let label = stage.label();
            validate_label(label)?;

            debug!(envelope_id = %envelope.id(), stage = %label, "Running stage");
            let update = stage.apply(&envelope).map_err(|e| {
                warn!(envelope_id = %envelope.id(), stage = %label, error = %e, "Stage failed");
                e
            })?;

            apply_update(envelope, label, update)
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.labels())
            .finish()
    }
}

/// Stages addressable by key
#[derive(Default)]
pub struct StageRegistry {
    stages: HashMap<String, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage under `key`, replacing any previous one
    pub fn register<S: Stage + 'static>(&mut self, key: impl Into<String>, stage: S) {
        let key = key.into();
        info!(key = %key, label = stage.label(), "Registered stage");
        self.stages.insert(key, Arc::new(stage));
    }

    /// Register a stage (builder pattern)
    pub fn with<S: Stage + 'static>(mut self, key: impl Into<String>, stage: S) -> Self {
        self.register(key, stage);
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Stage>> {
        self.stages.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stages.contains_key(key)
    }

    /// Registered keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.stages.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Assemble a pipeline from stage keys
    pub fn pipeline<S: AsRef<str>>(&self, keys: &[S]) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new();
        for key in keys {
            let key = key.as_ref();
            let stage = self
                .get(key)
                .ok_or_else(|| BisquitError::UnknownStage(key.to_string()))?;
            pipeline.push(stage);
        }
        Ok(pipeline)
    }
}
