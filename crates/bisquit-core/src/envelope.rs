//! Envelope: a payload plus its provenance trail
//!
//! Every envelope carries:
//! - `content`: any JSON value
//! - `provenance`: ordered `actor:action` labels, one per processing stage
//! - `metadata`: open key/value enrichment (timestamps, confidence, ...)
//! - `token_reference`: id of the token that authorized the last mutation
//!
//! Provenance is append-only. The only operation that combines trails is
//! [`Envelope::merge`], which concatenates them and records the merge itself.

use crate::error::{BisquitError, Result};
use crate::token::Token;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Trace label appended by [`Envelope::merge`]
pub const MERGE_LABEL: &str = "operation:merge";

/// A unit of data moving through a processing pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    id: String,
    content: Value,
    provenance: Vec<String>,
    metadata: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_reference: Option<String>,
}

/// Unvalidated wire shape; converted through [`Envelope::try_from`]
#[derive(Deserialize)]
struct RawEnvelope {
    id: Option<String>,
    #[serde(default)]
    content: Value,
    provenance: Vec<String>,
    #[serde(default)]
    metadata: HashMap<String, Value>,
    #[serde(default)]
    token_reference: Option<String>,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = BisquitError;

    fn try_from(raw: RawEnvelope) -> Result<Self> {
        let mut builder = EnvelopeBuilder::new()
            .content(raw.content)
            .provenance(raw.provenance);
        if let Some(id) = raw.id {
            builder = builder.id(id);
        }
        builder.metadata = raw.metadata;
        builder.token_reference = raw.token_reference;
        builder.build()
    }
}

/// Check a trace label
///
/// Labels are a naming convention, not a security boundary: a label must be
/// non-empty and contain at least one `:`.
pub fn validate_label(label: &str) -> Result<()> {
    if label.trim().is_empty() || !label.contains(':') {
        return Err(BisquitError::InvalidTraceLabel(label.to_string()));
    }
    Ok(())
}

impl Envelope {
    /// Create an envelope with a fresh id from content and a provenance seed
    pub fn new<I, S>(content: Value, provenance_seed: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EnvelopeBuilder::new()
            .content(content)
            .provenance(provenance_seed)
            .build()
    }

    /// Create a builder for constructing envelopes
    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::new()
    }

    /// Get the envelope identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the payload
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Provenance labels in processing order
    pub fn provenance(&self) -> &[String] {
        &self.provenance
    }

    /// Get all metadata entries
    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    /// Get a single metadata value
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Get the id of the token that authorized the last mutation
    pub fn token_reference(&self) -> Option<&str> {
        self.token_reference.as_deref()
    }

    /// Label of the originating stage
    pub fn origin(&self) -> &str {
        // Non-empty by construction.
        &self.provenance[0]
    }

    /// Append a trace label, returning the updated envelope
    pub fn trace(mut self, label: impl Into<String>) -> Result<Self> {
        self.push_trace(label)?;
        Ok(self)
    }

    /// Append a trace label in place
    ///
    /// Concurrent callers sharing one envelope must synchronize externally.
    pub fn push_trace(&mut self, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        validate_label(&label)?;
        debug!(envelope_id = %self.id, label = %label, "Appending trace");
        self.provenance.push(label);
        Ok(())
    }

    /// Attach a token reference
    ///
    /// The reference is not checked here; consumers verify it at access time.
    pub fn sign(mut self, token_reference: impl Into<String>) -> Self {
        self.token_reference = Some(token_reference.into());
        self
    }

    /// Attach a reference to the given token
    pub fn sign_with(self, token: &Token) -> Self {
        self.sign(token.token_id())
    }

    /// Add or overwrite a metadata key
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Replace the content as one transformation stage
    ///
    /// Exactly one label is appended. Provenance and metadata carry over.
    pub fn map_content<F>(mut self, label: impl Into<String>, f: F) -> Result<Self>
    where
        F: FnOnce(Value) -> Value,
    {
        let label = label.into();
        validate_label(&label)?;
        self.content = f(std::mem::take(&mut self.content));
        self.provenance.push(label);
        Ok(self)
    }

    /// Merge two parallel enrichments of the same unit with the default content merge
    ///
    /// See [`Envelope::merge_with`] and [`merge_content`].
    pub fn merge(primary: Envelope, secondary: Envelope) -> Envelope {
        Self::merge_with(primary, secondary, merge_content)
    }

    /// Merge two parallel enrichments of the same unit
    ///
    /// - content: `merge(primary.content, secondary.content)`
    /// - provenance: primary's trail, then secondary's, then `operation:merge`
    /// - metadata: shallow union, secondary wins on conflicting keys
    /// - id: primary's
    /// - token reference: secondary's if set, otherwise primary's
    ///
    /// Merging is one-way. After a metadata conflict the result no longer
    /// records which input owned the key.
    pub fn merge_with<F>(primary: Envelope, secondary: Envelope, merge: F) -> Envelope
    where
        F: FnOnce(Value, Value) -> Value,
    {
        let Envelope {
            id,
            content: primary_content,
            mut provenance,
            mut metadata,
            token_reference: primary_reference,
        } = primary;

        debug!(
            primary = %id,
            secondary = %secondary.id,
            "Merging envelopes"
        );

        provenance.extend(secondary.provenance);
        provenance.push(MERGE_LABEL.to_string());
        metadata.extend(secondary.metadata);

        Envelope {
            id,
            content: merge(primary_content, secondary.content),
            provenance,
            metadata,
            token_reference: secondary.token_reference.or(primary_reference),
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(BisquitError::from)
    }

    /// Deserialize from JSON bytes, revalidating the provenance trail
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(BisquitError::from)
    }
}

/// Default content merge: shallow object union, secondary wins
///
/// When either side is not an object the secondary replaces the primary,
/// unless the secondary is `null`.
pub fn merge_content(primary: Value, secondary: Value) -> Value {
    match (primary, secondary) {
        (Value::Object(mut left), Value::Object(right)) => {
            left.extend(right);
            Value::Object(left)
        }
        (primary, Value::Null) => primary,
        (_, secondary) => secondary,
    }
}

/// Builder for constructing envelopes
///
/// # Example
///
/// ```
/// use bisquit_core::Envelope;
/// use serde_json::json;
///
/// let envelope = Envelope::builder()
///     .content(json!({ "text": "hello" }))
///     .trace("connector:web")
///     .metadata("fetched_at", json!("2024-05-01T00:00:00Z"))
///     .build()
///     .unwrap();
///
/// assert_eq!(envelope.provenance(), ["connector:web"]);
/// ```
#[derive(Debug, Default)]
pub struct EnvelopeBuilder {
    id: Option<String>,
    content: Value,
    provenance: Vec<String>,
    metadata: HashMap<String, Value>,
    token_reference: Option<String>,
}

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing id instead of generating one
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    /// Set the provenance seed
    pub fn provenance<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provenance = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Add one seed label
    pub fn trace(mut self, label: impl Into<String>) -> Self {
        self.provenance.push(label.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn token_reference(mut self, token_reference: impl Into<String>) -> Self {
        self.token_reference = Some(token_reference.into());
        self
    }

    /// Build the envelope
    ///
    /// Fails if the provenance seed is empty or holds a malformed label.
    pub fn build(self) -> Result<Envelope> {
        if self.provenance.is_empty() {
            return Err(BisquitError::EmptyProvenance);
        }
        for label in &self.provenance {
            validate_label(label)?;
        }

        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };

        Ok(Envelope {
            id,
            content: self.content,
            provenance: self.provenance,
            metadata: self.metadata,
            token_reference: self.token_reference,
        })
    }
}
