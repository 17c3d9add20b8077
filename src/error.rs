//! Error taxonomy for the ingestion and retrieval pipeline.
//!
//! Per-record errors (`SourceRecord`) are contained at the ingestion stage;
//! per-request errors are contained at the orchestrator stage. No single bad
//! input record or bad query can corrupt the shared index or take down other
//! in-flight requests.

use crate::models::SourceKind;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad caller input, rejected synchronously and never partially processed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A single malformed or boilerplate-only source record. The record is
    /// skipped and logged; ingestion of the batch continues.
    #[error("bad {kind} record at {location}: {reason}")]
    SourceRecord {
        kind: SourceKind,
        location: String,
        reason: String,
    },

    /// An embedding, generation, or detection call failed after the bounded
    /// retry policy was exhausted.
    #[error("provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    /// Embedding-space mismatch between index build time and query time.
    /// Fatal at configuration time, never silently ignored.
    #[error("index built with '{index_model}' but query provider is '{query_model}'")]
    IndexConsistency {
        index_model: String,
        query_model: String,
    },

    /// The generation step failed for this request. Terminal for the request,
    /// reported to the caller as a failed translation attempt.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn provider(provider: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
