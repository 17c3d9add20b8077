//! Core data models used throughout Lunfardo.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Originating data source of a document or chunk.
///
/// Carried end-to-end in metadata so downstream components can apply
/// source-specific policy (chunking, context framing, ranking priority)
/// without re-inspecting content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A row from the curated phrase table. Short, atomic, never split.
    Phrase,
    /// A scraped long-form article. Cleaned and split into windows.
    Article,
}

impl SourceKind {
    /// Ranking priority for deterministic tie-breaks: phrases win ties.
    pub fn priority(self) -> u8 {
        match self {
            SourceKind::Phrase => 0,
            SourceKind::Article => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Phrase => "phrase",
            SourceKind::Article => "article",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance metadata attached to every document and inherited by its chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formality: Option<String>,
}

impl DocumentMetadata {
    pub fn phrase(row_index: usize) -> Self {
        Self {
            source: SourceKind::Phrase,
            url: None,
            title: None,
            row_index: Some(row_index),
            region: None,
            formality: None,
        }
    }

    pub fn article(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source: SourceKind::Article,
            url: Some(url.into()),
            title: Some(title.into()),
            row_index: None,
            region: None,
            formality: None,
        }
    }
}

/// Normalized document produced by a source loader.
///
/// Immutable once created; content is never empty (loaders drop records
/// that clean down to nothing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// A bounded slice of a document's content, independently embeddable.
///
/// `id` is deterministic: `"{document_id}#{ordinal}"`, so the same document
/// and chunker config always yield the same chunk set. `start`/`end` are
/// char offsets into the normalized document content; consecutive article
/// chunks overlap by the configured overlap window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub ordinal: usize,
    pub content: String,
    /// Char offset of this chunk's first character in the document.
    pub start: usize,
    /// Char offset one past this chunk's last character.
    pub end: usize,
    pub metadata: DocumentMetadata,
    /// SHA-256 of the chunk text, for staleness detection across runs.
    pub hash: String,
}

/// A retrieved chunk with its relevance score (cosine similarity).
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Classification outcome of the language router.
///
/// `Unsupported` is a normal terminal classification, not an error: the
/// orchestrator surfaces the detected code to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Language {
    En,
    Es,
    Unsupported(String),
}

impl Language {
    /// Map an ISO 639-1 code onto a supported language.
    pub fn from_code(code: &str) -> Self {
        match code.to_ascii_lowercase().as_str() {
            "en" => Language::En,
            "es" => Language::Es,
            other => Language::Unsupported(other.to_string()),
        }
    }
}

/// Result of one orchestrated translation request.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationOutcome {
    Translation(String),
    Refusal {
        message: String,
        detected_language: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_priority_beats_article() {
        assert!(SourceKind::Phrase.priority() < SourceKind::Article.priority());
    }

    #[test]
    fn test_language_from_code() {
        assert_eq!(Language::from_code("en"), Language::En);
        assert_eq!(Language::from_code("ES"), Language::Es);
        assert_eq!(
            Language::from_code("fr"),
            Language::Unsupported("fr".to_string())
        );
    }

    #[test]
    fn test_source_kind_serde_roundtrip() {
        let json = serde_json::to_string(&SourceKind::Phrase).unwrap();
        assert_eq!(json, "\"phrase\"");
        let back: SourceKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SourceKind::Phrase);
    }
}
