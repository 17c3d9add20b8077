//! Source loaders: raw feed records to normalized [`Document`]s.
//!
//! Two variants share the [`SourceLoader`] contract. [`PhraseLoader`] turns
//! one phrase-table row into one document; [`ArticleLoader`] runs scraped
//! records through the [`TextNormalizer`] and drops boilerplate-only pages.
//! A loader error marks one skipped record; the feed readers log it and
//! keep going, so a single bad row never aborts a batch.

use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::clean::TextNormalizer;
use crate::config::{CleaningConfig, SourcesConfig};
use crate::error::{PipelineError, Result};
use crate::models::{Document, DocumentMetadata, SourceKind};

/// One row of the curated phrase table.
#[derive(Debug, Clone, Deserialize)]
pub struct PhraseRecord {
    #[serde(rename = "Original Phrase/Word")]
    pub original: String,
    #[serde(rename = "Argentinian Equivalent")]
    pub equivalent: String,
    #[serde(rename = "Explanation (Context/Usage)", default)]
    pub explanation: Option<String>,
    #[serde(rename = "Region Specificity", default)]
    pub region: Option<String>,
    #[serde(rename = "Level of Formality", default)]
    pub formality: Option<String>,
    #[serde(rename = "Register", default)]
    pub register: Option<String>,
    #[serde(rename = "Connotation", default)]
    pub connotation: Option<String>,
    #[serde(rename = "Example Sentence (Spanish)", default)]
    pub example_es: Option<String>,
    #[serde(rename = "Example Sentence (English)", default)]
    pub example_en: Option<String>,
}

/// One record of the scraped-article feed.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleRecord {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
}

/// Converts one raw feed record into a normalized document, or rejects it
/// with the reason it was skipped.
pub trait SourceLoader {
    type Record;

    fn kind(&self) -> SourceKind;
    fn load(&self, record: Self::Record) -> Result<Document>;
}

// ============ Phrase rows ============

pub struct PhraseLoader {
    content_cap: usize,
}

impl PhraseLoader {
    pub fn new(sources: &SourcesConfig) -> Self {
        Self {
            content_cap: sources.phrase_content_cap,
        }
    }

    fn render_content(&self, record: &PhraseRecord) -> String {
        let mut content = format!(
            "Original: {}\nArgentinian: {}",
            record.original.trim(),
            record.equivalent.trim()
        );

        let optional = [
            ("Context", &record.explanation),
            ("Region", &record.region),
            ("Formality", &record.formality),
            ("Register", &record.register),
            ("Connotation", &record.connotation),
            ("Example (Spanish)", &record.example_es),
            ("Example (English)", &record.example_en),
        ];
        for (label, value) in optional {
            let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            let line = format!("\n{}: {}", label, value);
            if content.chars().count() + line.chars().count() > self.content_cap {
                break;
            }
            content.push_str(&line);
        }
        content
    }
}

impl SourceLoader for PhraseLoader {
    type Record = (usize, PhraseRecord);

    fn kind(&self) -> SourceKind {
        SourceKind::Phrase
    }

    fn load(&self, (row_index, record): Self::Record) -> Result<Document> {
        if record.original.trim().is_empty() || record.equivalent.trim().is_empty() {
            return Err(PipelineError::SourceRecord {
                kind: SourceKind::Phrase,
                location: format!("row {}", row_index),
                reason: "original and equivalent are required".to_string(),
            });
        }

        let mut metadata = DocumentMetadata::phrase(row_index);
        metadata.region = record.region.clone().filter(|r| !r.trim().is_empty());
        metadata.formality = record.formality.clone().filter(|f| !f.trim().is_empty());

        Ok(Document {
            id: format!("phrase:{}", row_index),
            content: self.render_content(&record),
            metadata,
        })
    }
}

// ============ Scraped articles ============

pub struct ArticleLoader<'a> {
    normalizer: &'a TextNormalizer,
    min_content_length: usize,
}

impl<'a> ArticleLoader<'a> {
    pub fn new(normalizer: &'a TextNormalizer, cleaning: &CleaningConfig) -> Self {
        Self {
            normalizer,
            min_content_length: cleaning.min_content_length,
        }
    }
}

impl SourceLoader for ArticleLoader<'_> {
    type Record = ArticleRecord;

    fn kind(&self) -> SourceKind {
        SourceKind::Article
    }

    fn load(&self, record: ArticleRecord) -> Result<Document> {
        let stripped = self.normalizer.strip_chrome_lines(&record.text);
        let cleaned = self.normalizer.clean(&stripped);

        if cleaned.chars().count() < self.min_content_length {
            return Err(PipelineError::SourceRecord {
                kind: SourceKind::Article,
                location: record.url,
                reason: format!(
                    "boilerplate-only after cleaning ({} chars)",
                    cleaned.chars().count()
                ),
            });
        }

        let mut hasher = Sha256::new();
        hasher.update(record.url.as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        Ok(Document {
            id: format!("article:{}", &digest[..12]),
            content: cleaned,
            metadata: DocumentMetadata::article(
                record.url,
                record.title.unwrap_or_else(|| "Untitled".to_string()),
            ),
        })
    }
}

// ============ Feed readers ============

/// Read the phrase table CSV, loading each row through [`PhraseLoader`].
/// Malformed rows are skipped, not fatal; a missing file is fatal.
pub fn load_phrase_table(path: &Path, loader: &PhraseLoader) -> Result<Vec<Document>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        PipelineError::InvalidArgument(format!("cannot open phrase table {}: {}", path.display(), e))
    })?;

    let mut documents = Vec::new();
    let mut skipped = 0usize;

    for (row_index, result) in reader.deserialize::<PhraseRecord>().enumerate() {
        match result {
            Ok(record) => match loader.load((row_index, record)) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!(error = %e, "skipping phrase row");
                    skipped += 1;
                }
            },
            Err(e) => {
                warn!(row = row_index, error = %e, "skipping malformed phrase row");
                skipped += 1;
            }
        }
    }

    info!(
        loaded = documents.len(),
        skipped,
        path = %path.display(),
        "phrase table loaded"
    );
    Ok(documents)
}

/// Read the article JSONL feed, one record per line, loading each through
/// [`ArticleLoader`]. Parse failures and boilerplate-only pages are skipped.
pub fn load_article_feed(path: &Path, loader: &ArticleLoader<'_>) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::InvalidArgument(format!(
            "cannot open article feed {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut documents = Vec::new();
    let mut skipped = 0usize;

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ArticleRecord>(line) {
            Ok(record) => match loader.load(record) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!(error = %e, "skipping article record");
                    skipped += 1;
                }
            },
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping malformed article record");
                skipped += 1;
            }
        }
    }

    info!(
        loaded = documents.len(),
        skipped,
        path = %path.display(),
        "article feed loaded"
    );
    Ok(documents)
}
