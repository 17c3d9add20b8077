//! Prompt templates and retrieval-context formatting.
//!
//! Templates live as markdown files on disk so prompt wording can change
//! without a rebuild. Loading happens once at startup and fails fast when a
//! file is missing, never mid-request.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::PromptsConfig;
use crate::error::{PipelineError, Result};
use crate::models::{ScoredChunk, SourceKind};

/// Placeholder in the translation template for the user's input.
const TEXT_VAR: &str = "{text}";
/// Placeholder for the formatted retrieval context.
const CONTEXT_VAR: &str = "{reference_phrases}";

pub const EMPTY_CONTEXT: &str = "No specific Argentinian expressions found.";

pub struct PromptLibrary {
    system: String,
    translation: String,
}

impl PromptLibrary {
    pub fn load(config: &PromptsConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.dir);
        if !dir.is_dir() {
            return Err(PipelineError::InvalidArgument(format!(
                "prompt directory not found: {}",
                dir.display()
            )));
        }
        let system = read_prompt(&dir.join(&config.system_file))?;
        let translation = read_prompt(&dir.join(&config.translation_file))?;
        if !translation.contains(TEXT_VAR) || !translation.contains(CONTEXT_VAR) {
            warn!(
                "translation template is missing {} or {} placeholders",
                TEXT_VAR, CONTEXT_VAR
            );
        }
        info!(dir = %dir.display(), "prompt templates loaded");
        Ok(Self { system, translation })
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// Fill the translation template with the user's text and the formatted
    /// retrieval context.
    pub fn render_translation(&self, text: &str, context: &str) -> String {
        self.translation
            .replace(CONTEXT_VAR, context)
            .replace(TEXT_VAR, text)
    }
}

fn read_prompt(path: &std::path::Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|_| {
        PipelineError::InvalidArgument(format!("prompt file not found: {}", path.display()))
    })?;
    let content = content.trim().to_string();
    if content.is_empty() {
        warn!(path = %path.display(), "prompt file is empty");
    }
    Ok(content)
}

/// Format retrieved chunks for the model. Phrase-table rows already carry
/// their labeled fields verbatim; article excerpts get a provenance header
/// so the model can weigh a dictionary entry against blog prose.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    if chunks.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }

    let mut sections: Vec<String> = Vec::with_capacity(chunks.len());
    for scored in chunks {
        let meta = &scored.chunk.metadata;
        match meta.source {
            SourceKind::Phrase => sections.push(scored.chunk.content.clone()),
            SourceKind::Article => {
                let title = meta.title.as_deref().unwrap_or("Untitled");
                let mut section = format!("Excerpt from \"{}\"", title);
                if let Some(url) = &meta.url {
                    section.push_str(&format!(" ({})", url));
                }
                section.push_str(":\n");
                section.push_str(&scored.chunk.content);
                sections.push(section);
            }
        }
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, DocumentMetadata};
    use std::fs;

    fn library(system: &str, translation: &str) -> PromptLibrary {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("system.md"), system).unwrap();
        fs::write(dir.path().join("translation.md"), translation).unwrap();
        let config = PromptsConfig {
            dir: dir.path().to_path_buf(),
            ..PromptsConfig::default()
        };
        PromptLibrary::load(&config).unwrap()
    }

    fn scored(source: SourceKind, content: &str) -> ScoredChunk {
        let metadata = match source {
            SourceKind::Phrase => DocumentMetadata::phrase(3),
            SourceKind::Article => {
                DocumentMetadata::article("https://example.com/voseo", "Voseo Basics")
            }
        };
        ScoredChunk {
            chunk: Chunk {
                id: "x#0".into(),
                document_id: "x".into(),
                ordinal: 0,
                content: content.into(),
                start: 0,
                end: content.chars().count(),
                metadata,
                hash: String::new(),
            },
            score: 0.9,
        }
    }

    #[test]
    fn test_load_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("system.md"), "sys").unwrap();
        let config = PromptsConfig {
            dir: dir.path().to_path_buf(),
            ..PromptsConfig::default()
        };
        let err = PromptLibrary::load(&config).err().unwrap();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn test_load_fails_on_missing_dir() {
        let config = PromptsConfig {
            dir: PathBuf::from("/nonexistent/prompts"),
            ..PromptsConfig::default()
        };
        assert!(PromptLibrary::load(&config).is_err());
    }

    #[test]
    fn test_render_substitutes_both_placeholders() {
        let lib = library("sys", "Context:\n{reference_phrases}\n\nTranslate: {text}");
        let rendered = lib.render_translation("hello", "Original: hi\nArgentinian: che");
        assert!(rendered.contains("Translate: hello"));
        assert!(rendered.contains("Argentinian: che"));
        assert!(!rendered.contains("{text}"));
        assert!(!rendered.contains("{reference_phrases}"));
    }

    #[test]
    fn test_format_context_empty() {
        assert_eq!(format_context(&[]), EMPTY_CONTEXT);
    }

    #[test]
    fn test_format_context_mixes_sources() {
        let chunks = vec![
            scored(SourceKind::Phrase, "Original: cool\nArgentinian: copado"),
            scored(SourceKind::Article, "The voseo replaces tú with vos."),
        ];
        let context = format_context(&chunks);
        assert!(context.contains("Argentinian: copado"));
        assert!(context.contains("Excerpt from \"Voseo Basics\" (https://example.com/voseo):"));
        assert!(context.contains("replaces tú with vos"));
    }
}
