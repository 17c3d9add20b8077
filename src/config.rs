use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sources: SourcesConfig,
    #[serde(default)]
    pub cleaning: CleaningConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    /// CSV phrase table: original phrase, Argentinian equivalent, optional
    /// explanation/region/formality columns.
    pub phrases_csv: PathBuf,
    /// JSONL article feed: one `{url, title, text}` record per line.
    pub articles_jsonl: PathBuf,
    /// Rendered phrase-row content is truncated here so optional columns
    /// cannot inflate a row into article territory.
    #[serde(default = "default_phrase_content_cap")]
    pub phrase_content_cap: usize,
}

fn default_phrase_content_cap() -> usize {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct CleaningConfig {
    /// Articles whose cleaned content is shorter than this are dropped.
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,
    /// Leading lines stripped from every article before pattern cleaning
    /// (repeated site chrome such as nav menus).
    #[serde(default)]
    pub strip_leading_lines: usize,
    /// Trailing lines stripped from every article before pattern cleaning.
    #[serde(default)]
    pub strip_trailing_lines: usize,
    /// Extra boilerplate regex patterns appended to the built-in block-list.
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            min_content_length: default_min_content_length(),
            strip_leading_lines: 0,
            strip_trailing_lines: 0,
            extra_patterns: Vec::new(),
        }
    }
}

fn default_min_content_length() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in chars.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in chars.
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
    /// How far back from the hard cut a boundary (paragraph, newline,
    /// sentence, space) may be and still be preferred.
    #[serde(default = "default_boundary_tolerance")]
    pub boundary_tolerance: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
            boundary_tolerance: default_boundary_tolerance(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_boundary_tolerance() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding generation files and the CURRENT pointer.
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    /// Concurrent embedding calls during a build.
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            embed_concurrency: default_embed_concurrency(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("data/index")
}
fn default_embed_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Default number of chunks handed to the generation step.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Nearest-neighbor candidates fetched per query, as a multiple of k.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Candidates scoring below this floor never count toward source balance.
    #[serde(default)]
    pub relevance_floor: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            candidate_multiplier: default_candidate_multiplier(),
            relevance_floor: 0.0,
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_candidate_multiplier() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `openai` or `mock`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `openai` or `mock`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_generation_model(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    /// Inputs shorter than this go straight to the precise classifier;
    /// statistical detectors are unreliable on short strings.
    #[serde(default = "default_short_text_threshold")]
    pub short_text_threshold: usize,
    /// Statistical detections below this confidence escalate to the
    /// precise classifier.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            short_text_threshold: default_short_text_threshold(),
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_short_text_threshold() -> usize {
    12
}
fn default_min_confidence() -> f64 {
    0.1
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptsConfig {
    #[serde(default = "default_prompts_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_system_prompt_file")]
    pub system_file: String,
    #[serde(default = "default_translation_prompt_file")]
    pub translation_file: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: default_prompts_dir(),
            system_file: default_system_prompt_file(),
            translation_file: default_translation_prompt_file(),
        }
    }
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("prompts")
}
fn default_system_prompt_file() -> String {
    "system.md".to_string()
}
fn default_translation_prompt_file() -> String {
    "translation.md".to_string()
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be smaller than chunking.chunk_size");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.candidate_multiplier == 0 {
        anyhow::bail!("retrieval.candidate_multiplier must be >= 1");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "openai" | "mock" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or mock.",
            other
        ),
    }
    match config.generation.provider.as_str() {
        "openai" | "mock" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be openai or mock.",
            other
        ),
    }

    if !(0.0..=1.0).contains(&config.detection.min_confidence) {
        anyhow::bail!("detection.min_confidence must be in [0.0, 1.0]");
    }
    if config.index.embed_concurrency == 0 {
        anyhow::bail!("index.embed_concurrency must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_toml() -> String {
        r#"
[sources]
phrases_csv = "data/phrases.csv"
articles_jsonl = "data/articles.jsonl"
"#
        .to_string()
    }

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse(&base_toml()).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.cleaning.min_content_length, 100);
        assert_eq!(config.retrieval.candidate_multiplier, 3);
        assert_eq!(config.detection.short_text_threshold, 12);
    }

    #[test]
    fn test_overlap_must_be_below_chunk_size() {
        let toml_str = format!(
            "{}\n[chunking]\nchunk_size = 100\noverlap = 100\n",
            base_toml()
        );
        assert!(parse(&toml_str).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let toml_str = format!("{}\n[embedding]\nprovider = \"cohere\"\n", base_toml());
        assert!(parse(&toml_str).is_err());
    }

    #[test]
    fn test_confidence_range_enforced() {
        let toml_str = format!("{}\n[detection]\nmin_confidence = 1.5\n", base_toml());
        assert!(parse(&toml_str).is_err());
    }
}
