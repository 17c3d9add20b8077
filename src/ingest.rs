//! Ingestion pipeline orchestration.
//!
//! Coordinates the full rebuild flow: source loading → normalization →
//! chunking → embedding → persisted index generation. A rebuild always
//! produces a fresh generation and swaps the pointer only after the
//! generation file is fully written.

use anyhow::{bail, Result};

use crate::chunk::Chunker;
use crate::clean::TextNormalizer;
use crate::config::Config;
use crate::embedding;
use crate::index::{next_generation, IndexBuilder};
use crate::loader::{self, ArticleLoader, PhraseLoader};
use crate::models::Document;

pub async fn run_ingest(config: &Config, dry_run: bool, limit: Option<usize>) -> Result<()> {
    let normalizer = TextNormalizer::new(&config.cleaning);
    let phrase_loader = PhraseLoader::new(&config.sources);
    let article_loader = ArticleLoader::new(&normalizer, &config.cleaning);

    // Missing feeds are skipped so a partial corpus still indexes; only an
    // entirely absent corpus is an error.
    let mut documents: Vec<Document> = Vec::new();
    let mut phrase_docs = 0usize;
    let mut article_docs = 0usize;

    if config.sources.phrases_csv.exists() {
        let docs = loader::load_phrase_table(&config.sources.phrases_csv, &phrase_loader)?;
        phrase_docs = docs.len();
        documents.extend(docs);
    } else {
        eprintln!(
            "warning: phrase table not found: {}",
            config.sources.phrases_csv.display()
        );
    }

    if config.sources.articles_jsonl.exists() {
        let docs = loader::load_article_feed(&config.sources.articles_jsonl, &article_loader)?;
        article_docs = docs.len();
        documents.extend(docs);
    } else {
        eprintln!(
            "warning: article feed not found: {}",
            config.sources.articles_jsonl.display()
        );
    }

    if documents.is_empty() {
        bail!("no documents loaded from any source");
    }

    if let Some(lim) = limit {
        documents.truncate(lim);
    }

    let chunker = Chunker::new(&config.chunking);
    let chunks: Vec<_> = documents.iter().flat_map(|doc| chunker.split(doc)).collect();

    if dry_run {
        println!("ingest (dry-run)");
        println!("  phrase rows:   {}", phrase_docs);
        println!("  articles:      {}", article_docs);
        println!("  documents:     {}", documents.len());
        println!("  chunks:        {}", chunks.len());
        return Ok(());
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let builder = IndexBuilder::new(provider, config.index.embed_concurrency)
        .with_batch_size(config.embedding.batch_size);

    let generation = next_generation();
    let chunk_count = chunks.len();
    let index = builder.build(chunks, generation).await?;
    index.save(&config.index.dir)?;

    println!("ingest complete");
    println!("  phrase rows:   {}", phrase_docs);
    println!("  articles:      {}", article_docs);
    println!("  chunks:        {}", chunk_count);
    println!("  indexed:       {}", index.len());
    println!("  generation:    {}", index.generation);
    println!("  index dir:     {}", config.index.dir.display());

    Ok(())
}
