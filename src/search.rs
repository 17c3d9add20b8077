//! Retrieval debugging command: run a query against the persisted index and
//! print the balanced result set.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::embedding;
use crate::index::VectorIndex;
use crate::models::SourceKind;
use crate::retrieve::Retriever;

pub async fn run_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let k = k.unwrap_or(config.retrieval.top_k);
    if k == 0 {
        bail!("k must be at least 1");
    }

    let index = VectorIndex::load(&config.index.dir)?;
    let provider = embedding::create_provider(&config.embedding)?;
    let retriever = Retriever::new(
        provider,
        std::sync::Arc::new(index),
        config.retrieval.clone(),
    )?;

    let results = retriever.query(query, k).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, scored) in results.iter().enumerate() {
        let meta = &scored.chunk.metadata;
        let origin = match meta.source {
            SourceKind::Phrase => format!(
                "phrase row {}",
                meta.row_index.map(|i| i.to_string()).unwrap_or_default()
            ),
            SourceKind::Article => meta.title.clone().unwrap_or_else(|| "Untitled".into()),
        };
        println!(
            "{:>2}. [{:.4}] {:<7} {} ({})",
            rank + 1,
            scored.score,
            meta.source.as_str(),
            origin,
            scored.chunk.id
        );
        println!("    {}", snippet(&scored.chunk.content, 160));
    }

    Ok(())
}

fn snippet(content: &str, max_chars: usize) -> String {
    let flat = content.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let truncated: String = flat.chars().take(max_chars).collect();
    format!("{}...", truncated.trim_end())
}
