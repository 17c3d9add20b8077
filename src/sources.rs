//! Source feed health listing.

use anyhow::Result;

use crate::config::Config;
use crate::index::VectorIndex;

pub fn list_sources(config: &Config) -> Result<()> {
    let phrases = &config.sources.phrases_csv;
    let phrase_status = if phrases.is_file() {
        ("OK", true)
    } else {
        ("MISSING", false)
    };

    let articles = &config.sources.articles_jsonl;
    let article_status = if articles.is_file() {
        ("OK", true)
    } else {
        ("MISSING", false)
    };

    println!("{:<10} {:<10} {:<8} PATH", "SOURCE", "STATUS", "HEALTHY");
    println!(
        "{:<10} {:<10} {:<8} {}",
        "phrases",
        phrase_status.0,
        phrase_status.1,
        phrases.display()
    );
    println!(
        "{:<10} {:<10} {:<8} {}",
        "articles",
        article_status.0,
        article_status.1,
        articles.display()
    );

    match VectorIndex::load(&config.index.dir) {
        Ok(index) => println!(
            "\nindex: generation {} with {} entries ({} model, {} dims)",
            index.generation,
            index.len(),
            index.model,
            index.dims
        ),
        Err(_) => println!("\nindex: none (run `lunfardo ingest`)"),
    }

    Ok(())
}
