//! Query-time retrieval with source-balanced re-ranking.
//!
//! A [`Retriever`] is bound to one index snapshot and the embedding provider
//! that built it. Construction fails fast on a model mismatch so a query is
//! never compared against vectors from a different embedding space.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{PipelineError, Result};
use crate::index::VectorIndex;
use crate::models::{ScoredChunk, SourceKind};

pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    config: RetrievalConfig,
}

impl Retriever {
    /// Bind a provider to an index snapshot. The provider must be the one
    /// the index was built with; mixing embedding spaces is a configuration
    /// error, not something to paper over at query time.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        if index.model != provider.model_name() {
            return Err(PipelineError::IndexConsistency {
                index_model: index.model.clone(),
                query_model: provider.model_name().to_string(),
            });
        }
        Ok(Self {
            provider,
            index,
            config,
        })
    }

    /// Retrieve at most `k` chunks for a query. Fewer are returned only when
    /// the index itself holds fewer qualifying entries.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(PipelineError::InvalidArgument(
                "retrieval k must be at least 1".into(),
            ));
        }

        let vector = embed_query(self.provider.as_ref(), text).await?;

        let candidate_count = k.saturating_mul(self.config.candidate_multiplier.max(1));
        let mut candidates = self.index.search(&vector, candidate_count);
        candidates.retain(|c| c.score >= self.config.relevance_floor);

        let results = balance_sources(candidates, k);
        debug!(k, returned = results.len(), "retrieval complete");
        if results.is_empty() {
            warn!("no chunks above relevance floor for query");
        }
        Ok(results)
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

/// Source-balanced re-ranking: take the top `ceil(k/2)` phrase-table hits
/// and the top `floor(k/2)` article hits, then backfill from whichever
/// source has surplus when the other runs short. Keeps a single dominant
/// source from crowding out the other while preserving score order within
/// each source.
fn balance_sources(candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    let (phrases, articles): (Vec<ScoredChunk>, Vec<ScoredChunk>) = candidates
        .into_iter()
        .partition(|c| c.chunk.metadata.source == SourceKind::Phrase);

    let phrase_quota = k.div_ceil(2);
    let article_quota = k / 2;

    let mut picked: Vec<ScoredChunk> = Vec::with_capacity(k);
    picked.extend(phrases.iter().take(phrase_quota).cloned());
    picked.extend(articles.iter().take(article_quota).cloned());

    if picked.len() < k {
        let mut surplus: Vec<ScoredChunk> = phrases
            .into_iter()
            .skip(phrase_quota)
            .chain(articles.into_iter().skip(article_quota))
            .collect();
        surplus.sort_by(rank_order);
        picked.extend(surplus.into_iter().take(k - picked.len()));
    }

    picked.sort_by(rank_order);
    picked.truncate(k);
    picked
}

/// Score descending, phrase-table hits before article hits on ties, chunk
/// id as the final deterministic tie-break.
fn rank_order(a: &ScoredChunk, b: &ScoredChunk) -> std::cmp::Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then(
            a.chunk
                .metadata
                .source
                .priority()
                .cmp(&b.chunk.metadata.source.priority()),
        )
        .then(a.chunk.id.cmp(&b.chunk.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, DocumentMetadata};

    fn scored(id: &str, source: SourceKind, score: f32) -> ScoredChunk {
        let metadata = match source {
            SourceKind::Phrase => DocumentMetadata::phrase(0),
            SourceKind::Article => DocumentMetadata::article("http://x", "t"),
        };
        ScoredChunk {
            chunk: Chunk {
                id: id.to_string(),
                document_id: id.to_string(),
                ordinal: 0,
                content: String::new(),
                start: 0,
                end: 0,
                metadata,
                hash: String::new(),
            },
            score,
        }
    }

    #[test]
    fn test_balance_takes_from_both_sources() {
        let candidates = vec![
            scored("a#0", SourceKind::Article, 0.9),
            scored("a#1", SourceKind::Article, 0.8),
            scored("a#2", SourceKind::Article, 0.7),
            scored("p#0", SourceKind::Phrase, 0.6),
            scored("p#1", SourceKind::Phrase, 0.5),
        ];
        let picked = balance_sources(candidates, 4);
        assert_eq!(picked.len(), 4);
        let phrase_count = picked
            .iter()
            .filter(|c| c.chunk.metadata.source == SourceKind::Phrase)
            .count();
        assert_eq!(phrase_count, 2, "phrase quota is ceil(4/2)");
    }

    #[test]
    fn test_balance_backfills_when_one_source_short() {
        let candidates = vec![
            scored("a#0", SourceKind::Article, 0.9),
            scored("a#1", SourceKind::Article, 0.8),
            scored("a#2", SourceKind::Article, 0.7),
            scored("a#3", SourceKind::Article, 0.6),
        ];
        let picked = balance_sources(candidates, 4);
        assert_eq!(picked.len(), 4, "article surplus fills missing phrase slots");
    }

    #[test]
    fn test_balance_fewer_candidates_than_k() {
        let candidates = vec![scored("p#0", SourceKind::Phrase, 0.9)];
        assert_eq!(balance_sources(candidates, 4).len(), 1);
        assert!(balance_sources(vec![], 4).is_empty());
    }

    #[test]
    fn test_balance_output_sorted_by_score() {
        let candidates = vec![
            scored("p#0", SourceKind::Phrase, 0.5),
            scored("a#0", SourceKind::Article, 0.9),
            scored("p#1", SourceKind::Phrase, 0.7),
        ];
        let picked = balance_sources(candidates, 3);
        let scores: Vec<f32> = picked.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.5]);
    }

    #[test]
    fn test_tied_scores_rank_phrase_before_article() {
        let candidates = vec![
            scored("article:aaa#0", SourceKind::Article, 0.8),
            scored("phrase:0#0", SourceKind::Phrase, 0.8),
        ];
        let picked = balance_sources(candidates, 2);
        let ids: Vec<&str> = picked.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["phrase:0#0", "article:aaa#0"]);

        // Same rule applies to ties that span the two quota buckets.
        let candidates = vec![
            scored("phrase:0#0", SourceKind::Phrase, 0.9),
            scored("phrase:1#0", SourceKind::Phrase, 0.6),
            scored("article:aaa#0", SourceKind::Article, 0.6),
            scored("article:bbb#0", SourceKind::Article, 0.6),
        ];
        let picked = balance_sources(candidates, 3);
        let ids: Vec<&str> = picked.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["phrase:0#0", "phrase:1#0", "article:aaa#0"]);
    }

    #[tokio::test]
    async fn test_query_rejects_k_zero() {
        use crate::embedding::mock::MockEmbeddings;
        use std::sync::Arc;

        let provider = Arc::new(MockEmbeddings::new(64));
        let index = VectorIndex::empty("g1".into(), "mock".into(), 64);
        let retriever =
            Retriever::new(provider, Arc::new(index), RetrievalConfig::default()).unwrap();
        let err = retriever.query("hola", 0).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn test_model_mismatch_fails_at_construction() {
        use crate::embedding::mock::MockEmbeddings;
        use std::sync::Arc;

        let provider = Arc::new(MockEmbeddings::new(64));
        let index = VectorIndex::empty("g1".into(), "text-embedding-3-small".into(), 1536);
        let err = Retriever::new(provider, Arc::new(index), RetrievalConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::IndexConsistency { .. }));
    }
}
