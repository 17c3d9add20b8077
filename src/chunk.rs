//! Overlapping-window text chunker with stable provenance.
//!
//! Article documents are split into windows of `chunk_size` chars with an
//! `overlap`-char overlap between consecutive chunks. Split points prefer a
//! paragraph break, newline, sentence end, or space found within
//! `boundary_tolerance` chars of the hard cut, in that order. Phrase
//! documents are atomic and always yield exactly one chunk.
//!
//! Splitting is a pure function: the same document and config produce an
//! identical chunk set every run. Chunk ids are `"{document_id}#{ordinal}"`
//! and chunks carry char offsets, so removing the overlap from each chunk
//! after the first reconstructs the document exactly.

use sha2::{Digest, Sha256};

use crate::config::ChunkingConfig;
use crate::models::{Chunk, Document, SourceKind};

/// Boundary separators tried in preference order. The separator stays with
/// the preceding chunk.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
    boundary_tolerance: usize,
}

impl Chunker {
    /// An overlap at or above the chunk size would make the window start
    /// move backward and never terminate, so it is clamped here. Config
    /// validation rejects such values before they reach this point.
    pub fn new(config: &ChunkingConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        Self {
            chunk_size,
            overlap: config.overlap.min(chunk_size - 1),
            boundary_tolerance: config.boundary_tolerance,
        }
    }

    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.content.chars().collect();
        let total = chars.len();

        // Phrase rows are atomic; short articles fit one window anyway.
        if document.metadata.source == SourceKind::Phrase || total <= self.chunk_size {
            return vec![make_chunk(document, 0, &chars, 0, total)];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut ordinal = 0usize;

        loop {
            let hard_end = (start + self.chunk_size).min(total);
            let end = if hard_end == total {
                total
            } else {
                self.snap_to_boundary(&chars, start, hard_end)
            };

            chunks.push(make_chunk(document, ordinal, &chars, start, end));
            ordinal += 1;

            if end == total {
                break;
            }
            start = end - self.overlap;
        }

        chunks
    }

    /// Find the latest preferred boundary within the tolerance window behind
    /// the hard cut. Falls back to the hard cut itself, and never lands a
    /// boundary inside the next chunk's overlap window.
    fn snap_to_boundary(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let window_start = hard_end.saturating_sub(self.boundary_tolerance);
        // A cut at or before start + overlap would make no forward progress.
        let min_end = (start + self.overlap + 1).max(window_start);
        if min_end >= hard_end {
            return hard_end;
        }

        let window: String = chars[min_end..hard_end].iter().collect();
        for sep in SEPARATORS {
            if let Some(byte_pos) = window.rfind(sep) {
                let rel = window[..byte_pos].chars().count() + sep.chars().count();
                return min_end + rel;
            }
        }
        hard_end
    }
}

fn make_chunk(document: &Document, ordinal: usize, chars: &[char], start: usize, end: usize) -> Chunk {
    let content: String = chars[start..end].iter().collect();

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: format!("{}#{}", document.id, ordinal),
        document_id: document.id.clone(),
        ordinal,
        content,
        start,
        end,
        metadata: document.metadata.clone(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMetadata;

    fn chunker(chunk_size: usize, overlap: usize, tolerance: usize) -> Chunker {
        Chunker {
            chunk_size,
            overlap,
            boundary_tolerance: tolerance,
        }
    }

    fn article(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            content: content.to_string(),
            metadata: DocumentMetadata::article("https://example.com/a", "A"),
        }
    }

    fn phrase(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            content: content.to_string(),
            metadata: DocumentMetadata::phrase(0),
        }
    }

    /// Rebuild the document from its chunks by dropping each chunk's overlap
    /// with its predecessor.
    fn reconstruct(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut prev_end = 0usize;
        for chunk in chunks {
            let skip = prev_end - chunk.start;
            out.extend(chunk.content.chars().skip(skip));
            prev_end = chunk.end;
        }
        out
    }

    #[test]
    fn test_phrase_never_split() {
        let doc = phrase("phrase:0", &"Original: hello\nArgentinian: hola. ".repeat(50));
        let chunks = chunker(100, 20, 30).split(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "phrase:0#0");
        assert_eq!(chunks[0].content, doc.content);
    }

    #[test]
    fn test_short_article_single_chunk() {
        let doc = article("article:abc", "Short article body.");
        let chunks = chunker(1000, 200, 200).split(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].ordinal, 0);
    }

    #[test]
    fn test_ordinals_contiguous_from_zero() {
        let body = "Sentence number one. ".repeat(60);
        let chunks = chunker(200, 40, 50).split(&article("article:abc", &body));
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert_eq!(chunk.id, format!("article:abc#{}", i));
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let body = "word ".repeat(200);
        let chunks = chunker(100, 25, 30).split(&article("article:abc", &body));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end - pair[1].start, 25);
        }
    }

    #[test]
    fn test_reconstruction_exact() {
        let mut body = String::new();
        for i in 0..40 {
            body.push_str(&format!(
                "Paragraph {} talks about lunfardo, mate, and the barrios of Buenos Aires.\n\n",
                i
            ));
        }
        let body = body.trim_end().to_string();
        let chunks = chunker(300, 60, 80).split(&article("article:abc", &body));
        assert!(chunks.len() > 2);
        assert_eq!(reconstruct(&chunks), body);
    }

    #[test]
    fn test_reconstruction_with_multibyte() {
        let body = "El Día de la Tradición celebra al gaucho y al ñandú en José Hernández. "
            .repeat(30);
        let body = body.trim_end().to_string();
        let chunks = chunker(150, 30, 40).split(&article("article:uni", &body));
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), body);
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let body = format!("{}\n\n{}", "a".repeat(80), "b".repeat(100));
        let chunks = chunker(100, 10, 40).split(&article("article:abc", &body));
        // Hard cut at 100 is mid-paragraph; the break at 82 is inside the
        // tolerance window and wins.
        assert_eq!(chunks[0].end, 82);
        assert!(chunks[0].content.ends_with("\n\n"));
    }

    #[test]
    fn test_hard_cut_when_no_boundary() {
        let body = "x".repeat(250);
        let chunks = chunker(100, 20, 30).split(&article("article:abc", &body));
        assert_eq!(chunks[0].end, 100);
        assert_eq!(chunks[1].start, 80);
    }

    #[test]
    fn test_constructor_clamps_overlap() {
        let config = ChunkingConfig {
            chunk_size: 100,
            overlap: 100,
            boundary_tolerance: 20,
        };
        let body = "palabra ".repeat(60);
        let body = body.trim_end().to_string();
        let chunks = Chunker::new(&config).split(&article("article:abc", &body));
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), body);
    }

    #[test]
    fn test_deterministic() {
        let body = "A sentence about voseo. ".repeat(80);
        let doc = article("article:abc", &body);
        let c = chunker(200, 40, 60);
        let a = c.split(&doc);
        let b = c.split(&doc);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.content, y.content);
            assert_eq!(x.hash, y.hash);
            assert_eq!((x.start, x.end), (y.start, y.end));
        }
    }
}
