//! # Lunfardo
//!
//! A retrieval-augmented translation assistant for Argentinian Spanish.
//!
//! Lunfardo ingests two knowledge sources — a curated phrase table and a
//! feed of scraped articles about Argentinian slang — into a persisted
//! vector index, then answers translation requests by routing on input
//! language, retrieving the most relevant phrases and excerpts, and
//! prompting a chat model with that context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │   Sources    │──▶│   Pipeline    │──▶│  Vector index  │
//! │ CSV + JSONL  │   │ Clean+Chunk  │   │ generations    │
//! └──────────────┘   │   +Embed     │   └───────┬───────┘
//!                    └──────────────┘           │
//!                                               ▼
//!                    ┌──────────────┐   ┌───────────────┐
//!                    │   Language   │──▶│   Retrieval    │
//!                    │    router    │   │ + generation   │
//!                    └──────────────┘   └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lunfardo ingest                        # build the vector index
//! lunfardo search "how are you"          # inspect retrieval
//! lunfardo translate "Hello, friend!"    # full translation cycle
//! lunfardo sources                       # feed and index health
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`clean`] | Boilerplate stripping and whitespace normalization |
//! | [`loader`] | Phrase-table and article-feed loading |
//! | [`chunk`] | Overlapping-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Generation-tagged vector index |
//! | [`retrieve`] | Source-balanced retrieval |
//! | [`language`] | Two-path language routing |
//! | [`generation`] | Chat-completion providers |
//! | [`prompt`] | Prompt templates and context formatting |
//! | [`translate`] | Translation orchestration |

pub mod chunk;
pub mod clean;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod language;
pub mod loader;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod search;
pub mod sources;
pub mod translate;
