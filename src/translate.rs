//! Translation orchestration: language routing, retrieval, prompt assembly,
//! generation, one request at a time.
//!
//! Unsupported input short-circuits before any retrieval or generation call
//! is made. A retrieval failure degrades to an empty context rather than
//! failing the request; only generation exhaustion is a hard error.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::generation::GenerationProvider;
use crate::language::{LanguageClassifier, LanguageRouter};
use crate::models::{Language, TranslationOutcome};
use crate::prompt::{format_context, PromptLibrary};
use crate::retrieve::Retriever;

pub struct Translator<C: LanguageClassifier> {
    router: LanguageRouter<C>,
    retriever: Retriever,
    prompts: PromptLibrary,
    generator: Arc<dyn GenerationProvider>,
    top_k: usize,
}

impl<C: LanguageClassifier> Translator<C> {
    pub fn new(
        router: LanguageRouter<C>,
        retriever: Retriever,
        prompts: PromptLibrary,
        generator: Arc<dyn GenerationProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            router,
            retriever,
            prompts,
            generator,
            top_k,
        }
    }

    pub async fn translate(&self, text: &str) -> Result<TranslationOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "input text must not be empty".into(),
            ));
        }

        let language = self.router.route(text).await?;
        if let Language::Unsupported(code) = &language {
            info!(code = %code, "unsupported input language, refusing");
            return Ok(TranslationOutcome::Refusal {
                message: format!(
                    "Sorry, I can only translate English or Spanish input; this looks like \"{code}\"."
                ),
                detected_language: code.clone(),
            });
        }

        let context = match self.retriever.query(text, self.top_k).await {
            Ok(chunks) => format_context(&chunks),
            Err(e) => {
                warn!(error = %e, "retrieval failed, continuing without context");
                format_context(&[])
            }
        };

        let user_prompt = self.prompts.render_translation(text, &context);
        let translation = self
            .generator
            .complete(self.prompts.system(), &user_prompt)
            .await
            .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?;

        let translation = translation.trim().to_string();
        if translation.is_empty() {
            return Err(PipelineError::GenerationFailed(
                "model returned an empty translation".into(),
            ));
        }

        info!(language = ?language, chars = text.chars().count(), "translation complete");
        Ok(TranslationOutcome::Translation(translation))
    }
}

/// CLI entry: wire the full request path from config and translate one input.
pub async fn run_translate(config: &crate::config::Config, text: &str) -> anyhow::Result<()> {
    let index = crate::index::VectorIndex::load(&config.index.dir)?;
    let embedder = crate::embedding::create_provider(&config.embedding)?;
    let generator = crate::generation::create_provider(&config.generation)?;

    let retriever = Retriever::new(
        embedder,
        Arc::new(index),
        config.retrieval.clone(),
    )?;
    let router = LanguageRouter::new(
        crate::generation::LlmClassifier::new(Arc::clone(&generator)),
        config.detection.clone(),
    );
    let prompts = PromptLibrary::load(&config.prompts)?;

    let translator = Translator::new(router, retriever, prompts, generator, config.retrieval.top_k);
    match translator.translate(text).await? {
        TranslationOutcome::Translation(output) => println!("{output}"),
        TranslationOutcome::Refusal {
            message,
            detected_language,
        } => {
            println!("{message}");
            println!("(detected language: {detected_language})");
        }
    }
    Ok(())
}
