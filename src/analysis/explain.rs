//! Explanation stage: mask, prompt, cache, complete, unmask.

use crate::ai::AiProvider;
use crate::ai::prompts::explain_prompt;
use crate::analyzer::AnalysisResult;
use crate::cache::{ExplanationCache, cache_key};
use crate::error::{AiError, MaskingError};
use crate::masking::MaskTable;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why one result could not be explained.
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error(transparent)]
    Masking(#[from] MaskingError),

    #[error(transparent)]
    Completion(#[from] AiError),
}

pub struct Explainer {
    provider: Box<dyn AiProvider>,
    cache: ExplanationCache,
    anonymize: bool,
    show_progress: bool,
}

impl Explainer {
    pub fn new(provider: Box<dyn AiProvider>, cache: ExplanationCache, anonymize: bool) -> Self {
        Self {
            provider,
            cache,
            anonymize,
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while explaining.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn provider(&self) -> &dyn AiProvider {
        self.provider.as_ref()
    }

    pub fn anonymize(&self) -> bool {
        self.anonymize
    }

    /// Attach an explanation to every result.
    ///
    /// A failed explanation is recorded on the result and in the returned
    /// messages; it never stops the remaining results. Cancellation stops
    /// the stage and keeps explanations obtained so far.
    pub async fn explain_all(
        &self,
        results: &mut [AnalysisResult],
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let mut errors = Vec::new();
        let bar = self.progress_bar(results.len());

        for result in results.iter_mut() {
            if cancel.is_cancelled() {
                errors.push("Explanation cancelled before completion".to_string());
                break;
            }
            bar.set_message(result.name.clone());

            match self.explain(result, cancel).await {
                Ok(explanation) => result.explanation = Some(explanation),
                Err(ExplainError::Completion(AiError::Cancelled)) => {
                    errors.push("Explanation cancelled before completion".to_string());
                    break;
                }
                Err(e) => {
                    log::warn!("Could not explain {} {}: {}", result.kind, result.name, e);
                    errors.push(format!("{} {}: {}", result.kind, result.name, e));
                    result.explanation_error = Some(e.to_string());
                }
            }
            bar.inc(1);
        }

        bar.finish_and_clear();
        errors
    }

    /// Explanation for one result, unmasked.
    pub async fn explain(
        &self,
        result: &AnalysisResult,
        cancel: &CancellationToken,
    ) -> Result<String, ExplainError> {
        let text = result
            .failures
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        // Mask the failure text only; the instructions around it stay intact
        let table = if self.anonymize {
            Some(MaskTable::resolve(result.sensitive(), &text)?)
        } else {
            None
        };

        let text = match &table {
            Some(table) => {
                let masked = table.mask(&text);
                table.check_complete(&masked)?;
                masked
            }
            None => text,
        };
        let outbound = explain_prompt(self.provider.language(), &text);

        let key = cache_key(self.provider.name(), self.provider.language(), &outbound);
        let cached = tokio::select! {
            _ = cancel.cancelled() => return Err(AiError::Cancelled.into()),
            hit = self.cache.get(&key) => hit,
        };

        let response = match cached {
            Some(hit) => hit,
            None => {
                let completion = tokio::select! {
                    _ = cancel.cancelled() => return Err(AiError::Cancelled.into()),
                    completion = self.provider.complete(&outbound) => completion?,
                };
                self.cache.put(&key, &completion).await;
                completion
            }
        };

        Ok(match &table {
            Some(table) => table.unmask(&response),
            None => response,
        })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {spinner:.cyan} Explaining [{bar:40.cyan/dim}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("━━╸"));
        }
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Failure, Sensitive};
    use crate::cache::{CacheEntry, CacheStore};
    use crate::config::types::ProviderConfig;
    use crate::error::{CacheError, ConfigError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        prompts: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl AiProvider for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn language(&self) -> &str {
            "english"
        }

        fn configure(&mut self, _config: &ProviderConfig) -> Result<(), ConfigError> {
            Ok(())
        }

        async fn complete(&self, prompt: &str) -> Result<String, AiError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail_on.is_some_and(|f| prompt.contains(f)) {
                return Err(AiError::Api {
                    status: 429,
                    message: "rate limited".to_string(),
                });
            }
            // Quote the prompt back, like a model echoing its input
            Ok(format!("Error: {}\nSolution: fix it", prompt))
        }
    }

    #[derive(Default)]
    struct MemoryStore(Mutex<HashMap<String, CacheEntry>>);

    #[async_trait]
    impl CacheStore for MemoryStore {
        fn name(&self) -> &'static str {
            "memory"
        }

        async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        async fn save(&self, entry: &CacheEntry) -> Result<(), CacheError> {
            self.0.lock().unwrap().insert(entry.key.clone(), entry.clone());
            Ok(())
        }
    }

    fn ingress_result() -> AnalysisResult {
        AnalysisResult::new(
            "Ingress",
            "payments/checkout",
            vec![Failure::with_sensitive(
                "Ingress uses the service payments/cart which does not exist.",
                &["payments", "cart"],
            )],
        )
        .unwrap()
    }

    fn explainer(
        prompts: &Arc<Mutex<Vec<String>>>,
        store: &Arc<MemoryStore>,
        anonymize: bool,
        no_cache: bool,
    ) -> Explainer {
        let provider = Recorder {
            prompts: prompts.clone(),
            fail_on: None,
        };
        Explainer::new(
            Box::new(provider),
            ExplanationCache::new(store.clone(), no_cache),
            anonymize,
        )
    }

    #[tokio::test]
    async fn anonymized_prompt_hides_values_and_answer_restores_them() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryStore::default());
        let explainer = explainer(&prompts, &store, true, false);
        let mut results = vec![ingress_result()];

        let errors = explainer.explain_all(&mut results, &CancellationToken::new()).await;
        assert!(errors.is_empty());

        let sent = prompts.lock().unwrap()[0].clone();
        assert!(!sent.contains("payments"));
        assert!(!sent.contains("cart"));
        assert!(sent.contains(&Sensitive::new("payments").masked));

        let explanation = results[0].explanation.as_deref().unwrap();
        assert!(explanation.contains("payments/cart"));

        // Cached value is the masked completion
        let cached = store.0.lock().unwrap().values().next().unwrap().completion().unwrap();
        assert!(!cached.contains("payments"));
    }

    #[tokio::test]
    async fn masking_leaves_prompt_instructions_untouched() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryStore::default());
        let explainer = explainer(&prompts, &store, true, false);
        let mut results = vec![
            AnalysisResult::new(
                "Service",
                "payments/checkout",
                vec![Failure::with_sensitive(
                    "Service has no endpoints, expected label version=2",
                    &["2"],
                )],
            )
            .unwrap(),
        ];

        let errors = explainer.explain_all(&mut results, &CancellationToken::new()).await;
        assert!(errors.is_empty());

        let sent = prompts.lock().unwrap()[0].clone();
        assert!(sent.contains("no more than 280 characters"));
        assert!(!sent.contains("version=2"));
        assert!(results[0].explanation.as_deref().unwrap().contains("version=2"));
    }

    #[tokio::test]
    async fn repeated_prompt_is_served_from_cache() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryStore::default());

        let first = explainer(&prompts, &store, true, false);
        first.explain_all(&mut [ingress_result()], &CancellationToken::new()).await;
        let second = explainer(&prompts, &store, true, false);
        let mut again = vec![ingress_result()];
        second.explain_all(&mut again, &CancellationToken::new()).await;

        assert_eq!(prompts.lock().unwrap().len(), 1);
        assert!(again[0].explanation.as_deref().unwrap().contains("payments/cart"));
    }

    #[tokio::test]
    async fn no_cache_calls_provider_every_time() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryStore::default());

        for _ in 0..2 {
            let explainer = explainer(&prompts, &store, false, true);
            explainer.explain_all(&mut [ingress_result()], &CancellationToken::new()).await;
        }

        assert_eq!(prompts.lock().unwrap().len(), 2);
        assert_eq!(store.0.lock().unwrap().len(), 1);
        // Without anonymization the raw text is sent
        assert!(prompts.lock().unwrap()[0].contains("payments/cart"));
    }

    #[tokio::test]
    async fn provider_failure_is_recorded_per_result() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let provider = Recorder {
            prompts: prompts.clone(),
            fail_on: Some("crash"),
        };
        let explainer = Explainer::new(
            Box::new(provider),
            ExplanationCache::new(Arc::new(MemoryStore::default()), false),
            false,
        );

        let mut results = vec![
            AnalysisResult::new("Pod", "default/a", vec![Failure::new("crash loop")]).unwrap(),
            ingress_result(),
        ];
        let errors = explainer.explain_all(&mut results, &CancellationToken::new()).await;

        assert_eq!(errors.len(), 1);
        assert!(results[0].explanation.is_none());
        assert!(results[0].explanation_error.as_deref().unwrap().contains("rate limited"));
        assert_eq!(results[0].failures[0].text, "crash loop");
        assert!(results[1].explanation.is_some());
    }

    #[tokio::test]
    async fn cancelled_stage_leaves_results_unexplained() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryStore::default());
        let explainer = explainer(&prompts, &store, false, false);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut results = vec![ingress_result()];
        let errors = explainer.explain_all(&mut results, &cancel).await;
        assert_eq!(errors.len(), 1);
        assert!(results[0].explanation.is_none());
        assert!(prompts.lock().unwrap().is_empty());
    }
}
