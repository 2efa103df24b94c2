//! Mock translator for testing
//!
//! A deterministic, network-free [`Translator`] used by the orchestrator
//! tests and by `tmsync translate --mock`. Responses go through the same
//! placeholder guard as real backends, and every call is recorded so tests
//! can assert on batching.
//!
//! # Example
//!
//! ```ignore
//! use tmsync_mt::{MockMode, MockTranslator, Translator};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockTranslator::new(MockMode::Suffix);
//!     let result = mock.translate("hello", "en", "fr", None).await.unwrap();
//!     assert_eq!(result, "hello_fr");
//! }
//! ```

use crate::error::{MtError, MtResult};
use crate::guard::guard;
use crate::translator::{Reference, ReviewRequest, ReviewVerdict, TranslationRequest, Translator};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append the target locale: "hello" → "hello_fr"
    Suffix,

    /// Predefined translations keyed by `(text, target_locale)`,
    /// falling back to [`MockMode::Suffix`]
    Mappings(HashMap<(String, String), String>),

    /// Simulate backend failures
    Error(String),

    /// Return input unchanged
    NoOp,
}

/// A recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Translate { text: String },
    TranslateWithReference { text: String, reference: String },
    TranslateBatch { keys: Vec<String> },
    Review { source: String },
    ReviewBatch { keys: Vec<String> },
}

#[derive(Debug)]
pub struct MockTranslator {
    mode: MockMode,
    /// Simulated network delay in milliseconds
    delay_ms: u64,
    /// Review verdicts keyed by source text; anything else is valid
    reviews: HashMap<String, ReviewVerdict>,
    /// Keys silently left out of batch results
    dropped: HashSet<String>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay_ms: 0,
            reviews: HashMap::new(),
            dropped: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Convenience for [`MockMode::Mappings`] from `(text, target, translation)` triples
    pub fn with_mappings<'a>(mappings: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) -> Self {
        let map = mappings
            .into_iter()
            .map(|(text, target, translation)| {
                ((text.to_string(), target.to_string()), translation.to_string())
            })
            .collect();
        Self::new(MockMode::Mappings(map))
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Answer reviews of `source_text` with `verdict`
    pub fn with_review(mut self, source_text: &str, verdict: ReviewVerdict) -> Self {
        self.reviews.insert(source_text.to_string(), verdict);
        self
    }

    /// Leave `key` out of batch results, as a backend skipping a line would
    pub fn with_dropped_key(mut self, key: &str) -> Self {
        self.dropped.insert(key.to_string());
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn batch_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::TranslateBatch { .. }))
            .count()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn apply_translation(&self, text: &str, target: &str) -> MtResult<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        let raw = match &self.mode {
            MockMode::Suffix => format!("{}_{}", text, target),
            MockMode::Mappings(map) => map
                .get(&(text.to_string(), target.to_string()))
                .cloned()
                .unwrap_or_else(|| format!("{}_{}", text, target)),
            MockMode::Error(msg) => return Err(MtError::Provider(msg.clone())),
            MockMode::NoOp => text.to_string(),
        };
        Ok(guard(text, &raw))
    }

    fn apply_review(&self, source: &str) -> MtResult<ReviewVerdict> {
        if let MockMode::Error(msg) = &self.mode {
            return Err(MtError::Provider(msg.clone()));
        }
        Ok(self
            .reviews
            .get(source)
            .cloned()
            .unwrap_or_else(ReviewVerdict::valid))
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_locale: &str,
        target_locale: &str,
        _context: Option<&str>,
    ) -> MtResult<String> {
        self.record(MockCall::Translate {
            text: text.to_string(),
        });
        self.apply_delay().await;
        self.apply_translation(text, target_locale)
    }

    async fn translate_with_reference(
        &self,
        text: &str,
        _source_locale: &str,
        target_locale: &str,
        reference: &Reference,
        _context: Option<&str>,
    ) -> MtResult<String> {
        self.record(MockCall::TranslateWithReference {
            text: text.to_string(),
            reference: reference.text.clone(),
        });
        self.apply_delay().await;
        self.apply_translation(text, target_locale)
    }

    async fn translate_batch(
        &self,
        requests: &[TranslationRequest],
        _source_locale: &str,
        target_locale: &str,
    ) -> MtResult<BTreeMap<String, String>> {
        self.record(MockCall::TranslateBatch {
            keys: requests.iter().map(|r| r.key.clone()).collect(),
        });
        // Per batch, not per string
        self.apply_delay().await;

        let mut results = BTreeMap::new();
        for request in requests {
            if self.dropped.contains(&request.key) {
                continue;
            }
            let translation = self.apply_translation(&request.text, target_locale)?;
            results.insert(request.key.clone(), translation);
        }
        Ok(results)
    }

    async fn review(
        &self,
        source_text: &str,
        _translation: &str,
        _source_locale: &str,
        _target_locale: &str,
        _context: Option<&str>,
    ) -> MtResult<ReviewVerdict> {
        self.record(MockCall::Review {
            source: source_text.to_string(),
        });
        self.apply_delay().await;
        self.apply_review(source_text)
    }

    async fn review_batch(
        &self,
        requests: &[ReviewRequest],
        _source_locale: &str,
        _target_locale: &str,
    ) -> MtResult<BTreeMap<String, ReviewVerdict>> {
        self.record(MockCall::ReviewBatch {
            keys: requests.iter().map(|r| r.key.clone()).collect(),
        });
        self.apply_delay().await;

        requests
            .iter()
            .filter(|r| !self.dropped.contains(&r.key))
            .map(|r| Ok((r.key.clone(), self.apply_review(&r.source)?)))
            .collect()
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Suffix Mode Tests ==========

    #[tokio::test]
    async fn test_suffix_single_translation() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let result = mock.translate("hello", "en", "fr", None).await.unwrap();
        assert_eq!(result, "hello_fr");
    }

    #[tokio::test]
    async fn test_empty_text_stays_empty() {
        let mock = MockTranslator::new(MockMode::Suffix);
        assert_eq!(mock.translate("", "en", "fr", None).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_suffix_batch_translation() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let requests = vec![
            TranslationRequest::new("A.HELLO", "hello"),
            TranslationRequest::new("A.WORLD", "world"),
        ];
        let results = mock.translate_batch(&requests, "en", "fr").await.unwrap();
        assert_eq!(results["A.HELLO"], "hello_fr");
        assert_eq!(results["A.WORLD"], "world_fr");
    }

    // ========== Mapping Mode Tests ==========

    #[tokio::test]
    async fn test_mapping_is_guarded() {
        let mock = MockTranslator::with_mappings([("Hello {name}", "fr", "Bonjour {nom}")]);
        let result = mock.translate("Hello {name}", "en", "fr", None).await.unwrap();
        assert_eq!(result, "Bonjour {name}");
    }

    #[tokio::test]
    async fn test_mapping_fallback_to_suffix() {
        let mock = MockTranslator::with_mappings([]);
        let result = mock.translate("unknown", "en", "fr", None).await.unwrap();
        assert_eq!(result, "unknown_fr");
    }

    // ========== Error Mode Tests ==========

    #[tokio::test]
    async fn test_error_mode_returns_error() {
        let mock = MockTranslator::new(MockMode::Error("API unavailable".to_string()));
        match mock.translate("hello", "en", "fr", None).await {
            Err(MtError::Provider(msg)) => assert_eq!(msg, "API unavailable"),
            other => panic!("Expected Provider error, got {:?}", other),
        }
        let requests = vec![TranslationRequest::new("A.B", "hello")];
        assert!(mock.translate_batch(&requests, "en", "fr").await.is_err());
    }

    // ========== NoOp Mode Tests ==========

    #[tokio::test]
    async fn test_noop_returns_unchanged() {
        let mock = MockTranslator::new(MockMode::NoOp);
        let result = mock.translate("Hello world", "en", "fr", None).await.unwrap();
        assert_eq!(result, "Hello world");
    }

    // ========== Scripted Behavior ==========

    #[tokio::test]
    async fn test_dropped_key_missing_from_batch() {
        let mock = MockTranslator::new(MockMode::Suffix).with_dropped_key("A.TWO");
        let requests = vec![
            TranslationRequest::new("A.ONE", "one"),
            TranslationRequest::new("A.TWO", "two"),
        ];
        let results = mock.translate_batch(&requests, "en", "fr").await.unwrap();
        assert_eq!(results.len(), 1);
        // Single calls still answer
        assert_eq!(mock.translate("two", "en", "fr", None).await.unwrap(), "two_fr");
    }

    #[tokio::test]
    async fn test_scripted_review() {
        let mock = MockTranslator::new(MockMode::Suffix)
            .with_review("Author", ReviewVerdict::invalid("Auteur"));
        let requests = vec![
            ReviewRequest::new("Page.AUTHOR", "Author", "Auteurs"),
            ReviewRequest::new("Page.TITLE", "Title", "Titre"),
        ];
        let verdicts = mock.review_batch(&requests, "en", "fr").await.unwrap();
        assert_eq!(verdicts["Page.AUTHOR"], ReviewVerdict::invalid("Auteur"));
        assert!(verdicts["Page.TITLE"].valid);
    }

    #[tokio::test]
    async fn test_calls_recorded() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let reference = Reference::new("Titel", "nl");
        mock.translate_with_reference("Title", "en", "fr", &reference, None)
            .await
            .unwrap();
        mock.translate_batch(&[TranslationRequest::new("A.B", "b")], "en", "fr")
            .await
            .unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                MockCall::TranslateWithReference {
                    text: "Title".to_string(),
                    reference: "Titel".to_string()
                },
                MockCall::TranslateBatch {
                    keys: vec!["A.B".to_string()]
                },
            ]
        );
        assert_eq!(mock.batch_calls(), 1);
    }

    #[tokio::test]
    async fn test_delay_adds_latency() {
        let mock = MockTranslator::new(MockMode::Suffix).with_delay(50);
        let start = std::time::Instant::now();
        mock.translate("hello", "en", "fr", None).await.unwrap();
        assert!(start.elapsed().as_millis() >= 50);
    }

    #[test]
    fn test_provider_name() {
        let mock = MockTranslator::new(MockMode::Suffix);
        assert_eq!(mock.provider_name(), "Mock Translator");
    }
}
