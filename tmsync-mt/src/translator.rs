//! Translator trait and request types
//!
//! The `Translator` trait is the single seam between catalog reconciliation
//! and translation backends (an Ollama model, the DeepL API, or the mock
//! used in tests). Every backend offers the same five operations:
//!
//! - single translation, optionally with a context hint
//! - single translation guided by an existing translation in another language
//! - keyed batch translation
//! - single and batch review of existing translations
//!
//! # Example
//!
//! ```ignore
//! use tmsync_mt::{OllamaProvider, Translator, TranslationRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OllamaProvider::new(None, None)?;
//!
//!     let result = provider.translate("Hello {name}", "en", "fr", None).await?;
//!     println!("{}", result); // "Bonjour {name}"
//!
//!     let batch = vec![
//!         TranslationRequest::new("Page.TITLE", "Title"),
//!         TranslationRequest::new("Page.CONTENT", "Content"),
//!     ];
//!     let results = provider.translate_batch(&batch, "en", "fr").await?;
//!     println!("{:?}", results);
//!     Ok(())
//! }
//! ```

use crate::error::{MtError, MtResult};
use async_trait::async_trait;
use icu_locale::Locale;
use std::collections::BTreeMap;

/// An existing translation of the same string in another language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub text: String,
    pub language: String,
}

impl Reference {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Reference {
            text: text.into(),
            language: language.into(),
        }
    }
}

/// One entry of a translation batch
///
/// Keys are unique within a batch; results are keyed the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub key: String,
    pub text: String,
    pub context: Option<String>,
    pub reference: Option<Reference>,
}

impl TranslationRequest {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        TranslationRequest {
            key: key.into(),
            text: text.into(),
            context: None,
            reference: None,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.is_empty());
        self
    }

    pub fn with_reference(mut self, reference: Option<Reference>) -> Self {
        self.reference = reference;
        self
    }
}

/// One entry of a review batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub key: String,
    pub source: String,
    pub translation: String,
    pub context: Option<String>,
}

impl ReviewRequest {
    pub fn new(key: impl Into<String>, source: impl Into<String>, translation: impl Into<String>) -> Self {
        ReviewRequest {
            key: key.into(),
            source: source.into(),
            translation: translation.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.is_empty());
        self
    }
}

/// Outcome of reviewing one translation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewVerdict {
    pub valid: bool,
    /// Suggested replacement when the translation is judged invalid
    pub correction: Option<String>,
    pub comment: Option<String>,
}

impl ReviewVerdict {
    pub fn valid() -> Self {
        ReviewVerdict {
            valid: true,
            ..Default::default()
        }
    }

    pub fn invalid(correction: impl Into<String>) -> Self {
        ReviewVerdict {
            valid: false,
            correction: Some(correction.into()),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment.filter(|c| !c.is_empty());
        self
    }
}

/// Generic trait for translation backends
///
/// Implementations talk to an LLM (Ollama), a REST translation API (DeepL)
/// or answer deterministically (mock). Every implementation returns text
/// that already went through the placeholder guard.
///
/// All methods are async since every real backend is a network service.
/// Locale arguments are always `(source, target)`.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a single string
    ///
    /// # Arguments
    ///
    /// * `text` - The text to translate
    /// * `source_locale` - Source language code (e.g., "en", "en_US")
    /// * `target_locale` - Target language code (e.g., "fr", "pt-BR")
    /// * `context` - Hint for the translator, possibly carrying a glossary directive
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The translated text; empty input gives empty output
    ///   without reaching the backend
    /// * `Err(MtError::Provider)` - On network or decoding failure
    ///
    /// # Example
    ///
    /// ```ignore
    /// let result = provider.translate("Hello {name}", "en", "fr", Some("Greeting")).await?;
    /// assert_eq!(result, "Bonjour {name}");
    /// ```
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
        context: Option<&str>,
    ) -> MtResult<String>;

    /// Translate a single string using an existing translation as a
    /// terminology and style reference
    ///
    /// Backends without native support ignore the reference and fall back
    /// to [`Translator::translate`].
    ///
    /// # Arguments
    ///
    /// * `text` - The text to translate
    /// * `source_locale` - Source language code
    /// * `target_locale` - Target language code
    /// * `reference` - The same message already translated into another language
    /// * `context` - Hint for the translator
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The translated text
    /// * `Err(MtError)` - If translation fails
    ///
    /// # Example
    ///
    /// ```ignore
    /// let reference = Reference::new("Speichern", "de");
    /// let result = provider.translate_with_reference("Save", "en", "nl", &reference, None).await?;
    /// ```
    async fn translate_with_reference(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
        _reference: &Reference,
        context: Option<&str>,
    ) -> MtResult<String> {
        self.translate(text, source_locale, target_locale, context)
            .await
    }

    /// Translate a keyed batch
    ///
    /// Each request keeps its own context. Backends that take one context
    /// per call partition the batch by context.
    ///
    /// # Arguments
    ///
    /// * `requests` - Keyed texts with optional context
    /// * `source_locale` - Source language code
    /// * `target_locale` - Target language code
    ///
    /// # Returns
    ///
    /// * `Ok(BTreeMap)` - Translations by key
    /// * `Err(MtError)` - If the batch as a whole fails
    ///
    /// # Guarantees
    ///
    /// - Only requested keys appear in the result
    /// - A missing key is a soft failure for that entry only; callers may
    ///   retry it individually
    ///
    /// # Example
    ///
    /// ```ignore
    /// let requests = vec![TranslationRequest::new("Page.TITLE", "Title")];
    /// let results = provider.translate_batch(&requests, "en", "fr").await?;
    /// assert_eq!(results["Page.TITLE"], "Titre");
    /// ```
    async fn translate_batch(
        &self,
        requests: &[TranslationRequest],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<BTreeMap<String, String>>;

    /// Judge an existing translation and propose a correction
    ///
    /// # Arguments
    ///
    /// * `source_text` - The source-language text
    /// * `translation` - The current translation under review
    /// * `source_locale` - Source language code
    /// * `target_locale` - Target language code
    /// * `context` - Hint for the reviewer
    ///
    /// # Returns
    ///
    /// * `Ok(ReviewVerdict)` - `valid`, or a correction with an optional comment
    /// * `Err(MtError)` - If the backend call fails
    ///
    /// # Example
    ///
    /// ```ignore
    /// let verdict = provider.review("Author", "Auteurs", "en", "fr", None).await?;
    /// if !verdict.valid {
    ///     println!("suggested: {:?}", verdict.correction);
    /// }
    /// ```
    async fn review(
        &self,
        source_text: &str,
        translation: &str,
        source_locale: &str,
        target_locale: &str,
        context: Option<&str>,
    ) -> MtResult<ReviewVerdict>;

    /// Review a keyed batch
    ///
    /// # Arguments
    ///
    /// * `requests` - Keyed source/translation pairs with optional context
    /// * `source_locale` - Source language code
    /// * `target_locale` - Target language code
    ///
    /// # Returns
    ///
    /// * `Ok(BTreeMap)` - Verdicts by key; keys missing from the result
    ///   were not judged and may be reviewed individually
    /// * `Err(MtError)` - If the batch as a whole fails
    ///
    /// # Example
    ///
    /// ```ignore
    /// let requests = vec![ReviewRequest::new("Page.AUTHOR", "Author", "Auteurs")];
    /// let verdicts = provider.review_batch(&requests, "en", "fr").await?;
    /// ```
    async fn review_batch(
        &self,
        requests: &[ReviewRequest],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<BTreeMap<String, ReviewVerdict>>;

    /// Get the name of this translation backend
    ///
    /// Used in logs to identify which backend handled a call.
    ///
    /// # Returns
    ///
    /// A string identifying the backend (e.g., "Ollama (translategemma:4b)", "DeepL")
    fn provider_name(&self) -> &str;
}

/// Strip region and script: `fr-FR` → `fr`, `zh_Hans` → `zh`
pub fn normalize_locale(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_lowercase()
}

/// Check that a locale code is a well-formed BCP 47 tag
///
/// Underscores are accepted as separators (`en_US`), as catalogs commonly
/// use them.
pub fn validate_locale(locale: &str) -> MtResult<()> {
    if locale.is_empty() {
        return Err(MtError::InvalidLocale("Locale code is empty".to_string()));
    }

    locale
        .replace('_', "-")
        .parse::<Locale>()
        .map(|_| ())
        .map_err(|e| MtError::InvalidLocale(format!("'{}': {}", locale, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("en-US"), "en");
        assert_eq!(normalize_locale("zh_Hans"), "zh");
        assert_eq!(normalize_locale("FR"), "fr");
        assert_eq!(normalize_locale("nl"), "nl");
    }

    #[test]
    fn test_validate_locale_valid_codes() {
        assert!(validate_locale("en").is_ok());
        assert!(validate_locale("en-US").is_ok());
        assert!(validate_locale("en_US").is_ok());
        assert!(validate_locale("zh-Hans").is_ok());
    }

    #[test]
    fn test_validate_locale_invalid_codes() {
        assert!(validate_locale("").is_err());
        assert!(validate_locale("en@invalid").is_err());
        assert!(validate_locale("fr#bad").is_err());
    }

    #[test]
    fn test_validate_locale_error_messages() {
        match validate_locale("") {
            Err(MtError::InvalidLocale(msg)) => assert!(msg.contains("empty")),
            _ => panic!("Expected InvalidLocale error"),
        }
    }

    #[test]
    fn test_request_builders_drop_empty_context() {
        let request = TranslationRequest::new("A.B", "Text").with_context(Some(String::new()));
        assert_eq!(request.context, None);

        let review = ReviewRequest::new("A.B", "Text", "Texte").with_context(Some("Hint".into()));
        assert_eq!(review.context.as_deref(), Some("Hint"));
    }

    #[test]
    fn test_verdict_constructors() {
        assert!(ReviewVerdict::valid().valid);
        let verdict = ReviewVerdict::invalid("Auteur").with_comment(Some(String::new()));
        assert!(!verdict.valid);
        assert_eq!(verdict.correction.as_deref(), Some("Auteur"));
        assert_eq!(verdict.comment, None);
    }
}
