//! Backend selection
//!
//! [`Provider`] wraps the concrete backends in one enum so the orchestrator
//! can own "whichever backend is configured" without boxing.

use crate::config::{ProviderConfig, ProviderKind};
use crate::deepl::DeeplProvider;
use crate::error::{MtError, MtResult};
use crate::mock::{MockMode, MockTranslator};
use crate::ollama::OllamaProvider;
use crate::translator::{Reference, ReviewRequest, ReviewVerdict, TranslationRequest, Translator};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug)]
pub enum Provider {
    Ollama(OllamaProvider),
    Deepl(DeeplProvider),
    Mock(MockTranslator),
}

impl Provider {
    /// Build the configured backend
    ///
    /// Fails with [`MtError::Config`] when a required credential is missing.
    pub fn from_config(config: &ProviderConfig) -> MtResult<Self> {
        let provider = match config.kind {
            ProviderKind::Ollama => {
                let timeout = config.timeout().unwrap_or(OllamaProvider::DEFAULT_TIMEOUT);
                Provider::Ollama(OllamaProvider::with_settings(
                    config.model.as_deref(),
                    config.url.as_deref(),
                    timeout,
                    config.max_retries,
                )?)
            }
            ProviderKind::Deepl => {
                let api_key = config.api_key.as_deref().ok_or_else(|| {
                    MtError::Config(
                        "DeepL API key is missing. Set DEEPL_API_KEY or pass --api-key.".to_string(),
                    )
                })?;
                let timeout = config.timeout().unwrap_or(DeeplProvider::DEFAULT_TIMEOUT);
                let mut provider = DeeplProvider::with_settings(api_key, timeout, config.max_retries)?;
                if let Some(url) = config.deepl_url.as_deref() {
                    provider = provider.with_base_url(url);
                }
                if let Some(map) = &config.glossary_map {
                    provider = provider.with_glossary_map(map);
                }
                Provider::Deepl(provider)
            }
            ProviderKind::Mock => Provider::Mock(MockTranslator::new(MockMode::Suffix)),
        };
        info!(provider = provider.provider_name(), "translation provider ready");
        Ok(provider)
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Ollama(_) => ProviderKind::Ollama,
            Provider::Deepl(_) => ProviderKind::Deepl,
            Provider::Mock(_) => ProviderKind::Mock,
        }
    }

    fn inner(&self) -> &dyn Translator {
        match self {
            Provider::Ollama(p) => p,
            Provider::Deepl(p) => p,
            Provider::Mock(p) => p,
        }
    }
}

impl From<MockTranslator> for Provider {
    fn from(mock: MockTranslator) -> Self {
        Provider::Mock(mock)
    }
}

#[async_trait]
impl Translator for Provider {
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
        context: Option<&str>,
    ) -> MtResult<String> {
        self.inner()
            .translate(text, source_locale, target_locale, context)
            .await
    }

    async fn translate_with_reference(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
        reference: &Reference,
        context: Option<&str>,
    ) -> MtResult<String> {
        self.inner()
            .translate_with_reference(text, source_locale, target_locale, reference, context)
            .await
    }

    async fn translate_batch(
        &self,
        requests: &[TranslationRequest],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<BTreeMap<String, String>> {
        self.inner()
            .translate_batch(requests, source_locale, target_locale)
            .await
    }

    async fn review(
        &self,
        source_text: &str,
        translation: &str,
        source_locale: &str,
        target_locale: &str,
        context: Option<&str>,
    ) -> MtResult<ReviewVerdict> {
        self.inner()
            .review(source_text, translation, source_locale, target_locale, context)
            .await
    }

    async fn review_batch(
        &self,
        requests: &[ReviewRequest],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<BTreeMap<String, ReviewVerdict>> {
        self.inner()
            .review_batch(requests, source_locale, target_locale)
            .await
    }

    fn provider_name(&self) -> &str {
        self.inner().provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deepl_without_key_is_config_error() {
        let config = ProviderConfig::new(ProviderKind::Deepl);
        assert!(matches!(Provider::from_config(&config), Err(MtError::Config(_))));
    }

    #[test]
    fn test_from_config_selects_backend() {
        let config = ProviderConfig {
            model: Some("tower:7b".to_string()),
            ..ProviderConfig::new(ProviderKind::Ollama)
        };
        let provider = Provider::from_config(&config).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Ollama);
        assert_eq!(provider.provider_name(), "Ollama (tower:7b)");

        let config = ProviderConfig {
            api_key: Some("key:fx".to_string()),
            ..ProviderConfig::new(ProviderKind::Deepl)
        };
        assert_eq!(Provider::from_config(&config).unwrap().provider_name(), "DeepL");
    }

    #[test]
    fn test_ollama_url_does_not_redirect_deepl() {
        let config = ProviderConfig {
            api_key: Some("key:fx".to_string()),
            url: Some("http://localhost:11434".to_string()),
            ..ProviderConfig::new(ProviderKind::Deepl)
        };
        match Provider::from_config(&config).unwrap() {
            Provider::Deepl(provider) => assert_eq!(provider.base_url(), "https://api-free.deepl.com"),
            other => panic!("Expected DeepL provider, got {:?}", other),
        }

        let config = ProviderConfig {
            deepl_url: Some("http://127.0.0.1:8080/".to_string()),
            ..config
        };
        match Provider::from_config(&config).unwrap() {
            Provider::Deepl(provider) => assert_eq!(provider.base_url(), "http://127.0.0.1:8080"),
            other => panic!("Expected DeepL provider, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mock_delegation() {
        let provider = Provider::from_config(&ProviderConfig::new(ProviderKind::Mock)).unwrap();
        let result = provider.translate("Save", "en", "fr", None).await.unwrap();
        assert_eq!(result, "Save_fr");
    }
}
