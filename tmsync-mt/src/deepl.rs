//! DeepL API provider
//!
//! Talks to the DeepL REST API v2 (`/v2/translate`). Keys ending in `:fx`
//! belong to the free tier and are sent to `api-free.deepl.com`.
//!
//! DeepL has no notion of review and no reference-translation input:
//! review is simulated by translating again and comparing, and references
//! are ignored.
//!
//! # Authentication
//!
//! The key is read from the `DEEPL_API_KEY` environment variable by
//! [`DeeplProvider::from_env`].

use crate::error::{MtError, MtResult};
use crate::guard::repair;
use crate::translator::{
    ReviewRequest, ReviewVerdict, TranslationRequest, Translator, validate_locale,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

const PRO_URL: &str = "https://api.deepl.com";
const FREE_URL: &str = "https://api-free.deepl.com";
const SUGGESTION_COMMENT: &str = "DeepL suggestion";

/// Target codes: upper-case, `-` separated, with the regional variant
/// DeepL requires for English and Portuguese
pub fn normalize_target(code: &str) -> String {
    let code = code.replace('_', "-").to_uppercase();
    match code.as_str() {
        "EN" => "EN-US".to_string(),
        "PT" => "PT-PT".to_string(),
        _ => code,
    }
}

pub fn normalize_source(code: &str) -> String {
    code.replace('_', "-").to_uppercase()
}

#[derive(Serialize)]
struct TranslateBody<'a> {
    text: Vec<&'a str>,
    source_lang: String,
    target_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    glossary_id: Option<String>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    translations: Vec<TranslatedText>,
}

#[derive(Deserialize)]
struct TranslatedText {
    text: String,
}

/// DeepL REST API provider
pub struct DeeplProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    /// `map.json` holding the remote glossary identifier
    glossary_map: Option<PathBuf>,
    /// `None` until the map has been read
    glossary_id: Mutex<Option<Option<String>>>,
}

impl DeeplProvider {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(api_key: &str) -> MtResult<Self> {
        Self::with_settings(api_key, Self::DEFAULT_TIMEOUT, 1)
    }

    pub fn with_settings(api_key: &str, timeout: Duration, max_retries: u32) -> MtResult<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(MtError::Config(
                "DeepL API key is missing. Set DEEPL_API_KEY or pass it explicitly.".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MtError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = if api_key.ends_with(":fx") {
            FREE_URL
        } else {
            PRO_URL
        };

        Ok(Self {
            api_key: api_key.to_string(),
            client,
            base_url: base_url.to_string(),
            max_retries,
            glossary_map: None,
            glossary_id: Mutex::new(None),
        })
    }

    /// Create a provider from the `DEEPL_API_KEY` environment variable
    pub fn from_env() -> MtResult<Self> {
        let api_key = std::env::var("DEEPL_API_KEY").map_err(|_| {
            MtError::Config("DEEPL_API_KEY environment variable not set".to_string())
        })?;
        Self::new(&api_key)
    }

    /// Point the provider at another API host (proxies, tests)
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Read the glossary identifier from `map.json` on first use
    pub fn with_glossary_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.glossary_map = Some(path.into());
        self.invalidate_glossary_id();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forget the cached glossary identifier; the map is read again on the
    /// next request
    pub fn invalidate_glossary_id(&self) {
        *self.glossary_id.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn glossary_id(&self) -> Option<String> {
        let mut cached = self.glossary_id.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let id = match &self.glossary_map {
            Some(path) => tmsync::read_glossary_id(path).unwrap_or_else(|e| {
                warn!("Ignoring glossary map: {}", e);
                None
            }),
            None => None,
        };
        if let Some(id) = &id {
            debug!(glossary_id = %id, "using DeepL glossary");
        }
        *cached = Some(id.clone());
        id
    }

    /// Translate texts sharing one context in a single request
    async fn translate_texts(
        &self,
        texts: &[&str],
        source_locale: &str,
        target_locale: &str,
        context: Option<&str>,
    ) -> MtResult<Vec<String>> {
        let url = format!("{}/v2/translate", self.base_url);
        let body = TranslateBody {
            text: texts.to_vec(),
            source_lang: normalize_source(source_locale),
            target_lang: normalize_target(target_locale),
            context: context.filter(|c| !c.is_empty()),
            glossary_id: self.glossary_id(),
        };

        let mut attempt = 0;
        let response = loop {
            let request = self
                .client
                .post(&url)
                .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
                .json(&body);
            match request.send().await {
                Ok(response) => break response,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, "DeepL request failed, retrying: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status.as_u16() {
                401 | 403 => MtError::Config(format!(
                    "DeepL rejected the API key ({}): {}",
                    status, error_text
                )),
                _ => MtError::Provider(format!("DeepL API error ({}): {}", status, error_text)),
            });
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| MtError::Provider(format!("Failed to parse DeepL response: {}", e)))?;

        if parsed.translations.len() != texts.len() {
            return Err(MtError::Provider(format!(
                "DeepL returned {} translations for {} texts",
                parsed.translations.len(),
                texts.len()
            )));
        }
        Ok(parsed.translations.into_iter().map(|t| t.text).collect())
    }
}

impl std::fmt::Debug for DeeplProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeeplProvider")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("glossary_map", &self.glossary_map)
            .finish()
    }
}

#[async_trait]
impl Translator for DeeplProvider {
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
        context: Option<&str>,
    ) -> MtResult<String> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        if text.is_empty() {
            return Ok(String::new());
        }

        let results = self
            .translate_texts(&[text], source_locale, target_locale, context)
            .await?;
        let translated = results.into_iter().next().unwrap_or_default();
        Ok(repair(text, &translated))
    }

    /// Requests are grouped by context since DeepL applies one context per
    /// call. A failing group leaves its keys out of the result.
    async fn translate_batch(
        &self,
        requests: &[TranslationRequest],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<BTreeMap<String, String>> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        let mut results = BTreeMap::new();
        let mut groups: BTreeMap<&str, Vec<&TranslationRequest>> = BTreeMap::new();
        for request in requests {
            if request.text.is_empty() {
                results.insert(request.key.clone(), String::new());
                continue;
            }
            groups
                .entry(request.context.as_deref().unwrap_or_default())
                .or_default()
                .push(request);
        }

        for (context, group) in groups {
            let texts: Vec<&str> = group.iter().map(|r| r.text.as_str()).collect();
            let context = Some(context).filter(|c| !c.is_empty());
            match self
                .translate_texts(&texts, source_locale, target_locale, context)
                .await
            {
                Ok(translations) => {
                    for (request, translated) in group.iter().zip(translations) {
                        results.insert(request.key.clone(), repair(&request.text, &translated));
                    }
                }
                Err(e) => warn!(
                    entries = group.len(),
                    context = context.unwrap_or_default(),
                    "DeepL batch group failed: {}",
                    e
                ),
            }
        }
        Ok(results)
    }

    async fn review(
        &self,
        source_text: &str,
        translation: &str,
        source_locale: &str,
        target_locale: &str,
        context: Option<&str>,
    ) -> MtResult<ReviewVerdict> {
        let suggestion = self
            .translate(source_text, source_locale, target_locale, context)
            .await?;
        if suggestion != translation {
            return Ok(ReviewVerdict::invalid(suggestion)
                .with_comment(Some(SUGGESTION_COMMENT.to_string())));
        }
        Ok(ReviewVerdict::valid())
    }

    async fn review_batch(
        &self,
        requests: &[ReviewRequest],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<BTreeMap<String, ReviewVerdict>> {
        let translate_requests: Vec<TranslationRequest> = requests
            .iter()
            .map(|r| TranslationRequest::new(&r.key, &r.source).with_context(r.context.clone()))
            .collect();
        let suggestions = self
            .translate_batch(&translate_requests, source_locale, target_locale)
            .await?;

        // Keys of a failed group have no suggestion and stay unjudged
        Ok(requests
            .iter()
            .filter_map(|request| {
                let suggestion = suggestions.get(&request.key)?;
                let verdict = if !suggestion.is_empty() && *suggestion != request.translation {
                    ReviewVerdict::invalid(suggestion.clone())
                        .with_comment(Some(SUGGESTION_COMMENT.to_string()))
                } else {
                    ReviewVerdict::valid()
                };
                Some((request.key.clone(), verdict))
            })
            .collect())
    }

    fn provider_name(&self) -> &str {
        "DeepL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    /// Answers every text with `<text>_<target>`
    fn echo(request: &Request) -> ResponseTemplate {
        let body: Value = request.body_json().unwrap();
        let target = body["target_lang"].as_str().unwrap().to_lowercase();
        let translations: Vec<Value> = body["text"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| json!({"text": format!("{}_{}", t.as_str().unwrap(), target)}))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({"translations": translations}))
    }

    async fn echo_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(echo)
            .mount(&server)
            .await;
        server
    }

    fn provider(server: &MockServer) -> DeeplProvider {
        DeeplProvider::new("test-key").unwrap().with_base_url(&server.uri())
    }

    // ========== Initialization ==========

    #[test]
    fn test_empty_key_is_config_error() {
        match DeeplProvider::new("  ") {
            Err(MtError::Config(msg)) => assert!(msg.contains("missing")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_free_tier_host() {
        assert_eq!(DeeplProvider::new("abc:fx").unwrap().base_url(), FREE_URL);
        assert_eq!(DeeplProvider::new("abc").unwrap().base_url(), PRO_URL);
    }

    #[test]
    fn test_debug_masks_key() {
        let debug = format!("{:?}", DeeplProvider::new("secret-key").unwrap());
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("***"));
    }

    // ========== Language Codes ==========

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("en"), "EN-US");
        assert_eq!(normalize_target("en_US"), "EN-US");
        assert_eq!(normalize_target("en-GB"), "EN-GB");
        assert_eq!(normalize_target("pt"), "PT-PT");
        assert_eq!(normalize_target("pt-BR"), "PT-BR");
        assert_eq!(normalize_target("fr"), "FR");
    }

    #[test]
    fn test_normalize_source() {
        assert_eq!(normalize_source("en"), "EN");
        assert_eq!(normalize_source("en_US"), "EN-US");
    }

    // ========== Requests ==========

    #[tokio::test]
    async fn test_translate_sends_normalized_codes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .and(header("Authorization", "DeepL-Auth-Key test-key"))
            .and(body_partial_json(json!({
                "text": ["Hello {name}"],
                "source_lang": "EN",
                "target_lang": "FR",
                "context": "Greeting"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"translations": [{"text": "Bonjour {nom}"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server)
            .translate("Hello {name}", "en", "fr", Some("Greeting"))
            .await
            .unwrap();
        assert_eq!(result, "Bonjour {name}");
    }

    #[tokio::test]
    async fn test_empty_text_skips_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(echo).expect(0).mount(&server).await;
        assert_eq!(provider(&server).translate("", "en", "fr", None).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_forbidden_is_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let result = provider(&server).translate("Hello", "en", "fr", None).await;
        assert!(matches!(result, Err(MtError::Config(_))));
    }

    #[tokio::test]
    async fn test_batch_partitioned_by_context() {
        let server = echo_server().await;
        let requests = vec![
            TranslationRequest::new("A.ONE", "One").with_context(Some("ctx-a".to_string())),
            TranslationRequest::new("A.TWO", "Two").with_context(Some("ctx-a".to_string())),
            TranslationRequest::new("B.ONE", "Three").with_context(Some("ctx-b".to_string())),
            TranslationRequest::new("C.ONE", "Four"),
        ];

        let results = provider(&server)
            .translate_batch(&requests, "en", "fr")
            .await
            .unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results["A.TWO"], "Two_fr");
        assert_eq!(results["C.ONE"], "Four_fr");

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_group_leaves_keys_absent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"context": "broken"})))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST")).respond_with(echo).mount(&server).await;

        let requests = vec![
            TranslationRequest::new("A.ONE", "One").with_context(Some("broken".to_string())),
            TranslationRequest::new("B.ONE", "Two"),
        ];
        let results = provider(&server)
            .translate_batch(&requests, "en", "fr")
            .await
            .unwrap();
        assert!(!results.contains_key("A.ONE"));
        assert_eq!(results["B.ONE"], "Two_fr");
    }

    #[tokio::test]
    async fn test_glossary_id_read_and_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let map = dir.path().join("map.json");
        std::fs::write(&map, r#"{"glossary_id": "first"}"#).unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"glossary_id": "first"})))
            .respond_with(echo)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"glossary_id": "second"})))
            .respond_with(echo)
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server).with_glossary_map(&map);
        provider.translate("One", "en", "fr", None).await.unwrap();

        // Cached: the file change is not picked up until invalidation
        std::fs::write(&map, r#"{"glossary_id": "second"}"#).unwrap();
        provider.translate("One", "en", "fr", None).await.unwrap();

        provider.invalidate_glossary_id();
        provider.translate("One", "en", "fr", None).await.unwrap();
    }

    // ========== Review ==========

    #[tokio::test]
    async fn test_review_compares_with_fresh_translation() {
        let server = echo_server().await;
        let provider = provider(&server);

        let verdict = provider.review("Author", "Author_fr", "en", "fr", None).await.unwrap();
        assert!(verdict.valid);

        let verdict = provider.review("Author", "Auteurs", "en", "fr", None).await.unwrap();
        assert_eq!(verdict.correction.as_deref(), Some("Author_fr"));
        assert_eq!(verdict.comment.as_deref(), Some("DeepL suggestion"));
    }

    #[tokio::test]
    async fn test_review_batch() {
        let server = echo_server().await;
        let requests = vec![
            ReviewRequest::new("A.TITLE", "Title", "Title_fr"),
            ReviewRequest::new("A.AUTHOR", "Author", "Auteurs"),
        ];
        let verdicts = provider(&server)
            .review_batch(&requests, "en", "fr")
            .await
            .unwrap();
        assert!(verdicts["A.TITLE"].valid);
        assert!(!verdicts["A.AUTHOR"].valid);
        assert_eq!(verdicts["A.AUTHOR"].correction.as_deref(), Some("Author_fr"));
    }

    #[tokio::test]
    async fn test_review_batch_failed_group_is_unjudged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"context": "broken"})))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST")).respond_with(echo).mount(&server).await;

        let requests = vec![
            ReviewRequest::new("A.AUTHOR", "Author", "Auteurs").with_context(Some("broken".to_string())),
            ReviewRequest::new("B.AUTHOR", "Author", "Auteurs"),
        ];
        let verdicts = provider(&server)
            .review_batch(&requests, "en", "fr")
            .await
            .unwrap();
        assert!(!verdicts.contains_key("A.AUTHOR"));
        assert_eq!(verdicts["B.AUTHOR"].correction.as_deref(), Some("Author_fr"));
    }

    #[tokio::test]
    #[ignore] // Requires DEEPL_API_KEY
    async fn test_live_translation() {
        let Ok(provider) = DeeplProvider::from_env() else {
            eprintln!("Skipping: DEEPL_API_KEY not set");
            return;
        };
        let result = provider.translate("Hello {name}", "en", "fr", None).await.unwrap();
        assert!(result.contains("{name}"));
    }
}
