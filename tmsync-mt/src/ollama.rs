//! Ollama provider
//!
//! Drives a locally hosted LLM through Ollama's `/api/generate` endpoint.
//! Every operation is a single non-streaming prompt; batches use the
//! numbered-line protocol from [`crate::batch`].
//!
//! # Example
//!
//! ```ignore
//! use tmsync_mt::{OllamaProvider, Translator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OllamaProvider::new(Some("translategemma:4b"), None)?;
//!     let result = provider.translate("Hello {name}", "en", "fr", None).await?;
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```

use crate::batch::{numbered_line, parse_numbered_lines, truncate_context};
use crate::error::{MtError, MtResult};
use crate::guard::guard;
use crate::translator::{
    Reference, ReviewRequest, ReviewVerdict, TranslationRequest, Translator, normalize_locale,
    validate_locale,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Language names the prompts use, keyed by ISO 639-1 code
const LANGUAGES: [(&str, &str); 9] = [
    ("en", "English"),
    ("fr", "French"),
    ("nl", "Dutch"),
    ("it", "Italian"),
    ("de", "German"),
    ("pt", "Portuguese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
    ("ru", "Russian"),
];

/// English name of a language code; unknown codes are returned as given
pub fn language_name(lang: &str) -> String {
    let lc = lang.to_lowercase();
    let base = normalize_locale(&lc);
    LANGUAGES
        .iter()
        .find(|(code, _)| *code == lc)
        .or_else(|| LANGUAGES.iter().find(|(code, _)| *code == base))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| lang.to_string())
}

/// Language code for either a code or an English language name
pub fn language_code(lang: &str) -> String {
    LANGUAGES
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(lang))
        .map(|(code, _)| code.to_string())
        .unwrap_or_else(|| lang.to_string())
}

/// Case-insensitive ASCII prefix strip
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &text[prefix.len()..])
}

/// Interpret a `VALID` / `INVALID: correction` reply
fn parse_verdict(reply: &str, keep_comment: bool) -> ReviewVerdict {
    let reply = reply.trim();
    if let Some(rest) = strip_prefix_ci(reply, "VALID") {
        let comment = keep_comment.then(|| rest.trim().to_string());
        return ReviewVerdict::valid().with_comment(comment);
    }
    // A model that ignores the format still gets its answer used as correction
    let correction = strip_prefix_ci(reply, "INVALID:").unwrap_or(reply).trim();
    ReviewVerdict::invalid(correction)
}

/// Ollama `/api/generate` provider
#[derive(Clone)]
pub struct OllamaProvider {
    model: String,
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
    name: String,
}

impl OllamaProvider {
    pub const DEFAULT_URL: &'static str = "http://localhost:11434";
    pub const DEFAULT_MODEL: &'static str = "translategemma:4b";

    /// Local generation is slow on modest hardware, batches included
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Maximum context length in a single-string prompt
    const CONTEXT_WIDTH: usize = 200;

    pub fn new(model: Option<&str>, url: Option<&str>) -> MtResult<Self> {
        Self::with_settings(model, url, Self::DEFAULT_TIMEOUT, 1)
    }

    /// Create a provider with an explicit request timeout and retry budget
    ///
    /// Only requests that fail before a response arrives are retried.
    pub fn with_settings(
        model: Option<&str>,
        url: Option<&str>,
        timeout: Duration,
        max_retries: u32,
    ) -> MtResult<Self> {
        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(Self::DEFAULT_MODEL)
            .to_string();
        let base_url = url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(Self::DEFAULT_URL)
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MtError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: format!("Ollama ({})", model),
            model,
            base_url,
            client,
            max_retries,
        })
    }

    /// Create a provider from `OLLAMA_MODEL` and `OLLAMA_URL`, falling back
    /// to the defaults when unset
    pub fn from_env() -> MtResult<Self> {
        let model = std::env::var("OLLAMA_MODEL").ok();
        let url = std::env::var("OLLAMA_URL").ok();
        Self::new(model.as_deref(), url.as_deref())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one prompt and return the model's raw answer
    async fn generate(&self, prompt: &str) -> MtResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let mut attempt = 0;
        let response = loop {
            match self.client.post(&url).json(&body).send().await {
                Ok(response) => break response,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, "Ollama request failed, retrying: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        };

        let status = response.status();
        let json: Value = response
            .json()
            .await
            .map_err(|e| MtError::Provider(format!("Failed to decode json ({}): {}", status, e)))?;

        if let Some(error) = json.get("error") {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(MtError::Provider(format!("Ollama error: {}", message)));
        }
        if !status.is_success() {
            return Err(MtError::Provider(format!("Ollama returned {}", status)));
        }

        json.get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                MtError::Provider("Invalid Ollama response: missing 'response' field".to_string())
            })
    }

    /// `English (en)` style label for prompts
    fn label(lang: &str) -> (String, String) {
        (language_name(lang), language_code(lang))
    }

    fn translation_prompt(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
        reference: Option<&Reference>,
        context: Option<&str>,
    ) -> String {
        let (from_name, from_code) = Self::label(source_locale);
        let (to_name, to_code) = Self::label(target_locale);

        let mut prompt = format!(
            "You are a professional {from_name} ({from_code}) to {to_name} ({to_code}) translator. \
             Your goal is to accurately convey the meaning and nuances of the original {from_name} text \
             while adhering to {to_name} grammar, vocabulary, and cultural sensitivities."
        );
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            prompt.push_str(&format!(
                "\nContext: {}",
                truncate_context(context, Self::CONTEXT_WIDTH)
            ));
        }
        if let Some(reference) = reference.filter(|r| !r.text.is_empty()) {
            let (ref_name, ref_code) = Self::label(&reference.language);
            prompt.push_str(&format!(
                "\nUse the existing {ref_name} ({ref_code}) translation as a reference: \"{}\".",
                reference.text
            ));
        }
        prompt.push_str(&format!(
            "\nProduce only the {to_name} translation, without any additional explanations or commentary. \
             Please translate the following {from_name} text into {to_name}:\n\n\n{text}"
        ));
        prompt
    }

    async fn translate_one(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
        reference: Option<&Reference>,
        context: Option<&str>,
    ) -> MtResult<String> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        if text.is_empty() {
            return Ok(String::new());
        }

        let prompt = self.translation_prompt(text, source_locale, target_locale, reference, context);
        let response = self.generate(&prompt).await?;
        Ok(guard(text, &response))
    }
}

impl std::fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[async_trait]
impl Translator for OllamaProvider {
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
        context: Option<&str>,
    ) -> MtResult<String> {
        self.translate_one(text, source_locale, target_locale, None, context)
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
        self.translate_one(text, source_locale, target_locale, Some(reference), context)
            .await
    }

    async fn translate_batch(
        &self,
        requests: &[TranslationRequest],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<BTreeMap<String, String>> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        let mut results = BTreeMap::new();
        let pending: Vec<&TranslationRequest> = requests
            .iter()
            .filter(|request| {
                if request.text.is_empty() {
                    results.insert(request.key.clone(), String::new());
                    false
                } else {
                    true
                }
            })
            .collect();
        if pending.is_empty() {
            return Ok(results);
        }

        let (from_name, from_code) = Self::label(source_locale);
        let (to_name, to_code) = Self::label(target_locale);
        let mut prompt = format!(
            "You are a professional {from_name} ({from_code}) to {to_name} ({to_code}) translator.\n\
             Translate each numbered line below. Return ONLY the translations, one per line, \
             prefixed with the same number. Do not add any explanations.\n\n"
        );
        for (i, request) in pending.iter().enumerate() {
            prompt.push_str(&numbered_line(i + 1, &request.text, request.context.as_deref()));
            prompt.push('\n');
        }

        let response = self.generate(&prompt).await?;
        let parsed = parse_numbered_lines(&response, pending.len());
        debug!(
            requested = pending.len(),
            received = parsed.len(),
            "Ollama batch translated"
        );

        for (index, translated) in parsed {
            let request = pending[index];
            results.insert(request.key.clone(), guard(&request.text, &translated));
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
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        let from_name = language_name(source_locale);
        let to_name = language_name(target_locale);

        let mut prompt = String::from(
            "You are a professional translation reviewer.\n\
             Task: Check if the translation is correct.\n\n\
             Example 1:\n\
             Source (English): Hello\n\
             Translation (French): Bonjour\n\
             Response: VALID\n\n\
             Example 2:\n\
             Source (English): Goodbye\n\
             Translation (French): Bonjour\n\
             Response: INVALID: Au revoir\n\n\
             Example 3:\n\
             Source (English): Title\n\
             Translation (French): Nom\n\
             Response: INVALID: Titre\n\n\
             Now review the following:\n",
        );
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            prompt.push_str(&format!(
                "Context: {}\n",
                truncate_context(context, Self::CONTEXT_WIDTH)
            ));
        }
        prompt.push_str(&format!(
            "Source ({from_name}): {source_text}\nTranslation ({to_name}): {translation}\nResponse:"
        ));

        let response = self.generate(&prompt).await?;
        Ok(parse_verdict(&response, true))
    }

    async fn review_batch(
        &self,
        requests: &[ReviewRequest],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<BTreeMap<String, ReviewVerdict>> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        if requests.is_empty() {
            return Ok(BTreeMap::new());
        }

        let from_name = language_name(source_locale);
        let to_name = language_name(target_locale);
        let mut prompt = String::from(
            "You are a professional translation reviewer.\n\
             For each numbered entry, respond with the same number followed by VALID or INVALID: correction.\n\n\
             Example responses:\n\
             1. VALID\n\
             2. INVALID: Au revoir\n\n\
             Entries to review:\n",
        );
        for (i, request) in requests.iter().enumerate() {
            let payload = format!(
                "Source ({from_name}): {} | Translation ({to_name}): {}",
                request.source, request.translation
            );
            prompt.push_str(&numbered_line(i + 1, &payload, request.context.as_deref()));
            prompt.push('\n');
        }

        let response = self.generate(&prompt).await?;
        Ok(parse_numbered_lines(&response, requests.len())
            .into_iter()
            .map(|(index, verdict)| (requests[index].key.clone(), parse_verdict(&verdict, false)))
            .collect())
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
