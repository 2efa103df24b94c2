//! Provider and run configuration
//!
//! Both structs deserialize from any serde format with every field
//! optional, and can be filled from the environment or the command line.

use crate::error::{MtError, MtResult};
use crate::translator::validate_locale;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tmsync::SelectionMode;

/// Which translation backend to use
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    Deepl,
    Mock,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::Deepl => write!(f, "deepl"),
            ProviderKind::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Ollama model name
    pub model: Option<String>,
    /// Ollama base URL
    pub url: Option<String>,
    /// DeepL API host override; the host is otherwise picked from the key
    pub deepl_url: Option<String>,
    /// DeepL API key
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// `map.json` holding a DeepL glossary identifier
    pub glossary_map: Option<PathBuf>,
    /// Request timeout in seconds; provider default when unset
    pub timeout_secs: Option<u64>,
    /// Retries for requests that fail before a response arrives
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            kind: ProviderKind::default(),
            model: None,
            url: None,
            deepl_url: None,
            api_key: None,
            glossary_map: None,
            timeout_secs: None,
            max_retries: 1,
        }
    }
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        ProviderConfig {
            kind,
            ..Default::default()
        }
    }

    /// Fill unset fields from `DEEPL_API_KEY`, `DEEPL_URL`, `OLLAMA_MODEL`
    /// and `OLLAMA_URL`
    pub fn from_env(kind: ProviderKind) -> Self {
        ProviderConfig::new(kind).with_env()
    }

    pub fn with_env(mut self) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        self.api_key = self.api_key.or_else(|| var("DEEPL_API_KEY"));
        self.deepl_url = self.deepl_url.or_else(|| var("DEEPL_URL"));
        self.model = self.model.or_else(|| var("OLLAMA_MODEL"));
        self.url = self.url.or_else(|| var("OLLAMA_URL"));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("url", &self.url)
            .field("deepl_url", &self.deepl_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("glossary_map", &self.glossary_map)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Options for one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub source_lang: String,
    /// Languages to reconcile; empty means every catalog found next to the source
    pub target_langs: Vec<String>,
    pub mode: SelectionMode,
    pub auto_translate: bool,
    pub review: bool,
    /// Drop target keys that are no longer in the source (`Global.*` excepted)
    pub clear_unused: bool,
    /// Start from the source catalog overridden by existing translations;
    /// requires the target catalog to exist
    pub merge: bool,
    /// Take the source catalog from the collector feed instead of the store
    pub enrich: bool,
    pub use_glossary: bool,
    /// Language whose existing value is passed as a reference on single calls
    pub reference_lang: Option<String>,
    pub batch_size: usize,
    /// Cap on translation attempts and on applied corrections, per language
    pub limit: usize,
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            source_lang: "en".to_string(),
            target_langs: Vec::new(),
            mode: SelectionMode::New,
            auto_translate: true,
            review: false,
            clear_unused: false,
            merge: false,
            enrich: false,
            use_glossary: true,
            reference_lang: None,
            batch_size: 15,
            limit: 1000,
            dry_run: false,
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> MtResult<()> {
        validate_locale(&self.source_lang)?;
        for lang in &self.target_langs {
            validate_locale(lang)?;
        }
        if let Some(reference) = &self.reference_lang {
            validate_locale(reference)?;
        }
        if self.batch_size == 0 {
            return Err(MtError::Config("batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}
