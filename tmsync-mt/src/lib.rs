//! Machine translation for tmsync catalogs
//!
//! This crate puts translation engines behind the [`Translator`] trait and
//! reconciles catalogs with them. Every engine output passes through the
//! placeholder guard before it lands in a catalog.
//!
//! # Workflow Example
//!
//! ```ignore
//! use tmsync::{CatalogFormat, FileCatalogStore, ModuleLayout};
//! use tmsync_mt::{ProviderConfig, ProviderKind, RunOptions, TranslationOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. Point at a module and its catalog store
//!     let layout = ModuleLayout::new("app", "./app");
//!     let store = FileCatalogStore::new(CatalogFormat::Yaml);
//!
//!     // 2. Pick a backend
//!     let config = ProviderConfig::from_env(ProviderKind::Ollama);
//!     let mut orchestrator = TranslationOrchestrator::new(store, config);
//!
//!     // 3. Fill in missing French keys
//!     let options = RunOptions {
//!         target_langs: vec!["fr".to_string()],
//!         ..Default::default()
//!     };
//!     for (language, report) in orchestrator.run(&layout, &options, None).await? {
//!         println!("{}: {} translated", language, report?.translated);
//!     }
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod deepl;
pub mod error;
pub mod guard;
pub mod mock;
pub mod ollama;
pub mod orchestrator;
pub mod provider;
pub mod translator;

pub use config::{ProviderConfig, ProviderKind, RunOptions};
pub use deepl::DeeplProvider;
pub use error::{MtError, MtResult};
pub use guard::{extract_placeholders, guard, placeholders_match, repair, sanitize};
pub use mock::{MockCall, MockMode, MockTranslator};
pub use ollama::OllamaProvider;
pub use orchestrator::{RunReport, TranslationOrchestrator, derive_context};
pub use provider::Provider;
pub use translator::{
    Reference, ReviewRequest, ReviewVerdict, TranslationRequest, Translator, normalize_locale,
    validate_locale,
};
