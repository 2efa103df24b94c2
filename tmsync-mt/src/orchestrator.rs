//! Catalog reconciliation
//!
//! [`TranslationOrchestrator`] drives one module through
//! load → diff → translate → review → merge → write, once per target
//! language. Provider failures on individual keys are logged and leave the
//! key untouched; only storage and configuration problems abort a language.

use crate::config::{ProviderConfig, RunOptions};
use crate::error::{MtError, MtResult};
use crate::guard::placeholders_match;
use crate::provider::Provider;
use crate::translator::{Reference, ReviewRequest, ReviewVerdict, TranslationRequest, Translator};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use tmsync::{
    Catalog, CatalogError, CatalogStore, CollectorFeed, Entry, Glossary, ModuleLayout,
    build_context, diff, filter, merge, prune_unused, select_for_translation,
};
use tracing::{debug, error, info, warn};

/// Outcome of reconciling one target language
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub language: String,
    /// Keys that received a provider translation
    pub translated: usize,
    /// Existing values replaced by an accepted review correction
    pub corrected: usize,
    /// Keys dropped because they left the source catalog
    pub pruned: usize,
    /// The reconciled catalog, whether or not it was written
    pub catalog: Catalog,
    pub written: bool,
}

pub struct TranslationOrchestrator<S: CatalogStore> {
    store: S,
    config: ProviderConfig,
    /// Built on first use, dropped when the configuration changes
    provider: Option<Provider>,
    glossaries: HashMap<PathBuf, Glossary>,
}

impl<S: CatalogStore> TranslationOrchestrator<S> {
    pub fn new(store: S, config: ProviderConfig) -> Self {
        TranslationOrchestrator {
            store,
            config,
            provider: None,
            glossaries: HashMap::new(),
        }
    }

    /// Use an already built provider instead of building one from config
    pub fn with_provider(store: S, provider: Provider) -> Self {
        TranslationOrchestrator {
            store,
            config: ProviderConfig::new(provider.kind()),
            provider: Some(provider),
            glossaries: HashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The provider, if one has been built
    pub fn provider(&self) -> Option<&Provider> {
        self.provider.as_ref()
    }

    /// Switch the Ollama model; the next run builds a fresh provider
    pub fn set_model(&mut self, model: Option<String>) {
        if self.config.model != model {
            self.config.model = model;
            self.invalidate_provider();
        }
    }

    pub fn set_config(&mut self, config: ProviderConfig) {
        self.config = config;
        self.invalidate_provider();
    }

    pub fn invalidate_provider(&mut self) {
        self.provider = None;
    }

    /// Forget cached glossaries so edited CSV files are read again
    pub fn invalidate_glossaries(&mut self) {
        self.glossaries.clear();
    }

    fn ensure_provider(&mut self) -> MtResult<()> {
        if self.provider.is_none() {
            self.provider = Some(Provider::from_config(&self.config)?);
        }
        Ok(())
    }

    fn glossary(&mut self, layout: &ModuleLayout, source_lang: &str, target_lang: &str) -> MtResult<Glossary> {
        let path = layout.glossary_file(source_lang, target_lang);
        if let Some(glossary) = self.glossaries.get(&path) {
            return Ok(glossary.clone());
        }
        let glossary = Glossary::load_csv(&path)?;
        if !glossary.is_empty() {
            debug!(path = %path.display(), terms = glossary.len(), "glossary loaded");
        }
        self.glossaries.insert(path, glossary.clone());
        Ok(glossary)
    }

    /// Reconcile every target language of a module
    ///
    /// Target languages default to every catalog found in the module's
    /// language directory. The source language is never a target. A failing
    /// language is logged and reported without stopping the others; invalid
    /// options or an unbuildable provider fail the whole run.
    pub async fn run(
        &mut self,
        layout: &ModuleLayout,
        options: &RunOptions,
        feed: Option<&dyn CollectorFeed>,
    ) -> MtResult<BTreeMap<String, MtResult<RunReport>>> {
        options.validate()?;
        self.ensure_provider()?;

        let languages = if options.target_langs.is_empty() {
            self.store.languages(&layout.lang_dir())?
        } else {
            options.target_langs.clone()
        };

        let mut reports = BTreeMap::new();
        for language in languages.into_iter().filter(|l| *l != options.source_lang) {
            let result = self.run_language(layout, &language, options, feed).await;
            if let Err(e) = &result {
                error!(module = layout.name(), language = %language, "reconciliation failed: {}", e);
            }
            reports.insert(language, result);
        }
        Ok(reports)
    }

    /// Reconcile a single target language
    pub async fn run_language(
        &mut self,
        layout: &ModuleLayout,
        language: &str,
        options: &RunOptions,
        feed: Option<&dyn CollectorFeed>,
    ) -> MtResult<RunReport> {
        let dir = layout.lang_dir();

        let source = if options.enrich {
            let feed = feed.ok_or_else(|| {
                MtError::Config("enrich mode needs a collector feed".to_string())
            })?;
            feed.collect(layout, &options.source_lang)?
        } else {
            self.store.read(&options.source_lang, &dir)?
        };

        if options.merge && !self.store.exists(language, &dir) {
            return Err(CatalogError::MissingCatalog {
                path: self.store.path_for(language, &dir),
            }
            .into());
        }
        let target = self.store.read(language, &dir)?;

        let reference = match options.reference_lang.as_deref() {
            Some(lang) if lang == options.source_lang => Some((lang.to_string(), source.clone())),
            Some(lang) if lang != language => Some((lang.to_string(), self.store.read(lang, &dir)?)),
            _ => None,
        };

        let glossary = if options.use_glossary {
            self.glossary(layout, &options.source_lang, language)?
        } else {
            Glossary::new()
        };

        let selected = select_for_translation(&diff(&source, &target), options.mode);
        let mut catalog = if options.merge {
            merge(&source, &target)
        } else {
            target.clone()
        };

        self.ensure_provider()?;
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| MtError::Config("no translation provider".to_string()))?;

        let mut translated = BTreeSet::new();
        if options.auto_translate && !selected.is_empty() {
            // Plural specs and empty strings are never sent; they carry over as-is
            for key in &selected {
                if let Some(entry) = source.get(key) {
                    if entry.is_plural() || entry.text().is_none_or(str::is_empty) {
                        catalog.insert(key.clone(), entry.clone());
                    }
                }
            }

            let requests = translation_requests(
                &source,
                &selected,
                &glossary,
                reference.as_ref().map(|(lang, cat)| (lang.as_str(), cat)),
                options.limit,
            );
            info!(
                module = layout.name(),
                language,
                selected = selected.len(),
                attempts = requests.len(),
                provider = provider.provider_name(),
                "translating"
            );
            let results = translate_all(
                provider,
                &requests,
                &options.source_lang,
                language,
                options.batch_size,
            )
            .await;
            for (key, text) in results {
                if let Some(entry) = source.get(&key) {
                    catalog.insert(key.clone(), entry.with_text(text));
                    translated.insert(key);
                }
            }
        }

        let mut corrected = 0;
        if options.review {
            let requests = review_requests(&source, &target, &translated);
            let corrections = review_all(
                provider,
                &requests,
                &options.source_lang,
                language,
                options.batch_size,
                options.limit,
            )
            .await;
            for (key, correction) in corrections {
                let entry = match catalog.get(&key) {
                    Some(entry) => entry.with_text(correction),
                    None => Entry::Text(correction),
                };
                catalog.insert(key, entry);
                corrected += 1;
            }
        }

        let pruned = if options.clear_unused {
            let removed = prune_unused(&mut catalog, &source.key_set());
            if !removed.is_empty() {
                debug!(language, keys = ?removed, "removed unused keys");
            }
            removed.len()
        } else {
            0
        };

        let written = if options.dry_run {
            info!(module = layout.name(), language, "dry run, not writing");
            false
        } else if catalog != target {
            self.store.write(&catalog, language, &dir)?;
            true
        } else {
            debug!(module = layout.name(), language, "catalog already up to date");
            false
        };

        info!(
            module = layout.name(),
            language,
            translated = translated.len(),
            corrected,
            pruned,
            "reconciled"
        );

        Ok(RunReport {
            language: language.to_string(),
            translated: translated.len(),
            corrected,
            pruned,
            catalog,
            written,
        })
    }
}

/// Context shown to the translator for a key
///
/// An explicit context wins. Otherwise a dotted key such as
/// `App\Model\Page.TITLE` yields `Field 'TITLE' in 'Page'`. Keys without a
/// dot get no context.
pub fn derive_context(key: &str, entry: &Entry) -> Option<String> {
    if let Some(context) = entry.context().filter(|c| !c.trim().is_empty()) {
        return Some(context.to_string());
    }
    let (namespace, _) = key.split_once('.')?;
    let field = key.rsplit('.').next().unwrap_or(key);
    let namespace = namespace.replace('\\', "/");
    let class = namespace
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(&namespace);
    Some(format!("Field '{}' in '{}'", field, class))
}

/// Requests for the selected keys, capped at `limit`
///
/// Empty strings and plural specs are never sent.
fn translation_requests(
    source: &Catalog,
    selected: &BTreeSet<String>,
    glossary: &Glossary,
    reference: Option<(&str, &Catalog)>,
    limit: usize,
) -> Vec<TranslationRequest> {
    selected
        .iter()
        .filter_map(|key| {
            let entry = source.get(key)?;
            if entry.is_plural() {
                return None;
            }
            let text = entry.text().filter(|t| !t.is_empty())?;
            Some((key, entry, text))
        })
        .take(limit)
        .map(|(key, entry, text)| {
            let context = derive_context(key, entry);
            let context = if glossary.is_empty() {
                context
            } else {
                Some(build_context(context.as_deref(), &filter(Some(text), glossary)))
            };
            let reference = reference.and_then(|(lang, catalog)| {
                catalog
                    .text(key)
                    .filter(|t| !t.is_empty())
                    .map(|t| Reference::new(t, lang))
            });
            TranslationRequest::new(key.as_str(), text)
                .with_context(context)
                .with_reference(reference)
        })
        .collect()
}

async fn translate_one(
    provider: &dyn Translator,
    request: &TranslationRequest,
    source_lang: &str,
    target_lang: &str,
) -> Option<String> {
    let context = request.context.as_deref();
    let result = match &request.reference {
        Some(reference) => {
            provider
                .translate_with_reference(&request.text, source_lang, target_lang, reference, context)
                .await
        }
        None => provider.translate(&request.text, source_lang, target_lang, context).await,
    };
    match result {
        Ok(text) if !text.is_empty() => Some(text),
        Ok(_) => {
            warn!(key = %request.key, "provider returned an empty translation");
            None
        }
        Err(e) => {
            warn!(key = %request.key, "translation failed: {}", e);
            None
        }
    }
}

/// Translate in chunks of `batch_size`
///
/// Keys missing from a batch reply are retried one by one, and a failed
/// batch falls back to single calls for all of its keys.
async fn translate_all(
    provider: &dyn Translator,
    requests: &[TranslationRequest],
    source_lang: &str,
    target_lang: &str,
    batch_size: usize,
) -> BTreeMap<String, String> {
    let mut results = BTreeMap::new();

    if batch_size <= 1 {
        for request in requests {
            if let Some(text) = translate_one(provider, request, source_lang, target_lang).await {
                results.insert(request.key.clone(), text);
            }
        }
        return results;
    }

    for chunk in requests.chunks(batch_size) {
        let batch = match provider.translate_batch(chunk, source_lang, target_lang).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(size = chunk.len(), "batch failed, translating one by one: {}", e);
                BTreeMap::new()
            }
        };
        for request in chunk {
            match batch.get(&request.key) {
                Some(text) if !text.is_empty() => {
                    results.insert(request.key.clone(), text.clone());
                }
                _ => {
                    debug!(key = %request.key, "no batch result, retrying alone");
                    if let Some(text) = translate_one(provider, request, source_lang, target_lang).await {
                        results.insert(request.key.clone(), text);
                    }
                }
            }
        }
    }
    results
}

/// Existing translations worth reviewing
///
/// Keys translated in this run are skipped, as are values still identical
/// to the source.
fn review_requests(source: &Catalog, target: &Catalog, fresh: &BTreeSet<String>) -> Vec<ReviewRequest> {
    target
        .iter()
        .filter(|(key, _)| !fresh.contains(*key))
        .filter_map(|(key, entry)| {
            let source_entry = source.get(key)?;
            let source_text = source_entry.text().filter(|t| !t.is_empty())?;
            let translation = entry.text().filter(|t| !t.is_empty())?;
            if source_text == translation {
                return None;
            }
            Some(
                ReviewRequest::new(key.as_str(), source_text, translation)
                    .with_context(derive_context(key, source_entry)),
            )
        })
        .collect()
}

/// The correction to apply, if the verdict carries an acceptable one
fn accepted_correction(request: &ReviewRequest, verdict: &ReviewVerdict) -> Option<String> {
    if verdict.valid {
        return None;
    }
    let correction = verdict.correction.as_deref()?.trim();
    if correction.is_empty() || correction == request.translation {
        return None;
    }
    if !placeholders_match(&request.source, correction) {
        debug!(
            key = %request.key,
            correction,
            "discarding correction whose placeholders differ from the source"
        );
        return None;
    }
    Some(correction.to_string())
}

async fn review_all(
    provider: &dyn Translator,
    requests: &[ReviewRequest],
    source_lang: &str,
    target_lang: &str,
    batch_size: usize,
    limit: usize,
) -> BTreeMap<String, String> {
    let mut corrections = BTreeMap::new();

    for chunk in requests.chunks(batch_size.max(1)) {
        if corrections.len() >= limit {
            break;
        }

        let mut verdicts = if batch_size > 1 {
            match provider.review_batch(chunk, source_lang, target_lang).await {
                Ok(verdicts) => verdicts,
                Err(e) => {
                    warn!(size = chunk.len(), "review batch failed, reviewing one by one: {}", e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        for request in chunk {
            if corrections.len() >= limit {
                break;
            }
            let verdict = match verdicts.remove(&request.key) {
                Some(verdict) => verdict,
                None => match provider
                    .review(
                        &request.source,
                        &request.translation,
                        source_lang,
                        target_lang,
                        request.context.as_deref(),
                    )
                    .await
                {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        warn!(key = %request.key, "review failed: {}", e);
                        continue;
                    }
                },
            };
            if let Some(correction) = accepted_correction(request, &verdict) {
                debug!(key = %request.key, from = %request.translation, to = %correction, "correction accepted");
                corrections.insert(request.key.clone(), correction);
            }
        }
    }
    corrections
}
