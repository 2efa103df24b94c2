//! Glossaries: mandatory term substitutions for one language pair
//!
//! A glossary is stored as a two-column CSV file per language pair
//! (`lang/glossaries/en-fr.csv`). At translation time it is filtered down to
//! the terms that actually occur in the source text and appended to the
//! translator context as a hard constraint.

use crate::catalog::{Catalog, Entry};
use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Instruction placed in front of the serialized glossary
pub const GLOSSARY_PREAMBLE: &str = "IMPORTANT: The following JSON contains mandatory translations (case insensitive). You MUST use these values:";

/// Source term → mandatory target term
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Glossary(pub BTreeMap<String, String>);

impl Glossary {
    pub fn new() -> Self {
        Glossary(BTreeMap::new())
    }

    pub fn with_term(&mut self, term: &str, translation: &str) -> &mut Self {
        self.0.insert(term.to_owned(), translation.to_owned());
        self
    }

    pub fn get(&self, term: &str) -> Option<&String> {
        self.0.get(term)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Load a two-column CSV glossary
    ///
    /// A missing file is an empty glossary. Rows with fewer than two columns
    /// or a blank cell are skipped; cells are trimmed.
    pub fn load_csv(path: &Path) -> CatalogResult<Glossary> {
        if !path.is_file() {
            return Ok(Glossary::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| CatalogError::parse(path, e))?;

        let mut glossary = Glossary::new();
        for record in reader.records() {
            let record = record.map_err(|e| CatalogError::parse(path, e))?;
            match (record.get(0), record.get(1)) {
                (Some(term), Some(translation)) if !term.is_empty() && !translation.is_empty() => {
                    glossary.with_term(term, translation);
                }
                _ => continue,
            }
        }
        debug!(path = %path.display(), terms = glossary.len(), "glossary loaded");
        Ok(glossary)
    }

    pub fn write_csv(&self, path: &Path) -> CatalogResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| CatalogError::parse(path, e))?;
        for (term, translation) in &self.0 {
            writer
                .write_record([term, translation])
                .map_err(|e| CatalogError::parse(path, e))?;
        }
        writer.flush().map_err(|e| CatalogError::io(path, e))
    }
}

/// Terms of `glossary` that occur, case-insensitively, in `source_text`
///
/// Without a source text the whole glossary applies.
pub fn filter(source_text: Option<&str>, glossary: &Glossary) -> Glossary {
    let Some(source_text) = source_text else {
        return glossary.clone();
    };
    let haystack = source_text.to_lowercase();
    Glossary(
        glossary
            .0
            .iter()
            .filter(|(term, _)| haystack.contains(&term.to_lowercase()))
            .map(|(term, translation)| (term.clone(), translation.clone()))
            .collect(),
    )
}

/// Append a (pre-filtered) glossary directive to a translator context
pub fn build_context(base_context: Option<&str>, glossary: &Glossary) -> String {
    let base = base_context.unwrap_or_default();
    if glossary.is_empty() {
        return base.to_string();
    }

    let mut context = if base.is_empty() {
        String::new()
    } else {
        format!("{}. ", base)
    };
    context.push_str(GLOSSARY_PREAMBLE);
    context.push('\n');
    // A BTreeMap<String, String> always serializes
    context.push_str(&serde_json::to_string(&glossary.0).unwrap_or_default());
    context.trim_end().to_string()
}

/// Split a context built by [`build_context`] into its free-text part and
/// the glossary directive, so callers can shorten one without the other
pub fn split_context(context: &str) -> (&str, Option<&str>) {
    match context.find(GLOSSARY_PREAMBLE) {
        Some(idx) => {
            let base = context[..idx].trim_end().trim_end_matches('.');
            (base, Some(&context[idx..]))
        }
        None => (context, None),
    }
}

/// Read the remote glossary identifier from a `map.json` file
pub fn read_glossary_id(path: &Path) -> CatalogResult<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
    let map: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| CatalogError::parse(path, e))?;
    Ok(map
        .get("glossary_id")
        .and_then(|id| id.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string))
}

/// Glossary candidates mined from existing translations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlossaryCandidates {
    pub glossary: Glossary,
    /// Lower-cased source terms seen with more than one translation
    pub conflicts: BTreeSet<String>,
}

/// Collect single-word translations as glossary candidates
///
/// Only plain string entries where neither side contains a space and the
/// source is at least `min_length` characters long qualify. Source terms are
/// lower-cased; when a term maps to different translations the first one is
/// kept and the term is reported as a conflict.
pub fn generate_candidates(source: &Catalog, target: &Catalog, min_length: usize) -> GlossaryCandidates {
    let mut candidates = GlossaryCandidates::default();

    for (key, source_entry) in source.iter() {
        let (Entry::Text(source_text), Some(Entry::Text(target_text))) =
            (source_entry, target.get(key))
        else {
            continue;
        };
        if target_text.is_empty() || source_text.contains(' ') || target_text.contains(' ') {
            continue;
        }
        if source_text.chars().count() < min_length {
            continue;
        }

        let normalized = source_text.to_lowercase();
        match candidates.glossary.get(&normalized) {
            Some(existing) if existing != target_text => {
                candidates.conflicts.insert(normalized);
            }
            Some(_) => {}
            None => {
                candidates.glossary.with_term(&normalized, target_text);
            }
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glossary() -> Glossary {
        let mut glossary = Glossary::new();
        glossary
            .with_term("Member", "Membre")
            .with_term("Dashboard", "Tableau de bord");
        glossary
    }

    #[test]
    fn test_filter_case_insensitive() {
        let filtered = filter(Some("Edit member details"), &glossary());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("Member").map(String::as_str), Some("Membre"));
    }

    #[test]
    fn test_filter_without_source_keeps_everything() {
        assert_eq!(filter(None, &glossary()), glossary());
    }

    #[test]
    fn test_filter_no_match() {
        assert!(filter(Some("Nothing relevant"), &glossary()).is_empty());
    }

    #[test]
    fn test_build_context_empty_glossary() {
        assert_eq!(build_context(Some("Field 'NAME'"), &Glossary::new()), "Field 'NAME'");
        assert_eq!(build_context(None, &Glossary::new()), "");
    }

    #[test]
    fn test_build_context_appends_directive() {
        let filtered = filter(Some("Member"), &glossary());
        let context = build_context(Some("Field 'NAME' in 'Member'"), &filtered);
        assert_eq!(
            context,
            format!(
                "Field 'NAME' in 'Member'. {}\n{{\"Member\":\"Membre\"}}",
                GLOSSARY_PREAMBLE
            )
        );
    }

    #[test]
    fn test_build_context_without_base() {
        let filtered = filter(Some("Member"), &glossary());
        let context = build_context(None, &filtered);
        assert!(context.starts_with(GLOSSARY_PREAMBLE));
        assert!(context.ends_with("{\"Member\":\"Membre\"}"));
    }

    #[test]
    fn test_split_context() {
        let filtered = filter(Some("Member"), &glossary());
        let context = build_context(Some("Field 'NAME'"), &filtered);
        let (base, directive) = split_context(&context);
        assert_eq!(base, "Field 'NAME'");
        assert!(directive.unwrap().starts_with(GLOSSARY_PREAMBLE));

        assert_eq!(split_context("plain"), ("plain", None));
    }

    #[test]
    fn test_load_csv_with_quoted_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("en-fr.csv");
        fs::write(&path, "Word,Mot\nPhrase,\"Long, phrase\"\nLonely\n , \n").unwrap();

        let glossary = Glossary::load_csv(&path).unwrap();
        assert_eq!(glossary.len(), 2);
        assert_eq!(glossary.get("Word").map(String::as_str), Some("Mot"));
        assert_eq!(glossary.get("Phrase").map(String::as_str), Some("Long, phrase"));
    }

    #[test]
    fn test_load_missing_csv() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Glossary::load_csv(&dir.path().join("none.csv")).unwrap().is_empty());
    }

    #[test]
    fn test_csv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glossaries/en-fr.csv");
        glossary().write_csv(&path).unwrap();
        assert_eq!(Glossary::load_csv(&path).unwrap(), glossary());
    }

    #[test]
    fn test_read_glossary_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        assert_eq!(read_glossary_id(&path).unwrap(), None);

        fs::write(&path, r#"{"glossary_id": "abc-123", "name": "Site glossary"}"#).unwrap();
        assert_eq!(read_glossary_id(&path).unwrap(), Some("abc-123".to_string()));
    }

    #[test]
    fn test_generate_candidates() {
        let mut source = Catalog::new();
        source
            .with_entry("Word", "Word")
            .with_entry("Phrase", "Longer phrase")
            .with_entry("Short", "S")
            .with_entry("Conflict", "Conflict");
        let mut target = Catalog::new();
        target
            .with_entry("Word", "Mot")
            .with_entry("Phrase", "Une phrase plus longue")
            .with_entry("Short", "Petit")
            .with_entry("Conflict", "Conflit");

        let candidates = generate_candidates(&source, &target, 3);
        assert_eq!(candidates.glossary.get("word").map(String::as_str), Some("Mot"));
        assert_eq!(candidates.glossary.get("conflict").map(String::as_str), Some("Conflit"));
        assert!(candidates.glossary.get("longer phrase").is_none());
        assert!(candidates.glossary.get("s").is_none());
        assert!(candidates.conflicts.is_empty());
    }

    #[test]
    fn test_generate_candidates_reports_conflicts() {
        let mut source = Catalog::new();
        source.with_entry("A.SAVE", "Save").with_entry("B.SAVE", "save");
        let mut target = Catalog::new();
        target.with_entry("A.SAVE", "Enregistrer").with_entry("B.SAVE", "Sauver");

        let candidates = generate_candidates(&source, &target, 3);
        assert_eq!(candidates.glossary.get("save").map(String::as_str), Some("Enregistrer"));
        assert!(candidates.conflicts.contains("save"));
    }
}
