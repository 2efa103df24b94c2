//! Reading and writing catalog files
//!
//! Catalogs live in one file per language inside a module's `lang/`
//! directory. Two formats are supported:
//!
//! JSON, flat, with `@`-prefixed keys ignored:
//! ```json
//! {
//!     "@metadata": { ... },
//!     "Member.FIRSTNAME": "First name"
//! }
//! ```
//!
//! YAML, rooted at the language code and grouped by class:
//! ```yaml
//! en:
//!   Member:
//!     FIRSTNAME: 'First name'
//! ```

use crate::catalog::{Catalog, Entry};
use crate::error::{CatalogError, CatalogResult};
use crate::layout::ModuleLayout;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Backing store for catalogs
pub trait CatalogStore {
    /// Read the catalog for `language` from `dir`
    ///
    /// A missing file yields an empty catalog.
    fn read(&self, language: &str, dir: &Path) -> CatalogResult<Catalog>;

    /// Location of the catalog for `language` in `dir`
    fn path_for(&self, language: &str, dir: &Path) -> PathBuf;

    /// Whether a catalog file for `language` exists in `dir`
    fn exists(&self, language: &str, dir: &Path) -> bool;

    fn write(&self, catalog: &Catalog, language: &str, dir: &Path) -> CatalogResult<()>;

    /// Languages that have a catalog file in `dir`, sorted
    fn languages(&self, dir: &Path) -> CatalogResult<Vec<String>>;
}

/// Supplies a richer source catalog, with provenance, for "enrich" runs
pub trait CollectorFeed {
    fn collect(&self, module: &ModuleLayout, language: &str) -> CatalogResult<Catalog>;
}

/// A catalog collected ahead of time
impl CollectorFeed for Catalog {
    fn collect(&self, _module: &ModuleLayout, _language: &str) -> CatalogResult<Catalog> {
        Ok(self.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogFormat {
    Json,
    #[default]
    Yaml,
}

impl CatalogFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            CatalogFormat::Json => "json",
            CatalogFormat::Yaml => "yml",
        }
    }

    /// Detect format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(CatalogFormat::Json),
            "yml" | "yaml" => Some(CatalogFormat::Yaml),
            _ => None,
        }
    }
}

/// Catalog store over `<dir>/<language>.<ext>` files
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCatalogStore {
    format: CatalogFormat,
}

impl FileCatalogStore {
    pub fn new(format: CatalogFormat) -> Self {
        FileCatalogStore { format }
    }

    pub fn format(&self) -> CatalogFormat {
        self.format
    }

    fn parse_json(path: &Path, content: &str) -> CatalogResult<Catalog> {
        let json: Value =
            serde_json::from_str(content).map_err(|e| CatalogError::parse(path, e))?;
        let obj = json
            .as_object()
            .ok_or_else(|| CatalogError::parse(path, "root must be an object"))?;

        let mut catalog = Catalog::new();
        for (key, value) in obj {
            if key.starts_with('@') {
                continue;
            }
            match serde_json::from_value::<Entry>(value.clone()) {
                Ok(entry) => {
                    catalog.insert(key.clone(), entry);
                }
                Err(e) => warn!(key = %key, path = %path.display(), "skipping entry: {}", e),
            }
        }
        Ok(catalog)
    }

    fn parse_yaml(path: &Path, language: &str, content: &str) -> CatalogResult<Catalog> {
        let root: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| CatalogError::parse(path, e))?;
        if root.is_null() {
            return Ok(Catalog::new());
        }
        let root = root
            .as_mapping()
            .ok_or_else(|| CatalogError::parse(path, "root must be a mapping"))?;

        // Files are rooted at the language key; tolerate a single other root key
        let messages = match root.get(language) {
            Some(messages) => Some(messages),
            None if root.len() == 1 => root.values().next(),
            None => {
                return Err(CatalogError::parse(
                    path,
                    format!("missing root key '{}'", language),
                ));
            }
        };
        let Some(messages) = messages.and_then(|m| m.as_mapping()) else {
            return Ok(Catalog::new());
        };

        let mut catalog = Catalog::new();
        for (key, value) in messages {
            let Some(key) = key.as_str() else {
                continue;
            };
            if key.contains('.') || !value.is_mapping() {
                Self::insert_yaml_entry(&mut catalog, path, key.to_string(), value);
                continue;
            }
            // Class grouping: `Class: { FIELD: ... }` becomes `Class.FIELD`
            if let Some(group) = value.as_mapping() {
                for (field, value) in group {
                    if let Some(field) = field.as_str() {
                        Self::insert_yaml_entry(&mut catalog, path, format!("{}.{}", key, field), value);
                    }
                }
            }
        }
        Ok(catalog)
    }

    fn insert_yaml_entry(catalog: &mut Catalog, path: &Path, key: String, value: &serde_yaml::Value) {
        match serde_yaml::from_value::<Entry>(value.clone()) {
            Ok(entry) => {
                catalog.insert(key, entry);
            }
            Err(e) => warn!(key = %key, path = %path.display(), "skipping entry: {}", e),
        }
    }

    fn render_json(catalog: &Catalog) -> CatalogResult<String> {
        serde_json::to_string_pretty(catalog)
            .map(|s| s + "\n")
            .map_err(|e| CatalogError::parse(PathBuf::new(), e))
    }

    fn render_yaml(catalog: &Catalog, language: &str) -> CatalogResult<String> {
        use serde_yaml::{Mapping, Value as Yaml};

        let to_yaml = |entry: &Entry| {
            serde_yaml::to_value(entry).map_err(|e| CatalogError::parse(PathBuf::new(), e))
        };

        // A class that is also a plain key cannot become a group; its
        // dotted keys stay flat
        let plain: BTreeSet<&str> = catalog
            .keys()
            .filter(|key| !key.contains('.'))
            .map(String::as_str)
            .collect();

        let mut messages = Mapping::new();
        for (key, entry) in catalog.iter() {
            match key.split_once('.') {
                Some((class, field)) if !plain.contains(class) => {
                    let group = messages
                        .entry(Yaml::String(class.to_string()))
                        .or_insert_with(|| Yaml::Mapping(Mapping::new()));
                    if let Yaml::Mapping(group) = group {
                        group.insert(Yaml::String(field.to_string()), to_yaml(entry)?);
                    }
                }
                _ => {
                    messages.insert(Yaml::String(key.clone()), to_yaml(entry)?);
                }
            }
        }

        let mut root = Mapping::new();
        root.insert(Yaml::String(language.to_string()), Yaml::Mapping(messages));
        serde_yaml::to_string(&Yaml::Mapping(root)).map_err(|e| CatalogError::parse(PathBuf::new(), e))
    }
}

impl CatalogStore for FileCatalogStore {
    fn read(&self, language: &str, dir: &Path) -> CatalogResult<Catalog> {
        let path = self.path_for(language, dir);
        if !path.is_file() {
            debug!(path = %path.display(), "no catalog file, using an empty catalog");
            return Ok(Catalog::new());
        }

        let content = fs::read_to_string(&path).map_err(|e| CatalogError::io(&path, e))?;
        match self.format {
            CatalogFormat::Json => Self::parse_json(&path, &content),
            CatalogFormat::Yaml => Self::parse_yaml(&path, language, &content),
        }
    }

    fn path_for(&self, language: &str, dir: &Path) -> PathBuf {
        dir.join(format!("{}.{}", language, self.format.extension()))
    }

    fn exists(&self, language: &str, dir: &Path) -> bool {
        self.path_for(language, dir).is_file()
    }

    fn write(&self, catalog: &Catalog, language: &str, dir: &Path) -> CatalogResult<()> {
        let path = self.path_for(language, dir);
        let flattened = catalog.flattened();
        let content = match self.format {
            CatalogFormat::Json => Self::render_json(&flattened)?,
            CatalogFormat::Yaml => Self::render_yaml(&flattened, language)?,
        };

        fs::create_dir_all(dir).map_err(|e| CatalogError::io(dir, e))?;
        fs::write(&path, content).map_err(|e| CatalogError::io(&path, e))?;
        debug!(path = %path.display(), entries = catalog.len(), "catalog written");
        Ok(())
    }

    fn languages(&self, dir: &Path) -> CatalogResult<Vec<String>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut languages = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| CatalogError::io(dir, e))? {
            let path = entry.map_err(|e| CatalogError::io(dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            let extension = path.extension().and_then(|ext| ext.to_str());
            let stem = path.file_stem().and_then(|stem| stem.to_str());
            if let (Some(extension), Some(stem)) = (extension, stem) {
                if extension == self.format.extension() {
                    languages.push(stem.to_string());
                }
            }
        }
        languages.sort();
        Ok(languages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntrySpec;

    #[test]
    fn test_missing_file_is_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCatalogStore::new(CatalogFormat::Yaml);
        let catalog = store.read("fr", dir.path()).unwrap();
        assert!(catalog.is_empty());
        assert!(!store.exists("fr", dir.path()));
    }

    #[test]
    fn test_read_flat_yaml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("en.yml"),
            "en:\n  Entity.STILL_THERE: 'Value'\n  Entity.REMOVED: 'Old Value'\n",
        )
        .unwrap();

        let store = FileCatalogStore::new(CatalogFormat::Yaml);
        let catalog = store.read("en", dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.text("Entity.REMOVED"), Some("Old Value"));
    }

    #[test]
    fn test_read_grouped_yaml_with_plural() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("en.yml"),
            "en:\n  Member:\n    FIRSTNAME: 'First name'\n    ITEMS:\n      one: 'One item'\n      other: '{count} items'\n",
        )
        .unwrap();

        let store = FileCatalogStore::new(CatalogFormat::Yaml);
        let catalog = store.read("en", dir.path()).unwrap();
        assert_eq!(catalog.text("Member.FIRSTNAME"), Some("First name"));
        assert!(catalog.get("Member.ITEMS").unwrap().is_plural());
    }

    #[test]
    fn test_yaml_roundtrip_groups_by_class() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCatalogStore::new(CatalogFormat::Yaml);

        let mut catalog = Catalog::new();
        catalog
            .with_entry("Member.FIRSTNAME", "Prénom")
            .with_entry("Member.ITEMS", Entry::plural([("one", "Un"), ("other", "{count}")]))
            .with_entry("Global.SAVE", "Enregistrer");
        store.write(&catalog, "fr", dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join("fr.yml")).unwrap();
        assert!(content.starts_with("fr:"));
        assert!(content.contains("Member:"));

        let reloaded = store.read("fr", dir.path()).unwrap();
        assert_eq!(reloaded, catalog);
    }

    #[test]
    fn test_yaml_roundtrip_plain_key_shadowing_class() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCatalogStore::new(CatalogFormat::Yaml);

        let mut catalog = Catalog::new();
        catalog
            .with_entry("Page", "Page")
            .with_entry("Page.TITLE", "Titre")
            .with_entry("Member.NAME", "Nom");
        store.write(&catalog, "fr", dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join("fr.yml")).unwrap();
        assert!(content.contains("Page.TITLE:"));
        assert!(content.contains("Member:"));

        let reloaded = store.read("fr", dir.path()).unwrap();
        assert_eq!(reloaded, catalog);
    }

    #[test]
    fn test_json_skips_metadata() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("fr.json"),
            r#"{"@metadata": {"authors": ["x"]}, "Page.TITLE": "Titre"}"#,
        )
        .unwrap();

        let store = FileCatalogStore::new(CatalogFormat::Json);
        let catalog = store.read("fr", dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.text("Page.TITLE"), Some("Titre"));
    }

    #[test]
    fn test_write_flattens_rich_specs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCatalogStore::new(CatalogFormat::Json);

        let mut catalog = Catalog::new();
        catalog.with_entry(
            "MyClass.MY_KEY",
            Entry::Spec(EntrySpec {
                default: Some("Original String".to_string()),
                file: Some("templates/Page.ss".to_string()),
                ..EntrySpec::default()
            }),
        );
        store.write(&catalog, "en", dir.path()).unwrap();

        let reloaded = store.read("en", dir.path()).unwrap();
        assert_eq!(reloaded.get("MyClass.MY_KEY"), Some(&Entry::from("Original String")));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fr.json"), "[1, 2]").unwrap();

        let store = FileCatalogStore::new(CatalogFormat::Json);
        match store.read("fr", dir.path()) {
            Err(CatalogError::Parse { message, .. }) => assert!(message.contains("object")),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_languages_lists_catalog_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["fr.yml", "en.yml", "nl.json", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("glossaries")).unwrap();

        let store = FileCatalogStore::new(CatalogFormat::Yaml);
        assert_eq!(store.languages(dir.path()).unwrap(), vec!["en", "fr"]);
        assert!(store.languages(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(CatalogFormat::from_extension("YML"), Some(CatalogFormat::Yaml));
        assert_eq!(CatalogFormat::from_extension("json"), Some(CatalogFormat::Json));
        assert_eq!(CatalogFormat::from_extension("po"), None);
    }
}
