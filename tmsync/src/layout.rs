//! Filesystem layout of a translatable module
//!
//! ```text
//! <module>/
//!   lang/
//!     en.yml
//!     fr.yml
//!     glossaries/
//!       en-fr.csv
//!       map.json
//! ```

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    name: String,
    base: PathBuf,
}

impl ModuleLayout {
    pub fn new(name: impl Into<String>, base: impl Into<PathBuf>) -> Self {
        ModuleLayout {
            name: name.into(),
            base: base.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory holding one catalog file per language
    pub fn lang_dir(&self) -> PathBuf {
        self.base.join("lang")
    }

    pub fn glossary_dir(&self) -> PathBuf {
        self.lang_dir().join("glossaries")
    }

    /// CSV term list for one language pair, e.g. `glossaries/en-fr.csv`
    pub fn glossary_file(&self, source_lang: &str, target_lang: &str) -> PathBuf {
        self.glossary_dir()
            .join(format!("{}-{}.csv", source_lang, target_lang))
    }

    /// JSON file holding the remote glossary identifier
    pub fn glossary_map(&self) -> PathBuf {
        self.glossary_dir().join("map.json")
    }
}

/// Resolves a module identifier to its layout
pub trait ModuleResolver {
    fn resolve(&self, module: &str) -> Option<ModuleLayout>;
}

/// Resolves modules as sub-directories of a project root
///
/// A module is accepted when `<root>/<module>/lang` exists. An absolute or
/// relative path that already contains a `lang/` directory is accepted as-is.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryResolver { root: root.into() }
    }
}

impl ModuleResolver for DirectoryResolver {
    fn resolve(&self, module: &str) -> Option<ModuleLayout> {
        let direct = Path::new(module);
        if direct.join("lang").is_dir() {
            let name = direct
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(module);
            return Some(ModuleLayout::new(name, direct));
        }

        let nested = self.root.join(module);
        if nested.join("lang").is_dir() {
            return Some(ModuleLayout::new(module, nested));
        }
        None
    }
}
