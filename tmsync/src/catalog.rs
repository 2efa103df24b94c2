//! Catalog data model
//!
//! A catalog maps dotted string ids (`Class.FIELD`) to entries. An entry is
//! either a plain string or a structured spec carrying a `default` text,
//! optional provenance metadata, and plural forms.
//!
//! ```ignore
//! let mut catalog = Catalog::new();
//! catalog
//!     .with_entry("Member.FIRSTNAME", "First name")
//!     .with_entry("Member.EMAIL", Entry::spec("Email", Some("Login field")));
//! assert_eq!(catalog.text("Member.FIRSTNAME"), Some("First name"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// CLDR plural category names that may appear in a plural spec
pub const PLURAL_FORMS: [&str; 6] = ["zero", "one", "two", "few", "many", "other"];

/// Spec keys that only carry provenance and are dropped when flattening
const PROVENANCE_KEYS: [&str; 1] = ["module"];

/// Structured catalog value
///
/// `forms` collects every key that is not `default`, `context` or `file`,
/// which is where plural forms (`one`, `other`, ...) end up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(flatten)]
    pub forms: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Text(String),
    Spec(EntrySpec),
}

impl Entry {
    /// Build a structured entry with a default text and an optional context
    pub fn spec(default: &str, context: Option<&str>) -> Self {
        Entry::Spec(EntrySpec {
            default: Some(default.to_string()),
            context: context.map(str::to_string),
            ..EntrySpec::default()
        })
    }

    /// Build a plural spec from `(category, text)` pairs
    pub fn plural<'a>(forms: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Entry::Spec(EntrySpec {
            forms: forms
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..EntrySpec::default()
        })
    }

    /// The translatable scalar text of this entry, if it has one
    ///
    /// Plural specs have no scalar text and return `None`.
    pub fn text(&self) -> Option<&str> {
        match self {
            Entry::Text(text) => Some(text),
            Entry::Spec(spec) => spec.default.as_deref(),
        }
    }

    /// Explicit translator context carried by a structured entry
    pub fn context(&self) -> Option<&str> {
        match self {
            Entry::Text(_) => None,
            Entry::Spec(spec) => spec.context.as_deref().filter(|c| !c.is_empty()),
        }
    }

    pub fn is_plural(&self) -> bool {
        match self {
            Entry::Text(_) => false,
            Entry::Spec(spec) => {
                spec.default.is_none() && spec.forms.keys().any(|k| PLURAL_FORMS.contains(&k.as_str()))
            }
        }
    }

    /// Replace the scalar text, keeping any metadata untouched
    ///
    /// Plural specs are returned unchanged.
    pub fn with_text(&self, text: impl Into<String>) -> Entry {
        match self {
            Entry::Text(_) => Entry::Text(text.into()),
            Entry::Spec(spec) if spec.default.is_some() => {
                let mut spec = spec.clone();
                spec.default = Some(text.into());
                Entry::Spec(spec)
            }
            Entry::Spec(_) => self.clone(),
        }
    }

    /// Strip collection metadata before the entry is written out
    ///
    /// A spec whose only content is a `default` (plus `context`/`file`
    /// provenance) collapses to a plain string. Plural specs are kept, minus
    /// provenance.
    pub fn flatten(&self) -> Entry {
        match self {
            Entry::Text(_) => self.clone(),
            Entry::Spec(spec) => {
                let forms: BTreeMap<String, String> = spec
                    .forms
                    .iter()
                    .filter(|(k, _)| !PROVENANCE_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();

                match &spec.default {
                    Some(default) if forms.is_empty() => Entry::Text(default.clone()),
                    default => Entry::Spec(EntrySpec {
                        default: default.clone(),
                        context: None,
                        file: None,
                        forms,
                    }),
                }
            }
        }
    }
}

impl From<&str> for Entry {
    fn from(text: &str) -> Self {
        Entry::Text(text.to_string())
    }
}

impl From<String> for Entry {
    fn from(text: String) -> Self {
        Entry::Text(text)
    }
}

/// All entries of one module in one language, ordered by key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog(pub BTreeMap<String, Entry>);

impl Catalog {
    pub fn new() -> Self {
        Catalog(BTreeMap::new())
    }

    pub fn with_entry(&mut self, key: &str, entry: impl Into<Entry>) -> &mut Self {
        self.0.insert(key.to_owned(), entry.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: impl Into<Entry>) -> Option<Entry> {
        self.0.insert(key.into(), entry.into())
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.0.get(key)
    }

    /// Scalar text for `key`, if present and not a plural spec
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Entry::text)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn key_set(&self) -> BTreeSet<String> {
        self.0.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn retain(&mut self, f: impl FnMut(&String, &mut Entry) -> bool) {
        self.0.retain(f)
    }

    /// Copy of this catalog with every entry flattened for writing
    pub fn flattened(&self) -> Catalog {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.flatten()))
            .collect()
    }
}

impl FromIterator<(String, Entry)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (String, Entry)>>(iter: I) -> Self {
        Catalog(iter.into_iter().collect())
    }
}

impl IntoIterator for Catalog {
    type Item = (String, Entry);
    type IntoIter = std::collections::btree_map::IntoIter<String, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Extend<(String, Entry)> for Catalog {
    fn extend<I: IntoIterator<Item = (String, Entry)>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}
