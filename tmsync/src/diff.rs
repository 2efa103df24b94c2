//! Catalog diffing, merging and pruning
//!
//! Decides which keys of a source catalog still need work in a target
//! catalog:
//!
//! - **missing**: present in the source, absent from the target
//! - **unchanged**: present in both with a verbatim identical value, i.e.
//!   copied over at merge time and never translated
//!
//! Everything else in the target is considered translated.

use crate::catalog::Catalog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Namespace whose keys are shared across modules and never pruned
pub const GLOBAL_NAMESPACE: &str = "Global";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDiff {
    pub missing: BTreeSet<String>,
    pub unchanged: BTreeSet<String>,
}

/// Which keys a translation pass should pick up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Only keys absent from the target
    #[default]
    New,
    /// Keys whose target value still mirrors the source
    All,
}

impl CatalogDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unchanged.is_empty()
    }
}

pub fn diff(source: &Catalog, target: &Catalog) -> CatalogDiff {
    let mut result = CatalogDiff::default();
    for (key, source_entry) in source.iter() {
        match target.get(key) {
            None => {
                result.missing.insert(key.clone());
            }
            Some(target_entry) if target_entry == source_entry => {
                result.unchanged.insert(key.clone());
            }
            Some(_) => {}
        }
    }
    result
}

pub fn select_for_translation(diff: &CatalogDiff, mode: SelectionMode) -> BTreeSet<String> {
    match mode {
        SelectionMode::New => diff.missing.clone(),
        SelectionMode::All => diff.unchanged.clone(),
    }
}

/// Whether `key` lives under the reserved global namespace
pub fn is_global_key(key: &str) -> bool {
    key.split_once('.')
        .is_some_and(|(namespace, _)| namespace == GLOBAL_NAMESPACE)
}

/// Drop every key not collected in the current run
///
/// Keys under [`GLOBAL_NAMESPACE`] are always retained. Returns the removed keys.
pub fn prune_unused(target: &mut Catalog, collected: &BTreeSet<String>) -> Vec<String> {
    let mut removed = Vec::new();
    target.retain(|key, _| {
        let keep = collected.contains(key) || is_global_key(key);
        if !keep {
            removed.push(key.clone());
        }
        keep
    });
    removed
}

/// Collected source values overridden by existing target values
///
/// Existing translations always win; the source only fills gaps.
pub fn merge(collected: &Catalog, existing: &Catalog) -> Catalog {
    let mut merged = collected.clone();
    merged.extend(existing.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
