//! Translation catalogs for tmsync
//!
//! This crate holds everything that does not need a translation engine:
//! the catalog data model, file stores, catalog diffing and merging, and
//! per-language-pair glossaries.
//!
//! # Example
//!
//! ```ignore
//! use tmsync::{CatalogFormat, CatalogStore, FileCatalogStore, SelectionMode, diff, select_for_translation};
//! use std::path::Path;
//!
//! let store = FileCatalogStore::new(CatalogFormat::Yaml);
//! let dir = Path::new("app/lang");
//! let source = store.read("en", dir)?;
//! let target = store.read("fr", dir)?;
//!
//! let todo = select_for_translation(&diff(&source, &target), SelectionMode::New);
//! println!("{} keys to translate", todo.len());
//! ```

pub mod catalog;
pub mod diff;
pub mod error;
pub mod glossary;
pub mod layout;
pub mod store;

pub use catalog::{Catalog, Entry, EntrySpec, PLURAL_FORMS};
pub use diff::{
    CatalogDiff, GLOBAL_NAMESPACE, SelectionMode, diff, is_global_key, merge, prune_unused,
    select_for_translation,
};
pub use error::{CatalogError, CatalogResult};
pub use glossary::{
    GLOSSARY_PREAMBLE, Glossary, GlossaryCandidates, build_context, filter, generate_candidates,
    read_glossary_id, split_context,
};
pub use layout::{DirectoryResolver, ModuleLayout, ModuleResolver};
pub use store::{CatalogFormat, CatalogStore, CollectorFeed, FileCatalogStore};
