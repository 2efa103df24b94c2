//! Placeholder preservation for machine-translated strings
//!
//! Catalog strings carry named placeholders such as `{name}` or `{count}`.
//! Translation backends regularly translate them (`{name}` → `{nom}`), drop
//! them, or mangle the braces (`{ name }`). This module restores the
//! placeholder set of the source string in the translated one.
//!
//! # Example
//!
//! ```ignore
//! Source:      "Hello {name}"
//! Translated:  "Bonjour {nom}"
//! Repaired:    "Bonjour {name}"
//! ```
//!
//! Repair strategy, in order:
//! 1. No placeholders in the source: nothing to guard
//! 2. Same placeholders in the same order: unchanged
//! 3. Same placeholders in another order: unchanged (word order changed)
//! 4. Same count: positional correspondence, mismatching slots are rewritten
//! 5. One missing and one extra: every occurrence of the extra is renamed
//! 6. Anything else cannot be repaired and passes through

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[A-Za-z0-9_]+\}").unwrap());

static SPACED_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*([A-Za-z0-9_]+)\s*\}").unwrap());

static PLACEHOLDER_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\w+)\}").unwrap());

/// All placeholders of `text` in order of appearance, duplicates included
pub fn extract_placeholders(text: &str) -> Vec<&str> {
    PLACEHOLDER.find_iter(text).map(|m| m.as_str()).collect()
}

/// Restore the placeholders of `original` in `translated`
///
/// Operates on the raw translated text; see [`guard`] for the full
/// post-processing applied to backend output.
pub fn repair(original: &str, translated: &str) -> String {
    let expected = extract_placeholders(original);
    if expected.is_empty() {
        return translated.to_string();
    }

    let found: Vec<_> = PLACEHOLDER.find_iter(translated).collect();
    let found_names: Vec<&str> = found.iter().map(|m| m.as_str()).collect();
    if expected == found_names {
        return translated.to_string();
    }

    if expected.len() == found.len() {
        if is_permutation(&expected, &found_names) {
            return translated.to_string();
        }

        // Rewrite mismatching slots at their own positions so an earlier
        // replacement can never be picked up again by a later one
        let mut repaired = String::with_capacity(translated.len());
        let mut last = 0;
        for (slot, want) in found.iter().zip(&expected) {
            repaired.push_str(&translated[last..slot.start()]);
            repaired.push_str(want);
            last = slot.end();
        }
        repaired.push_str(&translated[last..]);
        return repaired;
    }

    let missing = difference(&expected, &found_names);
    let extra = difference(&found_names, &expected);
    match (missing.as_slice(), extra.as_slice()) {
        ([missing], [extra]) => translated.replace(extra, missing),
        _ => translated.to_string(),
    }
}

/// Clean up typical backend artifacts in `translated`
///
/// - surrounding whitespace
/// - one trailing period the source does not have
/// - empty `{}` pairs the source does not have
/// - whitespace inside braces (`{ name }` → `{name}`)
pub fn sanitize(original: &str, translated: &str) -> String {
    let mut text = translated.trim();

    if !original.ends_with('.') {
        text = text.strip_suffix('.').unwrap_or(text);
    }

    let mut text = text.to_string();
    if !original.contains("{}") && text.contains("{}") {
        text = text.replace("{}", "").trim().to_string();
    }

    SPACED_PLACEHOLDER.replace_all(&text, "{$1}").into_owned()
}

/// Full post-processing of a backend response: [`sanitize`] then [`repair`]
pub fn guard(original: &str, translated: &str) -> String {
    repair(original, &sanitize(original, translated))
}

/// Whether `source` and `target` use the same placeholder names,
/// regardless of order
///
/// An empty side is considered consistent.
pub fn placeholders_match(source: &str, target: &str) -> bool {
    if source.is_empty() || target.is_empty() {
        return true;
    }
    let names = |text: &str| {
        let mut names: Vec<String> = PLACEHOLDER_NAME
            .captures_iter(text)
            .map(|c| c[1].to_string())
            .collect();
        names.sort();
        names
    };
    names(source) == names(target)
}

fn counts<'a>(items: &[&'a str]) -> HashMap<&'a str, usize> {
    let mut counts = HashMap::new();
    for item in items {
        *counts.entry(*item).or_insert(0) += 1;
    }
    counts
}

fn is_permutation(a: &[&str], b: &[&str]) -> bool {
    counts(a) == counts(b)
}

/// Multiset difference `a - b`: each item of `b` cancels one occurrence in `a`
fn difference<'a>(a: &[&'a str], b: &[&str]) -> Vec<&'a str> {
    let mut remaining = counts(b);
    a.iter()
        .copied()
        .filter(|item| match remaining.get_mut(*item) {
            Some(n) if *n > 0 => {
                *n -= 1;
                false
            }
            _ => true,
        })
        .collect()
}
