//! Numbered-line batch protocol for prompt-driven backends
//!
//! A batch is sent as one prompt listing every entry on its own numbered
//! line, and the model is asked to answer with the same numbering:
//!
//! ```text
//! 1. Save [context: Field 'SAVE' in 'Form']
//! 2. Cancel
//! ```
//!
//! Answers are parsed line by line. `1.`, `1:` and `1)` are all accepted;
//! lines with an unknown number or no number at all are dropped.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tmsync::split_context;

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[.:)]\s*(.+)$").unwrap());

/// Maximum context length on a batch line
pub const BATCH_CONTEXT_WIDTH: usize = 100;

const ELLIPSIS: &str = "...";

/// Shorten `text` to at most `width` characters, ending in `...` when cut
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let keep = width.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Shorten the free-text part of a context, leaving a glossary directive intact
pub fn truncate_context(context: &str, width: usize) -> String {
    match split_context(context) {
        (base, Some(directive)) if base.is_empty() => directive.to_string(),
        (base, Some(directive)) => format!("{}. {}", truncate(base, width), directive),
        (base, None) => truncate(base, width),
    }
}

/// Render one prompt line: `N. payload [context: ...]`
pub fn numbered_line(number: usize, payload: &str, context: Option<&str>) -> String {
    match context.filter(|c| !c.is_empty()) {
        Some(context) => format!(
            "{}. {} [context: {}]",
            number,
            payload,
            truncate_context(context, BATCH_CONTEXT_WIDTH)
        ),
        None => format!("{}. {}", number, payload),
    }
}

/// Parse a numbered answer for a batch of `count` entries
///
/// Returns zero-based entry index → trimmed payload. When a number appears
/// twice the last line wins.
pub fn parse_numbered_lines(response: &str, count: usize) -> BTreeMap<usize, String> {
    let mut parsed = BTreeMap::new();
    for line in response.trim().lines() {
        let Some(caps) = NUMBERED_LINE.captures(line.trim()) else {
            continue;
        };
        let Ok(number) = caps[1].parse::<usize>() else {
            continue;
        };
        if (1..=count).contains(&number) {
            parsed.insert(number - 1, caps[2].trim().to_string());
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmsync::{Glossary, build_context};

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate("abcdefghijk", 10), "abcdefg...");
        assert_eq!(truncate("éééééé", 5), "éé...");
    }

    #[test]
    fn test_truncate_context_keeps_glossary_directive() {
        let mut glossary = Glossary::new();
        glossary.with_term("Member", "Membre");
        let context = build_context(Some("x".repeat(300).as_str()), &glossary);

        let truncated = truncate_context(&context, 100);
        assert!(truncated.starts_with(&format!("{}...", "x".repeat(97))));
        assert!(truncated.ends_with("{\"Member\":\"Membre\"}"));
    }

    #[test]
    fn test_numbered_line() {
        assert_eq!(numbered_line(1, "Save", None), "1. Save");
        assert_eq!(
            numbered_line(2, "Save", Some("Field 'SAVE' in 'Form'")),
            "2. Save [context: Field 'SAVE' in 'Form']"
        );
        assert_eq!(numbered_line(3, "Save", Some("")), "3. Save");
    }

    #[test]
    fn test_parse_accepts_all_separators() {
        let parsed = parse_numbered_lines("1. Enregistrer\n2: Annuler\n 3) Fermer \n", 3);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[&0], "Enregistrer");
        assert_eq!(parsed[&1], "Annuler");
        assert_eq!(parsed[&2], "Fermer");
    }

    #[test]
    fn test_parse_drops_unknown_and_noise() {
        let response = "Here are the translations:\n1. Enregistrer\n7. Hors limite\n0. Zéro\n\nDone";
        let parsed = parse_numbered_lines(response, 2);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[&0], "Enregistrer");
    }

    #[test]
    fn test_parse_windows_line_endings() {
        let parsed = parse_numbered_lines("1. Oui\r\n2. Non\r\n", 2);
        assert_eq!(parsed[&0], "Oui");
        assert_eq!(parsed[&1], "Non");
    }
}
