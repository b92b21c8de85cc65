use std::collections::HashSet;
use std::ops::Range;

use regex::{Regex, RegexBuilder};

pub fn build_highlight_regex(tokens: &[String]) -> Option<Regex> {
    if tokens.is_empty() {
        return None;
    }
    let mut unique = Vec::new();
    let mut seen = HashSet::new();
    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if seen.insert(token.to_lowercase()) {
            unique.push(token.to_string());
        }
    }
    if unique.is_empty() {
        return None;
    }
    unique.sort_by(|a, b| b.len().cmp(&a.len()));
    let pattern = unique
        .into_iter()
        .map(|token| regex::escape(&token))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
}

/// Byte ranges of `text` matching the query, for the renderer to paint.
pub fn match_spans(query: &str, text: &str) -> Vec<Range<usize>> {
    let Some(regex) = build_highlight_regex(&[query.to_string()]) else {
        return Vec::new();
    };
    regex.find_iter(text).map(|m| m.range()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_longer_tokens_first() {
        let regex = build_highlight_regex(&["mil".into(), "milk".into()]).expect("regex");
        let matches: Vec<_> = regex.find_iter("buttermilk").map(|m| m.as_str()).collect();
        assert_eq!(matches, vec!["milk"]);
    }

    #[test]
    fn spans_are_case_insensitive_and_escaped() {
        assert_eq!(match_spans("MILK", "Buy milk, milk."), vec![4..8, 10..14]);
        assert_eq!(match_spans("a.b", "axb a.b"), vec![4..7]);
        assert!(match_spans("  ", "anything").is_empty());
    }
}
