use std::ops::Range;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::board::{CardId, CardStore};
use crate::view::ViewTree;

pub mod highlight;

pub use highlight::{build_highlight_regex, match_spans};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchScope {
    /// Only what is currently materialized, in display order.
    #[default]
    Visible,
    /// The whole store, by ascending date.
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub date: Date,
    pub id: CardId,
    pub spans: Vec<Range<usize>>,
}

/// Trimmed, lowercased needle; `None` for a blank query.
pub fn normalize_query(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// First rendered card whose on-screen text contains the query.
pub fn search_visible(view: &ViewTree, query: &str) -> Option<SearchHit> {
    let needle = normalize_query(query)?;
    view.cards()
        .find(|(_, card)| card.display_text().to_lowercase().contains(&needle))
        .map(|(date, card)| SearchHit {
            date,
            id: card.id,
            spans: match_spans(query.trim(), card.display_text()),
        })
}

/// First stored card, earliest date first, whose text contains the query.
pub fn search_store(store: &CardStore, query: &str) -> Option<SearchHit> {
    let needle = normalize_query(query)?;
    store.iter().find_map(|(date, cards)| {
        cards
            .iter()
            .find(|card| card.content.contains_ignore_case(&needle))
            .map(|card| SearchHit {
                date,
                id: card.id,
                spans: match_spans(query.trim(), card.text()),
            })
    })
}
