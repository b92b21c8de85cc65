use std::collections::{BTreeMap, HashSet};

use time::Date;

use super::card::{Card, CardId, MAX_CARD_ID};
use crate::calendar::YearMonth;

/// Normalized card model: date bucket -> ordered cards.
///
/// A bucket exists only while it holds at least one card, and a card id lives
/// in exactly one bucket. None of the operations here fail; inputs that do not
/// make sense (id 0, ids above `MAX_CARD_ID`, unknown ids) are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardStore {
    next_id: CardId,
    cards: BTreeMap<Date, Vec<Card>>,
    week_visibility: BTreeMap<YearMonth, Vec<Option<bool>>>,
}

impl Default for CardStore {
    fn default() -> Self {
        Self {
            next_id: 1,
            cards: BTreeMap::new(),
            week_visibility: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAnomaly {
    EmptyBucket(Date),
    DuplicateId(CardId),
    IdNotBelowCounter(CardId),
}

impl CardStore {
    pub fn from_parts(
        next_id: CardId,
        cards: BTreeMap<Date, Vec<Card>>,
        week_visibility: BTreeMap<YearMonth, Vec<Option<bool>>>,
    ) -> Self {
        let mut store = Self {
            next_id: next_id.clamp(1, MAX_CARD_ID),
            cards,
            week_visibility,
        };
        store.cards.retain(|_, list| {
            list.retain(|card| (1..=MAX_CARD_ID).contains(&card.id));
            !list.is_empty()
        });
        store.bump_counter_past_existing();
        store
    }

    pub fn next_id(&self) -> CardId {
        self.next_id
    }

    pub fn mint_id(&mut self) -> CardId {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// Keeps the counter strictly above an id that entered from outside.
    pub fn observe_id(&mut self, id: CardId) {
        if id >= self.next_id {
            self.next_id = id.saturating_add(1);
        }
    }

    pub fn get_cards(&self, date: Date) -> &[Card] {
        self.cards.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Buckets in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (Date, &[Card])> {
        self.cards.iter().map(|(date, list)| (*date, list.as_slice()))
    }

    pub fn card_count(&self) -> usize {
        self.cards.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn find(&self, id: CardId) -> Option<(Date, &Card)> {
        self.cards
            .iter()
            .find_map(|(date, list)| list.iter().find(|c| c.id == id).map(|c| (*date, c)))
    }

    pub fn locate(&self, id: CardId) -> Option<Date> {
        self.find(id).map(|(date, _)| date)
    }

    /// Replaces the card with the same id in place, or appends it.
    pub fn upsert(&mut self, date: Date, card: Card) {
        if card.id == 0 || card.id > MAX_CARD_ID {
            return;
        }
        self.observe_id(card.id);
        let list = self.cards.entry(date).or_default();
        match list.iter_mut().find(|c| c.id == card.id) {
            Some(slot) => *slot = card,
            None => list.push(card),
        }
    }

    /// Removes the first card with `id` from `date`, pruning an emptied bucket.
    pub fn remove(&mut self, date: Date, id: CardId) -> bool {
        self.take(date, id).is_some()
    }

    pub fn take(&mut self, date: Date, id: CardId) -> Option<Card> {
        let list = self.cards.get_mut(&date)?;
        let idx = list.iter().position(|c| c.id == id)?;
        let card = list.remove(idx);
        if list.is_empty() {
            self.cards.remove(&date);
        }
        Some(card)
    }

    /// Full-store fallback when the expected bucket did not hold the card.
    pub fn take_anywhere(&mut self, id: CardId) -> Option<(Date, Card)> {
        let date = self.locate(id)?;
        self.take(date, id).map(|card| (date, card))
    }

    /// Moves a card to the end of `to`. Looks in `from` first, then everywhere.
    pub fn relocate(&mut self, id: CardId, from: Date, to: Date) -> bool {
        let card = match self.take(from, id) {
            Some(card) => card,
            None => match self.take_anywhere(id) {
                Some((actual, card)) => {
                    tracing::warn!(
                        card_id = id,
                        expected = %crate::calendar::date_key(from),
                        found = %crate::calendar::date_key(actual),
                        "relocation source mismatch, recovered via full-store search"
                    );
                    card
                }
                None => {
                    tracing::error!(card_id = id, "relocation target not found in store");
                    return false;
                }
            },
        };
        self.cards.entry(to).or_default().push(card);
        true
    }

    /// Overwrites one bucket wholesale; an empty list deletes the bucket.
    pub fn replace_day(&mut self, date: Date, cards: Vec<Card>) {
        if cards.is_empty() {
            self.cards.remove(&date);
            return;
        }
        for card in &cards {
            self.observe_id(card.id);
        }
        self.cards.insert(date, cards);
    }

    pub fn week_visibility(&self, month: YearMonth, row: usize) -> Option<bool> {
        self.week_visibility
            .get(&month)
            .and_then(|rows| rows.get(row).copied().flatten())
    }

    pub fn set_week_visibility(&mut self, month: YearMonth, row: usize, expanded: bool) {
        let rows = self.week_visibility.entry(month).or_default();
        if rows.len() <= row {
            rows.resize(row + 1, None);
        }
        rows[row] = Some(expanded);
    }

    pub fn week_visibility_map(&self) -> &BTreeMap<YearMonth, Vec<Option<bool>>> {
        &self.week_visibility
    }

    pub fn cards_map(&self) -> &BTreeMap<Date, Vec<Card>> {
        &self.cards
    }

    /// Structural invariant check used by tests and debug logging.
    pub fn anomalies(&self) -> Vec<StoreAnomaly> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for (date, list) in &self.cards {
            if list.is_empty() {
                out.push(StoreAnomaly::EmptyBucket(*date));
            }
            for card in list {
                if !seen.insert(card.id) {
                    out.push(StoreAnomaly::DuplicateId(card.id));
                }
                if card.id >= self.next_id {
                    out.push(StoreAnomaly::IdNotBelowCounter(card.id));
                }
            }
        }
        out
    }

    fn bump_counter_past_existing(&mut self) {
        let max = self
            .cards
            .values()
            .flat_map(|list| list.iter().map(|c| c.id))
            .max()
            .unwrap_or(0);
        if max >= self.next_id {
            self.next_id = max.saturating_add(1);
        }
    }
}
