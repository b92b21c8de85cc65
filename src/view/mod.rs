use std::collections::HashMap;

use time::Date;

use crate::board::{Card, CardColor, CardContent, CardId, CardStore};
use crate::calendar::{is_weekend, weeks_between, Week, YearMonth};

pub mod geometry;

pub use geometry::{CardBox, Rect};

/// Scroll state reported by whatever renders the board.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub offset: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

/// The rendering side of the board. The engine tells it when the tree changed
/// and asks it to move the scroll position; measuring is its business.
pub trait Viewport {
    fn metrics(&self) -> ScrollMetrics;
    /// Re-measure after the view tree was rebuilt.
    fn layout(&mut self, view: &ViewTree);
    fn set_scroll_offset(&mut self, offset: f64);
    fn reveal_card(&mut self, _id: CardId) {}
    fn reveal_date(&mut self, _date: Date) {}
}

/// Viewport without a screen: every week row has a fixed height. Used by the
/// CLI and by tests that need scroll behavior.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeadlessViewport {
    pub metrics: ScrollMetrics,
    pub row_height: f64,
    pub revealed_card: Option<CardId>,
    pub revealed_date: Option<Date>,
}

impl HeadlessViewport {
    pub fn new(viewport_height: f64, row_height: f64) -> Self {
        Self {
            metrics: ScrollMetrics {
                offset: 0.0,
                viewport_height,
                content_height: 0.0,
            },
            row_height,
            revealed_card: None,
            revealed_date: None,
        }
    }
}

impl Viewport for HeadlessViewport {
    fn metrics(&self) -> ScrollMetrics {
        self.metrics
    }

    fn layout(&mut self, view: &ViewTree) {
        self.metrics.content_height = view.rows().len() as f64 * self.row_height;
    }

    fn set_scroll_offset(&mut self, offset: f64) {
        let max = (self.metrics.content_height - self.metrics.viewport_height).max(0.0);
        self.metrics.offset = offset.clamp(0.0, max);
    }

    fn reveal_card(&mut self, id: CardId) {
        self.revealed_card = Some(id);
    }

    fn reveal_date(&mut self, date: Date) {
        self.revealed_date = Some(date);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub show_weekends: bool,
    pub expand_all_weeks: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            show_weekends: true,
            expand_all_weeks: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub id: CardId,
    pub content: CardContent,
    pub done: bool,
    pub color: CardColor,
    pub selected: bool,
    pub dragging: bool,
    pub search_hit: bool,
    pub edit_buffer: Option<String>,
}

impl CardView {
    pub fn from_card(card: &Card) -> Self {
        Self {
            id: card.id,
            content: card.content.clone(),
            done: card.done,
            color: card.color,
            selected: false,
            dragging: false,
            search_hit: false,
            edit_buffer: None,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.edit_buffer.is_some()
    }

    /// What is on screen right now, including an uncommitted edit.
    pub fn display_text(&self) -> &str {
        self.edit_buffer
            .as_deref()
            .unwrap_or_else(|| self.content.text())
    }

    /// The card as the screen currently shows it.
    pub fn to_card(&self) -> Card {
        let mut content = self.content.clone();
        if let Some(buffer) = &self.edit_buffer {
            content.set_text(buffer.clone());
        }
        Card {
            id: self.id,
            content,
            done: self.done,
            color: self.color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayBadge {
    pub total: usize,
    pub done: usize,
}

impl DayBadge {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayCell {
    pub date: Date,
    pub is_today: bool,
    pub cards: Vec<CardView>,
    /// Drop slot shown while a drag hovers this day.
    pub placeholder: Option<usize>,
}

impl DayCell {
    pub fn shows_empty_hint(&self) -> bool {
        self.cards.is_empty() && self.placeholder.is_none()
    }

    pub fn badge(&self) -> DayBadge {
        DayBadge {
            total: self.cards.len(),
            done: self.cards.iter().filter(|c| c.done).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekRow {
    pub week: Week,
    pub collapsed: bool,
    pub contains_today: bool,
    pub days: Vec<DayCell>,
}

impl WeekRow {
    pub fn label(&self) -> String {
        self.week.label()
    }
}

/// The materialized projection of the store: every visible day in display
/// order, with the transient on-screen state (selection, edits, drag marks).
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTree {
    start: YearMonth,
    end: YearMonth,
    rows: Vec<WeekRow>,
}

impl ViewTree {
    pub fn build(
        store: &CardStore,
        start: YearMonth,
        end: YearMonth,
        today: Date,
        options: ViewOptions,
    ) -> Self {
        let rows = weeks_between(start, end)
            .into_iter()
            .map(|week| {
                let contains_today = week.contains(today);
                let collapsed = match store.week_visibility(week.owner, week.row) {
                    Some(expanded) => !expanded,
                    None => !(contains_today || options.expand_all_weeks),
                };
                let days = week
                    .days()
                    .filter(|date| options.show_weekends || !is_weekend(*date))
                    .map(|date| DayCell {
                        date,
                        is_today: date == today,
                        cards: store.get_cards(date).iter().map(CardView::from_card).collect(),
                        placeholder: None,
                    })
                    .collect();
                WeekRow {
                    week,
                    collapsed,
                    contains_today,
                    days,
                }
            })
            .collect();
        Self { start, end, rows }
    }

    pub fn start(&self) -> YearMonth {
        self.start
    }

    pub fn end(&self) -> YearMonth {
        self.end
    }

    pub fn rows(&self) -> &[WeekRow] {
        &self.rows
    }

    pub fn days(&self) -> impl Iterator<Item = &DayCell> {
        self.rows.iter().flat_map(|row| row.days.iter())
    }

    fn days_mut(&mut self) -> impl Iterator<Item = &mut DayCell> {
        self.rows.iter_mut().flat_map(|row| row.days.iter_mut())
    }

    pub fn day(&self, date: Date) -> Option<&DayCell> {
        self.days().find(|day| day.date == date)
    }

    pub fn day_mut(&mut self, date: Date) -> Option<&mut DayCell> {
        self.days_mut().find(|day| day.date == date)
    }

    pub fn is_materialized(&self, date: Date) -> bool {
        self.day(date).is_some()
    }

    pub fn materialized_dates(&self) -> Vec<Date> {
        self.days().map(|day| day.date).collect()
    }

    /// Every rendered card in display order.
    pub fn cards(&self) -> impl Iterator<Item = (Date, &CardView)> {
        self.days()
            .flat_map(|day| day.cards.iter().map(move |card| (day.date, card)))
    }

    fn cards_mut(&mut self) -> impl Iterator<Item = &mut CardView> {
        self.days_mut().flat_map(|day| day.cards.iter_mut())
    }

    pub fn locate(&self, id: CardId) -> Option<(Date, usize)> {
        self.days().find_map(|day| {
            day.cards
                .iter()
                .position(|c| c.id == id)
                .map(|idx| (day.date, idx))
        })
    }

    pub fn card(&self, id: CardId) -> Option<&CardView> {
        self.cards().map(|(_, card)| card).find(|c| c.id == id)
    }

    pub fn card_mut(&mut self, id: CardId) -> Option<&mut CardView> {
        self.cards_mut().find(|c| c.id == id)
    }

    /// Inserts at `index` (clamped) or appends. Returns false when the day is
    /// not materialized.
    pub fn insert_card(&mut self, date: Date, index: Option<usize>, card: CardView) -> bool {
        let Some(day) = self.day_mut(date) else {
            return false;
        };
        let at = index.unwrap_or(day.cards.len()).min(day.cards.len());
        day.cards.insert(at, card);
        true
    }

    pub fn remove_card(&mut self, id: CardId) -> Option<(Date, CardView)> {
        for day in self.days_mut() {
            if let Some(idx) = day.cards.iter().position(|c| c.id == id) {
                return Some((day.date, day.cards.remove(idx)));
            }
        }
        None
    }

    /// Pulls the given cards out of wherever they are and places them, in the
    /// given order, at `index` of `dest` (counted after removal).
    pub fn place_cards(&mut self, cards: Vec<CardView>, dest: Date, index: Option<usize>) -> bool {
        let Some(day) = self.day_mut(dest) else {
            return false;
        };
        let mut at = index.unwrap_or(day.cards.len()).min(day.cards.len());
        for card in cards {
            day.cards.insert(at, card);
            at += 1;
        }
        true
    }

    /// Cards of one materialized day as the store should hold them.
    pub fn day_cards(&self, date: Date) -> Option<Vec<Card>> {
        self.day(date)
            .map(|day| day.cards.iter().map(CardView::to_card).collect())
    }

    pub fn set_placeholder(&mut self, date: Date, index: usize) {
        for day in self.days_mut() {
            day.placeholder = if day.date == date { Some(index) } else { None };
        }
    }

    pub fn clear_placeholder(&mut self) {
        for day in self.days_mut() {
            day.placeholder = None;
        }
    }

    pub fn placeholder(&self) -> Option<(Date, usize)> {
        self.days()
            .find_map(|day| day.placeholder.map(|idx| (day.date, idx)))
    }

    pub fn clear_dragging(&mut self) {
        for card in self.cards_mut() {
            card.dragging = false;
        }
    }

    pub fn mark_dragging(&mut self, ids: &[CardId]) {
        for card in self.cards_mut() {
            card.dragging = ids.contains(&card.id);
        }
    }

    pub fn set_selected(&mut self, id: CardId, selected: bool) -> bool {
        match self.card_mut(id) {
            Some(card) => {
                card.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        for card in self.cards_mut() {
            card.selected = false;
        }
    }

    pub fn clear_search_hits(&mut self) {
        for card in self.cards_mut() {
            card.search_hit = false;
        }
    }

    pub fn row_mut(&mut self, owner: YearMonth, row: usize) -> Option<&mut WeekRow> {
        self.rows
            .iter_mut()
            .find(|r| r.week.owner == owner && r.week.row == row)
    }

    pub fn row_of(&self, date: Date) -> Option<&WeekRow> {
        self.rows.iter().find(|row| row.week.contains(date))
    }

    /// Carries on-screen state (selection, edits, highlights) into a freshly
    /// built tree.
    pub fn adopt_transient(&mut self, previous: &ViewTree) {
        let carried: HashMap<CardId, (bool, bool, Option<String>)> = previous
            .cards()
            .filter(|(_, c)| c.selected || c.search_hit || c.edit_buffer.is_some())
            .map(|(_, c)| (c.id, (c.selected, c.search_hit, c.edit_buffer.clone())))
            .collect();
        if carried.is_empty() {
            return;
        }
        for card in self.cards_mut() {
            if let Some((selected, hit, buffer)) = carried.get(&card.id) {
                card.selected = *selected;
                card.search_hit = *hit;
                card.edit_buffer = buffer.clone();
            }
        }
    }
}
