use time::Date;

use crate::board::CardId;
use crate::view::CardBox;

/// A card being dragged, with the day it was picked up from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraggedCard {
    pub id: CardId,
    pub origin: Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropSlot {
    pub date: Date,
    /// Insertion index among the destination's non-dragged cards.
    pub index: usize,
}

/// State of one drag gesture between pick-up and drop/cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    cards: Vec<DraggedCard>,
    slot: Option<DropSlot>,
}

impl DragSession {
    pub fn new(cards: Vec<DraggedCard>) -> Option<Self> {
        if cards.is_empty() {
            return None;
        }
        Some(Self { cards, slot: None })
    }

    pub fn cards(&self) -> &[DraggedCard] {
        &self.cards
    }

    pub fn ids(&self) -> Vec<CardId> {
        self.cards.iter().map(|c| c.id).collect()
    }

    pub fn carries(&self, id: CardId) -> bool {
        self.cards.iter().any(|c| c.id == id)
    }

    pub fn slot(&self) -> Option<DropSlot> {
        self.slot
    }

    /// Updates the placeholder for a pointer hovering `date`. `boxes` are the
    /// rendered boxes of that day's cards in display order.
    pub fn hover(&mut self, date: Date, pointer_y: f64, boxes: &[CardBox]) -> DropSlot {
        let index = insertion_index(pointer_y, boxes, |id| self.carries(id));
        let slot = DropSlot { date, index };
        self.slot = Some(slot);
        slot
    }

    /// Pointer left every valid destination.
    pub fn leave(&mut self) {
        self.slot = None;
    }

    /// Days whose presence hint and badge need refreshing after the drop.
    pub fn affected_days(&self, dest: Date) -> Vec<Date> {
        let mut days = vec![dest];
        for card in &self.cards {
            if !days.contains(&card.origin) {
                days.push(card.origin);
            }
        }
        days
    }
}

/// Index before the first non-dragged card whose vertical midpoint lies below
/// the pointer; past the end when there is none. Equal midpoints resolve to
/// the first one encountered.
pub fn insertion_index<F>(pointer_y: f64, boxes: &[CardBox], is_dragged: F) -> usize
where
    F: Fn(CardId) -> bool,
{
    let mut index = 0;
    for card_box in boxes.iter().filter(|b| !is_dragged(b.id)) {
        if pointer_y < card_box.rect.mid_y() {
            return index;
        }
        index += 1;
    }
    index
}
