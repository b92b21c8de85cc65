use time::Date;

use super::Board;
use crate::board::CardId;
use crate::drag::{DragSession, DraggedCard, DropSlot};
use crate::selection::Selection;
use crate::view::{CardBox, CardView};

/// What a completed drop or move changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropOutcome {
    pub moved: Vec<CardId>,
    pub destination: Date,
    /// Days whose empty hint and completion badge changed.
    pub affected: Vec<Date>,
}

impl Board {
    /// Picks up `grabbed`, plus the rest of the selection if it is part of it.
    /// History is recorded here, before anything moves.
    pub fn begin_drag(&mut self, grabbed: CardId) -> Option<Vec<CardId>> {
        if self.view.card(grabbed).is_none() {
            return None;
        }
        self.commit_all_edits();
        let ids = Selection::new(&mut self.view).drag_set(grabbed);
        let cards: Vec<DraggedCard> = ids
            .iter()
            .filter_map(|id| {
                self.view
                    .locate(*id)
                    .map(|(origin, _)| DraggedCard { id: *id, origin })
            })
            .collect();
        let session = DragSession::new(cards)?;
        self.record();
        self.view.mark_dragging(&ids);
        self.drag = Some(session);
        tracing::debug!(?ids, "drag started");
        Some(ids)
    }

    /// Pointer over `date` at `pointer_y`; `boxes` are that day's card boxes
    /// in display order. Returns the placeholder slot.
    pub fn hover(&mut self, date: Date, pointer_y: f64, boxes: &[CardBox]) -> Option<DropSlot> {
        let session = self.drag.as_mut()?;
        if !self.view.is_materialized(date) {
            session.leave();
            self.view.clear_placeholder();
            return None;
        }
        let slot = session.hover(date, pointer_y, boxes);
        self.view.set_placeholder(slot.date, slot.index);
        Some(slot)
    }

    /// Pointer left every valid destination.
    pub fn leave_destination(&mut self) {
        if let Some(session) = self.drag.as_mut() {
            session.leave();
        }
        self.view.clear_placeholder();
    }

    /// Drops the dragged cards on the current placeholder. Without one the
    /// drag is cancelled and the store is left as it was.
    pub fn drop_cards(&mut self) -> Option<DropOutcome> {
        let session = self.drag.take()?;
        self.view.clear_placeholder();
        self.view.clear_dragging();
        let Some(slot) = session.slot() else {
            tracing::debug!("drop outside any day, drag cancelled");
            return None;
        };
        let affected = session.affected_days(slot.date);
        let outcome = self.relocate(&session.ids(), slot.date, Some(slot.index), affected);
        self.persist();
        Some(outcome)
    }

    pub fn cancel_drag(&mut self) {
        if self.drag.take().is_some() {
            self.view.clear_placeholder();
            self.view.clear_dragging();
            tracing::debug!("drag cancelled");
        }
    }

    /// Programmatic relocation of `ids` to `dest` at `index` (end when `None`),
    /// for cards on or off screen.
    pub fn move_cards(&mut self, ids: &[CardId], dest: Date, index: Option<usize>) -> Option<DropOutcome> {
        let known: Vec<CardId> = ids
            .iter()
            .copied()
            .filter(|id| self.find_card(*id).is_some())
            .collect();
        if known.is_empty() {
            return None;
        }
        self.commit_all_edits();
        self.record();
        let mut affected = vec![dest];
        for id in &known {
            if let Some(origin) = self.store.locate(*id) {
                if !affected.contains(&origin) {
                    affected.push(origin);
                }
            }
        }
        let outcome = self.relocate(&known, dest, index, affected);
        self.persist();
        Some(outcome)
    }

    /// Moves cards in both representations. Cards leaving another day are
    /// handed over in the store first; the exact order inside the
    /// destination comes from the view (or, off screen, from `index`).
    fn relocate(
        &mut self,
        ids: &[CardId],
        dest: Date,
        index: Option<usize>,
        affected: Vec<Date>,
    ) -> DropOutcome {
        let mut carried = Vec::with_capacity(ids.len());
        for id in ids {
            let origin = self.store.locate(*id);
            let card_view = match self.view.remove_card(*id) {
                Some((_, mut card_view)) => {
                    card_view.dragging = false;
                    Some(card_view)
                }
                None => self
                    .store
                    .find(*id)
                    .map(|(_, card)| CardView::from_card(card)),
            };
            let Some(card_view) = card_view else {
                continue;
            };
            match origin {
                Some(origin) if origin != dest => {
                    self.store.relocate(*id, origin, dest);
                }
                Some(_) => {}
                None => tracing::warn!(card_id = id, "moved card was only on screen"),
            }
            carried.push(card_view);
        }
        let moved: Vec<CardId> = carried.iter().map(|card| card.id).collect();

        if self.view.is_materialized(dest) {
            self.view.place_cards(carried, dest, index);
        } else {
            let mut list: Vec<_> = self
                .store
                .get_cards(dest)
                .iter()
                .filter(|card| !moved.contains(&card.id))
                .cloned()
                .collect();
            let mut at = index.unwrap_or(list.len()).min(list.len());
            for card_view in &carried {
                list.insert(at, card_view.to_card());
                at += 1;
            }
            self.store.replace_day(dest, list);
        }
        self.reconcile_from_view();
        tracing::debug!(?moved, dest = %dest, "cards relocated");
        DropOutcome {
            moved,
            destination: dest,
            affected,
        }
    }
}
