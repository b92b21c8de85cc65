use crate::board::CardId;
use crate::view::{CardBox, Rect, ViewTree};

/// Batch-selection over the rendered cards. Nothing is stored here: the
/// selected set is whatever cards carry the marker in the view tree.
pub struct Selection<'a> {
    view: &'a mut ViewTree,
}

impl<'a> Selection<'a> {
    pub fn new(view: &'a mut ViewTree) -> Self {
        Self { view }
    }

    /// Modifier-click.
    pub fn toggle(&mut self, id: CardId) -> bool {
        let Some(card) = self.view.card_mut(id) else {
            return false;
        };
        card.selected = !card.selected;
        card.selected
    }

    pub fn select_only(&mut self, id: CardId) {
        self.view.clear_selection();
        self.view.set_selected(id, true);
    }

    pub fn clear(&mut self) {
        self.view.clear_selection();
    }

    /// Marquee selection: marks every card whose box intersects `marquee`.
    /// Without `additive` the previous selection is dropped first.
    pub fn select_in_rect(&mut self, marquee: Rect, boxes: &[CardBox], additive: bool) -> usize {
        if !additive {
            self.view.clear_selection();
        }
        let mut hits = 0;
        for card_box in boxes.iter().filter(|b| b.rect.intersects(&marquee)) {
            if self.view.set_selected(card_box.id, true) {
                hits += 1;
            }
        }
        hits
    }

    /// The cards a drag grabbed at `grabbed` carries: the whole selection when
    /// the grabbed card is part of it, otherwise just that card (which then
    /// becomes the only selected one).
    pub fn drag_set(&mut self, grabbed: CardId) -> Vec<CardId> {
        let already = self.view.card(grabbed).map(|c| c.selected).unwrap_or(false);
        if !already {
            self.select_only(grabbed);
        }
        let mut ids = selected_ids(self.view);
        if !ids.contains(&grabbed) {
            ids.push(grabbed);
        }
        ids
    }
}

/// Selected cards in display order.
pub fn selected_ids(view: &ViewTree) -> Vec<CardId> {
    view.cards()
        .filter(|(_, card)| card.selected)
        .map(|(_, card)| card.id)
        .collect()
}
