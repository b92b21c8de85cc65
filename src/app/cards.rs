use std::path::PathBuf;

use thiserror::Error;
use time::Date;

use super::{Board, NoticeLevel};
use crate::board::{Card, CardColor, CardContent, CardId};
use crate::clipboard::{self, ClipboardContent};
use crate::sanitize::{SanitizeError, UploadEvent};
use crate::selection::{selected_ids, Selection};
use crate::view::{CardBox, CardView, Rect};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("card #{0} does not exist")]
    UnknownCard(CardId),
    #[error(transparent)]
    Rejected(#[from] SanitizeError),
}

impl Board {
    /// Double-click on a day: a new empty card, already being edited.
    /// Returns `None` when the day is not on screen.
    pub fn activate_day(&mut self, date: Date) -> Option<CardId> {
        if !self.view.is_materialized(date) {
            return None;
        }
        self.commit_all_edits();
        self.record();
        let id = self.store.mint_id();
        let card = Card::new(id, CardContent::default());
        let mut card_view = CardView::from_card(&card);
        card_view.edit_buffer = Some(String::new());
        self.view.insert_card(date, None, card_view);
        self.store.upsert(date, card);
        self.persist();
        tracing::debug!(card_id = id, date = %date, "card created");
        Some(id)
    }

    /// Creates a finished card from external text, on any date.
    pub fn add_card(&mut self, date: Date, input: &str) -> Result<CardId, SanitizeError> {
        let content = self.sanitizer.sanitize(input)?;
        self.record();
        let id = self.store.mint_id();
        let card = Card::new(id, content);
        if self.view.is_materialized(date) {
            self.view.insert_card(date, None, CardView::from_card(&card));
            self.store.upsert(date, card);
            self.reconcile_from_view();
        } else {
            self.store.upsert(date, card);
        }
        self.persist();
        Ok(id)
    }

    pub fn begin_edit(&mut self, id: CardId) -> bool {
        if self.view.card(id).is_some_and(CardView::is_editing) {
            return true;
        }
        self.commit_all_edits();
        let Some(card) = self.view.card_mut(id) else {
            return false;
        };
        card.edit_buffer = Some(card.content.text.clone());
        true
    }

    /// Keystrokes only touch the on-screen buffer.
    pub fn update_edit(&mut self, id: CardId, text: &str) -> bool {
        match self.view.card_mut(id) {
            Some(card) if card.is_editing() => {
                card.edit_buffer = Some(text.to_string());
                true
            }
            _ => false,
        }
    }

    /// Focus loss or Escape: the buffer becomes the card text.
    pub fn commit_edit(&mut self, id: CardId) -> bool {
        let Some(card) = self.view.card_mut(id) else {
            return false;
        };
        let Some(buffer) = card.edit_buffer.take() else {
            return false;
        };
        card.content.set_text(self.sanitizer.clamp_text(&buffer));
        self.reconcile_from_view();
        self.persist();
        true
    }

    pub fn commit_all_edits(&mut self) -> usize {
        let editing: Vec<CardId> = self
            .view
            .cards()
            .filter(|(_, card)| card.is_editing())
            .map(|(_, card)| card.id)
            .collect();
        editing
            .into_iter()
            .filter(|id| self.commit_edit(*id))
            .count()
    }

    pub fn delete_card(&mut self, id: CardId) -> bool {
        if self.find_card(id).is_none() {
            tracing::debug!(card_id = id, "delete of unknown card ignored");
            return false;
        }
        self.record();
        let removed = self.remove_card_everywhere(id);
        self.reconcile_from_view();
        self.persist();
        removed
    }

    pub fn delete_selected(&mut self) -> usize {
        let ids = selected_ids(&self.view);
        if ids.is_empty() {
            return 0;
        }
        self.record();
        let removed = ids
            .into_iter()
            .filter(|id| self.remove_card_everywhere(*id))
            .count();
        self.reconcile_from_view();
        self.persist();
        removed
    }

    fn remove_card_everywhere(&mut self, id: CardId) -> bool {
        let expected = self
            .view
            .remove_card(id)
            .map(|(date, _)| date)
            .or_else(|| self.store.locate(id));
        let Some(expected) = expected else {
            return false;
        };
        if self.store.remove(expected, id) {
            return true;
        }
        match self.store.take_anywhere(id) {
            Some((actual, _)) => {
                tracing::warn!(
                    card_id = id,
                    expected = %expected,
                    found = %actual,
                    "delete missed expected day, recovered via full-store search"
                );
                true
            }
            None => {
                tracing::error!(card_id = id, "delete target not found in store");
                false
            }
        }
    }

    pub fn cycle_color(&mut self, id: CardId) -> Option<CardColor> {
        let next = self.find_card(id)?.color.cycle();
        self.set_color(id, next).then_some(next)
    }

    pub fn set_color(&mut self, id: CardId, color: CardColor) -> bool {
        if self.find_card(id).is_none() {
            return false;
        }
        self.record();
        let changed = self.modify_card(id, |card| card.color = color);
        self.persist();
        changed
    }

    pub fn toggle_done(&mut self, id: CardId) -> Option<bool> {
        let done = !self.find_card(id)?.done;
        self.record();
        self.modify_card(id, |card| card.done = done);
        self.persist();
        Some(done)
    }

    /// Applies `f` to the rendered card (then reconciles) or, for a card
    /// outside the view, straight to the store.
    fn modify_card<F>(&mut self, id: CardId, f: F) -> bool
    where
        F: FnOnce(&mut Card),
    {
        if let Some(view_card) = self.view.card_mut(id) {
            let mut card = view_card.to_card();
            f(&mut card);
            view_card.content = card.content;
            view_card.done = card.done;
            view_card.color = card.color;
            self.reconcile_from_view();
            return true;
        }
        let Some((date, card)) = self.store.find(id) else {
            return false;
        };
        let mut card = card.clone();
        f(&mut card);
        self.store.upsert(date, card);
        true
    }

    pub fn toggle_select(&mut self, id: CardId) -> bool {
        Selection::new(&mut self.view).toggle(id)
    }

    pub fn select_only(&mut self, id: CardId) {
        Selection::new(&mut self.view).select_only(id);
    }

    pub fn clear_selection(&mut self) {
        Selection::new(&mut self.view).clear();
    }

    pub fn select_in_rect(&mut self, marquee: Rect, boxes: &[CardBox], additive: bool) -> usize {
        Selection::new(&mut self.view).select_in_rect(marquee, boxes, additive)
    }

    pub fn selected(&self) -> Vec<CardId> {
        selected_ids(&self.view)
    }

    /// Clipboard payload for the selection, or for `fallback` when nothing is
    /// selected.
    pub fn copy_selection(&self, fallback: Option<CardId>) -> Option<String> {
        let mut ids = self.selected();
        if ids.is_empty() {
            ids.extend(fallback);
        }
        let cards: Vec<Card> = ids.into_iter().filter_map(|id| self.find_card(id)).collect();
        if cards.is_empty() {
            return None;
        }
        match clipboard::encode(&cards) {
            Ok(raw) => Some(raw),
            Err(err) => {
                tracing::error!(?err, "could not encode clipboard payload");
                None
            }
        }
    }

    /// Pastes into `date`. Rejected input changes nothing.
    pub fn paste(&mut self, date: Date, raw: &str) -> Result<Vec<CardId>, SanitizeError> {
        let incoming: Vec<Card> = match clipboard::decode(raw, &self.sanitizer)? {
            ClipboardContent::Cards(cards) => cards
                .into_iter()
                .map(|clip| Card {
                    id: 0,
                    content: clip.content,
                    done: clip.done,
                    color: clip.color,
                })
                .collect(),
            ClipboardContent::Foreign(content) => vec![Card::new(0, content)],
        };
        self.record();
        let on_screen = self.view.is_materialized(date);
        let mut ids = Vec::with_capacity(incoming.len());
        for mut card in incoming {
            card.id = self.store.mint_id();
            ids.push(card.id);
            if on_screen {
                self.view.insert_card(date, None, CardView::from_card(&card));
            }
            self.store.upsert(date, card);
        }
        if on_screen {
            self.reconcile_from_view();
        }
        self.persist();
        tracing::debug!(count = ids.len(), date = %date, "pasted cards");
        Ok(ids)
    }

    /// Adds an inline image to a card. Invalid or oversized images are
    /// rejected without touching the card.
    pub fn insert_image(&mut self, id: CardId, src: &str) -> Result<(), ImageError> {
        let Some(card) = self.find_card(id) else {
            return Err(ImageError::UnknownCard(id));
        };
        let content = self.sanitizer.with_image(&card.content, src)?;
        self.record();
        self.modify_card(id, |card| card.content = content);
        self.persist();
        Ok(())
    }

    /// Queues an image file for background encoding; the result lands through
    /// [`Board::poll_uploads`].
    pub fn upload_image(&mut self, id: CardId, path: impl Into<PathBuf>) -> bool {
        if self.find_card(id).is_none() {
            tracing::warn!(card_id = id, "image upload requested for unknown card");
            return false;
        }
        match &self.uploads {
            Some(uploads) => {
                uploads.submit(id, path);
                true
            }
            None => {
                tracing::warn!(card_id = id, "image upload requested without an upload worker");
                false
            }
        }
    }

    pub fn poll_uploads(&mut self) -> usize {
        let events = match &self.uploads {
            Some(uploads) => uploads.poll(),
            None => return 0,
        };
        let count = events.len();
        for event in events {
            self.apply_upload(event);
        }
        count
    }

    /// Blocks for one finished upload; for callers without an event loop.
    /// True when the image landed in its card. Returns immediately with
    /// `false` when nothing is pending.
    pub fn wait_upload(&mut self) -> bool {
        let event = match &self.uploads {
            Some(uploads) => uploads.wait(),
            None => None,
        };
        match event {
            Some(event) => self.apply_upload(event),
            None => false,
        }
    }

    fn apply_upload(&mut self, event: UploadEvent) -> bool {
        match event {
            UploadEvent::Ready { card_id, data_uri } => {
                match self.insert_image(card_id, &data_uri) {
                    Ok(()) => true,
                    Err(ImageError::UnknownCard(id)) => {
                        tracing::warn!(card_id = id, "upload finished for a deleted card");
                        self.notices.blocking(
                            NoticeLevel::Error,
                            format!("Image dropped: card #{id} no longer exists"),
                        );
                        false
                    }
                    Err(err) => {
                        self.notices
                            .blocking(NoticeLevel::Error, format!("Image rejected: {err}"));
                        false
                    }
                }
            }
            UploadEvent::Failed { card_id, message } => {
                tracing::debug!(card_id, "upload failure reported");
                self.notices
                    .blocking(NoticeLevel::Error, format!("Image upload failed: {message}"));
                false
            }
        }
    }
}
