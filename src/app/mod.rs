//! The board engine: one instance owns the store, its on-screen projection,
//! the undo history and everything else that changes while the board is open.
//!
//! Every interaction goes the same way: mutate the view tree optimistically,
//! rebuild the touched days of the store from it, persist.

use time::{Date, OffsetDateTime};

use crate::board::{Card, CardId, CardStore};
use crate::calendar::YearMonth;
use crate::config::{AppConfig, SearchOptions};
use crate::drag::DragSession;
use crate::history::History;
use crate::range::RangeManager;
use crate::remote::RemoteWorker;
use crate::sanitize::{ImageUploads, Sanitizer};
use crate::storage::{self, SnapshotStore};
use crate::view::{ViewOptions, ViewTree};

mod actions;
mod cards;
mod navigation;
mod notice;
mod relocate;
mod sync;
#[cfg(test)]
mod tests;

pub use actions::{Command, CommandOutcome};
pub use cards::ImageError;
pub use notice::{Notice, NoticeLevel, Notices};
pub use relocate::DropOutcome;

pub struct Board {
    store: CardStore,
    history: History,
    view: ViewTree,
    range: RangeManager,
    options: ViewOptions,
    focus: YearMonth,
    today: Date,
    drag: Option<DragSession>,
    highlight_until: Option<OffsetDateTime>,
    notices: Notices,
    sanitizer: Sanitizer,
    search: SearchOptions,
    snapshots: Box<dyn SnapshotStore>,
    pretty_snapshots: bool,
    uploads: Option<ImageUploads>,
    remote: Option<RemoteWorker>,
}

impl Board {
    /// Opens the board on whatever `snapshots` holds. An unreadable record
    /// starts an empty board; it is never an error.
    pub fn load(config: &AppConfig, snapshots: Box<dyn SnapshotStore>, today: Date) -> Self {
        let store = match snapshots.load() {
            Ok(Some(raw)) => storage::decode_lenient(&raw),
            Ok(None) => CardStore::default(),
            Err(err) => {
                tracing::warn!(?err, "could not read local snapshot, starting empty");
                CardStore::default()
            }
        };
        Self::with_store(store, config, snapshots, today)
    }

    pub fn with_store(
        store: CardStore,
        config: &AppConfig,
        snapshots: Box<dyn SnapshotStore>,
        today: Date,
    ) -> Self {
        let options = ViewOptions {
            show_weekends: config.view.show_weekends,
            expand_all_weeks: config.view.expand_all_weeks,
        };
        let range = RangeManager::new(today, &config.range);
        let view = ViewTree::build(&store, range.start(), range.end(), today, options);
        tracing::debug!(
            cards = store.card_count(),
            start = %range.start(),
            end = %range.end(),
            "board opened"
        );
        Self {
            store,
            history: History::new(config.history.max_entries),
            view,
            range,
            options,
            focus: YearMonth::of(today),
            today,
            drag: None,
            highlight_until: None,
            notices: Notices::default(),
            sanitizer: Sanitizer::new(&config.sanitize),
            search: config.search.clone(),
            snapshots,
            pretty_snapshots: config.storage.pretty,
            uploads: None,
            remote: None,
        }
    }

    pub fn store(&self) -> &CardStore {
        &self.store
    }

    pub fn view(&self) -> &ViewTree {
        &self.view
    }

    pub fn range(&self) -> &RangeManager {
        &self.range
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn options(&self) -> ViewOptions {
        self.options
    }

    pub fn today(&self) -> Date {
        self.today
    }

    pub fn focus_month(&self) -> YearMonth {
        self.focus
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }

    pub fn get_cards(&self, date: Date) -> &[Card] {
        self.store.get_cards(date)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn attach_uploads(&mut self, uploads: ImageUploads) {
        self.uploads = Some(uploads);
    }

    pub fn attach_remote(&mut self, worker: RemoteWorker) {
        self.remote = Some(worker);
    }

    /// Rewrites every materialized day of the store from the view tree, in
    /// display order. Days outside the view are left alone.
    pub fn reconcile_from_view(&mut self) {
        for date in self.view.materialized_dates() {
            if let Some(cards) = self.view.day_cards(date) {
                self.store.replace_day(date, cards);
            }
        }
    }

    /// Restores the store as it was before the last recorded mutation.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo() else {
            tracing::debug!("nothing to undo");
            return false;
        };
        self.drag = None;
        self.store = previous;
        self.rebuild_view();
        self.persist();
        true
    }

    /// Housekeeping for the event loop: expires notices and search highlights,
    /// drains finished background work.
    pub fn tick(&mut self, now: OffsetDateTime) {
        self.notices.expire(now);
        if self.highlight_until.is_some_and(|until| until <= now) {
            self.highlight_until = None;
            self.view.clear_search_hits();
        }
        self.poll_uploads();
        self.poll_remote();
    }

    fn record(&mut self) {
        self.history.record(&self.store);
    }

    /// Local persistence failures are logged and otherwise ignored; the
    /// in-memory board stays authoritative.
    fn persist(&self) {
        let encoded = if self.pretty_snapshots {
            storage::encode_pretty(&self.store)
        } else {
            storage::encode(&self.store)
        };
        let json = match encoded {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(?err, "could not serialise card store");
                return;
            }
        };
        if let Err(err) = self.snapshots.save(&json) {
            tracing::warn!(?err, "local snapshot save failed, continuing in memory");
        }
    }

    fn rebuild_view(&mut self) {
        let mut view = ViewTree::build(
            &self.store,
            self.range.start(),
            self.range.end(),
            self.today,
            self.options,
        );
        view.adopt_transient(&self.view);
        self.view = view;
    }

    fn find_card(&self, id: CardId) -> Option<Card> {
        self.view
            .card(id)
            .map(|card| card.to_card())
            .or_else(|| self.store.find(id).map(|(_, card)| card.clone()))
    }
}
