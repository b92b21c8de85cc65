use time::{Date, OffsetDateTime};

use super::Board;
use crate::calendar::{is_weekend, YearMonth};
use crate::range::{RangeChange, ScrollEdge};
use crate::search::{normalize_query, search_store, search_visible, SearchHit, SearchScope};
use crate::view::Viewport;

impl Board {
    /// Called on every scroll event. Near the top the window grows one month
    /// back and the offset is shifted by the added height so nothing on
    /// screen moves; near the bottom it grows one month forward.
    pub fn handle_scroll(&mut self, viewport: &mut dyn Viewport) -> RangeChange {
        let before = viewport.metrics();
        let Some(edge) = self.range.edge_for(before) else {
            return RangeChange::Unchanged;
        };
        if !self.range.begin_extension() {
            return RangeChange::Unchanged;
        }
        let change = self.range.extend(edge);
        self.rebuild_view();
        viewport.layout(&self.view);
        if edge == ScrollEdge::Top {
            let added = viewport.metrics().content_height - before.content_height;
            viewport.set_scroll_offset(before.offset + added);
        }
        self.range.finish_extension();
        tracing::debug!(?edge, start = %self.range.start(), end = %self.range.end(), "range extended");
        change
    }

    pub fn jump_to_today(&mut self, viewport: &mut dyn Viewport) {
        let today = self.today;
        self.jump_to_month(YearMonth::of(today), viewport);
        viewport.reveal_date(today);
    }

    /// Month picker: recenters the window on `month`.
    pub fn jump_to_month(&mut self, month: YearMonth, viewport: &mut dyn Viewport) {
        let token = self.range.suppress();
        self.focus = month;
        self.range.center_on(month);
        self.rebuild_view();
        viewport.layout(&self.view);
        viewport.reveal_date(month.first_day());
        self.range.release(token);
    }

    pub fn previous_month(&mut self, viewport: &mut dyn Viewport) {
        let month = self.focus.previous();
        self.jump_to_month(month, viewport);
    }

    pub fn next_month(&mut self, viewport: &mut dyn Viewport) {
        let month = self.focus.next();
        self.jump_to_month(month, viewport);
    }

    pub fn toggle_weekends(&mut self, viewport: &mut dyn Viewport) -> bool {
        self.commit_all_edits();
        self.options.show_weekends = !self.options.show_weekends;
        self.rebuild_view();
        viewport.layout(&self.view);
        self.options.show_weekends
    }

    /// Collapses or expands the week row containing `date`; the choice is
    /// stored as a manual override. Returns the new collapsed state.
    pub fn toggle_week_row(&mut self, date: Date) -> Option<bool> {
        let week = self.view.row_of(date)?.week;
        let row = self.view.row_mut(week.owner, week.row)?;
        row.collapsed = !row.collapsed;
        let collapsed = row.collapsed;
        self.store
            .set_week_visibility(week.owner, week.row, !collapsed);
        self.persist();
        Some(collapsed)
    }

    /// Finds the first matching card, highlights it and brings it on screen.
    /// A global hit outside the window first grows the window to include it.
    /// A miss leaves a short-lived notice.
    pub fn search(
        &mut self,
        query: &str,
        scope: SearchScope,
        viewport: &mut dyn Viewport,
        now: OffsetDateTime,
    ) -> Option<SearchHit> {
        let needle = normalize_query(query)?;
        self.view.clear_search_hits();
        self.highlight_until = None;
        let hit = match scope {
            SearchScope::Visible => search_visible(&self.view, query),
            SearchScope::Global => {
                self.commit_all_edits();
                let hit = search_store(&self.store, query);
                if let Some(hit) = &hit {
                    self.bring_into_view(hit.date, viewport);
                }
                hit
            }
        };
        let Some(hit) = hit else {
            tracing::debug!(query = %needle, ?scope, "search miss");
            self.notices.transient(
                format!("No card contains \"{}\"", query.trim()),
                now + self.search.miss_notice_duration(),
            );
            return None;
        };
        if let Some(week) = self.view.row_of(hit.date).map(|row| row.week) {
            if let Some(row) = self.view.row_mut(week.owner, week.row) {
                row.collapsed = false;
            }
        }
        if let Some(card) = self.view.card_mut(hit.id) {
            card.search_hit = true;
        }
        self.highlight_until = Some(now + self.search.highlight_duration());
        viewport.reveal_card(hit.id);
        Some(hit)
    }

    fn bring_into_view(&mut self, date: Date, viewport: &mut dyn Viewport) {
        if self.view.is_materialized(date) {
            return;
        }
        let token = self.range.suppress();
        let change = self.range.include(date);
        if !self.options.show_weekends && is_weekend(date) {
            self.options.show_weekends = true;
        }
        self.rebuild_view();
        viewport.layout(&self.view);
        self.range.release(token);
        tracing::debug!(?change, date = %date, "range adjusted for search hit");
    }
}
