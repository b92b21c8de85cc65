use time::Date;

use crate::calendar::YearMonth;
use crate::config::RangeConfig;
use crate::view::ScrollMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollEdge {
    Top,
    Bottom,
}

/// How a range change was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeChange {
    Unchanged,
    Prepended,
    Appended,
    Recentered,
}

/// The contiguous window `[start, end)` of materialized months.
#[derive(Debug, Clone)]
pub struct RangeManager {
    start: YearMonth,
    end: YearMonth,
    months_before: u32,
    months_after: u32,
    edge_threshold: f64,
    max_span_months: u32,
    extending: bool,
    suppressed: bool,
}

impl RangeManager {
    pub fn new(today: Date, config: &RangeConfig) -> Self {
        let mut manager = Self {
            start: YearMonth::of(today),
            end: YearMonth::of(today).next(),
            months_before: config.months_before,
            months_after: config.months_after,
            edge_threshold: config.edge_threshold,
            max_span_months: config.max_span_months.max(1),
            extending: false,
            suppressed: false,
        };
        manager.center_on(YearMonth::of(today));
        manager
    }

    pub fn start(&self) -> YearMonth {
        self.start
    }

    pub fn end(&self) -> YearMonth {
        self.end
    }

    pub fn span_months(&self) -> i32 {
        self.start.months_until(self.end)
    }

    pub fn contains(&self, date: Date) -> bool {
        let month = YearMonth::of(date);
        month >= self.start && month < self.end
    }

    pub fn is_extending(&self) -> bool {
        self.extending
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Which edge, if any, a scroll position is close enough to for an
    /// extension. Always `None` while suppressed or mid-extension.
    pub fn edge_for(&self, metrics: ScrollMetrics) -> Option<ScrollEdge> {
        if self.suppressed || self.extending {
            return None;
        }
        if metrics.offset <= self.edge_threshold {
            return Some(ScrollEdge::Top);
        }
        let bottom_gap = metrics.content_height - (metrics.offset + metrics.viewport_height);
        if bottom_gap <= self.edge_threshold {
            return Some(ScrollEdge::Bottom);
        }
        None
    }

    /// Enters the re-entrancy guard. Returns false if an extension is already running.
    pub fn begin_extension(&mut self) -> bool {
        if self.extending {
            return false;
        }
        self.extending = true;
        true
    }

    pub fn finish_extension(&mut self) {
        self.extending = false;
    }

    pub fn extend(&mut self, edge: ScrollEdge) -> RangeChange {
        match edge {
            ScrollEdge::Top => {
                self.start = self.start.previous();
                RangeChange::Prepended
            }
            ScrollEdge::Bottom => {
                self.end = self.end.next();
                RangeChange::Appended
            }
        }
    }

    /// Grows the window just enough to contain `date`. A target further away
    /// than the maximum span recenters the window on it instead.
    pub fn include(&mut self, date: Date) -> RangeChange {
        if self.contains(date) {
            return RangeChange::Unchanged;
        }
        let month = YearMonth::of(date);
        let new_start = self.start.min(month);
        let new_end = self.end.max(month.next());
        if new_start.months_until(new_end) > self.max_span_months as i32 {
            self.center_on(month);
            return RangeChange::Recentered;
        }
        let change = if month < self.start {
            RangeChange::Prepended
        } else {
            RangeChange::Appended
        };
        self.start = new_start;
        self.end = new_end;
        change
    }

    /// Resets the window around `month` (jump to today / month picker).
    pub fn center_on(&mut self, month: YearMonth) {
        self.start = month.add_months(-(self.months_before as i32));
        self.end = month.add_months(self.months_after as i32 + 1);
    }

    /// Silences scroll-driven extension until the returned token is handed
    /// back to [`RangeManager::release`].
    pub fn suppress(&mut self) -> SuppressToken {
        let was = self.suppressed;
        self.suppressed = true;
        SuppressToken { was }
    }

    pub fn release(&mut self, token: SuppressToken) {
        self.suppressed = token.was;
    }
}

/// Restores the previous suppression state when released.
#[must_use = "hand the token back to RangeManager::release"]
#[derive(Debug)]
pub struct SuppressToken {
    was: bool,
}
