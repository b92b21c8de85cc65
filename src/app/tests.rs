use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use tempfile::TempDir;
use time::macros::{date, datetime};
use time::Date;

use super::*;
use crate::board::{Card, CardColor, CardContent, CardId, CardStore};
use crate::config::AppConfig;
use crate::range::RangeChange;
use crate::remote::fake::FakeService;
use crate::remote::{RemoteError, RemoteWorker};
use crate::sanitize::{ImageUploads, SanitizeError};
use crate::search::SearchScope;
use crate::storage::{self, MemorySnapshotStore};
use crate::view::{CardBox, HeadlessViewport, Rect, Viewport};

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.range.months_before = 0;
    config.range.months_after = 0;
    config
}

const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

fn store_with(cards: &[(Date, &str)]) -> CardStore {
    let mut store = CardStore::default();
    for (date, text) in cards {
        let id = store.mint_id();
        store.upsert(*date, Card::new(id, CardContent::plain(*text)));
    }
    store
}

fn board_at(store: CardStore, today: Date) -> (Board, Arc<MemorySnapshotStore>) {
    let memory = Arc::new(MemorySnapshotStore::new());
    let board = Board::with_store(store, &config(), Box::new(memory.clone()), today);
    (board, memory)
}

fn ids_on(board: &Board, date: Date) -> Vec<CardId> {
    board.get_cards(date).iter().map(|c| c.id).collect()
}

fn view_ids_on(board: &Board, date: Date) -> Vec<CardId> {
    board
        .view()
        .day(date)
        .map(|day| day.cards.iter().map(|c| c.id).collect())
        .unwrap_or_default()
}

fn persisted(memory: &MemorySnapshotStore) -> serde_json::Value {
    let raw = memory.contents().unwrap_or_default();
    serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null)
}

fn assert_ids_unique(store: &CardStore) {
    assert!(store.anomalies().is_empty(), "{:?}", store.anomalies());
}

#[test]
fn creating_a_card_on_an_empty_board() {
    let (mut board, memory) = board_at(CardStore::default(), date!(2025 - 06 - 10));
    assert_eq!(board.add_card(date!(2025 - 06 - 10), "Buy milk"), Ok(1));
    assert_eq!(
        persisted(&memory),
        json!({
            "nextId": 2,
            "cards": {"2025-06-10": [{"id": 1, "text": "Buy milk", "done": false, "color": "default"}]},
            "weekVisibility": {}
        })
    );
}

#[test]
fn day_activation_creates_card_in_edit_mode() {
    let (mut board, _memory) = board_at(CardStore::default(), date!(2025 - 06 - 10));
    let id = board.activate_day(date!(2025 - 06 - 10)).expect("day is on screen");
    assert!(board.view().card(id).map(|c| c.is_editing()).unwrap_or(false));
    assert_eq!(board.get_cards(date!(2025 - 06 - 10))[0].text(), "");

    assert!(board.update_edit(id, "Buy milk"));
    assert_eq!(board.get_cards(date!(2025 - 06 - 10))[0].text(), "");
    assert!(board.commit_edit(id));
    assert!(!board.commit_edit(id));
    assert_eq!(board.get_cards(date!(2025 - 06 - 10))[0].text(), "Buy milk");
    assert_eq!(board.store().next_id(), 2);

    assert_eq!(board.activate_day(date!(2019 - 01 - 01)), None);
}

#[test]
fn starting_another_edit_commits_the_open_one() {
    let (mut board, _memory) = board_at(
        store_with(&[(date!(2025 - 06 - 10), "a"), (date!(2025 - 06 - 11), "b")]),
        date!(2025 - 06 - 10),
    );
    assert!(board.begin_edit(1));
    assert!(board.update_edit(1, "a!"));
    assert!(board.begin_edit(2));
    assert_eq!(board.get_cards(date!(2025 - 06 - 10))[0].text(), "a!");
    assert!(board.view().card(2).map(|c| c.is_editing()).unwrap_or(false));
}

#[test]
fn dragging_a_card_to_the_top_of_the_next_day() {
    let (mut board, _memory) = board_at(
        store_with(&[(date!(2025 - 06 - 10), "one"), (date!(2025 - 06 - 10), "two")]),
        date!(2025 - 06 - 10),
    );
    assert_eq!(board.begin_drag(2), Some(vec![2]));
    let slot = board.hover(date!(2025 - 06 - 11), 0.0, &[]).expect("valid day");
    assert_eq!(slot.index, 0);
    assert_eq!(board.view().placeholder(), Some((date!(2025 - 06 - 11), 0)));

    let outcome = board.drop_cards().expect("dropped");
    assert_eq!(outcome.moved, vec![2]);
    assert!(outcome.affected.contains(&date!(2025 - 06 - 10)));
    assert!(outcome.affected.contains(&date!(2025 - 06 - 11)));
    assert_eq!(ids_on(&board, date!(2025 - 06 - 10)), vec![1]);
    assert_eq!(ids_on(&board, date!(2025 - 06 - 11)), vec![2]);
    assert_eq!(board.view().placeholder(), None);
    assert_ids_unique(board.store());
}

#[test]
fn drop_position_follows_card_midpoints() {
    let day = date!(2025 - 06 - 12);
    let (mut board, _memory) = board_at(
        store_with(&[(day, "a"), (day, "b"), (day, "c"), (date!(2025 - 06 - 10), "moving")]),
        date!(2025 - 06 - 10),
    );
    let boxes = [
        CardBox::new(1, Rect::new(0.0, 0.0, 100.0, 20.0)),
        CardBox::new(2, Rect::new(0.0, 20.0, 100.0, 20.0)),
        CardBox::new(3, Rect::new(0.0, 40.0, 100.0, 20.0)),
    ];
    board.begin_drag(4);
    assert_eq!(board.hover(day, 25.0, &boxes).map(|s| s.index), Some(1));
    board.drop_cards();
    assert_eq!(ids_on(&board, day), vec![1, 4, 2, 3]);
    assert_eq!(view_ids_on(&board, day), vec![1, 4, 2, 3]);
}

#[test]
fn multi_card_drag_keeps_relative_order() {
    let (a, b) = (date!(2025 - 06 - 10), date!(2025 - 06 - 17));
    let (mut board, _memory) = board_at(
        store_with(&[(a, "1"), (a, "2"), (a, "3"), (b, "4")]),
        date!(2025 - 06 - 10),
    );
    assert!(board.toggle_select(1));
    assert!(board.toggle_select(3));
    let carried = board.begin_drag(3).expect("drag");
    assert_eq!(carried, vec![1, 3]);
    board.hover(b, 999.0, &[CardBox::new(4, Rect::new(0.0, 0.0, 10.0, 10.0))]);
    board.drop_cards();
    assert_eq!(ids_on(&board, a), vec![2]);
    assert_eq!(ids_on(&board, b), vec![4, 1, 3]);
    assert_ids_unique(board.store());
}

#[test]
fn grabbing_an_unselected_card_resets_the_selection() {
    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(store_with(&[(a, "1"), (a, "2")]), a);
    board.toggle_select(1);
    assert_eq!(board.begin_drag(2), Some(vec![2]));
    assert_eq!(board.selected(), vec![2]);
    board.cancel_drag();
}

#[test]
fn cancelled_drag_leaves_store_untouched() {
    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(store_with(&[(a, "1"), (a, "2")]), a);
    let before = board.store().clone();

    board.begin_drag(1);
    board.hover(date!(2025 - 06 - 11), 0.0, &[]);
    board.leave_destination();
    assert_eq!(board.drop_cards(), None);
    assert_eq!(board.store(), &before);

    board.begin_drag(2);
    board.cancel_drag();
    assert!(!board.is_dragging());
    assert_eq!(board.store(), &before);
    assert!(board.view().cards().all(|(_, c)| !c.dragging));
}

#[test]
fn moving_there_and_back_leaves_one_copy() {
    let (a, b) = (date!(2025 - 06 - 10), date!(2025 - 06 - 11));
    let (mut board, _memory) = board_at(store_with(&[(a, "x")]), a);
    board.move_cards(&[1], b, None);
    board.move_cards(&[1], a, None);
    assert_eq!(ids_on(&board, a), vec![1]);
    assert!(ids_on(&board, b).is_empty());
    assert!(!board.store().cards_map().contains_key(&b));
    assert_ids_unique(board.store());
}

#[test]
fn moving_to_and_from_days_off_screen() {
    let (a, far) = (date!(2025 - 06 - 10), date!(2026 - 02 - 01));
    let (mut board, _memory) = board_at(store_with(&[(a, "x"), (far, "y")]), a);
    let outcome = board.move_cards(&[1], far, Some(0)).expect("moved");
    assert_eq!(outcome.destination, far);
    assert_eq!(ids_on(&board, far), vec![1, 2]);
    assert!(board.view().card(1).is_none());

    board.move_cards(&[2], a, None);
    assert_eq!(ids_on(&board, a), vec![2]);
    assert_eq!(view_ids_on(&board, a), vec![2]);
    assert_eq!(board.move_cards(&[99], a, None), None);
}

#[test]
fn reconcile_is_idempotent() {
    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(store_with(&[(a, "1"), (a, "2"), (date!(2025 - 06 - 20), "3")]), a);
    board.reconcile_from_view();
    let once = board.store().clone();
    board.reconcile_from_view();
    assert_eq!(board.store(), &once);
}

#[test]
fn reconcile_leaves_hidden_days_alone() {
    let (weekday, saturday) = (date!(2025 - 06 - 10), date!(2025 - 06 - 14));
    let (mut board, _memory) = board_at(store_with(&[(weekday, "w"), (saturday, "s")]), weekday);
    let mut viewport = HeadlessViewport::new(300.0, 100.0);
    assert!(!board.toggle_weekends(&mut viewport));
    assert!(!board.view().is_materialized(saturday));
    board.toggle_done(1);
    assert_eq!(ids_on(&board, saturday), vec![2]);
}

#[test]
fn deleting_the_last_card_prunes_the_day() {
    let a = date!(2025 - 06 - 10);
    let (mut board, memory) = board_at(store_with(&[(a, "only")]), a);
    assert!(board.delete_card(1));
    assert!(board.get_cards(a).is_empty());
    assert!(!board.store().cards_map().contains_key(&a));
    assert_eq!(persisted(&memory)["cards"], json!({}));
    assert!(!board.delete_card(1));
}

#[test]
fn batch_delete_removes_selection() {
    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(store_with(&[(a, "1"), (a, "2"), (a, "3")]), a);
    let boxes = [
        CardBox::new(1, Rect::new(0.0, 0.0, 100.0, 20.0)),
        CardBox::new(2, Rect::new(0.0, 20.0, 100.0, 20.0)),
        CardBox::new(3, Rect::new(0.0, 40.0, 100.0, 20.0)),
    ];
    assert_eq!(board.select_in_rect(Rect::from_corners((10.0, 5.0), (50.0, 30.0)), &boxes, false), 2);
    assert_eq!(board.delete_selected(), 2);
    assert_eq!(ids_on(&board, a), vec![3]);
    board.clear_selection();
    assert_eq!(board.delete_selected(), 0);
}

#[test]
fn undo_with_only_the_baseline_is_a_noop() {
    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(store_with(&[(a, "1")]), a);
    let before = board.store().clone();
    assert!(!board.undo());
    assert_eq!(board.store(), &before);
}

#[test]
fn undo_walks_back_every_recorded_mutation() -> anyhow::Result<()> {
    let (a, b) = (date!(2025 - 06 - 10), date!(2025 - 06 - 11));
    let (mut board, _memory) = board_at(store_with(&[(a, "1"), (a, "2")]), a);
    let mut states = vec![storage::encode(board.store())?];

    board.add_card(b, "three")?;
    states.push(storage::encode(board.store())?);
    board.cycle_color(1);
    states.push(storage::encode(board.store())?);
    board.toggle_done(2);
    states.push(storage::encode(board.store())?);
    board.move_cards(&[2], b, Some(0));
    states.push(storage::encode(board.store())?);
    board.delete_card(1);

    while let Some(expected) = states.pop() {
        assert!(board.undo());
        assert_eq!(storage::encode(board.store())?, expected);
    }
    assert!(!board.undo());
    Ok(())
}

#[test]
fn color_cycles_through_the_palette() {
    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(store_with(&[(a, "1")]), a);
    let colors: Vec<_> = (0..4).filter_map(|_| board.cycle_color(1)).collect();
    assert_eq!(
        colors,
        vec![CardColor::Yellow, CardColor::Green, CardColor::Pink, CardColor::Default]
    );
    assert_eq!(board.toggle_done(1), Some(true));
    assert_eq!(board.view().day(a).map(|d| d.badge().is_complete()), Some(true));
    assert_eq!(board.toggle_done(42), None);
}

#[test]
fn global_search_expands_the_range_to_the_hit() {
    let june = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(
        store_with(&[(june, "Buy milk"), (date!(2025 - 07 - 20), "Call bank")]),
        date!(2025 - 07 - 15),
    );
    let mut viewport = HeadlessViewport::new(300.0, 100.0);
    assert!(!board.range().contains(june));
    assert!(board
        .search("milk", SearchScope::Visible, &mut viewport, datetime!(2025-07-15 10:00 UTC))
        .is_none());

    let hit = board
        .search("milk", SearchScope::Global, &mut viewport, datetime!(2025-07-15 10:00 UTC))
        .expect("global hit");
    assert_eq!((hit.date, hit.id), (june, 1));
    assert!(board.range().contains(june));
    assert!(board.range().contains(date!(2025 - 07 - 15)));
    assert!(board.view().card(1).map(|c| c.search_hit).unwrap_or(false));
    assert_eq!(board.view().row_of(june).map(|r| r.collapsed), Some(false));
    assert_eq!(viewport.revealed_card, Some(1));
    assert!(!board.range().is_suppressed());

    board.tick(datetime!(2025-07-15 10:00:05 UTC));
    assert!(board.view().cards().all(|(_, c)| !c.search_hit));
}

#[test]
fn search_miss_leaves_a_transient_notice() {
    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(store_with(&[(a, "1")]), a);
    let mut viewport = HeadlessViewport::new(300.0, 100.0);
    let now = datetime!(2025-06-10 09:00 UTC);
    assert!(board.search("zzz", SearchScope::Visible, &mut viewport, now).is_none());
    assert_eq!(board.notices().iter().count(), 1);
    assert!(board.notices().iter().all(|n| !n.is_blocking()));
    board.tick(now + time::Duration::seconds(2));
    assert!(board.notices().is_empty());
    assert!(board.search("   ", SearchScope::Global, &mut viewport, now).is_none());
    assert!(board.notices().is_empty());
}

#[test]
fn scrolling_near_the_top_prepends_and_keeps_position() {
    let (mut board, _memory) = board_at(CardStore::default(), date!(2025 - 07 - 15));
    let mut viewport = HeadlessViewport::new(300.0, 100.0);
    viewport.layout(board.view());
    assert_eq!(viewport.metrics().content_height, 500.0);
    viewport.set_scroll_offset(150.0);

    assert_eq!(board.handle_scroll(&mut viewport), RangeChange::Prepended);
    assert_eq!(viewport.metrics().content_height, 900.0);
    assert_eq!(viewport.metrics().offset, 550.0);
    assert!(!board.range().is_extending());
    // Now 50px from the bottom.
    assert_eq!(board.handle_scroll(&mut viewport), RangeChange::Appended);
    assert_eq!(viewport.metrics().offset, 550.0);
}

#[test]
fn scrolling_near_the_bottom_appends() {
    let (mut board, _memory) = board_at(CardStore::default(), date!(2025 - 07 - 15));
    let mut viewport = HeadlessViewport::new(100.0, 100.0);
    viewport.layout(board.view());
    viewport.set_scroll_offset(400.0);
    let end_before = board.range().end();
    assert_eq!(board.handle_scroll(&mut viewport), RangeChange::Appended);
    assert_eq!(board.range().end(), end_before.next());
    assert_eq!(viewport.metrics().offset, 400.0);
}

#[test]
fn month_jumps_recenter_the_window() {
    let (mut board, _memory) = board_at(CardStore::default(), date!(2025 - 07 - 15));
    let mut viewport = HeadlessViewport::new(300.0, 100.0);
    board.next_month(&mut viewport);
    assert_eq!(board.focus_month().first_day(), date!(2025 - 08 - 01));
    assert!(board.range().contains(date!(2025 - 08 - 20)));
    assert!(!board.range().contains(date!(2025 - 07 - 20)));
    board.jump_to_today(&mut viewport);
    assert_eq!(viewport.revealed_date, Some(date!(2025 - 07 - 15)));
    assert!(board.range().contains(date!(2025 - 07 - 15)));
    board.previous_month(&mut viewport);
    assert_eq!(board.focus_month().first_day(), date!(2025 - 06 - 01));
    assert!(board.range().contains(date!(2025 - 06 - 15)));
    assert!(!board.range().is_suppressed());
}

#[test]
fn week_row_toggle_is_persisted() {
    let today = date!(2025 - 06 - 10);
    let (mut board, memory) = board_at(CardStore::default(), today);
    assert_eq!(board.view().row_of(today).map(|r| r.collapsed), Some(false));
    assert_eq!(board.toggle_week_row(today), Some(true));
    assert_eq!(persisted(&memory)["weekVisibility"], json!({"2025-06": [null, false]}));
    assert_eq!(board.toggle_week_row(date!(2025 - 06 - 24)), Some(false));
}

#[test]
fn copy_and_paste_mint_fresh_ids() {
    let (a, b) = (date!(2025 - 06 - 10), date!(2025 - 06 - 11));
    let (mut board, _memory) = board_at(store_with(&[(a, "one"), (a, "two")]), a);
    board.toggle_done(2);
    board.toggle_select(1);
    board.toggle_select(2);
    let raw = board.copy_selection(None).expect("payload");
    let ids = board.paste(b, &raw).expect("pasted");
    assert_eq!(ids, vec![3, 4]);
    let pasted = board.get_cards(b);
    assert_eq!(pasted[0].text(), "one");
    assert!(pasted[1].done);
    assert_ids_unique(board.store());

    board.clear_selection();
    assert!(board.copy_selection(Some(1)).is_some());
    assert!(board.copy_selection(None).is_none());
}

#[test]
fn rejected_paste_changes_nothing() {
    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(store_with(&[(a, "1")]), a);
    let before = board.store().clone();
    let too_long = "x".repeat(20_000);
    assert_matches!(board.paste(a, &too_long), Err(SanitizeError::TextTooLong { .. }));
    assert_matches!(board.paste(a, "   "), Err(SanitizeError::Empty));
    assert_eq!(board.store(), &before);
    assert!(!board.history().can_undo());

    let ids = board.paste(a, "<p>from <b>web</b></p>").expect("foreign paste");
    assert_eq!(board.get_cards(a)[1].text(), "from web");
    assert_eq!(ids, vec![2]);
}

#[test]
fn image_upload_lands_in_card() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("dot.png");
    std::fs::write(&path, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])?;

    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(store_with(&[(a, "pic")]), a);
    board.attach_uploads(ImageUploads::spawn(1024)?);
    assert!(board.upload_image(1, &path));
    assert!(board.wait_upload());
    let card = &board.get_cards(a)[0];
    assert_eq!(card.content.images.len(), 1);
    assert_eq!(card.content.images[0].at, 3);
    assert!(board.notices().is_empty());

    assert_matches!(
        board.insert_image(1, "https://example.com/cat.png"),
        Err(ImageError::Rejected(SanitizeError::UnsupportedImage))
    );
    Ok(())
}

#[test]
fn images_for_missing_cards_are_refused() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("dot.png");
    std::fs::write(&path, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])?;

    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(store_with(&[(a, "pic")]), a);
    assert_matches!(board.insert_image(42, PIXEL), Err(ImageError::UnknownCard(42)));
    assert!(!board.history().can_undo());

    board.attach_uploads(ImageUploads::spawn(1024)?);
    assert!(!board.upload_image(42, &path));
    assert!(!board.wait_upload());

    // The card goes away while its image is still being encoded.
    assert!(board.upload_image(1, &path));
    assert!(board.delete_card(1));
    assert!(!board.wait_upload());
    assert!(board.store().is_empty());
    assert_matches!(
        board.notices().iter().next(),
        Some(notice) if notice.message.contains("#1 no longer exists")
    );
    Ok(())
}

#[test]
fn storage_failure_keeps_working_in_memory() {
    let a = date!(2025 - 06 - 10);
    let (mut board, memory) = board_at(CardStore::default(), a);
    memory.set_failing(true);
    assert_eq!(board.add_card(a, "still here"), Ok(1));
    assert_eq!(board.get_cards(a).len(), 1);
    assert!(memory.contents().is_none());
    assert!(board.notices().is_empty());
}

#[test]
fn pretty_option_formats_the_local_snapshot() {
    let a = date!(2025 - 06 - 10);
    let memory = Arc::new(MemorySnapshotStore::new());
    let mut config = config();
    config.storage.pretty = true;
    let mut board = Board::with_store(CardStore::default(), &config, Box::new(memory.clone()), a);
    board.add_card(a, "Buy milk").expect("card");
    let raw = memory.contents().unwrap_or_default();
    assert!(raw.contains("\n  \"nextId\": 2"));
    assert_eq!(persisted(&memory)["cards"]["2025-06-10"][0]["text"], json!("Buy milk"));
}

#[test]
fn load_tolerates_a_corrupt_record() {
    let memory = MemorySnapshotStore::with_contents("{\"nextId\": 9, \"cards\": 3}");
    let board = Board::load(&config(), Box::new(memory), date!(2025 - 06 - 10));
    assert!(board.store().is_empty());
    assert_eq!(board.store().next_id(), 9);
}

#[test]
fn oversized_counter_in_record_still_mints_positive_ids() {
    let a = date!(2025 - 06 - 10);
    let memory = MemorySnapshotStore::with_contents(r#"{"nextId": 1e30, "cards": {}}"#);
    let mut board = Board::load(&config(), Box::new(memory), a);
    assert_eq!(board.add_card(a, "first"), Ok(1));
    assert_eq!(board.add_card(a, "second"), Ok(2));
    assert_eq!(ids_on(&board, a), vec![1, 2]);
}

#[test]
fn remote_round_trip_replaces_board_and_resets_history() -> anyhow::Result<()> {
    let a = date!(2025 - 06 - 10);
    let service = FakeService::default();
    let (mut board, memory) = board_at(store_with(&[(a, "local")]), a);
    board.attach_remote(RemoteWorker::spawn(Box::new(service.clone()))?);

    assert!(board.publish_remote(datetime!(2025-06-10 08:00 UTC)));
    assert_matches!(board.wait_remote(), Some(Ok(())));
    assert_eq!(service.records.lock()[0].0, "2025-06-10 08:00:00");

    board.add_card(a, "after publish")?;
    assert!(board.history().can_undo());
    assert!(board.fetch_remote());
    assert_matches!(board.wait_remote(), Some(Ok(())));
    assert_eq!(ids_on(&board, a), vec![1]);
    assert!(!board.history().can_undo());
    assert_eq!(persisted(&memory)["nextId"], json!(2));
    assert!(board.wait_remote().is_none());
    Ok(())
}

#[test]
fn invalid_remote_snapshot_is_reported_and_ignored() -> anyhow::Result<()> {
    let a = date!(2025 - 06 - 10);
    let service = FakeService::default();
    service.push_raw("{\"cards\": [], \"nextId\": 3}");
    let (mut board, _memory) = board_at(store_with(&[(a, "local")]), a);
    board.attach_remote(RemoteWorker::spawn(Box::new(service.clone()))?);
    let before = board.store().clone();

    board.fetch_remote();
    assert_matches!(board.wait_remote(), Some(Err(RemoteError::Invalid(_))));
    assert_eq!(board.store(), &before);

    service.fail_with(RemoteError::Http {
        status: 401,
        body: String::new(),
    });
    board.fetch_remote();
    assert_matches!(board.wait_remote(), Some(Err(RemoteError::Http { status: 401, .. })));

    let blocking: Vec<_> = board.notices().iter().filter(|n| n.is_blocking()).collect();
    assert_eq!(blocking.len(), 2);
    assert!(blocking.iter().all(|n| n.level == NoticeLevel::Error));
    Ok(())
}

#[test]
fn remote_calls_without_a_service_explain_themselves() {
    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(CardStore::default(), a);
    assert!(!board.publish_remote(datetime!(2025-06-10 08:00 UTC)));
    assert!(!board.fetch_remote());
    assert_eq!(board.notices_mut().drain().len(), 2);
}

#[test]
fn export_writes_dated_file() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(store_with(&[(a, "x")]), a);
    let path = board.export(temp.path())?;
    assert!(path.ends_with("daynote-20250610.json"));
    Ok(())
}

#[test]
fn commands_drive_the_same_engine() {
    let a = date!(2025 - 06 - 10);
    let (mut board, _memory) = board_at(CardStore::default(), a);
    assert_eq!(
        board.apply(Command::Add {
            date: a,
            text: "cmd".into()
        }),
        CommandOutcome::Created(vec![1])
    );
    assert_eq!(
        board.apply(Command::SetColor {
            id: 1,
            color: CardColor::Green
        }),
        CommandOutcome::Colored(CardColor::Green)
    );
    assert_eq!(board.apply(Command::ToggleDone(1)), CommandOutcome::Done(true));
    assert_eq!(board.apply(Command::Delete(7)), CommandOutcome::Ignored);
    assert_eq!(board.apply(Command::Undo), CommandOutcome::Undone);
    assert!(!board.get_cards(a)[0].done);
    assert!(!CommandOutcome::Ignored.changed());
}
