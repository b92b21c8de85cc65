//! The persisted snapshot record.
//!
//! ```json
//! {"nextId": 3,
//!  "cards": {"2025-06-10": [{"id": 1, "text": "Buy milk", "done": false, "color": "default"}]},
//!  "weekVisibility": {"2025-06": [null, true]}}
//! ```
//!
//! Decoding never trusts the shape: every field is checked on its own and
//! replaced by a typed default when it does not fit.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use time::Date;

use crate::board::{Card, CardColor, CardContent, CardId, CardStore, InlineImage, MAX_CARD_ID};
use crate::calendar::{date_key, parse_date_key, YearMonth};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot has an unexpected shape: {0}")]
    Shape(&'static str),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreRecord<'a> {
    next_id: CardId,
    cards: BTreeMap<String, &'a [Card]>,
    week_visibility: BTreeMap<String, &'a [Option<bool>]>,
}

impl<'a> StoreRecord<'a> {
    fn of(store: &'a CardStore) -> Self {
        Self {
            next_id: store.next_id(),
            cards: store
                .iter()
                .map(|(date, cards)| (date_key(date), cards))
                .collect(),
            week_visibility: store
                .week_visibility_map()
                .iter()
                .map(|(month, rows)| (month.key(), rows.as_slice()))
                .collect(),
        }
    }
}

pub fn encode(store: &CardStore) -> serde_json::Result<String> {
    serde_json::to_string(&StoreRecord::of(store))
}

pub fn encode_pretty(store: &CardStore) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&StoreRecord::of(store))
}

/// Lenient decode for the local record: anything unreadable becomes an empty
/// store, anything partially broken keeps what can be salvaged.
pub fn decode_lenient(raw: &str) -> CardStore {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => store_from_value(&value),
        Err(err) => {
            tracing::warn!(?err, "local snapshot is not JSON, starting empty");
            CardStore::default()
        }
    }
}

/// Strict entry check for snapshots coming from the remote service: `cards`
/// must be a mapping and `nextId` a number before anything is replaced.
pub fn decode_remote(raw: &str) -> Result<CardStore, SnapshotError> {
    let value: Value = serde_json::from_str(raw)?;
    let root = value
        .as_object()
        .ok_or(SnapshotError::Shape("root is not an object"))?;
    if !root.get("cards").map(Value::is_object).unwrap_or(false) {
        return Err(SnapshotError::Shape("`cards` is not a mapping"));
    }
    if !root.get("nextId").map(Value::is_number).unwrap_or(false) {
        return Err(SnapshotError::Shape("`nextId` is not a number"));
    }
    Ok(store_from_value(&value))
}

fn store_from_value(value: &Value) -> CardStore {
    let Some(root) = value.as_object() else {
        tracing::warn!("snapshot root is not an object, starting empty");
        return CardStore::default();
    };
    let cards = cards_from(root);
    let week_visibility = week_visibility_from(root);
    let next_id = root
        .get("nextId")
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 1.0 && *n <= MAX_CARD_ID as f64)
        .map(|n| n.floor() as CardId)
        .unwrap_or(1);
    CardStore::from_parts(next_id, cards, week_visibility)
}

fn cards_from(root: &Map<String, Value>) -> BTreeMap<Date, Vec<Card>> {
    let mut out = BTreeMap::new();
    let Some(buckets) = root.get("cards") else {
        return out;
    };
    let Some(buckets) = buckets.as_object() else {
        tracing::warn!("snapshot `cards` is not a mapping, ignoring it");
        return out;
    };
    let mut seen: HashSet<CardId> = HashSet::new();
    for (key, list) in buckets {
        let Some(date) = parse_date_key(key) else {
            tracing::warn!(key = %key, "skipping bucket with malformed date key");
            continue;
        };
        let Some(items) = list.as_array() else {
            tracing::warn!(key = %key, "skipping bucket that is not a list");
            continue;
        };
        let mut bucket = Vec::with_capacity(items.len());
        for item in items {
            match card_from(item) {
                Some(card) if seen.insert(card.id) => bucket.push(card),
                Some(card) => {
                    tracing::warn!(card_id = card.id, key = %key, "skipping duplicate card id")
                }
                None => tracing::warn!(key = %key, "skipping malformed card"),
            }
        }
        if !bucket.is_empty() {
            out.insert(date, bucket);
        }
    }
    out
}

fn card_from(value: &Value) -> Option<Card> {
    let obj = value.as_object()?;
    let id = positive_id(obj.get("id")?)?;
    let text = obj
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut content = CardContent::plain(text);
    let len = content.char_len();
    if let Some(images) = obj.get("images").and_then(Value::as_array) {
        for image in images {
            let Some(image) = image.as_object() else {
                continue;
            };
            let src = image.get("src").and_then(Value::as_str).unwrap_or_default();
            if !src.starts_with("data:image/") {
                continue;
            }
            let at = image
                .get("at")
                .and_then(Value::as_u64)
                .map(|n| (n as usize).min(len))
                .unwrap_or(len);
            content.images.push(InlineImage {
                at,
                src: src.to_string(),
            });
        }
    }
    Some(Card {
        id,
        content,
        done: obj.get("done").and_then(Value::as_bool).unwrap_or(false),
        color: obj
            .get("color")
            .and_then(Value::as_str)
            .map(CardColor::parse_lenient)
            .unwrap_or_default(),
    })
}

fn positive_id(value: &Value) -> Option<CardId> {
    if let Some(id) = value.as_u64() {
        return (1..=MAX_CARD_ID).contains(&id).then_some(id);
    }
    let float = value.as_f64()?;
    if float.is_finite() && float >= 1.0 && float.fract() == 0.0 && float <= MAX_CARD_ID as f64 {
        Some(float as CardId)
    } else {
        None
    }
}

fn week_visibility_from(root: &Map<String, Value>) -> BTreeMap<YearMonth, Vec<Option<bool>>> {
    let mut out = BTreeMap::new();
    let Some(months) = root.get("weekVisibility").and_then(Value::as_object) else {
        return out;
    };
    for (key, rows) in months {
        let (Some(month), Some(rows)) = (YearMonth::parse(key), rows.as_array()) else {
            tracing::warn!(key = %key, "skipping malformed week visibility entry");
            continue;
        };
        out.insert(month, rows.iter().map(Value::as_bool).collect());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::date;

    #[test]
    fn encodes_the_documented_record_shape() -> anyhow::Result<()> {
        let mut store = CardStore::default();
        let id = store.mint_id();
        store.upsert(date!(2025 - 06 - 10), Card::new(id, CardContent::plain("Buy milk")));
        insta::assert_snapshot!(encode_pretty(&store)?, @r###"
        {
          "nextId": 2,
          "cards": {
            "2025-06-10": [
              {
                "id": 1,
                "text": "Buy milk",
                "done": false,
                "color": "default"
              }
            ]
          },
          "weekVisibility": {}
        }
        "###);
        Ok(())
    }

    #[test]
    fn garbage_decodes_to_empty_store() {
        assert_eq!(decode_lenient("not json"), CardStore::default());
        assert_eq!(decode_lenient("[1,2,3]"), CardStore::default());
        assert_eq!(decode_lenient("{}"), CardStore::default());
    }

    #[test]
    fn oversized_ids_and_counters_are_discarded() {
        let store = decode_lenient(
            r#"{"nextId": 1, "cards": {"2025-06-10": [
                {"id": 18446744073709551615, "text": "u64 max"},
                {"id": 9007199254740992, "text": "past 2^53"},
                {"id": 5, "text": "ok"}
            ]}}"#,
        );
        assert_eq!(store.card_count(), 1);
        assert_eq!(store.get_cards(date!(2025 - 06 - 10))[0].id, 5);
        assert_eq!(store.next_id(), 6);

        let mut store = decode_lenient(r#"{"nextId": 1e30, "cards": {}}"#);
        assert_eq!(store.next_id(), 1);
        assert_eq!(store.mint_id(), 1);
        assert_eq!(store.mint_id(), 2);
    }

    #[test]
    fn partial_corruption_is_tolerated_field_by_field() {
        let raw = r#"{
            "nextId": "seven",
            "cards": {
                "2025-06-10": [
                    {"id": 3, "text": "ok", "done": "yes", "color": "mauve"},
                    {"id": -1, "text": "negative id"},
                    {"id": 2.5, "text": "fractional id"},
                    {"id": 3, "text": "duplicate"},
                    "not a card"
                ],
                "tomorrow": [{"id": 9, "text": "bad key"}],
                "2025-06-11": {"id": 10}
            },
            "weekVisibility": {"2025-06": [null, true, false, 1], "june": [true]}
        }"#;
        let store = decode_lenient(raw);
        let cards = store.get_cards(date!(2025 - 06 - 10));
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].text(), "ok");
        assert!(!cards[0].done);
        assert_eq!(cards[0].color, CardColor::Default);
        assert_eq!(store.card_count(), 1);
        assert_eq!(store.next_id(), 4);
        let june = YearMonth::parse("2025-06").expect("month");
        assert_eq!(
            store.week_visibility_map().get(&june),
            Some(&vec![None, Some(true), Some(false), None])
        );
    }

    #[test]
    fn remote_snapshots_need_cards_mapping_and_numeric_next_id() {
        assert_matches!(decode_remote("nope"), Err(SnapshotError::Json(_)));
        assert_matches!(decode_remote(r#"{"nextId": 1}"#), Err(SnapshotError::Shape(_)));
        assert_matches!(
            decode_remote(r#"{"nextId": "1", "cards": {}}"#),
            Err(SnapshotError::Shape(_))
        );
        assert_matches!(decode_remote(r#"{"nextId": 5, "cards": []}"#), Err(SnapshotError::Shape(_)));
        let store = decode_remote(r#"{"nextId": 5, "cards": {}}"#).expect("valid snapshot");
        assert_eq!(store.next_id(), 5);
    }

    #[test]
    fn encode_then_decode_preserves_images() -> anyhow::Result<()> {
        let mut store = CardStore::default();
        let mut content = CardContent::plain("pic");
        content.push_image("data:image/png;base64,AAAA");
        store.upsert(date!(2025 - 06 - 10), Card::new(1, content.clone()));
        let decoded = decode_lenient(&encode(&store)?);
        assert_eq!(decoded.get_cards(date!(2025 - 06 - 10))[0].content, content);
        Ok(())
    }
}
