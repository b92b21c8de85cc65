use serde::{Deserialize, Serialize};

use crate::board::{Card, CardColor, CardContent};
use crate::sanitize::{SanitizeError, Sanitizer};

const PAYLOAD_KIND: &str = "daynote/cards";
const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ClipboardPayload {
    kind: String,
    version: u32,
    cards: Vec<Card>,
}

/// A card as it travels through the clipboard. The payload's ids are dropped
/// here; pasting always mints new ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipCard {
    pub content: CardContent,
    pub done: bool,
    pub color: CardColor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardContent {
    Cards(Vec<ClipCard>),
    Foreign(CardContent),
}

pub fn encode(cards: &[Card]) -> serde_json::Result<String> {
    let payload = ClipboardPayload {
        kind: PAYLOAD_KIND.to_string(),
        version: PAYLOAD_VERSION,
        cards: cards.to_vec(),
    };
    serde_json::to_string(&payload)
}

/// Interprets clipboard text. Our own payload yields cards; anything else goes
/// through the sanitizer as a single new card. All-or-nothing.
pub fn decode(raw: &str, sanitizer: &Sanitizer) -> Result<ClipboardContent, SanitizeError> {
    if let Ok(payload) = serde_json::from_str::<ClipboardPayload>(raw) {
        if payload.kind == PAYLOAD_KIND {
            if payload.cards.is_empty() {
                return Err(SanitizeError::Empty);
            }
            let cards = payload
                .cards
                .iter()
                .map(|card| {
                    sanitizer.validate_content(&card.content).map(|content| ClipCard {
                        content,
                        done: card.done,
                        color: card.color,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ClipboardContent::Cards(cards));
        }
    }
    sanitizer.sanitize(raw).map(ClipboardContent::Foreign)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn own_payload_round_trips_cards() -> anyhow::Result<()> {
        let mut card = Card::new(4, CardContent::plain("<b>literal</b>"));
        card.done = true;
        card.color = CardColor::Pink;
        let raw = encode(&[card])?;
        let decoded = decode(&raw, &Sanitizer::default())?;
        assert_matches!(decoded, ClipboardContent::Cards(cards) => {
            assert_eq!(cards.len(), 1);
            assert_eq!(cards[0].content.text(), "<b>literal</b>");
            assert!(cards[0].done);
            assert_eq!(cards[0].color, CardColor::Pink);
        });
        Ok(())
    }

    #[test]
    fn foreign_text_is_sanitized() -> anyhow::Result<()> {
        let decoded = decode("<p>from <em>web</em></p>", &Sanitizer::default())?;
        assert_eq!(decoded, ClipboardContent::Foreign(CardContent::plain("from web")));
        let other_json = decode(r#"{"kind":"other","version":1,"cards":[]}"#, &Sanitizer::default())?;
        assert_matches!(other_json, ClipboardContent::Foreign(_));
        Ok(())
    }

    #[test]
    fn payload_with_bad_image_is_rejected_whole() {
        let raw = r#"{"kind":"daynote/cards","version":1,"cards":[
            {"id":1,"text":"ok","done":false,"color":"default"},
            {"id":2,"text":"bad","images":[{"at":0,"src":"https://x/y.png"}],"done":false,"color":"default"}
        ]}"#;
        assert_matches!(
            decode(raw, &Sanitizer::default()),
            Err(SanitizeError::UnsupportedImage)
        );
    }
}
