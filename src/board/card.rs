use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub type CardId = u64;

/// Ids stay below 2^53 so any JSON reader keeps them exact.
pub const MAX_CARD_ID: CardId = (1 << 53) - 1;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CardColor {
    #[default]
    Default,
    Yellow,
    Green,
    Pink,
}

impl CardColor {
    /// Next color in the palette cycle, wrapping back to `Default`.
    pub fn cycle(self) -> Self {
        let palette: Vec<CardColor> = CardColor::iter().collect();
        let idx = palette.iter().position(|c| *c == self).unwrap_or(0);
        palette[(idx + 1) % palette.len()]
    }

    /// Unknown color names fall back to `Default` instead of failing.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.trim().to_ascii_lowercase().parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    /// Character offset into the card text where the image sits.
    pub at: usize,
    pub src: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Image(&'a str),
}

/// Sanitized card body: literal text plus inline image references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardContent {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<InlineImage>,
}

impl CardContent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn push_text(&mut self, run: &str) {
        self.text.push_str(run);
    }

    pub fn push_image(&mut self, src: impl Into<String>) {
        let at = self.char_len();
        self.images.push(InlineImage {
            at,
            src: src.into(),
        });
    }

    /// Replaces the text while keeping images anchored, clamped to the new length.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        let len = self.char_len();
        for image in &mut self.images {
            image.at = image.at.min(len);
        }
    }

    pub fn contains_ignore_case(&self, needle_lower: &str) -> bool {
        self.text.to_lowercase().contains(needle_lower)
    }

    /// Text runs and images in display order.
    pub fn segments(&self) -> Vec<Segment<'_>> {
        let mut out = Vec::new();
        let mut images: Vec<&InlineImage> = self.images.iter().collect();
        images.sort_by_key(|img| img.at);

        let mut byte_cursor = 0;
        let mut char_cursor = 0;
        let mut char_indices = self.text.char_indices().peekable();
        for image in images {
            while char_cursor < image.at {
                if char_indices.next().is_none() {
                    break;
                }
                char_cursor += 1;
            }
            let split = char_indices
                .peek()
                .map(|(idx, _)| *idx)
                .unwrap_or(self.text.len());
            if split > byte_cursor {
                out.push(Segment::Text(&self.text[byte_cursor..split]));
            }
            byte_cursor = split;
            out.push(Segment::Image(&image.src));
        }
        if byte_cursor < self.text.len() {
            out.push(Segment::Text(&self.text[byte_cursor..]));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    #[serde(flatten)]
    pub content: CardContent,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub color: CardColor,
}

impl Card {
    pub fn new(id: CardId, content: CardContent) -> Self {
        Self {
            id,
            content,
            done: false,
            color: CardColor::Default,
        }
    }

    pub fn text(&self) -> &str {
        self.content.text()
    }
}
