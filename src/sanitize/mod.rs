use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::board::CardContent;
use crate::config::SanitizeConfig;

pub mod upload;

pub use upload::{ImageUploads, UploadEvent};

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9]*)\b([^>]*)>").expect("valid tag regex")
});
static SRC_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("valid src regex")
});
static DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:image/(png|jpeg|jpg|gif|webp);base64,([A-Za-z0-9+/]+={0,2})$")
        .expect("valid data uri regex")
});
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[xX][0-9A-Fa-f]{1,6}|#[0-9]{1,7}|[A-Za-z]{2,6});").expect("valid entity regex")
});
static HTML_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\r\n]+").expect("valid whitespace regex"));
static LOOKS_LIKE_HTML: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:[A-Za-z!/])").expect("valid html sniff regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("input produced no text or images")]
    Empty,
    #[error("text exceeds {limit} characters")]
    TextTooLong { limit: usize },
    #[error("more than {limit} inline images")]
    TooManyImages { limit: usize },
    #[error("image is {size} bytes, limit is {limit}")]
    ImageTooLarge { size: usize, limit: usize },
    #[error("image source is not an embedded base64 image")]
    UnsupportedImage,
}

/// Reduces freeform rich input to text runs plus bounded inline images.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    max_image_bytes: usize,
    max_images: usize,
    max_text_chars: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(&SanitizeConfig::default())
    }
}

impl Sanitizer {
    pub fn new(config: &SanitizeConfig) -> Self {
        Self {
            max_image_bytes: config.max_image_bytes,
            max_images: config.max_images_per_card,
            max_text_chars: config.max_text_chars,
        }
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    /// Cuts typed text down to the character limit. Typing is trusted input,
    /// so it is clamped rather than rejected.
    pub fn clamp_text(&self, text: &str) -> String {
        match text.char_indices().nth(self.max_text_chars) {
            Some((cut, _)) => {
                tracing::warn!(limit = self.max_text_chars, "edited text clamped");
                text[..cut].to_string()
            }
            None => text.to_string(),
        }
    }

    /// Sanitizes clipboard or programmatic input. HTML-looking input is parsed
    /// as markup, anything else is taken as literal text. Either the whole
    /// input is accepted or nothing is.
    pub fn sanitize(&self, input: &str) -> Result<CardContent, SanitizeError> {
        let content = if LOOKS_LIKE_HTML.is_match(input) {
            self.from_markup(input)?
        } else {
            let text = input.replace("\r\n", "\n");
            CardContent::plain(text.trim())
        };
        self.check(content)
    }

    /// Validates an image source, returning its normalized form.
    pub fn validate_image(&self, src: &str) -> Result<String, SanitizeError> {
        let compact: String = src.chars().filter(|c| !c.is_whitespace()).collect();
        let caps = DATA_URI
            .captures(&compact)
            .ok_or(SanitizeError::UnsupportedImage)?;
        let payload = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        // Cheap upper bound before decoding anything.
        if payload.len() / 4 * 3 > self.max_image_bytes + 2 {
            return Err(SanitizeError::ImageTooLarge {
                size: payload.len() / 4 * 3,
                limit: self.max_image_bytes,
            });
        }
        let bytes = BASE64
            .decode(payload)
            .map_err(|_| SanitizeError::UnsupportedImage)?;
        if bytes.len() > self.max_image_bytes {
            return Err(SanitizeError::ImageTooLarge {
                size: bytes.len(),
                limit: self.max_image_bytes,
            });
        }
        Ok(compact)
    }

    /// Appends a validated image to existing content.
    pub fn with_image(&self, content: &CardContent, src: &str) -> Result<CardContent, SanitizeError> {
        let src = self.validate_image(src)?;
        let mut next = content.clone();
        next.push_image(src);
        self.check(next)
    }

    /// Re-validates already structured content (clipboard cards). Text is kept
    /// literally; every image is checked again. Empty content is allowed.
    pub fn validate_content(&self, content: &CardContent) -> Result<CardContent, SanitizeError> {
        let mut out = CardContent::plain(content.text.clone());
        let len = out.char_len();
        for image in &content.images {
            let src = self.validate_image(&image.src)?;
            out.images.push(crate::board::InlineImage {
                at: image.at.min(len),
                src,
            });
        }
        if out.is_empty() {
            return Ok(out);
        }
        self.check(out)
    }

    fn check(&self, content: CardContent) -> Result<CardContent, SanitizeError> {
        if content.is_empty() {
            return Err(SanitizeError::Empty);
        }
        if content.char_len() > self.max_text_chars {
            return Err(SanitizeError::TextTooLong {
                limit: self.max_text_chars,
            });
        }
        if content.images.len() > self.max_images {
            return Err(SanitizeError::TooManyImages {
                limit: self.max_images,
            });
        }
        Ok(content)
    }

    fn from_markup(&self, input: &str) -> Result<CardContent, SanitizeError> {
        let mut content = CardContent::default();
        let mut cursor = 0;
        let mut skip_until: Option<String> = None;

        for caps in TAG.captures_iter(input) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if skip_until.is_none() {
                push_text_run(&mut content, &input[cursor..whole.start()]);
            }
            cursor = whole.end();

            let Some(name) = caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) else {
                // comment
                continue;
            };
            let closing = caps.get(1).map(|m| !m.as_str().is_empty()).unwrap_or(false);

            if let Some(waiting) = &skip_until {
                if closing && *waiting == name {
                    skip_until = None;
                }
                continue;
            }

            match (name.as_str(), closing) {
                ("script" | "style" | "head" | "title", false) => skip_until = Some(name),
                ("br", _) => push_break(&mut content),
                ("p" | "div" | "li" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6", true) => {
                    push_break(&mut content)
                }
                ("img", false) => {
                    let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
                    let src = SRC_ATTR.captures(attrs).and_then(|c| {
                        c.get(1)
                            .or_else(|| c.get(2))
                            .or_else(|| c.get(3))
                            .map(|m| decode_entities(m.as_str()))
                    });
                    match src {
                        Some(src) => match self.validate_image(&src) {
                            Ok(valid) => content.push_image(valid),
                            Err(SanitizeError::UnsupportedImage) => {
                                tracing::debug!("dropping <img> with non-embedded source")
                            }
                            Err(err) => return Err(err),
                        },
                        None => tracing::debug!("dropping <img> without a source"),
                    }
                }
                _ => {}
            }
        }
        if skip_until.is_none() {
            push_text_run(&mut content, &input[cursor..]);
        }

        let trimmed_end = content.text.trim_end().to_string();
        let leading = content.text.len() - content.text.trim_start().len();
        let leading_chars = content.text[..leading].chars().count();
        let mut text = trimmed_end;
        if leading > 0 && leading <= text.len() {
            text = text[leading..].to_string();
        }
        for image in &mut content.images {
            image.at = image.at.saturating_sub(leading_chars);
        }
        content.set_text(text);
        Ok(content)
    }
}

fn push_text_run(content: &mut CardContent, raw: &str) {
    if raw.is_empty() {
        return;
    }
    let collapsed = HTML_SPACE.replace_all(raw, " ");
    let decoded = decode_entities(&collapsed);
    if decoded == " " && (content.text.is_empty() || content.text.ends_with('\n')) {
        return;
    }
    content.push_text(&decoded);
}

fn push_break(content: &mut CardContent) {
    if content.text.ends_with(' ') {
        let trimmed = content.text.trim_end_matches(' ').to_string();
        content.set_text(trimmed);
    }
    if !content.text.is_empty() && !content.text.ends_with('\n') {
        content.push_text("\n");
    }
}

fn decode_entities(raw: &str) -> String {
    ENTITY
        .replace_all(raw, |caps: &Captures<'_>| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match body {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
