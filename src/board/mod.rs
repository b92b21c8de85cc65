pub mod card;
pub mod store;

pub use card::{Card, CardColor, CardContent, CardId, InlineImage, Segment, MAX_CARD_ID};
pub use store::{CardStore, StoreAnomaly};
