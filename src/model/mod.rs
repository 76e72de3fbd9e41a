//! Player entities
//!
//! `PlayerRecord` is what the extractor produces; `Player` is a stored row.
//! Every statistic is optional: `None` means the page did not provide it.

mod player;
mod stats;

pub use player::{Player, PlayerImage, PlayerRecord};
pub use stats::{PlayerStats, StatField, StatTable};
