use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ItemId, UserId};

/// Lowest rating on the scale
pub const MIN_RATING: u8 = 1;
/// Highest rating on the scale
pub const MAX_RATING: u8 = 5;

/// One rating a user gave a movie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: u8,
    pub timestamp: DateTime<Utc>,
}

impl Interaction {
    pub fn rating_in_scale(rating: i64) -> bool {
        (i64::from(MIN_RATING)..=i64::from(MAX_RATING)).contains(&rating)
    }
}
