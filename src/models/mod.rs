mod catalog;
mod interaction;
mod item;
mod user;

pub use catalog::Catalog;
pub use interaction::{Interaction, MAX_RATING, MIN_RATING};
pub use item::{parse_tags, split_title_year, Item, ItemId};
pub use user::{Gender, User, UserId};
