//! Catalog and interaction loading.
//!
//! Turns raw tabular rows into normalized [`Item`], [`User`] and
//! [`Interaction`] tables. Malformed rows never raise: they are skipped and
//! counted so the caller can report them.

mod reader;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{parse_tags, split_title_year, Gender, Interaction, Item, User};

pub use reader::{read_interactions, read_items, read_users};

/// Records accepted by a loader plus the number of rows it dropped
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

impl<T> Loaded<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Movie row as it appears in `movies.csv`
#[derive(Debug, Clone, Deserialize)]
pub struct RawItemRow {
    pub movie_id: String,
    pub title: String,
    #[serde(default)]
    pub genres: String,
}

/// User row as it appears in `users.csv`
#[derive(Debug, Clone, Deserialize)]
pub struct RawUserRow {
    pub user_id: String,
    pub gender: String,
    pub age: String,
    pub occupation: String,
    #[serde(default)]
    pub zipcode: String,
}

/// Rating row as it appears in `ratings.csv`
#[derive(Debug, Clone, Deserialize)]
pub struct RawInteractionRow {
    pub user_id: String,
    pub movie_id: String,
    pub rating: String,
    pub timestamp: String,
}

/// Parses an integral value, accepting float spellings like `"25.0"`.
fn parse_integral(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Some(value as i64),
        _ => None,
    }
}

fn parse_id(raw: &str) -> Option<u32> {
    parse_integral(raw).and_then(|value| u32::try_from(value).ok())
}

/// Builds the movie catalog in input order.
///
/// Rows with an unparseable id, an empty title once the year is stripped, or
/// an id already seen are skipped.
pub fn load_items<I>(rows: I) -> Loaded<Item>
where
    I: IntoIterator<Item = RawItemRow>,
{
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    let mut skipped = 0;

    for row in rows {
        let Some(id) = parse_id(&row.movie_id) else {
            skipped += 1;
            continue;
        };
        let (title, year) = split_title_year(&row.title);
        if title.is_empty() || !seen.insert(id) {
            skipped += 1;
            continue;
        }
        records.push(Item {
            id,
            title,
            year,
            tags: parse_tags(&row.genres),
        });
    }

    Loaded { records, skipped }
}

/// Builds the user table.
///
/// Rows whose age or occupation cannot be read as a number are dropped rather
/// than defaulted.
pub fn load_users<I>(rows: I) -> Loaded<User>
where
    I: IntoIterator<Item = RawUserRow>,
{
    let mut records = Vec::new();
    let mut skipped = 0;

    for row in rows {
        let parsed = (|| {
            Some(User {
                id: parse_id(&row.user_id)?,
                gender: Gender::parse(&row.gender),
                age: u32::try_from(parse_integral(&row.age)?).ok()?,
                occupation: u32::try_from(parse_integral(&row.occupation)?).ok()?,
                zip: row.zipcode.trim().to_string(),
            })
        })();

        match parsed {
            Some(user) => records.push(user),
            None => skipped += 1,
        }
    }

    Loaded { records, skipped }
}

/// Builds the interaction table in input order.
///
/// Ratings outside 1–5 and timestamps that are not unix seconds are
/// malformed. Repeated (user, item) pairs are kept as they are.
pub fn load_interactions<I>(rows: I) -> Loaded<Interaction>
where
    I: IntoIterator<Item = RawInteractionRow>,
{
    let mut records = Vec::new();
    let mut skipped = 0;

    for row in rows {
        let parsed = (|| {
            let rating = parse_integral(&row.rating).filter(|r| Interaction::rating_in_scale(*r))?;
            Some(Interaction {
                user_id: parse_id(&row.user_id)?,
                item_id: parse_id(&row.movie_id)?,
                rating: u8::try_from(rating).ok()?,
                timestamp: DateTime::<Utc>::from_timestamp(parse_integral(&row.timestamp)?, 0)?,
            })
        })();

        match parsed {
            Some(interaction) => records.push(interaction),
            None => skipped += 1,
        }
    }

    Loaded { records, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_row(id: &str, title: &str, genres: &str) -> RawItemRow {
        RawItemRow {
            movie_id: id.to_string(),
            title: title.to_string(),
            genres: genres.to_string(),
        }
    }

    fn user_row(id: &str, age: &str, occupation: &str) -> RawUserRow {
        RawUserRow {
            user_id: id.to_string(),
            gender: "F".to_string(),
            age: age.to_string(),
            occupation: occupation.to_string(),
            zipcode: "48067".to_string(),
        }
    }

    fn rating_row(user: &str, movie: &str, rating: &str) -> RawInteractionRow {
        RawInteractionRow {
            user_id: user.to_string(),
            movie_id: movie.to_string(),
            rating: rating.to_string(),
            timestamp: "978300760".to_string(),
        }
    }

    #[test]
    fn test_load_items_parses_title_year_and_tags() {
        let loaded = load_items(vec![
            item_row("1", "Toy Story (1995)", "Animation|Children's|Comedy"),
            item_row("2", "Untitled Project", ""),
        ]);

        assert_eq!(loaded.skipped, 0);
        assert_eq!(loaded.records[0].title, "Toy Story");
        assert_eq!(loaded.records[0].year, Some(1995));
        assert_eq!(loaded.records[0].tags, vec!["Animation", "Children's", "Comedy"]);
        assert_eq!(loaded.records[1].year, None);
        assert!(loaded.records[1].tags.is_empty());
    }

    #[test]
    fn test_load_items_skips_bad_ids_empty_titles_and_duplicates() {
        let loaded = load_items(vec![
            item_row("abc", "Heat (1995)", "Action"),
            item_row("3", "(1995)", "Drama"),
            item_row("4", "Sabrina (1995)", "Comedy|Romance"),
            item_row("4", "Sabrina (1954)", "Comedy"),
        ]);

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.skipped, 3);
        assert_eq!(loaded.records[0].year, Some(1995));
    }

    #[test]
    fn test_load_users_drops_unparseable_age_or_occupation() {
        let loaded = load_users(vec![
            user_row("1", "1", "10"),
            user_row("2", "unknown", "16"),
            user_row("3", "25", ""),
            user_row("4", "35.0", "7"),
        ]);

        assert_eq!(loaded.skipped, 2);
        let ids: Vec<u32> = loaded.records.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(loaded.records[1].age, 35);
    }

    #[test]
    fn test_load_interactions_enforces_rating_scale() {
        let loaded = load_interactions(vec![
            rating_row("1", "1193", "5"),
            rating_row("1", "661", "0"),
            rating_row("1", "914", "6"),
            rating_row("1", "3408", "four"),
            rating_row("1", "1193", "3"),
        ]);

        assert_eq!(loaded.skipped, 3);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.records[0].rating, 5);
        assert_eq!(loaded.records[1].rating, 3);
        assert_eq!(loaded.records[0].timestamp.timestamp(), 978300760);
    }

    #[test]
    fn test_load_interactions_rejects_bad_timestamp() {
        let mut row = rating_row("1", "1", "4");
        row.timestamp = "yesterday".to_string();
        let loaded = load_interactions(vec![row]);
        assert!(loaded.is_empty());
        assert_eq!(loaded.skipped, 1);
    }
}
