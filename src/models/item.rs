use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Stable catalog key of a movie
pub type ItemId = u32;

/// A movie in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: ItemId,
    /// Display title with any trailing release year removed
    pub title: String,
    pub year: Option<i32>,
    /// Category tags, hyphens stripped, first-seen order
    pub tags: Vec<String>,
}

impl Item {
    /// Space-joined tags, the text the similarity engine vectorizes
    pub fn document(&self) -> String {
        self.tags.join(" ")
    }
}

fn year_suffix() -> &'static Regex {
    static YEAR_SUFFIX: OnceLock<Regex> = OnceLock::new();
    YEAR_SUFFIX.get_or_init(|| {
        Regex::new(r"^(?P<title>.*?)\s*\((?P<year>\d{4})\)\s*$").expect("valid year regex")
    })
}

/// Splits `"Toy Story (1995)"` into `("Toy Story", Some(1995))`.
///
/// Only a trailing four-digit year in parentheses is recognised; a title
/// without one keeps its text and gets no year.
pub fn split_title_year(raw: &str) -> (String, Option<i32>) {
    let raw = raw.trim();
    match year_suffix().captures(raw) {
        Some(caps) => {
            let year = caps["year"].parse().ok();
            (caps["title"].trim().to_string(), year)
        }
        None => (raw.to_string(), None),
    }
}

/// Parses a `|`-delimited tag list such as `"Animation|Children's|Sci-Fi"`.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split('|') {
        let tag: String = tag.trim().chars().filter(|c| *c != '-').collect();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
