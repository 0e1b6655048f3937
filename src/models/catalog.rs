use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{split_title_year, Item, ItemId};

/// The movie catalog in load order, with identity and title indexes.
///
/// Titles are not guaranteed unique; a bare title resolves to the first item
/// carrying it, and `"Title (YYYY)"` picks out a specific release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Item>", into = "Vec<Item>")]
pub struct Catalog {
    items: Vec<Item>,
    positions: HashMap<ItemId, usize>,
    by_title: HashMap<String, ItemId>,
    by_title_year: HashMap<(String, i32), ItemId>,
}

impl From<Vec<Item>> for Catalog {
    fn from(items: Vec<Item>) -> Self {
        Self::new(items)
    }
}

impl From<Catalog> for Vec<Item> {
    fn from(catalog: Catalog) -> Self {
        catalog.items
    }
}

impl Catalog {
    pub fn new(items: Vec<Item>) -> Self {
        let mut positions = HashMap::with_capacity(items.len());
        let mut by_title = HashMap::with_capacity(items.len());
        let mut by_title_year = HashMap::new();
        let mut duplicate_titles = 0usize;

        for (pos, item) in items.iter().enumerate() {
            positions.insert(item.id, pos);
            if by_title.contains_key(&item.title) {
                duplicate_titles += 1;
            } else {
                by_title.insert(item.title.clone(), item.id);
            }
            if let Some(year) = item.year {
                by_title_year
                    .entry((item.title.clone(), year))
                    .or_insert(item.id);
            }
        }

        if duplicate_titles > 0 {
            tracing::warn!(
                duplicate_titles,
                "Catalog has repeated titles; title lookups resolve to the first"
            );
        }

        Self {
            items,
            positions,
            by_title,
            by_title_year,
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.positions.get(&id).map(|&pos| &self.items[pos])
    }

    /// Resolves a bare title, or `"Title (YYYY)"` when the bare form is ambiguous
    pub fn id_for_title(&self, title: &str) -> Option<ItemId> {
        if let Some(&id) = self.by_title.get(title) {
            return Some(id);
        }
        match split_title_year(title) {
            (bare, Some(year)) => self.by_title_year.get(&(bare, year)).copied(),
            (_, None) => None,
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.items.iter().map(|item| item.title.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: ItemId, title: &str) -> Item {
        Item {
            id,
            title: title.to_string(),
            year: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_title_lookup_prefers_first_item() {
        let catalog = Catalog::new(vec![item(10, "Hamlet"), item(11, "Heat"), item(12, "Hamlet")]);
        assert_eq!(catalog.id_for_title("Hamlet"), Some(10));
        assert_eq!(catalog.id_for_title("Heat"), Some(11));
        assert_eq!(catalog.id_for_title("Casino"), None);
    }

    #[test]
    fn test_title_with_year_selects_release() {
        let mut first = item(10, "Hamlet");
        first.year = Some(1990);
        let mut second = item(12, "Hamlet");
        second.year = Some(1996);
        let catalog = Catalog::new(vec![first, item(11, "Heat"), second]);

        assert_eq!(catalog.id_for_title("Hamlet (1996)"), Some(12));
        assert_eq!(catalog.id_for_title("Hamlet (1990)"), Some(10));
        assert_eq!(catalog.id_for_title("Hamlet (2000)"), None);
        assert_eq!(catalog.id_for_title("Heat (1995)"), None);
    }

    #[test]
    fn test_titles_keep_catalog_order() {
        let catalog = Catalog::new(vec![item(2, "Jumanji"), item(1, "Toy Story")]);
        assert_eq!(catalog.titles(), vec!["Jumanji", "Toy Story"]);
        assert_eq!(catalog.get(1).unwrap().title, "Toy Story");
    }
}
