use chrono::{DateTime, Utc};

/// A titled, ordered collection of items.
///
/// Feeds are built fresh for every fetch or merge and handed by value
/// from one pipeline stage to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub image: Option<Image>,
    pub items: Vec<Item>,
}

/// Channel artwork
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    pub url: String,
    pub title: String,
    pub link: String,
}

/// A single entry within a feed (article, episode, post).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Publication time. `None` sorts before every known date.
    pub date: Option<DateTime<Utc>>,
    pub guid: Guid,
}

/// Item identifier. An empty `id` means the source supplied none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guid {
    pub id: String,
    pub is_permalink: bool,
}

impl Feed {
    /// Stable ascending sort by date.
    pub fn sort_items(&mut self) {
        self.items.sort_by_key(|item| item.date);
    }
}

impl Item {
    /// Key used to recognize the same entry across sources: the guid,
    /// then the link. Items with neither are never deduplicated.
    pub fn dedup_key(&self) -> Option<&str> {
        if !self.guid.id.is_empty() {
            Some(&self.guid.id)
        } else if !self.link.is_empty() {
            Some(&self.link)
        } else {
            None
        }
    }
}
