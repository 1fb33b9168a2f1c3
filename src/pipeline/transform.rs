use crate::feed::{Feed, Item};

/// Keeps only the items `predicate` accepts, preserving their order.
pub fn filter(feed: &mut Feed, predicate: impl FnMut(&Item) -> bool) {
    feed.items.retain(predicate);
}

/// Keeps the newest `max` items of a feed already sorted by date.
///
/// Drops the oldest prefix; does not sort.
pub fn limit(feed: &mut Feed, max: usize) {
    let len = feed.items.len();
    if len > max {
        feed.items.drain(..len - max);
    }
}
