use std::collections::HashMap;

use crate::feed::{Feed, FetchError, Item};

use super::future::{join_all, FeedFuture};

/// Merges `sources` into `target`, deduplicating and sorting by date.
///
/// Source items are keyed by guid, falling back to link. When several share
/// a key the one scanned last wins, scanning sources in order. Items with
/// neither guid nor link are always kept. Items already in `target` are kept
/// as they are and never deduplicated against the sources. The target's
/// title, link, description and image are left as-is.
pub fn union(target: &mut Feed, sources: Vec<Feed>) {
    let mut items = std::mem::take(&mut target.items);
    let incoming = sources.iter().map(|f| f.items.len()).sum::<usize>();
    items.reserve(incoming);

    let mut slots: HashMap<String, usize> = HashMap::with_capacity(incoming);

    for item in sources.into_iter().flat_map(|feed| feed.items) {
        let Some(key) = item.dedup_key().map(str::to_owned) else {
            items.push(item);
            continue;
        };
        match slots.get(&key) {
            Some(&slot) => items[slot] = item,
            None => {
                slots.insert(key, items.len());
                items.push(item);
            }
        }
    }

    target.items = items;
    target.sort_items();
}

/// Waits for every future and merges the results into `target`.
///
/// If any fetch failed, the first failure is returned and `target` is not
/// modified.
pub async fn union_futures(target: &mut Feed, futures: Vec<FeedFuture>) -> Result<(), FetchError> {
    let feeds = join_all(futures).await.into_result()?;
    union(target, feeds);
    Ok(())
}
