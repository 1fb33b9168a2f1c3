//! Combining feeds: concurrent retrieval, merging and item transforms.
//!
//! A typical generator spawns one [`FeedFuture`] per source, hands them all
//! to [`union_futures`], then trims the result with [`filter`] and [`limit`]:
//!
//! ```ignore
//! let futures = urls
//!     .iter()
//!     .map(|url| FeedFuture::spawn(|u| async move { fetch_url(&client, &u).await }, url.as_str()))
//!     .collect();
//!
//! let mut feed = Feed { title: "Everything".into(), ..Feed::default() };
//! union_futures(&mut feed, futures).await?;
//! limit(&mut feed, 50);
//! ```

mod future;
mod merge;
mod transform;

pub use future::{join_all, FeedFuture, FetchResult, Joined};
pub use merge::{union, union_futures};
pub use transform::{filter, limit};
