//! Feed model, wire format and retrieval.
//!
//! - [`model`] - `Feed`, `Item` and friends
//! - [`codec`] - RSS 2.0 encode, RSS/Atom decode
//! - [`fetcher`] - HTTP and filesystem retrieval
//! - [`negotiate`] - media-type checks and HTML charset resolution
//! - [`error`] - [`FetchError`] and the [`Temporary`] classification
//!
//! # Example
//!
//! ```ignore
//! use feedmux::feed::{fetch_url, Temporary};
//!
//! match fetch_url(&client, "https://example.com/rss").await {
//!     Ok(feed) => println!("{} items", feed.items.len()),
//!     Err(e) if e.is_temporary() => println!("try again later: {e}"),
//!     Err(e) => println!("giving up: {e}"),
//! }
//! ```

pub mod codec;
mod error;
mod fetcher;
mod model;
pub mod negotiate;

pub use error::{FetchError, FetchErrorKind, Temporary};
pub use fetcher::{fetch_data, fetch_file, fetch_html, fetch_url, fetch_url_with_params, FetchParams};
pub use model::{Feed, Guid, Image, Item};
