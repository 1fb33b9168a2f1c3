//! RSS 2.0 wire format.
//!
//! Decoding accepts RSS through the `rss` crate and falls back to `feed-rs`
//! for Atom and the older RSS dialects. Encoding always produces RSS 2.0.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::model::{Feed, Guid, Image, Item};

/// MIME type of every feed this crate serializes.
pub const CONTENT_TYPE: &str = "application/rss+xml";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to parse the feed: {0}")]
    Decode(String),
    #[error("Failed to generate the feed: {0}")]
    Encode(String),
}

/// Parses an RSS 2.0 or Atom document.
pub fn decode(bytes: &[u8]) -> Result<Feed, CodecError> {
    match rss::Channel::read_from(bytes) {
        Ok(channel) => Ok(from_channel(&channel)),
        Err(rss_err) => match feed_rs::parser::parse(bytes) {
            Ok(parsed) => Ok(from_parsed(parsed)),
            // The rss error is the more useful one for malformed RSS, which
            // is what most sources serve
            Err(_) => Err(CodecError::Decode(rss_err.to_string())),
        },
    }
}

/// Serializes a feed as RSS 2.0.
///
/// Decoding the output gives back the same feed as long as dates carry
/// whole seconds and text fields have no leading or trailing whitespace.
/// The reader trims text content.
pub fn encode(feed: &Feed) -> Result<Vec<u8>, CodecError> {
    to_channel(feed)
        .write_to(Vec::new())
        .map_err(|e| CodecError::Encode(e.to_string()))
}

fn from_channel(channel: &rss::Channel) -> Feed {
    let image = channel.image().map(|image| Image {
        url: image.url().to_string(),
        title: image.title().to_string(),
        link: image.link().to_string(),
    });

    let items = channel
        .items()
        .iter()
        .map(|item| {
            let description = item
                .description()
                .or_else(|| item.content())
                .unwrap_or_default()
                .to_string();
            let guid = item
                .guid()
                .map(|g| Guid {
                    id: g.value().to_string(),
                    is_permalink: g.is_permalink(),
                })
                .unwrap_or_default();

            Item {
                title: item.title().unwrap_or_default().to_string(),
                link: item.link().unwrap_or_default().to_string(),
                description,
                date: item.pub_date().and_then(parse_date),
                guid,
            }
        })
        .collect();

    Feed {
        title: channel.title().to_string(),
        link: channel.link().to_string(),
        description: channel.description().to_string(),
        image,
        items,
    }
}

fn from_parsed(parsed: feed_rs::model::Feed) -> Feed {
    let image = parsed.logo.map(|logo| Image {
        url: logo.uri,
        title: logo.title.unwrap_or_default(),
        link: logo.link.map(|l| l.href).unwrap_or_default(),
    });

    let items = parsed
        .entries
        .into_iter()
        .map(|entry| {
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            Item {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                link: entry.links.first().map(|l| l.href.clone()).unwrap_or_default(),
                description,
                date: entry.published.or(entry.updated),
                guid: Guid {
                    id: entry.id,
                    is_permalink: false,
                },
            }
        })
        .collect();

    Feed {
        title: parsed.title.map(|t| t.content).unwrap_or_default(),
        link: parsed.links.first().map(|l| l.href.clone()).unwrap_or_default(),
        description: parsed.description.map(|d| d.content).unwrap_or_default(),
        image,
        items,
    }
}

fn to_channel(feed: &Feed) -> rss::Channel {
    let mut channel = rss::Channel::default();
    channel.set_title(feed.title.clone());
    channel.set_link(feed.link.clone());
    channel.set_description(feed.description.clone());

    if let Some(image) = &feed.image {
        let mut rss_image = rss::Image::default();
        rss_image.set_url(image.url.clone());
        rss_image.set_title(image.title.clone());
        rss_image.set_link(image.link.clone());
        channel.set_image(Some(rss_image));
    }

    let items: Vec<rss::Item> = feed
        .items
        .iter()
        .map(|item| {
            let mut rss_item = rss::Item::default();
            rss_item.set_title(non_empty(&item.title));
            rss_item.set_link(non_empty(&item.link));
            rss_item.set_description(non_empty(&item.description));
            rss_item.set_pub_date(item.date.map(|d| d.to_rfc2822()));

            if !item.guid.id.is_empty() {
                let mut guid = rss::Guid::default();
                guid.set_value(item.guid.id.clone());
                guid.set_permalink(item.guid.is_permalink);
                rss_item.set_guid(Some(guid));
            }

            rss_item
        })
        .collect();
    channel.set_items(items);

    channel
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc2822(value.trim()) {
        Ok(date) => Some(date.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(date = %value, error = %e, "Ignoring unparsable item date");
            None
        }
    }
}
