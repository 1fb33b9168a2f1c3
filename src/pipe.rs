//! Configured feed pipes: a list of sources merged, filtered and trimmed.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PipeConfig;
use crate::feed::{fetch_file, fetch_url_with_params, Feed, FetchError, FetchParams, Item};
use crate::pipeline::{filter, limit, union_futures, FeedFuture};

/// Where a pipe reads one of its inputs from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(String),
    File(PathBuf),
}

impl Source {
    /// `http://` and `https://` descriptors are URLs, anything else a path.
    pub fn parse(descriptor: &str) -> Self {
        let lower = descriptor.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Source::Url(descriptor.to_string())
        } else {
            Source::File(PathBuf::from(descriptor))
        }
    }

    pub fn descriptor(&self) -> String {
        match self {
            Source::Url(url) => url.clone(),
            Source::File(path) => path.display().to_string(),
        }
    }
}

/// One merged output feed.
#[derive(Debug, Clone)]
pub struct Pipe {
    template: Feed,
    sources: Vec<Source>,
    exclude: Vec<String>,
    limit: Option<usize>,
    client: reqwest::Client,
    params: Arc<FetchParams>,
}

impl Pipe {
    pub fn new(config: &PipeConfig, client: reqwest::Client, params: FetchParams) -> Self {
        Self {
            template: Feed {
                title: config.title.clone(),
                link: config.link.clone(),
                description: config.description.clone(),
                ..Feed::default()
            },
            sources: config.sources.iter().map(|s| Source::parse(s)).collect(),
            exclude: config.exclude.iter().map(|w| w.to_lowercase()).collect(),
            limit: config.limit,
            client,
            params: Arc::new(params),
        }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Fetches every source concurrently and builds the merged feed.
    ///
    /// Fails with the first source error, in configuration order.
    pub async fn generate(&self) -> Result<Feed, FetchError> {
        let futures = self.sources.iter().map(|source| self.spawn_fetch(source)).collect();

        let mut feed = self.template.clone();
        union_futures(&mut feed, futures).await?;

        if !self.exclude.is_empty() {
            filter(&mut feed, |item| !self.is_excluded(item));
        }
        if let Some(max) = self.limit {
            limit(&mut feed, max);
        }

        tracing::debug!(title = %feed.title, items = feed.items.len(), "Generated feed");
        Ok(feed)
    }

    fn spawn_fetch(&self, source: &Source) -> FeedFuture {
        match source {
            Source::Url(url) => {
                let client = self.client.clone();
                let params = Arc::clone(&self.params);
                FeedFuture::spawn(
                    move |source| async move { fetch_url_with_params(&client, &source, &params).await },
                    url.as_str(),
                )
            }
            Source::File(_) => FeedFuture::spawn(
                |path| async move { fetch_file(path).await },
                source.descriptor(),
            ),
        }
    }

    fn is_excluded(&self, item: &Item) -> bool {
        let title = item.title.to_lowercase();
        self.exclude.iter().any(|word| title.contains(word.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FetchErrorKind, Temporary};
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss(items: &[(&str, &str, &str)]) -> String {
        let items: String = items
            .iter()
            .map(|(guid, title, date)| {
                format!("<item><guid>{guid}</guid><title>{title}</title><pubDate>{date}</pubDate></item>")
            })
            .collect();
        format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>src</title>{items}</channel></rss>"#)
    }

    fn pipe_config(sources: Vec<String>) -> PipeConfig {
        PipeConfig {
            path: "/all.rss".to_string(),
            title: "All".to_string(),
            link: "https://example.com/".to_string(),
            description: "Everything".to_string(),
            sources,
            exclude: Vec::new(),
            limit: None,
        }
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(
            Source::parse("https://example.com/rss"),
            Source::Url("https://example.com/rss".to_string())
        );
        assert_eq!(
            Source::parse("HTTP://example.com/rss"),
            Source::Url("HTTP://example.com/rss".to_string())
        );
        assert_eq!(
            Source::parse("/var/feeds/local.rss"),
            Source::File(PathBuf::from("/var/feeds/local.rss"))
        );
    }

    #[tokio::test]
    async fn test_generate_merges_url_and_file_sources() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/remote"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[
                ("shared", "Remote copy", "Wed, 03 Jan 2024 00:00:00 +0000"),
                ("r1", "Remote only", "Mon, 01 Jan 2024 00:00:00 +0000"),
            ])))
            .mount(&mock_server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            rss(&[
                ("shared", "Local copy", "Wed, 03 Jan 2024 00:00:00 +0000"),
                ("l1", "Local only", "Tue, 02 Jan 2024 00:00:00 +0000"),
            ])
            .as_bytes(),
        )
        .unwrap();

        let config = pipe_config(vec![
            format!("{}/remote", mock_server.uri()),
            file.path().display().to_string(),
        ]);
        let pipe = Pipe::new(&config, reqwest::Client::new(), FetchParams::default());

        let feed = pipe.generate().await.unwrap();
        assert_eq!(feed.title, "All");
        let titles: Vec<_> = feed.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Remote only", "Local only", "Local copy"]);
    }

    #[tokio::test]
    async fn test_generate_applies_exclude_and_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            rss(&[
                ("1", "Weekly SPONSORED roundup", "Mon, 01 Jan 2024 00:00:00 +0000"),
                ("2", "Second", "Tue, 02 Jan 2024 00:00:00 +0000"),
                ("3", "Third", "Wed, 03 Jan 2024 00:00:00 +0000"),
                ("4", "Fourth", "Thu, 04 Jan 2024 00:00:00 +0000"),
            ])
            .as_bytes(),
        )
        .unwrap();

        let mut config = pipe_config(vec![file.path().display().to_string()]);
        config.exclude = vec!["Sponsored".to_string()];
        config.limit = Some(2);
        let pipe = Pipe::new(&config, reqwest::Client::new(), FetchParams::default());

        let feed = pipe.generate().await.unwrap();
        let ids: Vec<_> = feed.items.iter().map(|i| i.guid.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_generate_reports_first_failing_source() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.rss");

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let config = pipe_config(vec![
            missing.display().to_string(),
            format!("{}/flaky", mock_server.uri()),
        ]);
        let pipe = Pipe::new(&config, reqwest::Client::new(), FetchParams::default());

        let err = pipe.generate().await.unwrap_err();
        assert!(matches!(err.kind(), FetchErrorKind::Io(_)));
        assert!(!err.is_temporary());
    }
}
