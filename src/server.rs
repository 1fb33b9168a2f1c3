//! HTTP front end: serves generated feeds at registered paths.
//!
//! Each request runs its path's generator. Successful feeds are served as
//! RSS. Temporary failures become a plain-text 500. Permanent failures become
//! a one-item diagnostic feed, so a broken upstream shows up in subscribers'
//! readers instead of making this server look down.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::net::{TcpListener, ToSocketAddrs};

use crate::feed::codec::{self, CONTENT_TYPE};
use crate::feed::{Feed, FetchError, Guid, Item, Temporary};

/// Title of the feed served in place of a permanently failing one.
pub const ERROR_FEED_TITLE: &str = "feedmux feed generation error";

const ERROR_GUID_PREFIX: &str = "feedmux-error-";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Path {0} is already registered")]
    DuplicatePath(String),
    #[error("Path {path} is not a fixed route: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Routing table for generated feeds.
///
/// Build it once at startup with [`register`](Self::register), then consume
/// it with [`serve`](Self::serve).
pub struct FeedServer {
    router: Router,
    paths: HashSet<String>,
    root_registered: bool,
}

impl Default for FeedServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedServer {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            paths: HashSet::new(),
            root_registered: false,
        }
    }

    /// Serves the feed produced by `generator` at `path`.
    pub fn register<F, Fut>(mut self, path: &str, generator: F) -> Result<Self, ServerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Feed, FetchError>> + Send + 'static,
    {
        check_path(path)?;
        if !self.paths.insert(path.to_string()) {
            return Err(ServerError::DuplicatePath(path.to_string()));
        }

        let generator = Arc::new(generator);
        let handler = move |uri: Uri| {
            let generator = Arc::clone(&generator);
            async move { generate(&uri, generator()).await }
        };

        self.router = self.router.route(path, any(handler));
        if path == "/" {
            self.root_registered = true;
        }

        tracing::debug!(path = %path, "Registered feed");
        Ok(self)
    }

    /// Finalizes routing. Unregistered paths, including `/` unless it was
    /// registered, answer 404. Every request is logged before dispatch.
    pub fn into_router(self) -> Router {
        let mut router = self.router;
        if !self.root_registered {
            router = router.route("/", any(not_found));
        }

        router
            .fallback(not_found)
            .layer(middleware::from_fn(log_request))
    }

    /// Binds `addr` and serves until `shutdown` resolves.
    pub async fn serve(
        self,
        addr: impl ToSocketAddrs,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve_listener(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        tracing::info!(addr = %listener.local_addr()?, "Listening");

        axum::serve(listener, self.into_router().into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Accepts only literal paths: rooted at `/`, with no `:param`, `*wildcard`
/// or `{capture}` segments.
pub fn check_path(path: &str) -> Result<(), ServerError> {
    let invalid = |reason| ServerError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path.contains(['{', '}']) {
        return Err(invalid("braces are reserved for captures"));
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(invalid("segments must not start with ':' or '*'"));
    }
    Ok(())
}

async fn log_request(request: Request, next: Next) -> Response {
    tracing::info!("{} {}", request.method(), request.uri());
    next.run(request).await
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404 page not found")
}

async fn generate(
    uri: &Uri,
    generating: impl Future<Output = Result<Feed, FetchError>>,
) -> Response {
    match generating.await {
        Ok(mut feed) => {
            postprocess(&mut feed);
            write_feed(&feed)
        }
        Err(err) => {
            tracing::error!(uri = %uri, error = %err, "Failed to generate feed");
            if err.is_temporary() {
                write_error(&err)
            } else {
                write_feed(&error_feed(&err, Utc::now()))
            }
        }
    }
}

/// Gives every linked item without a guid its link as a permalink guid.
pub fn postprocess(feed: &mut Feed) {
    for item in &mut feed.items {
        if item.guid.id.is_empty() && !item.link.is_empty() {
            item.guid = Guid {
                id: item.link.clone(),
                is_permalink: true,
            };
        }
    }
}

/// A single-item feed describing `err`.
///
/// The guid changes once per UTC day, so aggregators downstream collapse
/// repeated failures into one entry per day.
pub fn error_feed(err: &FetchError, now: DateTime<Utc>) -> Feed {
    Feed {
        title: ERROR_FEED_TITLE.to_string(),
        items: vec![Item {
            title: ERROR_FEED_TITLE.to_string(),
            description: err.to_string(),
            guid: Guid {
                id: format!("{ERROR_GUID_PREFIX}{}", now.format("%d-%m-%Y")),
                is_permalink: false,
            },
            ..Item::default()
        }],
        ..Feed::default()
    }
}

fn write_feed(feed: &Feed) -> Response {
    match codec::encode(feed) {
        Ok(bytes) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], bytes).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode feed");
            write_error(&e)
        }
    }
}

fn write_error(err: &dyn Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("Failed to generate the RSS feed: {err}"),
    )
        .into_response()
}
