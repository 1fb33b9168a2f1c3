use std::future::Future;

use tokio::sync::oneshot;

use crate::feed::{Feed, FetchError, FetchErrorKind};

/// Outcome of a single fetch.
pub type FetchResult = Result<Feed, FetchError>;

/// Handle to a fetch running on its own task.
///
/// The producer sends exactly once; [`FeedFuture::wait`] takes `self`, so
/// the result can be consumed only once.
#[derive(Debug)]
pub struct FeedFuture {
    source: String,
    rx: oneshot::Receiver<FetchResult>,
}

impl FeedFuture {
    /// Starts `fetch(source)` on a new Tokio task and returns immediately.
    ///
    /// Every call spawns its own task, so sources are retrieved in parallel.
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(fetch: F, source: impl Into<String>) -> Self
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let source = source.into();
        let (tx, rx) = oneshot::channel();
        let fetching = fetch(source.clone());

        tokio::spawn(async move {
            // Receiver gone means nobody is waiting any more
            let _ = tx.send(fetching.await);
        });

        Self { source, rx }
    }

    /// A handle that is already complete.
    pub fn ready(source: impl Into<String>, result: FetchResult) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self {
            source: source.into(),
            rx,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Waits for the fetch to finish.
    pub async fn wait(self) -> FetchResult {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(FetchError::new(self.source, FetchErrorKind::Aborted)),
        }
    }
}

/// Results of [`join_all`], indexed like its input.
#[derive(Debug)]
pub struct Joined {
    /// `Some` for every fetch that succeeded
    pub feeds: Vec<Option<Feed>>,
    /// The first failure in argument order
    pub error: Option<FetchError>,
}

impl Joined {
    /// All feeds, or the first error if any fetch failed.
    pub fn into_result(self) -> Result<Vec<Feed>, FetchError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.feeds.into_iter().flatten().collect()),
        }
    }
}

/// Waits for every future, including those after a failure.
pub async fn join_all(futures: Vec<FeedFuture>) -> Joined {
    let mut feeds = Vec::with_capacity(futures.len());
    let mut error = None;

    for future in futures {
        match future.wait().await {
            Ok(feed) => feeds.push(Some(feed)),
            Err(err) => {
                feeds.push(None);
                if error.is_none() {
                    error = Some(err);
                } else {
                    tracing::debug!(error = %err, "Additional fetch failure");
                }
            }
        }
    }

    Joined { feeds, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn titled(title: &str) -> Feed {
        Feed {
            title: title.to_string(),
            ..Feed::default()
        }
    }

    #[tokio::test]
    async fn test_spawn_passes_source_and_returns_result() {
        let future = FeedFuture::spawn(|source| async move { Ok(titled(&source)) }, "feed-a");
        assert_eq!(future.source(), "feed-a");
        assert_eq!(future.wait().await.unwrap().title, "feed-a");
    }

    #[tokio::test]
    async fn test_spawned_fetches_run_in_parallel() {
        // Completes only once all three fetches are in flight together
        let barrier = Arc::new(tokio::sync::Barrier::new(4));

        let futures: Vec<_> = (0..3)
            .map(|i| {
                let barrier = Arc::clone(&barrier);
                FeedFuture::spawn(
                    move |source| async move {
                        barrier.wait().await;
                        Ok(titled(&source))
                    },
                    format!("feed-{i}"),
                )
            })
            .collect();

        tokio::time::timeout(Duration::from_secs(5), barrier.wait())
            .await
            .expect("fetches did not run concurrently");

        let feeds = join_all(futures).await.into_result().unwrap();
        let titles: Vec<_> = feeds.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["feed-0", "feed-1", "feed-2"]);
    }

    #[tokio::test]
    async fn test_join_keeps_partial_results_and_first_error() {
        let futures = vec![
            FeedFuture::ready("f1", Ok(titled("F1"))),
            FeedFuture::ready("e1", Err(FetchError::generation("e1", "first", false))),
            FeedFuture::ready("f2", Ok(titled("F2"))),
            FeedFuture::ready("e2", Err(FetchError::generation("e2", "second", false))),
        ];

        let joined = join_all(futures).await;
        assert_eq!(joined.feeds.len(), 4);
        assert_eq!(joined.feeds[0].as_ref().map(|f| f.title.as_str()), Some("F1"));
        assert!(joined.feeds[1].is_none());
        assert_eq!(joined.feeds[2].as_ref().map(|f| f.title.as_str()), Some("F2"));
        assert!(joined.feeds[3].is_none());
        assert_eq!(joined.error.map(|e| e.origin().to_string()).as_deref(), Some("e1"));
    }

    #[tokio::test]
    async fn test_join_waits_for_slow_fetch_after_failure() {
        let finished = Arc::new(AtomicUsize::new(0));
        let slow_finished = Arc::clone(&finished);

        let futures = vec![
            FeedFuture::ready("broken", Err(FetchError::generation("broken", "nope", false))),
            FeedFuture::spawn(
                move |source| async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    slow_finished.fetch_add(1, Ordering::SeqCst);
                    Ok(titled(&source))
                },
                "slow",
            ),
        ];

        let joined = join_all(futures).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(joined.feeds[1].is_some());
        assert!(joined.error.is_some());
    }

    #[tokio::test]
    async fn test_panicked_fetch_reports_aborted() {
        let future = FeedFuture::spawn(
            |source| async move {
                if source == "panicky" {
                    panic!("fetch blew up");
                }
                Ok(titled(&source))
            },
            "panicky",
        );

        let err = future.wait().await.unwrap_err();
        assert!(matches!(err.kind(), FetchErrorKind::Aborted));
    }
}
