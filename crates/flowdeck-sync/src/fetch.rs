//! Latest-wins resource fetching.
//!
//! Each fetcher owns at most one in-flight request. Starting a new fetch
//! claims the next generation and aborts the previous task; a superseded
//! task's result is rejected at apply time even if its message was already
//! queued, so a slow old response can never clobber a newer one.

use flowdeck_api::ApiError;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Completion message delivered back to the owning loop.
#[derive(Debug)]
pub struct FetchUpdate<T> {
    pub generation: u64,
    pub result: Result<T, ApiError>,
}

#[derive(Debug)]
pub struct ResourceFetcher<T> {
    name: &'static str,
    data: Option<T>,
    loading: bool,
    error: Option<String>,
    generation: u64,
    inflight: Option<JoinHandle<()>>,
}

impl<T> ResourceFetcher<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            data: None,
            loading: false,
            error: None,
            generation: 0,
            inflight: None,
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn take_data(&mut self) -> Option<T> {
        self.data.take()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Drop state entirely (identity change, auth loss).
    pub fn clear(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
        self.data = None;
        self.loading = false;
        self.error = None;
    }

    /// Apply a completion. Returns false (and changes nothing) when the
    /// update belongs to a superseded request. Errors keep previously
    /// displayed data; stale-but-present beats empty.
    pub fn apply(&mut self, update: FetchUpdate<T>) -> bool {
        if update.generation != self.generation {
            tracing::debug!(fetcher = self.name, "discarding superseded fetch result");
            return false;
        }
        self.inflight = None;
        self.loading = false;
        match update.result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(err) => {
                self.error = Some(err.to_string());
            }
        }
        true
    }
}

impl<T: Send + 'static> ResourceFetcher<T> {
    /// Start a fetch, cancelling any in-flight predecessor. The completion
    /// is wrapped into the caller's event type and sent over `tx`.
    pub fn begin<E, W, Fut>(&mut self, tx: mpsc::Sender<E>, wrap: W, fut: Fut)
    where
        E: Send + 'static,
        W: FnOnce(FetchUpdate<T>) -> E + Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        self.generation += 1;
        let generation = self.generation;
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
        self.loading = true;
        self.error = None;
        let name = self.name;
        let handle = tokio::spawn(async move {
            let result = fut.await;
            if tx
                .send(wrap(FetchUpdate { generation, result }))
                .await
                .is_err()
            {
                tracing::debug!(fetcher = name, "fetch receiver dropped");
            }
        });
        self.inflight = Some(handle);
    }
}

impl<T> Drop for ResourceFetcher<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug)]
    enum Event {
        Done(FetchUpdate<Vec<u32>>),
    }

    #[tokio::test]
    async fn newer_fetch_supersedes_slower_predecessor() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut fetcher: ResourceFetcher<Vec<u32>> = ResourceFetcher::new("test");

        fetcher.begin(tx.clone(), Event::Done, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(vec![1])
        });
        fetcher.begin(tx.clone(), Event::Done, async { Ok(vec![2]) });

        let Event::Done(update) = rx.recv().await.expect("second fetch completes");
        assert!(fetcher.apply(update));
        assert_eq!(fetcher.data(), Some(&vec![2]));
        assert!(!fetcher.loading());

        // The aborted first task normally never reports; even a late
        // hand-delivered update for its generation must be rejected.
        let stale = FetchUpdate {
            generation: 1,
            result: Ok(vec![1]),
        };
        assert!(!fetcher.apply(stale));
        assert_eq!(fetcher.data(), Some(&vec![2]));
    }

    #[tokio::test]
    async fn errors_keep_previous_data() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut fetcher: ResourceFetcher<Vec<u32>> = ResourceFetcher::new("test");

        fetcher.begin(tx.clone(), Event::Done, async { Ok(vec![7]) });
        let Event::Done(update) = rx.recv().await.expect("first result");
        fetcher.apply(update);

        fetcher.begin(tx.clone(), Event::Done, async {
            Err(flowdeck_api::ApiError::Status {
                status: 500,
                message: "boom".to_string(),
                body: json!({}),
            })
        });
        let Event::Done(update) = rx.recv().await.expect("error result");
        assert!(fetcher.apply(update));
        assert_eq!(fetcher.data(), Some(&vec![7]));
        assert!(fetcher.error().expect("error recorded").contains("boom"));
    }

    #[tokio::test]
    async fn clear_discards_data_and_pending_results() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut fetcher: ResourceFetcher<Vec<u32>> = ResourceFetcher::new("test");

        fetcher.begin(tx.clone(), Event::Done, async { Ok(vec![1]) });
        let Event::Done(update) = rx.recv().await.expect("result");
        fetcher.clear();
        assert!(!fetcher.apply(update), "pre-clear result must be rejected");
        assert!(fetcher.data().is_none());
    }
}
