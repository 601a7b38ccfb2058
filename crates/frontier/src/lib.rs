use std::collections::{HashSet, VecDeque};

use dashmap::DashSet;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use govsi_crawler_core::CanonicalUrl;

/// FIFO of URLs awaiting fetch, plus the set of URLs already decided
/// (persisted, dropped, or errored). The queue and its membership index
/// share one lock (spec §5: queue and membership structure guarded
/// together); the visited set is a separate lock-free `DashSet` since
/// it is read far more often and never needs to be consistent with the
/// queue beyond "not both at once".
pub struct Frontier {
    inner: Mutex<Inner>,
    notify: Notify,
    visited: DashSet<String>,
}

struct Inner {
    queue: VecDeque<CanonicalUrl>,
    queued: HashSet<String>,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                queued: HashSet::new(),
            }),
            notify: Notify::new(),
            visited: DashSet::new(),
        }
    }

    /// Canonicalize `raw_url`, reject it if out of scope or already
    /// decided/queued, otherwise push it to the tail. Idempotent.
    pub async fn enqueue(&self, raw_url: &str) -> bool {
        let canonical = CanonicalUrl::canonicalize(raw_url);
        if !canonical.in_scope() {
            return false;
        }
        self.enqueue_canonical(canonical).await
    }

    async fn enqueue_canonical(&self, canonical: CanonicalUrl) -> bool {
        let key = canonical.as_str().to_string();
        if self.visited.contains(&key) {
            return false;
        }
        let mut inner = self.inner.lock().await;
        if inner.queued.contains(&key) {
            return false;
        }
        inner.queued.insert(key);
        inner.queue.push_back(canonical);
        drop(inner);
        self.notify.notify_one();
        true
    }

    /// Re-enqueue a URL that was dequeued but deferred by the
    /// politeness scheduler — pushed to the tail, bypassing the
    /// visited-set check since it was never marked visited (spec
    /// §4.4's re-enqueue-to-spread-load outcome).
    pub async fn requeue(&self, url: CanonicalUrl) {
        let key = url.as_str().to_string();
        let mut inner = self.inner.lock().await;
        inner.queued.insert(key);
        inner.queue.push_back(url);
        drop(inner);
        self.notify.notify_one();
    }

    /// Blocking pop from the head. The popped URL is removed from the
    /// queued-membership index but not yet added to the visited set;
    /// callers decide the terminal state.
    pub async fn dequeue(&self) -> CanonicalUrl {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(url) = inner.queue.pop_front() {
                    inner.queued.remove(url.as_str());
                    return url;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Record a URL as permanently decided: persisted, dropped, or
    /// errored. Monotonic for the lifetime of the process.
    pub fn mark_visited(&self, url: &CanonicalUrl) {
        self.visited.insert(url.as_str().to_string());
    }

    pub fn is_visited(&self, url: &CanonicalUrl) -> bool {
        self.visited.contains(url.as_str())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Seed the frontier with a batch of raw URLs at boot. Goes
    /// through the same scope/dedup rules as `enqueue`.
    pub async fn seed(&self, raw_urls: &[String]) -> usize {
        let mut added = 0;
        for raw in raw_urls {
            if self.enqueue(raw).await {
                added += 1;
            }
        }
        debug!(added, total = raw_urls.len(), "seeded frontier");
        added
    }

    /// Snapshot the queue contents and visited set for checkpointing.
    /// Does not drain the queue.
    pub async fn snapshot(&self) -> (Vec<CanonicalUrl>, Vec<CanonicalUrl>) {
        let inner = self.inner.lock().await;
        let queue: Vec<CanonicalUrl> = inner.queue.iter().cloned().collect();
        let visited: Vec<CanonicalUrl> = self
            .visited
            .iter()
            .map(|v| CanonicalUrl::canonicalize(v.key()))
            .collect();
        (queue, visited)
    }

    /// Restore a previously snapshotted frontier and visited set,
    /// bypassing the usual scope/dedup checks since the snapshot was
    /// already validated when originally enqueued.
    pub async fn restore(&self, queue: Vec<CanonicalUrl>, visited: Vec<CanonicalUrl>) {
        for url in visited {
            self.visited.insert(url.into_string());
        }
        let mut inner = self.inner.lock().await;
        for url in queue {
            let key = url.as_str().to_string();
            if inner.queued.insert(key) {
                inner.queue.push_back(url);
            }
        }
        drop(inner);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_rejects_out_of_scope_hosts() {
        let f = Frontier::new();
        assert!(!f.enqueue("https://example.com/page").await);
        assert_eq!(f.len().await, 0);
    }

    #[tokio::test]
    async fn enqueue_is_idempotent() {
        let f = Frontier::new();
        assert!(f.enqueue("https://example.gov.si/a").await);
        assert!(!f.enqueue("https://example.gov.si/a").await);
        assert!(!f.enqueue("https://example.gov.si/a/").await);
        assert_eq!(f.len().await, 1);
    }

    #[tokio::test]
    async fn enqueue_rejects_already_visited_urls() {
        let f = Frontier::new();
        let url = CanonicalUrl::canonicalize("https://example.gov.si/a");
        f.mark_visited(&url);
        assert!(!f.enqueue("https://example.gov.si/a").await);
    }

    #[tokio::test]
    async fn dequeue_returns_fifo_order() {
        let f = Frontier::new();
        f.enqueue("https://example.gov.si/a").await;
        f.enqueue("https://example.gov.si/b").await;
        let first = f.dequeue().await;
        let second = f.dequeue().await;
        assert_eq!(first.as_str(), "https://example.gov.si/a");
        assert_eq!(second.as_str(), "https://example.gov.si/b");
    }

    #[tokio::test]
    async fn frontier_and_visited_set_are_disjoint() {
        let f = Frontier::new();
        f.enqueue("https://example.gov.si/a").await;
        let url = f.dequeue().await;
        f.mark_visited(&url);
        assert!(f.is_empty().await);
        assert!(f.is_visited(&url));
        assert!(!f.enqueue(url.as_str()).await);
    }

    #[tokio::test]
    async fn requeue_bypasses_visited_check() {
        let f = Frontier::new();
        f.enqueue("https://example.gov.si/a").await;
        let url = f.dequeue().await;
        f.requeue(url.clone()).await;
        assert_eq!(f.len().await, 1);
        let again = f.dequeue().await;
        assert_eq!(again, url);
    }

    #[tokio::test]
    async fn snapshot_and_restore_round_trip() {
        let f = Frontier::new();
        f.enqueue("https://example.gov.si/a").await;
        f.enqueue("https://example.gov.si/b").await;
        let dequeued = f.dequeue().await;
        f.mark_visited(&dequeued);

        let (queue, visited) = f.snapshot().await;

        let restored = Frontier::new();
        restored.restore(queue, visited).await;
        assert_eq!(restored.len().await, 1);
        assert!(restored.is_visited(&dequeued));
    }
}
