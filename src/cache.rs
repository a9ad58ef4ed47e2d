//! Short-lived in-memory cache in front of a search provider.
//!
//! Re-entering a genre within the TTL reuses the pages already fetched
//! instead of spending API quota again. Failed searches are not cached, and
//! the least recently used page is evicted once `capacity` pages are held.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::SearchError;
use crate::youtube::{SearchPage, SearchRequest, VideoSearchProvider};

pub struct CachedSearch<P> {
  inner: P,
  ttl: Duration,
  entries: Mutex<LruCache<SearchRequest, (Instant, SearchPage)>>,
}

impl<P: VideoSearchProvider> CachedSearch<P> {
  /// `capacity` is the number of pages kept; 0 is treated as 1.
  pub fn new(inner: P, ttl: Duration, capacity: usize) -> Self {
    let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
    Self { inner, ttl, entries: Mutex::new(LruCache::new(capacity)) }
  }

  fn lookup(&self, request: &SearchRequest) -> Option<SearchPage> {
    let mut entries = self.entries.lock().ok()?;
    let (stored_at, page) = entries.get(request)?;
    if stored_at.elapsed() < self.ttl {
      return Some(page.clone());
    }
    entries.pop(request);
    None
  }

  fn store(&self, request: &SearchRequest, page: &SearchPage) {
    if self.ttl.is_zero() {
      return;
    }
    if let Ok(mut entries) = self.entries.lock()
      && let Some((evicted, _)) = entries.push(request.clone(), (Instant::now(), page.clone()))
      && evicted != *request
    {
      debug!(query = %evicted.query, page_token = ?evicted.page_token, "search cache evicted page");
    }
  }

  #[cfg(test)]
  fn len(&self) -> usize {
    self.entries.lock().map(|e| e.len()).unwrap_or(0)
  }
}

impl<P: VideoSearchProvider> VideoSearchProvider for CachedSearch<P> {
  async fn search(&self, request: &SearchRequest) -> Result<SearchPage, SearchError> {
    if let Some(page) = self.lookup(request) {
      debug!(query = %request.query, page_token = ?request.page_token, "search cache hit");
      return Ok(page);
    }
    let page = self.inner.search(request).await?;
    self.store(request, &page);
    Ok(page)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct CountingProvider {
    calls: AtomicUsize,
    fail: bool,
  }

  impl VideoSearchProvider for CountingProvider {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, SearchError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.fail {
        return Err(SearchError::Timeout);
      }
      Ok(SearchPage { items: Vec::new(), next_page_token: request.page_token.clone().or(Some("next".into())) })
    }
  }

  fn request(page_token: Option<&str>) -> SearchRequest {
    SearchRequest {
      query: "pop [Playlist]".into(),
      page_token: page_token.map(str::to_string),
      max_results: 12,
      region_code: "KR".into(),
      relevance_language: "ko".into(),
    }
  }

  fn provider(fail: bool) -> CountingProvider {
    CountingProvider { calls: AtomicUsize::new(0), fail }
  }

  #[tokio::test]
  async fn repeated_request_is_served_from_cache() {
    let cache = CachedSearch::new(provider(false), Duration::from_secs(60), 16);
    let first = cache.search(&request(None)).await.unwrap();
    let second = cache.search(&request(None)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn page_token_is_part_of_the_key() {
    let cache = CachedSearch::new(provider(false), Duration::from_secs(60), 16);
    cache.search(&request(None)).await.unwrap();
    cache.search(&request(Some("p2"))).await.unwrap();
    assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn zero_ttl_disables_caching() {
    let cache = CachedSearch::new(provider(false), Duration::ZERO, 16);
    cache.search(&request(None)).await.unwrap();
    cache.search(&request(None)).await.unwrap();
    assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn expired_entries_are_refetched() {
    let cache = CachedSearch::new(provider(false), Duration::from_millis(20), 16);
    cache.search(&request(None)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    cache.search(&request(None)).await.unwrap();
    assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn failures_are_not_cached() {
    let cache = CachedSearch::new(provider(true), Duration::from_secs(60), 16);
    assert!(cache.search(&request(None)).await.is_err());
    assert!(cache.search(&request(None)).await.is_err());
    assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn least_recently_used_page_is_evicted_at_capacity() {
    let cache = CachedSearch::new(provider(false), Duration::from_secs(60), 2);
    cache.search(&request(None)).await.unwrap();
    cache.search(&request(Some("p2"))).await.unwrap();
    // touch the first page so "p2" becomes the eviction candidate
    cache.search(&request(None)).await.unwrap();
    cache.search(&request(Some("p3"))).await.unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 3);

    cache.search(&request(None)).await.unwrap();
    assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 3);
    cache.search(&request(Some("p2"))).await.unwrap();
    assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 4);
  }
}
