//! Page cache in front of any `PageSource`.
//!
//! Index pages never change once written, so a cached page is always valid.
//! Eviction is FIFO: the page cached first is dropped first.

// Cached pages are handed out as copies
#![allow(clippy::disallowed_methods)]

use std::collections::{HashMap, VecDeque};

use crate::page::{Page, PageId};
use crate::source::{PageSource, SourceError};

/// Cache statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from the cache.
    pub hits: u64,
    /// Reads forwarded to the inner source.
    pub misses: u64,
    /// Pages dropped to make room.
    pub evictions: u64,
}

/// Wraps a page source with a bounded FIFO page cache.
#[derive(Debug)]
pub struct CachedPageSource<S> {
    inner: S,
    capacity: usize,
    pages: HashMap<PageId, Page>,
    /// Page IDs in insertion order (front = oldest).
    queue: VecDeque<PageId>,
    root: Option<PageId>,
    stats: CacheStats,
}

impl<S: PageSource> CachedPageSource<S> {
    /// Cache up to `capacity` pages. A capacity of 0 disables caching.
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            pages: HashMap::with_capacity(capacity),
            queue: VecDeque::with_capacity(capacity),
            root: None,
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of pages currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Get a reference to the wrapped source.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn insert(&mut self, page_id: PageId, page: Page) {
        if self.capacity == 0 {
            return;
        }
        while self.pages.len() >= self.capacity {
            let Some(victim) = self.queue.pop_front() else {
                break;
            };
            if self.pages.remove(&victim).is_some() {
                self.stats.evictions += 1;
            }
        }
        self.queue.push_back(page_id);
        self.pages.insert(page_id, page);
    }
}

impl<S: PageSource> PageSource for CachedPageSource<S> {
    fn read_page(&mut self, page_id: PageId) -> Result<Page, SourceError> {
        if let Some(page) = self.pages.get(&page_id) {
            self.stats.hits += 1;
            return Ok(page.clone());
        }

        self.stats.misses += 1;
        let page = self.inner.read_page(page_id)?;
        self.insert(page_id, page.clone());
        Ok(page)
    }

    fn root_page(&mut self) -> Result<PageId, SourceError> {
        if let Some(root) = self.root {
            return Ok(root);
        }
        let root = self.inner.root_page()?;
        self.root = Some(root);
        Ok(root)
    }
}
