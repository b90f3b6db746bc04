//! Offset/limit collection over collections of unknown size.
//!
//! Providers report totals unreliably or not at all, so a short page is the
//! termination condition that always holds. A failing page ends the walk
//! but keeps everything fetched before it.

use std::future::Future;

use tracing::{debug, warn};

use crate::error::SyncError;

/// One page as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total collection size, when the provider reports one.
    pub total: Option<usize>,
    /// Page size that was requested.
    pub page_size: usize,
}

/// Why collection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ShortPage,
    ReachedTotal,
    ReachedCap,
    MaxPages,
    Error,
}

#[derive(Debug)]
pub struct Collected<T> {
    pub items: Vec<T>,
    pub pages: usize,
    pub stop: StopReason,
    /// The page error that ended collection, if any.
    pub error: Option<SyncError>,
}

impl<T> Collected<T> {
    /// Items if any were gathered, otherwise the error that prevented it.
    pub fn into_result(self) -> Result<Vec<T>, SyncError> {
        match self.error {
            Some(e) if self.items.is_empty() => Err(e),
            _ => Ok(self.items),
        }
    }
}

/// Walk pages from offset 0 until a short page, the reported total, `cap`
/// items, `max_pages` pages, or the first error.
pub async fn collect<T, F, Fut>(mut fetch_page: F, cap: Option<usize>, max_pages: Option<usize>) -> Collected<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Page<T>, SyncError>>,
{
    let mut items = Vec::new();
    let mut offset = 0;
    let mut pages = 0;

    let stop = loop {
        if max_pages.is_some_and(|max| pages >= max) {
            break StopReason::MaxPages;
        }
        let page = match fetch_page(offset).await {
            Ok(page) => page,
            Err(e) => {
                warn!(offset, pages, collected = items.len(), error = %e, "page fetch failed, keeping partial result");
                return Collected {
                    items,
                    pages,
                    stop: StopReason::Error,
                    error: Some(e),
                };
            }
        };
        pages += 1;
        let received = page.items.len();
        items.extend(page.items);
        debug!(offset, received, collected = items.len(), "page collected");

        if let Some(cap) = cap.filter(|&cap| items.len() >= cap) {
            items.truncate(cap);
            break StopReason::ReachedCap;
        }
        if page.page_size == 0 || received < page.page_size {
            break StopReason::ShortPage;
        }
        offset += page.page_size;
        if page.total.is_some_and(|total| offset >= total) {
            break StopReason::ReachedTotal;
        }
    };

    Collected {
        items,
        pages,
        stop,
        error: None,
    }
}
