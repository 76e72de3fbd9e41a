//! Work queue shared by the crawl listeners
//!
//! A FIFO of [`WorkItem`]s with any number of producers and consumers.
//! `pop` parks the caller until an item is available.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Semaphore;

/// A page to crawl and how many times it has already been tried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub url: String,
    pub attempts: u32,
}

impl Descriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attempts: 0,
        }
    }

    /// The same page with one more attempt counted
    pub fn retried(self) -> Self {
        Self {
            attempts: self.attempts + 1,
            ..self
        }
    }
}

/// One entry of the work queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Fetch(Descriptor),

    /// End-of-work sentinel; a consumer that sees it puts it back and exits
    Stop,
}

/// An unbounded FIFO whose `pop` waits for an item
///
/// The queue length is mirrored by semaphore permits, one per item, so a
/// waiting consumer is woken by exactly one `push`.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Semaphore,
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Semaphore::new(0),
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<T>> {
        // Critical sections never panic while holding the lock
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends an item at the back
    pub fn push(&self, item: T) {
        self.items().push_back(item);
        self.available.add_permits(1);
    }

    /// Removes the front item, waiting until there is one
    pub async fn pop(&self) -> T {
        loop {
            match self.available.acquire().await {
                Ok(permit) => permit.forget(),
                // The semaphore is never closed
                Err(_) => unreachable!("queue semaphore closed"),
            }
            if let Some(item) = self.items().pop_front() {
                return item;
            }
        }
    }

    /// Removes the front item if there is one
    pub fn try_pop(&self) -> Option<T> {
        let permit = self.available.try_acquire().ok()?;
        permit.forget();
        self.items().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Empties the queue, returning what was left in FIFO order
    pub fn drain(&self) -> Vec<T> {
        let mut items = self.items();
        let drained: Vec<T> = items.drain(..).collect();
        if let Ok(permits) = self.available.try_acquire_many(drained.len() as u32) {
            permits.forget();
        }
        drained
    }
}

/// The crawl work queue
pub type WorkQueue = BlockingQueue<WorkItem>;

impl BlockingQueue<WorkItem> {
    /// Builds a queue holding one fetch item per URL, in input order
    pub fn seeded<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue = Self::new();
        for url in urls {
            queue.push(WorkItem::Fetch(Descriptor::new(url)));
        }
        queue
    }
}
