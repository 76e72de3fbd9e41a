//! Fixed-size fetcher pool
//!
//! All fetchers are created when the pool launches. Free slots sit in an
//! availability queue that acts as a counting semaphore: [`ResourcePool::acquire`]
//! waits for a slot and moves its fetcher into a [`Lease`], and dropping the
//! lease puts the slot back.

use crate::crawler::fetcher::{FetchError, FetcherFactory, PageFetcher};
use crate::crawler::queue::BlockingQueue;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

struct Slot<F> {
    id: usize,
    fetcher: F,
}

/// N fetchers shared by N listeners
pub struct ResourcePool<F> {
    available: BlockingQueue<Slot<F>>,
    size: usize,
    leased: AtomicUsize,
}

impl<F: PageFetcher> ResourcePool<F> {
    /// Creates `size` fetchers through `factory`
    ///
    /// Launch is all-or-nothing: if any slot fails, the fetchers created so
    /// far are shut down and the error is returned.
    ///
    /// # Arguments
    ///
    /// * `size` - Number of slots, at least one
    /// * `factory` - Creates the fetcher for each slot
    ///
    /// # Returns
    ///
    /// * `Ok(ResourcePool)` - Every slot has a fetcher
    /// * `Err(FetchError)` - A fetcher could not be created
    pub async fn launch<Fa>(size: usize, factory: &Fa) -> Result<Self, FetchError>
    where
        Fa: FetcherFactory<Fetcher = F>,
    {
        let size = size.max(1);
        let mut created = Vec::with_capacity(size);

        for id in 0..size {
            match factory.launch(id).await {
                Ok(fetcher) => created.push(Slot { id, fetcher }),
                Err(e) => {
                    tracing::error!(slot = id, error = %e, "Fetcher launch failed");
                    for slot in created {
                        slot.fetcher.shutdown().await;
                    }
                    return Err(e);
                }
            }
        }

        let available = BlockingQueue::new();
        for slot in created {
            available.push(slot);
        }

        tracing::debug!(size, "Fetcher pool ready");
        Ok(Self {
            available,
            size,
            leased: AtomicUsize::new(0),
        })
    }

    /// Waits for a free slot and leases it
    pub async fn acquire(&self) -> Lease<'_, F> {
        let slot = self.available.pop().await;
        self.leased.fetch_add(1, Ordering::SeqCst);
        Lease {
            pool: self,
            slot: Some(slot),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Leases currently held
    pub fn in_use(&self) -> usize {
        self.leased.load(Ordering::SeqCst)
    }

    /// Shuts down every idle fetcher and returns how many were closed
    ///
    /// Call once all leases have been returned; slots still leased are not
    /// reached.
    pub async fn shutdown(&self) -> usize {
        let outstanding = self.in_use();
        if outstanding > 0 {
            tracing::warn!(outstanding, "Shutting down pool with leases outstanding");
        }

        let slots = self.available.drain();
        let closed = slots.len();
        for slot in slots {
            tracing::trace!(slot = slot.id, "Closing fetcher");
            slot.fetcher.shutdown().await;
        }
        closed
    }

    fn release(&self, slot: Slot<F>) {
        self.leased.fetch_sub(1, Ordering::SeqCst);
        self.available.push(slot);
    }
}

/// Exclusive use of one pool slot, returned to the pool on drop
pub struct Lease<'a, F: PageFetcher> {
    pool: &'a ResourcePool<F>,
    slot: Option<Slot<F>>,
}

impl<F: PageFetcher> Lease<'_, F> {
    /// Index of the leased slot
    pub fn slot(&self) -> usize {
        self.slot.as_ref().map_or(0, |s| s.id)
    }
}

impl<F: PageFetcher> Deref for Lease<'_, F> {
    type Target = F;

    fn deref(&self) -> &F {
        match &self.slot {
            Some(slot) => &slot.fetcher,
            None => unreachable!("lease used after release"),
        }
    }
}

impl<F: PageFetcher> DerefMut for Lease<'_, F> {
    fn deref_mut(&mut self) -> &mut F {
        match &mut self.slot {
            Some(slot) => &mut slot.fetcher,
            None => unreachable!("lease used after release"),
        }
    }
}

impl<F: PageFetcher> Drop for Lease<'_, F> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.release(slot);
        }
    }
}
