//! The waiting queue.
//!
//! One global FIFO of user ids. Enqueue is `LPUSH`, so the longest-waiting
//! user sits at the tail; snapshots are returned oldest-first. The matcher
//! consumes candidates through the atomic join-or-match operation; this type
//! covers the remaining direct operations (leave, reconcile, status).

use crate::Uid;
use crate::store::{Store, StoreError, keys};

/// Handle over the global waiting queue.
#[derive(Clone)]
pub struct Queue {
    store: Store,
    max_size: usize,
}

impl Queue {
    pub fn new(store: Store, max_size: usize) -> Self {
        Self { store, max_size }
    }

    /// Append a user to the queue tail. Returns `false` when the cap is
    /// reached (nothing written). The user must not already be queued; the
    /// matcher's enqueue path is the normal entry and dedupes atomically.
    pub async fn push(&self, uid: Uid) -> Result<bool, StoreError> {
        if self.store.llen(keys::QUEUE).await? >= self.max_size {
            return Ok(false);
        }
        self.store.lpush(keys::QUEUE, &uid.to_string()).await?;
        Ok(true)
    }

    /// Remove a user from the queue. Returns whether anything was removed.
    pub async fn remove(&self, uid: Uid) -> Result<bool, StoreError> {
        let removed = self.store.lrem(keys::QUEUE, &uid.to_string()).await?;
        Ok(removed > 0)
    }

    /// Pop the longest-waiting user.
    pub async fn pop_first(&self) -> Result<Option<Uid>, StoreError> {
        let raw = self.store.rpop(keys::QUEUE).await?;
        match raw {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| StoreError::Corrupt(keys::QUEUE.to_string())),
        }
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        self.store.llen(keys::QUEUE).await
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    /// Everyone currently waiting, oldest first. Unparseable entries are
    /// skipped rather than failing the whole snapshot.
    pub async fn snapshot(&self) -> Result<Vec<Uid>, StoreError> {
        let raw = self.store.lrange(keys::QUEUE).await?;
        Ok(raw.iter().rev().filter_map(|v| v.parse().ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;
    use std::sync::Arc;

    fn queue(max: usize) -> Queue {
        Queue::new(Arc::new(MemoryBackend::new()), max)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = queue(10);
        queue.push(1).await.unwrap();
        queue.push(2).await.unwrap();
        queue.push(3).await.unwrap();

        assert_eq!(queue.snapshot().await.unwrap(), vec![1, 2, 3]);
        assert_eq!(queue.pop_first().await.unwrap(), Some(1));
        assert_eq!(queue.pop_first().await.unwrap(), Some(2));
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_push_respects_cap() {
        let queue = queue(2);
        assert!(queue.push(1).await.unwrap());
        assert!(queue.push(2).await.unwrap());
        assert!(!queue.push(3).await.unwrap());
        assert_eq!(queue.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_remove_is_reported() {
        let queue = queue(10);
        queue.push(5).await.unwrap();
        assert!(queue.remove(5).await.unwrap());
        assert!(!queue.remove(5).await.unwrap());
        assert!(queue.is_empty().await.unwrap());
    }
}
