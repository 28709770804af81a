//! Delayed re-delivery of failed watch events.

use std::future::poll_fn;
use std::time::Duration;
use tokio_util::time::DelayQueue;

use crate::model::ResourceMetadata;

/// Bounded delay queue owned by the agent task.
#[derive(Debug)]
pub struct RetryQueue {
    queue: DelayQueue<ResourceMetadata>,
    capacity: usize,
    delay: Duration,
}

impl RetryQueue {
    pub fn new(capacity: usize, delay: Duration) -> Self {
        Self {
            queue: DelayQueue::new(),
            capacity,
            delay,
        }
    }

    /// Schedule `event` after the fixed delay. Returns false when full.
    pub fn push(&mut self, event: ResourceMetadata) -> bool {
        if self.queue.len() >= self.capacity {
            return false;
        }
        self.queue.insert(event, self.delay);
        true
    }

    /// Next event whose delay elapsed; `None` right away when empty.
    pub async fn next(&mut self) -> Option<ResourceMetadata> {
        poll_fn(|cx| self.queue.poll_expired(cx))
            .await
            .map(|expired| expired.into_inner())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
