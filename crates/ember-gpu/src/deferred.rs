//! Deferred resource destruction.
//!
//! A resource the GPU may still be reading cannot be destroyed the moment the
//! CPU is done with it. Retiring it into a [`DeferredQueue`] tags it with the
//! current frame number; once enough frames have completed that no in-flight
//! command buffer can reference it, it is drained back to the caller for
//! actual destruction.

use std::collections::VecDeque;

struct Pending<T> {
    resource: T,
    retired_at: u64,
}

/// Frame-tagged queue of resources awaiting safe destruction.
pub struct DeferredQueue<T> {
    pending: VecDeque<Pending<T>>,
    frames_in_flight: u64,
}

impl<T> DeferredQueue<T> {
    /// Create a queue for the given number of frames in flight.
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            frames_in_flight: frames_in_flight as u64,
        }
    }

    /// Retire a resource at the given frame number.
    ///
    /// The resource becomes drainable once `frames_in_flight` further frames
    /// have begun, since by then every command buffer recorded at or before
    /// `frame` has been waited on.
    pub fn retire(&mut self, resource: T, frame: u64) {
        self.pending.push_back(Pending {
            resource,
            retired_at: frame,
        });
    }

    /// Drain resources that are no longer referenced at `current_frame`.
    ///
    /// Entries are ordered by retirement frame, so draining stops at the
    /// first still-live entry.
    pub fn drain_expired(&mut self, current_frame: u64) -> Vec<T> {
        let mut expired = Vec::new();
        while let Some(front) = self.pending.front() {
            if current_frame >= front.retired_at + self.frames_in_flight {
                let entry = self.pending.pop_front().unwrap();
                expired.push(entry.resource);
            } else {
                break;
            }
        }
        expired
    }

    /// Drain everything regardless of age.
    ///
    /// Only valid once the device is idle, typically at shutdown.
    pub fn drain_all(&mut self) -> Vec<T> {
        self.pending.drain(..).map(|p| p.resource).collect()
    }

    /// Number of resources still pending.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_resources_until_frames_pass() {
        let mut queue: DeferredQueue<u32> = DeferredQueue::new(2);
        queue.retire(10, 5);

        assert!(queue.drain_expired(5).is_empty());
        assert!(queue.drain_expired(6).is_empty());
        assert_eq!(queue.drain_expired(7), vec![10]);
        assert!(queue.is_empty());
    }

    #[test]
    fn drains_in_retirement_order() {
        let mut queue: DeferredQueue<u32> = DeferredQueue::new(2);
        queue.retire(1, 0);
        queue.retire(2, 1);
        queue.retire(3, 4);

        assert_eq!(queue.drain_expired(3), vec![1, 2]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_expired(6), vec![3]);
    }

    #[test]
    fn drain_all_ignores_age() {
        let mut queue: DeferredQueue<u32> = DeferredQueue::new(2);
        queue.retire(1, 100);
        queue.retire(2, 101);

        assert_eq!(queue.drain_all(), vec![1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn same_frame_retirements_drain_together() {
        let mut queue: DeferredQueue<u32> = DeferredQueue::new(2);
        queue.retire(1, 3);
        queue.retire(2, 3);

        assert!(queue.drain_expired(4).is_empty());
        assert_eq!(queue.drain_expired(5), vec![1, 2]);
    }
}
