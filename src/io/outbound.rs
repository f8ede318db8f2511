//! Outbound queues and backpressure
//!
//! Decouples frame producers (grabbers) from the rate at which the socket
//! accepts bytes. Each message kind gets its own bounded drop-oldest queue;
//! a send gate skips a cycle entirely when too many bytes are still waiting
//! to drain, and a linear retry policy covers stream establishment.

use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// Capacity of each per-kind outbound queue
pub const MAX_QUEUE_LEN: usize = 20;

/// Send gate threshold: maximum bytes accepted but not yet written
///
/// Sized for roughly ten 800x600 four-byte frames in flight.
pub const MAX_PENDING_WRITE_BYTES: usize = 19_200_000;

/// Bounded FIFO that evicts its oldest element when full
///
/// Eviction increments a dropped counter; the new element is always
/// appended afterward.
#[derive(Debug)]
pub struct DropOldestQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

impl<T> DropOldestQueue<T> {
    pub fn new(capacity: usize) -> Self {
        DropOldestQueue {
            items: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append an element, evicting and returning the oldest when full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.dropped += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);

        debug!(
            len = self.items.len(),
            dropped = self.dropped,
            "Outbound queue size changed"
        );
        evicted
    }

    /// FIFO pop; `None` when empty
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total elements evicted since construction
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// The connection's two independent outbound queues
///
/// Image and status messages are queued separately; no relative ordering
/// is guaranteed between kinds. A queued status is not transmitted with
/// its own timing: it rides immediately in front of the next image send
/// (the pending-status pattern).
#[derive(Debug)]
pub struct OutboundQueues {
    images: DropOldestQueue<Vec<u8>>,
    statuses: DropOldestQueue<Vec<u8>>,
}

impl OutboundQueues {
    pub fn new() -> Self {
        OutboundQueues {
            images: DropOldestQueue::new(MAX_QUEUE_LEN),
            statuses: DropOldestQueue::new(MAX_QUEUE_LEN),
        }
    }

    pub fn enqueue_image(&mut self, message: Vec<u8>) {
        self.images.push(message);
    }

    pub fn enqueue_status(&mut self, message: Vec<u8>) {
        self.statuses.push(message);
    }

    /// Next transmit unit: the oldest image, preceded by a pending status
    ///
    /// Returns `None` while no image is queued; statuses wait for the next
    /// frame rather than being sent on their own.
    pub fn next_bundle(&mut self) -> Option<Vec<u8>> {
        let image = self.images.pop()?;

        match self.statuses.pop() {
            Some(mut status) => {
                status.extend_from_slice(&image);
                Some(status)
            }
            None => Some(image),
        }
    }

    pub fn image_len(&self) -> usize {
        self.images.len()
    }

    pub fn status_len(&self) -> usize {
        self.statuses.len()
    }

    pub fn images_dropped(&self) -> u64 {
        self.images.dropped()
    }

    pub fn statuses_dropped(&self) -> u64 {
        self.statuses.dropped()
    }

    pub fn clear(&mut self) {
        self.images.clear();
        self.statuses.clear();
    }
}

impl Default for OutboundQueues {
    fn default() -> Self {
        Self::new()
    }
}

/// Gate deciding whether a send cycle may accept more bytes
///
/// Ready means: a socket exists AND the bytes already accepted but not yet
/// written sit below the threshold. When not ready the cycle is skipped
/// outright; the next periodic trigger tries again.
#[derive(Debug, Clone, Copy)]
pub struct SendGate {
    max_pending: usize,
}

impl SendGate {
    pub fn new(max_pending: usize) -> Self {
        SendGate { max_pending }
    }

    pub fn is_ready(&self, socket_present: bool, pending_bytes: usize) -> bool {
        socket_present && pending_bytes < self.max_pending
    }
}

impl Default for SendGate {
    fn default() -> Self {
        SendGate::new(MAX_PENDING_WRITE_BYTES)
    }
}

/// Bounded retry with linearly increasing delay
///
/// Used when establishing an external stream: up to `max_attempts` tries,
/// sleeping `base_delay * attempt` between them, then a terminal failure
/// for that session.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after the given 1-based failed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}
