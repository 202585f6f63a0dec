//! Delay driver - per-item release delay
//!
//! Every item is stamped with `arrived + delay` when pushed. Only the front
//! item is inspected: items are released in arrival order, each no earlier
//! than its own release instant. This rate-limits bursts into a stream that
//! trails the producer by a fixed delay.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use sluice_protocol::Message;
use tokio::time::Instant;

use crate::driver::{Driver, Front};

#[derive(Debug)]
struct Entry {
    message: Message,
    release_at: Instant,
}

/// Holds each item for `delay` after it was enqueued
#[derive(Debug)]
pub struct DelayDriver {
    delay: Duration,
    items: Mutex<VecDeque<Entry>>,
}

impl DelayDriver {
    /// Create a delay driver
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Configured per-item delay
    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Driver for DelayDriver {
    fn name(&self) -> &'static str {
        "delay"
    }

    fn push(&self, message: Message) -> usize {
        let release_at = Instant::now() + self.delay;
        let mut items = self.items.lock();
        items.push_back(Entry {
            message,
            release_at,
        });
        items.len()
    }

    fn pop(&self, now: Instant) -> Front {
        let mut items = self.items.lock();

        if let Some(front) = items.front()
            && front.release_at > now
        {
            return Front::Waiting(front.release_at);
        }

        match items.pop_front() {
            Some(entry) => Front::Ready {
                message: entry.message,
                remaining: items.len(),
            },
            None => Front::Empty,
        }
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_front_waits_until_release() {
        let driver = DelayDriver::new(Duration::from_millis(200));
        let pushed_at = Instant::now();
        driver.push(Message::new("a"));

        match driver.pop(Instant::now()) {
            Front::Waiting(at) => assert_eq!(at, pushed_at + Duration::from_millis(200)),
            other => panic!("expected waiting front, got {:?}", other),
        }
        assert_eq!(driver.len(), 1);

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(matches!(
            driver.pop(Instant::now()),
            Front::Ready { remaining: 0, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_items_wait_behind_front() {
        let driver = DelayDriver::new(Duration::from_millis(100));
        driver.push(Message::new(1u8));
        tokio::time::advance(Duration::from_millis(50)).await;
        driver.push(Message::new(2u8));

        tokio::time::advance(Duration::from_millis(50)).await;
        match driver.pop(Instant::now()) {
            Front::Ready { message, remaining } => {
                assert_eq!(*message.downcast::<u8>().unwrap(), 1);
                assert_eq!(remaining, 1);
            }
            other => panic!("expected ready front, got {:?}", other),
        }
        assert!(matches!(driver.pop(Instant::now()), Front::Waiting(_)));
    }

    #[test]
    fn test_empty_driver() {
        let driver = DelayDriver::new(Duration::from_secs(1));
        assert!(matches!(driver.pop(Instant::now()), Front::Empty));
        assert!(driver.is_empty());
        assert_eq!(driver.delay(), Duration::from_secs(1));
    }
}
