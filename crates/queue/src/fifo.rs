//! FIFO driver - immediate release in arrival order

use std::collections::VecDeque;

use parking_lot::Mutex;
use sluice_protocol::Message;
use tokio::time::Instant;

use crate::driver::{Driver, Front};

/// Releases every item as soon as the consumer can take it
#[derive(Debug, Default)]
pub struct FifoDriver {
    items: Mutex<VecDeque<Message>>,
}

impl FifoDriver {
    /// Create an empty FIFO driver
    pub fn new() -> Self {
        Self::default()
    }
}

impl Driver for FifoDriver {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn push(&self, message: Message) -> usize {
        let mut items = self.items.lock();
        items.push_back(message);
        items.len()
    }

    fn pop(&self, _now: Instant) -> Front {
        let mut items = self.items.lock();
        match items.pop_front() {
            Some(message) => Front::Ready {
                message,
                remaining: items.len(),
            },
            None => Front::Empty,
        }
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}
