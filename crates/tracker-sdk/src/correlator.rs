//! FIFO matching of unlabeled read replies to outstanding read requests.
//!
//! Read replies carry no request identifier, so each reply is attributed to
//! the oldest outstanding read. This is only correct while the server answers
//! reads one frame each, in the order they were sent.

use std::collections::VecDeque;

use at_protocol::decode_read;

/// A read request that has been sent and awaits exactly one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRead {
    pub key: String,
    pub address: u32,
}

/// Outstanding reads in strict send order.
#[derive(Debug, Default)]
pub struct PendingReadQueue {
    entries: VecDeque<PendingRead>,
}

/// Result of feeding one reply frame to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    Matched { key: String, address: u32, value: u8 },
    /// A zero-length reply. It still consumes the oldest entry.
    Empty { key: String, address: u32 },
    /// Nothing outstanding; the reply is dropped.
    Unmatched,
}

impl PendingReadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, address: u32) {
        self.entries.push_back(PendingRead {
            key: key.into(),
            address,
        });
    }

    /// Discard every outstanding entry, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    /// Attribute `payload` to the oldest outstanding read.
    pub fn correlate(&mut self, payload: &[u8]) -> Correlation {
        let Some(PendingRead { key, address }) = self.entries.pop_front() else {
            return Correlation::Unmatched;
        };
        match decode_read(payload) {
            Some(value) => Correlation::Matched {
                key,
                address,
                value,
            },
            None => Correlation::Empty { key, address },
        }
    }
}
