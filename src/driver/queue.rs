//! Deadline-keyed FIFO of pending command batches.
//!
//! Only the head entry is ever transferred. Entries join at the tail at any
//! time and leave from the head once every byte has been accepted.

use std::collections::VecDeque;

use crate::error::{FxsimError, Result};
use crate::program::Batch;

/// Transfer progress of a scheduled send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Waiting for its deadline
    Pending,
    /// Deadline reached, bytes still outstanding
    Started,
    /// Every byte accepted
    Complete,
}

/// A batch waiting for, or undergoing, transfer.
#[derive(Debug, Clone)]
pub struct ScheduledSend {
    batch: Batch,
    deadline: u64,
    started: bool,
    position: usize,
}

impl ScheduledSend {
    fn new(batch: Batch, deadline: u64) -> Self {
        Self {
            batch,
            deadline,
            started: false,
            position: 0,
        }
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Sample clock value at or after which the transfer may start.
    pub fn deadline(&self) -> u64 {
        self.deadline
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Index of the next byte to deliver.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn state(&self) -> TransferState {
        if !self.started {
            TransferState::Pending
        } else if self.position >= self.batch.len() {
            TransferState::Complete
        } else {
            TransferState::Started
        }
    }

    /// The byte the link should carry next, if any remain.
    pub fn next_byte(&self) -> Option<u8> {
        self.batch.get(self.position)
    }

    pub fn is_complete(&self) -> bool {
        self.state() == TransferState::Complete
    }
}

/// FIFO of scheduled sends with a bounded number of entries.
#[derive(Debug, Clone)]
pub struct SendQueue {
    entries: VecDeque<ScheduledSend>,
    capacity: usize,
}

impl SendQueue {
    /// Create a queue holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a batch at the tail.
    ///
    /// On failure the batch is dropped; the caller decides whether to abort
    /// or continue without it.
    pub fn enqueue(&mut self, batch: Batch, deadline: u64) -> Result<()> {
        if self.entries.len() >= self.capacity {
            return Err(FxsimError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.entries
            .try_reserve(1)
            .map_err(|_| FxsimError::QueueAllocation)?;
        self.entries.push_back(ScheduledSend::new(batch, deadline));
        Ok(())
    }

    /// The active or next entry.
    pub fn head(&self) -> Option<&ScheduledSend> {
        self.entries.front()
    }

    /// Mark the head started and rewind it to its first byte.
    ///
    /// Returns the head's batch when this call performed the transition.
    pub fn start_head(&mut self) -> Option<&Batch> {
        let head = self.entries.front_mut()?;
        if head.started {
            return None;
        }
        head.started = true;
        head.position = 0;
        Some(&head.batch)
    }

    /// Record that the head's current byte was accepted.
    pub fn commit_head_byte(&mut self) {
        if let Some(head) = self.entries.front_mut() {
            if head.started && head.position < head.batch.len() {
                head.position += 1;
            }
        }
    }

    /// Remove the head if its transfer is complete, releasing its batch.
    pub fn advance_head(&mut self) -> Option<Batch> {
        if !self.entries.front()?.is_complete() {
            return None;
        }
        self.entries.pop_front().map(|entry| entry.batch)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledSend> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(bytes: &[u8]) -> Batch {
        Batch::from(bytes.to_vec())
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = SendQueue::new(8);
        queue.enqueue(batch(&[1]), 50).unwrap();
        queue.enqueue(batch(&[2]), 10).unwrap();
        queue.enqueue(batch(&[3]), 0).unwrap();

        let mut order = Vec::new();
        while let Some(head) = queue.head() {
            order.push(head.batch().as_bytes()[0]);
            queue.start_head();
            queue.commit_head_byte();
            queue.advance_head().unwrap();
        }
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_capacity_bound() {
        let mut queue = SendQueue::new(2);
        queue.enqueue(batch(&[1]), 0).unwrap();
        queue.enqueue(batch(&[2]), 0).unwrap();
        assert!(matches!(
            queue.enqueue(batch(&[3]), 0),
            Err(FxsimError::QueueFull { capacity: 2 })
        ));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_state_transitions() {
        let mut queue = SendQueue::new(4);
        queue.enqueue(batch(&[0xa, 0xb]), 3).unwrap();
        assert_eq!(queue.head().unwrap().state(), TransferState::Pending);

        // Committing before start is ignored
        queue.commit_head_byte();
        assert_eq!(queue.head().unwrap().position(), 0);

        assert!(queue.start_head().is_some());
        assert!(queue.start_head().is_none());
        assert_eq!(queue.head().unwrap().state(), TransferState::Started);
        assert_eq!(queue.head().unwrap().next_byte(), Some(0xa));

        // Incomplete head stays put
        assert!(queue.advance_head().is_none());

        queue.commit_head_byte();
        assert_eq!(queue.head().unwrap().next_byte(), Some(0xb));
        queue.commit_head_byte();
        queue.commit_head_byte();
        assert_eq!(queue.head().unwrap().position(), 2);
        assert_eq!(queue.head().unwrap().state(), TransferState::Complete);

        assert_eq!(queue.advance_head(), Some(batch(&[0xa, 0xb])));
        assert!(queue.is_empty());
        assert!(queue.advance_head().is_none());
    }

    #[test]
    fn test_empty_batch_completes_on_start() {
        let mut queue = SendQueue::new(4);
        queue.enqueue(Batch::default(), 0).unwrap();
        queue.start_head();
        assert!(queue.head().unwrap().is_complete());
        assert!(queue.advance_head().is_some());
    }
}
