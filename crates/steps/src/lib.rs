/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# Lockstep Steps

Step rings for the authoritative lockstep step stream. A [`StepRing`] is a
bounded FIFO of consecutively-indexed items: one ring per participant
connection holds incoming predicted steps, and one global ring holds the
authoritative combined steps every client replays.

The ring never drops silently. Appending out of order or past capacity is an
explicit error, and discards advance the read cursor by exactly the requested
amount or fail.
*/

pub mod step;

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use tick_id::TickId;

/// Monotonic 32-bit tick index into the authoritative step stream.
pub type StepId = TickId;

/// Default capacity of a step ring. Governs how far behind a client may fall
/// before it can no longer catch up via steps alone.
pub const WINDOW_SIZE: usize = 90;

#[derive(Debug, Eq, PartialEq)]
pub enum StepRingError {
    UnexpectedStepId {
        expected: StepId,
        encountered: StepId,
    },
    RingIsFull {
        capacity: usize,
    },
    DiscardingMoreThanAvailable {
        requested: usize,
        available: usize,
    },
}

impl Display for StepRingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedStepId {
                expected,
                encountered,
            } => write!(f, "unexpected step id {encountered}, expected {expected}"),
            Self::RingIsFull { capacity } => write!(f, "ring is full (capacity {capacity})"),
            Self::DiscardingMoreThanAvailable {
                requested,
                available,
            } => write!(
                f,
                "tried to discard {requested} steps but only {available} stored"
            ),
        }
    }
}

/// Bounded FIFO of consecutively-indexed steps.
///
/// Ids are implicit: the item at the front is always `expected_read_id`, and
/// `expected_write_id` is the id the next append must carry.
#[derive(Debug)]
pub struct StepRing<T> {
    items: VecDeque<T>,
    expected_read_id: StepId,
    expected_write_id: StepId,
    capacity: usize,
}

impl<T> StepRing<T> {
    #[must_use]
    pub fn new(start_step_id: StepId) -> Self {
        Self::with_capacity(start_step_id, WINDOW_SIZE)
    }

    #[must_use]
    pub fn with_capacity(start_step_id: StepId, capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            expected_read_id: start_step_id,
            expected_write_id: start_step_id,
            capacity,
        }
    }

    /// Appends one step. The id must be exactly `expected_write_id` and the
    /// ring must have room.
    pub fn append(&mut self, step_id: StepId, item: T) -> Result<(), StepRingError> {
        if step_id != self.expected_write_id {
            return Err(StepRingError::UnexpectedStepId {
                expected: self.expected_write_id,
                encountered: step_id,
            });
        }
        if self.items.len() >= self.capacity {
            return Err(StepRingError::RingIsFull {
                capacity: self.capacity,
            });
        }
        self.items.push_back(item);
        self.expected_write_id += 1;
        Ok(())
    }

    /// Removes and returns the oldest stored step together with its id.
    pub fn pop(&mut self) -> Option<(StepId, T)> {
        let item = self.items.pop_front()?;
        let step_id = self.expected_read_id;
        self.expected_read_id += 1;
        Some((step_id, item))
    }

    /// Peeks at the oldest stored step without removing it.
    #[must_use]
    pub fn read_first(&self) -> Option<(StepId, &T)> {
        self.items.front().map(|item| (self.expected_read_id, item))
    }

    /// Returns the step stored at `step_id`, if it is inside the ring.
    #[must_use]
    pub fn get(&self, step_id: StepId) -> Option<&T> {
        if step_id < self.expected_read_id || step_id >= self.expected_write_id {
            return None;
        }
        let offset = (step_id.0 - self.expected_read_id.0) as usize;
        self.items.get(offset)
    }

    /// Iterates steps from `start_step_id` (clamped to the stored range) to
    /// the newest, yielding ids alongside the items.
    pub fn iter_from(&self, start_step_id: StepId) -> impl Iterator<Item = (StepId, &T)> + '_ {
        let first = if start_step_id < self.expected_read_id {
            self.expected_read_id
        } else {
            start_step_id
        };
        let skip = (first.0 - self.expected_read_id.0) as usize;
        self.items
            .iter()
            .enumerate()
            .skip(skip)
            .map(move |(index, item)| (self.expected_read_id + index as u32, item))
    }

    /// Drops the `count` oldest steps, advancing `expected_read_id` by the
    /// same amount.
    pub fn discard_count(&mut self, count: usize) -> Result<(), StepRingError> {
        if count > self.items.len() {
            return Err(StepRingError::DiscardingMoreThanAvailable {
                requested: count,
                available: self.items.len(),
            });
        }
        self.items.drain(..count);
        self.expected_read_id += count as u32;
        Ok(())
    }

    /// Clears the ring and restarts both cursors at `start_step_id`.
    pub fn re_init(&mut self, start_step_id: StepId) {
        self.items.clear();
        self.expected_read_id = start_step_id;
        self.expected_write_id = start_step_id;
    }

    #[must_use]
    pub const fn expected_read_id(&self) -> StepId {
        self.expected_read_id
    }

    #[must_use]
    pub const fn expected_write_id(&self) -> StepId {
        self.expected_write_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
