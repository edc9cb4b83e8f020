// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Priority queue of pending missions.
//!
//! Ordered by `(priority, sequence)` ascending: a lower priority value runs
//! sooner and ties go to whichever mission was enqueued first. The sequence
//! number is assigned under the heap lock, so it reflects real enqueue order.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::domain::mission::{Mission, MissionId};

#[derive(Debug)]
struct QueueEntry {
    priority: i32,
    sequence: u64,
    mission: Mission,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // BinaryHeap pops the greatest entry, so invert: lowest priority value,
    // then lowest sequence, compares greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<QueueEntry>,
    next_sequence: u64,
}

/// Thread-safe pending-mission buffer with a bounded blocking dequeue.
#[derive(Debug, Default)]
pub struct MissionQueue {
    state: Mutex<QueueState>,
    available: Notify,
}

impl MissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mission and return the sequence number it was assigned.
    pub fn enqueue(&self, mission: Mission) -> u64 {
        let (sequence, depth) = {
            let mut state = self.state.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.heap.push(QueueEntry {
                priority: mission.priority,
                sequence,
                mission,
            });
            (sequence, state.heap.len())
        };
        metrics::gauge!("convoy_queue_depth").set(depth as f64);
        self.available.notify_one();
        sequence
    }

    /// Pop the lowest-ordered mission without waiting.
    pub fn try_dequeue(&self) -> Option<Mission> {
        let (entry, depth) = {
            let mut state = self.state.lock();
            let entry = state.heap.pop();
            (entry, state.heap.len())
        };
        let entry = entry?;
        metrics::gauge!("convoy_queue_depth").set(depth as f64);
        Some(entry.mission)
    }

    /// Wait up to `timeout` for a mission. `None` means the queue stayed empty.
    pub async fn dequeue(&self, timeout: Duration) -> Option<Mission> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(mission) = self.try_dequeue() {
                return Some(mission);
            }
            // enqueue() leaves a permit when nobody is waiting, so a push that
            // lands between try_dequeue() and here is not lost.
            if tokio::time::timeout_at(deadline, self.available.notified())
                .await
                .is_err()
            {
                return self.try_dequeue();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }

    pub fn contains(&self, id: &MissionId) -> bool {
        self.state
            .lock()
            .heap
            .iter()
            .any(|entry| &entry.mission.mission_id == id)
    }
}
