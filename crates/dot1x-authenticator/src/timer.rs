//! Deadline queue shared by every session
//!
//! Sessions never cancel entries. Each entry carries the generation the
//! session had when it armed the timer; a session that has since re-armed
//! or cancelled ignores the stale generation when it fires.

use dot1x_proto::MacAddress;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
struct TimerEntry {
    deadline: Instant,
    seq: u64,
    mac: MacAddress,
    generation: u64,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of session deadlines, FIFO among equal deadlines
#[derive(Debug, Default)]
pub struct TimerScheduler {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    seq: u64,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: Instant, mac: MacAddress, generation: u64) {
        self.seq = self.seq.wrapping_add(1);
        self.heap.push(Reverse(TimerEntry {
            deadline,
            seq: self.seq,
            mac,
            generation,
        }));
    }

    /// Earliest pending deadline, superseded entries included
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.deadline)
    }

    /// Remove and return the earliest entry due at or before `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<(MacAddress, u64)> {
        if self.next_deadline()? > now {
            return None;
        }
        self.heap
            .pop()
            .map(|Reverse(entry)| (entry.mac, entry.generation))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([2, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_pops_in_deadline_order() {
        let start = Instant::now();
        let mut timers = TimerScheduler::new();
        timers.schedule(start + Duration::from_secs(3), mac(3), 1);
        timers.schedule(start + Duration::from_secs(1), mac(1), 1);
        timers.schedule(start + Duration::from_secs(2), mac(2), 1);

        assert_eq!(timers.next_deadline(), Some(start + Duration::from_secs(1)));
        assert_eq!(timers.pop_due(start), None);

        let later = start + Duration::from_secs(5);
        assert_eq!(timers.pop_due(later), Some((mac(1), 1)));
        assert_eq!(timers.pop_due(later), Some((mac(2), 1)));
        assert_eq!(timers.pop_due(later), Some((mac(3), 1)));
        assert_eq!(timers.pop_due(later), None);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_equal_deadlines_keep_insertion_order() {
        let at = Instant::now();
        let mut timers = TimerScheduler::new();
        timers.schedule(at, mac(9), 4);
        timers.schedule(at, mac(9), 5);
        timers.schedule(at, mac(1), 1);

        assert_eq!(timers.len(), 3);
        assert_eq!(timers.pop_due(at), Some((mac(9), 4)));
        assert_eq!(timers.pop_due(at), Some((mac(9), 5)));
        assert_eq!(timers.pop_due(at), Some((mac(1), 1)));
    }
}
