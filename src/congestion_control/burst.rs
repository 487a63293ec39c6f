// Copyright (c) 2025 The TQUIC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Book-keeping of in-flight bursts.
//!
//! A burst is a group of packets sent at the same instant. Every burst is
//! tracked by one [`BurstRecord`] keyed by its send time, and records are
//! chained in the order their send time was first seen. The chain lives in a
//! slab and links neighbours by slab key, so removing a record can never
//! leave a dangling neighbour behind.

use std::time::Duration;
use std::time::Instant;

use slab::Slab;

/// Statistics of one outstanding burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstRecord {
    /// The send time shared by every packet of the burst.
    send_time: Instant,

    /// Total bytes sent within the burst.
    burst_size: u64,

    /// Receipt time of the earliest acknowledgment.
    first_ack_time: Option<Instant>,

    /// Receipt time of the latest acknowledgment.
    last_ack_time: Option<Instant>,

    /// Number of acknowledgments received at strictly increasing times.
    ack_count: u64,

    /// Total bytes acknowledged within the burst.
    acked_bytes: u64,

    /// Sum of the RTT samples of counted acknowledgments.
    cumulative_ack_rtt: Duration,

    /// RTT sample of the earliest acknowledgment.
    pilot_rtt: Option<Duration>,

    /// Previous record in the ledger.
    prev: Option<usize>,

    /// Next record in the ledger.
    next: Option<usize>,
}

impl BurstRecord {
    fn new(send_time: Instant, burst_size: u64) -> Self {
        Self {
            send_time,
            burst_size,
            first_ack_time: None,
            last_ack_time: None,
            ack_count: 0,
            acked_bytes: 0,
            cumulative_ack_rtt: Duration::ZERO,
            pilot_rtt: None,
            prev: None,
            next: None,
        }
    }

    /// Account an acknowledgment of `bytes` received at `now` for a packet
    /// of this burst.
    pub fn on_ack(&mut self, now: Instant, bytes: u64) {
        let rtt = now.saturating_duration_since(self.send_time);

        if self.first_ack_time.map_or(true, |t| now < t) {
            self.first_ack_time = Some(now);
            self.pilot_rtt = Some(rtt);
        }

        // Acks received at the same time as the latest one are not counted.
        if self.last_ack_time.map_or(true, |t| now > t) {
            self.last_ack_time = Some(now);
            self.ack_count = self.ack_count.saturating_add(1);
            self.cumulative_ack_rtt = self.cumulative_ack_rtt.saturating_add(rtt);
        }

        self.acked_bytes = self.acked_bytes.saturating_add(bytes);
    }

    /// Whether every byte of the burst has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.acked_bytes >= self.burst_size
    }

    pub fn send_time(&self) -> Instant {
        self.send_time
    }

    pub fn burst_size(&self) -> u64 {
        self.burst_size
    }

    pub fn first_ack_time(&self) -> Option<Instant> {
        self.first_ack_time
    }

    pub fn last_ack_time(&self) -> Option<Instant> {
        self.last_ack_time
    }

    pub fn ack_count(&self) -> u64 {
        self.ack_count
    }

    pub fn acked_bytes(&self) -> u64 {
        self.acked_bytes
    }

    pub fn cumulative_ack_rtt(&self) -> Duration {
        self.cumulative_ack_rtt
    }

    pub fn pilot_rtt(&self) -> Option<Duration> {
        self.pilot_rtt
    }
}

/// Ordered collection of in-flight bursts.
#[derive(Debug, Default)]
pub struct BurstLedger {
    /// Storage of the records, indexed by slab key.
    bursts: Slab<BurstRecord>,

    /// Oldest record.
    head: Option<usize>,

    /// Newest record.
    tail: Option<usize>,
}

impl BurstLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bursts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bursts.is_empty()
    }

    /// Record a sent packet. Packets sharing a send time are coalesced into
    /// one burst, otherwise a new burst is appended at the tail.
    ///
    /// Return the key of the burst the packet was accounted to.
    pub fn record_sent(&mut self, send_time: Instant, length: u64) -> usize {
        if let Some(id) = self.find(send_time) {
            let burst = &mut self.bursts[id];
            burst.burst_size = burst.burst_size.saturating_add(length);
            return id;
        }

        let mut burst = BurstRecord::new(send_time, length);
        burst.prev = self.tail;
        let id = self.bursts.insert(burst);

        match self.tail {
            Some(tail) => self.bursts[tail].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        id
    }

    /// Find the burst sent at `send_time`.
    pub fn find(&self, send_time: Instant) -> Option<usize> {
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let burst = &self.bursts[id];
            if burst.send_time == send_time {
                return Some(id);
            }
            cursor = burst.next;
        }
        None
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut BurstRecord> {
        self.bursts.get_mut(id)
    }

    /// Unlink the burst `id` from the ledger and return it.
    pub fn excise(&mut self, id: usize) -> Option<BurstRecord> {
        let burst = self.bursts.try_remove(id)?;

        match burst.prev {
            Some(prev) => self.bursts[prev].next = burst.next,
            None => self.head = burst.next,
        }
        match burst.next {
            Some(next) => self.bursts[next].prev = burst.prev,
            None => self.tail = burst.prev,
        }
        Some(burst)
    }

    /// Drop every burst.
    pub fn clear(&mut self) {
        self.bursts.clear();
        self.head = None;
        self.tail = None;
    }

    /// Iterate bursts from the oldest to the newest. The iterator is double
    /// ended so the chain can be walked backwards too.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            ledger: self,
            front: self.head,
            back: self.tail,
            remaining: self.bursts.len(),
        }
    }
}

/// Iterator over the records of a [`BurstLedger`].
pub struct Iter<'a> {
    ledger: &'a BurstLedger,
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a BurstRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let burst = self.ledger.bursts.get(self.front?)?;
        self.front = burst.next;
        self.remaining -= 1;
        Some(burst)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a> DoubleEndedIterator for Iter<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let burst = self.ledger.bursts.get(self.back?)?;
        self.back = burst.prev;
        self.remaining -= 1;
        Some(burst)
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {}
