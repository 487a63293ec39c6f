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

//! Event records handed to the congestion controller by the transport.

use std::time::Duration;
use std::time::Instant;

/// Metadata of a sent packet as seen by the congestion controller.
#[derive(Clone)]
pub struct SentPacket {
    /// The packet number of the sent packet.
    pub pkt_num: u64,

    /// The time the packet was sent. Packets sharing a send time belong to
    /// the same burst.
    pub time_sent: Instant,

    /// The number of bytes sent in the packet, not including UDP or IP overhead,
    /// but including QUIC framing overhead.
    pub sent_size: usize,
}

impl Default for SentPacket {
    fn default() -> Self {
        SentPacket {
            pkt_num: 0,
            time_sent: Instant::now(),
            sent_size: 0,
        }
    }
}

impl std::fmt::Debug for SentPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "pkt_num={:?} ", self.pkt_num)?;
        write!(f, "pkt_sent_time={:?} ", self.time_sent)?;
        write!(f, "pkt_size={:?}", self.sent_size)?;
        Ok(())
    }
}

/// Aggregated information about an ACK frame (or a train of them) that
/// newly acknowledged data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckBurst {
    /// The number of bytes newly delivered by the acknowledgment.
    pub bytes_delivered: u64,

    /// The RTT sample taken from the largest newly acknowledged packet.
    pub rtt: Duration,
}

impl AckBurst {
    pub fn new(bytes_delivered: u64, rtt: Duration) -> Self {
        Self {
            bytes_delivered,
            rtt,
        }
    }
}
