// Copyright (c) 2023 The TQUIC Authors.
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

#![allow(unused_variables)]

use core::str::FromStr;
use std::fmt;
use std::time::Instant;

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::connection::space::AckBurst;
use crate::connection::space::SentPacket;
use crate::connection::stat::ConnectionStats;
use crate::Error;
use crate::RecoveryConfig;
use crate::Result;
pub use burst::BurstLedger;
pub use burst::BurstRecord;
pub use pacing::pacing_delay;
pub use pacing::pacing_interval;
pub use pacing::PACING_INTERVAL_SHIFT;
pub use sample::RttFilter;
pub use wave::Wave;
pub use wave::WaveConfig;
pub use wave::WaveMode;

/// Available congestion control algorithm
#[repr(C)]
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, EnumIter)]
pub enum CongestionControlAlgorithm {
    /// Wave paces bursts of packets instead of bounding the bytes in flight.
    /// The interval between bursts is derived from the dispersion of ACK
    /// trains and an EWMA filtered RTT, and all state is discarded once the
    /// filtered RTT inflates beyond a threshold. (Experimental)
    #[default]
    Wave,
}

impl CongestionControlAlgorithm {
    /// Name of the algorithm in configuration strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            CongestionControlAlgorithm::Wave => "wave",
        }
    }
}

impl FromStr for CongestionControlAlgorithm {
    type Err = Error;

    fn from_str(algor: &str) -> Result<CongestionControlAlgorithm> {
        CongestionControlAlgorithm::iter()
            .find(|cca| cca.as_str().eq_ignore_ascii_case(algor))
            .ok_or_else(|| Error::InvalidConfig("unknown".into()))
    }
}

/// Congestion control statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CongestionStats {
    /// Total bytes sent.
    pub bytes_sent_in_total: u64,

    /// Total bytes acked.
    pub bytes_acked_in_total: u64,

    /// Bursts whose ACK train was used as an RTT sample.
    pub bursts_sampled: u64,

    /// Bursts fully acknowledged with too few acks to be sampled.
    pub bursts_dropped: u64,

    /// Aggregated acknowledgments discarded as empty or stale.
    pub samples_discarded: u64,

    /// Resets caused by RTT inflation.
    pub adjustments: u64,
}

/// Congestion control interfaces shared by different algorithms.
///
/// The transport calls these synchronously while processing events of a
/// single connection. Every callback may update the pacing and window fields
/// of the shared `ConnectionStats`.
pub trait CongestionController {
    /// Name of congestion control algorithm.
    fn name(&self) -> &str;

    /// Callback after packet was sent out.
    fn on_sent(&mut self, stats: &mut ConnectionStats, packet: &SentPacket);

    /// Callback for processing each acked packet.
    fn on_ack(&mut self, stats: &mut ConnectionStats, packet: &SentPacket, now: Instant) {}

    /// Callback after an ACK frame, or a train of them, was processed.
    fn on_ack_burst(&mut self, stats: &mut ConnectionStats, ack: &AckBurst, now: Instant) {}

    /// Restore the initial state, e.g. after a loss episode.
    fn reset(&mut self, stats: &mut ConnectionStats, now: Instant);

    /// Check if in slow start.
    fn in_slow_start(&self) -> bool {
        false
    }

    /// Current congestion window.
    fn congestion_window(&self) -> u64;

    /// Current pacing rate estimated by Congestion Control Algorithm (CCA).
    /// If CCA does not estimate pacing rate, return None.
    fn pacing_rate(&self) -> Option<u64> {
        None
    }

    /// Congestion stats.
    fn stats(&self) -> &CongestionStats;
}

impl fmt::Debug for dyn CongestionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "congestion controller.")
    }
}

/// Build a congestion controller and publish its initial state into `stats`.
pub fn build_congestion_controller(
    conf: &RecoveryConfig,
    stats: &mut ConnectionStats,
) -> Box<dyn CongestionController> {
    match conf.congestion_control_algorithm {
        CongestionControlAlgorithm::Wave => Box::new(Wave::new(WaveConfig::from(conf), stats)),
    }
}


mod burst;
mod pacing;
mod sample;
mod wave;
