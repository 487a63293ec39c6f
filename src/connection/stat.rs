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

use std::time::Duration;

use crate::qlog::events::EventData;

/// Per-connection statistics shared between the transport and its
/// congestion controller.
///
/// The transport owns the record and keeps `smoothed_rtt` current. The
/// congestion controller writes the pacing and window fields, which the
/// sender consults before every transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// The smoothed RTT maintained by the transport's RTT estimator.
    pub smoothed_rtt: Duration,

    /// The inverse of the pacing rate, in nanoseconds per byte with 10
    /// fractional bits. Zero means the controller did not set one.
    pub pacing_interval: u64,

    /// The maximum number of bytes the sender may release in one pacing tick.
    pub send_quantum: usize,

    /// Congestion window in bytes.
    pub congestion_window: u64,

    /// Slow start threshold in bytes.
    pub slow_start_threshold: u64,
}

impl ConnectionStats {
    pub fn new(initial_rtt: Duration) -> Self {
        Self {
            smoothed_rtt: initial_rtt,
            pacing_interval: 0,
            send_quantum: 0,
            congestion_window: 0,
            slow_start_threshold: u64::MAX,
        }
    }

    /// Update the smoothed RTT from the transport's estimator.
    pub fn update_smoothed_rtt(&mut self, smoothed_rtt: Duration) {
        self.smoothed_rtt = smoothed_rtt;
    }

    /// Return the delay the sender should keep after sending `bytes`.
    pub fn pacing_delay(&self, bytes: usize) -> Duration {
        crate::congestion_control::pacing_delay(self.pacing_interval, bytes as u64)
    }

    /// Build a RecoveryMetricsUpdated event describing the current record.
    pub(crate) fn to_qlog(&self, min_rtt: Option<Duration>) -> EventData {
        EventData::RecoveryMetricsUpdated {
            min_rtt: min_rtt.map(|v| v.as_secs_f32() * 1000.0),
            smoothed_rtt: Some(self.smoothed_rtt.as_secs_f32() * 1000.0),
            congestion_window: Some(self.congestion_window),
            ssthresh: Some(self.slow_start_threshold),
            pacing_interval: Some(self.pacing_interval),
            send_quantum: Some(self.send_quantum as u64),
        }
    }
}

impl Default for ConnectionStats {
    fn default() -> Self {
        Self::new(crate::INITIAL_RTT)
    }
}
