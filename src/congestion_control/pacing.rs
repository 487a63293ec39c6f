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

//! Publish pacing decisions into the shared connection statistics.
//!
//! The pacing interval is the inverse of the pacing rate: nanoseconds per
//! byte, kept as a fixed-point number with `PACING_INTERVAL_SHIFT`
//! fractional bits. The sender turns it back into an inter-packet delay
//! with [`pacing_delay`].

use std::time::Duration;

use crate::connection::stat::ConnectionStats;

/// Number of fractional bits of the fixed-point pacing interval.
pub const PACING_INTERVAL_SHIFT: u32 = 10;

/// Encode a burst transmission time as a fixed-point pacing interval.
pub fn pacing_interval(tx_time: Duration, burst_size: u64) -> u64 {
    let tx_nanos = u64::try_from(tx_time.as_nanos()).unwrap_or(u64::MAX);
    let per_byte = tx_nanos / burst_size.max(1);

    // Saturate instead of shifting bits out.
    per_byte.min(u64::MAX >> PACING_INTERVAL_SHIFT) << PACING_INTERVAL_SHIFT
}

/// The largest burst the scheduler may release per pacing tick.
pub fn send_quantum(burst_size: u64) -> usize {
    usize::try_from(burst_size).unwrap_or(usize::MAX)
}

/// Return the delay needed after sending `bytes` at the given pacing interval.
pub fn pacing_delay(pacing_interval: u64, bytes: u64) -> Duration {
    let nanos = (pacing_interval as u128 * bytes as u128) >> PACING_INTERVAL_SHIFT;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Write the pacing interval, the send quantum and the unbounded window
/// fields into `stats`.
///
/// A pacing-only controller never gates sending on a byte count, so the
/// congestion window and slow start threshold are always `u64::MAX`.
pub fn publish(stats: &mut ConnectionStats, tx_time: Duration, burst_size: u64) {
    stats.pacing_interval = pacing_interval(tx_time, burst_size);
    stats.send_quantum = send_quantum(burst_size);
    stats.congestion_window = u64::MAX;
    stats.slow_start_threshold = u64::MAX;
}
