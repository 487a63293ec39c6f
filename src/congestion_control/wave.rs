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

//! Wave: pacing-based congestion control.
//!
//! Wave does not bound the bytes in flight. It sends bursts of
//! `burst_packets` packets and paces the bursts, deriving the interval
//! between them (the transmission time) from the dispersion of the ACK train
//! of each burst and the inflation of an EWMA filtered RTT over the minimum
//! RTT.
//!
//! Each filter update ends in one of two modes:
//! - Steady: the RTT inflation stays below `beta` and the transmission time
//!   is recomputed.
//! - Adjustment: the RTT inflation exceeds `beta`. Every statistic and every
//!   tracked burst is discarded and the controller restarts from its
//!   conservative defaults.

use std::time::Duration;
use std::time::Instant;

use log::*;

use super::burst::BurstLedger;
use super::burst::BurstRecord;
use super::pacing;
use super::sample;
use super::sample::RttFilter;
use super::CongestionController;
use super::CongestionStats;
use crate::connection::space::AckBurst;
use crate::connection::space::SentPacket;
use crate::connection::stat::ConnectionStats;
use crate::qlog;
use crate::qlog::events::CongestionStateUpdatedTrigger;
use crate::qlog::events::EventData;
use crate::RecoveryConfig;

/// Number of packets in a burst.
const WAVE_BURST_PACKETS: u64 = 10;

/// Transmission time used until the first sample, and after every reset.
const WAVE_INITIAL_TX_TIME: Duration = Duration::from_millis(200);

/// RTT inflation beyond which the controller enters adjustment mode.
const WAVE_BETA: Duration = Duration::from_millis(150);

/// The ACK train dispersion is unreliable with fewer acks per burst.
const WAVE_MIN_ACK_SAMPLES: u64 = 3;

/// Aggregated samples with an RTT larger than this multiple of the minimum
/// RTT are considered stale.
const WAVE_STALE_RTT_FACTOR: u32 = 10;

/// Pacing never operates at a finer resolution.
const WAVE_TX_TIME_GRANULARITY: Duration = Duration::from_millis(1);

/// Weight of the RTT inflation added to the dispersion of a burst.
const BURST_DELTA_GAIN: f64 = 0.5;

/// Weight of the previous transmission time for aggregated samples.
const ACK_TX_TIME_GAIN: f64 = 0.4;

/// Weight of the RTT inflation of aggregated samples.
const ACK_DELTA_GAIN: f64 = 0.2;

/// Wave configurable parameters.
#[derive(Debug, Clone)]
pub struct WaveConfig {
    /// Max datagram size in bytes.
    max_datagram_size: u64,

    /// Number of packets in a burst.
    burst_packets: u64,

    /// Initial transmission time.
    initial_tx_time: Duration,

    /// Adjustment mode threshold.
    beta: Duration,

    /// Minimum acks of a burst to sample its ACK train.
    min_ack_samples: u64,

    /// Staleness factor of aggregated samples.
    stale_rtt_factor: u32,

    /// Granularity of the transmission time.
    tx_time_granularity: Duration,

    /// Bound the EWMA weight to [0, 1].
    clamp_ewma_weight: bool,
}

impl WaveConfig {
    pub fn new(max_datagram_size: u64) -> Self {
        Self {
            max_datagram_size,
            ..Default::default()
        }
    }

    /// The default burst size in bytes.
    pub fn burst_size(&self) -> u64 {
        self.burst_packets.saturating_mul(self.max_datagram_size)
    }
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            max_datagram_size: crate::MAX_QUIC_PACKET_SIZE as u64,
            burst_packets: WAVE_BURST_PACKETS,
            initial_tx_time: WAVE_INITIAL_TX_TIME,
            beta: WAVE_BETA,
            min_ack_samples: WAVE_MIN_ACK_SAMPLES,
            stale_rtt_factor: WAVE_STALE_RTT_FACTOR,
            tx_time_granularity: WAVE_TX_TIME_GRANULARITY,
            clamp_ewma_weight: true,
        }
    }
}

impl From<&RecoveryConfig> for WaveConfig {
    fn from(conf: &RecoveryConfig) -> Self {
        Self {
            max_datagram_size: conf.max_datagram_size as u64,
            burst_packets: conf.wave_burst_packets,
            initial_tx_time: conf.wave_initial_tx_time,
            beta: conf.wave_beta,
            min_ack_samples: conf.wave_min_ack_samples,
            stale_rtt_factor: conf.wave_stale_rtt_factor,
            tx_time_granularity: conf.wave_tx_time_granularity,
            clamp_ewma_weight: conf.wave_clamp_ewma_weight,
        }
    }
}

/// Outcome of a filter update.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum WaveMode {
    /// Keep pacing, recompute the transmission time.
    Steady,

    /// Discard all state and restart from the defaults.
    Adjustment,
}

impl WaveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaveMode::Steady => "steady",
            WaveMode::Adjustment => "adjustment",
        }
    }
}

/// Wave congestion control state of a connection.
#[derive(Debug)]
pub struct Wave {
    /// Config
    config: WaveConfig,

    /// Statistics.
    stats: CongestionStats,

    /// Target burst size in bytes.
    default_burst_size: u64,

    /// Interval between two bursts.
    tx_time: Duration,

    /// Adjustment mode threshold.
    beta: Duration,

    /// RTT filter.
    filter: RttFilter,

    /// Acks matched to a burst since the last reset.
    ack_count: u64,

    /// Bytes acked within a burst since the last reset.
    acked_bytes: u64,

    /// In-flight bursts.
    bursts: BurstLedger,

    /// Optional qlog output.
    qlog: Option<qlog::QlogWriter>,
}

impl Wave {
    /// Create a Wave controller and publish its initial state into `stats`.
    pub fn new(config: WaveConfig, stats: &mut ConnectionStats) -> Self {
        let default_burst_size = config.burst_size();
        let tx_time = config.initial_tx_time;
        let beta = config.beta;
        let filter = RttFilter::new(stats.smoothed_rtt, config.clamp_ewma_weight);

        let mut wave = Self {
            config,
            stats: Default::default(),
            default_burst_size,
            tx_time,
            beta,
            filter,
            ack_count: 0,
            acked_bytes: 0,
            bursts: BurstLedger::new(),
            qlog: None,
        };
        wave.reset_state(stats);
        wave
    }

    /// Write metrics and state changes to the given qlog writer.
    pub fn set_qlog(&mut self, qlog: qlog::QlogWriter) {
        self.qlog = Some(qlog);
    }

    pub fn tx_time(&self) -> Duration {
        self.tx_time
    }

    pub fn beta(&self) -> Duration {
        self.beta
    }

    pub fn default_burst_size(&self) -> u64 {
        self.default_burst_size
    }

    /// Minimum RTT since the last reset, None if unknown.
    pub fn min_rtt(&self) -> Option<Duration> {
        self.filter.min_rtt()
    }

    pub fn avg_rtt(&self) -> Duration {
        self.filter.avg_rtt()
    }

    /// The last EWMA weight.
    pub fn alpha(&self) -> f64 {
        self.filter.alpha()
    }

    pub fn ack_count(&self) -> u64 {
        self.ack_count
    }

    pub fn acked_bytes(&self) -> u64 {
        self.acked_bytes
    }

    pub fn bursts(&self) -> &BurstLedger {
        &self.bursts
    }

    /// Restore the default state, drop every tracked burst and publish the
    /// default pacing.
    fn reset_state(&mut self, stats: &mut ConnectionStats) {
        self.default_burst_size = self.config.burst_size();
        self.tx_time = self.config.initial_tx_time;
        self.beta = self.config.beta;
        self.filter.reset(stats.smoothed_rtt);
        self.ack_count = 0;
        self.acked_bytes = 0;
        self.bursts.clear();

        pacing::publish(stats, self.tx_time, self.default_burst_size);

        info!(
            "{}. state set to default values. tx_time={:?}, burst_size={}, avg_rtt={:?}",
            self.name(),
            self.tx_time,
            self.default_burst_size,
            self.filter.avg_rtt()
        );
    }

    /// Reset, and report the state change to qlog.
    fn reset_with_trigger(
        &mut self,
        stats: &mut ConnectionStats,
        now: Instant,
        trigger: CongestionStateUpdatedTrigger,
    ) {
        self.reset_state(stats);

        let old = match trigger {
            CongestionStateUpdatedTrigger::RttInflation => Some(WaveMode::Steady.as_str().into()),
            CongestionStateUpdatedTrigger::Reset => None,
        };
        self.qlog_event(
            now,
            EventData::RecoveryCongestionStateUpdated {
                old,
                new: WaveMode::Adjustment.as_str().into(),
                trigger: Some(trigger),
            },
        );
        self.qlog_metrics_updated(stats, now);
    }

    /// Decide the mode from the RTT inflation, in nanoseconds.
    fn check_mode(&self, delta: f64) -> WaveMode {
        if delta > self.beta.as_nanos() as f64 {
            WaveMode::Adjustment
        } else {
            WaveMode::Steady
        }
    }

    /// Enter adjustment mode if the RTT inflation is beyond `beta`.
    ///
    /// Return true if the state was reset.
    fn try_adjust(&mut self, stats: &mut ConnectionStats, delta: f64, now: Instant) -> bool {
        if self.check_mode(delta) == WaveMode::Steady {
            return false;
        }

        info!(
            "{}. rtt inflation {:?} exceeds beta {:?}, enter adjustment mode",
            self.name(),
            Duration::from_nanos(delta as u64),
            self.beta
        );
        self.stats.adjustments = self.stats.adjustments.saturating_add(1);
        self.reset_with_trigger(stats, now, CongestionStateUpdatedTrigger::RttInflation);
        true
    }

    /// Apply a candidate transmission time, in nanoseconds, truncated to the
    /// configured granularity and never below it.
    fn update_tx_time(&mut self, stats: &mut ConnectionStats, candidate: f64, now: Instant) {
        let granularity = u64::try_from(self.config.tx_time_granularity.as_nanos())
            .unwrap_or(u64::MAX)
            .max(1);

        // NaN and negative candidates take the floor too.
        let tx_time = if candidate >= granularity as f64 {
            let candidate = candidate as u64;
            Duration::from_nanos(candidate - candidate % granularity)
        } else {
            Duration::from_nanos(granularity)
        };

        if tx_time != self.tx_time {
            info!(
                "{}. new tx_time={:?}, previous={:?}",
                self.name(),
                tx_time,
                self.tx_time
            );
        }
        self.tx_time = tx_time;

        pacing::publish(stats, self.tx_time, self.default_burst_size);
        self.qlog_metrics_updated(stats, now);
    }

    /// Sample a fully acknowledged burst.
    fn on_burst_acked(&mut self, stats: &mut ConnectionStats, burst: &BurstRecord, now: Instant) {
        let sample = match (burst.first_ack_time(), burst.last_ack_time(), burst.pilot_rtt()) {
            (Some(first), Some(last), Some(pilot_rtt))
                if burst.ack_count() >= self.config.min_ack_samples =>
            {
                sample::ack_train_dispersion(first, last, burst.ack_count())
                    .map(|dispersion| (dispersion, pilot_rtt))
            }
            _ => None,
        };

        let (dispersion, pilot_rtt) = match sample {
            Some(v) => v,
            None => {
                trace!(
                    "{}. drop burst sent at {:?} with {} acks",
                    self.name(),
                    burst.send_time(),
                    burst.ack_count()
                );
                self.stats.bursts_dropped = self.stats.bursts_dropped.saturating_add(1);
                return;
            }
        };

        let delta = self.filter.on_sample(pilot_rtt);
        self.stats.bursts_sampled = self.stats.bursts_sampled.saturating_add(1);

        trace!(
            "{}. burst sampled. dispersion={}ns, pilot_rtt={:?}, alpha={}, avg_rtt={:?}, min_rtt={:?}, delta={}ns",
            self.name(),
            dispersion,
            pilot_rtt,
            self.filter.alpha(),
            self.filter.avg_rtt(),
            self.filter.min_rtt(),
            delta
        );

        if self.try_adjust(stats, delta, now) {
            return;
        }

        self.update_tx_time(stats, dispersion + BURST_DELTA_GAIN * delta, now);
    }

    fn qlog_event(&mut self, now: Instant, event_data: EventData) {
        if let Some(qlog) = self.qlog.as_mut() {
            if let Err(e) = qlog.add_event_data(now, event_data) {
                trace!("WAVE. qlog event not written: {:?}", e);
            }
        }
    }

    fn qlog_metrics_updated(&mut self, stats: &ConnectionStats, now: Instant) {
        if self.qlog.is_some() {
            let event_data = stats.to_qlog(self.filter.min_rtt());
            self.qlog_event(now, event_data);
        }
    }
}

impl CongestionController for Wave {
    fn name(&self) -> &str {
        "WAVE"
    }

    fn on_sent(&mut self, _stats: &mut ConnectionStats, packet: &SentPacket) {
        let sent_bytes = packet.sent_size as u64;
        self.stats.bytes_sent_in_total = self.stats.bytes_sent_in_total.saturating_add(sent_bytes);

        self.bursts.record_sent(packet.time_sent, sent_bytes);
    }

    fn on_ack(&mut self, stats: &mut ConnectionStats, packet: &SentPacket, now: Instant) {
        let acked_bytes = packet.sent_size as u64;
        self.stats.bytes_acked_in_total =
            self.stats.bytes_acked_in_total.saturating_add(acked_bytes);

        // Packets sent before burst tracking started, or before the last
        // reset, have no burst.
        let id = match self.bursts.find(packet.time_sent) {
            Some(id) => id,
            None => {
                info!(
                    "{}. no burst found for {:?}, ignored",
                    self.name(),
                    packet
                );
                return;
            }
        };

        self.ack_count = self.ack_count.saturating_add(1);
        self.acked_bytes = self.acked_bytes.saturating_add(acked_bytes);

        let complete = match self.bursts.get_mut(id) {
            Some(burst) => {
                burst.on_ack(now, acked_bytes);
                burst.is_complete()
            }
            None => false,
        };
        if !complete {
            return;
        }

        if let Some(burst) = self.bursts.excise(id) {
            self.on_burst_acked(stats, &burst, now);
        }
    }

    fn on_ack_burst(&mut self, stats: &mut ConnectionStats, ack: &AckBurst, now: Instant) {
        if ack.bytes_delivered == 0 || self.filter.is_stale(ack.rtt, self.config.stale_rtt_factor) {
            trace!(
                "{}. discard sample. bytes_delivered={}, rtt={:?}, min_rtt={:?}",
                self.name(),
                ack.bytes_delivered,
                ack.rtt,
                self.filter.min_rtt()
            );
            self.stats.samples_discarded = self.stats.samples_discarded.saturating_add(1);
            return;
        }

        self.filter.update_min_rtt(ack.rtt);

        if ack.bytes_delivered < self.default_burst_size {
            return;
        }

        let delta = self.filter.on_sample(ack.rtt);
        let min_rtt = self.filter.min_rtt().unwrap_or(ack.rtt);
        let d_rtt = ack.rtt.saturating_sub(min_rtt).as_nanos() as f64;

        trace!(
            "{}. ack burst sampled. rtt={:?}, alpha={}, avg_rtt={:?}, min_rtt={:?}, delta={}ns",
            self.name(),
            ack.rtt,
            self.filter.alpha(),
            self.filter.avg_rtt(),
            min_rtt,
            delta
        );

        if self.try_adjust(stats, delta, now) {
            return;
        }

        let candidate =
            ACK_TX_TIME_GAIN * self.tx_time.as_nanos() as f64 + ACK_DELTA_GAIN * d_rtt;
        self.update_tx_time(stats, candidate, now);
    }

    fn reset(&mut self, stats: &mut ConnectionStats, now: Instant) {
        self.reset_with_trigger(stats, now, CongestionStateUpdatedTrigger::Reset);
    }

    fn congestion_window(&self) -> u64 {
        u64::MAX
    }

    fn pacing_rate(&self) -> Option<u64> {
        let tx_nanos = self.tx_time.as_nanos().max(1);
        let rate = self.default_burst_size as u128 * 1_000_000_000 / tx_nanos;
        Some(u64::try_from(rate).unwrap_or(u64::MAX))
    }

    fn stats(&self) -> &CongestionStats {
        &self.stats
    }
}
