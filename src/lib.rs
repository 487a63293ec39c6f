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

//! wave-cc is an implementation of Wave, a pacing-based congestion control
//! algorithm for QUIC transports.
//!
//! Wave does not limit the bytes in flight. It sends packets in bursts and
//! spaces the bursts by a transmission time estimated from the dispersion
//! of ACK trains and from the inflation of a filtered RTT over the minimum
//! RTT. The transport feeds the controller with sent and acknowledged
//! packets, and reads the resulting pacing interval and send quantum from
//! the shared [`ConnectionStats`].
//!
//! ## Get started
//!
//! ```
//! use std::time::Duration;
//! use std::time::Instant;
//!
//! use wave_cc::CongestionController;
//!
//! let conf = wave_cc::Config::new()?;
//! let mut stats = conf.new_connection_stats();
//! let mut cc = conf.new_congestion_controller(&mut stats);
//!
//! let now = Instant::now();
//! let pkt = wave_cc::SentPacket {
//!     pkt_num: 0,
//!     time_sent: now,
//!     sent_size: 1200,
//! };
//! cc.on_sent(&mut stats, &pkt);
//! cc.on_ack(&mut stats, &pkt, now + Duration::from_millis(20));
//!
//! // Delay before the next 1200 bytes may leave.
//! let delay = stats.pacing_delay(1200);
//! # assert!(delay > Duration::ZERO);
//! # Ok::<(), wave_cc::error::Error>(())
//! ```

use std::cmp;
use std::time::Duration;

/// The maximum QUIC packet size, used to derive the default burst size.
pub const MAX_QUIC_PACKET_SIZE: usize = 1444;

/// The minimum size of outgoing UDP payloads.
const DEFAULT_SEND_UDP_PAYLOAD_SIZE: usize = 1200;

/// The timer granularity.
pub const TIMER_GRANULARITY: Duration = Duration::from_millis(1);

/// The RTT used before an RTT sample is taken.
pub const INITIAL_RTT: Duration = Duration::from_millis(333);

/// Default number of packets in a Wave burst.
const DEFAULT_WAVE_BURST_PACKETS: u64 = 10;

/// Default Wave transmission time.
const DEFAULT_WAVE_INITIAL_TX_TIME: Duration = Duration::from_millis(200);

/// Default RTT inflation threshold of Wave.
const DEFAULT_WAVE_BETA: Duration = Duration::from_millis(150);

/// Default minimum number of acks to sample a burst.
const DEFAULT_WAVE_MIN_ACK_SAMPLES: u64 = 3;

/// Default staleness factor of aggregated samples.
const DEFAULT_WAVE_STALE_RTT_FACTOR: u32 = 10;

/// Result type for wave-cc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configurations about congestion control.
#[derive(Debug, Clone)]
pub struct Config {
    /// Configurations about congestion control and pacing.
    recovery: RecoveryConfig,
}

impl Config {
    /// Create default configuration.
    ///
    /// The configuration may be customized by calling related set methods.
    ///
    /// ## Examples:
    ///
    /// ```
    /// let mut conf = wave_cc::Config::new()?;
    /// conf.set_initial_rtt(100);
    /// conf.set_wave_burst_packets(16)?;
    /// # Ok::<(), wave_cc::error::Error>(())
    /// ```
    pub fn new() -> Result<Self> {
        Ok(Self {
            recovery: RecoveryConfig::default(),
        })
    }

    /// Set congestion control algorithm that the connection would use.
    /// The default value is Wave.
    pub fn set_congestion_control_algorithm(&mut self, cca: CongestionControlAlgorithm) {
        self.recovery.congestion_control_algorithm = cca;
    }

    /// Set the maximum size of outgoing UDP payloads in bytes. The burst size
    /// of Wave is a multiple of it.
    /// The default value is `1444`, and the minimum value is `1200`.
    pub fn set_send_udp_payload_size(&mut self, v: usize) {
        self.recovery.max_datagram_size = cmp::max(v, DEFAULT_SEND_UDP_PAYLOAD_SIZE);
    }

    /// Set the initial RTT in milliseconds. The default value is 333ms.
    ///
    /// The configuration should be changed with caution. Setting a value less than the default
    /// will cause retransmission of handshake packets to be more aggressive.
    pub fn set_initial_rtt(&mut self, v: u64) {
        self.recovery.initial_rtt = cmp::max(Duration::from_millis(v), TIMER_GRANULARITY);
    }

    /// Set the number of packets in a Wave burst.
    /// The default value is `10`. Zero is rejected.
    pub fn set_wave_burst_packets(&mut self, v: u64) -> Result<()> {
        if v == 0 {
            return Err(Error::InvalidConfig("zero burst packets".into()));
        }
        self.recovery.wave_burst_packets = v;
        Ok(())
    }

    /// Set the initial transmission time of Wave in milliseconds.
    /// The default value is `200`, and the minimum value is `1`.
    pub fn set_wave_initial_tx_time(&mut self, v: u64) {
        self.recovery.wave_initial_tx_time =
            cmp::max(Duration::from_millis(v), TIMER_GRANULARITY);
    }

    /// Set the RTT inflation threshold of Wave in milliseconds. Inflation
    /// beyond it resets the controller.
    /// The default value is `150`.
    pub fn set_wave_beta(&mut self, v: u64) {
        self.recovery.wave_beta = Duration::from_millis(v);
    }

    /// Set the minimum number of acks needed to sample a burst.
    /// The default value is `3`, values less than `2` are rejected.
    pub fn set_wave_min_ack_samples(&mut self, v: u64) -> Result<()> {
        if v < 2 {
            return Err(Error::InvalidConfig("too few ack samples".into()));
        }
        self.recovery.wave_min_ack_samples = v;
        Ok(())
    }

    /// Set the factor of the minimum RTT beyond which aggregated samples are
    /// discarded. The default value is `10`. Zero is rejected.
    pub fn set_wave_stale_rtt_factor(&mut self, v: u32) -> Result<()> {
        if v == 0 {
            return Err(Error::InvalidConfig("zero stale rtt factor".into()));
        }
        self.recovery.wave_stale_rtt_factor = v;
        Ok(())
    }

    /// Set whether the EWMA weight of Wave is bounded to [0, 1].
    /// The default value is true.
    pub fn set_wave_clamp_ewma_weight(&mut self, v: bool) {
        self.recovery.wave_clamp_ewma_weight = v;
    }

    /// Return the congestion control configuration.
    pub fn recovery(&self) -> &RecoveryConfig {
        &self.recovery
    }

    /// Create the statistics record of a new connection.
    pub fn new_connection_stats(&self) -> ConnectionStats {
        ConnectionStats::new(self.recovery.initial_rtt)
    }

    /// Create the congestion controller of a new connection. The initial
    /// pacing is published into `stats`.
    pub fn new_congestion_controller(
        &self,
        stats: &mut ConnectionStats,
    ) -> Box<dyn CongestionController> {
        congestion_control::build_congestion_controller(&self.recovery, stats)
    }
}

/// Configurations about congestion control and pacing.
#[doc(hidden)]
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// The congestion control algorithm used for a connection.
    pub congestion_control_algorithm: CongestionControlAlgorithm,

    /// The maximum size of outgoing UDP payloads.
    pub max_datagram_size: usize,

    /// The initial rtt, used before real rtt is estimated.
    pub initial_rtt: Duration,

    /// The number of packets in a Wave burst.
    pub wave_burst_packets: u64,

    /// The Wave transmission time used until the first sample.
    pub wave_initial_tx_time: Duration,

    /// The RTT inflation beyond which Wave resets.
    pub wave_beta: Duration,

    /// The minimum acks of a burst to sample its ACK train.
    pub wave_min_ack_samples: u64,

    /// Aggregated samples with an RTT beyond this multiple of the minimum
    /// RTT are discarded.
    pub wave_stale_rtt_factor: u32,

    /// Granularity of the Wave transmission time.
    pub wave_tx_time_granularity: Duration,

    /// Bound the EWMA weight of Wave to [0, 1].
    pub wave_clamp_ewma_weight: bool,
}

impl Default for RecoveryConfig {
    fn default() -> RecoveryConfig {
        RecoveryConfig {
            congestion_control_algorithm: CongestionControlAlgorithm::Wave,
            max_datagram_size: MAX_QUIC_PACKET_SIZE,
            initial_rtt: INITIAL_RTT,
            wave_burst_packets: DEFAULT_WAVE_BURST_PACKETS,
            wave_initial_tx_time: DEFAULT_WAVE_INITIAL_TX_TIME,
            wave_beta: DEFAULT_WAVE_BETA,
            wave_min_ack_samples: DEFAULT_WAVE_MIN_ACK_SAMPLES,
            wave_stale_rtt_factor: DEFAULT_WAVE_STALE_RTT_FACTOR,
            wave_tx_time_granularity: TIMER_GRANULARITY,
            wave_clamp_ewma_weight: true,
        }
    }
}


pub use crate::congestion_control::CongestionControlAlgorithm;
pub use crate::congestion_control::CongestionController;
pub use crate::congestion_control::CongestionStats;
pub use crate::congestion_control::Wave;
pub use crate::congestion_control::WaveConfig;
pub use crate::connection::space::AckBurst;
pub use crate::connection::space::SentPacket;
pub use crate::connection::stat::ConnectionStats;
pub use crate::error::Error;

#[path = "congestion_control/congestion_control.rs"]
pub mod congestion_control;

#[path = "connection/connection.rs"]
pub mod connection;

#[path = "qlog/qlog.rs"]
pub mod qlog;

pub mod error;
