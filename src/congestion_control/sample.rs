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

//! RTT sample filtering.
//!
//! Samples come either from a fully acknowledged burst (its pilot RTT) or
//! from an aggregated acknowledgment. Both feed an EWMA whose weight grows
//! with the sample's inflation over the minimum RTT:
//!
//!   w = (sample - min_rtt) / sample
//!   avg_rtt' = w * avg_rtt + (1 - w) * sample
//!   delta = avg_rtt' - min_rtt

use std::time::Duration;
use std::time::Instant;

/// Estimate the dispersion of an ACK train, extrapolated to the whole burst.
///
/// The spread between the first and the last acknowledgment covers
/// `ack_count - 1` gaps, so it is scaled by `ack_count / (ack_count - 1)`.
/// Return the dispersion in nanoseconds, or `None` with fewer than 2 acks.
pub fn ack_train_dispersion(first: Instant, last: Instant, ack_count: u64) -> Option<f64> {
    if ack_count < 2 {
        return None;
    }

    let spread = last.saturating_duration_since(first).as_nanos() as f64;
    Some(spread * ack_count as f64 / (ack_count - 1) as f64)
}

/// EWMA filter over RTT samples.
#[derive(Debug, Clone, PartialEq)]
pub struct RttFilter {
    /// Minimum RTT since the last reset. None stands for infinite.
    min_rtt: Option<Duration>,

    /// EWMA filtered RTT.
    avg_rtt: Duration,

    /// Last EWMA weight, for diagnostics only.
    alpha: f64,

    /// Bound the EWMA weight to [0, 1].
    clamp_weight: bool,
}

impl RttFilter {
    pub fn new(smoothed_rtt: Duration, clamp_weight: bool) -> Self {
        Self {
            min_rtt: None,
            avg_rtt: smoothed_rtt,
            alpha: 0.0,
            clamp_weight,
        }
    }

    /// Forget every sample and restart from the transport's smoothed RTT.
    pub fn reset(&mut self, smoothed_rtt: Duration) {
        self.min_rtt = None;
        self.avg_rtt = smoothed_rtt;
        self.alpha = 0.0;
    }

    pub fn min_rtt(&self) -> Option<Duration> {
        self.min_rtt
    }

    pub fn avg_rtt(&self) -> Duration {
        self.avg_rtt
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn update_min_rtt(&mut self, rtt: Duration) {
        self.min_rtt = Some(self.min_rtt.map_or(rtt, |min_rtt| min_rtt.min(rtt)));
    }

    /// Whether `rtt` is more than `factor` times the minimum RTT. Any sample
    /// is fresh while the minimum RTT is unknown.
    pub fn is_stale(&self, rtt: Duration, factor: u32) -> bool {
        match self.min_rtt {
            Some(min_rtt) => rtt > min_rtt.saturating_mul(factor),
            None => false,
        }
    }

    /// Return the EWMA weight of `sample`.
    pub fn ewma_weight(&self, sample: Duration) -> f64 {
        let sample = sample.as_nanos() as f64;
        if sample == 0.0 {
            return 0.0;
        }

        let min_rtt = self.min_rtt.map_or(f64::INFINITY, |v| v.as_nanos() as f64);
        let weight = (sample - min_rtt) / sample;
        if self.clamp_weight {
            weight.clamp(0.0, 1.0)
        } else {
            weight
        }
    }

    /// Feed an RTT sample into the filter and return the RTT inflation
    /// `avg_rtt - min_rtt` in nanoseconds.
    ///
    /// The sample becomes the minimum RTT only while none is known. Callers
    /// that track the minimum from the same samples update it beforehand, so
    /// a sample below a known minimum yields a negative weight, which the
    /// clamp bounds.
    pub fn on_sample(&mut self, sample: Duration) -> f64 {
        if self.min_rtt.is_none() {
            self.min_rtt = Some(sample);
        }

        let weight = self.ewma_weight(sample);
        self.alpha = weight;

        let avg_rtt =
            weight * self.avg_rtt.as_nanos() as f64 + (1.0 - weight) * sample.as_nanos() as f64;
        self.avg_rtt = Duration::from_nanos(avg_rtt.max(0.0) as u64);

        self.inflation()
    }

    /// Return `avg_rtt - min_rtt` in nanoseconds.
    pub fn inflation(&self) -> f64 {
        let min_rtt = self.min_rtt.map_or(f64::INFINITY, |v| v.as_nanos() as f64);
        self.avg_rtt.as_nanos() as f64 - min_rtt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: f64 = 1_000_000.0;

    #[test]
    fn dispersion() {
        let now = Instant::now();
        let first = now + Duration::from_millis(50);
        let last = now + Duration::from_millis(150);

        assert_eq!(ack_train_dispersion(first, last, 3), Some(150.0 * MS));
        assert_eq!(ack_train_dispersion(first, last, 2), Some(200.0 * MS));
        assert_eq!(ack_train_dispersion(first, last, 1), None);
        assert_eq!(ack_train_dispersion(first, last, 0), None);
        assert_eq!(ack_train_dispersion(last, first, 3), Some(0.0));
    }

    #[test]
    fn filter_reset() {
        let mut filter = RttFilter::new(Duration::from_millis(50), true);
        assert_eq!(filter.min_rtt(), None);
        assert_eq!(filter.avg_rtt(), Duration::from_millis(50));
        assert_eq!(filter.inflation(), f64::NEG_INFINITY);

        filter.on_sample(Duration::from_millis(30));
        filter.on_sample(Duration::from_millis(60));
        assert!(filter.min_rtt().is_some());

        filter.reset(Duration::from_millis(70));
        assert_eq!(filter, RttFilter::new(Duration::from_millis(70), true));
    }

    #[test]
    fn filter_min_rtt() {
        let mut filter = RttFilter::new(Duration::from_millis(50), true);
        filter.update_min_rtt(Duration::from_millis(40));
        filter.update_min_rtt(Duration::from_millis(45));
        assert_eq!(filter.min_rtt(), Some(Duration::from_millis(40)));
        filter.update_min_rtt(Duration::from_millis(20));
        assert_eq!(filter.min_rtt(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn filter_stale() {
        let mut filter = RttFilter::new(Duration::from_millis(50), true);
        assert!(!filter.is_stale(Duration::from_secs(100), 10));

        filter.update_min_rtt(Duration::from_millis(10));
        assert!(!filter.is_stale(Duration::from_millis(100), 10));
        assert!(filter.is_stale(Duration::from_millis(101), 10));
        assert!(filter.is_stale(Duration::from_millis(500), 10));
    }

    #[test]
    fn filter_ewma() {
        let mut filter = RttFilter::new(Duration::from_millis(50), true);

        // The first sample is the minimum: weight 0 and no inflation.
        let delta = filter.on_sample(Duration::from_millis(20));
        assert_eq!(filter.alpha(), 0.0);
        assert_eq!(filter.avg_rtt(), Duration::from_millis(20));
        assert_eq!(delta, 0.0);

        // w = (40 - 20) / 40 = 0.5, avg = 0.5 * 20 + 0.5 * 40 = 30
        let delta = filter.on_sample(Duration::from_millis(40));
        assert_eq!(filter.alpha(), 0.5);
        assert_eq!(filter.avg_rtt(), Duration::from_millis(30));
        assert_eq!(delta, 10.0 * MS);

        // w = (80 - 20) / 80 = 0.75, avg = 0.75 * 30 + 0.25 * 80 = 42.5
        let delta = filter.on_sample(Duration::from_millis(80));
        assert_eq!(filter.alpha(), 0.75);
        assert_eq!(filter.avg_rtt(), Duration::from_micros(42500));
        assert_eq!(delta, 22.5 * MS);
    }

    #[test]
    fn filter_sample_below_min_rtt() {
        let mut filter = RttFilter::new(Duration::from_millis(50), false);
        filter.update_min_rtt(Duration::from_millis(20));

        // w = (10 - 20) / 10 = -1, avg = -1 * 50 + 2 * 10 = -30, floored at 0
        let delta = filter.on_sample(Duration::from_millis(10));
        assert_eq!(filter.min_rtt(), Some(Duration::from_millis(20)));
        assert_eq!(filter.alpha(), -1.0);
        assert_eq!(filter.avg_rtt(), Duration::ZERO);
        assert_eq!(delta, -20.0 * MS);

        let mut filter = RttFilter::new(Duration::from_millis(50), true);
        filter.update_min_rtt(Duration::from_millis(20));
        let delta = filter.on_sample(Duration::from_millis(10));
        assert_eq!(filter.min_rtt(), Some(Duration::from_millis(20)));
        assert_eq!(filter.alpha(), 0.0);
        assert_eq!(filter.avg_rtt(), Duration::from_millis(10));
        assert_eq!(delta, -10.0 * MS);
    }

    #[test]
    fn filter_weight_bounds() {
        let mut filter = RttFilter::new(Duration::from_millis(50), true);
        filter.update_min_rtt(Duration::from_millis(40));

        // A sample below the minimum RTT would give a negative weight.
        assert_eq!(filter.ewma_weight(Duration::from_millis(20)), 0.0);
        assert_eq!(filter.ewma_weight(Duration::ZERO), 0.0);
        assert_eq!(filter.ewma_weight(Duration::from_millis(80)), 0.5);

        let mut unclamped = RttFilter::new(Duration::from_millis(50), false);
        unclamped.update_min_rtt(Duration::from_millis(40));
        assert_eq!(unclamped.ewma_weight(Duration::from_millis(20)), -1.0);
        assert_eq!(unclamped.ewma_weight(Duration::ZERO), 0.0);

        // Without any minimum the weight is unbounded below.
        let unset = RttFilter::new(Duration::from_millis(50), true);
        assert_eq!(unset.ewma_weight(Duration::from_millis(20)), 0.0);
    }
}
