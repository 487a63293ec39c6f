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

//! Concrete qlog event definitions for congestion control
//! - draft-ietf-quic-qlog-quic-events-06

use serde::Serialize;

/// Each event is specified as a generic object with a number of member fields
/// and their associated data.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Event {
    /// The "time" field indicates the timestamp at which the event occurred.
    pub time: f32,

    /// The data field is a generic object. It contains the per-event metadata
    /// and its form and semantics are defined per specific sort of event.
    #[serde(flatten)]
    pub data: EventData,

    /// A "group identifier" that indicates to which conceptual "group" each
    /// event belongs, e.g. the connection.
    pub group_id: Option<String>,
}

impl Event {
    pub fn new(time: f32, data: EventData) -> Self {
        Event {
            time,
            data,
            group_id: Default::default(),
        }
    }

    /// Return the importance of the event.
    pub fn importance(&self) -> EventImportance {
        self.data.importance()
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(tag = "name", content = "data")]
#[allow(clippy::large_enum_variant)]
pub enum EventData {
    /// This event is emitted when one or more of the observable recovery
    /// metrics changes value.
    #[serde(rename = "recovery:metrics_updated")]
    RecoveryMetricsUpdated {
        min_rtt: Option<f32>,
        smoothed_rtt: Option<f32>,
        congestion_window: Option<u64>,
        ssthresh: Option<u64>,
        pacing_interval: Option<u64>,
        send_quantum: Option<u64>,
    },

    /// This event signifies when the congestion controller enters a significant
    /// new state and changes its behaviour.
    #[serde(rename = "recovery:congestion_state_updated")]
    RecoveryCongestionStateUpdated {
        old: Option<String>,
        new: String,
        trigger: Option<CongestionStateUpdatedTrigger>,
    },
}

impl EventData {
    /// Return the importance of the event data.
    pub fn importance(&self) -> EventImportance {
        match *self {
            EventData::RecoveryMetricsUpdated { .. } => EventImportance::Core,
            EventData::RecoveryCongestionStateUpdated { .. } => EventImportance::Base,
        }
    }
}

/// An "importance indicator" in decreasing order of importance and expected
/// usage.
#[derive(Clone, Debug, PartialEq, PartialOrd)]
pub enum EventImportance {
    /// The "Core" events are the events that SHOULD be present in all qlog
    /// files for a given protocol.
    Core = 0,

    /// The "Base" events add additional debugging options and CAN be present
    /// in qlog files.
    Base = 1,

    /// The "Extra" events are considered mostly useful for low-level debugging
    /// of the implementation, rather than the protocol.
    Extra = 2,
}

impl EventImportance {
    /// Return true if this importance level is included by `other`.
    pub fn is_contained_in(&self, other: &EventImportance) -> bool {
        self <= other
    }
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum CongestionStateUpdatedTrigger {
    /// The filtered RTT inflation exceeded the adjustment threshold.
    RttInflation,

    /// The transport asked for a reset.
    Reset,
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn serialize_metrics_updated_event() {
        let event_data = EventData::RecoveryMetricsUpdated {
            min_rtt: Some(20.0),
            smoothed_rtt: Some(50.0),
            congestion_window: Some(u64::MAX),
            ssthresh: None,
            pacing_interval: Some(14182400),
            send_quantum: Some(14440),
        };

        let event = Event::new(1000.0, event_data);
        assert_eq!(event.importance(), EventImportance::Core);
        assert_eq!(
            serde_json::to_string_pretty(&event).unwrap(),
            r#"{
  "time": 1000.0,
  "name": "recovery:metrics_updated",
  "data": {
    "min_rtt": 20.0,
    "smoothed_rtt": 50.0,
    "congestion_window": 18446744073709551615,
    "pacing_interval": 14182400,
    "send_quantum": 14440
  }
}"#
        );
    }

    #[test]
    fn serialize_congestion_state_updated_event() {
        let event_data = EventData::RecoveryCongestionStateUpdated {
            old: Some("steady".into()),
            new: "adjustment".into(),
            trigger: Some(CongestionStateUpdatedTrigger::RttInflation),
        };

        let event = Event::new(0.5, event_data);
        assert_eq!(event.importance(), EventImportance::Base);
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"time":0.5,"name":"recovery:congestion_state_updated","data":{"old":"steady","new":"adjustment","trigger":"rtt_inflation"}}"#
        );
    }

    #[test]
    fn event_importance() {
        assert!(EventImportance::Core.is_contained_in(&EventImportance::Base));
        assert!(EventImportance::Base.is_contained_in(&EventImportance::Base));
        assert!(!EventImportance::Extra.is_contained_in(&EventImportance::Base));
    }
}
