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

//! An implementation of the qlog main logging schema and the recovery event
//! definitions used by the congestion controllers.

use std::time::Instant;

use serde::Serialize;

use self::events::Event;
use self::events::EventData;
use self::events::EventImportance;
use crate::Error;
use crate::Result;

/// The qlog_version is 0.4 for draft-ietf-quic-qlog-main-schema-07
pub const QLOG_VERSION: &str = "0.4";

/// The serialization format for QlogFileSeq is JSON-SEQ
/// See RFC 7464: JavaScript Object Notation (JSON) Text Sequences
pub const JSON_TEXT_SEQS: &str = "JSON-SEQ";

/// A qlog file using the QlogFileSeq schema can be serialized to a streamable
/// JSON format called JSON Text Sequences (JSON-SEQ) ([RFC7464])
/// See draft-ietf-quic-qlog-main-schema-07
#[serde_with::skip_serializing_none]
#[derive(Serialize, Clone, Debug)]
pub struct QlogFileSeq {
    /// The qlog_format field MUST have the value "JSON-SEQ".
    pub qlog_format: String,

    /// The qlog_version field MUST have the value "0.4".
    pub qlog_version: String,

    /// The title field provide additional free-text information about the file.
    pub title: Option<String>,

    /// The description field provide additional free-text information about
    /// the file.
    pub description: Option<String>,

    /// The trace field contains a singular trace metadata. All qlog events in
    /// the file are related to this trace.
    pub trace: TraceSeq,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct TraceSeq {
    pub title: Option<String>,
    pub description: Option<String>,
    pub vantage_point: VantagePoint,
}

impl TraceSeq {
    pub fn new(title: Option<String>, description: Option<String>, vantage_point: VantagePoint) -> Self {
        TraceSeq {
            title,
            description,
            vantage_point,
        }
    }
}

/// Describes the vantage point from which the trace originates.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
pub struct VantagePoint {
    /// Name of the vantage point.
    pub name: Option<String>,

    /// Client or server.
    pub r#type: VantagePointType,
}

impl VantagePoint {
    /// Return the vantage point of a server or a client controller.
    pub fn new(name: Option<String>, is_server: bool) -> VantagePoint {
        let vp_type = if is_server {
            VantagePointType::Server
        } else {
            VantagePointType::Client
        };

        Self {
            name,
            r#type: vp_type,
        }
    }
}

#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum VantagePointType {
    /// Endpoint which initiates the connection
    Client,

    /// Endpoint which accepts the connection
    Server,
}

/// Streams congestion control events of one connection as a QlogFileSeq.
pub struct QlogWriter {
    /// Header written once by `start`.
    qlog: QlogFileSeq,

    /// Events below this level will not be written out.
    level: EventImportance,

    /// Output sink.
    writer: Box<dyn std::io::Write + Send + Sync>,

    /// Whether the header has been written.
    ready: bool,

    /// Event times are relative to it.
    start_time: Instant,
}

impl QlogWriter {
    pub fn new(
        title: Option<String>,
        description: Option<String>,
        trace: TraceSeq,
        level: EventImportance,
        writer: Box<dyn std::io::Write + Send + Sync>,
        start_time: Instant,
    ) -> Self {
        let qlog = QlogFileSeq {
            qlog_format: JSON_TEXT_SEQS.to_string(),
            qlog_version: QLOG_VERSION.to_string(),
            title,
            description,
            trace,
        };

        QlogWriter {
            qlog,
            level,
            writer,
            ready: false,
            start_time,
        }
    }

    /// Start qlog serialization and write the QlogFileSeq.
    pub fn start(&mut self) -> Result<()> {
        if self.ready {
            return Err(Error::Done);
        }

        self.writer.as_mut().write_all(b" ")?;
        serde_json::to_writer(self.writer.as_mut(), &self.qlog).map_err(|_| Error::Done)?;
        self.writer.as_mut().write_all(b"\n")?;
        self.ready = true;
        Ok(())
    }

    /// Flush qlog serialization data.
    pub fn flush(&mut self) -> Result<()> {
        if !self.ready {
            return Err(Error::InvalidState("expect ready state".into()));
        }

        self.writer.as_mut().flush()?;
        Ok(())
    }

    /// Write an event in JSON-SEQ format.
    pub fn add_event(&mut self, event: Event) -> Result<()> {
        self.check(event.importance())?;

        self.writer.as_mut().write_all(b" ")?;
        serde_json::to_writer(self.writer.as_mut(), &event).map_err(|_| Error::Done)?;
        self.writer.as_mut().write_all(b"\n")?;
        Ok(())
    }

    /// Write an event in JSON-SEQ format.
    pub fn add_event_data(&mut self, time: Instant, event_data: EventData) -> Result<()> {
        let event = Event::new(self.relative_time(time), event_data);
        self.add_event(event)
    }

    /// Return whether the event should be written
    fn check(&self, ei: EventImportance) -> Result<()> {
        if !self.ready {
            return Err(Error::InvalidState("not ready".into()));
        }
        if !ei.is_contained_in(&self.level) {
            return Err(Error::Done);
        }
        Ok(())
    }

    /// Return the relative time for the writer, in milliseconds.
    pub fn relative_time(&self, time: Instant) -> f32 {
        let duration = time.saturating_duration_since(self.start_time);
        duration.as_secs_f32() * 1000.0
    }
}

impl std::fmt::Debug for QlogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "qlog writer ready={:?} level={:?}", self.ready, self.level)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;
    use crate::qlog::events::CongestionStateUpdatedTrigger;

    /// An in-memory writer which can be inspected while owned by a QlogWriter.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub(crate) fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8(buf.clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn new_test_trace_seq() -> TraceSeq {
        TraceSeq::new(
            Some("qlog trace".to_string()),
            Some("qlog trace description".to_string()),
            VantagePoint::new(None, false),
        )
    }

    pub(crate) fn new_test_qlog_writer(buf: SharedBuffer, start_time: Instant) -> QlogWriter {
        QlogWriter::new(
            Some("title".to_string()),
            Some("description".to_string()),
            new_test_trace_seq(),
            EventImportance::Base,
            Box::new(buf),
            start_time,
        )
    }

    #[test]
    fn qlog_writer_operations() -> Result<()> {
        let buf = SharedBuffer::default();
        let mut qlog_writer = new_test_qlog_writer(buf.clone(), Instant::now());

        // Add an event before the QlogWriter is started
        let event1 = Event::new(
            0.0,
            EventData::RecoveryCongestionStateUpdated {
                old: None,
                new: "steady".into(),
                trigger: Some(CongestionStateUpdatedTrigger::Reset),
            },
        );
        assert!(qlog_writer.add_event(event1.clone()).is_err());
        assert!(qlog_writer.flush().is_err());

        // Start the QlogWriter
        qlog_writer.start()?;
        assert_eq!(qlog_writer.start(), Err(Error::Done));

        // Add an Event
        qlog_writer.add_event(event1)?;

        // Add an EventData
        let event2 = EventData::RecoveryMetricsUpdated {
            min_rtt: None,
            smoothed_rtt: None,
            congestion_window: Some(1),
            ssthresh: None,
            pacing_interval: None,
            send_quantum: None,
        };
        qlog_writer.add_event(Event::new(1.0, event2))?;

        // Flush the QlogWriter
        qlog_writer.flush()?;

        assert_eq!(
            buf.contents(),
            r#" {"qlog_format":"JSON-SEQ","qlog_version":"0.4","title":"title","description":"description","trace":{"title":"qlog trace","description":"qlog trace description","vantage_point":{"type":"client"}}}
 {"time":0.0,"name":"recovery:congestion_state_updated","data":{"new":"steady","trigger":"reset"}}
 {"time":1.0,"name":"recovery:metrics_updated","data":{"congestion_window":1}}
"#
        );

        Ok(())
    }

    #[test]
    fn vantage_point() {
        let vp = VantagePoint::new(Some("wave".to_string()), true);
        assert_eq!(
            serde_json::to_string(&vp).unwrap(),
            r#"{"name":"wave","type":"server"}"#
        );
        assert_eq!(VantagePoint::new(None, false).r#type, VantagePointType::Client);
    }

    #[test]
    fn qlog_writer_level() -> Result<()> {
        let buf = SharedBuffer::default();
        let now = Instant::now();
        let mut qlog_writer = QlogWriter::new(
            None,
            None,
            new_test_trace_seq(),
            EventImportance::Core,
            Box::new(buf.clone()),
            now,
        );
        qlog_writer.start()?;

        // Base events are filtered out at the Core level.
        let event = EventData::RecoveryCongestionStateUpdated {
            old: None,
            new: "steady".into(),
            trigger: None,
        };
        assert_eq!(qlog_writer.add_event_data(now, event), Err(Error::Done));
        assert_eq!(buf.contents().lines().count(), 1);

        assert_eq!(
            qlog_writer.relative_time(now + std::time::Duration::from_millis(5)),
            5.0
        );
        assert_eq!(qlog_writer.relative_time(now), 0.0);
        Ok(())
    }
}

pub mod events;
