use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Lifecycle hooks observed while a single request travels through the transport.
///
/// Declaration order follows the order in which the hooks fire for a fresh connection, so the
/// derived `Ord` can be used to keep per-event maps in lifecycle order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum EventName {
    GetConn,
    #[strum(serialize = "DNSStart")]
    #[serde(rename = "DNSStart")]
    DnsStart,
    #[strum(serialize = "DNSDone")]
    #[serde(rename = "DNSDone")]
    DnsDone,
    ConnectStart,
    ConnectDone,
    GotConn,
    #[strum(serialize = "TLSHandshakeStart")]
    #[serde(rename = "TLSHandshakeStart")]
    TlsHandshakeStart,
    #[strum(serialize = "TLSHandshakeDone")]
    #[serde(rename = "TLSHandshakeDone")]
    TlsHandshakeDone,
    WroteHeaders,
    WroteRequest,
    GotFirstResponseByte,
    PutIdleConn,
    BodyRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub name: EventName,
    /// Offset from the start of the request.
    pub time: Duration,
}

/// Timestamps transport lifecycle events for one request.
///
/// A tracer is created right before the request is issued and shared with every transport layer
/// that participates in it (resolver, connector, connection stream). Events are appended under a
/// lock and their offsets are taken while holding it, so the stored sequence is always
/// non-decreasing in time.
#[derive(Debug)]
pub struct Tracer {
    started: Instant,
    events: Mutex<Vec<Event>>,
}

impl Tracer {
    #[must_use]
    pub fn start() -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
            events: Mutex::new(Vec::with_capacity(12)),
        })
    }

    pub fn record(&self, name: EventName) {
        let mut events = self.events.lock();
        let time = self.started.elapsed();
        events.push(Event { name, time });
    }

    /// Records `name` unless it was already recorded for this request.
    pub fn record_once(&self, name: EventName) {
        let mut events = self.events.lock();
        if events.iter().any(|e| e.name == name) {
            return;
        }
        let time = self.started.elapsed();
        events.push(Event { name, time });
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Event> {
        self.events.lock().last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr as _;

    #[test]
    fn event_names_use_transport_hook_spelling() {
        assert_eq!(EventName::DnsStart.to_string(), "DNSStart");
        assert_eq!(EventName::TlsHandshakeDone.to_string(), "TLSHandshakeDone");
        assert_eq!(EventName::GotFirstResponseByte.to_string(), "GotFirstResponseByte");
        assert_eq!(EventName::from_str("dnsdone").ok(), Some(EventName::DnsDone));
        assert_eq!(EventName::from_str("bodyread").ok(), Some(EventName::BodyRead));
    }

    #[test]
    fn recorded_events_are_ordered_and_deduplicated() {
        let tracer = Tracer::start();
        tracer.record(EventName::GetConn);
        tracer.record_once(EventName::WroteHeaders);
        tracer.record_once(EventName::WroteHeaders);
        tracer.record(EventName::BodyRead);

        let events = tracer.events();
        let names: Vec<EventName> = events.iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![EventName::GetConn, EventName::WroteHeaders, EventName::BodyRead]
        );
        assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
        assert_eq!(tracer.last().map(|e| e.name), Some(EventName::BodyRead));
    }
}
