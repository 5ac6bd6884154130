//! Dispatch log: per-fire and per-invocation entries kept while logging is active

use crate::event::{Event, ParamKey};
use crate::listener::ListenerRecord;
use crate::utils::current_timestamp;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// One completed fire
#[derive(Debug, Clone, Serialize)]
pub struct EventLogEntry {
    pub event: String,
    /// Parameters as the event carried them when dispatch finished
    pub params: Vec<(ParamKey, Value)>,
    pub propagation_stopped: bool,
    /// Number of listeners invoked
    pub listeners_invoked: usize,
    pub timestamp: u64,
    pub elapsed: Duration,
}

/// One listener invocation
#[derive(Debug, Clone, Serialize)]
pub struct ListenerLogEntry {
    /// Name of the fired event
    pub event: String,
    /// Name the listener was registered under
    pub listener_event: String,
    pub call: String,
    pub priority: i32,
    pub timestamp: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct DispatchLog {
    events: Vec<EventLogEntry>,
    listeners: Vec<ListenerLogEntry>,
}

impl DispatchLog {
    pub(crate) fn record_event(&mut self, event: &Event, listeners_invoked: usize, elapsed: Duration) {
        self.events.push(EventLogEntry {
            event: event.name().to_string(),
            params: event.all_params().to_vec(),
            propagation_stopped: event.is_propagation_stopped(),
            listeners_invoked,
            timestamp: current_timestamp(),
            elapsed,
        });
    }

    pub(crate) fn record_listener(&mut self, event: &Event, record: &ListenerRecord, elapsed: Duration) {
        self.listeners.push(ListenerLogEntry {
            event: event.name().to_string(),
            listener_event: record.event_name().to_string(),
            call: record.target().describe(),
            priority: record.priority(),
            timestamp: current_timestamp(),
            elapsed,
        });
    }

    pub(crate) fn events(&self) -> &[EventLogEntry] {
        &self.events
    }

    pub(crate) fn listeners(&self) -> &[ListenerLogEntry] {
        &self.listeners
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.listeners.clear();
    }
}
