//! Authorisation callbacks
//!
//! The authenticator reports terminal outcomes to the controller that owns
//! the switch ACLs. Callbacks are synchronous and run on the engine task, so
//! implementations should hand slow work off elsewhere.

use crate::audit::{AuditEntry, AuditEventType, AuditLogger};
use dot1x_proto::MacAddress;
use std::sync::Mutex;
use tracing::info;

/// Receiver of per-supplicant authorisation outcomes
///
/// `port` is the port identifier the supplicant's frames were addressed to.
pub trait AuthEventHandler: Send + Sync {
    fn on_success(&self, mac: MacAddress, port: MacAddress);
    fn on_failure(&self, mac: MacAddress, port: MacAddress);
    fn on_logoff(&self, mac: MacAddress, port: MacAddress);
}

/// Handler that only logs and audits outcomes
pub struct LoggingEventHandler {
    audit: AuditLogger,
}

impl LoggingEventHandler {
    pub fn new(audit: AuditLogger) -> Self {
        LoggingEventHandler { audit }
    }

    fn record(&self, event_type: AuditEventType, mac: MacAddress, port: MacAddress) {
        self.audit
            .log(AuditEntry::new(event_type).with_mac(mac).with_port(port));
    }
}

impl AuthEventHandler for LoggingEventHandler {
    fn on_success(&self, mac: MacAddress, port: MacAddress) {
        info!(mac = %mac, port = %port, "Supplicant authorised");
        self.record(AuditEventType::AuthSuccess, mac, port);
    }

    fn on_failure(&self, mac: MacAddress, port: MacAddress) {
        info!(mac = %mac, port = %port, "Supplicant failed authentication");
        self.record(AuditEventType::AuthFailure, mac, port);
    }

    fn on_logoff(&self, mac: MacAddress, port: MacAddress) {
        info!(mac = %mac, port = %port, "Supplicant logged off");
        self.record(AuditEventType::Logoff, mac, port);
    }
}

/// Callback kinds, as captured by [`RecordingEventHandler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    Success { mac: MacAddress, port: MacAddress },
    Failure { mac: MacAddress, port: MacAddress },
    Logoff { mac: MacAddress, port: MacAddress },
}

/// Handler that keeps every callback in memory
///
/// Useful for tests and for controllers that poll.
#[derive(Debug, Default)]
pub struct RecordingEventHandler {
    events: Mutex<Vec<AuthEvent>>,
}

impl RecordingEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuthEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Callbacks delivered for one supplicant
    pub fn events_for(&self, mac: MacAddress) -> Vec<AuthEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.mac() == mac)
            .collect()
    }

    fn push(&self, event: AuthEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl AuthEvent {
    pub fn mac(&self) -> MacAddress {
        match *self {
            AuthEvent::Success { mac, .. }
            | AuthEvent::Failure { mac, .. }
            | AuthEvent::Logoff { mac, .. } => mac,
        }
    }
}

impl AuthEventHandler for RecordingEventHandler {
    fn on_success(&self, mac: MacAddress, port: MacAddress) {
        self.push(AuthEvent::Success { mac, port });
    }

    fn on_failure(&self, mac: MacAddress, port: MacAddress) {
        self.push(AuthEvent::Failure { mac, port });
    }

    fn on_logoff(&self, mac: MacAddress, port: MacAddress) {
        self.push(AuthEvent::Logoff { mac, port });
    }
}
