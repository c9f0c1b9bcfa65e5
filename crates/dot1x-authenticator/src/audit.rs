//! Audit logging for port authentication events
//!
//! Writes one JSON object per line so the file can be shipped to a log
//! pipeline as-is. Identity announcements, authorisation decisions, logoffs
//! and port state changes are recorded.

use dot1x_proto::MacAddress;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::error;

/// Audit event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Supplicant announced an identity
    Identity,
    /// Supplicant authorised on its port
    AuthSuccess,
    /// Authentication rejected or timed out
    AuthFailure,
    /// Supplicant logged off or was de-authorised
    Logoff,
    /// Port enabled for 802.1X
    PortUp,
    /// Port disabled
    PortDown,
    /// Service started
    ServiceStart,
    /// Service stopped
    ServiceStop,
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Timestamp (Unix epoch seconds)
    pub timestamp: u64,
    /// ISO 8601 formatted timestamp
    pub timestamp_iso: String,
    pub event_type: AuditEventType,
    /// Supplicant MAC address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// Port identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// RADIUS packet identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_id: Option<u8>,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub server_version: String,
}

impl AuditEntry {
    /// Create a new audit entry stamped with the current time
    pub fn new(event_type: AuditEventType) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let timestamp = now.as_secs();
        let timestamp_iso = chrono::DateTime::from_timestamp(timestamp as i64, 0)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        AuditEntry {
            timestamp,
            timestamp_iso,
            event_type,
            mac: None,
            port: None,
            username: None,
            radius_id: None,
            details: None,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_mac(mut self, mac: MacAddress) -> Self {
        self.mac = Some(mac.to_string());
        self
    }

    pub fn with_port(mut self, port: MacAddress) -> Self {
        self.port = Some(port.to_string());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_radius_id(mut self, id: u8) -> Self {
        self.radius_id = Some(id);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Audit logger
///
/// Cheap to clone; clones append to the same file.
#[derive(Clone, Default)]
pub struct AuditLogger {
    file_path: Option<String>,
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl AuditLogger {
    /// Open (or create) the audit log in append mode
    pub fn new(file_path: Option<String>) -> std::io::Result<Self> {
        let file = if let Some(ref path) = file_path {
            let f = OpenOptions::new().create(true).append(true).open(path)?;
            Some(Arc::new(Mutex::new(f)))
        } else {
            None
        };

        Ok(AuditLogger { file_path, file })
    }

    /// A logger that records nothing
    pub fn disabled() -> Self {
        AuditLogger::default()
    }

    /// Append an entry
    ///
    /// Write failures are reported through tracing and otherwise ignored.
    pub fn log(&self, entry: AuditEntry) {
        let Some(ref file) = self.file else {
            return;
        };

        match serde_json::to_string(&entry) {
            Ok(json) => {
                let mut f = match file.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Err(e) = writeln!(f, "{}", json) {
                    error!("Failed to write audit log: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to serialize audit entry: {}", e);
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }
}
