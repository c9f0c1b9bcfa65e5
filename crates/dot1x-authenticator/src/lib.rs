//! IEEE 802.1X Port Authenticator
//!
//! This crate terminates EAPOL conversations with supplicants and relays
//! their EAP exchanges to a RADIUS server, built on top of the
//! `dot1x-proto` codecs.
//!
//! # Features
//!
//! - Per-supplicant EAP state machine with retransmission and quarantine
//! - RADIUS packet-id correlation with Response Authenticator checks
//! - Async I/O with Tokio over an `AF_PACKET` socket and UDP
//! - Pluggable authorisation callbacks
//! - JSON configuration and audit log
//!
//! # Example
//!
//! ```rust,no_run
//! use dot1x_authenticator::{AuditLogger, AuthenticatorService, Config, LoggingEventHandler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("dot1x.json")?;
//!     let audit = AuditLogger::new(config.audit_log_path.clone())?;
//!     let handler = Arc::new(LoggingEventHandler::new(audit.clone()));
//!
//!     let service = AuthenticatorService::bind(&config, handler, audit).await?;
//!     let ports = service.handle();
//!     tokio::spawn(async move {
//!         let _ = ports.port_up("00:00:00:00:00:01".parse().unwrap()).await;
//!     });
//!     service.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod authenticator;
pub mod config;
pub mod error;
pub mod handler;
pub mod link;
pub mod machine;
pub mod registry;
pub mod service;
pub mod timer;

pub use audit::{AuditEntry, AuditEventType, AuditLogger};
pub use authenticator::{
    Authenticator, AuthenticatorSettings, Outbound, RandomAuthenticators,
    RequestAuthenticatorSource,
};
pub use config::{Config, ConfigError, PortConfig};
pub use error::AuthenticatorError;
pub use handler::{AuthEvent, AuthEventHandler, LoggingEventHandler, RecordingEventHandler};
#[cfg(target_os = "linux")]
pub use link::AfPacketSocket;
pub use link::{ChannelLink, LinkPeer, LinkSocket};
pub use machine::{
    Action, Event, MachineSettings, Outcome, RadiusReply, RadiusRequest, SequenceError,
    SessionState, StateMachine,
};
pub use registry::{Correlation, RadiusIdAllocator, RegistryStats, SessionRegistry};
pub use service::{AuthenticatorHandle, AuthenticatorService};
pub use timer::TimerScheduler;
