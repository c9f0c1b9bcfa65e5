//! Authenticator engine
//!
//! Owns the session registry, the RADIUS correlation table and the timer
//! queue. Every entry point takes the current instant and returns the
//! frames and packets to write, so the engine can be driven by the tokio
//! service or directly by tests.

use crate::audit::{AuditEntry, AuditEventType, AuditLogger};
use crate::config::Config;
use crate::handler::AuthEventHandler;
use crate::machine::{
    Action, Event, MachineSettings, Outcome, RadiusReply, RadiusRequest, SequenceError,
    SessionState, StateMachine,
};
use crate::registry::{RegistryStats, SessionRegistry};
use crate::timer::TimerScheduler;
use dot1x_proto::{
    decode_eapol, decode_radius, encode_eapol, encode_radius, generate_request_authenticator,
    AccessRequest, CodecError, EapPacket, EapolBody, MacAddress, RadiusAttribute, ValidationMode,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Message the engine wants written to one of its endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Complete Ethernet frame for the link socket
    Eapol(Vec<u8>),
    /// Access-Request for the RADIUS server
    Radius(Vec<u8>),
}

/// Source of Request Authenticators for outgoing Access-Requests
pub trait RequestAuthenticatorSource: Send {
    fn next_authenticator(&mut self) -> [u8; 16];
}

impl<F> RequestAuthenticatorSource for F
where
    F: FnMut() -> [u8; 16] + Send,
{
    fn next_authenticator(&mut self) -> [u8; 16] {
        self()
    }
}

/// Random Request Authenticators (RFC 2865 Section 3)
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomAuthenticators;

impl RequestAuthenticatorSource for RandomAuthenticators {
    fn next_authenticator(&mut self) -> [u8; 16] {
        generate_request_authenticator()
    }
}

/// Engine settings derived from [`Config`]
#[derive(Debug, Clone)]
pub struct AuthenticatorSettings {
    pub secret: Vec<u8>,
    pub called_station_id: String,
    pub nas_port_type: u32,
    pub machine: MachineSettings,
    pub validation: ValidationMode,
    /// Source address for frames sent on behalf of a multicast port id
    pub interface_mac: MacAddress,
    /// Ports with an explicit enable flag
    pub ports: Vec<(MacAddress, bool)>,
}

impl Default for AuthenticatorSettings {
    fn default() -> Self {
        AuthenticatorSettings {
            secret: b"SECRET".to_vec(),
            called_station_id: "44-44-44-44-44-44:".to_string(),
            nas_port_type: dot1x_proto::nas_port_type::ETHERNET,
            machine: MachineSettings::default(),
            validation: ValidationMode::Strict,
            interface_mac: MacAddress::ZERO,
            ports: Vec::new(),
        }
    }
}

impl AuthenticatorSettings {
    pub fn from_config(config: &Config, interface_mac: MacAddress) -> Self {
        AuthenticatorSettings {
            secret: config.radius_secret.as_bytes().to_vec(),
            called_station_id: config.called_station_id.clone(),
            nas_port_type: config.nas_port_type,
            machine: MachineSettings {
                retries: config.retries,
                timeout: config.timeout(),
                held_period: config.held_period(),
            },
            validation: if config.strict_message_authenticator {
                ValidationMode::Strict
            } else {
                ValidationMode::Lenient
            },
            interface_mac,
            ports: config
                .ports
                .iter()
                .map(|p| (p.port_id, p.enabled))
                .collect(),
        }
    }
}

pub struct Authenticator {
    settings: AuthenticatorSettings,
    registry: SessionRegistry,
    timers: TimerScheduler,
    handler: Arc<dyn AuthEventHandler>,
    authenticators: Box<dyn RequestAuthenticatorSource>,
    audit: AuditLogger,
}

impl Authenticator {
    pub fn new(settings: AuthenticatorSettings, handler: Arc<dyn AuthEventHandler>) -> Self {
        let mut registry = SessionRegistry::new();
        for &(port, enabled) in &settings.ports {
            registry.set_port_enabled(port, enabled);
        }

        Authenticator {
            settings,
            registry,
            timers: TimerScheduler::new(),
            handler,
            authenticators: Box::new(RandomAuthenticators),
            audit: AuditLogger::disabled(),
        }
    }

    /// Replace the random Request Authenticator source
    pub fn with_authenticator_source(
        mut self,
        source: impl RequestAuthenticatorSource + 'static,
    ) -> Self {
        self.authenticators = Box::new(source);
        self
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    pub fn settings(&self) -> &AuthenticatorSettings {
        &self.settings
    }

    /// Process one frame captured on the link
    pub fn handle_eapol(&mut self, bytes: &[u8], now: Instant) -> Vec<Outbound> {
        let frame = match decode_eapol(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(len = bytes.len(), error = %e, "Dropping malformed EAPOL frame");
                return vec![];
            }
        };

        let mac = frame.src;
        let port = frame.dst;
        if mac == self.settings.interface_mac || mac.is_multicast() {
            trace!(mac = %mac, "Ignoring frame from own or group address");
            return vec![];
        }
        if !self.registry.port_enabled(port) {
            debug!(mac = %mac, port = %port, "Dropping frame on disabled port");
            return vec![];
        }

        let session = self
            .registry
            .get_or_create(mac, port, self.settings.machine);
        session.set_port(port);
        let before = session.state();

        let event = match frame.body {
            EapolBody::Start => Event::EapolStart,
            EapolBody::Logoff => Event::EapolLogoff,
            EapolBody::Eap(packet) => {
                debug!(
                    mac = %mac,
                    code = ?packet.code,
                    eap_id = packet.identifier,
                    "EAP from supplicant"
                );
                Event::Eap(packet)
            }
        };

        let out = self.dispatch(mac, event, now);

        if before == SessionState::Connecting
            && self.session_state(mac) == Some(SessionState::Authenticating)
        {
            let session = self.registry.get(&mac);
            let username = session
                .and_then(|s| s.username())
                .unwrap_or_default()
                .to_string();
            let radius_id = session.and_then(|s| s.pending_radius_id());
            info!(mac = %mac, port = %port, username = %username, "Identity received");

            let mut entry = AuditEntry::new(AuditEventType::Identity)
                .with_mac(mac)
                .with_port(port)
                .with_username(username);
            if let Some(id) = radius_id {
                entry = entry.with_radius_id(id);
            }
            self.audit.log(entry);
        }

        out
    }

    /// Process one datagram from the RADIUS server
    pub fn handle_radius(&mut self, bytes: &[u8], now: Instant) -> Vec<Outbound> {
        let registry = &self.registry;
        let packet = match decode_radius(
            bytes,
            &self.settings.secret,
            |id| registry.request_authenticator(id),
            self.settings.validation,
        ) {
            Ok(packet) => packet,
            Err(CodecError::Authentication(e)) => {
                warn!(error = %e, "Dropping unauthenticated RADIUS reply");
                return vec![];
            }
            Err(e) => {
                warn!(len = bytes.len(), error = %e, "Dropping malformed RADIUS reply");
                return vec![];
            }
        };

        let id = packet.identifier;
        let reply = match RadiusReply::from_packet(&packet) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(radius_id = id, error = %e, "Dropping RADIUS reply with malformed EAP-Message");
                return vec![];
            }
        };

        let Some(session) = self.registry.resolve_by_radius_id(id) else {
            debug!(radius_id = id, "RADIUS reply for unknown session");
            return vec![];
        };
        let mac = session.mac();
        let before = session.state();
        debug!(mac = %mac, radius_id = id, code = ?reply.code, "RADIUS reply");

        // the request stays outstanding until its session accepts a reply
        match session.handle(Event::Radius { id, reply }) {
            Ok(actions) => {
                let after = session.state();
                if before != after {
                    debug!(mac = %mac, from = %before, to = %after, "State change");
                }
                self.registry.remove_correlation(id);
                self.apply(mac, actions, now)
            }
            Err(e @ SequenceError::StaleRadiusReply { .. }) => {
                debug!(mac = %mac, error = %e, "Discarded abandoned RADIUS reply");
                self.registry.remove_correlation(id);
                vec![]
            }
            Err(e) => {
                debug!(mac = %mac, state = %before, error = %e, "Discarded RADIUS reply");
                vec![]
            }
        }
    }

    /// Deliver every timer due at `now`
    pub fn fire_timers(&mut self, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Some((mac, generation)) = self.timers.pop_due(now) {
            out.extend(self.dispatch(mac, Event::Timeout { generation }, now));
        }
        out
    }

    /// Enable 802.1X on a port and (re)start its sessions
    ///
    /// A port without sessions gets a pre-emptive Identity Request sent to
    /// the PAE group address.
    pub fn port_up(&mut self, port: MacAddress, now: Instant) -> Vec<Outbound> {
        info!(port = %port, "Port up");
        self.registry.set_port_enabled(port, true);
        self.audit
            .log(AuditEntry::new(AuditEventType::PortUp).with_port(port));

        let macs = self.registry.sessions_on_port(port);
        if macs.is_empty() {
            let request = EapPacket::identity_request(0);
            let frame = encode_eapol(&request, self.source_for(port), MacAddress::PAE_GROUP);
            return vec![Outbound::Eapol(frame)];
        }

        let mut out = Vec::new();
        for mac in macs {
            out.extend(self.dispatch(mac, Event::PortUp, now));
        }
        out
    }

    /// Disable a port and return its sessions to Idle
    pub fn port_down(&mut self, port: MacAddress, now: Instant) -> Vec<Outbound> {
        info!(port = %port, "Port down");
        self.registry.set_port_enabled(port, false);
        self.audit
            .log(AuditEntry::new(AuditEventType::PortDown).with_port(port));

        let mut out = Vec::new();
        for mac in self.registry.sessions_on_port(port) {
            out.extend(self.dispatch(mac, Event::PortDown, now));
        }
        out
    }

    /// Earliest instant at which [`fire_timers`](Self::fire_timers) has work
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn session(&self, mac: MacAddress) -> Option<&StateMachine> {
        self.registry.get(&mac)
    }

    pub fn session_state(&self, mac: MacAddress) -> Option<SessionState> {
        self.registry.get(&mac).map(|s| s.state())
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    fn dispatch(&mut self, mac: MacAddress, event: Event, now: Instant) -> Vec<Outbound> {
        let Some(session) = self.registry.get_mut(&mac) else {
            return vec![];
        };
        let before = session.state();

        match session.handle(event) {
            Ok(actions) => {
                let after = session.state();
                if before != after {
                    debug!(mac = %mac, from = %before, to = %after, "State change");
                }
                self.apply(mac, actions, now)
            }
            Err(SequenceError::StaleTimer) => vec![],
            Err(e) => {
                debug!(mac = %mac, state = %before, error = %e, "Discarded event");
                vec![]
            }
        }
    }

    fn apply(&mut self, mac: MacAddress, actions: Vec<Action>, now: Instant) -> Vec<Outbound> {
        let Some(port) = self.registry.get(&mac).map(|s| s.port()) else {
            return vec![];
        };

        let mut out = Vec::new();
        for action in actions {
            match action {
                Action::SendEap(packet) => {
                    out.push(Outbound::Eapol(encode_eapol(
                        &packet,
                        self.source_for(port),
                        mac,
                    )));
                }
                Action::SendRadius(request) => match self.access_request(mac, &request) {
                    Ok((id, bytes)) => {
                        if let Some(session) = self.registry.get_mut(&mac) {
                            session.radius_sent(id);
                        }
                        debug!(mac = %mac, radius_id = id, "Access-Request queued");
                        out.push(Outbound::Radius(bytes));
                    }
                    Err(e) => {
                        warn!(mac = %mac, error = %e, "Could not encode Access-Request");
                    }
                },
                Action::ArmTimer { after, generation } => {
                    self.timers.schedule(now + after, mac, generation);
                }
                Action::Notify(outcome) => match outcome {
                    Outcome::Success => self.handler.on_success(mac, port),
                    Outcome::Failure => self.handler.on_failure(mac, port),
                    Outcome::Logoff => self.handler.on_logoff(mac, port),
                },
            }
        }
        out
    }

    /// Correlate and encode an Access-Request
    fn access_request(
        &mut self,
        mac: MacAddress,
        request: &RadiusRequest,
    ) -> Result<(u8, Vec<u8>), CodecError> {
        let request_authenticator = self.authenticators.next_authenticator();
        let id = self.registry.correlate(mac, request_authenticator);

        let extra = [
            RadiusAttribute::CalledStationId(self.settings.called_station_id.clone()),
            RadiusAttribute::NasPortType(self.settings.nas_port_type),
        ];
        let access_request = AccessRequest {
            eap_message: &request.eap,
            supplicant: mac,
            username: request.username.as_deref(),
            identifier: id,
            request_authenticator,
            state: request.state.as_deref(),
            extra_attributes: &extra,
        };

        match encode_radius(&access_request, &self.settings.secret) {
            Ok(bytes) => Ok((id, bytes)),
            Err(e) => {
                self.registry.remove_correlation(id);
                Err(e)
            }
        }
    }

    fn source_for(&self, port: MacAddress) -> MacAddress {
        if port.is_multicast() {
            self.settings.interface_mac
        } else {
            port
        }
    }
}
