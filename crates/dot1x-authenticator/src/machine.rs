//! Per-supplicant EAP state machine
//!
//! One [`StateMachine`] exists per supplicant MAC. It is a pure transition
//! function: [`StateMachine::handle`] consumes an [`Event`] and returns the
//! [`Action`]s the engine must carry out (frames to send, RADIUS requests to
//! queue, timers to arm, callbacks to fire). It never performs I/O and never
//! reads the clock.
//!
//! ```text
//! Idle -> Connecting -> Authenticating -> Success2
//!              |              |-> Failure2 / TimeoutFailure2 / Logoff2
//!              |-> Failure / TimeoutFailure / Logoff
//! any failure -> (hold timer) -> Held -> Connecting
//! ```
//!
//! Suffix-less terminal states belong to the local identity exchange; the
//! `...2` states are reached while relaying to the RADIUS server.

use dot1x_proto::{eap_from_radius_packet, Code, EapCode, EapError, EapPacket, EapType, MacAddress, Packet};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Per-session protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticating,
    Success2,
    Failure,
    Failure2,
    TimeoutFailure,
    TimeoutFailure2,
    Logoff,
    Logoff2,
    Held,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Success2 => "success2",
            SessionState::Failure => "failure",
            SessionState::Failure2 => "failure2",
            SessionState::TimeoutFailure => "timeout_failure",
            SessionState::TimeoutFailure2 => "timeout_failure2",
            SessionState::Logoff => "logoff",
            SessionState::Logoff2 => "logoff2",
            SessionState::Held => "held",
        }
    }

    /// States in which the conversation has ended
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            SessionState::Idle | SessionState::Connecting | SessionState::Authenticating
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing and retry policy shared by every session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineSettings {
    /// Retransmissions before a wait is abandoned
    pub retries: u32,
    /// Wait for each reply
    pub timeout: Duration,
    /// Quarantine after a failure; zero disables it
    pub held_period: Duration,
}

impl Default for MachineSettings {
    fn default() -> Self {
        MachineSettings {
            retries: 3,
            timeout: Duration::from_secs(5),
            held_period: Duration::from_secs(60),
        }
    }
}

/// The parts of a RADIUS reply the state machine acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusReply {
    pub code: Code,
    pub eap: Option<EapPacket>,
    pub state: Option<Vec<u8>>,
}

impl RadiusReply {
    /// Extract the reassembled EAP-Message and State from a decoded reply
    pub fn from_packet(packet: &Packet) -> Result<Self, EapError> {
        Ok(RadiusReply {
            code: packet.code,
            eap: eap_from_radius_packet(packet)?,
            state: packet.state().map(|s| s.to_vec()),
        })
    }
}

/// Access-Request contents the engine still has to correlate and encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusRequest {
    /// Supplicant's EAP Response, relayed unmodified
    pub eap: Vec<u8>,
    pub username: Option<String>,
    /// State token echoed from the last Access-Challenge
    pub state: Option<Vec<u8>>,
}

/// Input to a state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    EapolStart,
    EapolLogoff,
    Eap(EapPacket),
    /// A reply that already passed authenticator checks for packet `id`
    Radius { id: u8, reply: RadiusReply },
    Timeout { generation: u64 },
    PortUp,
    PortDown,
}

/// Terminal outcome reported through the event handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Logoff,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendEap(EapPacket),
    SendRadius(RadiusRequest),
    /// Supersedes any timer the session armed earlier
    ArmTimer { after: Duration, generation: u64 },
    Notify(Outcome),
}

/// Why an event was discarded without a state change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Unexpected EAP identifier {got}, expected {expected}")]
    UnexpectedIdentifier { expected: u8, got: u8 },

    #[error("Unexpected EAP code {0:?}")]
    UnexpectedCode(EapCode),

    #[error("Unexpected RADIUS code {0:?}")]
    UnexpectedRadiusCode(Code),

    #[error("Supplicant frame while waiting for the RADIUS server")]
    AwaitingServer,

    #[error("Port is disabled")]
    PortDisabled,

    #[error("RADIUS reply {id} does not match the outstanding request")]
    StaleRadiusReply { id: u8 },

    #[error("Access-Challenge without EAP-Message")]
    MissingEapMessage,

    #[error("Timer was superseded")]
    StaleTimer,

    #[error("{event} is not applicable in state {state}")]
    NotApplicable {
        event: &'static str,
        state: SessionState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingServer,
    AwaitingSupplicant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Retransmit,
    Hold,
}

/// EAP authenticator state for a single supplicant
#[derive(Debug, Clone)]
pub struct StateMachine {
    mac: MacAddress,
    port: MacAddress,
    state: SessionState,
    phase: Phase,
    port_enabled: bool,
    current_id: Option<u8>,
    last_request: Option<EapPacket>,
    last_radius: Option<RadiusRequest>,
    username: Option<String>,
    radius_state: Option<Vec<u8>>,
    pending_radius_id: Option<u8>,
    retransmits: u32,
    timer: Option<TimerKind>,
    timer_generation: u64,
    quarantined: bool,
    settings: MachineSettings,
}

impl StateMachine {
    pub fn new(mac: MacAddress, port: MacAddress, settings: MachineSettings) -> Self {
        StateMachine {
            mac,
            port,
            state: SessionState::Idle,
            phase: Phase::AwaitingServer,
            port_enabled: true,
            current_id: None,
            last_request: None,
            last_radius: None,
            username: None,
            radius_state: None,
            pending_radius_id: None,
            retransmits: 0,
            timer: None,
            timer_generation: 0,
            quarantined: false,
            settings,
        }
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn port(&self) -> MacAddress {
        self.port
    }

    /// Supplicants may move between ports; callbacks use the latest one
    pub fn set_port(&mut self, port: MacAddress) {
        self.port = port;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn port_enabled(&self) -> bool {
        self.port_enabled
    }

    /// Set the enable flag of an idle session without emitting anything
    pub(crate) fn set_port_enabled(&mut self, enabled: bool) {
        self.port_enabled = enabled;
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Identifier of the EAP Request the supplicant must answer
    pub fn current_identifier(&self) -> Option<u8> {
        self.current_id
    }

    pub fn radius_state(&self) -> Option<&[u8]> {
        self.radius_state.as_deref()
    }

    pub fn pending_radius_id(&self) -> Option<u8> {
        self.pending_radius_id
    }

    pub fn is_quarantined(&self) -> bool {
        self.quarantined
    }

    /// Record the packet id the engine assigned to the queued Access-Request
    pub fn radius_sent(&mut self, id: u8) {
        self.pending_radius_id = Some(id);
    }

    /// Apply one event
    ///
    /// `Err` means the event was discarded and the session is unchanged.
    pub fn handle(&mut self, event: Event) -> Result<Vec<Action>, SequenceError> {
        match event {
            Event::PortUp => {
                self.port_enabled = true;
                self.quarantined = false;
                Ok(self.restart())
            }
            Event::PortDown => Ok(self.port_down()),
            Event::Timeout { generation } => self.on_timeout(generation),
            Event::Radius { id, reply } => self.on_radius(id, reply),
            Event::EapolStart | Event::EapolLogoff | Event::Eap(_) if !self.port_enabled => {
                Err(SequenceError::PortDisabled)
            }
            Event::EapolStart => Ok(self.on_start()),
            Event::EapolLogoff => self.on_logoff(),
            Event::Eap(packet) => self.on_eap(packet),
        }
    }

    fn on_start(&mut self) -> Vec<Action> {
        if self.quarantined {
            debug!(mac = %self.mac, "EAPOL-Start during hold period");
            self.state = SessionState::Held;
            return vec![];
        }
        self.restart()
    }

    fn on_logoff(&mut self) -> Result<Vec<Action>, SequenceError> {
        self.state = match self.state {
            SessionState::Connecting => SessionState::Logoff,
            SessionState::Authenticating | SessionState::Success2 => SessionState::Logoff2,
            state => {
                return Err(SequenceError::NotApplicable {
                    event: "EAPOL-Logoff",
                    state,
                })
            }
        };
        self.cancel_timer();
        self.pending_radius_id = None;
        self.last_radius = None;
        Ok(vec![Action::Notify(Outcome::Logoff)])
    }

    fn on_eap(&mut self, packet: EapPacket) -> Result<Vec<Action>, SequenceError> {
        if self.quarantined {
            debug!(mac = %self.mac, "EAP frame during hold period");
            self.state = SessionState::Held;
            return Ok(vec![]);
        }

        match (self.state, self.phase) {
            (SessionState::Idle, _) => {
                debug!(mac = %self.mac, "EAP frame for idle session, restarting");
                Ok(self.restart())
            }
            (SessionState::Connecting, _) => self.on_identity(packet),
            (SessionState::Authenticating, Phase::AwaitingServer) => {
                Err(SequenceError::AwaitingServer)
            }
            (SessionState::Authenticating, Phase::AwaitingSupplicant) => {
                self.check_identifier(&packet)?;
                if packet.code != EapCode::Response {
                    return Err(SequenceError::UnexpectedCode(packet.code));
                }
                Ok(self.forward_to_server(&packet))
            }
            (state, _) => Err(SequenceError::NotApplicable { event: "EAP", state }),
        }
    }

    fn on_identity(&mut self, packet: EapPacket) -> Result<Vec<Action>, SequenceError> {
        self.check_identifier(&packet)?;

        if packet.code != EapCode::Response {
            return Ok(self.fail(SessionState::Failure, Some(self.failure_packet())));
        }

        if packet.eap_type == Some(EapType::Identity) {
            self.username = packet.identity();
        }
        self.state = SessionState::Authenticating;
        self.last_request = None;
        Ok(self.forward_to_server(&packet))
    }

    fn on_radius(&mut self, id: u8, reply: RadiusReply) -> Result<Vec<Action>, SequenceError> {
        if self.pending_radius_id != Some(id) {
            return Err(SequenceError::StaleRadiusReply { id });
        }

        match reply.code {
            Code::AccessChallenge => {
                let eap = reply.eap.ok_or(SequenceError::MissingEapMessage)?;
                match eap.code {
                    EapCode::Request => {
                        self.pending_radius_id = None;
                        self.current_id = Some(eap.identifier);
                        if let Some(state) = reply.state {
                            self.radius_state = Some(state);
                        }
                        self.phase = Phase::AwaitingSupplicant;
                        self.retransmits = 0;
                        self.last_request = Some(eap.clone());
                        Ok(vec![
                            Action::SendEap(eap),
                            self.arm(TimerKind::Retransmit, self.settings.timeout),
                        ])
                    }
                    EapCode::Failure => {
                        self.pending_radius_id = None;
                        self.current_id = Some(eap.identifier);
                        Ok(self.fail(SessionState::Failure2, Some(eap)))
                    }
                    code => Err(SequenceError::UnexpectedCode(code)),
                }
            }
            Code::AccessAccept => {
                self.pending_radius_id = None;
                self.cancel_timer();
                let eap = reply
                    .eap
                    .unwrap_or_else(|| EapPacket::success(self.current_id.unwrap_or(0)));
                self.state = SessionState::Success2;
                self.last_radius = None;
                Ok(vec![Action::SendEap(eap), Action::Notify(Outcome::Success)])
            }
            Code::AccessReject => {
                self.pending_radius_id = None;
                let eap = reply.eap.unwrap_or_else(|| self.failure_packet());
                Ok(self.fail(SessionState::Failure2, Some(eap)))
            }
            code => Err(SequenceError::UnexpectedRadiusCode(code)),
        }
    }

    fn on_timeout(&mut self, generation: u64) -> Result<Vec<Action>, SequenceError> {
        if generation != self.timer_generation {
            return Err(SequenceError::StaleTimer);
        }
        let Some(kind) = self.timer.take() else {
            return Err(SequenceError::StaleTimer);
        };

        match kind {
            TimerKind::Hold => {
                self.quarantined = false;
                if self.state == SessionState::Held {
                    Ok(self.restart())
                } else {
                    Ok(vec![])
                }
            }
            TimerKind::Retransmit if self.retransmits < self.settings.retries => {
                self.retransmits += 1;
                let resend = match (self.state, self.phase) {
                    (SessionState::Authenticating, Phase::AwaitingServer) => {
                        self.pending_radius_id = None;
                        self.last_radius.clone().map(Action::SendRadius)
                    }
                    _ => self.last_request.clone().map(Action::SendEap),
                };
                let resend = resend.ok_or(SequenceError::StaleTimer)?;
                debug!(
                    mac = %self.mac,
                    attempt = self.retransmits,
                    state = %self.state,
                    "Retransmitting"
                );
                Ok(vec![
                    resend,
                    self.arm(TimerKind::Retransmit, self.settings.timeout),
                ])
            }
            TimerKind::Retransmit => {
                let state = match self.state {
                    SessionState::Connecting => SessionState::TimeoutFailure,
                    _ => SessionState::TimeoutFailure2,
                };
                Ok(self.fail(state, None))
            }
        }
    }

    fn port_down(&mut self) -> Vec<Action> {
        let was_authorised = self.state == SessionState::Success2;
        self.state = SessionState::Idle;
        self.phase = Phase::AwaitingServer;
        self.port_enabled = false;
        self.quarantined = false;
        self.pending_radius_id = None;
        self.last_request = None;
        self.last_radius = None;
        self.radius_state = None;
        self.cancel_timer();

        if was_authorised {
            vec![Action::Notify(Outcome::Logoff)]
        } else {
            vec![]
        }
    }

    /// Enter Connecting with a fresh Identity Request
    fn restart(&mut self) -> Vec<Action> {
        self.state = SessionState::Connecting;
        self.phase = Phase::AwaitingServer;
        self.username = None;
        self.radius_state = None;
        self.pending_radius_id = None;
        self.last_radius = None;
        self.retransmits = 0;
        self.current_id = None;

        let request = EapPacket::identity_request(self.next_identifier());
        self.last_request = Some(request.clone());
        vec![
            Action::SendEap(request),
            self.arm(TimerKind::Retransmit, self.settings.timeout),
        ]
    }

    fn forward_to_server(&mut self, packet: &EapPacket) -> Vec<Action> {
        let request = RadiusRequest {
            eap: packet.to_bytes(),
            username: self.username.clone(),
            state: self.radius_state.clone(),
        };
        self.phase = Phase::AwaitingServer;
        self.retransmits = 0;
        self.pending_radius_id = None;
        self.last_radius = Some(request.clone());
        vec![
            Action::SendRadius(request),
            self.arm(TimerKind::Retransmit, self.settings.timeout),
        ]
    }

    fn fail(&mut self, state: SessionState, eap: Option<EapPacket>) -> Vec<Action> {
        self.state = state;
        self.pending_radius_id = None;
        self.last_radius = None;
        self.cancel_timer();

        let mut actions = Vec::with_capacity(3);
        if let Some(eap) = eap {
            actions.push(Action::SendEap(eap));
        }
        actions.push(Action::Notify(Outcome::Failure));
        if !self.settings.held_period.is_zero() {
            self.quarantined = true;
            actions.push(self.arm(TimerKind::Hold, self.settings.held_period));
        }
        actions
    }

    fn check_identifier(&self, packet: &EapPacket) -> Result<(), SequenceError> {
        let expected = self.current_id.unwrap_or(0);
        if packet.identifier != expected {
            return Err(SequenceError::UnexpectedIdentifier {
                expected,
                got: packet.identifier,
            });
        }
        Ok(())
    }

    fn failure_packet(&self) -> EapPacket {
        EapPacket::failure(self.current_id.unwrap_or(0))
    }

    fn next_identifier(&mut self) -> u8 {
        let id = self.current_id.map_or(0, |id| id.wrapping_add(1));
        self.current_id = Some(id);
        id
    }

    fn arm(&mut self, kind: TimerKind, after: Duration) -> Action {
        self.timer_generation += 1;
        self.timer = Some(kind);
        Action::ArmTimer {
            after,
            generation: self.timer_generation,
        }
    }

    fn cancel_timer(&mut self) {
        self.timer_generation += 1;
        self.timer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUPPLICANT: MacAddress = MacAddress([0x02, 0x42, 0xac, 0x17, 0x00, 0x6f]);
    const PORT: MacAddress = MacAddress([0, 0, 0, 0, 0, 1]);

    fn settings() -> MachineSettings {
        MachineSettings {
            retries: 2,
            timeout: Duration::from_secs(5),
            held_period: Duration::from_secs(60),
        }
    }

    fn machine() -> StateMachine {
        StateMachine::new(SUPPLICANT, PORT, settings())
    }

    fn generation(actions: &[Action]) -> u64 {
        actions
            .iter()
            .find_map(|a| match a {
                Action::ArmTimer { generation, .. } => Some(*generation),
                _ => None,
            })
            .expect("no timer armed")
    }

    fn challenge(id: u8, state: &[u8]) -> Event {
        Event::Radius {
            id,
            reply: RadiusReply {
                code: Code::AccessChallenge,
                eap: Some(EapPacket::new(
                    EapCode::Request,
                    0x75,
                    Some(EapType::Md5Challenge),
                    vec![0x10; 17],
                )),
                state: Some(state.to_vec()),
            },
        }
    }

    fn reply(id: u8, code: Code) -> Event {
        Event::Radius {
            id,
            reply: RadiusReply {
                code,
                eap: None,
                state: None,
            },
        }
    }

    /// Drive a session to Authenticating with Access-Request id `radius_id` outstanding
    fn authenticating(radius_id: u8) -> (StateMachine, Vec<Action>) {
        let mut sm = machine();
        sm.handle(Event::EapolStart).unwrap();
        let actions = sm
            .handle(Event::Eap(EapPacket::identity_response(0, "user")))
            .unwrap();
        sm.radius_sent(radius_id);
        (sm, actions)
    }

    #[test]
    fn test_start_sends_identity_request() {
        let mut sm = machine();
        let actions = sm.handle(Event::EapolStart).unwrap();

        assert_eq!(sm.state(), SessionState::Connecting);
        assert_eq!(actions[0], Action::SendEap(EapPacket::identity_request(0)));
        assert!(matches!(
            actions[1],
            Action::ArmTimer { after, .. } if after == Duration::from_secs(5)
        ));
    }

    #[test]
    fn test_identity_response_forwards_to_server() {
        let (sm, actions) = authenticating(0);

        assert_eq!(sm.state(), SessionState::Authenticating);
        assert_eq!(sm.username(), Some("user"));
        match &actions[0] {
            Action::SendRadius(request) => {
                assert_eq!(request.username.as_deref(), Some("user"));
                assert_eq!(request.eap, hex_bytes("0200000901757365 72"));
                assert_eq!(request.state, None);
            }
            other => panic!("expected SendRadius, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_identifier_is_discarded() {
        let mut sm = machine();
        sm.handle(Event::EapolStart).unwrap();

        let err = sm
            .handle(Event::Eap(EapPacket::identity_response(9, "user")))
            .unwrap_err();
        assert_eq!(
            err,
            SequenceError::UnexpectedIdentifier {
                expected: 0,
                got: 9
            }
        );
        assert_eq!(sm.state(), SessionState::Connecting);
        assert_eq!(sm.username(), None);
    }

    #[test]
    fn test_challenge_relayed_and_state_echoed() {
        let (mut sm, _) = authenticating(7);

        let actions = sm.handle(challenge(7, b"token")).unwrap();
        assert!(matches!(&actions[0], Action::SendEap(p) if p.identifier == 0x75));
        assert_eq!(sm.current_identifier(), Some(0x75));
        assert_eq!(sm.radius_state(), Some(&b"token"[..]));
        assert_eq!(sm.pending_radius_id(), None);

        let response = EapPacket::new(EapCode::Response, 0x75, Some(EapType::Md5Challenge), vec![1; 17]);
        let actions = sm.handle(Event::Eap(response.clone())).unwrap();
        match &actions[0] {
            Action::SendRadius(request) => {
                assert_eq!(request.eap, response.to_bytes());
                assert_eq!(request.state.as_deref(), Some(&b"token"[..]));
                assert_eq!(request.username.as_deref(), Some("user"));
            }
            other => panic!("expected SendRadius, got {:?}", other),
        }
    }

    #[test]
    fn test_supplicant_frames_dropped_while_awaiting_server() {
        let (mut sm, _) = authenticating(1);
        let err = sm
            .handle(Event::Eap(EapPacket::identity_response(0, "user")))
            .unwrap_err();
        assert_eq!(err, SequenceError::AwaitingServer);
    }

    #[test]
    fn test_request_from_supplicant_in_pass_through_is_discarded() {
        let (mut sm, _) = authenticating(1);
        sm.handle(challenge(1, b"s")).unwrap();

        let bogus = EapPacket::new(EapCode::Request, 0x75, Some(EapType::Identity), vec![]);
        assert_eq!(
            sm.handle(Event::Eap(bogus)).unwrap_err(),
            SequenceError::UnexpectedCode(EapCode::Request)
        );
        assert_eq!(sm.state(), SessionState::Authenticating);
    }

    #[test]
    fn test_stale_radius_id_is_discarded() {
        let (mut sm, _) = authenticating(3);
        assert_eq!(
            sm.handle(reply(4, Code::AccessAccept)).unwrap_err(),
            SequenceError::StaleRadiusReply { id: 4 }
        );
        assert_eq!(sm.state(), SessionState::Authenticating);
    }

    #[test]
    fn test_accept_without_eap_synthesises_success() {
        let (mut sm, _) = authenticating(3);
        let actions = sm.handle(reply(3, Code::AccessAccept)).unwrap();

        assert_eq!(sm.state(), SessionState::Success2);
        assert_eq!(
            actions,
            vec![
                Action::SendEap(EapPacket::success(0)),
                Action::Notify(Outcome::Success)
            ]
        );
    }

    #[test]
    fn test_reject_sends_failure_and_quarantines() {
        let (mut sm, _) = authenticating(3);
        let actions = sm.handle(reply(3, Code::AccessReject)).unwrap();

        assert_eq!(sm.state(), SessionState::Failure2);
        assert_eq!(actions[0], Action::SendEap(EapPacket::failure(0)));
        assert_eq!(actions[1], Action::Notify(Outcome::Failure));
        assert!(matches!(
            actions[2],
            Action::ArmTimer { after, .. } if after == Duration::from_secs(60)
        ));
        assert!(sm.is_quarantined());
    }

    #[test]
    fn test_challenge_carrying_eap_failure() {
        let (mut sm, _) = authenticating(3);
        let event = Event::Radius {
            id: 3,
            reply: RadiusReply {
                code: Code::AccessChallenge,
                eap: Some(EapPacket::failure(0x20)),
                state: None,
            },
        };
        let actions = sm.handle(event).unwrap();
        assert_eq!(sm.state(), SessionState::Failure2);
        assert_eq!(actions[0], Action::SendEap(EapPacket::failure(0x20)));
    }

    #[test]
    fn test_challenge_without_eap_leaves_request_outstanding() {
        let (mut sm, _) = authenticating(3);
        assert_eq!(
            sm.handle(reply(3, Code::AccessChallenge)).unwrap_err(),
            SequenceError::MissingEapMessage
        );
        assert_eq!(sm.pending_radius_id(), Some(3));
    }

    #[test]
    fn test_identity_timeout_retransmits_then_fails_silently() {
        let mut sm = machine();
        let mut actions = sm.handle(Event::EapolStart).unwrap();

        for _ in 0..2 {
            actions = sm
                .handle(Event::Timeout {
                    generation: generation(&actions),
                })
                .unwrap();
            assert_eq!(actions[0], Action::SendEap(EapPacket::identity_request(0)));
        }

        let actions = sm
            .handle(Event::Timeout {
                generation: generation(&actions),
            })
            .unwrap();
        assert_eq!(sm.state(), SessionState::TimeoutFailure);
        assert!(!actions.iter().any(|a| matches!(a, Action::SendEap(_))));
        assert_eq!(
            actions
                .iter()
                .filter(|a| **a == Action::Notify(Outcome::Failure))
                .count(),
            1
        );
    }

    #[test]
    fn test_server_timeout_requeues_then_fails() {
        let (mut sm, mut actions) = authenticating(0);

        for attempt in 1..=2u8 {
            actions = sm
                .handle(Event::Timeout {
                    generation: generation(&actions),
                })
                .unwrap();
            assert!(matches!(actions[0], Action::SendRadius(_)));
            assert_eq!(sm.pending_radius_id(), None);
            sm.radius_sent(attempt);
        }

        // the reply to the first attempt arrives too late
        assert!(sm.handle(reply(0, Code::AccessAccept)).is_err());

        let actions = sm
            .handle(Event::Timeout {
                generation: generation(&actions),
            })
            .unwrap();
        assert_eq!(sm.state(), SessionState::TimeoutFailure2);
        assert_eq!(actions[0], Action::Notify(Outcome::Failure));
    }

    #[test]
    fn test_superseded_timer_is_ignored() {
        let mut sm = machine();
        let first = sm.handle(Event::EapolStart).unwrap();
        sm.handle(Event::EapolStart).unwrap();

        assert_eq!(
            sm.handle(Event::Timeout {
                generation: generation(&first)
            })
            .unwrap_err(),
            SequenceError::StaleTimer
        );
    }

    #[test]
    fn test_logoff_abandons_outstanding_request() {
        let (mut sm, _) = authenticating(9);
        let actions = sm.handle(Event::EapolLogoff).unwrap();

        assert_eq!(sm.state(), SessionState::Logoff2);
        assert_eq!(actions, vec![Action::Notify(Outcome::Logoff)]);
        assert!(sm.handle(reply(9, Code::AccessAccept)).is_err());
        assert_eq!(sm.state(), SessionState::Logoff2);
    }

    #[test]
    fn test_logoff_while_connecting_and_idle() {
        let mut sm = machine();
        assert!(matches!(
            sm.handle(Event::EapolLogoff),
            Err(SequenceError::NotApplicable { .. })
        ));

        sm.handle(Event::EapolStart).unwrap();
        sm.handle(Event::EapolLogoff).unwrap();
        assert_eq!(sm.state(), SessionState::Logoff);
    }

    #[test]
    fn test_logoff_after_success_deauthorises() {
        let (mut sm, _) = authenticating(2);
        sm.handle(reply(2, Code::AccessAccept)).unwrap();
        let actions = sm.handle(Event::EapolLogoff).unwrap();
        assert_eq!(sm.state(), SessionState::Logoff2);
        assert_eq!(actions, vec![Action::Notify(Outcome::Logoff)]);
    }

    #[test]
    fn test_start_during_hold_is_held_then_restarted() {
        let (mut sm, _) = authenticating(3);
        let failed = sm.handle(reply(3, Code::AccessReject)).unwrap();

        assert!(sm.handle(Event::EapolStart).unwrap().is_empty());
        assert_eq!(sm.state(), SessionState::Held);

        let actions = sm
            .handle(Event::Timeout {
                generation: generation(&failed),
            })
            .unwrap();
        assert_eq!(sm.state(), SessionState::Connecting);
        assert_eq!(actions[0], Action::SendEap(EapPacket::identity_request(0)));
        assert!(!sm.is_quarantined());
    }

    #[test]
    fn test_hold_expiry_without_retry_stays_failed() {
        let (mut sm, _) = authenticating(3);
        let failed = sm.handle(reply(3, Code::AccessReject)).unwrap();

        let actions = sm
            .handle(Event::Timeout {
                generation: generation(&failed),
            })
            .unwrap();
        assert!(actions.is_empty());
        assert_eq!(sm.state(), SessionState::Failure2);

        sm.handle(Event::EapolStart).unwrap();
        assert_eq!(sm.state(), SessionState::Connecting);
    }

    #[test]
    fn test_zero_held_period_restarts_immediately() {
        let mut sm = StateMachine::new(
            SUPPLICANT,
            PORT,
            MachineSettings {
                held_period: Duration::ZERO,
                ..settings()
            },
        );
        sm.handle(Event::EapolStart).unwrap();
        sm.handle(Event::Eap(EapPacket::identity_response(0, "user")))
            .unwrap();
        sm.radius_sent(0);

        let actions = sm.handle(reply(0, Code::AccessReject)).unwrap();
        assert!(!actions.iter().any(|a| matches!(a, Action::ArmTimer { .. })));

        sm.handle(Event::EapolStart).unwrap();
        assert_eq!(sm.state(), SessionState::Connecting);
    }

    #[test]
    fn test_bad_code_during_identity_fails_locally() {
        let mut sm = machine();
        sm.handle(Event::EapolStart).unwrap();

        let actions = sm.handle(Event::Eap(EapPacket::success(0))).unwrap();
        assert_eq!(sm.state(), SessionState::Failure);
        assert_eq!(actions[0], Action::SendEap(EapPacket::failure(0)));
        assert_eq!(actions[1], Action::Notify(Outcome::Failure));
    }

    #[test]
    fn test_eap_at_idle_restarts() {
        let mut sm = machine();
        let actions = sm
            .handle(Event::Eap(EapPacket::identity_response(0, "user")))
            .unwrap();
        assert_eq!(sm.state(), SessionState::Connecting);
        assert_eq!(actions[0], Action::SendEap(EapPacket::identity_request(0)));
    }

    #[test]
    fn test_port_down_and_up() {
        let (mut sm, _) = authenticating(2);
        sm.handle(reply(2, Code::AccessAccept)).unwrap();

        let actions = sm.handle(Event::PortDown).unwrap();
        assert_eq!(actions, vec![Action::Notify(Outcome::Logoff)]);
        assert_eq!(sm.state(), SessionState::Idle);
        assert!(!sm.port_enabled());

        assert_eq!(
            sm.handle(Event::EapolStart).unwrap_err(),
            SequenceError::PortDisabled
        );

        let actions = sm.handle(Event::PortUp).unwrap();
        assert_eq!(sm.state(), SessionState::Connecting);
        assert_eq!(actions[0], Action::SendEap(EapPacket::identity_request(0)));
    }

    #[test]
    fn test_port_down_mid_flow_is_silent() {
        let (mut sm, _) = authenticating(2);
        assert!(sm.handle(Event::PortDown).unwrap().is_empty());
        assert!(sm.handle(reply(2, Code::AccessAccept)).is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SessionState::Authenticating.is_terminal());
        assert!(SessionState::Success2.is_terminal());
        assert!(SessionState::Held.is_terminal());
        assert_eq!(SessionState::TimeoutFailure2.to_string(), "timeout_failure2");
    }

    fn hex_bytes(s: &str) -> Vec<u8> {
        let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }
}
