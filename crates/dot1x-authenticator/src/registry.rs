//! Session registry and RADIUS packet-id correlation
//!
//! Sessions are created on first contact and kept for the life of the
//! process. Every Access-Request takes the next packet id from a wrapping
//! counter; the id indexes a 256-slot table holding the owning MAC and the
//! Request Authenticator needed to verify the reply. Reusing an id replaces
//! its slot, so a reply to the earlier request no longer verifies.

use crate::machine::{MachineSettings, SessionState, StateMachine};
use dot1x_proto::MacAddress;
use std::collections::{BTreeMap, HashMap};

/// Wrapping 8-bit RADIUS identifier counter, first id 0
#[derive(Debug, Default, Clone)]
pub struct RadiusIdAllocator {
    last: Option<u8>,
}

impl RadiusIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u8 {
        let id = self.last.map_or(0, |id| id.wrapping_add(1));
        self.last = Some(id);
        id
    }
}

/// Owner of an outstanding Access-Request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correlation {
    pub mac: MacAddress,
    pub request_authenticator: [u8; 16],
}

/// Snapshot of registry contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub sessions: usize,
    pub by_state: BTreeMap<SessionState, usize>,
    pub outstanding_correlations: usize,
}

pub struct SessionRegistry {
    sessions: HashMap<MacAddress, StateMachine>,
    ports: HashMap<MacAddress, bool>,
    correlations: Vec<Option<Correlation>>,
    ids: RadiusIdAllocator,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: HashMap::new(),
            ports: HashMap::new(),
            correlations: vec![None; 256],
            ids: RadiusIdAllocator::new(),
        }
    }

    /// Session for `mac`, created on first use
    ///
    /// A new session starts enabled unless its port has been disabled.
    pub fn get_or_create(
        &mut self,
        mac: MacAddress,
        port: MacAddress,
        settings: MachineSettings,
    ) -> &mut StateMachine {
        let port_enabled = self.port_enabled(port);
        self.sessions.entry(mac).or_insert_with(|| {
            let mut session = StateMachine::new(mac, port, settings);
            session.set_port_enabled(port_enabled);
            session
        })
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&StateMachine> {
        self.sessions.get(mac)
    }

    pub fn get_mut(&mut self, mac: &MacAddress) -> Option<&mut StateMachine> {
        self.sessions.get_mut(mac)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Allocate a packet id for `mac` and remember its Request Authenticator
    pub fn correlate(&mut self, mac: MacAddress, request_authenticator: [u8; 16]) -> u8 {
        let id = self.ids.next_id();
        self.correlations[id as usize] = Some(Correlation {
            mac,
            request_authenticator,
        });
        id
    }

    /// Request Authenticator of the outstanding request with this id
    pub fn request_authenticator(&self, id: u8) -> Option<[u8; 16]> {
        self.correlations[id as usize].map(|c| c.request_authenticator)
    }

    /// Session that owns the outstanding request with this id
    pub fn resolve_by_radius_id(&mut self, id: u8) -> Option<&mut StateMachine> {
        let mac = self.correlations[id as usize]?.mac;
        self.sessions.get_mut(&mac)
    }

    pub fn correlation(&self, id: u8) -> Option<Correlation> {
        self.correlations[id as usize]
    }

    pub fn remove_correlation(&mut self, id: u8) -> Option<Correlation> {
        self.correlations[id as usize].take()
    }

    pub fn set_port_enabled(&mut self, port: MacAddress, enabled: bool) {
        self.ports.insert(port, enabled);
    }

    /// Ports are enabled unless configured or signalled otherwise
    pub fn port_enabled(&self, port: MacAddress) -> bool {
        self.ports.get(&port).copied().unwrap_or(true)
    }

    /// MACs of the sessions last seen on `port`, sorted
    pub fn sessions_on_port(&self, port: MacAddress) -> Vec<MacAddress> {
        let mut macs: Vec<MacAddress> = self
            .sessions
            .values()
            .filter(|s| s.port() == port)
            .map(|s| s.mac())
            .collect();
        macs.sort();
        macs
    }

    pub fn stats(&self) -> RegistryStats {
        let mut by_state = BTreeMap::new();
        for session in self.sessions.values() {
            *by_state.entry(session.state()).or_insert(0) += 1;
        }
        RegistryStats {
            sessions: self.sessions.len(),
            by_state,
            outstanding_correlations: self.correlations.iter().filter(|c| c.is_some()).count(),
        }
    }
}
