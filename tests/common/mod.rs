//! Shared helpers: a scripted supplicant and a fake RADIUS server
#![allow(dead_code)]

use dot1x::authenticator::{
    Authenticator, AuthenticatorSettings, MachineSettings, Outbound, RecordingEventHandler,
};
use dot1x::proto::{
    decode_eapol, encode_response, Code, EapCode, EapPacket, EapType, EapolBody, EapolFrame,
    MacAddress, Packet, RadiusAttribute,
};
use std::sync::Arc;
use std::time::Duration;

pub const SECRET: &[u8] = b"SECRET";

/// Supplicant and port addresses from a captured wired exchange
pub const SUPPLICANT: MacAddress = MacAddress([0x02, 0x42, 0xac, 0x17, 0x00, 0x6f]);
pub const PORT: MacAddress = MacAddress([0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);

/// Ethernet header of frames from SUPPLICANT to PORT
pub const HEADER: &str = "0000000000010242ac17006f888e";
pub const MD5_RESPONSE: &str = "010000160275001604103abcadc86714b2d75d09dd7ff53edf6b";

pub fn hex(s: &str) -> Vec<u8> {
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

pub fn settings(machine: MachineSettings) -> AuthenticatorSettings {
    AuthenticatorSettings {
        secret: SECRET.to_vec(),
        machine,
        interface_mac: MacAddress::new([0x44; 6]),
        ..Default::default()
    }
}

pub fn engine(machine: MachineSettings) -> (Authenticator, Arc<RecordingEventHandler>) {
    let handler = Arc::new(RecordingEventHandler::new());
    (Authenticator::new(settings(machine), handler.clone()), handler)
}

fn frame(mac: MacAddress, body: EapolBody) -> Vec<u8> {
    EapolFrame {
        dst: PORT,
        src: mac,
        vlan: None,
        version: 1,
        body,
    }
    .to_bytes()
}

pub fn start(mac: MacAddress) -> Vec<u8> {
    frame(mac, EapolBody::Start)
}

pub fn logoff(mac: MacAddress) -> Vec<u8> {
    frame(mac, EapolBody::Logoff)
}

pub fn eap(mac: MacAddress, packet: EapPacket) -> Vec<u8> {
    frame(mac, EapolBody::Eap(packet))
}

pub fn identity(mac: MacAddress, id: u8, name: &str) -> Vec<u8> {
    eap(mac, EapPacket::identity_response(id, name))
}

pub fn md5_response(mac: MacAddress, id: u8) -> Vec<u8> {
    eap(
        mac,
        EapPacket::new(EapCode::Response, id, Some(EapType::Md5Challenge), {
            let mut data = vec![16];
            data.extend_from_slice(&[0x3a; 16]);
            data
        }),
    )
}

pub fn md5_challenge(id: u8) -> EapPacket {
    let mut data = vec![16];
    data.extend_from_slice(&hex("1a16a3baa37a0238f33384f6c1106742"));
    EapPacket::new(EapCode::Request, id, Some(EapType::Md5Challenge), data)
}

/// Signed reply to an encoded Access-Request
pub fn reply(request: &[u8], code: Code, attributes: Vec<RadiusAttribute>) -> Vec<u8> {
    let request_authenticator: [u8; 16] = request[4..20].try_into().unwrap();
    encode_response(code, request[1], &request_authenticator, attributes, SECRET).unwrap()
}

pub fn challenge(request: &[u8], eap: &EapPacket, state: &[u8]) -> Vec<u8> {
    reply(
        request,
        Code::AccessChallenge,
        vec![
            RadiusAttribute::EapMessage(eap.to_bytes()),
            RadiusAttribute::State(state.to_vec()),
        ],
    )
}

pub fn accept(request: &[u8], eap_id: u8) -> Vec<u8> {
    reply(
        request,
        Code::AccessAccept,
        vec![RadiusAttribute::EapMessage(
            EapPacket::success(eap_id).to_bytes(),
        )],
    )
}

pub fn reject(request: &[u8], eap_id: u8) -> Vec<u8> {
    reply(
        request,
        Code::AccessReject,
        vec![RadiusAttribute::EapMessage(
            EapPacket::failure(eap_id).to_bytes(),
        )],
    )
}

pub fn radius_out(out: &[Outbound]) -> Vec<Vec<u8>> {
    out.iter()
        .filter_map(|o| match o {
            Outbound::Radius(bytes) => Some(bytes.clone()),
            _ => None,
        })
        .collect()
}

pub fn single_request(out: &[Outbound]) -> Vec<u8> {
    let mut requests = radius_out(out);
    assert_eq!(requests.len(), 1, "expected one Access-Request in {:?}", out);
    requests.remove(0)
}

/// EAP packets sent to supplicants, with their destination
pub fn eap_out(out: &[Outbound]) -> Vec<(MacAddress, EapPacket)> {
    out.iter()
        .filter_map(|o| match o {
            Outbound::Eapol(bytes) => {
                let frame = decode_eapol(bytes).unwrap();
                match frame.body {
                    EapolBody::Eap(packet) => Some((frame.dst, packet)),
                    _ => None,
                }
            }
            _ => None,
        })
        .collect()
}

pub fn parse(request: &[u8]) -> Packet {
    Packet::decode(request).unwrap()
}

pub fn fast_settings() -> MachineSettings {
    MachineSettings {
        retries: 2,
        timeout: Duration::from_millis(100),
        held_period: Duration::from_secs(60),
    }
}
