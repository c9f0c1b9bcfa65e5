//! End-to-end authentication scenarios driven through the engine
//!
//! The RADIUS server is simulated by signing replies with the shared
//! secret; the supplicant by hand-built EAPOL frames. Time is explicit.

mod common;

use common::*;
use dot1x::authenticator::{AuthEvent, MachineSettings, SessionState};
use dot1x::proto::{Code, EapCode, EapPacket, MacAddress};
use std::time::{Duration, Instant};

/// Start, Identity and the first Access-Request for `mac`
fn begin(
    engine: &mut dot1x::authenticator::Authenticator,
    mac: MacAddress,
    now: Instant,
) -> Vec<u8> {
    let out = engine.handle_eapol(&start(mac), now);
    assert_eq!(eap_out(&out), vec![(mac, EapPacket::identity_request(0))]);
    single_request(&engine.handle_eapol(&identity(mac, 0, "user"), now))
}

#[test]
fn scenario_a_md5_success() {
    let (mut engine, handler) = engine(MachineSettings::default());
    let now = Instant::now();

    let first = begin(&mut engine, SUPPLICANT, now);
    let request = parse(&first);
    assert_eq!(request.code, Code::AccessRequest);
    assert_eq!(request.find_attribute(1).unwrap().as_string().unwrap(), "user");
    assert_eq!(
        request.find_attribute(31).unwrap().as_string().unwrap(),
        "02:42:ac:17:00:6f"
    );
    assert_eq!(
        request.eap_message().unwrap(),
        EapPacket::identity_response(0, "user").to_bytes()
    );
    assert!(request.state().is_none());

    let md5 = md5_challenge(0x75);
    let out = engine.handle_radius(&challenge(&first, &md5, b"server-state"), now);
    assert_eq!(eap_out(&out), vec![(SUPPLICANT, md5)]);

    // the MD5 response frame as captured from a real supplicant
    let response = hex(&format!("{}{}", HEADER, MD5_RESPONSE));
    let second = single_request(&engine.handle_eapol(&response, now));
    let request = parse(&second);
    assert_ne!(second[1], first[1]);
    assert_eq!(request.state(), Some(&b"server-state"[..]));
    assert_eq!(request.eap_message().unwrap(), hex(&MD5_RESPONSE[8..]));

    let out = engine.handle_radius(&accept(&second, 0x75), now);
    assert_eq!(eap_out(&out), vec![(SUPPLICANT, EapPacket::success(0x75))]);
    assert_eq!(engine.session_state(SUPPLICANT), Some(SessionState::Success2));
    assert_eq!(
        handler.events(),
        vec![AuthEvent::Success {
            mac: SUPPLICANT,
            port: PORT
        }]
    );

    // a retransmitted Accept changes nothing
    assert!(engine.handle_radius(&accept(&second, 0x75), now).is_empty());
    assert_eq!(handler.events().len(), 1);
}

#[test]
fn scenario_b_logoff_before_accept() {
    let (mut engine, handler) = engine(MachineSettings::default());
    let now = Instant::now();

    let first = begin(&mut engine, SUPPLICANT, now);
    engine.handle_radius(&challenge(&first, &md5_challenge(0x75), b"s"), now);
    let second = single_request(&engine.handle_eapol(&md5_response(SUPPLICANT, 0x75), now));

    let out = engine.handle_eapol(&logoff(SUPPLICANT), now);
    assert!(out.is_empty());
    assert_eq!(engine.session_state(SUPPLICANT), Some(SessionState::Logoff2));

    let late = engine.handle_radius(&accept(&second, 0x75), now);
    assert!(late.is_empty());
    assert_eq!(engine.session_state(SUPPLICANT), Some(SessionState::Logoff2));
    assert_eq!(
        handler.events(),
        vec![AuthEvent::Logoff {
            mac: SUPPLICANT,
            port: PORT
        }]
    );
}

#[test]
fn scenario_c_radius_silence() {
    let settings = MachineSettings {
        retries: 3,
        timeout: Duration::from_secs(5),
        held_period: Duration::from_secs(60),
    };
    let (mut engine, handler) = engine(settings);
    let t0 = Instant::now();

    let first = begin(&mut engine, SUPPLICANT, t0);
    let mut ids = vec![first[1]];

    for attempt in 1..=3u64 {
        let out = engine.fire_timers(t0 + Duration::from_secs(5 * attempt));
        let retry = single_request(&out);
        assert_eq!(parse(&retry).eap_message(), parse(&first).eap_message());
        ids.push(retry[1]);
    }
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(
        engine.session_state(SUPPLICANT),
        Some(SessionState::Authenticating)
    );

    let out = engine.fire_timers(t0 + Duration::from_secs(20));
    assert!(out.is_empty(), "timeout failure is silent on the wire");
    assert_eq!(
        engine.session_state(SUPPLICANT),
        Some(SessionState::TimeoutFailure2)
    );

    // nothing else is due until the hold period ends
    assert!(engine.fire_timers(t0 + Duration::from_secs(40)).is_empty());
    assert_eq!(
        handler.events(),
        vec![AuthEvent::Failure {
            mac: SUPPLICANT,
            port: PORT
        }]
    );
}

#[test]
fn scenario_c_identity_silence() {
    let (mut engine, handler) = engine(fast_settings());
    let t0 = Instant::now();
    engine.handle_eapol(&start(SUPPLICANT), t0);

    for attempt in 1..=2u32 {
        let out = engine.fire_timers(t0 + fast_settings().timeout * attempt);
        assert_eq!(eap_out(&out), vec![(SUPPLICANT, EapPacket::identity_request(0))]);
    }
    engine.fire_timers(t0 + fast_settings().timeout * 3);

    assert_eq!(
        engine.session_state(SUPPLICANT),
        Some(SessionState::TimeoutFailure)
    );
    assert_eq!(handler.events().len(), 1);
}

#[test]
fn scenario_d_interleaved_supplicants() {
    let (mut engine, handler) = engine(MachineSettings::default());
    let now = Instant::now();
    let alice = MacAddress::new([0x02, 0, 0, 0, 0, 0xa1]);
    let bob = MacAddress::new([0x02, 0, 0, 0, 0, 0xb0]);

    engine.handle_eapol(&start(alice), now);
    engine.handle_eapol(&start(bob), now);
    let alice_req = single_request(&engine.handle_eapol(&identity(alice, 0, "alice"), now));
    let bob_req = single_request(&engine.handle_eapol(&identity(bob, 0, "bob"), now));
    assert_ne!(alice_req[1], bob_req[1]);

    // the server answers Bob first
    let out = engine.handle_radius(&challenge(&bob_req, &md5_challenge(0x20), b"bob-state"), now);
    assert_eq!(eap_out(&out)[0].0, bob);
    let out = engine.handle_radius(&challenge(&alice_req, &md5_challenge(0x10), b"alice-state"), now);
    assert_eq!(eap_out(&out)[0].0, alice);

    // Bob answering with Alice's identifier is discarded
    assert!(engine.handle_eapol(&md5_response(bob, 0x10), now).is_empty());

    let alice_req = single_request(&engine.handle_eapol(&md5_response(alice, 0x10), now));
    let bob_req = single_request(&engine.handle_eapol(&md5_response(bob, 0x20), now));
    assert_eq!(parse(&alice_req).state(), Some(&b"alice-state"[..]));
    assert_eq!(parse(&bob_req).state(), Some(&b"bob-state"[..]));
    assert_eq!(
        parse(&bob_req).find_attribute(1).unwrap().as_string().unwrap(),
        "bob"
    );

    // a reply signed for Alice's request but carrying Bob's id does not verify
    let mut crossed = accept(&alice_req, 0x10);
    crossed[1] = bob_req[1];
    assert!(engine.handle_radius(&crossed, now).is_empty());
    assert_eq!(engine.session_state(bob), Some(SessionState::Authenticating));

    let out = engine.handle_radius(&reject(&bob_req, 0x20), now);
    assert_eq!(eap_out(&out), vec![(bob, EapPacket::failure(0x20))]);
    let out = engine.handle_radius(&accept(&alice_req, 0x10), now);
    assert_eq!(eap_out(&out), vec![(alice, EapPacket::success(0x10))]);

    assert_eq!(engine.session_state(alice), Some(SessionState::Success2));
    assert_eq!(engine.session_state(bob), Some(SessionState::Failure2));
    assert_eq!(
        handler.events_for(alice),
        vec![AuthEvent::Success { mac: alice, port: PORT }]
    );
    assert_eq!(
        handler.events_for(bob),
        vec![AuthEvent::Failure { mac: bob, port: PORT }]
    );
}

#[test]
fn radius_id_wraparound_rejects_stale_reply() {
    let (mut engine, handler) = engine(MachineSettings::default());
    let now = Instant::now();

    let victim = MacAddress::new([0x02, 0xff, 0, 0, 0, 0]);
    let old = begin(&mut engine, victim, now);
    assert_eq!(old[1], 0);
    let stale = accept(&old, 0);

    for i in 1..=255u16 {
        let mac = MacAddress::new([0x02, 0, 0, 0, (i >> 8) as u8, i as u8]);
        let request = begin(&mut engine, mac, now);
        assert_eq!(request[1] as u16, i);
    }

    let newcomer = MacAddress::new([0x02, 0xee, 0, 0, 0, 0]);
    let fresh = begin(&mut engine, newcomer, now);
    assert_eq!(fresh[1], 0, "the 257th Access-Request reuses id 0");

    assert!(engine.handle_radius(&stale, now).is_empty());
    assert_eq!(
        engine.session_state(newcomer),
        Some(SessionState::Authenticating)
    );
    assert_eq!(
        engine.session_state(victim),
        Some(SessionState::Authenticating)
    );
    assert!(handler.events().is_empty());

    engine.handle_radius(&accept(&fresh, 0), now);
    assert_eq!(engine.session_state(newcomer), Some(SessionState::Success2));
    assert_eq!(
        handler.events(),
        vec![AuthEvent::Success {
            mac: newcomer,
            port: PORT
        }]
    );
}

#[test]
fn mismatched_identifier_leaves_state_unchanged() {
    let (mut engine, _) = engine(MachineSettings::default());
    let now = Instant::now();
    engine.handle_eapol(&start(SUPPLICANT), now);

    for id in 1..=255u8 {
        assert!(engine
            .handle_eapol(&identity(SUPPLICANT, id, "user"), now)
            .is_empty());
        assert_eq!(
            engine.session_state(SUPPLICANT),
            Some(SessionState::Connecting)
        );
    }
    assert_eq!(
        radius_out(&engine.handle_eapol(&identity(SUPPLICANT, 0, "user"), now)).len(),
        1
    );
}

#[test]
fn reject_then_quarantine_then_retry() {
    let (mut engine, handler) = engine(MachineSettings::default());
    let t0 = Instant::now();

    let request = begin(&mut engine, SUPPLICANT, t0);
    engine.handle_radius(&reject(&request, 0), t0);
    assert_eq!(engine.session_state(SUPPLICANT), Some(SessionState::Failure2));

    assert!(engine.handle_eapol(&start(SUPPLICANT), t0).is_empty());
    assert_eq!(engine.session_state(SUPPLICANT), Some(SessionState::Held));

    let out = engine.fire_timers(t0 + Duration::from_secs(60));
    assert_eq!(
        eap_out(&out),
        vec![(SUPPLICANT, EapPacket::identity_request(0))]
    );
    assert_eq!(
        engine.session_state(SUPPLICANT),
        Some(SessionState::Connecting)
    );
    assert_eq!(handler.events().len(), 1);
}

#[test]
fn large_eap_payload_is_fragmented_and_reassembled() {
    let (mut engine, _) = engine(MachineSettings::default());
    let now = Instant::now();
    let first = begin(&mut engine, SUPPLICANT, now);

    let big = EapPacket::new(EapCode::Request, 0x42, Some(dot1x::proto::EapType::Tls), vec![0x5c; 700]);
    let out = engine.handle_radius(&challenge(&first, &big, b"tls"), now);
    assert_eq!(eap_out(&out), vec![(SUPPLICANT, big.clone())]);

    let response = EapPacket::new(EapCode::Response, 0x42, Some(dot1x::proto::EapType::Tls), vec![0xc5; 600]);
    let request = single_request(&engine.handle_eapol(&eap(SUPPLICANT, response.clone()), now));
    let packet = parse(&request);
    assert_eq!(packet.find_all_attributes(79).len(), 3);
    assert_eq!(packet.eap_message().unwrap(), response.to_bytes());
}
