//! Wire codecs for the two sides of the authenticator
//!
//! EAPOL frames towards supplicants and RADIUS packets towards the
//! authentication server. Everything here is a pure transform: request
//! authenticators are supplied by the caller and correlation state is
//! reached through the `lookup` closure passed to [`decode_radius`].

use crate::attributes::{Attribute, AttributeType, RadiusAttribute};
use crate::auth::{response_authenticator_for_bytes, verify_response_authenticator};
use crate::eap::{EapError, EapPacket};
use crate::eapol::{EapolError, EapolFrame};
use crate::mac::MacAddress;
use crate::message_auth::{
    find_message_authenticators, write_message_authenticator, verify_response_message_authenticator,
    MESSAGE_AUTHENTICATOR_LENGTH,
};
use crate::packet::{Code, Packet, PacketError};
use crate::validation::{validate_response, ValidationMode};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Malformed frame or packet
    #[error("format error: {0}")]
    Format(String),
    /// RADIUS integrity check failed or the reply matches no request
    #[error("authentication error: {0}")]
    Authentication(String),
}

impl From<PacketError> for CodecError {
    fn from(e: PacketError) -> Self {
        CodecError::Format(e.to_string())
    }
}

impl From<EapError> for CodecError {
    fn from(e: EapError) -> Self {
        CodecError::Format(e.to_string())
    }
}

impl From<EapolError> for CodecError {
    fn from(e: EapolError) -> Self {
        CodecError::Format(e.to_string())
    }
}

/// Everything needed to build one Access-Request
#[derive(Debug, Clone)]
pub struct AccessRequest<'a> {
    /// Complete EAP packet from the supplicant
    pub eap_message: &'a [u8],
    /// Supplicant MAC, sent as Calling-Station-Id
    pub supplicant: MacAddress,
    pub username: Option<&'a str>,
    pub identifier: u8,
    pub request_authenticator: [u8; 16],
    /// State from the previous Access-Challenge, echoed verbatim
    pub state: Option<&'a [u8]>,
    /// Written after Calling-Station-Id, e.g. Called-Station-Id and NAS-Port-Type
    pub extra_attributes: &'a [RadiusAttribute],
}

/// Decode an EAPOL frame captured from the wire
pub fn decode_eapol(bytes: &[u8]) -> Result<EapolFrame, CodecError> {
    Ok(EapolFrame::parse(bytes)?)
}

/// Encode an EAP packet as a complete EAPOL frame
pub fn encode_eapol(packet: &EapPacket, src: MacAddress, dst: MacAddress) -> Vec<u8> {
    EapolFrame::eap(dst, src, packet.clone()).to_bytes()
}

/// Encode an Access-Request carrying an EAP-Message
///
/// Attribute order is User-Name, Calling-Station-Id, the extra attributes,
/// EAP-Message fragments, State, and finally Message-Authenticator
/// (RFC 3579 Section 3.2).
pub fn encode_radius(request: &AccessRequest<'_>, secret: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut attributes = Vec::new();
    if let Some(username) = request.username {
        attributes.push(RadiusAttribute::UserName(username.to_string()));
    }
    attributes.push(RadiusAttribute::CallingStationId(request.supplicant));
    attributes.extend(request.extra_attributes.iter().cloned());
    attributes.push(RadiusAttribute::EapMessage(request.eap_message.to_vec()));
    if let Some(state) = request.state {
        attributes.push(RadiusAttribute::State(state.to_vec()));
    }
    attributes.push(RadiusAttribute::MessageAuthenticator(
        [0u8; MESSAGE_AUTHENTICATOR_LENGTH],
    ));

    let mut packet = Packet::new(
        Code::AccessRequest,
        request.identifier,
        request.request_authenticator,
    );
    for attribute in attributes {
        for attr in attribute.into_attributes()? {
            packet.add_attribute(attr);
        }
    }

    let mut bytes = packet.encode()?;
    let offset = bytes.len() - MESSAGE_AUTHENTICATOR_LENGTH;
    write_message_authenticator(&mut bytes, secret, offset);
    Ok(bytes)
}

/// Decode and authenticate a RADIUS response
///
/// `lookup` returns the Request Authenticator recorded for a packet id, or
/// `None` when no request with that id is outstanding.
pub fn decode_radius<F>(
    bytes: &[u8],
    secret: &[u8],
    lookup: F,
    mode: ValidationMode,
) -> Result<Packet, CodecError>
where
    F: FnOnce(u8) -> Option<[u8; 16]>,
{
    Packet::declared_length(bytes)?;

    let identifier = bytes[1];
    let request_authenticator = lookup(identifier).ok_or_else(|| {
        CodecError::Authentication(format!("no outstanding request with id {}", identifier))
    })?;

    if !verify_response_authenticator(bytes, &request_authenticator, secret) {
        return Err(CodecError::Authentication(format!(
            "response authenticator mismatch for id {}",
            identifier
        )));
    }

    let packet = Packet::decode(bytes)?;
    if !packet.code.is_access_response() {
        return Err(CodecError::Format(format!(
            "unexpected code {:?} in reply",
            packet.code
        )));
    }

    let offsets = find_message_authenticators(bytes)
        .ok_or_else(|| CodecError::Format("malformed Message-Authenticator".to_string()))?;

    validate_response(&packet, mode).map_err(|e| {
        if e.attribute_type == Some(AttributeType::MessageAuthenticator as u8) {
            CodecError::Authentication(e.to_string())
        } else {
            CodecError::Format(e.to_string())
        }
    })?;

    for offset in offsets {
        if !verify_response_message_authenticator(bytes, &request_authenticator, secret, offset) {
            return Err(CodecError::Authentication(format!(
                "Message-Authenticator mismatch for id {}",
                identifier
            )));
        }
    }

    Ok(packet)
}

/// Encode a signed Access-Accept, Access-Reject or Access-Challenge
///
/// A Message-Authenticator is appended whenever an EAP-Message is present.
/// This is the server side of the exchange and is used to drive the
/// authenticator without a real RADIUS server.
pub fn encode_response(
    code: Code,
    identifier: u8,
    request_authenticator: &[u8; 16],
    attributes: Vec<RadiusAttribute>,
    secret: &[u8],
) -> Result<Vec<u8>, CodecError> {
    let mut packet = Packet::new(code, identifier, *request_authenticator);
    let mut has_eap = false;
    for attribute in attributes {
        has_eap |= matches!(attribute, RadiusAttribute::EapMessage(_));
        for attr in attribute.into_attributes()? {
            packet.add_attribute(attr);
        }
    }
    if has_eap {
        packet.add_attribute(Attribute::new(
            AttributeType::MessageAuthenticator as u8,
            vec![0u8; MESSAGE_AUTHENTICATOR_LENGTH],
        )?);
    }

    let mut bytes = packet.encode()?;
    if has_eap {
        let offset = bytes.len() - MESSAGE_AUTHENTICATOR_LENGTH;
        write_message_authenticator(&mut bytes, secret, offset);
    }
    let response_authenticator =
        response_authenticator_for_bytes(&bytes, request_authenticator, secret);
    bytes[4..20].copy_from_slice(&response_authenticator);
    Ok(bytes)
}
