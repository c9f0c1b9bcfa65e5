//! Message-Authenticator Support (RFC 3579 Section 3.2)
//!
//! Message-Authenticator provides integrity protection for RADIUS packets
//! carrying EAP using HMAC-MD5.
//!
//! - Computed as HMAC-MD5(shared_secret, packet)
//! - Always 16 bytes (128 bits)
//! - Required on every packet carrying EAP-Message
//!
//! The value is computed over the entire RADIUS packet with the
//! Message-Authenticator field set to all zeros. For Access-Request the
//! header holds the Request Authenticator; for responses the Request
//! Authenticator of the matching request is substituted into the header.

use crate::attributes::{Attribute, AttributeType};
use crate::packet::Packet;
use hmac::{Hmac, Mac};
use md5_digest::Md5;

type HmacMd5 = Hmac<Md5>;

/// Length of the Message-Authenticator value
pub const MESSAGE_AUTHENTICATOR_LENGTH: usize = 16;

/// Calculate Message-Authenticator for a RADIUS packet
///
/// `packet_bytes` must already have the Message-Authenticator value zeroed.
pub fn calculate_message_authenticator(packet_bytes: &[u8], secret: &[u8]) -> [u8; 16] {
    let mut mac = HmacMd5::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(packet_bytes);
    let bytes = mac.finalize().into_bytes();

    let mut output = [0u8; 16];
    output.copy_from_slice(&bytes);
    output
}

/// Byte offsets of every Message-Authenticator value in an encoded packet
///
/// Walks the raw attribute list up to the declared packet length. Returns
/// `None` if the attribute list is structurally broken.
pub fn find_message_authenticators(packet_bytes: &[u8]) -> Option<Vec<usize>> {
    let length = Packet::declared_length(packet_bytes).ok()?;
    let mut offsets = Vec::new();
    let mut pos = Packet::MIN_PACKET_SIZE;

    while pos < length {
        let attr_len = *packet_bytes.get(pos + 1)? as usize;
        if attr_len < Attribute::MIN_LENGTH || pos + attr_len > length {
            return None;
        }
        if packet_bytes[pos] == AttributeType::MessageAuthenticator as u8 {
            if attr_len != Attribute::MIN_LENGTH + MESSAGE_AUTHENTICATOR_LENGTH {
                return None;
            }
            offsets.push(pos + Attribute::MIN_LENGTH);
        }
        pos += attr_len;
    }

    Some(offsets)
}

/// Fill in the Message-Authenticator of an encoded packet in place
///
/// The value at `message_auth_offset` must be zeroed before the call.
pub fn write_message_authenticator(
    packet_bytes: &mut [u8],
    secret: &[u8],
    message_auth_offset: usize,
) {
    let auth = calculate_message_authenticator(packet_bytes, secret);
    packet_bytes[message_auth_offset..message_auth_offset + MESSAGE_AUTHENTICATOR_LENGTH]
        .copy_from_slice(&auth);
}

/// Verify Message-Authenticator in a RADIUS packet
///
/// `message_auth_offset` is the byte offset where the value starts (after
/// type and length).
pub fn verify_message_authenticator(
    packet_bytes: &[u8],
    secret: &[u8],
    message_auth_offset: usize,
) -> bool {
    if message_auth_offset + MESSAGE_AUTHENTICATOR_LENGTH > packet_bytes.len() {
        return false;
    }

    let received = &packet_bytes
        [message_auth_offset..message_auth_offset + MESSAGE_AUTHENTICATOR_LENGTH];

    let mut packet_copy = packet_bytes.to_vec();
    packet_copy[message_auth_offset..message_auth_offset + MESSAGE_AUTHENTICATOR_LENGTH].fill(0);

    received == calculate_message_authenticator(&packet_copy, secret)
}

/// Verify the Message-Authenticator of a response packet
///
/// The header authenticator is replaced with the Request Authenticator
/// of the matching request before hashing. Trailing padding is excluded.
pub fn verify_response_message_authenticator(
    packet_bytes: &[u8],
    request_authenticator: &[u8; 16],
    secret: &[u8],
    message_auth_offset: usize,
) -> bool {
    let Ok(length) = Packet::declared_length(packet_bytes) else {
        return false;
    };
    let mut packet_copy = packet_bytes[..length].to_vec();
    packet_copy[4..20].copy_from_slice(request_authenticator);
    verify_message_authenticator(&packet_copy, secret, message_auth_offset)
}
