use crate::packet::{Packet, PacketError};
use rand::Rng;

/// Generate a random Request Authenticator (16 bytes) per RFC 2865 Section 3
pub fn generate_request_authenticator() -> [u8; 16] {
    let mut rng = rand::rng();
    let mut authenticator = [0u8; 16];
    rng.fill(&mut authenticator);
    authenticator
}

/// Calculate Response Authenticator per RFC 2865 Section 3
///
/// Response Authenticator = MD5(Code + ID + Length + Request Authenticator + Attributes + Secret)
///
/// This is used for Access-Accept, Access-Reject, and Access-Challenge packets.
pub fn calculate_response_authenticator(
    packet: &Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> Result<[u8; 16], PacketError> {
    let encoded = packet.encode()?;
    Ok(response_authenticator_for_bytes(
        &encoded,
        request_authenticator,
        secret,
    ))
}

/// Response Authenticator over an already encoded packet
///
/// `packet_bytes` must hold at least the 20-byte header; only the first
/// `Length` bytes take part in the hash.
pub fn response_authenticator_for_bytes(
    packet_bytes: &[u8],
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> [u8; 16] {
    let length = u16::from_be_bytes([packet_bytes[2], packet_bytes[3]]) as usize;
    let end = length.min(packet_bytes.len());

    let mut context = md5::Context::new();
    context.consume(&packet_bytes[..4]);
    context.consume(request_authenticator);
    context.consume(&packet_bytes[Packet::MIN_PACKET_SIZE.min(end)..end]);
    context.consume(secret);
    context.compute().0
}

/// Verify the Response Authenticator of a received packet
pub fn verify_response_authenticator(
    packet_bytes: &[u8],
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> bool {
    if packet_bytes.len() < Packet::MIN_PACKET_SIZE {
        return false;
    }
    let calculated = response_authenticator_for_bytes(packet_bytes, request_authenticator, secret);
    packet_bytes[4..20] == calculated
}
