//! IEEE 802.1X Wire Protocols
//!
//! Codecs for the two conversations a port authenticator holds: EAP over LAN
//! with supplicants (IEEE 802.1X-2010) and RADIUS with the authentication
//! server (RFC 2865, RFC 3579).
//!
//! # Features
//!
//! - EAPOL frame decoding and encoding, with an optional 802.1Q tag
//! - EAP packets with opaque relay of unknown methods
//! - RADIUS packet and attribute encoding and decoding
//! - EAP-Message fragmentation and reassembly
//! - Request/Response Authenticator and Message-Authenticator (HMAC-MD5)
//!
//! # Example
//!
//! ```rust
//! use dot1x_proto::{encode_radius, AccessRequest, EapPacket, MacAddress, RadiusAttribute};
//! use dot1x_proto::auth::generate_request_authenticator;
//!
//! let eap = EapPacket::identity_response(1, "alice").to_bytes();
//! let extras = [RadiusAttribute::NasPortType(15)];
//! let request = AccessRequest {
//!     eap_message: &eap,
//!     supplicant: "02:42:ac:17:00:6f".parse::<MacAddress>().unwrap(),
//!     username: Some("alice"),
//!     identifier: 0,
//!     request_authenticator: generate_request_authenticator(),
//!     state: None,
//!     extra_attributes: &extras,
//! };
//!
//! let bytes = encode_radius(&request, b"secret").unwrap();
//! assert_eq!(bytes[0], 1); // Access-Request
//! ```

pub mod attributes;
pub mod auth;
pub mod codec;
pub mod eap;
pub mod eapol;
pub mod mac;
pub mod message_auth;
pub mod packet;
pub mod validation;

pub use attributes::{nas_port_type, Attribute, AttributeType, RadiusAttribute};
pub use auth::{
    calculate_response_authenticator, generate_request_authenticator,
    verify_response_authenticator,
};
pub use codec::{
    decode_eapol, decode_radius, encode_eapol, encode_radius, encode_response, AccessRequest,
    CodecError,
};
pub use eap::{eap_from_radius_packet, EapCode, EapError, EapPacket, EapType};
pub use eapol::{EapolBody, EapolError, EapolFrame, VlanTag};
pub use mac::{MacAddress, ParseMacError};
pub use message_auth::{calculate_message_authenticator, verify_message_authenticator};
pub use packet::{Code, Packet, PacketError};
pub use validation::{validate_response, ValidationError, ValidationMode};
