//! EAP (Extensible Authentication Protocol) Support
//!
//! This module implements EAP protocol structures as defined in RFC 3748
//! and EAP over RADIUS as defined in RFC 3579. An authenticator relays EAP
//! methods it does not implement, so method type-data is kept as opaque
//! bytes and unknown method types survive a decode/encode cycle unchanged.
//!
//! # EAP Packet Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Code      |  Identifier   |            Length             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Type      |  Type-Data ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::attributes::{Attribute, RadiusAttribute};
use crate::packet::Packet;
use thiserror::Error;

/// EAP packet code (first byte of EAP packet)
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EapCode {
    /// Request packet (Code 1)
    Request = 1,
    /// Response packet (Code 2)
    Response = 2,
    /// Success packet (Code 3)
    Success = 3,
    /// Failure packet (Code 4)
    Failure = 4,
}

impl EapCode {
    /// Convert from u8 to EapCode
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(EapCode::Request),
            2 => Some(EapCode::Response),
            3 => Some(EapCode::Success),
            4 => Some(EapCode::Failure),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Request and Response carry a Type field, Success and Failure do not
    pub fn has_type(self) -> bool {
        matches!(self, EapCode::Request | EapCode::Response)
    }
}

/// EAP method types (RFC 3748 and IANA registry)
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EapType {
    /// Identity (Type 1) - RFC 3748
    Identity,
    /// Notification (Type 2) - RFC 3748
    Notification,
    /// Nak (Type 3) - RFC 3748
    Nak,
    /// MD5-Challenge (Type 4) - RFC 3748
    Md5Challenge,
    /// EAP-TLS (Type 13) - RFC 5216
    Tls,
    /// EAP-TTLS (Type 21) - RFC 5281
    Ttls,
    /// PEAP (Type 25)
    Peap,
    /// EAP-MSCHAPv2 (Type 26)
    MsChapV2,
    /// Any other method, relayed as-is
    Other(u8),
}

impl EapType {
    /// Convert from u8 to EapType
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => EapType::Identity,
            2 => EapType::Notification,
            3 => EapType::Nak,
            4 => EapType::Md5Challenge,
            13 => EapType::Tls,
            21 => EapType::Ttls,
            25 => EapType::Peap,
            26 => EapType::MsChapV2,
            other => EapType::Other(other),
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        match self {
            EapType::Identity => 1,
            EapType::Notification => 2,
            EapType::Nak => 3,
            EapType::Md5Challenge => 4,
            EapType::Tls => 13,
            EapType::Ttls => 21,
            EapType::Peap => 25,
            EapType::MsChapV2 => 26,
            EapType::Other(value) => value,
        }
    }
}

/// EAP packet structure
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapPacket {
    /// EAP code (Request, Response, Success, Failure)
    pub code: EapCode,
    /// Identifier for matching requests and responses (0-255)
    pub identifier: u8,
    /// EAP type (only present for Request/Response)
    pub eap_type: Option<EapType>,
    /// Type-specific data
    pub data: Vec<u8>,
}

impl EapPacket {
    /// Size of the Code, Identifier and Length fields
    pub const HEADER_LENGTH: usize = 4;

    /// Create a new EAP packet
    pub fn new(code: EapCode, identifier: u8, eap_type: Option<EapType>, data: Vec<u8>) -> Self {
        EapPacket {
            code,
            identifier,
            eap_type,
            data,
        }
    }

    /// Create an EAP Identity Request with an empty prompt
    pub fn identity_request(identifier: u8) -> Self {
        EapPacket {
            code: EapCode::Request,
            identifier,
            eap_type: Some(EapType::Identity),
            data: Vec::new(),
        }
    }

    /// Create an EAP Identity Response
    pub fn identity_response(identifier: u8, identity: &str) -> Self {
        EapPacket {
            code: EapCode::Response,
            identifier,
            eap_type: Some(EapType::Identity),
            data: identity.as_bytes().to_vec(),
        }
    }

    /// Create an EAP Success packet
    pub fn success(identifier: u8) -> Self {
        EapPacket {
            code: EapCode::Success,
            identifier,
            eap_type: None,
            data: Vec::new(),
        }
    }

    /// Create an EAP Failure packet
    pub fn failure(identifier: u8) -> Self {
        EapPacket {
            code: EapCode::Failure,
            identifier,
            eap_type: None,
            data: Vec::new(),
        }
    }

    /// The identity carried by an Identity Response, decoded lossily
    ///
    /// RFC 3748 allows the identity to be followed by a NUL and
    /// implementation-specific options; only the part before it is returned.
    pub fn identity(&self) -> Option<String> {
        if self.code != EapCode::Response || self.eap_type != Some(EapType::Identity) {
            return None;
        }
        let end = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len());
        Some(String::from_utf8_lossy(&self.data[..end]).into_owned())
    }

    /// Parse EAP packet from bytes
    ///
    /// Bytes beyond the declared Length are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EapError> {
        if bytes.len() < Self::HEADER_LENGTH {
            return Err(EapError::PacketTooShort {
                expected: Self::HEADER_LENGTH,
                actual: bytes.len(),
            });
        }

        let code = EapCode::from_u8(bytes[0]).ok_or(EapError::InvalidCode(bytes[0]))?;
        let identifier = bytes[1];
        let length = Self::declared_length(bytes)?;

        if length < Self::HEADER_LENGTH {
            return Err(EapError::InvalidLength(length));
        }
        if bytes.len() < length {
            return Err(EapError::PacketTooShort {
                expected: length,
                actual: bytes.len(),
            });
        }

        let (eap_type, data) = if code.has_type() {
            if length < Self::HEADER_LENGTH + 1 {
                return Err(EapError::InvalidLength(length));
            }
            (
                Some(EapType::from_u8(bytes[4])),
                bytes[Self::HEADER_LENGTH + 1..length].to_vec(),
            )
        } else {
            (None, Vec::new())
        };

        Ok(EapPacket {
            code,
            identifier,
            eap_type,
            data,
        })
    }

    /// The Length field of an encoded EAP packet
    pub fn declared_length(bytes: &[u8]) -> Result<usize, EapError> {
        match bytes.get(2..4) {
            Some(len) => Ok(u16::from_be_bytes([len[0], len[1]]) as usize),
            None => Err(EapError::PacketTooShort {
                expected: Self::HEADER_LENGTH,
                actual: bytes.len(),
            }),
        }
    }

    /// Encode EAP packet to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let length = self.length();
        let mut bytes = Vec::with_capacity(length);

        bytes.push(self.code.as_u8());
        bytes.push(self.identifier);
        bytes.extend_from_slice(&(length as u16).to_be_bytes());

        if self.code.has_type() {
            if let Some(eap_type) = self.eap_type {
                bytes.push(eap_type.as_u8());
                bytes.extend_from_slice(&self.data);
            }
        }

        bytes
    }

    /// Get the total length of the packet
    pub fn length(&self) -> usize {
        match (self.code.has_type(), self.eap_type) {
            (true, Some(_)) => Self::HEADER_LENGTH + 1 + self.data.len(),
            _ => Self::HEADER_LENGTH,
        }
    }
}

/// EAP-related errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EapError {
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("Invalid EAP code: {0}")]
    InvalidCode(u8),

    #[error("Invalid packet length: {0}")]
    InvalidLength(usize),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Convert an EAP packet to RADIUS EAP-Message attributes (RFC 3579 Section 3.1)
///
/// If the EAP packet is larger than 253 bytes, it is split across multiple
/// EAP-Message attributes.
///
/// # Example
/// ```
/// use dot1x_proto::eap::{EapPacket, eap_to_radius_attributes};
///
/// let eap = EapPacket::identity_response(1, "user");
/// let attributes = eap_to_radius_attributes(&eap).unwrap();
/// assert_eq!(attributes.len(), 1);
/// assert_eq!(attributes[0].attr_type, 79); // EAP-Message
/// ```
pub fn eap_to_radius_attributes(eap_packet: &EapPacket) -> Result<Vec<Attribute>, EapError> {
    RadiusAttribute::EapMessage(eap_packet.to_bytes())
        .into_attributes()
        .map_err(|e| {
            EapError::EncodingError(format!("Failed to create EAP-Message attribute: {}", e))
        })
}

/// Extract the EAP packet from a RADIUS packet
///
/// All EAP-Message attributes are concatenated in order before decoding.
/// Returns `None` if the packet carries no EAP-Message.
pub fn eap_from_radius_packet(radius_packet: &Packet) -> Result<Option<EapPacket>, EapError> {
    match radius_packet.eap_message() {
        Some(bytes) => EapPacket::from_bytes(&bytes).map(Some),
        None => Ok(None),
    }
}

/// Add an EAP packet to a RADIUS packet as EAP-Message attribute(s)
pub fn add_eap_to_radius_packet(
    radius_packet: &mut Packet,
    eap_packet: &EapPacket,
) -> Result<(), EapError> {
    for attr in eap_to_radius_attributes(eap_packet)? {
        radius_packet.add_attribute(attr);
    }
    Ok(())
}
