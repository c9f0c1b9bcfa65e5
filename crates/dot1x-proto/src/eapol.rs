//! EAP over LAN (IEEE 802.1X-2010 Section 11)
//!
//! ```text
//! +----------------+----------------+-------------+
//! | Destination(6) |   Source (6)   | [802.1Q (4)]|
//! +----------------+----------------+-------------+
//! | EtherType 888E | Version | Type | Body Length |
//! +----------------+---------+------+-------------+
//! | Body ...
//! +---------------
//! ```
//!
//! Captured frames may carry NIC padding after the body; it is ignored.

use crate::eap::{EapError, EapPacket};
use crate::mac::MacAddress;
use thiserror::Error;

/// EtherType for Port Access Entity frames
pub const ETH_P_PAE: u16 = 0x888e;
/// 802.1Q Tag Protocol Identifier
pub const ETH_P_8021Q: u16 = 0x8100;

/// Version written into outbound frames (802.1X-2004)
pub const EAPOL_VERSION: u8 = 2;

const ETHERNET_HEADER_LENGTH: usize = 14;
const VLAN_TAG_LENGTH: usize = 4;
const EAPOL_HEADER_LENGTH: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EapolError {
    #[error("Frame too short: {0} bytes")]
    TooShort(usize),
    #[error("Not an EAPOL frame: ethertype {0:#06x}")]
    NotEapol(u16),
    #[error("Unsupported EAPOL version: {0}")]
    UnsupportedVersion(u8),
    #[error("Unsupported EAPOL packet type: {0}")]
    UnsupportedType(u8),
    #[error("EAPOL body length {declared} exceeds captured {available} bytes")]
    BodyLength { declared: usize, available: usize },
    #[error("EAP length {eap} disagrees with EAPOL body length {eapol}")]
    EapLengthMismatch { eapol: usize, eap: usize },
    #[error("EAP error: {0}")]
    Eap(#[from] EapError),
}

/// EAPOL packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EapolType {
    Eap = 0,
    Start = 1,
    Logoff = 2,
    Key = 3,
    EncapsulatedAsfAlert = 4,
}

impl EapolType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EapolType::Eap),
            1 => Some(EapolType::Start),
            2 => Some(EapolType::Logoff),
            3 => Some(EapolType::Key),
            4 => Some(EapolType::EncapsulatedAsfAlert),
            _ => None,
        }
    }
}

/// 802.1Q tag control information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    /// Priority Code Point (3 bits)
    pub pcp: u8,
    /// Drop Eligible Indicator (1 bit)
    pub dei: bool,
    /// VLAN Identifier (12 bits)
    pub vid: u16,
}

impl VlanTag {
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        let tci = u16::from_be_bytes(bytes);
        VlanTag {
            pcp: (tci >> 13) as u8,
            dei: tci & 0x1000 != 0,
            vid: tci & 0x0fff,
        }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        let tci = ((self.pcp as u16 & 0x7) << 13) | ((self.dei as u16) << 12) | (self.vid & 0x0fff);
        tci.to_be_bytes()
    }
}

/// Body of an EAPOL frame the authenticator acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EapolBody {
    Eap(EapPacket),
    Start,
    Logoff,
}

impl EapolBody {
    fn packet_type(&self) -> EapolType {
        match self {
            EapolBody::Eap(_) => EapolType::Eap,
            EapolBody::Start => EapolType::Start,
            EapolBody::Logoff => EapolType::Logoff,
        }
    }
}

/// A decoded EAPOL frame with its link-layer addressing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapolFrame {
    pub dst: MacAddress,
    pub src: MacAddress,
    pub vlan: Option<VlanTag>,
    pub version: u8,
    pub body: EapolBody,
}

impl EapolFrame {
    /// Build an outbound frame carrying an EAP packet
    pub fn eap(dst: MacAddress, src: MacAddress, packet: EapPacket) -> Self {
        EapolFrame {
            dst,
            src,
            vlan: None,
            version: EAPOL_VERSION,
            body: EapolBody::Eap(packet),
        }
    }

    pub fn parse(buffer: &[u8]) -> Result<Self, EapolError> {
        if buffer.len() < ETHERNET_HEADER_LENGTH {
            return Err(EapolError::TooShort(buffer.len()));
        }

        let dst = MacAddress::from_slice(&buffer[0..6]).ok_or(EapolError::TooShort(buffer.len()))?;
        let src =
            MacAddress::from_slice(&buffer[6..12]).ok_or(EapolError::TooShort(buffer.len()))?;

        let mut offset = 12;
        let mut ethertype = u16::from_be_bytes([buffer[offset], buffer[offset + 1]]);
        let mut vlan = None;
        if ethertype == ETH_P_8021Q {
            if buffer.len() < ETHERNET_HEADER_LENGTH + VLAN_TAG_LENGTH {
                return Err(EapolError::TooShort(buffer.len()));
            }
            vlan = Some(VlanTag::from_bytes([buffer[14], buffer[15]]));
            offset += VLAN_TAG_LENGTH;
            ethertype = u16::from_be_bytes([buffer[offset], buffer[offset + 1]]);
        }
        if ethertype != ETH_P_PAE {
            return Err(EapolError::NotEapol(ethertype));
        }
        offset += 2;

        let header = buffer
            .get(offset..offset + EAPOL_HEADER_LENGTH)
            .ok_or(EapolError::TooShort(buffer.len()))?;
        let version = header[0];
        if !(1..=3).contains(&version) {
            return Err(EapolError::UnsupportedVersion(version));
        }
        let packet_type = header[1];
        let body_length = u16::from_be_bytes([header[2], header[3]]) as usize;
        offset += EAPOL_HEADER_LENGTH;

        let available = buffer.len() - offset;
        if body_length > available {
            return Err(EapolError::BodyLength {
                declared: body_length,
                available,
            });
        }
        let body_bytes = &buffer[offset..offset + body_length];

        let body = match EapolType::from_u8(packet_type) {
            Some(EapolType::Eap) => {
                let eap_length = EapPacket::declared_length(body_bytes)?;
                if eap_length != body_length {
                    return Err(EapolError::EapLengthMismatch {
                        eapol: body_length,
                        eap: eap_length,
                    });
                }
                EapolBody::Eap(EapPacket::from_bytes(body_bytes)?)
            }
            Some(EapolType::Start) => EapolBody::Start,
            Some(EapolType::Logoff) => EapolBody::Logoff,
            _ => return Err(EapolError::UnsupportedType(packet_type)),
        };

        Ok(EapolFrame {
            dst,
            src,
            vlan,
            version,
            body,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let body = match &self.body {
            EapolBody::Eap(packet) => packet.to_bytes(),
            EapolBody::Start | EapolBody::Logoff => Vec::new(),
        };

        let mut buffer = Vec::with_capacity(
            ETHERNET_HEADER_LENGTH + VLAN_TAG_LENGTH + EAPOL_HEADER_LENGTH + body.len(),
        );
        buffer.extend_from_slice(&self.dst.0);
        buffer.extend_from_slice(&self.src.0);
        if let Some(tag) = self.vlan {
            buffer.extend_from_slice(&ETH_P_8021Q.to_be_bytes());
            buffer.extend_from_slice(&tag.to_bytes());
        }
        buffer.extend_from_slice(&ETH_P_PAE.to_be_bytes());
        buffer.push(self.version);
        buffer.push(self.body.packet_type() as u8);
        buffer.extend_from_slice(&(body.len() as u16).to_be_bytes());
        buffer.extend_from_slice(&body);
        buffer
    }
}
