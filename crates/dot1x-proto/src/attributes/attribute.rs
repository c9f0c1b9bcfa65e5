use super::AttributeType;
use crate::mac::MacAddress;
use crate::packet::PacketError;
use std::io::{Cursor, Read, Write};

/// RADIUS Attribute structure as defined in RFC 2865 Section 5
///
/// ```text
///  0                   1                   2
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Type      |    Length     |  Value ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute type (1 byte)
    pub attr_type: u8,
    /// Attribute value (0-253 bytes)
    pub value: Vec<u8>,
}

impl Attribute {
    /// Minimum attribute length (type + length fields = 2 bytes)
    pub const MIN_LENGTH: usize = 2;
    /// Maximum attribute length (255 bytes including type and length)
    pub const MAX_LENGTH: usize = 255;
    /// Maximum value length (253 bytes)
    pub const MAX_VALUE_LENGTH: usize = 253;

    pub fn new(attr_type: u8, value: Vec<u8>) -> Result<Self, PacketError> {
        if value.len() > Self::MAX_VALUE_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "Attribute value too long: {} bytes (max {})",
                value.len(),
                Self::MAX_VALUE_LENGTH
            )));
        }
        Ok(Attribute { attr_type, value })
    }

    /// Create a string attribute
    pub fn string(attr_type: u8, value: impl Into<String>) -> Result<Self, PacketError> {
        Self::new(attr_type, value.into().into_bytes())
    }

    /// Create an integer attribute (32-bit big-endian)
    pub fn integer(attr_type: u8, value: u32) -> Result<Self, PacketError> {
        Self::new(attr_type, value.to_be_bytes().to_vec())
    }

    /// Encode attribute to bytes
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let length = self.encoded_length();
        if length > Self::MAX_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "Encoded attribute too long: {} bytes",
                length
            )));
        }

        let mut buffer = Vec::with_capacity(length);
        buffer.write_all(&[self.attr_type])?;
        buffer.write_all(&[length as u8])?;
        buffer.write_all(&self.value)?;

        Ok(buffer)
    }

    /// Decode attribute from bytes
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < Self::MIN_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "Attribute data too short: {} bytes",
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);

        let mut header = [0u8; 2];
        cursor.read_exact(&mut header)?;
        let attr_type = header[0];
        let length = header[1] as usize;

        if length < Self::MIN_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "Invalid attribute length: {}",
                length
            )));
        }

        if data.len() < length {
            return Err(PacketError::AttributeError(format!(
                "Insufficient data for attribute: expected {}, got {}",
                length,
                data.len()
            )));
        }

        let mut value = vec![0u8; length - Self::MIN_LENGTH];
        cursor.read_exact(&mut value)?;

        Ok(Attribute { attr_type, value })
    }

    /// Get the encoded length of this attribute
    pub fn encoded_length(&self) -> usize {
        Self::MIN_LENGTH + self.value.len()
    }

    /// Try to interpret value as a string
    pub fn as_string(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.value.clone())
    }

    /// Try to interpret value as an integer (32-bit big-endian)
    pub fn as_integer(&self) -> Result<u32, PacketError> {
        if self.value.len() != 4 {
            return Err(PacketError::AttributeError(format!(
                "Expected 4 bytes for integer, got {}",
                self.value.len()
            )));
        }
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.value);
        Ok(u32::from_be_bytes(bytes))
    }
}

/// Typed view of the attributes an authenticator reads or writes
///
/// `EapMessage` holds the whole EAP packet; it is split into 253-byte
/// fragments by [`RadiusAttribute::into_attributes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadiusAttribute {
    UserName(String),
    State(Vec<u8>),
    CalledStationId(String),
    CallingStationId(MacAddress),
    NasPortType(u32),
    EapMessage(Vec<u8>),
    MessageAuthenticator([u8; 16]),
    Other(Attribute),
}

impl RadiusAttribute {
    pub fn attr_type(&self) -> u8 {
        match self {
            RadiusAttribute::UserName(_) => AttributeType::UserName as u8,
            RadiusAttribute::State(_) => AttributeType::State as u8,
            RadiusAttribute::CalledStationId(_) => AttributeType::CalledStationId as u8,
            RadiusAttribute::CallingStationId(_) => AttributeType::CallingStationId as u8,
            RadiusAttribute::NasPortType(_) => AttributeType::NasPortType as u8,
            RadiusAttribute::EapMessage(_) => AttributeType::EapMessage as u8,
            RadiusAttribute::MessageAuthenticator(_) => AttributeType::MessageAuthenticator as u8,
            RadiusAttribute::Other(attr) => attr.attr_type,
        }
    }

    /// Convert into one or more wire attributes
    pub fn into_attributes(self) -> Result<Vec<Attribute>, PacketError> {
        let attr_type = self.attr_type();
        match self {
            RadiusAttribute::UserName(name) | RadiusAttribute::CalledStationId(name) => {
                Ok(vec![Attribute::string(attr_type, name)?])
            }
            RadiusAttribute::State(state) => Ok(vec![Attribute::new(attr_type, state)?]),
            RadiusAttribute::CallingStationId(mac) => {
                Ok(vec![Attribute::string(attr_type, mac.to_string())?])
            }
            RadiusAttribute::NasPortType(value) => Ok(vec![Attribute::integer(attr_type, value)?]),
            RadiusAttribute::EapMessage(eap) => {
                if eap.is_empty() {
                    return Ok(vec![Attribute::new(attr_type, Vec::new())?]);
                }
                eap.chunks(Attribute::MAX_VALUE_LENGTH)
                    .map(|chunk| Attribute::new(attr_type, chunk.to_vec()))
                    .collect()
            }
            RadiusAttribute::MessageAuthenticator(mac) => {
                Ok(vec![Attribute::new(attr_type, mac.to_vec())?])
            }
            RadiusAttribute::Other(attr) => Ok(vec![attr]),
        }
    }

    /// Interpret a single wire attribute
    ///
    /// Malformed values (a non-UTF-8 User-Name, a short NAS-Port-Type)
    /// fall back to `Other` so nothing is lost.
    pub fn from_attribute(attr: &Attribute) -> Self {
        let typed = match AttributeType::from_u8(attr.attr_type) {
            Some(AttributeType::UserName) => attr.as_string().ok().map(RadiusAttribute::UserName),
            Some(AttributeType::State) => Some(RadiusAttribute::State(attr.value.clone())),
            Some(AttributeType::CalledStationId) => {
                attr.as_string().ok().map(RadiusAttribute::CalledStationId)
            }
            Some(AttributeType::CallingStationId) => attr
                .as_string()
                .ok()
                .and_then(|s| s.parse().ok())
                .map(RadiusAttribute::CallingStationId),
            Some(AttributeType::NasPortType) => {
                attr.as_integer().ok().map(RadiusAttribute::NasPortType)
            }
            Some(AttributeType::EapMessage) => Some(RadiusAttribute::EapMessage(attr.value.clone())),
            Some(AttributeType::MessageAuthenticator) => <[u8; 16]>::try_from(attr.value.as_slice())
                .ok()
                .map(RadiusAttribute::MessageAuthenticator),
            _ => None,
        };
        typed.unwrap_or_else(|| RadiusAttribute::Other(attr.clone()))
    }
}
