//! IEEE 802 MAC addresses

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 48-bit MAC address
///
/// Displayed in lowercase colon notation, which is also the form written
/// into Calling-Station-Id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Port Access Entity group address (IEEE 802.1X-2010 Table 11-1)
    pub const PAE_GROUP: MacAddress = MacAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x03]);
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Read a MAC address from the first six bytes of `data`
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = data.get(..6)?.try_into().ok()?;
        Some(MacAddress(octets))
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseMacError {
    #[error("invalid MAC address length")]
    Length,
    #[error("invalid MAC address format")]
    Format,
    #[error("invalid hex digit in MAC address")]
    Hex,
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    /// Accepts `00:11:22:33:44:55`, `00-11-22-33-44-55` and `001122334455`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = if s.contains(':') {
            s.split(':').collect()
        } else if s.contains('-') {
            s.split('-').collect()
        } else if s.len() == 12 && s.is_ascii() {
            (0..6).map(|i| &s[i * 2..i * 2 + 2]).collect()
        } else {
            return Err(ParseMacError::Format);
        };

        if parts.len() != 6 {
            return Err(ParseMacError::Length);
        }

        let mut octets = [0u8; 6];
        for (octet, part) in octets.iter_mut().zip(parts) {
            if part.len() != 2 {
                return Err(ParseMacError::Format);
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| ParseMacError::Hex)?;
        }

        Ok(MacAddress(octets))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for MacAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for MacAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
