//! RADIUS Response Validation
//!
//! Structural checks applied to Access-Accept, Access-Reject and
//! Access-Challenge packets once their Response Authenticator has been
//! verified.
//!
//! ## Validation Modes
//!
//! - **Strict Mode** (default): RFC 3579 Section 3.3 compliance:
//!   - Message-Authenticator is required on any packet carrying EAP-Message
//!   - At most one Message-Authenticator
//!   - Type-specific value lengths (integers, State)
//!
//! - **Lenient Mode**: for servers that omit Message-Authenticator:
//!   - A Message-Authenticator is still verified when present
//!   - Type-specific value lengths

use crate::attributes::{Attribute, AttributeType};
use crate::packet::Packet;

/// Validation mode for RADIUS responses
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Lenient validation - only enforces what is needed to parse safely.
    Lenient,
    /// Strict validation - enforces RFC 3579 Message-Authenticator rules.
    #[default]
    Strict,
}

/// Validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
    pub attribute_type: Option<u8>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError {
            message: message.into(),
            attribute_type: None,
        }
    }

    pub fn with_attribute(message: impl Into<String>, attr_type: u8) -> Self {
        ValidationError {
            message: message.into(),
            attribute_type: Some(attr_type),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(attr_type) = self.attribute_type {
            write!(f, "Attribute {}: {}", attr_type, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a decoded RADIUS response
pub fn validate_response(packet: &Packet, mode: ValidationMode) -> Result<(), ValidationError> {
    let message_auth_type = AttributeType::MessageAuthenticator as u8;
    let message_auths = packet.find_all_attributes(message_auth_type).len();
    let has_eap = packet
        .find_attribute(AttributeType::EapMessage as u8)
        .is_some();

    if mode == ValidationMode::Strict {
        if message_auths > 1 {
            return Err(ValidationError::with_attribute(
                "Multiple Message-Authenticator attributes",
                message_auth_type,
            ));
        }
        if has_eap && message_auths == 0 {
            return Err(ValidationError::with_attribute(
                "Message-Authenticator is required with EAP-Message",
                message_auth_type,
            ));
        }
    }

    for attr in &packet.attributes {
        validate_attribute(attr, mode)?;
    }

    Ok(())
}

fn validate_attribute(attr: &Attribute, mode: ValidationMode) -> Result<(), ValidationError> {
    match AttributeType::from_u8(attr.attr_type) {
        Some(AttributeType::MessageAuthenticator) => {
            if attr.value.len() != 16 {
                return Err(ValidationError::with_attribute(
                    format!("Expected 16 bytes, got {}", attr.value.len()),
                    attr.attr_type,
                ));
            }
        }
        Some(AttributeType::SessionTimeout) | Some(AttributeType::NasPortType) => {
            validate_integer_attribute(attr)?;
        }
        Some(AttributeType::State) | Some(AttributeType::EapMessage)
            if mode == ValidationMode::Strict && attr.value.is_empty() =>
        {
            return Err(ValidationError::with_attribute(
                "Empty value",
                attr.attr_type,
            ));
        }
        _ => {}
    }
    Ok(())
}

fn validate_integer_attribute(attr: &Attribute) -> Result<(), ValidationError> {
    if attr.value.len() != 4 {
        return Err(ValidationError::with_attribute(
            format!(
                "Integer attribute must be 4 bytes, got {}",
                attr.value.len()
            ),
            attr.attr_type,
        ));
    }
    Ok(())
}
