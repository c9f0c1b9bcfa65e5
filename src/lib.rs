//! IEEE 802.1X port authenticator
//!
//! Facade over the workspace crates:
//!
//! - [`proto`] - EAPOL and RADIUS wire codecs (`dot1x-proto`)
//! - [`authenticator`] - per-supplicant state machines and the service runtime
//!   (`dot1x-authenticator`)

pub use dot1x_authenticator as authenticator;
pub use dot1x_proto as proto;
