mod attribute;
mod types;

pub use attribute::{Attribute, RadiusAttribute};
pub use types::{nas_port_type, AttributeType};
