//! Static service definitions
//!
//! A profile is a table of characteristics registered as one unit through
//! [`GattApplication::register_profile`](crate::gatt::GattApplication::register_profile).

pub mod heart_rate;

/// A descriptor created together with its characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorDefinition {
    pub uuid: &'static str,
    pub flags: &'static [&'static str],
}

/// One characteristic of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicDefinition {
    /// Human-readable name, for logging
    pub name: &'static str,
    pub uuid: &'static str,
    /// Initial value
    pub value: &'static [u8],
    pub flags: &'static [&'static str],
    pub descriptor: Option<DescriptorDefinition>,
}

/// A primary service and its characteristics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub name: &'static str,
    pub uuid: &'static str,
    pub characteristics: &'static [CharacteristicDefinition],
}
