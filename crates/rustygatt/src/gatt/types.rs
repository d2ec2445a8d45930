//! Attribute data model
//!
//! Services own characteristics and characteristics own descriptors. Those
//! ownership links point downward by path; the upward links (a descriptor's
//! characteristic, a characteristic's service) are paths too, resolved
//! through the registry. Values are not part of these types: they live in
//! the registry and are only reachable through the access controller.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::GattError;
use crate::uuid::Uuid;

/// Stable identifier of an attribute, e.g. `/service1/characteristic2`
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// The root path `/`
    pub fn root() -> Self {
        ObjectPath("/".into())
    }

    /// Append one path element. `element` must be a valid element name.
    pub(crate) fn join(&self, element: &str) -> Self {
        if self.0 == "/" {
            ObjectPath(format!("/{}", element))
        } else {
            ObjectPath(format!("{}/{}", self.0, element))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `self` is `other` or lies below it
    pub fn starts_with(&self, other: &ObjectPath) -> bool {
        self.0 == other.0
            || other.0 == "/"
            || (self.0.starts_with(&other.0) && self.0[other.0.len()..].starts_with('/'))
    }
}

impl FromStr for ObjectPath {
    type Err = GattError;

    /// Object paths are `/` or a sequence of `/element` where each element is
    /// non-empty and made of `[A-Za-z0-9_]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GattError::InvalidArguments(format!("Invalid object path {:?}", s));

        if s == "/" {
            return Ok(ObjectPath::root());
        }
        let rest = s.strip_prefix('/').ok_or_else(invalid)?;
        let valid = rest.split('/').all(|element| {
            !element.is_empty()
                && element
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        });
        if !valid {
            return Err(invalid());
        }

        Ok(ObjectPath(s.to_owned()))
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPath({})", self.0)
    }
}

bitflags! {
    /// Capabilities the access controller understands
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const READ = 0x01;
        const WRITE = 0x02;
        const NOTIFY = 0x04;
    }
}

impl Capabilities {
    /// Capabilities meaningful on a characteristic
    pub const CHARACTERISTIC: Capabilities = Capabilities::all();
    /// Capabilities meaningful on a descriptor
    pub const DESCRIPTOR: Capabilities = Capabilities::READ.union(Capabilities::WRITE);

    fn from_flag_name(name: &str) -> Capabilities {
        match name {
            "read" => Capabilities::READ,
            "write" => Capabilities::WRITE,
            "notify" => Capabilities::NOTIFY,
            _ => Capabilities::empty(),
        }
    }
}

/// Declared flag strings of an attribute.
///
/// The strings are kept verbatim, in declaration order, and exposed as the
/// `Flags` property. Only names from the attribute's vocabulary become
/// [`Capabilities`]; anything else is carried along uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flags {
    names: Vec<String>,
    capabilities: Capabilities,
}

impl Flags {
    fn with_vocabulary<I, S>(names: I, vocabulary: Capabilities) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let capabilities = names
            .iter()
            .fold(Capabilities::empty(), |caps, name| {
                caps | Capabilities::from_flag_name(name)
            })
            & vocabulary;

        Self {
            names,
            capabilities,
        }
    }

    /// Flags of a characteristic: `read`, `write` and `notify` are understood
    pub fn characteristic<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_vocabulary(names, Capabilities::CHARACTERISTIC)
    }

    /// Flags of a descriptor: `read` and `write` are understood
    pub fn descriptor<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_vocabulary(names, Capabilities::DESCRIPTOR)
    }

    pub fn contains(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Declared names, verbatim
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Root attribute of one tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub uuid: Uuid,
    pub path: ObjectPath,
    pub primary: bool,
    /// Owned characteristics, in registration order
    pub characteristics: Vec<ObjectPath>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub path: ObjectPath,
    /// Owning service
    pub service: ObjectPath,
    pub flags: Flags,
    /// Owned descriptors, in registration order
    pub descriptors: Vec<ObjectPath>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub path: ObjectPath,
    /// Owning characteristic
    pub characteristic: ObjectPath,
    pub flags: Flags,
}

/// Any attribute held by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Service(Service),
    Characteristic(Characteristic),
    Descriptor(Descriptor),
}

impl Attribute {
    pub fn path(&self) -> &ObjectPath {
        match self {
            Attribute::Service(s) => &s.path,
            Attribute::Characteristic(c) => &c.path,
            Attribute::Descriptor(d) => &d.path,
        }
    }

    pub fn uuid(&self) -> &Uuid {
        match self {
            Attribute::Service(s) => &s.uuid,
            Attribute::Characteristic(c) => &c.uuid,
            Attribute::Descriptor(d) => &d.uuid,
        }
    }

    /// Capability flags, `None` for services which carry no value
    pub fn flags(&self) -> Option<&Flags> {
        match self {
            Attribute::Service(_) => None,
            Attribute::Characteristic(c) => Some(&c.flags),
            Attribute::Descriptor(d) => Some(&d.flags),
        }
    }
}

/// Optional descriptor created together with a characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSpec {
    pub uuid: String,
    pub flags: Vec<String>,
    pub value: Vec<u8>,
}

impl DescriptorSpec {
    /// A descriptor with an empty initial value
    pub fn new<I, S>(uuid: impl Into<String>, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uuid: uuid.into(),
            flags: flags.into_iter().map(Into::into).collect(),
            value: Vec::new(),
        }
    }
}
