//! Requests a transport hands to the engine, and their replies

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{Arg, Interface};
use crate::error::GattError;
use crate::gatt::{Subscription, SubscriptionId};

/// One incoming operation on an exported attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `ReadValue(options)`
    ReadValue { options: Arg },
    /// `WriteValue(value, options)`
    WriteValue { value: Arg, options: Arg },
    StartNotify,
    /// Ends the subscription returned by an earlier `StartNotify`
    StopNotify { subscription: SubscriptionId },
    /// Property `Get`
    GetProperty(String),
    /// Property `Set`
    SetProperty(String, Arg),
    /// Property `GetAll`
    GetAll,
}

impl Request {
    /// Method or property-call name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Request::ReadValue { .. } => "ReadValue",
            Request::WriteValue { .. } => "WriteValue",
            Request::StartNotify => "StartNotify",
            Request::StopNotify { .. } => "StopNotify",
            Request::GetProperty(_) => "Get",
            Request::SetProperty(_, _) => "Set",
            Request::GetAll => "GetAll",
        }
    }
}

/// Result of a successfully dispatched [`Request`]
#[derive(Debug)]
pub enum Reply {
    /// Method return without arguments
    Empty,
    /// A single returned element
    Value(Arg),
    /// Property map
    Properties(BTreeMap<String, Arg>),
    /// Live subscription created by `StartNotify`
    Subscribed(Subscription),
}

impl Reply {
    /// The returned element, if any
    pub fn into_value(self) -> Option<Arg> {
        match self {
            Reply::Value(arg) => Some(arg),
            _ => None,
        }
    }
}

/// Properties exported by the GATT interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Property {
    Uuid,
    Primary,
    Includes,
    Service,
    Characteristic,
    Value,
    Flags,
}

const SERVICE_PROPERTIES: &[Property] = &[Property::Uuid, Property::Primary, Property::Includes];
const CHARACTERISTIC_PROPERTIES: &[Property] = &[
    Property::Uuid,
    Property::Service,
    Property::Value,
    Property::Flags,
];
const DESCRIPTOR_PROPERTIES: &[Property] = &[
    Property::Uuid,
    Property::Characteristic,
    Property::Value,
    Property::Flags,
];

impl Property {
    pub fn name(&self) -> &'static str {
        match self {
            Property::Uuid => "UUID",
            Property::Primary => "Primary",
            Property::Includes => "Includes",
            Property::Service => "Service",
            Property::Characteristic => "Characteristic",
            Property::Value => "Value",
            Property::Flags => "Flags",
        }
    }

    /// Properties of `interface`, in table order
    pub fn of(interface: Interface) -> &'static [Property] {
        match interface {
            Interface::Service => SERVICE_PROPERTIES,
            Interface::Characteristic => CHARACTERISTIC_PROPERTIES,
            Interface::Descriptor => DESCRIPTOR_PROPERTIES,
        }
    }

    /// Only `Value` accepts `Set`
    pub fn is_writable(&self) -> bool {
        matches!(self, Property::Value)
    }
}

impl FromStr for Property {
    type Err = GattError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "UUID" => Ok(Property::Uuid),
            "Primary" => Ok(Property::Primary),
            "Includes" => Ok(Property::Includes),
            "Service" => Ok(Property::Service),
            "Characteristic" => Ok(Property::Characteristic),
            "Value" => Ok(Property::Value),
            "Flags" => Ok(Property::Flags),
            _ => Err(GattError::InvalidArguments(format!(
                "No such property '{}'",
                name
            ))),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
