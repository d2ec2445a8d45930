//! Transport binding
//!
//! The engine never talks to a concrete bus. It exports and withdraws
//! interfaces through [`ObjectBus`], announces value changes through the same
//! trait, and receives requests as [`Request`] values that
//! [`GattApplication::dispatch`](crate::gatt::GattApplication::dispatch)
//! matches explicitly.

pub mod args;
pub mod dispatch;
pub mod local;


use std::fmt;

use crate::error::BusError;
use crate::gatt::ObjectPath;

pub use self::args::Arg;
pub use self::dispatch::{Property, Reply, Request};
pub use self::local::{LocalBus, PropertyChanged};

/// Interface an attribute is exported under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Interface {
    Service,
    Characteristic,
    Descriptor,
}

impl Interface {
    pub fn name(&self) -> &'static str {
        match self {
            Interface::Service => "org.bluez.GattService1",
            Interface::Characteristic => "org.bluez.GattCharacteristic1",
            Interface::Descriptor => "org.bluez.GattDescriptor1",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Object export surface of the transport
pub trait ObjectBus: Send + Sync {
    /// Make `interface` reachable at `path`
    fn register_interface(&self, path: &ObjectPath, interface: Interface) -> Result<(), BusError>;

    /// Withdraw `interface` from `path`. Withdrawing something that is not
    /// exported is a no-op.
    fn unregister_interface(&self, path: &ObjectPath, interface: Interface);

    /// Announce that `property` of `interface` at `path` changed
    fn emit_property_changed(&self, path: &ObjectPath, interface: Interface, property: &str);
}
