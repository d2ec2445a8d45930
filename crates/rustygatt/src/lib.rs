//! RustyGatt - A GATT attribute server engine
//!
//! This library keeps the services, characteristics and descriptors of a
//! Bluetooth LE GATT server application, serves reads and writes on their
//! values, and delivers value-changed events to subscribers. Attributes are
//! exported through a transport-agnostic [`bus::ObjectBus`]; requests arrive
//! as [`bus::Request`] values and are served by [`GattApplication::dispatch`].

pub mod bus;
pub mod config;
pub mod error;
pub mod gatt;
pub mod profiles;
pub mod uuid;

// Re-export common types for convenience
pub use bus::{Arg, Interface, LocalBus, ObjectBus, Reply, Request};
pub use config::{ServerConfig, StopNotifyPolicy};
pub use error::{BusError, ErrorKind, GattError, GattResult};
pub use gatt::{
    AccessController, Attribute, AttributeRegistry, AttributeValue, Characteristic, Descriptor,
    DescriptorSpec, GattApplication, NotificationHub, ObjectPath, Service, Subscription,
    ValueChanged,
};
pub use uuid::Uuid;
