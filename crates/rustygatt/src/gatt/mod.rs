//! GATT attribute server
//!
//! Services, characteristics and descriptors are kept in an
//! [`AttributeRegistry`]. Reads and writes go through the
//! [`AccessController`], and value changes on characteristics fan out to
//! subscribers through the [`NotificationHub`]. [`GattApplication`] wires the
//! three together and serves transport requests.

pub mod access;
pub mod notify;
pub mod registry;
pub mod server;
pub mod types;
pub mod value;

#[cfg(test)]
mod tests;

pub use access::{AccessController, WriteSink};
pub use notify::{NotificationHub, NotifyState, Subscription, SubscriptionId, ValueChanged};
pub use registry::AttributeRegistry;
pub use server::{GattApplication, ManagedObject};
pub use types::{
    Attribute, Capabilities, Characteristic, Descriptor, DescriptorSpec, Flags, ObjectPath,
    Service,
};
pub use value::AttributeValue;
