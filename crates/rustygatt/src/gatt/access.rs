//! Access control and value read/write protocol
//!
//! The engine-level [`AccessController::read`] and [`AccessController::write`]
//! only require that the attribute exists. Capability flags restrict what the
//! transport binding exposes; [`AccessController::require`] is the check the
//! binding applies before calling into the engine.

use std::borrow::Cow;
use std::sync::Arc;

use log::{debug, info};

use super::notify::NotificationHub;
use super::registry::AttributeRegistry;
use super::types::{Attribute, Capabilities, ObjectPath};
use super::value::AttributeValue;
use crate::bus::{Arg, Interface, ObjectBus, Property};
use crate::error::{GattError, GattResult};

/// External consumer of written values, called with `(bytes, length)` after
/// every successful write. It runs after the value is committed and cannot
/// undo the write.
pub type WriteSink = Arc<dyn Fn(&[u8], usize) + Send + Sync>;

/// Gate between requests and attribute values
pub struct AccessController {
    registry: Arc<AttributeRegistry>,
    hub: Arc<NotificationHub>,
    bus: Arc<dyn ObjectBus>,
    sink: Option<WriteSink>,
}

impl AccessController {
    pub fn new(
        registry: Arc<AttributeRegistry>,
        hub: Arc<NotificationHub>,
        bus: Arc<dyn ObjectBus>,
    ) -> Self {
        Self {
            registry,
            hub,
            bus,
            sink: None,
        }
    }

    /// Install the external write sink
    pub fn set_sink(&mut self, sink: WriteSink) {
        self.sink = Some(sink);
    }

    /// Copy of the current value of a characteristic or descriptor
    pub fn read(&self, path: &ObjectPath) -> GattResult<AttributeValue> {
        let (attribute, cell) = self.registry.value_entry(path)?;
        let value = cell.snapshot()?;

        debug!(
            "{}({}): read {} byte(s)",
            kind_name(&attribute),
            attribute.uuid(),
            value.len()
        );
        Ok(value)
    }

    /// Replace the value of a characteristic or descriptor.
    ///
    /// The new bytes are copied before the attribute is locked; the swap, and
    /// the publication to subscribers, happen under the attribute's exclusive
    /// lock. The sink and the property-changed emission follow.
    pub fn write(&self, path: &ObjectPath, bytes: &[u8]) -> GattResult<()> {
        let (attribute, cell) = self.registry.value_entry(path)?;
        let value = AttributeValue::copy_from(bytes)?;

        {
            let mut current = cell.write();
            *current = value;
            if let Attribute::Characteristic(chr) = &attribute {
                self.hub.publish_change(path, chr.uuid, current.as_bytes());
            }
        }

        info!(
            "{}({}): wrote {} byte(s) [{}]",
            kind_name(&attribute),
            attribute.uuid(),
            bytes.len(),
            hex::encode(bytes)
        );

        if let Some(sink) = &self.sink {
            sink(bytes, bytes.len());
        }
        self.bus
            .emit_property_changed(path, interface_of(&attribute), Property::Value.name());

        Ok(())
    }

    /// Exposure check: fail with `NotPermitted` unless `attribute` declares
    /// `capability`.
    pub fn require(attribute: &Attribute, capability: Capabilities) -> GattResult<()> {
        let allowed = attribute
            .flags()
            .is_some_and(|flags| flags.contains(capability));
        if allowed {
            Ok(())
        } else {
            Err(GattError::NotPermitted(format!(
                "{} does not allow {}",
                attribute.path(),
                capability_name(capability)
            )))
        }
    }

    /// Decode a value argument. Only byte arrays are accepted.
    pub fn parse_value(payload: &Arg) -> GattResult<Cow<'_, [u8]>> {
        match payload {
            Arg::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            Arg::Array(items) => items
                .iter()
                .map(|item| match item {
                    Arg::Byte(b) => Ok(*b),
                    _ => Err(GattError::invalid_args()),
                })
                .collect::<GattResult<Vec<u8>>>()
                .map(Cow::Owned),
            _ => {
                debug!("Value argument of type {} rejected", payload.signature());
                Err(GattError::invalid_args())
            }
        }
    }

    /// Extract the optional `device` entry of an option bag.
    ///
    /// Keys are matched case-insensitively and unknown keys are ignored. A
    /// `device` entry that is not an object path is rejected.
    pub fn parse_options(payload: &Arg) -> GattResult<Option<ObjectPath>> {
        let Arg::Dict(options) = payload else {
            debug!("Options argument of type {} rejected", payload.signature());
            return Err(GattError::invalid_args());
        };

        let mut device = None;
        for (key, value) in options {
            if key.eq_ignore_ascii_case("device") {
                match value {
                    Arg::ObjectPath(path) => {
                        debug!("Device: {}", path);
                        device = Some(path.clone());
                    }
                    _ => return Err(GattError::invalid_args()),
                }
            }
        }

        Ok(device)
    }
}

pub(crate) fn interface_of(attribute: &Attribute) -> Interface {
    match attribute {
        Attribute::Service(_) => Interface::Service,
        Attribute::Characteristic(_) => Interface::Characteristic,
        Attribute::Descriptor(_) => Interface::Descriptor,
    }
}

fn kind_name(attribute: &Attribute) -> &'static str {
    match attribute {
        Attribute::Service(_) => "Service",
        Attribute::Characteristic(_) => "Characteristic",
        Attribute::Descriptor(_) => "Descriptor",
    }
}

fn capability_name(capability: Capabilities) -> &'static str {
    if capability == Capabilities::READ {
        "read"
    } else if capability == Capabilities::WRITE {
        "write"
    } else if capability == Capabilities::NOTIFY {
        "notify"
    } else {
        "this operation"
    }
}
