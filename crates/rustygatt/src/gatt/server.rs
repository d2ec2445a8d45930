//! GATT application
//!
//! Ties the registry, the access controller and the notification hub
//! together and serves [`Request`]s arriving from the transport binding.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};

use super::access::{interface_of, AccessController, WriteSink};
use super::notify::{NotificationHub, Subscription, SubscriptionId};
use super::registry::AttributeRegistry;
use super::types::{Attribute, Capabilities, DescriptorSpec, ObjectPath};
use super::value::AttributeValue;
use crate::bus::{Arg, Interface, ObjectBus, Property, Reply, Request};
use crate::config::ServerConfig;
use crate::error::{ErrorKind, GattError, GattResult};
use crate::profiles::ServiceDefinition;

/// An exported object and its properties, as listed by
/// [`GattApplication::managed_objects`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedObject {
    pub interface: Interface,
    pub properties: BTreeMap<String, Arg>,
}

/// A GATT attribute server application
pub struct GattApplication {
    config: ServerConfig,
    registry: Arc<AttributeRegistry>,
    hub: Arc<NotificationHub>,
    access: AccessController,
}

impl GattApplication {
    /// Create an application exporting its attributes on `bus`
    pub fn new(config: ServerConfig, bus: Arc<dyn ObjectBus>) -> Self {
        let registry = Arc::new(AttributeRegistry::new(bus.clone()));
        let hub = Arc::new(NotificationHub::new(
            config.notification_queue_depth,
            config.stop_notify,
        ));
        let access = AccessController::new(registry.clone(), hub.clone(), bus);

        Self {
            config,
            registry,
            hub,
            access,
        }
    }

    /// Install the external sink that observes every written value
    pub fn with_sink(mut self, sink: WriteSink) -> Self {
        self.access.set_sink(sink);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    pub fn access(&self) -> &AccessController {
        &self.access
    }

    pub fn notifications(&self) -> &NotificationHub {
        &self.hub
    }

    pub fn register_service(&self, uuid: &str) -> GattResult<ObjectPath> {
        self.registry.register_service(uuid)
    }

    pub fn register_characteristic(
        &self,
        service: &ObjectPath,
        uuid: &str,
        initial_value: &[u8],
        flags: &[&str],
        descriptor: Option<&DescriptorSpec>,
    ) -> GattResult<ObjectPath> {
        self.registry
            .register_characteristic(service, uuid, initial_value, flags, descriptor)
    }

    /// Remove a service with everything it owns, releasing subscriptions on
    /// the removed characteristics
    pub fn unregister_service(&self, path: &ObjectPath) {
        for removed in self.registry.unregister_service(path) {
            self.hub.forget(&removed);
        }
    }

    pub fn unregister_characteristic(&self, path: &ObjectPath) {
        for removed in self.registry.unregister_characteristic(path) {
            self.hub.forget(&removed);
        }
    }

    /// Register a whole service from its definition.
    ///
    /// If any characteristic fails, the service is unregistered again and
    /// the error is returned.
    pub fn register_profile(&self, profile: &ServiceDefinition) -> GattResult<ObjectPath> {
        let service = self.registry.register_service(profile.uuid)?;

        for chr in profile.characteristics {
            let descriptor = chr
                .descriptor
                .as_ref()
                .map(|desc| DescriptorSpec::new(desc.uuid, desc.flags.iter().copied()));

            if let Err(e) = self.registry.register_characteristic(
                &service,
                chr.uuid,
                chr.value,
                chr.flags,
                descriptor.as_ref(),
            ) {
                warn!("Couldn't register {} characteristic: {}", chr.name, e);
                self.unregister_service(&service);
                return Err(e);
            }
        }

        info!("Registered service: {} ({})", service, profile.name);
        Ok(service)
    }

    /// Engine-level read; capability flags are not consulted
    pub fn read(&self, path: &ObjectPath) -> GattResult<AttributeValue> {
        self.access.read(path)
    }

    /// Engine-level write; capability flags are not consulted
    pub fn write(&self, path: &ObjectPath, value: &[u8]) -> GattResult<()> {
        self.access.write(path, value)
    }

    /// Subscribe to a characteristic. The returned subscription already holds
    /// one event carrying the current value.
    ///
    /// The subscriber is added while the registry is read-locked, so an
    /// unregistration either happens first and this fails with `NotFound`, or
    /// happens after and releases the new subscription too.
    pub fn start_notify(&self, path: &ObjectPath) -> GattResult<Subscription> {
        self.registry.with_value_entry(path, |attribute, cell| {
            let Attribute::Characteristic(chr) = attribute else {
                return Err(GattError::NotSupported(format!(
                    "{} does not support notifications",
                    path
                )));
            };

            let current = cell.read();
            self.hub.start_notify(chr, current.as_bytes())
        })
    }

    pub fn stop_notify(&self, path: &ObjectPath, subscription: SubscriptionId) -> GattResult<()> {
        match self.registry.attribute(path)? {
            Attribute::Characteristic(chr) => self.hub.stop_notify(&chr, subscription),
            _ => Err(GattError::NotSupported(format!(
                "{} does not support notifications",
                path
            ))),
        }
    }

    fn check(&self, attribute: &Attribute, capability: Capabilities) -> GattResult<()> {
        if self.config.enforce_capabilities {
            AccessController::require(attribute, capability)
        } else {
            Ok(())
        }
    }

    fn value_bearing(attribute: &Attribute, request: &Request) -> GattResult<()> {
        match attribute {
            Attribute::Service(svc) => Err(GattError::NotSupported(format!(
                "{} has no method {}",
                svc.path,
                request.name()
            ))),
            _ => Ok(()),
        }
    }

    /// Serve one request from the transport binding.
    ///
    /// This is where capability flags are enforced: `ReadValue` and reading
    /// the `Value` property need `read`, `WriteValue` and setting `Value`
    /// need `write`. Payloads are decoded before anything is touched.
    pub fn dispatch(&self, path: &ObjectPath, request: Request) -> GattResult<Reply> {
        let attribute = self.registry.attribute(path)?;
        debug!("{} on {}", request.name(), path);

        match request {
            Request::ReadValue { ref options } => {
                Self::value_bearing(&attribute, &request)?;
                AccessController::parse_options(options)?;
                self.check(&attribute, Capabilities::READ)?;

                let value = self.access.read(path)?;
                Ok(Reply::Value(Arg::Bytes(value.into_bytes())))
            }
            Request::WriteValue {
                ref value,
                ref options,
            } => {
                Self::value_bearing(&attribute, &request)?;
                let bytes = AccessController::parse_value(value)?;
                AccessController::parse_options(options)?;
                self.check(&attribute, Capabilities::WRITE)?;

                self.access.write(path, &bytes)?;
                Ok(Reply::Empty)
            }
            Request::StartNotify => self.start_notify(path).map(Reply::Subscribed),
            Request::StopNotify { subscription } => {
                self.stop_notify(path, subscription)?;
                Ok(Reply::Empty)
            }
            Request::GetProperty(name) => {
                let property: Property = name.parse()?;
                self.get_property(&attribute, property).map(Reply::Value)
            }
            Request::SetProperty(name, value) => {
                let property: Property = name.parse()?;
                self.set_property(&attribute, property, &value)?;
                Ok(Reply::Empty)
            }
            Request::GetAll => self.properties_of(&attribute).map(Reply::Properties),
        }
    }

    fn get_property(&self, attribute: &Attribute, property: Property) -> GattResult<Arg> {
        let path = attribute.path();

        match (attribute, property) {
            (_, Property::Uuid) => {
                debug!("Get UUID: {}", attribute.uuid());
                Ok(Arg::Str(attribute.uuid().to_string()))
            }
            (Attribute::Service(svc), Property::Primary) => {
                debug!("Get Primary: {}", svc.primary);
                Ok(Arg::Bool(svc.primary))
            }
            (Attribute::Service(_), Property::Includes) => Ok(Arg::Array(Vec::new())),
            (Attribute::Characteristic(chr), Property::Service) => {
                Ok(Arg::ObjectPath(chr.service.clone()))
            }
            (Attribute::Descriptor(desc), Property::Characteristic) => {
                Ok(Arg::ObjectPath(desc.characteristic.clone()))
            }
            (Attribute::Characteristic(_) | Attribute::Descriptor(_), Property::Value) => {
                debug!("{}: Get(\"Value\")", path);
                self.check(attribute, Capabilities::READ)?;
                Ok(Arg::Bytes(self.access.read(path)?.into_bytes()))
            }
            (Attribute::Characteristic(_) | Attribute::Descriptor(_), Property::Flags) => {
                let names = attribute.flags().map(|f| f.names()).unwrap_or_default();
                Ok(Arg::strings(names.iter().cloned()))
            }
            _ => Err(GattError::InvalidArguments(format!(
                "{} has no property '{}'",
                interface_of(attribute),
                property
            ))),
        }
    }

    fn set_property(&self, attribute: &Attribute, property: Property, value: &Arg) -> GattResult<()> {
        let interface = interface_of(attribute);
        if !Property::of(interface).contains(&property) {
            return Err(GattError::InvalidArguments(format!(
                "{} has no property '{}'",
                interface, property
            )));
        }
        if !property.is_writable() {
            return Err(GattError::NotSupported(format!(
                "Property '{}' is read-only",
                property
            )));
        }

        debug!("{}: Set(\"Value\", ...)", attribute.path());
        let bytes = AccessController::parse_value(value).map_err(|e| {
            warn!("Invalid value for Set(\"Value\", ...) on {}", attribute.path());
            e
        })?;
        self.check(attribute, Capabilities::WRITE)?;

        self.access.write(attribute.path(), &bytes)
    }

    /// All properties of an attribute. `Value` is left out when the
    /// attribute does not expose reads.
    fn properties_of(&self, attribute: &Attribute) -> GattResult<BTreeMap<String, Arg>> {
        let mut properties = BTreeMap::new();

        for property in Property::of(interface_of(attribute)) {
            match self.get_property(attribute, *property) {
                Ok(value) => {
                    properties.insert(property.name().to_owned(), value);
                }
                Err(e) if e.kind() == ErrorKind::NotPermitted => {}
                Err(e) => return Err(e),
            }
        }

        Ok(properties)
    }

    /// Property map of a single path
    pub fn properties(&self, path: &ObjectPath) -> GattResult<BTreeMap<String, Arg>> {
        let attribute = self.registry.attribute(path)?;
        self.properties_of(&attribute)
    }

    /// Every registered attribute with its interface and properties, keyed
    /// by path in lexicographic order
    pub fn managed_objects(&self) -> GattResult<BTreeMap<ObjectPath, ManagedObject>> {
        let mut objects = BTreeMap::new();

        for attribute in self.registry.attributes() {
            let properties = match self.properties_of(&attribute) {
                Ok(properties) => properties,
                // removed after the listing was taken
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            objects.insert(
                attribute.path().clone(),
                ManagedObject {
                    interface: interface_of(&attribute),
                    properties,
                },
            );
        }

        Ok(objects)
    }
}
