//! Attribute registry
//!
//! The registry owns every service, characteristic and descriptor of one
//! application, hands out their paths, and is the only place attributes are
//! created or destroyed. Each registration exports the attribute on the
//! [`ObjectBus`] before it becomes visible in the registry, so a failed export
//! never leaves a partially registered tree behind.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};

use super::types::{
    Attribute, Characteristic, Descriptor, DescriptorSpec, Flags, ObjectPath, Service,
};
use super::value::{AttributeValue, ValueCell};
use crate::bus::{Interface, ObjectBus};
use crate::error::{GattError, GattResult};
use crate::uuid::Uuid;

struct Entry {
    attribute: Attribute,
    /// `None` for services
    value: Option<ValueCell>,
}

/// Path allocation counters. Numbers are never reused, even after the
/// attribute that held them is unregistered.
#[derive(Debug)]
struct PathCounters {
    service: AtomicU32,
    characteristic: AtomicU32,
    descriptor: AtomicU32,
}

impl PathCounters {
    fn new() -> Self {
        Self {
            service: AtomicU32::new(1),
            characteristic: AtomicU32::new(1),
            descriptor: AtomicU32::new(1),
        }
    }

    fn next(counter: &AtomicU32) -> u32 {
        counter.fetch_add(1, Ordering::Relaxed)
    }
}

/// Owner of the attribute forest
pub struct AttributeRegistry {
    bus: Arc<dyn ObjectBus>,
    entries: RwLock<BTreeMap<ObjectPath, Entry>>,
    counters: PathCounters,
}

fn parse_uuid(uuid: &str) -> GattResult<Uuid> {
    uuid.parse()
        .map_err(|e| GattError::InvalidArguments(format!("Invalid UUID {:?}: {}", uuid, e)))
}

impl AttributeRegistry {
    /// Create an empty registry exporting its attributes on `bus`
    pub fn new(bus: Arc<dyn ObjectBus>) -> Self {
        Self {
            bus,
            entries: RwLock::new(BTreeMap::new()),
            counters: PathCounters::new(),
        }
    }

    fn entries(&self) -> RwLockReadGuard<'_, BTreeMap<ObjectPath, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn entries_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<ObjectPath, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new primary service with no characteristics
    pub fn register_service(&self, uuid: &str) -> GattResult<ObjectPath> {
        let uuid = parse_uuid(uuid)?;
        let id = PathCounters::next(&self.counters.service);
        let path = ObjectPath::root().join(&format!("service{}", id));

        let mut entries = self.entries_mut();
        if entries.contains_key(&path) {
            warn!("Couldn't register service interface: {} exists", path);
            return Err(GattError::RegistrationFailed(format!(
                "{} is already registered",
                path
            )));
        }

        self.bus
            .register_interface(&path, Interface::Service)
            .map_err(|e| {
                warn!("Couldn't register service interface: {}", e);
                GattError::from(e)
            })?;

        entries.insert(
            path.clone(),
            Entry {
                attribute: Attribute::Service(Service {
                    uuid,
                    path: path.clone(),
                    primary: true,
                    characteristics: Vec::new(),
                }),
                value: None,
            },
        );

        info!("Registered service {} ({})", path, uuid);
        Ok(path)
    }

    /// Register a characteristic under `service`, optionally together with
    /// one descriptor.
    ///
    /// Either both attributes are registered or neither is: if the
    /// descriptor cannot be exported, the characteristic is withdrawn again
    /// and the call fails with `RegistrationFailed`.
    pub fn register_characteristic(
        &self,
        service: &ObjectPath,
        uuid: &str,
        initial_value: &[u8],
        flags: &[&str],
        descriptor: Option<&DescriptorSpec>,
    ) -> GattResult<ObjectPath> {
        let uuid = parse_uuid(uuid)?;
        let value = AttributeValue::copy_from(initial_value)?;
        let flags = Flags::characteristic(flags.iter().copied());
        let descriptor = match descriptor {
            Some(spec) => Some((
                parse_uuid(&spec.uuid)?,
                Flags::descriptor(spec.flags.iter().cloned()),
                AttributeValue::copy_from(&spec.value)?,
            )),
            None => None,
        };

        let mut entries = self.entries_mut();
        match entries.get(service).map(|entry| &entry.attribute) {
            Some(Attribute::Service(_)) => {}
            _ => return Err(GattError::NotFound(service.clone())),
        }

        let id = PathCounters::next(&self.counters.characteristic);
        let path = service.join(&format!("characteristic{}", id));
        if entries.contains_key(&path) {
            return Err(GattError::RegistrationFailed(format!(
                "{} is already registered",
                path
            )));
        }

        self.bus
            .register_interface(&path, Interface::Characteristic)
            .map_err(|e| {
                warn!("Couldn't register characteristic interface: {}", e);
                GattError::from(e)
            })?;

        let mut characteristic = Characteristic {
            uuid,
            path: path.clone(),
            service: service.clone(),
            flags,
            descriptors: Vec::new(),
        };

        let descriptor = match descriptor {
            Some((desc_uuid, desc_flags, desc_value)) => {
                let id = PathCounters::next(&self.counters.descriptor);
                let desc_path = path.join(&format!("descriptor{}", id));

                let exported = if entries.contains_key(&desc_path) {
                    Err(GattError::RegistrationFailed(format!(
                        "{} is already registered",
                        desc_path
                    )))
                } else {
                    self.bus
                        .register_interface(&desc_path, Interface::Descriptor)
                        .map_err(GattError::from)
                };

                if let Err(e) = exported {
                    warn!("Couldn't register descriptor interface: {}", e);
                    self.bus.unregister_interface(&path, Interface::Characteristic);
                    return Err(e);
                }

                characteristic.descriptors.push(desc_path.clone());
                Some(Entry {
                    attribute: Attribute::Descriptor(Descriptor {
                        uuid: desc_uuid,
                        path: desc_path,
                        characteristic: path.clone(),
                        flags: desc_flags,
                    }),
                    value: Some(ValueCell::new(desc_value)),
                })
            }
            None => None,
        };

        if let Some(Entry {
            attribute: Attribute::Service(svc),
            ..
        }) = entries.get_mut(service)
        {
            svc.characteristics.push(path.clone());
        }
        entries.insert(
            path.clone(),
            Entry {
                attribute: Attribute::Characteristic(characteristic),
                value: Some(ValueCell::new(value)),
            },
        );
        if let Some(entry) = descriptor {
            debug!("Registered descriptor {}", entry.attribute.path());
            entries.insert(entry.attribute.path().clone(), entry);
        }

        info!("Registered characteristic {} ({})", path, uuid);
        Ok(path)
    }

    /// Remove a service and everything it owns.
    ///
    /// Returns the removed paths, deepest first. Unknown paths, and paths that
    /// do not name a service, are a no-op.
    pub fn unregister_service(&self, path: &ObjectPath) -> Vec<ObjectPath> {
        let mut entries = self.entries_mut();
        let characteristics = match entries.get(path).map(|entry| &entry.attribute) {
            Some(Attribute::Service(svc)) => svc.characteristics.clone(),
            _ => {
                debug!("Unregister of unknown service {} ignored", path);
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        for chr in &characteristics {
            removed.extend(self.remove_characteristic(&mut entries, chr));
        }
        entries.remove(path);
        self.bus.unregister_interface(path, Interface::Service);
        removed.push(path.clone());

        info!("Unregistered service {}", path);
        removed
    }

    /// Remove a characteristic and its descriptors, detaching it from its
    /// service. Returns the removed paths; unknown paths are a no-op.
    pub fn unregister_characteristic(&self, path: &ObjectPath) -> Vec<ObjectPath> {
        let mut entries = self.entries_mut();
        let service = match entries.get(path).map(|entry| &entry.attribute) {
            Some(Attribute::Characteristic(chr)) => chr.service.clone(),
            _ => {
                debug!("Unregister of unknown characteristic {} ignored", path);
                return Vec::new();
            }
        };

        if let Some(Entry {
            attribute: Attribute::Service(svc),
            ..
        }) = entries.get_mut(&service)
        {
            svc.characteristics.retain(|chr| chr != path);
        }

        let removed = self.remove_characteristic(&mut entries, path);
        info!("Unregistered characteristic {}", path);
        removed
    }

    fn remove_characteristic(
        &self,
        entries: &mut BTreeMap<ObjectPath, Entry>,
        path: &ObjectPath,
    ) -> Vec<ObjectPath> {
        let mut removed = Vec::new();
        if let Some(entry) = entries.remove(path) {
            if let Attribute::Characteristic(chr) = entry.attribute {
                for desc in chr.descriptors {
                    entries.remove(&desc);
                    self.bus.unregister_interface(&desc, Interface::Descriptor);
                    removed.push(desc);
                }
            }
            self.bus.unregister_interface(path, Interface::Characteristic);
            removed.push(path.clone());
        }
        removed
    }

    /// Metadata of the attribute at `path`
    pub fn attribute(&self, path: &ObjectPath) -> GattResult<Attribute> {
        self.entries()
            .get(path)
            .map(|entry| entry.attribute.clone())
            .ok_or_else(|| GattError::NotFound(path.clone()))
    }

    pub fn service(&self, path: &ObjectPath) -> GattResult<Service> {
        match self.attribute(path)? {
            Attribute::Service(svc) => Ok(svc),
            _ => Err(GattError::NotFound(path.clone())),
        }
    }

    pub fn characteristic(&self, path: &ObjectPath) -> GattResult<Characteristic> {
        match self.attribute(path)? {
            Attribute::Characteristic(chr) => Ok(chr),
            _ => Err(GattError::NotFound(path.clone())),
        }
    }

    pub fn descriptor(&self, path: &ObjectPath) -> GattResult<Descriptor> {
        match self.attribute(path)? {
            Attribute::Descriptor(desc) => Ok(desc),
            _ => Err(GattError::NotFound(path.clone())),
        }
    }

    /// Metadata and value cell of a characteristic or descriptor
    pub(crate) fn value_entry(&self, path: &ObjectPath) -> GattResult<(Attribute, ValueCell)> {
        let entries = self.entries();
        let entry = entries
            .get(path)
            .ok_or_else(|| GattError::NotFound(path.clone()))?;

        match &entry.value {
            Some(cell) => Ok((entry.attribute.clone(), cell.clone())),
            None => Err(GattError::NotSupported(format!(
                "{} carries no value",
                path
            ))),
        }
    }

    /// Run `f` on a characteristic or descriptor while the registry is
    /// read-locked. The attribute cannot be unregistered until `f` returns.
    pub(crate) fn with_value_entry<R>(
        &self,
        path: &ObjectPath,
        f: impl FnOnce(&Attribute, &ValueCell) -> GattResult<R>,
    ) -> GattResult<R> {
        let entries = self.entries();
        let entry = entries
            .get(path)
            .ok_or_else(|| GattError::NotFound(path.clone()))?;

        match &entry.value {
            Some(cell) => f(&entry.attribute, cell),
            None => Err(GattError::NotSupported(format!(
                "{} carries no value",
                path
            ))),
        }
    }

    /// All services, ordered by path. The order is lexicographic, so
    /// `/service10` sorts before `/service2`.
    pub fn services(&self) -> Vec<Service> {
        self.entries()
            .values()
            .filter_map(|entry| match &entry.attribute {
                Attribute::Service(svc) => Some(svc.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every registered attribute, in the same lexicographic path order as
    /// [`services`](Self::services)
    pub fn attributes(&self) -> Vec<Attribute> {
        self.entries()
            .values()
            .map(|entry| entry.attribute.clone())
            .collect()
    }

    /// Every registered path, lexicographically ordered
    pub fn paths(&self) -> Vec<ObjectPath> {
        self.entries().keys().cloned().collect()
    }

    pub fn contains(&self, path: &ObjectPath) -> bool {
        self.entries().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Drop for AttributeRegistry {
    fn drop(&mut self) {
        let services: Vec<ObjectPath> = self
            .services()
            .into_iter()
            .map(|svc| svc.path)
            .collect();
        for path in services {
            self.unregister_service(&path);
        }
    }
}
