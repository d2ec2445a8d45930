//! In-process [`ObjectBus`]

use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, PoisonError};

use log::{debug, trace};

use super::{Interface, ObjectBus};
use crate::error::BusError;
use crate::gatt::ObjectPath;

/// A recorded property-changed emission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChanged {
    pub path: ObjectPath,
    pub interface: Interface,
    pub property: String,
}

/// Bus that keeps exported objects and emitted signals in memory.
///
/// Used by the daemon and by tests. Interfaces can be marked as refused to
/// exercise registration failures.
#[derive(Debug, Default)]
pub struct LocalBus {
    exported: Mutex<BTreeSet<(ObjectPath, Interface)>>,
    changes: Mutex<Vec<PropertyChanged>>,
    refused: Mutex<HashSet<Interface>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later registration of `interface` fail
    pub fn refuse(&self, interface: Interface) {
        self.refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(interface);
    }

    /// Accept `interface` again
    pub fn accept(&self, interface: Interface) {
        self.refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&interface);
    }

    pub fn is_exported(&self, path: &ObjectPath, interface: Interface) -> bool {
        self.exported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(path.clone(), interface))
    }

    /// Every exported `(path, interface)` pair, ordered by path
    pub fn exported(&self) -> Vec<(ObjectPath, Interface)> {
        self.exported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Emissions recorded so far
    pub fn property_changes(&self) -> Vec<PropertyChanged> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the recorded emissions
    pub fn take_property_changes(&self) -> Vec<PropertyChanged> {
        std::mem::take(&mut *self.changes.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ObjectBus for LocalBus {
    fn register_interface(&self, path: &ObjectPath, interface: Interface) -> Result<(), BusError> {
        if self
            .refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&interface)
        {
            return Err(BusError::Refused {
                path: path.clone(),
                interface: interface.name(),
                reason: "interface refused".into(),
            });
        }

        let mut exported = self.exported.lock().unwrap_or_else(PoisonError::into_inner);
        if !exported.insert((path.clone(), interface)) {
            return Err(BusError::AlreadyExported {
                path: path.clone(),
                interface: interface.name(),
            });
        }

        debug!("Exported {} at {}", interface, path);
        Ok(())
    }

    fn unregister_interface(&self, path: &ObjectPath, interface: Interface) {
        if self
            .exported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(path.clone(), interface))
        {
            debug!("Withdrew {} from {}", interface, path);
        }
    }

    fn emit_property_changed(&self, path: &ObjectPath, interface: Interface, property: &str) {
        trace!("PropertiesChanged {} {} {}", path, interface, property);
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PropertyChanged {
                path: path.clone(),
                interface,
                property: property.to_owned(),
            });
    }
}
