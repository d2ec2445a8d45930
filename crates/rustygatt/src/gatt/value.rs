//! Attribute value storage

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{GattError, GattResult};

/// An owned attribute value.
///
/// The length is always the length of the buffer; there is no separate
/// length field that could drift out of sync.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AttributeValue {
    bytes: Vec<u8>,
}

impl AttributeValue {
    /// Copy `bytes` into a freshly allocated value.
    ///
    /// Allocation failure is reported as `NoMemory` instead of aborting.
    pub fn copy_from(bytes: &[u8]) -> GattResult<Self> {
        let mut owned = Vec::new();
        owned
            .try_reserve_exact(bytes.len())
            .map_err(|_| GattError::NoMemory(bytes.len()))?;
        owned.extend_from_slice(bytes);
        Ok(Self { bytes: owned })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeValue({})", hex::encode(&self.bytes))
    }
}

/// Shared handle to an attribute's value cell.
///
/// Writers hold the exclusive lock for the whole replace-and-publish step, so
/// at most one mutation of a given attribute is in flight. Readers take the
/// shared lock and copy out.
#[derive(Clone, Default)]
pub(crate) struct ValueCell(Arc<RwLock<AttributeValue>>);

impl ValueCell {
    pub(crate) fn new(value: AttributeValue) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, AttributeValue> {
        // values are swapped in one assignment, never torn
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, AttributeValue> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> GattResult<AttributeValue> {
        AttributeValue::copy_from(self.read().as_bytes())
    }
}

impl fmt::Debug for ValueCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.read(), f)
    }
}
