//! Transport-agnostic request arguments
//!
//! [`Arg`] mirrors the small subset of bus variant types the GATT objects
//! exchange: byte arrays for values, string-keyed option bags, object paths,
//! strings and booleans for properties.

use std::collections::BTreeMap;

use crate::gatt::ObjectPath;

/// A typed request or reply element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Byte(u8),
    Bool(bool),
    Str(String),
    ObjectPath(ObjectPath),
    /// Byte array, the encoding of attribute values
    Bytes(Vec<u8>),
    /// Array of arbitrary elements
    Array(Vec<Arg>),
    /// String-keyed option bag
    Dict(BTreeMap<String, Arg>),
}

impl Arg {
    /// An empty option bag
    pub fn options() -> Self {
        Arg::Dict(BTreeMap::new())
    }

    /// An option bag naming the remote device a request came from
    pub fn device_options(device: ObjectPath) -> Self {
        let mut options = BTreeMap::new();
        options.insert("device".to_owned(), Arg::ObjectPath(device));
        Arg::Dict(options)
    }

    /// Array of strings
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arg::Array(items.into_iter().map(|s| Arg::Str(s.into())).collect())
    }

    /// Type signature, used in diagnostics
    pub fn signature(&self) -> &'static str {
        match self {
            Arg::Byte(_) => "y",
            Arg::Bool(_) => "b",
            Arg::Str(_) => "s",
            Arg::ObjectPath(_) => "o",
            Arg::Bytes(_) => "ay",
            Arg::Array(_) => "av",
            Arg::Dict(_) => "a{sv}",
        }
    }
}

impl From<Vec<u8>> for Arg {
    fn from(bytes: Vec<u8>) -> Self {
        Arg::Bytes(bytes)
    }
}

impl From<&[u8]> for Arg {
    fn from(bytes: &[u8]) -> Self {
        Arg::Bytes(bytes.to_vec())
    }
}

impl From<ObjectPath> for Arg {
    fn from(path: ObjectPath) -> Self {
        Arg::ObjectPath(path)
    }
}
