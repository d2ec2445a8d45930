use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 128-bit attribute UUID.
///
/// Registration data names attributes by their textual UUID. The text is
/// parsed once into this form so that equality ignores case and short SIG
/// forms ("180d") compare equal to their expanded 128-bit spelling.
/// Internally the value is stored as 16 bytes in little-endian order.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uuid {
    bytes: [u8; 16],
}

/// "00000000-0000-1000-8000-00805F9B34FB" in little-endian order.
const BASE_UUID_BYTES: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Offset within the base UUID where the 16/32-bit value is inserted.
const BASE_OFFSET: usize = 12;

/// Group lengths of the hyphenated textual form.
const HYPHENATED_GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

impl Uuid {
    /// Creates a UUID from 16 bytes in little-endian order.
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Uuid { bytes }
    }

    /// Creates a UUID from 16 bytes in big-endian (textual) order.
    pub fn from_bytes_be(mut bytes: [u8; 16]) -> Self {
        bytes.reverse();
        Uuid { bytes }
    }

    /// Creates a UUID from a 16-bit SIG-assigned value.
    pub const fn from_u16(uuid16: u16) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[BASE_OFFSET] = uuid16 as u8;
        bytes[BASE_OFFSET + 1] = (uuid16 >> 8) as u8;
        Uuid { bytes }
    }

    /// Creates a UUID from a 32-bit SIG-assigned value.
    pub const fn from_u32(uuid32: u32) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[BASE_OFFSET] = uuid32 as u8;
        bytes[BASE_OFFSET + 1] = (uuid32 >> 8) as u8;
        bytes[BASE_OFFSET + 2] = (uuid32 >> 16) as u8;
        bytes[BASE_OFFSET + 3] = (uuid32 >> 24) as u8;
        Uuid { bytes }
    }

    /// Returns the underlying 16 bytes in big-endian order.
    pub fn as_bytes_be(&self) -> [u8; 16] {
        let mut bytes = self.bytes;
        bytes.reverse();
        bytes
    }

    fn is_sig_assigned(&self) -> bool {
        self.bytes[0..BASE_OFFSET] == BASE_UUID_BYTES[0..BASE_OFFSET]
    }

    /// The 16-bit short form, if this is a SIG-assigned 16-bit UUID.
    pub fn as_u16(&self) -> Option<u16> {
        if self.is_sig_assigned()
            && self.bytes[BASE_OFFSET + 2] == 0
            && self.bytes[BASE_OFFSET + 3] == 0
        {
            Some(u16::from_le_bytes([
                self.bytes[BASE_OFFSET],
                self.bytes[BASE_OFFSET + 1],
            ]))
        } else {
            None
        }
    }
}

impl From<u16> for Uuid {
    fn from(uuid16: u16) -> Self {
        Uuid::from_u16(uuid16)
    }
}

impl From<u32> for Uuid {
    fn from(uuid32: u32) -> Self {
        Uuid::from_u32(uuid32)
    }
}

impl PartialEq<u16> for Uuid {
    fn eq(&self, other: &u16) -> bool {
        self.as_u16() == Some(*other)
    }
}

impl fmt::Display for Uuid {
    /// Lower-case hyphenated form, the spelling exposed through the `UUID`
    /// property.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(self.as_bytes_be());
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(u16_val) = self.as_u16() {
            write!(f, "Uuid(0x{:04X})", u16_val)
        } else {
            write!(f, "Uuid({})", self)
        }
    }
}

/// Errors produced while parsing a textual UUID
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UuidParseError {
    #[error("UUID has invalid length {0}")]
    InvalidLength(usize),

    #[error("UUID groups are malformed")]
    InvalidFormat,

    #[error("UUID contains non-hex characters: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    /// Accepts "180d", "0000180d" and the 36-character hyphenated form, as
    /// well as the 32-character form without hyphens.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.len() {
            4 => {
                let mut raw = [0u8; 2];
                hex::decode_to_slice(s, &mut raw)?;
                Ok(Uuid::from_u16(u16::from_be_bytes(raw)))
            }
            8 => {
                let mut raw = [0u8; 4];
                hex::decode_to_slice(s, &mut raw)?;
                Ok(Uuid::from_u32(u32::from_be_bytes(raw)))
            }
            32 => {
                let mut bytes_be = [0u8; 16];
                hex::decode_to_slice(s, &mut bytes_be)?;
                Ok(Uuid::from_bytes_be(bytes_be))
            }
            36 => {
                let groups: Vec<&str> = s.split('-').collect();
                let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
                if lengths != HYPHENATED_GROUPS {
                    return Err(UuidParseError::InvalidFormat);
                }
                let mut bytes_be = [0u8; 16];
                hex::decode_to_slice(groups.concat(), &mut bytes_be)?;
                Ok(Uuid::from_bytes_be(bytes_be))
            }
            len => Err(UuidParseError::InvalidLength(len)),
        }
    }
}
