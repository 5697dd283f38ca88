use std::fmt;
use std::str::FromStr;

use crate::hex::{decode_hex_exact, encode_hex, HexError};

/// Size of a long-term public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of a full contact address: public key + nospam (4) + checksum (2).
pub const ADDRESS_SIZE: usize = PUBLIC_KEY_SIZE + 4 + 2;

/// Delimiter byte that must immediately precede [`TRIGGER_TOKEN`].
pub const TRIGGER_DELIMITER: u8 = b'%';

/// Token that, preceded by [`TRIGGER_DELIMITER`], requests our address.
pub const TRIGGER_TOKEN: &[u8] = b"ngb";

/// Text sent to the relay when its status message changes.
pub const INVITE_REQUEST: &[u8] = b"invite";

/// Per-session contact number assigned by the transport.
///
/// Stable for the process lifetime, not necessarily across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(pub u32);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contact#{}", self.0)
    }
}

/// Per-session group number assigned by the transport on join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Opaque invite cookie carried by a group invite.
#[derive(Clone, PartialEq, Eq)]
pub struct GroupHandle(pub Vec<u8>);

impl GroupHandle {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupHandle({} bytes)", self.0.len())
    }
}

/// Long-term identity key of a peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = encode_hex(&self.0);
        write!(f, "PublicKey({}...)", &hex[..12])
    }
}

impl FromStr for PublicKey {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex_exact(s).map(Self)
    }
}

/// Full contact address (public key, nospam, checksum).
///
/// Displayed and parsed as uppercase hex of [`ADDRESS_SIZE`] bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// The public key prefix of this address.
    pub fn public_key(&self) -> PublicKey {
        let mut key = [0u8; PUBLIC_KEY_SIZE];
        key.copy_from_slice(&self.0[..PUBLIC_KEY_SIZE]);
        PublicKey(key)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = encode_hex(&self.0);
        write!(f, "Address({}...)", &hex[..12])
    }
}

impl FromStr for Address {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex_exact(s).map(Self)
    }
}

/// A bootstrap node used to join the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapNode {
    pub host: String,
    pub port: u16,
    pub public_key: PublicKey,
}
