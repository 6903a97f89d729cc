//! Spray-and-Wait data model: addresses, header, payload and entry identity

use crate::routing::error::{WireError, WireResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version carried in every header
pub const PROTOCOL_VERSION: u8 = 1;

/// Two-byte protocol tag ("SW")
pub const PROTOCOL_MAGIC: [u8; 2] = *b"SW";

/// Fixed payload buffer size
pub const PAYLOAD_LEN: usize = 10;

/// Link-layer address of a node (two bytes, Rime style)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddress(pub [u8; 2]);

impl NodeAddress {
    pub const LEN: usize = 2;

    pub const fn new(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    /// Address with only the low byte set, as sensor deployments usually assign them
    pub const fn from_byte(low: u8) -> Self {
        Self([low, 0])
    }

    pub fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0[0], self.0[1])
    }
}

/// Header attached to every spray-and-wait frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolHeader {
    pub version: u8,
    pub magic: [u8; 2],
    /// Copies the holder may still hand out. On a broadcast a value of 1
    /// means "destination only"; on a handoff it is the granted budget.
    pub copies: u16,
    pub originator: NodeAddress,
    pub destination: NodeAddress,
    pub message_id: u16,
}

impl ProtocolHeader {
    pub fn new(
        originator: NodeAddress,
        destination: NodeAddress,
        message_id: u16,
        copies: u16,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            magic: PROTOCOL_MAGIC,
            copies,
            originator,
            destination,
            message_id,
        }
    }

    /// Whether the header belongs to this protocol build
    pub fn is_spray_wait(&self) -> bool {
        self.version == PROTOCOL_VERSION && self.magic == PROTOCOL_MAGIC
    }

    pub fn key(&self) -> MessageKey {
        MessageKey {
            message_id: self.message_id,
            originator: self.originator,
            destination: self.destination,
        }
    }

    pub fn with_copies(mut self, copies: u16) -> Self {
        self.copies = copies;
        self
    }
}

/// Deduplication identity. Message ids are only unique per originator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    pub message_id: u16,
    pub originator: NodeAddress,
    pub destination: NodeAddress,
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}->{}",
            self.message_id, self.originator, self.destination
        )
    }
}

/// Fixed-size application payload, zero padded
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Payload(pub [u8; PAYLOAD_LEN]);

impl Payload {
    pub fn new(data: &[u8]) -> WireResult<Self> {
        if data.len() > PAYLOAD_LEN {
            return Err(WireError::PayloadTooLarge {
                len: data.len(),
                max: PAYLOAD_LEN,
            });
        }
        let mut buf = [0u8; PAYLOAD_LEN];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self(buf))
    }

    pub fn zeroed() -> Self {
        Self([0u8; PAYLOAD_LEN])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Bytes up to the first NUL, the way the sensor apps fill the buffer
    pub fn trimmed(&self) -> &[u8] {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(PAYLOAD_LEN);
        &self.0[..end]
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({:?})", String::from_utf8_lossy(self.trimmed()))
    }
}

/// Externally observable state of a queued entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    /// Locally originated, eligible for advertisement
    Fresh,
    /// Relay saw an advertisement and waits for a handoff
    PendingGrant,
    /// Relay holds copies and advertises them itself
    Granted,
}
