//! Wire codec for spray-and-wait frames
//!
//! Layout (little endian, no padding, 11 bytes of header):
//! [1 byte]  version
//! [2 bytes] magic ("SW")
//! [2 bytes] copies
//! [2 bytes] originator address
//! [2 bytes] destination address
//! [2 bytes] message id
//! [10 bytes] payload (advertisements only)
//!
//! Requests and handoffs carry the header alone; the relay already holds
//! the payload from the advertisement that triggered them.

use crate::routing::error::{WireError, WireResult};
use crate::routing::types::{NodeAddress, Payload, ProtocolHeader, PAYLOAD_LEN};
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const HEADER_LEN: usize = 1 + 2 + 2 + NodeAddress::LEN + NodeAddress::LEN + 2;

pub const ADVERT_LEN: usize = HEADER_LEN + PAYLOAD_LEN;

/// A decoded frame. `payload` is present only when the frame carried one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub header: ProtocolHeader,
    pub payload: Option<Payload>,
}

impl ProtocolHeader {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_slice(&self.magic);
        buf.put_u16_le(self.copies);
        buf.put_slice(self.originator.as_bytes());
        buf.put_slice(self.destination.as_bytes());
        buf.put_u16_le(self.message_id);
    }

    /// Decode a header without applying the protocol gate
    pub fn decode_raw(mut data: &[u8]) -> WireResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(WireError::TooShort {
                need: HEADER_LEN,
                got: data.len(),
            });
        }

        let version = data.get_u8();
        let magic = [data.get_u8(), data.get_u8()];
        let copies = data.get_u16_le();
        let originator = NodeAddress([data.get_u8(), data.get_u8()]);
        let destination = NodeAddress([data.get_u8(), data.get_u8()]);
        let message_id = data.get_u16_le();

        Ok(Self {
            version,
            magic,
            copies,
            originator,
            destination,
            message_id,
        })
    }
}

/// Encode a header-only frame (request or handoff)
pub fn encode_header(header: &ProtocolHeader) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN);
    header.encode(&mut buf);
    buf.freeze()
}

/// Encode an advertisement: header followed by the payload buffer
pub fn encode_advert(header: &ProtocolHeader, payload: &Payload) -> Bytes {
    let mut buf = BytesMut::with_capacity(ADVERT_LEN);
    header.encode(&mut buf);
    buf.put_slice(payload.as_bytes());
    buf.freeze()
}

/// Decode a frame, rejecting anything that is not this protocol's traffic
pub fn decode(data: &[u8]) -> WireResult<Frame> {
    let header = ProtocolHeader::decode_raw(data)?;
    if !header.is_spray_wait() {
        return Err(WireError::ProtocolMismatch {
            version: header.version,
            magic: header.magic,
        });
    }

    let rest = &data[HEADER_LEN..];
    let payload = if rest.len() >= PAYLOAD_LEN {
        let mut buf = [0u8; PAYLOAD_LEN];
        buf.copy_from_slice(&rest[..PAYLOAD_LEN]);
        Some(Payload(buf))
    } else {
        None
    };

    Ok(Frame { header, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::types::{PROTOCOL_MAGIC, PROTOCOL_VERSION};

    fn header() -> ProtocolHeader {
        ProtocolHeader::new(NodeAddress::new([8, 0]), NodeAddress::new([3, 1]), 0x0102, 8)
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode_header(&header());
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(
            bytes.as_ref(),
            &[PROTOCOL_VERSION, b'S', b'W', 8, 0, 8, 0, 3, 1, 0x02, 0x01]
        );
    }

    #[test]
    fn test_advert_carries_payload() {
        let payload = Payload::new(b"Johann").unwrap();
        let bytes = encode_advert(&header(), &payload);
        assert_eq!(bytes.len(), ADVERT_LEN);

        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.header, header());
        assert_eq!(frame.payload, Some(payload));
    }

    #[test]
    fn test_request_has_no_payload() {
        let frame = decode(&encode_header(&header())).unwrap();
        assert!(frame.payload.is_none());
    }

    #[test]
    fn test_short_frame_rejected() {
        let result = decode(&[PROTOCOL_VERSION, b'S', b'W']);
        assert_eq!(
            result,
            Err(WireError::TooShort {
                need: HEADER_LEN,
                got: 3
            })
        );
    }

    #[test]
    fn test_foreign_magic_rejected() {
        let mut bytes = encode_header(&header()).to_vec();
        bytes[1] = b'X';
        let result = decode(&bytes);
        assert!(matches!(
            result,
            Err(WireError::ProtocolMismatch { version: 1, magic }) if magic == [b'X', b'W']
        ));
    }

    #[test]
    fn test_foreign_version_rejected() {
        let mut bytes = encode_header(&header()).to_vec();
        bytes[0] = PROTOCOL_VERSION + 1;
        assert!(matches!(
            decode(&bytes),
            Err(WireError::ProtocolMismatch { magic, .. }) if magic == PROTOCOL_MAGIC
        ));
    }
}
