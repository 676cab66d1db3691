//! Raw UBX frame representation: `SYNC1 SYNC2 CLASS ID LEN_LO LEN_HI PAYLOAD CK_A CK_B`.

use crate::error::{Error, Result};
use crate::ubx::checksum;

pub const SYNC_CHAR_1: u8 = 0xb5;
pub const SYNC_CHAR_2: u8 = 0x62;

/// Maximum payload length the parser will allocate for; larger declared
/// lengths are treated as corrupt and the frame is discarded.
pub const MAX_PAYLOAD_LEN: usize = 1240;

/// A decoded (or about-to-be-encoded) UBX message, independent of its wire
/// framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UbxFrame {
    pub class: u8,
    pub id: u8,
    pub payload: Vec<u8>,
}

impl UbxFrame {
    pub fn new(class: u8, id: u8, payload: Vec<u8>) -> Self {
        UbxFrame { class, id, payload }
    }

    /// Encode to the full wire representation, sync bytes through checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.payload.len());
        out.push(SYNC_CHAR_1);
        out.push(SYNC_CHAR_2);
        out.push(self.class);
        out.push(self.id);
        let len = self.payload.len() as u16;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&self.payload);
        let (ck_a, ck_b) = checksum::compute(&out[2..]);
        out.push(ck_a);
        out.push(ck_b);
        out
    }

    /// Decode a complete frame body (everything after the two sync bytes,
    /// including the trailing checksum). Used by the parser once it has
    /// assembled a candidate frame.
    pub fn decode_body(class: u8, id: u8, payload: &[u8], ck_a: u8, ck_b: u8) -> Result<Self> {
        let mut header = Vec::with_capacity(4 + payload.len());
        header.push(class);
        header.push(id);
        header.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        header.extend_from_slice(payload);
        let (expected_a, expected_b) = checksum::compute(&header);
        if expected_a != ck_a || expected_b != ck_b {
            return Err(Error::Checksum);
        }
        Ok(UbxFrame {
            class,
            id,
            payload: payload.to_vec(),
        })
    }

    /// An 8-byte zero-length poll request for the given class/id, as sent
    /// to request an unsolicited message (e.g. MON-VER, AID-ALP).
    pub fn poll(class: u8, id: u8) -> Self {
        UbxFrame {
            class,
            id,
            payload: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let frame = UbxFrame::new(0x06, 0x01, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let wire = frame.encode();
        assert_eq!(&wire[0..2], &[SYNC_CHAR_1, SYNC_CHAR_2]);
        let len = u16::from_le_bytes([wire[4], wire[5]]) as usize;
        let payload = &wire[6..6 + len];
        let ck_a = wire[6 + len];
        let ck_b = wire[6 + len + 1];
        let decoded = UbxFrame::decode_body(wire[2], wire[3], payload, ck_a, ck_b).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decode_rejects_bad_checksum() {
        let frame = UbxFrame::new(0x05, 0x00, vec![0x06, 0x01]);
        let wire = frame.encode();
        let len = u16::from_le_bytes([wire[4], wire[5]]) as usize;
        let payload = &wire[6..6 + len];
        let bad_ck_a = wire[6 + len].wrapping_add(1);
        let ck_b = wire[6 + len + 1];
        let err = UbxFrame::decode_body(wire[2], wire[3], payload, bad_ck_a, ck_b).unwrap_err();
        assert!(matches!(err, Error::Checksum));
    }

    #[test]
    fn poll_request_has_empty_payload() {
        let frame = UbxFrame::poll(0x0a, 0x04);
        assert!(frame.payload.is_empty());
        assert_eq!(frame.encode().len(), 8);
    }
}
