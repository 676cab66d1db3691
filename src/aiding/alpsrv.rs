//! AID-ALPSRV wire handling: answer a receiver's request for a byte
//! range of the almanac file, or tell it to refresh when its cached
//! `file_id` has gone stale.
//!
//! The request and reply share the same 16-byte header shape
//! ([`AlpSrv`][crate::ubx::messages::AlpSrv]); a reply additionally
//! carries `data_size` words of file data appended after the header.
//! Stale-id rejection (the in-header error signal) is vendor-defined
//! beyond "tell the receiver to ask again" — here a stale request gets
//! `data_size = 0` and the header's `file_id` corrected to the store's
//! current id, which is sufficient for the receiver to resynchronize.

use crate::ubx::messages::{AlpSrv, UbxMessage};
use crate::ubx::UbxFrame;

use super::alp::AlpStore;

pub fn handle_alpsrv_request(frame: &UbxFrame, store: &AlpStore) -> crate::error::Result<UbxFrame> {
    let req = AlpSrv::from_payload(&frame.payload)?;

    let stale = req.file_id != store.file_id();
    let data: &[u8] = if stale { &[] } else { store.read_words(req.offset, req.size) };

    let header = AlpSrv {
        id_size: req.id_size,
        data_type: req.data_type,
        offset: req.offset,
        size: req.size,
        file_id: store.file_id(),
        data_size: (data.len() / 2) as u16,
        id1: req.id1,
        id2: req.id2,
        id3: req.id3,
    };

    let mut payload = header.to_payload();
    payload.extend_from_slice(data);
    Ok(UbxFrame::new(AlpSrv::CLASS, AlpSrv::ID, payload))
}
