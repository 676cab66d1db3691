//! AssistNow Offline (ALP) file storage.
//!
//! The receiver never parses the ALP file itself — it only ever reads
//! byte ranges of whatever was loaded via [`AlpStore::load`], identified
//! by a monotonic `file_id` the receiver echoes back on every request so
//! a stale cached copy can be detected (`ubgps_internal.h`'s
//! `alp_file_id: uint16_t`). Validity (how stale is too stale) is left to
//! the host; `max_age` is supplied by the caller rather than hardcoded,
//! since the original's update cadence is configured outside this header.
//!
//! Before a file is accepted it must pass `ubgps_check_alp_file_validity`'s
//! header check (spec.md §4.10): magic/version bytes, declared length
//! against the actual buffer length, and a CRC over the body. The CRC
//! uses CRC-16/X25, matching the `crc16::Digest`/`Hasher16` combination
//! the teacher crate's own `set_alp_offline` uses to fingerprint its ALP
//! buffer (`examples/ublox-rs-ublox/src/lib.rs`).

use std::time::{Duration, Instant};

use crc::{crc16, Hasher16};

use crate::error::{Error, Result};

/// 2-byte magic, 1-byte format version, 1 reserved byte, 4-byte declared
/// total length (header + body, little-endian), 2-byte CRC-16/X25 of the
/// body, 2-byte expiry date as whole days since the Unix epoch (0 = never
/// expires).
const ALP_MAGIC: [u8; 2] = *b"AP";
const ALP_VERSION: u8 = 1;
const ALP_HEADER_LEN: usize = 12;

#[derive(Debug, Default)]
pub struct AlpStore {
    data: Vec<u8>,
    file_id: u16,
    loaded_at: Option<Instant>,
}

impl AlpStore {
    pub fn new() -> Self {
        AlpStore::default()
    }

    /// Validate the file's header and, on success, replace the stored
    /// body and bump `file_id` so in-flight ALPSRV requests carrying the
    /// old id are recognized as stale. On failure the previous file (if
    /// any) is left untouched and `Error::AlpInvalid` is returned.
    pub fn load(&mut self, data: Vec<u8>, now: Instant) -> Result<()> {
        let body = Self::validate(&data)?.to_vec();
        self.data = body;
        self.file_id = self.file_id.wrapping_add(1);
        self.loaded_at = Some(now);
        Ok(())
    }

    fn validate(data: &[u8]) -> Result<&[u8]> {
        if data.len() < ALP_HEADER_LEN {
            return Err(Error::AlpInvalid(format!(
                "file of {} bytes is shorter than the {ALP_HEADER_LEN}-byte header",
                data.len()
            )));
        }
        if data[0..2] != ALP_MAGIC {
            return Err(Error::AlpInvalid("bad magic".into()));
        }
        if data[2] != ALP_VERSION {
            return Err(Error::AlpInvalid(format!("unsupported version {}", data[2])));
        }
        let declared_len = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;
        if declared_len != data.len() {
            return Err(Error::AlpInvalid(format!(
                "header declares {declared_len} bytes, file is {}",
                data.len()
            )));
        }

        let body = &data[ALP_HEADER_LEN..];
        let stored_crc = u16::from_le_bytes([data[8], data[9]]);
        let mut digest = crc16::Digest::new(crc16::X25);
        digest.write(body);
        if digest.sum16() != stored_crc {
            return Err(Error::AlpInvalid("CRC-16/X25 mismatch".into()));
        }

        let expiry_days = u16::from_le_bytes([data[10], data[11]]);
        if expiry_days != 0 {
            let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
            let elapsed_days = (chrono::Utc::now().date_naive() - epoch).num_days();
            if elapsed_days >= expiry_days as i64 {
                return Err(Error::AlpInvalid(format!(
                    "file expired {} day(s) ago",
                    elapsed_days - expiry_days as i64
                )));
            }
        }

        Ok(body)
    }

    pub fn invalidate(&mut self) {
        self.data.clear();
        self.loaded_at = None;
    }

    pub fn file_id(&self) -> u16 {
        self.file_id
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// A loaded file is valid until `max_age` has elapsed since it was
    /// loaded; an empty store is never valid.
    pub fn is_valid(&self, now: Instant, max_age: Duration) -> bool {
        match self.loaded_at {
            Some(loaded_at) => self.has_data() && now.saturating_duration_since(loaded_at) < max_age,
            None => false,
        }
    }

    /// Read a byte range addressed by 16-bit-word offset/count, clamped
    /// to what's actually stored. Returns an empty slice (not an error)
    /// if the range lies entirely past the end of the file.
    pub fn read_words(&self, word_offset: u16, word_count: u16) -> &[u8] {
        let byte_offset = (word_offset as usize) * 2;
        let byte_len = (word_count as usize) * 2;
        if byte_offset >= self.data.len() {
            return &[];
        }
        let end = (byte_offset + byte_len).min(self.data.len());
        &self.data[byte_offset..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap_with_expiry(body: &[u8], expiry_days: u16) -> Vec<u8> {
        let mut digest = crc16::Digest::new(crc16::X25);
        digest.write(body);
        let crc = digest.sum16();

        let mut file = Vec::with_capacity(ALP_HEADER_LEN + body.len());
        file.extend_from_slice(&ALP_MAGIC);
        file.push(ALP_VERSION);
        file.push(0); // reserved
        file.extend_from_slice(&((ALP_HEADER_LEN + body.len()) as u32).to_le_bytes());
        file.extend_from_slice(&crc.to_le_bytes());
        file.extend_from_slice(&expiry_days.to_le_bytes());
        file.extend_from_slice(body);
        file
    }

    fn wrap(body: &[u8]) -> Vec<u8> {
        wrap_with_expiry(body, 0)
    }

    #[test]
    fn loading_bumps_file_id() {
        let mut store = AlpStore::new();
        let now = Instant::now();
        assert_eq!(store.file_id(), 0);
        store.load(wrap(&[1, 2, 3, 4]), now).unwrap();
        assert_eq!(store.file_id(), 1);
        store.load(wrap(&[5, 6]), now).unwrap();
        assert_eq!(store.file_id(), 2);
    }

    #[test]
    fn empty_store_is_never_valid() {
        let store = AlpStore::new();
        assert!(!store.is_valid(Instant::now(), Duration::from_secs(3600)));
    }

    #[test]
    fn becomes_invalid_after_max_age() {
        let mut store = AlpStore::new();
        let now = Instant::now();
        store.load(wrap(&[1, 2]), now).unwrap();
        assert!(store.is_valid(now + Duration::from_secs(1), Duration::from_secs(10)));
        assert!(!store.is_valid(now + Duration::from_secs(20), Duration::from_secs(10)));
    }

    #[test]
    fn read_words_converts_word_units_to_bytes() {
        let mut store = AlpStore::new();
        let data: Vec<u8> = (0u8..20).collect();
        store.load(wrap(&data), Instant::now()).unwrap();
        // word offset 2 => byte 4, word count 3 => 6 bytes
        assert_eq!(store.read_words(2, 3), &data[4..10]);
    }

    #[test]
    fn read_past_end_yields_empty_slice() {
        let mut store = AlpStore::new();
        store.load(wrap(&[0u8; 4]), Instant::now()).unwrap();
        assert_eq!(store.read_words(100, 5), &[] as &[u8]);
    }

    #[test]
    fn invalidate_clears_data_but_keeps_file_id() {
        let mut store = AlpStore::new();
        store.load(wrap(&[1, 2, 3]), Instant::now()).unwrap();
        let id = store.file_id();
        store.invalidate();
        assert!(!store.has_data());
        assert_eq!(store.file_id(), id);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut file = wrap(&[1, 2, 3]);
        file[0] = b'X';
        let mut store = AlpStore::new();
        assert!(matches!(store.load(file, Instant::now()), Err(Error::AlpInvalid(_))));
        assert_eq!(store.file_id(), 0, "a rejected load must not bump file_id");
    }

    #[test]
    fn rejects_declared_length_mismatch() {
        let mut file = wrap(&[1, 2, 3, 4]);
        file.push(0xff); // trailing byte the header's declared length doesn't account for
        let mut store = AlpStore::new();
        assert!(store.load(file, Instant::now()).is_err());
    }

    #[test]
    fn rejects_crc_mismatch() {
        let mut file = wrap(&[1, 2, 3, 4]);
        let last = file.len() - 1;
        file[last] ^= 0xff;
        let mut store = AlpStore::new();
        assert!(store.load(file, Instant::now()).is_err());
    }

    #[test]
    fn rejects_expired_file() {
        // Expiry is 1 day since the Unix epoch: expired for as long as
        // this code has existed.
        let file = wrap_with_expiry(&[1, 2, 3], 1);
        let mut store = AlpStore::new();
        assert!(store.load(file, Instant::now()).is_err());
    }

    #[test]
    fn accepts_file_with_future_expiry() {
        let file = wrap_with_expiry(&[1, 2, 3], u16::MAX);
        let mut store = AlpStore::new();
        assert!(store.load(file, Instant::now()).is_ok());
    }
}
