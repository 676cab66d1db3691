//! NMEA line assembler (C3): accumulates bytes into CR/LF-terminated lines
//! for external logging. The driver does not parse NMEA content — it only
//! assembles lines and logs them, per spec.md's Non-goals.

/// Growable line buffer with a capacity ceiling; overlong lines are
/// truncated and a warning logged, then re-synchronized at the next
/// terminator.
pub struct NmeaAssembler {
    line: Vec<u8>,
    capacity: usize,
    overflowed: bool,
}

impl NmeaAssembler {
    pub fn new(capacity: usize) -> Self {
        NmeaAssembler {
            line: Vec::with_capacity(capacity.min(256)),
            capacity,
            overflowed: false,
        }
    }

    /// Feed one byte. Returns `Some(line)` (without the terminator) when a
    /// `\n` completes a line.
    pub fn feed_byte(&mut self, byte: u8) -> Option<String> {
        if byte == b'\n' {
            let mut line = std::mem::take(&mut self.line);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.overflowed = false;
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
        if self.line.len() >= self.capacity {
            if !self.overflowed {
                log::warn!("NMEA line exceeded {} byte buffer, truncating", self.capacity);
                self.overflowed = true;
            }
            return None;
        }
        self.line.push(byte);
        None
    }

    /// Feed a chunk of bytes, returning every completed line in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        bytes.iter().filter_map(|&b| self.feed_byte(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_single_line() {
        let mut a = NmeaAssembler::new(82);
        let lines = a.feed(b"$GPGGA,test*00\r\n");
        assert_eq!(lines, vec!["$GPGGA,test*00".to_string()]);
    }

    #[test]
    fn handles_bare_lf_without_cr() {
        let mut a = NmeaAssembler::new(82);
        let lines = a.feed(b"$GPGGA,x*00\n");
        assert_eq!(lines, vec!["$GPGGA,x*00".to_string()]);
    }

    #[test]
    fn multiple_lines_in_one_chunk() {
        let mut a = NmeaAssembler::new(82);
        let lines = a.feed(b"$A*1\r\n$B*2\r\n");
        assert_eq!(lines, vec!["$A*1".to_string(), "$B*2".to_string()]);
    }

    #[test]
    fn overlong_line_is_truncated_and_resyncs() {
        let mut a = NmeaAssembler::new(4);
        let lines = a.feed(b"12345678\r\n$OK\r\n");
        assert_eq!(lines, vec!["1234".to_string(), "$OK".to_string()]);
    }
}
