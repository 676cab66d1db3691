//! Byte-stream I/O (C1): non-blocking read drain and full-write retry loop
//! over an injected transport. The transport itself — opening and
//! configuring the serial port — is the caller's responsibility.

use std::io::{self, ErrorKind, Read, Write};

use crate::error::{Error, Result};

/// Anything that behaves like a non-blocking byte stream. A caller
/// typically implements this over `serialport::SerialPort` or a plain
/// `TcpStream`/file for testing.
pub trait GpsTransport: Read + Write {}
impl<T: Read + Write> GpsTransport for T {}

/// Drains every readable byte from `transport` in one pass, appending them
/// to `buf`. Returns the number of bytes read. A `WouldBlock`/`TimedOut`
/// error (the two spellings of "no data ready right now" used by
/// non-blocking readers across the ecosystem) is treated as "drained
/// nothing", not as a failure.
pub fn drain_readable<T: Read + ?Sized>(transport: &mut T, buf: &mut Vec<u8>) -> Result<usize> {
    let mut chunk = [0u8; 1240];
    let mut total = 0;
    loop {
        match transport.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                total += n;
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                break;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::FatalIo(e)),
        }
    }
    Ok(total)
}

/// Writes the whole buffer, retrying short writes and tolerating `EINTR`.
pub fn write_all_retrying<T: Write + ?Sized>(transport: &mut T, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        match transport.write(data) {
            Ok(0) => {
                return Err(Error::FatalIo(io::Error::new(
                    ErrorKind::WriteZero,
                    "transport accepted zero bytes",
                )))
            }
            Ok(n) => data = &data[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
            Err(e) => return Err(Error::FatalIo(e)),
        }
    }
    Ok(())
}
