use std::fmt;
use std::io;

/// Error taxonomy for the driver.
///
/// The state machine never raises these synchronously to the caller for
/// protocol-level failures (those become [`crate::events::GpsEvent`]s
/// instead); `Error` is reserved for fatal I/O and malformed data the
/// caller must react to directly.
#[derive(Debug)]
pub enum Error {
    /// `EAGAIN`, a short read or write that was retried and still failed.
    TransientIo(io::Error),
    /// Receiver rejected a configuration message with ACK-NAK.
    ProtocolNak { class: u8, id: u8 },
    /// No ACK-ACK/ACK-NAK arrived within the dispatcher timeout.
    TimeoutAck { class: u8, id: u8 },
    /// Target state was not reached before the transition timeout expired.
    TimeoutTarget,
    /// An ALP file failed its validity check.
    AlpInvalid(String),
    /// The file descriptor is gone or hardware is unresponsive.
    FatalIo(io::Error),
    /// A UBX frame failed checksum validation.
    Checksum,
    /// Generic I/O passthrough for errors outside the taxonomy above.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TransientIo(e) => write!(f, "transient I/O error: {e}"),
            Error::ProtocolNak { class, id } => {
                write!(f, "receiver NAK'd message class={class:#04x} id={id:#04x}")
            }
            Error::TimeoutAck { class, id } => write!(
                f,
                "timed out waiting for ACK to class={class:#04x} id={id:#04x}"
            ),
            Error::TimeoutTarget => write!(f, "target state transition timed out"),
            Error::AlpInvalid(reason) => write!(f, "ALP file invalid: {reason}"),
            Error::FatalIo(e) => write!(f, "fatal I/O error: {e}"),
            Error::Checksum => write!(f, "UBX checksum mismatch"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::TransientIo(e) | Error::FatalIo(e) | Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
