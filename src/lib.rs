//! Lifecycle driver for u-blox GPS receivers over a byte-stream transport.
//!
//! Talks the UBX binary protocol (with a side channel for NMEA passthrough)
//! to take a receiver from power-off through cold/warm/hot start to a fix,
//! using AssistNow Offline aiding data and a degrading location hint to
//! speed up time-to-first-fix when one is available.
//!
//! The transport is injected ([`GpsTransport`]) rather than owned directly —
//! plug in `serialport::SerialPort`, a `TcpStream`, or a test double.

mod aiding;
mod config;
mod dispatch;
mod driver;
mod error;
mod events;
mod io;
mod location;
mod nmea;
mod state_machine;
mod timer;
mod ubx;

pub use aiding::hint::HintSnapshot;
pub use aiding::AlpStore;
pub use config::DriverConfig;
pub use driver::GpsDriver;
pub use error::{Error, Result};
pub use events::{Callback, EventMask, GpsEvent, SubscriberId};
pub use io::GpsTransport;
pub use location::FilteredFix;
pub use state_machine::{GpsState, TargetState};
pub use ubx::messages::{DynamicModel, NavPvt};
pub use ubx::UbxFrame;
