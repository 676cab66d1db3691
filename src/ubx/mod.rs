//! UBX binary protocol: checksum, frame encode/decode, byte-driven parser,
//! and typed message payloads.

pub mod checksum;
pub mod frame;
pub mod messages;
pub mod parser;

pub use frame::UbxFrame;
pub use parser::Parser;
