//! swfdap-protocol — Debug Adapter Protocol wire types and framing.
//!
//! Holds the message structures the adapter receives and sends, the coded
//! error messages, and Content-Length framing over async streams.

pub mod error;
pub mod message;
pub mod protocol;
pub mod transport;

pub use error::ProtocolError;
pub use protocol::*;
pub use transport::{decode_message, encode_message, read_message, write_message};
