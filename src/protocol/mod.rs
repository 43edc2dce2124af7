//! Line-oriented chat protocol
//!
//! This module provides:
//! - Identity, channel and recipient name types
//! - Streaming frame decoding with explicit-length message bodies
//! - Encoding of server replies and deliveries

pub mod codec;
pub mod constants;
pub mod error;
pub mod frame;
pub mod name;

pub use codec::{
    decode_frame, encode_channel_message, encode_direct_message, encode_error, encode_frame,
    encode_ok, FrameDecoder,
};
pub use error::ProtocolError;
pub use frame::{Frame, Verb};
pub use name::{ChannelName, Identity, Recipient};
