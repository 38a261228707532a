//! hub-protocol
//!
//! Wire-level encoding/decoding for the hub.
//!
//! This crate is responsible for turning logical hub messages
//! (`hub_core::InboundMessage` / `OutboundFrame`) into JSON text and
//! back again.
//!
//! - [`wire_types`] : serde shapes of every frame on the wire
//! - [`json_codec`] : encode / decode functions

pub mod wire_types;
pub mod json_codec;

pub use json_codec::{
    DirectFormat,
    FrameError,
    decode_inbound,
    decode_inbound_slice,
    decode_outbound,
    encode_inbound,
    encode_outbound,
};
