//! # Tandem Encoding
//!
//! Payload abstraction and codec registry for tandem transports.
//!
//! A request or response travels through middleware as a `Box<dyn Message>`.
//! At the wire, a [`Codec`] chosen by content type turns it into bytes and
//! back. The `json` and `proto` codecs are registered by default.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tandem_encoding::global;
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Ping { seq: u32 }
//!
//! let codec = global().for_content_type(Some("application/json")).unwrap();
//! let bytes = codec.marshal(&Ping { seq: 3 }).unwrap();
//!
//! let mut ping = Ping::default();
//! codec.unmarshal(&bytes, &mut ping).unwrap();
//! assert_eq!(ping.seq, 3);
//! ```

mod codec;
mod error;
mod message;
mod registry;

pub use codec::{Codec, JsonCodec, ProtoCodec, JSON, PROTO};
pub use error::CodecError;
pub use message::{describe, json_to_proto, proto_to_json, Message, Proto};
pub use registry::{codec_name, content_subtype, global, install, lookup, CodecRegistry};
