//! The codec trait and the two stock codecs.

use std::fmt;

use bytes::Bytes;

use crate::{CodecError, Message};

/// Name of the JSON codec.
pub const JSON: &str = "json";

/// Name of the protobuf codec.
pub const PROTO: &str = "proto";

/// A named marshal/unmarshal pair for one content type.
pub trait Codec: Send + Sync + 'static {
    /// Content-subtype this codec is registered under, such as `"json"`.
    fn name(&self) -> &'static str;

    /// Serializes `message`.
    fn marshal(&self, message: &dyn Message) -> Result<Bytes, CodecError>;

    /// Parses `data` into `target`.
    fn unmarshal(&self, data: &[u8], target: &mut dyn Message) -> Result<(), CodecError>;

    /// Full content type written on responses encoded with this codec.
    fn content_type(&self) -> String {
        format!("application/{}", self.name())
    }
}

impl fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Codec").field(&self.name()).finish()
    }
}

/// JSON codec over `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        JSON
    }

    fn marshal(&self, message: &dyn Message) -> Result<Bytes, CodecError> {
        let value = message.to_json_value()?;
        serde_json::to_vec(&value)
            .map(Bytes::from)
            .map_err(|e| CodecError::marshal(JSON, e))
    }

    fn unmarshal(&self, data: &[u8], target: &mut dyn Message) -> Result<(), CodecError> {
        let value: serde_json::Value =
            serde_json::from_slice(data).map_err(|e| CodecError::unmarshal(JSON, e))?;
        target.merge_json_value(value)
    }
}

/// Protobuf codec over `prost`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtoCodec;

impl Codec for ProtoCodec {
    fn name(&self) -> &'static str {
        PROTO
    }

    fn marshal(&self, message: &dyn Message) -> Result<Bytes, CodecError> {
        message.encode_protobuf().map(Bytes::from)
    }

    fn unmarshal(&self, data: &[u8], target: &mut dyn Message) -> Result<(), CodecError> {
        target.merge_protobuf(data)
    }

    fn content_type(&self) -> String {
        "application/x-protobuf".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Proto;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        name: String,
        count: u32,
    }

    #[test]
    fn test_json_codec() {
        let codec = JsonCodec;
        let data = codec
            .marshal(&Greeting {
                name: "ada".into(),
                count: 2,
            })
            .unwrap();
        assert_eq!(&data[..], br#"{"count":2,"name":"ada"}"#);

        let mut out = Greeting::default();
        codec.unmarshal(&data, &mut out).unwrap();
        assert_eq!(out.name, "ada");
        assert_eq!(codec.content_type(), "application/json");
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let mut out = Greeting::default();
        let err = JsonCodec.unmarshal(b"{not json", &mut out).unwrap_err();
        assert!(matches!(err, CodecError::Unmarshal { codec: "json", .. }));

        let err = JsonCodec.unmarshal(br#"{"name": 5}"#, &mut out).unwrap_err();
        assert!(matches!(err, CodecError::Unmarshal { .. }));
    }

    #[test]
    fn test_json_codec_rejects_proto_only_messages() {
        let err = JsonCodec
            .marshal(&Proto(prost_types::Timestamp::default()))
            .unwrap_err();
        assert!(matches!(err, CodecError::Unsupported { .. }));
    }

    #[test]
    fn test_proto_codec_carries_both_families() {
        let codec = ProtoCodec;

        let ts = Proto(prost_types::Timestamp {
            seconds: 10,
            nanos: 5,
        });
        let data = codec.marshal(&ts).unwrap();
        let mut back = Proto::<prost_types::Timestamp>::default();
        codec.unmarshal(&data, &mut back).unwrap();
        assert_eq!(back, ts);

        let greeting = Greeting {
            name: "bo".into(),
            count: 1,
        };
        let data = codec.marshal(&greeting).unwrap();
        let mut out = Greeting::default();
        codec.unmarshal(&data, &mut out).unwrap();
        assert_eq!(out, greeting);
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Ledger {
        id: u64,
    }

    #[test]
    fn test_proto_codec_refuses_to_round_large_integers() {
        let big = Ledger {
            id: (1 << 53) + 1,
        };
        let err = ProtoCodec.marshal(&big).unwrap_err();
        assert!(matches!(err, CodecError::Unsupported { codec: "proto", .. }));

        let data = JsonCodec.marshal(&big).unwrap();
        let mut out = Ledger::default();
        JsonCodec.unmarshal(&data, &mut out).unwrap();
        assert_eq!(out, big);
    }

    #[test]
    fn test_proto_codec_rejects_garbage() {
        let mut back = Proto::<prost_types::Timestamp>::default();
        assert!(ProtoCodec.unmarshal(&[0xff, 0xff, 0xff], &mut back).is_err());
    }
}
