//! Type-erased request and response payloads.
//!
//! Middleware and codecs operate on `dyn Message`, so a single chain can carry
//! every request type a server exposes. Two families of types are messages:
//!
//! * anything that is `Serialize + DeserializeOwned` (blanket impl), and
//! * generated protobuf types wrapped in [`Proto`].
//!
//! Each message exposes a JSON view and a protobuf view. Serde types use
//! `google.protobuf.Value` as their protobuf view, so every serde payload,
//! [`StatusError`](tandem_core::StatusError) included, is representable under
//! both codecs. Numbers in that view are doubles: a payload holding an integer
//! beyond ±2^53 is rejected by the protobuf view instead of being rounded.

use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};

use prost_types::value::Kind;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::CodecError;

/// A payload that can travel through a codec.
pub trait Message: Any + Send + Sync {
    /// Returns the JSON view of this message.
    fn to_json_value(&self) -> Result<Value, CodecError>;

    /// Replaces this message with the one described by `value`.
    fn merge_json_value(&mut self, value: Value) -> Result<(), CodecError>;

    /// Encodes the protobuf view of this message.
    fn encode_protobuf(&self) -> Result<Vec<u8>, CodecError>;

    /// Merges protobuf-encoded bytes into this message.
    fn merge_protobuf(&mut self, bytes: &[u8]) -> Result<(), CodecError>;

    /// Returns the Rust type name, for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Upcasts to `Any` for downcasting by reference.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts to `Any` for downcasting by value.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl fmt::Debug for dyn Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl dyn Message {
    /// Reports whether the message is a `T`.
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcasts by reference.
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcasts by value.
    pub fn downcast<T: Message>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast::<T>().ok()
    }
}

/// Renders a message for logs: its JSON form when it has one, else its type.
pub fn describe(message: &dyn Message) -> String {
    match message.to_json_value() {
        Ok(value) => value.to_string(),
        Err(_) => message.type_name().to_string(),
    }
}

impl<T> Message for T
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn to_json_value(&self) -> Result<Value, CodecError> {
        serde_json::to_value(self).map_err(|e| CodecError::marshal("json", e))
    }

    fn merge_json_value(&mut self, value: Value) -> Result<(), CodecError> {
        *self = serde_json::from_value(value).map_err(|e| CodecError::unmarshal("json", e))?;
        Ok(())
    }

    fn encode_protobuf(&self) -> Result<Vec<u8>, CodecError> {
        let value = serde_json::to_value(self).map_err(|e| CodecError::marshal("proto", e))?;
        if !exact_as_double(&value) {
            return Err(CodecError::Unsupported {
                codec: "proto",
                type_name: std::any::type_name::<T>(),
            });
        }
        Ok(prost::Message::encode_to_vec(&json_to_proto(value)))
    }

    fn merge_protobuf(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let value = <prost_types::Value as prost::Message>::decode(bytes)
            .map_err(|e| CodecError::unmarshal("proto", e))?;
        *self = serde_json::from_value(proto_to_json(value))
            .map_err(|e| CodecError::unmarshal("proto", e))?;
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// Carrier for generated protobuf messages.
///
/// Protobuf-only types have no JSON view; the `json` codec rejects them with
/// [`CodecError::Unsupported`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Proto<M>(pub M);

impl<M> Proto<M> {
    /// Unwraps the inner message.
    pub fn into_inner(self) -> M {
        self.0
    }
}

impl<M> Deref for Proto<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.0
    }
}

impl<M> DerefMut for Proto<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.0
    }
}

impl<M> From<M> for Proto<M> {
    fn from(message: M) -> Self {
        Self(message)
    }
}

impl<M> Message for Proto<M>
where
    M: prost::Message + Default + 'static,
{
    fn to_json_value(&self) -> Result<Value, CodecError> {
        Err(CodecError::Unsupported {
            codec: "json",
            type_name: std::any::type_name::<M>(),
        })
    }

    fn merge_json_value(&mut self, _value: Value) -> Result<(), CodecError> {
        Err(CodecError::Unsupported {
            codec: "json",
            type_name: std::any::type_name::<M>(),
        })
    }

    fn encode_protobuf(&self) -> Result<Vec<u8>, CodecError> {
        Ok(prost::Message::encode_to_vec(&self.0))
    }

    fn merge_protobuf(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        prost::Message::merge(&mut self.0, bytes).map_err(|e| CodecError::unmarshal("proto", e))
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// Converts a JSON value into `google.protobuf.Value`.
pub fn json_to_proto(value: Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(b),
        Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or_default()),
        Value::String(s) => Kind::StringValue(s),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items.into_iter().map(json_to_proto).collect(),
        }),
        Value::Object(map) => Kind::StructValue(prost_types::Struct {
            fields: map
                .into_iter()
                .map(|(k, v)| (k, json_to_proto(v)))
                .collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

/// Converts `google.protobuf.Value` back into JSON.
///
/// Protobuf numbers are doubles; integral values come back as JSON integers so
/// they deserialize into integer fields.
pub fn proto_to_json(value: prost_types::Value) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::NumberValue(n)) => number(n),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(proto_to_json).collect())
        }
        Some(Kind::StructValue(st)) => Value::Object(
            st.fields
                .into_iter()
                .map(|(k, v)| (k, proto_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

/// Every integer up to this magnitude has an exact double.
const EXACT_INTEGER_LIMIT: u64 = 1 << 53;

/// Reports whether every number in `value` survives a trip through a double.
///
/// `google.protobuf.Value` has no integer kind, so larger integers would be
/// rounded silently.
fn exact_as_double(value: &Value) -> bool {
    match value {
        Value::Number(n) => match (n.as_u64(), n.as_i64()) {
            (Some(u), _) => u <= EXACT_INTEGER_LIMIT,
            (None, Some(i)) => i.unsigned_abs() <= EXACT_INTEGER_LIMIT,
            (None, None) => true,
        },
        Value::Array(items) => items.iter().all(exact_as_double),
        Value::Object(map) => map.values().all(exact_as_double),
        Value::Null | Value::Bool(_) | Value::String(_) => true,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number(n: f64) -> Value {
    const LIMIT: f64 = 9_007_199_254_740_992.0; // 2^53
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= LIMIT {
        if n < 0.0 {
            return Value::Number(Number::from(n as i64));
        }
        return Value::Number(Number::from(n as u64));
    }
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tandem_core::StatusError;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Book {
        id: u32,
        title: String,
        price: f64,
        tags: Vec<String>,
        delta: i64,
    }

    fn book() -> Book {
        Book {
            id: 7,
            title: "Dune".into(),
            price: 9.5,
            tags: vec!["sf".into()],
            delta: -3,
        }
    }

    #[test]
    fn test_serde_message_protobuf_view() {
        let bytes = book().encode_protobuf().unwrap();
        let mut decoded = Book {
            id: 0,
            title: String::new(),
            price: 0.0,
            tags: vec![],
            delta: 0,
        };
        decoded.merge_protobuf(&bytes).unwrap();
        assert_eq!(decoded, book());
    }

    #[test]
    fn test_status_error_is_a_message() {
        let err = StatusError::not_found("Missing", "gone").with_metadata("k", "v");
        let bytes = err.encode_protobuf().unwrap();
        let mut back = StatusError::default();
        back.merge_protobuf(&bytes).unwrap();
        assert_eq!(back, err);
        assert_eq!(back.message(), "gone");
        assert_eq!(back.metadata().get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_downcast() {
        let boxed: Box<dyn Message> = Box::new(book());
        assert!(boxed.is::<Book>());
        assert_eq!(boxed.downcast_ref::<Book>().map(|b| b.id), Some(7));

        assert!(!boxed.is::<String>());
        let back = boxed.downcast::<Book>().unwrap();
        assert_eq!(*back, book());

        let boxed: Box<dyn Message> = Box::new(book());
        assert!(boxed.downcast::<String>().is_none());
    }

    #[test]
    fn test_proto_wrapper_has_no_json_view() {
        let msg = Proto(prost_types::Duration {
            seconds: 3,
            nanos: 0,
        });
        assert!(matches!(
            msg.to_json_value(),
            Err(CodecError::Unsupported { codec: "json", .. })
        ));

        let bytes = msg.encode_protobuf().unwrap();
        let mut back = Proto::<prost_types::Duration>::default();
        back.merge_protobuf(&bytes).unwrap();
        assert_eq!(back.seconds, 3);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&"hi".to_string()), "\"hi\"");
        let proto = Proto(prost_types::Duration::default());
        assert!(describe(&proto).contains("Duration"));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u64,
        offset: i64,
        history: Vec<u64>,
    }

    #[test]
    fn test_protobuf_view_keeps_integers_up_to_two_pow_53() {
        let edge = Row {
            id: EXACT_INTEGER_LIMIT,
            offset: -(1_i64 << 53),
            history: vec![EXACT_INTEGER_LIMIT - 1],
        };
        let bytes = edge.encode_protobuf().unwrap();
        let mut back = Row {
            id: 0,
            offset: 0,
            history: vec![],
        };
        back.merge_protobuf(&bytes).unwrap();
        assert_eq!(back, edge);
    }

    #[test]
    fn test_protobuf_view_rejects_inexact_integers() {
        let rows = [
            Row {
                id: EXACT_INTEGER_LIMIT + 1,
                offset: 0,
                history: vec![],
            },
            Row {
                id: 0,
                offset: i64::MIN,
                history: vec![],
            },
            Row {
                id: 0,
                offset: 0,
                history: vec![1, u64::MAX],
            },
        ];
        for row in rows {
            assert!(matches!(
                row.encode_protobuf(),
                Err(CodecError::Unsupported { codec: "proto", .. })
            ));
            assert!(row.to_json_value().is_ok());
        }
    }

    #[test]
    fn test_integral_numbers_restored() {
        assert_eq!(number(3.0), Value::from(3_u64));
        assert_eq!(number(-4.0), Value::from(-4_i64));
        assert_eq!(number(0.25), Value::from(0.25));
        assert_eq!(number(f64::NAN), Value::Null);
    }
}
