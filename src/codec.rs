//! Strict JSON encoding and decoding.
//!
//! Decoding accepts exactly one top-level JSON value and maps every serde
//! failure onto a specific [`Error`] variant. A key the destination type does
//! not declare is [`Error::UnknownKey`], whether or not the type is declared
//! with `#[serde(deny_unknown_fields)]`.

use crate::{Error, Result};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::error::Category;

/// Serializes `value` to a JSON body.
///
/// # Errors
///
/// Returns [`Error::MarshalFailed`] with the serializer's message when the
/// value cannot be represented as JSON.
pub fn encode<T>(value: &T) -> Result<Bytes>
where
    T: Serialize + ?Sized,
{
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| Error::MarshalFailed(e.to_string()))
}

/// Serializes an optional value, treating an absent value as [`Error::NilValue`].
pub fn to_body<T>(value: Option<&T>) -> Result<Bytes>
where
    T: Serialize,
{
    encode(value.ok_or(Error::NilValue)?)
}

/// Decodes a single JSON value from `input`.
///
/// # Examples
///
/// ```
/// use serde::Deserialize;
/// use typed_fetch::{codec, ErrorKind};
///
/// #[derive(Debug, Deserialize)]
/// struct User {
///     name: String,
/// }
///
/// let user: User = codec::decode(br#"{"name": "Marco"}"#).unwrap();
/// assert_eq!(user.name, "Marco");
///
/// let err = codec::decode::<User>(br#"{"name": "Marco""#).unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::MalformedJson);
/// ```
pub fn decode<T>(input: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    decode_with_limit(input, None)
}

/// Decodes a single JSON value from `input`, rejecting bodies larger than `limit` bytes.
pub fn decode_with_limit<T>(input: &[u8], limit: Option<usize>) -> Result<T>
where
    T: DeserializeOwned,
{
    if let Some(limit) = limit {
        if input.len() > limit {
            return Err(Error::BodyTooLarge { limit });
        }
    }

    let mut deserializer = serde_json::Deserializer::from_slice(input);
    let mut ignored = None;
    let mut track = |path: serde_ignored::Path<'_>| {
        if ignored.is_none() {
            ignored = Some(path.to_string());
        }
    };
    let tracked = serde_ignored::Deserializer::new(&mut deserializer, &mut track);
    let value: T = serde_path_to_error::deserialize(tracked).map_err(|e| classify(input, e))?;

    if let Some(key) = ignored {
        return Err(Error::UnknownKey {
            key: format!("{:?}", key),
        });
    }

    deserializer
        .end()
        .map_err(|_| Error::MultipleJsonValues)?;

    Ok(value)
}

/// Decodes a request body received server-side.
///
/// An absent body is [`Error::NilValue`]. Any decode failure is wrapped in
/// [`Error::BadRequest`] so a handler can answer with `400 Bad Request`.
pub fn decode_request<T>(body: Option<&[u8]>, limit: Option<usize>) -> Result<T>
where
    T: DeserializeOwned,
{
    let body = body.ok_or(Error::NilValue)?;
    decode_with_limit(body, limit).map_err(|e| Error::BadRequest(Box::new(e)))
}

fn classify(input: &[u8], err: serde_path_to_error::Error<serde_json::Error>) -> Error {
    let path = err.path();
    let field = path.iter().next().is_some().then(|| path.to_string());
    let err = err.into_inner();

    match err.classify() {
        Category::Syntax => Error::MalformedJson {
            offset: Some(byte_offset(input, err.line(), err.column())),
        },
        Category::Eof if input.iter().all(u8::is_ascii_whitespace) => Error::EmptyBody,
        Category::Eof => Error::MalformedJson { offset: None },
        Category::Data => classify_data(input, field, err),
        Category::Io => Error::Decode(err.to_string()),
    }
}

fn classify_data(input: &[u8], field: Option<String>, err: serde_json::Error) -> Error {
    let message = err.to_string();

    if let Some(rest) = message.strip_prefix("unknown field `") {
        let key = rest.split('`').next().unwrap_or_default();
        return Error::UnknownKey {
            key: format!("{:?}", key),
        };
    }

    if message.starts_with("invalid type")
        || message.starts_with("invalid value")
        || message.starts_with("invalid length")
    {
        return Error::WrongJsonType {
            field,
            offset: byte_offset(input, err.line(), err.column()),
        };
    }

    tracing::error!(error = %message, "Unexpected JSON decode failure");
    Error::Decode(message)
}

/// Converts serde_json's 1-based line/column position to a byte offset.
fn byte_offset(input: &[u8], line: usize, column: usize) -> usize {
    let preceding: usize = input
        .split(|b| *b == b'\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    (preceding + column).min(input.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct User {
        name: String,
        #[serde(default)]
        age: u32,
    }

    #[test]
    fn test_decode_valid() {
        let user: User = decode(br#"{"name": "Marco", "age": 31}"#).unwrap();
        assert_eq!(
            user,
            User {
                name: "Marco".to_string(),
                age: 31
            }
        );
    }

    #[test]
    fn test_truncated_is_malformed() {
        let err = decode::<User>(br#"{"name": "Marco""#).unwrap_err();
        assert!(matches!(err, Error::MalformedJson { offset: None }));
    }

    #[test]
    fn test_syntax_error_carries_offset() {
        let err = decode::<User>(br#"{"name": Marco}"#).unwrap_err();
        match err {
            Error::MalformedJson { offset: Some(offset) } => assert!(offset > 0),
            other => panic!("Expected MalformedJson with offset, got {:?}", other),
        }
    }

    #[derive(Debug, Deserialize)]
    struct Plain {
        name: String,
    }

    #[derive(Debug, Deserialize)]
    struct Nested {
        owner: Plain,
    }

    #[test]
    fn test_wrong_type() {
        let err = decode::<User>(br#"{"name": "Marco", "age": "old"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongJsonType);
    }

    #[test]
    fn test_wrong_type_names_field() {
        let err = decode::<User>(br#"{"age": "old"}"#).unwrap_err();
        match &err {
            Error::WrongJsonType { field, offset } => {
                assert_eq!(field.as_deref(), Some("age"));
                assert!(*offset > 0);
            }
            other => panic!("Expected WrongJsonType, got {:?}", other),
        }
        assert!(err.to_string().contains("\"age\""));

        let err = decode::<Nested>(br#"{"owner": {"name": 7}}"#).unwrap_err();
        assert!(matches!(
            err,
            Error::WrongJsonType { field: Some(ref field), .. } if field == "owner.name"
        ));
    }

    #[test]
    fn test_wrong_type_at_root_has_no_field() {
        let err = decode::<User>(br#""Marco""#).unwrap_err();
        assert!(matches!(err, Error::WrongJsonType { field: None, .. }));
    }

    #[test]
    fn test_unknown_key_without_deny_attribute() {
        let err = decode::<Plain>(br#"{"name": "Marco", "admin": true}"#).unwrap_err();
        match err {
            Error::UnknownKey { key } => assert_eq!(key, "\"admin\""),
            other => panic!("Expected UnknownKey, got {:?}", other),
        }

        let plain: Plain = decode(br#"{"name": "Marco"}"#).unwrap();
        assert_eq!(plain.name, "Marco");
    }

    #[test]
    fn test_nested_unknown_key() {
        let err = decode::<Nested>(br#"{"owner": {"name": "Marco", "role": "admin"}}"#).unwrap_err();
        match err {
            Error::UnknownKey { key } => assert_eq!(key, "\"owner.role\""),
            other => panic!("Expected UnknownKey, got {:?}", other),
        }
    }

    #[test]
    fn test_value_destination_accepts_any_key() {
        let value: serde_json::Value = decode(br#"{"anything": [1, 2]}"#).unwrap();
        assert_eq!(value["anything"][1], 2);
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(decode::<User>(b"").unwrap_err().kind(), ErrorKind::EmptyBody);
        assert_eq!(decode::<User>(b"  \n").unwrap_err().kind(), ErrorKind::EmptyBody);
    }

    #[test]
    fn test_unknown_key() {
        let err = decode::<User>(br#"{"name": "Marco", "nickname": "M"}"#).unwrap_err();
        match err {
            Error::UnknownKey { key } => assert_eq!(key, "\"nickname\""),
            other => panic!("Expected UnknownKey, got {:?}", other),
        }
    }

    #[test]
    fn test_body_too_large() {
        let err = decode_with_limit::<User>(br#"{"name": "Marco"}"#, Some(4)).unwrap_err();
        assert!(matches!(err, Error::BodyTooLarge { limit: 4 }));
    }

    #[test]
    fn test_multiple_values() {
        let err = decode::<User>(br#"{"name": "a"}{"name": "b"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MultipleJsonValues);
    }

    #[test]
    fn test_missing_field_is_decode_error() {
        let err = decode::<User>(br#"{"age": 3}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_encode_failure_is_marshal_failed() {
        let mut map = HashMap::new();
        map.insert((1u8, 2u8), "tuple keys are not JSON keys");

        let err = encode(&map).unwrap_err();
        match err {
            Error::MarshalFailed(message) => assert!(message.contains("key must be a string")),
            other => panic!("Expected MarshalFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_to_body_absent_is_nil_value() {
        let err = to_body::<User>(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NilValue);
    }

    #[test]
    fn test_decode_request() {
        let user: User = decode_request(Some(br#"{"name": "Adam"}"#.as_slice()), None).unwrap();
        assert_eq!(user.name, "Adam");

        let err = decode_request::<User>(None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NilValue);

        let err = decode_request::<User>(Some(b"{}{}".as_slice()), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        match err {
            Error::BadRequest(inner) => assert_eq!(inner.kind(), ErrorKind::Decode),
            other => panic!("Expected BadRequest, got {:?}", other),
        }
    }
}
