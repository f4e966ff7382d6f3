//! Error types for typed fetch calls.
//!
//! Every failure the library can report is a variant of [`Error`]. Variants
//! carry context (offending key, byte offset, configured limit, request URL)
//! while [`Error::kind`] exposes a stable [`ErrorKind`] so callers can match
//! on what went wrong without comparing strings.

use crate::{codec, metadata::DEFAULT_DEADLINE};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// The main error type for typed fetch calls.
///
/// # Examples
///
/// ```no_run
/// use typed_fetch::{Client, ErrorKind};
///
/// # async fn example() -> Result<(), typed_fetch::Error> {
/// let client = Client::builder().build()?;
///
/// match client.get::<serde_json::Value>("https://api.example.com/users/7").await {
///     Ok(envelope) => println!("Success: {:?}", envelope.body),
///     Err(err) if err.kind() == ErrorKind::Timeout => eprintln!("too slow: {}", err),
///     Err(err) => {
///         let description = typed_fetch::describe(&err).await;
///         eprintln!("HTTP {}: {}", description.status_code, description.error_message);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The per-call deadline fired, or the parent token was cancelled,
    /// before the call completed.
    #[error("service at {url:?} timeout occurred")]
    Timeout {
        /// The URL of the request that timed out
        url: String,
    },

    /// The request value could not be serialized to JSON.
    #[error("failed to marshal the value to JSON: {0}")]
    MarshalFailed(String),

    /// A request body received server-side could not be decoded.
    ///
    /// The strict decode failure is kept as the error source.
    #[error("bad request: {0}")]
    BadRequest(#[source] Box<Error>),

    /// An observable item did not hold a value of the requested type.
    #[error("value is not of the expected type")]
    WrongCastType,

    /// An observable item carried neither a value nor an error.
    #[error("item has no value and no error")]
    EmptyItem,

    /// A required value was absent.
    #[error("nil value provided")]
    NilValue,

    /// The body is not syntactically valid JSON.
    #[error("badly-formed JSON in the body{}", at_offset(.offset))]
    MalformedJson {
        /// Byte offset of the syntax error, when known
        offset: Option<usize>,
    },

    /// A JSON value has the wrong type for its destination.
    #[error("incorrect JSON type in the body{}", wrong_type_location(.field, .offset))]
    WrongJsonType {
        /// Path of the mismatched field, e.g. `owner.age`, when not at the root
        field: Option<String>,
        /// Byte offset of the mismatched value
        offset: usize,
    },

    /// The body was empty.
    #[error("body must not be empty")]
    EmptyBody,

    /// The body contained a key the destination type does not declare.
    #[error("unknown key in the body {key}")]
    UnknownKey {
        /// The offending key
        key: String,
    },

    /// The body exceeded the configured size limit.
    #[error("body size limit exceeded. Max size is {limit} bytes")]
    BodyTooLarge {
        /// The configured limit in bytes
        limit: usize,
    },

    /// The body held more than one top-level JSON value.
    #[error("body must contain a single JSON value")]
    MultipleJsonValues,

    /// Any other decode failure, such as a missing required field.
    #[error("failed to decode the body: {0}")]
    Decode(String),

    /// The response status failed the status validator.
    ///
    /// The captured response can be inspected through [`InvalidStatus`].
    #[error("invalid HTTP status {}", .0.status())]
    InvalidHttpStatus(InvalidStatus),

    /// A network-level error reported by the transport.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

fn at_offset(offset: &Option<usize>) -> String {
    offset
        .map(|offset| format!(": at character {}", offset))
        .unwrap_or_default()
}

fn wrong_type_location(field: &Option<String>, offset: &usize) -> String {
    match field {
        Some(field) => format!(" for field {:?}", field),
        None => format!(" at character {}", offset),
    }
}

/// The kind of an [`Error`], stable across any context the error carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Timeout`].
    Timeout,
    /// See [`Error::MarshalFailed`].
    MarshalFailed,
    /// See [`Error::BadRequest`].
    BadRequest,
    /// See [`Error::WrongCastType`].
    WrongCastType,
    /// See [`Error::EmptyItem`].
    EmptyItem,
    /// See [`Error::NilValue`].
    NilValue,
    /// See [`Error::MalformedJson`].
    MalformedJson,
    /// See [`Error::WrongJsonType`].
    WrongJsonType,
    /// See [`Error::EmptyBody`].
    EmptyBody,
    /// See [`Error::UnknownKey`].
    UnknownKey,
    /// See [`Error::BodyTooLarge`].
    BodyTooLarge,
    /// See [`Error::MultipleJsonValues`].
    MultipleJsonValues,
    /// See [`Error::Decode`].
    Decode,
    /// See [`Error::InvalidHttpStatus`].
    InvalidHttpStatus,
    /// See [`Error::Network`].
    Network,
    /// See [`Error::ConfigurationError`].
    Configuration,
    /// See [`Error::InvalidUrl`].
    InvalidUrl,
}

impl Error {
    /// Returns the kind of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use typed_fetch::{Error, ErrorKind};
    ///
    /// let err = Error::UnknownKey { key: "\"nickname\"".to_string() };
    /// assert_eq!(err.kind(), ErrorKind::UnknownKey);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::MarshalFailed(_) => ErrorKind::MarshalFailed,
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::WrongCastType => ErrorKind::WrongCastType,
            Error::EmptyItem => ErrorKind::EmptyItem,
            Error::NilValue => ErrorKind::NilValue,
            Error::MalformedJson { .. } => ErrorKind::MalformedJson,
            Error::WrongJsonType { .. } => ErrorKind::WrongJsonType,
            Error::EmptyBody => ErrorKind::EmptyBody,
            Error::UnknownKey { .. } => ErrorKind::UnknownKey,
            Error::BodyTooLarge { .. } => ErrorKind::BodyTooLarge,
            Error::MultipleJsonValues => ErrorKind::MultipleJsonValues,
            Error::Decode(_) => ErrorKind::Decode,
            Error::InvalidHttpStatus(_) => ErrorKind::InvalidHttpStatus,
            Error::Network(_) => ErrorKind::Network,
            Error::ConfigurationError(_) => ErrorKind::Configuration,
            Error::InvalidUrl(_) => ErrorKind::InvalidUrl,
        }
    }

    /// Returns `true` if the per-call deadline fired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::InvalidHttpStatus(invalid) => Some(invalid.status()),
            Error::Network(err) => err.status(),
            _ => None,
        }
    }

    /// Returns the captured response if this is an invalid-status error.
    pub fn invalid_status(&self) -> Option<&InvalidStatus> {
        match self {
            Error::InvalidHttpStatus(invalid) => Some(invalid),
            _ => None,
        }
    }
}

/// A specialized `Result` type for typed fetch calls.
pub type Result<T> = std::result::Result<T, Error>;

/// A response whose status code failed validation.
///
/// Status, headers and URL are available immediately. The body is only read
/// on demand, at most once: the first call to [`take_body`](Self::take_body)
/// or [`describe`](Self::describe) consumes it and later calls see an empty
/// body.
#[derive(Debug)]
pub struct InvalidStatus {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    read_timeout: Duration,
    response: Mutex<Option<reqwest::Response>>,
}

impl InvalidStatus {
    /// Captures a failed response without reading its body.
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            url: response.url().clone(),
            read_timeout: DEFAULT_DEADLINE,
            response: Mutex::new(Some(response)),
        }
    }

    /// Bounds the later body read by `read_timeout`.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// The status code of the failed response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The headers of the failed response.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The final URL of the failed response.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Reads the captured body.
    ///
    /// Only the first call returns the body. The read is bounded by the read
    /// timeout, which defaults to the deadline of the failed call; read
    /// errors, an expired read and later calls yield empty bytes.
    pub async fn take_body(&self) -> Bytes {
        let response = self.response.lock().await.take();
        let Some(response) = response else {
            return Bytes::new();
        };

        match tokio::time::timeout(self.read_timeout, response.bytes()).await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, url = %self.url, "Failed to read error response body");
                Bytes::new()
            }
            Err(_) => {
                tracing::warn!(
                    url = %self.url,
                    timeout_ms = self.read_timeout.as_millis() as u64,
                    "Timed out reading error response body"
                );
                Bytes::new()
            }
        }
    }

    /// Builds a structured description of the failed response.
    ///
    /// This consumes the captured body. Any failure yields
    /// [`ErrorDescription::default`].
    pub async fn describe(&self) -> ErrorDescription {
        let body = self.take_body().await;
        let description = ErrorDescription {
            status_code: self.status.as_u16(),
            status: status_text(self.status),
            error_message: String::from_utf8_lossy(&body).into_owned(),
        };

        // round trip through the strict codec before handing it out
        let encoded = match codec::encode(&description) {
            Ok(encoded) => encoded,
            Err(_) => return ErrorDescription::default(),
        };
        codec::decode(&encoded).unwrap_or_default()
    }
}

fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_str(), reason),
        None => status.as_str().to_string(),
    }
}

/// A structured description of a failed response, for logging and telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorDescription {
    /// The numeric status code, e.g. `404`.
    #[serde(skip_serializing_if = "is_zero")]
    pub status_code: u16,
    /// The status line text, e.g. `"404 Not Found"`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    /// The body the server sent with the failed response.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

fn is_zero(value: &u16) -> bool {
    *value == 0
}

/// Describes `error` if it is an invalid-status error.
///
/// Every other error kind yields the empty [`ErrorDescription`]. The captured
/// body is consumed, so a second call on the same error describes an empty
/// message.
pub async fn describe(error: &Error) -> ErrorDescription {
    match error {
        Error::InvalidHttpStatus(invalid) => invalid.describe().await,
        _ => ErrorDescription::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(status: u16, body: &'static str) -> InvalidStatus {
        let response = http::Response::builder()
            .status(status)
            .body(body)
            .unwrap();
        InvalidStatus::new(reqwest::Response::from(response))
    }

    #[tokio::test]
    async fn test_describe_not_found() {
        let err = Error::InvalidHttpStatus(invalid(404, r#"{"error":"user not found"}"#));

        let description = describe(&err).await;

        assert_eq!(description.status_code, 404);
        assert_eq!(description.status, "404 Not Found");
        assert_eq!(description.error_message, r#"{"error":"user not found"}"#);
    }

    #[tokio::test]
    async fn test_body_is_read_once() {
        let invalid = invalid(500, "boom");

        assert_eq!(invalid.take_body().await, Bytes::from_static(b"boom"));
        assert!(invalid.take_body().await.is_empty());

        let description = invalid.describe().await;
        assert_eq!(description.status_code, 500);
        assert!(description.error_message.is_empty());
    }

    #[tokio::test]
    async fn test_describe_other_errors_is_empty() {
        assert_eq!(describe(&Error::EmptyBody).await, ErrorDescription::default());
        assert_eq!(
            describe(&Error::Timeout {
                url: "http://localhost".to_string()
            })
            .await,
            ErrorDescription::default()
        );
    }

    #[test]
    fn test_kind_sees_through_context() {
        let err = Error::MalformedJson { offset: Some(12) };
        assert_eq!(err.kind(), ErrorKind::MalformedJson);
        assert_eq!(err.to_string(), "badly-formed JSON in the body: at character 12");

        let err = Error::BadRequest(Box::new(Error::EmptyBody));
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "body must not be empty");
    }

    #[test]
    fn test_wrong_type_message() {
        let err = Error::WrongJsonType {
            field: Some("age".to_string()),
            offset: 13,
        };
        assert_eq!(err.to_string(), "incorrect JSON type in the body for field \"age\"");

        let err = Error::WrongJsonType {
            field: None,
            offset: 7,
        };
        assert_eq!(err.to_string(), "incorrect JSON type in the body at character 7");
    }

    #[test]
    fn test_status() {
        let err = Error::InvalidHttpStatus(invalid(503, ""));
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!err.is_timeout());
        assert_eq!(Error::NilValue.status(), None);
    }
}
