//! Request metadata and configuration types.

use crate::validate::StatusValidator;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// The deadline applied to a call when none is configured.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(15);

/// The HTTP methods a typed call can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Returns `true` for the methods that send a request body.
    pub fn carries_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    /// The method name as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// Metadata for an individual HTTP call.
///
/// This type contains everything needed to make a single call apart from the
/// body: method, absolute URL, headers, the per-call deadline, and an
/// optional status validator overriding [`RejectErrorStatus`](crate::validate::RejectErrorStatus).
#[derive(Clone)]
pub struct RequestMetadata {
    /// The HTTP method.
    pub method: HttpMethod,

    /// The absolute target URL.
    pub url: Url,

    /// Headers sent with the request. Nothing else is added.
    pub headers: HeaderMap,

    /// How long the call may take, body read included.
    pub deadline: Duration,

    /// Overrides the default status validator when set.
    pub validator: Option<Arc<dyn StatusValidator>>,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and URL.
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            deadline: DEFAULT_DEADLINE,
            validator: None,
        }
    }

    /// Creates a new `RequestMetadata`, parsing `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`](crate::Error::InvalidUrl) if the URL cannot be parsed.
    pub fn parse(method: HttpMethod, url: impl AsRef<str>) -> Result<Self, crate::Error> {
        Ok(Self::new(method, Url::parse(url.as_ref())?))
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Adds multiple headers to the request.
    pub fn with_headers<K, V>(
        self,
        headers: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, crate::Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .into_iter()
            .try_fold(self, |metadata, (name, value)| metadata.with_header(name, value))
    }

    /// Sets the per-call deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets the status validator for this call.
    pub fn with_validator(mut self, validator: impl StatusValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for RequestMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMetadata")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("deadline", &self.deadline)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_only_upserts_carry_body() {
        assert!(HttpMethod::Post.carries_body());
        assert!(HttpMethod::Put.carries_body());
        assert!(HttpMethod::Patch.carries_body());
        assert!(!HttpMethod::Get.carries_body());
        assert!(!HttpMethod::Delete.carries_body());
        assert_eq!(Method::from(HttpMethod::Patch), Method::PATCH);
    }

    #[test]
    fn test_headers() {
        let headers = HashMap::from([("Authorization", "Bearer abc"), ("X-Trace", "1")]);
        let metadata = RequestMetadata::parse(HttpMethod::Get, "http://localhost/users")
            .unwrap()
            .with_headers(headers)
            .unwrap();

        assert_eq!(metadata.headers.len(), 2);
        assert_eq!(metadata.headers["authorization"], "Bearer abc");
        assert_eq!(metadata.deadline, DEFAULT_DEADLINE);
    }

    #[test]
    fn test_invalid_header_is_configuration_error() {
        let err = RequestMetadata::parse(HttpMethod::Get, "http://localhost")
            .unwrap()
            .with_header("bad header", "value")
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn test_invalid_url() {
        let err = RequestMetadata::parse(HttpMethod::Get, "not a url").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidUrl);
    }
}
