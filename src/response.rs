//! Envelope pairing a decoded body with raw response details.
//!
//! The [`Envelope`] type carries the decoded body along with the status,
//! headers, final URL and raw body bytes of the response it came from.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::time::Duration;
use url::Url;

/// The result of a completed typed call.
///
/// `body` is `None` when the server answered `204 No Content` or the
/// response type declares that it carries no body.
///
/// # Examples
///
/// ```no_run
/// use serde::Deserialize;
/// use typed_fetch::{Client, ResponseBody};
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// impl ResponseBody for User {}
///
/// # async fn example() -> Result<(), typed_fetch::Error> {
/// let client = Client::builder().build()?;
///
/// let envelope = client.get::<User>("https://api.example.com/users/123").await?;
///
/// println!("Status: {}", envelope.status);
/// if let Some(user) = &envelope.body {
///     println!("User: {}", user.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    /// The decoded response body.
    pub body: Option<T>,

    /// The raw response body bytes.
    pub raw_body: Bytes,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The final URL of the response, after redirects.
    pub url: Url,

    /// Time from dispatch until the body was decoded.
    pub latency: Duration,
}

impl<T> Envelope<T> {
    /// Creates a new `Envelope`.
    pub fn new(
        body: Option<T>,
        raw_body: Bytes,
        status: StatusCode,
        headers: HeaderMap,
        url: Url,
        latency: Duration,
    ) -> Self {
        Self {
            body,
            raw_body,
            status,
            headers,
            url,
            latency,
        }
    }

    /// Maps the body to a different type, preserving the metadata.
    pub fn map<U, F>(self, f: F) -> Envelope<U>
    where
        F: FnOnce(T) -> U,
    {
        Envelope {
            body: self.body.map(f),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            url: self.url,
            latency: self.latency,
        }
    }

    /// Returns `true` if the server answered `204 No Content`.
    pub fn is_no_content(&self) -> bool {
        self.status == StatusCode::NO_CONTENT
    }

    /// Consumes the envelope, returning the decoded body.
    pub fn into_body(self) -> Option<T> {
        self.body
    }

    /// Returns a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use typed_fetch::Envelope;
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let envelope = Envelope::<()>::new(
    ///     None,
    ///     bytes::Bytes::new(),
    ///     StatusCode::NO_CONTENT,
    ///     headers,
    ///     "http://localhost/".parse().unwrap(),
    ///     Duration::from_millis(3),
    /// );
    ///
    /// assert_eq!(envelope.header("content-type"), Some("application/json"));
    /// assert!(envelope.is_no_content());
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_metadata() {
        let envelope = Envelope::new(
            Some(41),
            Bytes::from_static(b"41"),
            StatusCode::OK,
            HeaderMap::new(),
            Url::parse("http://localhost/answer").unwrap(),
            Duration::from_millis(5),
        );

        let mapped = envelope.map(|n| n + 1);

        assert_eq!(mapped.body, Some(42));
        assert_eq!(mapped.raw_body, Bytes::from_static(b"41"));
        assert_eq!(mapped.status, StatusCode::OK);
        assert!(!mapped.is_no_content());
        assert_eq!(mapped.into_body(), Some(42));
    }
}
