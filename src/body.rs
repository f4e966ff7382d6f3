//! Capability traits for request and response bodies.

use crate::{codec, Error, Result};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A type that can be sent as a request body.
///
/// Bodies are JSON encoded unless [`form_fields`](Self::form_fields) returns
/// key/value pairs, in which case they are sent URL-encoded instead.
///
/// # Examples
///
/// ```
/// use serde::Serialize;
/// use typed_fetch::RequestBody;
///
/// #[derive(Serialize)]
/// struct Login {
///     user: String,
///     password: String,
/// }
///
/// impl RequestBody for Login {
///     fn form_fields(&self) -> Option<Vec<(String, String)>> {
///         Some(vec![
///             ("user".to_string(), self.user.clone()),
///             ("password".to_string(), self.password.clone()),
///         ])
///     }
/// }
/// ```
pub trait RequestBody: Serialize + Send + Sync {
    /// Key/value pairs to send URL-encoded instead of JSON.
    fn form_fields(&self) -> Option<Vec<(String, String)>> {
        None
    }
}

/// A type that can be decoded from a response body.
///
/// Decoding is strict: a key the type does not declare is rejected as
/// [`Error::UnknownKey`].
pub trait ResponseBody: DeserializeOwned + Send + 'static {
    /// Whether responses of this type carry a body worth decoding.
    const HAS_BODY: bool = true;
}

/// Request type for endpoints that take no body.
///
/// It has no values, so the only request that can be passed is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoRequest {}

impl RequestBody for NoRequest {}

/// Response type for endpoints that send no body.
///
/// The response body, if any, is never read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct NoResponse;

impl ResponseBody for NoResponse {
    const HAS_BODY: bool = false;
}

impl ResponseBody for serde_json::Value {}

/// Builds the outgoing body for `request`.
///
/// Form fields take precedence over JSON. An absent request yields no body.
pub(crate) fn build_body<Req>(request: Option<&Req>) -> Result<Option<Bytes>>
where
    Req: RequestBody,
{
    if let Some(fields) = request.and_then(|r| r.form_fields()) {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        return Ok(Some(Bytes::from(encoded)));
    }

    match codec::to_body(request) {
        Ok(body) => Ok(Some(body)),
        Err(Error::NilValue) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct CreateUser {
        name: String,
        email: String,
    }

    impl RequestBody for CreateUser {}

    #[derive(Serialize)]
    struct FormUser(CreateUser);

    impl RequestBody for FormUser {
        fn form_fields(&self) -> Option<Vec<(String, String)>> {
            Some(vec![
                ("name".to_string(), self.0.name.clone()),
                ("email".to_string(), self.0.email.clone()),
            ])
        }
    }

    fn adam() -> CreateUser {
        CreateUser {
            name: "Adam Smith".to_string(),
            email: "adam.smith@hotmail.com".to_string(),
        }
    }

    #[test]
    fn test_json_body() {
        let body = build_body(Some(&adam())).unwrap().unwrap();
        assert_eq!(
            body,
            Bytes::from_static(br#"{"name":"Adam Smith","email":"adam.smith@hotmail.com"}"#)
        );
    }

    #[test]
    fn test_form_body_takes_precedence() {
        let body = build_body(Some(&FormUser(adam()))).unwrap().unwrap();
        assert_eq!(
            body,
            Bytes::from_static(b"name=Adam+Smith&email=adam.smith%40hotmail.com")
        );
    }

    #[test]
    fn test_absent_request_has_no_body() {
        assert!(build_body::<NoRequest>(None).unwrap().is_none());
        assert!(build_body::<CreateUser>(None).unwrap().is_none());
    }
}
