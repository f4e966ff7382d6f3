//! Status validation for raw responses.

/// Decides whether a raw response should be treated as a failure.
///
/// Implemented for any `Fn(&reqwest::Response) -> bool`, so closures can be
/// passed directly.
///
/// # Examples
///
/// ```
/// use typed_fetch::{metadata::RequestMetadata, HttpMethod};
///
/// // only server errors fail the call; 4xx bodies are decoded like any other
/// let metadata = RequestMetadata::parse(HttpMethod::Get, "https://api.example.com/users/7")
///     .unwrap()
///     .with_validator(|res: &reqwest::Response| res.status().is_server_error());
/// ```
pub trait StatusValidator: Send + Sync {
    /// Returns `true` if `response` must be reported as an invalid-status error.
    fn is_invalid(&self, response: &reqwest::Response) -> bool;
}

impl<F> StatusValidator for F
where
    F: Fn(&reqwest::Response) -> bool + Send + Sync,
{
    fn is_invalid(&self, response: &reqwest::Response) -> bool {
        self(response)
    }
}

/// The default validator: every 4xx and 5xx status is invalid.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectErrorStatus;

impl StatusValidator for RejectErrorStatus {
    fn is_invalid(&self, response: &reqwest::Response) -> bool {
        let status = response.status();
        status.is_client_error() || status.is_server_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> reqwest::Response {
        reqwest::Response::from(http::Response::builder().status(status).body("").unwrap())
    }

    #[test]
    fn test_default_rejects_4xx_and_5xx() {
        for status in [400, 404, 418, 499, 500, 503, 599] {
            assert!(RejectErrorStatus.is_invalid(&response(status)), "{}", status);
        }
    }

    #[test]
    fn test_default_accepts_2xx_and_3xx() {
        for status in [200, 201, 204, 301, 304, 399] {
            assert!(!RejectErrorStatus.is_invalid(&response(status)), "{}", status);
        }
    }

    #[test]
    fn test_closure_validator() {
        let only_server_errors = |res: &reqwest::Response| res.status().is_server_error();
        assert!(!only_server_errors.is_invalid(&response(404)));
        assert!(only_server_errors.is_invalid(&response(502)));
    }
}
