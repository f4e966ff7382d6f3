//! Deadline-bounded dispatch of a single HTTP request.

use crate::{
    error::InvalidStatus,
    metadata::RequestMetadata,
    validate::{RejectErrorStatus, StatusValidator},
    Error, Result,
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A cancellation scope derived from the caller's token, bounded by a deadline.
///
/// Each call gets its own scope, so cancelling one call never affects
/// siblings sharing the same parent. Once cancelled, by the deadline, by the
/// parent, or by being dropped, the scope stays cancelled.
#[derive(Debug)]
pub(crate) struct DeadlineScope {
    token: CancellationToken,
    expires_at: Instant,
}

impl DeadlineScope {
    pub(crate) fn arm(parent: &CancellationToken, deadline: Duration) -> Self {
        Self {
            token: parent.child_token(),
            expires_at: Instant::now() + deadline,
        }
    }

    /// Runs `future` to completion unless the scope is cancelled or expires first.
    pub(crate) async fn run<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            _ = tokio::time::sleep_until(self.expires_at) => {
                self.token.cancel();
                None
            }
            output = future => Some(output),
        }
    }

    #[cfg(test)]
    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for DeadlineScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Sends the request described by `metadata` within `scope`.
///
/// A response failing the status validator is returned as
/// [`Error::InvalidHttpStatus`] with its body unread.
pub(crate) async fn dispatch(
    scope: &DeadlineScope,
    http_client: &reqwest::Client,
    metadata: &RequestMetadata,
    body: Option<Bytes>,
) -> Result<reqwest::Response> {
    let mut request = http_client.request(metadata.method.into(), metadata.url.clone());

    for (name, value) in &metadata.headers {
        request = request.header(name, value);
    }

    if let Some(body) = body {
        request = request.body(body);
    }

    tracing::debug!(
        method = %metadata.method,
        url = %metadata.url,
        deadline_ms = metadata.deadline.as_millis() as u64,
        "Executing HTTP request"
    );

    let response = match scope.run(request.send()).await {
        Some(result) => result?,
        None => {
            return Err(Error::Timeout {
                url: metadata.url.to_string(),
            })
        }
    };

    let validator: &dyn StatusValidator = match &metadata.validator {
        Some(validator) => validator.as_ref(),
        None => &RejectErrorStatus,
    };

    if validator.is_invalid(&response) {
        tracing::error!(
            status = response.status().as_u16(),
            method = %metadata.method,
            url = %metadata.url,
            "Response failed status validation"
        );
        return Err(Error::InvalidHttpStatus(
            InvalidStatus::new(response).with_read_timeout(metadata.deadline),
        ));
    }

    Ok(response)
}

/// Reads the whole body of `response`, stopping as soon as it grows past `limit`.
pub(crate) async fn read_body(response: reqwest::Response, limit: Option<usize>) -> Result<Bytes> {
    let Some(limit) = limit else {
        return Ok(response.bytes().await?);
    };

    if response.content_length().is_some_and(|length| length > limit as u64) {
        return Err(Error::BodyTooLarge { limit });
    }

    let limited = Limited::new(reqwest::Body::from(response), limit);
    match limited.collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(Error::BodyTooLarge { limit }),
        Err(err) => match err.downcast::<reqwest::Error>() {
            Ok(err) => Err(Error::Network(*err)),
            Err(err) => Err(Error::Decode(err.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_before_deadline() {
        let parent = CancellationToken::new();
        let scope = DeadlineScope::arm(&parent, Duration::from_secs(5));

        assert_eq!(scope.run(async { 7 }).await, Some(7));
        assert!(!scope.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_cancels_scope_only() {
        let parent = CancellationToken::new();
        let scope = DeadlineScope::arm(&parent, Duration::from_millis(20));

        let output = scope
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;

        assert!(output.is_none());
        assert!(scope.is_cancelled());
        assert!(!parent.is_cancelled());

        // an expired scope stays expired
        assert_eq!(scope.run(async { 1 }).await, None);
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_scope() {
        let parent = CancellationToken::new();
        let scope = DeadlineScope::arm(&parent, Duration::from_secs(5));
        parent.cancel();
        parent.cancel();

        assert_eq!(scope.run(async { 1 }).await, None);
    }

    fn response(body: &'static str) -> reqwest::Response {
        reqwest::Response::from(http::Response::new(body))
    }

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let body = read_body(response(r#"{"id":"1"}"#), Some(10)).await.unwrap();
        assert_eq!(body, Bytes::from_static(br#"{"id":"1"}"#));

        let body = read_body(response("unbounded"), None).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"unbounded"));
    }

    #[tokio::test]
    async fn test_read_body_over_limit() {
        let err = read_body(response(r#"{"id":"12345"}"#), Some(8)).await.unwrap_err();
        assert!(matches!(err, Error::BodyTooLarge { limit: 8 }));
    }

    #[tokio::test]
    async fn test_sibling_scopes_are_isolated() {
        let parent = CancellationToken::new();
        let first = DeadlineScope::arm(&parent, Duration::from_secs(5));
        let second = DeadlineScope::arm(&parent, Duration::from_secs(5));
        drop(first);

        assert_eq!(second.run(async { 2 }).await, Some(2));
    }
}
