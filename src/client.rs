//! HTTP client performing typed, deadline-bounded calls.
//!
//! The [`Client`] type is the main entry point for making calls.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    body::{self, RequestBody, ResponseBody},
    codec,
    metadata::{HttpMethod, RequestMetadata, DEFAULT_DEADLINE},
    observable::Observable,
    retry::ExponentialBackoff,
    transport::{self, DeadlineScope},
    Envelope, Error, Result,
};
use bytes::Bytes;
use http::StatusCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// An HTTP client for typed calls with deadlines, retries and strict decoding.
///
/// The client is designed to be reused across many calls. It wraps a shared
/// `reqwest` connection pool and is never modified by a call.
///
/// # Examples
///
/// ```no_run
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
/// use typed_fetch::{
///     metadata::RequestMetadata, CancellationToken, Client, HttpMethod, RequestBody,
///     ResponseBody,
/// };
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
///     email: String,
/// }
///
/// impl RequestBody for CreateUser {}
///
/// #[derive(Deserialize)]
/// struct User {
///     id: String,
/// }
///
/// impl ResponseBody for User {}
///
/// # async fn example() -> Result<(), typed_fetch::Error> {
/// let client = Client::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
///
/// let metadata = RequestMetadata::parse(HttpMethod::Post, "https://api.example.com/users")?
///     .with_header("Authorization", "Bearer token")?
///     .with_deadline(Duration::from_secs(1));
/// let request = CreateUser {
///     name: "Adam Smith".to_string(),
///     email: "adam.smith@hotmail.com".to_string(),
/// };
///
/// let ctx = CancellationToken::new();
/// let created = client.fetch::<_, User>(&ctx, &metadata, Some(&request)).await?;
/// println!("Created user {}", created.body.unwrap().id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    http_client: reqwest::Client,
    max_body_bytes: Option<usize>,
    default_deadline: Duration,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Wraps an externally configured `reqwest::Client` with default settings.
    pub fn from_reqwest(http_client: reqwest::Client) -> Self {
        Client {
            inner: Arc::new(ClientInner {
                http_client,
                max_body_bytes: None,
                default_deadline: DEFAULT_DEADLINE,
            }),
        }
    }

    /// Builds metadata for `url` using this client's default deadline.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn metadata(&self, method: HttpMethod, url: impl AsRef<str>) -> Result<RequestMetadata> {
        Ok(RequestMetadata::parse(method, url)?.with_deadline(self.inner.default_deadline))
    }

    /// Sends one request and validates its status.
    ///
    /// The call is bounded by `metadata.deadline` and by `ctx`. Either one
    /// firing reports [`Error::Timeout`]. A response failing the status
    /// validator is reported as [`Error::InvalidHttpStatus`] and is not
    /// returned. The deadline no longer applies once the response is
    /// returned; use [`fetch`](Self::fetch) to keep the body read bounded.
    pub async fn call(
        &self,
        ctx: &CancellationToken,
        metadata: &RequestMetadata,
        body: Option<Bytes>,
    ) -> Result<reqwest::Response> {
        let scope = DeadlineScope::arm(ctx, metadata.deadline);
        transport::dispatch(&scope, &self.inner.http_client, metadata, body).await
    }

    /// Makes a typed call.
    ///
    /// Serializes `request` (form fields take precedence over JSON; methods
    /// without a body ignore it), sends it, and strictly decodes the response
    /// into `Res`. A `204 No Content` response yields an envelope without a
    /// body. The deadline bounds dispatch and body read together.
    ///
    /// # Type Parameters
    ///
    /// * `Req` - The request body type, [`NoRequest`](crate::NoRequest) for none
    /// * `Res` - The response body type, [`NoResponse`](crate::NoResponse) for none
    pub async fn fetch<Req, Res>(
        &self,
        ctx: &CancellationToken,
        metadata: &RequestMetadata,
        request: Option<&Req>,
    ) -> Result<Envelope<Res>>
    where
        Req: RequestBody,
        Res: ResponseBody,
    {
        let start_time = Instant::now();

        let body = if metadata.method.carries_body() {
            body::build_body(request)?
        } else {
            None
        };

        let scope = DeadlineScope::arm(ctx, metadata.deadline);
        let response = transport::dispatch(&scope, &self.inner.http_client, metadata, body).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            url = %url,
            "Received HTTP response"
        );

        if status == StatusCode::NO_CONTENT || !Res::HAS_BODY {
            return Ok(Envelope::new(
                None,
                Bytes::new(),
                status,
                headers,
                url,
                start_time.elapsed(),
            ));
        }

        let raw_body = match scope
            .run(transport::read_body(response, self.inner.max_body_bytes))
            .await
        {
            Some(read) => read?,
            None => {
                return Err(Error::Timeout {
                    url: metadata.url.to_string(),
                })
            }
        };

        match codec::decode_with_limit::<Res>(&raw_body, self.inner.max_body_bytes) {
            Ok(data) => Ok(Envelope::new(
                Some(data),
                raw_body,
                status,
                headers,
                url,
                start_time.elapsed(),
            )),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    status = status.as_u16(),
                    raw_response = %String::from_utf8_lossy(&raw_body),
                    "Failed to decode response"
                );
                Err(e)
            }
        }
    }

    /// Makes a typed call lazily, retrying with exponential backoff.
    ///
    /// Nothing is sent until the returned observable is observed. Every
    /// attempt re-runs [`fetch`](Self::fetch) from scratch and any error is
    /// retried, so with `backoff.max_retries = n` at most `n + 1` requests
    /// are sent. The error of the final attempt is the observable's result.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use typed_fetch::{CancellationToken, Client, ExponentialBackoff, HttpMethod, NoRequest};
    ///
    /// # async fn example() -> Result<(), typed_fetch::Error> {
    /// let client = Client::builder().build()?;
    /// let metadata = client.metadata(HttpMethod::Get, "https://api.example.com/health")?;
    ///
    /// let observable = client.fetch_async::<NoRequest, serde_json::Value>(
    ///     &CancellationToken::new(),
    ///     metadata,
    ///     None,
    ///     ExponentialBackoff::new(Duration::from_millis(100), 3),
    /// );
    ///
    /// let envelope = observable.get().await?;
    /// println!("Healthy: {:?}", envelope.body);
    /// # Ok(())
    /// # }
    /// ```
    pub fn fetch_async<Req, Res>(
        &self,
        ctx: &CancellationToken,
        metadata: RequestMetadata,
        request: Option<Req>,
        backoff: ExponentialBackoff,
    ) -> Observable<Envelope<Res>>
    where
        Req: RequestBody + 'static,
        Res: ResponseBody,
    {
        let client = self.clone();
        let producer_ctx = ctx.clone();
        let metadata = Arc::new(metadata);
        let request = request.map(Arc::new);

        Observable::defer(move || {
            let client = client.clone();
            let ctx = producer_ctx.clone();
            let metadata = metadata.clone();
            let request = request.clone();
            async move {
                client
                    .fetch::<Req, Res>(&ctx, &metadata, request.as_deref())
                    .await
            }
        })
        .backoff_retry(backoff, ctx.clone())
    }

    /// Makes a GET request to `url`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use serde::Deserialize;
    /// use typed_fetch::{Client, ResponseBody};
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// impl ResponseBody for User {}
    ///
    /// # async fn example() -> Result<(), typed_fetch::Error> {
    /// let client = Client::builder().build()?;
    ///
    /// let user = client.get::<User>("https://api.example.com/users/123").await?;
    /// println!("User: {}", user.body.unwrap().name);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<Res>(&self, url: impl AsRef<str>) -> Result<Envelope<Res>>
    where
        Res: ResponseBody,
    {
        let metadata = self.metadata(HttpMethod::Get, url)?;
        self.fetch::<crate::NoRequest, Res>(&CancellationToken::new(), &metadata, None)
            .await
    }

    /// Makes a POST request to `url` with `body`.
    pub async fn post<Req, Res>(&self, url: impl AsRef<str>, body: &Req) -> Result<Envelope<Res>>
    where
        Req: RequestBody,
        Res: ResponseBody,
    {
        let metadata = self.metadata(HttpMethod::Post, url)?;
        self.fetch(&CancellationToken::new(), &metadata, Some(body))
            .await
    }

    /// Makes a PUT request to `url` with `body`.
    pub async fn put<Req, Res>(&self, url: impl AsRef<str>, body: &Req) -> Result<Envelope<Res>>
    where
        Req: RequestBody,
        Res: ResponseBody,
    {
        let metadata = self.metadata(HttpMethod::Put, url)?;
        self.fetch(&CancellationToken::new(), &metadata, Some(body))
            .await
    }

    /// Makes a PATCH request to `url` with `body`.
    pub async fn patch<Req, Res>(&self, url: impl AsRef<str>, body: &Req) -> Result<Envelope<Res>>
    where
        Req: RequestBody,
        Res: ResponseBody,
    {
        let metadata = self.metadata(HttpMethod::Patch, url)?;
        self.fetch(&CancellationToken::new(), &metadata, Some(body))
            .await
    }

    /// Makes a DELETE request to `url`.
    pub async fn delete<Res>(&self, url: impl AsRef<str>) -> Result<Envelope<Res>>
    where
        Res: ResponseBody,
    {
        let metadata = self.metadata(HttpMethod::Delete, url)?;
        self.fetch::<crate::NoRequest, Res>(&CancellationToken::new(), &metadata, None)
            .await
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use typed_fetch::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), typed_fetch::Error> {
/// let client = ClientBuilder::new()
///     .timeout(Duration::from_secs(30))
///     .redirect_policy(reqwest::redirect::Policy::limited(1))
///     .pool_idle_timeout(Duration::from_secs(15))
///     .max_body_bytes(1 << 20)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    http_client: Option<reqwest::Client>,
    timeout: Option<Duration>,
    redirect_policy: Option<reqwest::redirect::Policy>,
    pool_idle_timeout: Option<Duration>,
    max_body_bytes: Option<usize>,
    default_deadline: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an externally built `reqwest::Client` as the transport.
    ///
    /// When set, `timeout`, `redirect_policy` and `pool_idle_timeout` are ignored.
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Sets the transport-level timeout for whole requests.
    ///
    /// This is independent of the per-call deadline in [`RequestMetadata`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the redirect policy.
    pub fn redirect_policy(mut self, policy: reqwest::redirect::Policy) -> Self {
        self.redirect_policy = Some(policy);
        self
    }

    /// Sets how long idle pooled connections are kept alive.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Rejects response bodies larger than `limit` bytes with [`Error::BodyTooLarge`].
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    /// Sets the deadline used by [`Client::metadata`] and the convenience verbs.
    pub fn default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = Some(deadline);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn build(self) -> Result<Client> {
        let http_client = match self.http_client {
            Some(http_client) => http_client,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                if let Some(policy) = self.redirect_policy {
                    builder = builder.redirect(policy);
                }
                if let Some(idle) = self.pool_idle_timeout {
                    builder = builder.pool_idle_timeout(idle);
                }
                builder.build().map_err(|e| {
                    Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
                })?
            }
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                max_body_bytes: self.max_body_bytes,
                default_deadline: self.default_deadline.unwrap_or(DEFAULT_DEADLINE),
            }),
        })
    }
}
