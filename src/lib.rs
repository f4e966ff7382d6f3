//! # typed-fetch - typed REST calls that fail loudly and precisely
//!
//! `typed-fetch` marshals typed requests, issues HTTP calls bounded by a
//! per-call deadline, and strictly decodes typed responses. Calls can be made
//! directly with [`Client::fetch`], or lazily with exponential backoff retry
//! through [`Client::fetch_async`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//! use typed_fetch::{CancellationToken, Client, HttpMethod, RequestBody, ResponseBody};
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! impl RequestBody for CreateUser {}
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: String,
//! }
//!
//! impl ResponseBody for User {}
//!
//! #[tokio::main]
//! async fn main() -> Result<(), typed_fetch::Error> {
//!     let client = Client::builder()
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     let metadata = client
//!         .metadata(HttpMethod::Post, "https://api.example.com/users")?
//!         .with_deadline(Duration::from_secs(1));
//!
//!     let new_user = CreateUser {
//!         name: "Adam Smith".to_string(),
//!         email: "adam.smith@hotmail.com".to_string(),
//!     };
//!
//!     let created = client
//!         .fetch::<_, User>(&CancellationToken::new(), &metadata, Some(&new_user))
//!         .await?;
//!     println!("Created user {} ({})", created.body.unwrap().id, created.status);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every error has an [`ErrorKind`]. A response whose status fails validation
//! (4xx and 5xx by default) is returned as [`Error::InvalidHttpStatus`]; its
//! body is only read when a description is requested:
//!
//! ```no_run
//! use typed_fetch::{describe, Client, ErrorKind};
//!
//! # async fn example() -> Result<(), typed_fetch::Error> {
//! # let client = Client::builder().build()?;
//! match client.get::<serde_json::Value>("https://api.example.com/users/7").await {
//!     Ok(envelope) => println!("Success: {:?}", envelope.body),
//!     Err(err) if err.kind() == ErrorKind::InvalidHttpStatus => {
//!         let description = describe(&err).await;
//!         eprintln!("HTTP {}: {}", description.status_code, description.error_message);
//!     }
//!     Err(err) => eprintln!("Other error: {}", err),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retries
//!
//! [`Client::fetch_async`] returns an [`Observable`] that does nothing until
//! observed, then retries the whole call on any error:
//!
//! ```no_run
//! use std::time::Duration;
//! use typed_fetch::{fetch_both, CancellationToken, Client, ExponentialBackoff, HttpMethod, NoRequest};
//!
//! # async fn example() -> Result<(), typed_fetch::Error> {
//! let client = Client::builder().build()?;
//! let ctx = CancellationToken::new();
//! let backoff = ExponentialBackoff::new(Duration::from_millis(100), 2);
//!
//! let users = client.fetch_async::<NoRequest, serde_json::Value>(
//!     &ctx,
//!     client.metadata(HttpMethod::Get, "https://api.example.com/users")?,
//!     None,
//!     backoff.clone(),
//! );
//! let orders = client.fetch_async::<NoRequest, serde_json::Value>(
//!     &ctx,
//!     client.metadata(HttpMethod::Get, "https://api.example.com/orders")?,
//!     None,
//!     backoff,
//! );
//!
//! let (users, orders) = fetch_both(users, orders).await;
//! # Ok(())
//! # }
//! ```

mod body;
mod client;
pub mod codec;
mod error;
pub mod metadata;
pub mod observable;
mod response;
pub mod retry;
mod transport;
pub mod validate;

pub use body::{NoRequest, NoResponse, RequestBody, ResponseBody};
pub use client::{Client, ClientBuilder};
pub use error::{describe, Error, ErrorDescription, ErrorKind, InvalidStatus, Result};
pub use metadata::HttpMethod;
pub use observable::{extract, fetch_both, Item, Observable, Observation};
pub use response::Envelope;
pub use retry::ExponentialBackoff;
pub use tokio_util::sync::CancellationToken;
pub use validate::{RejectErrorStatus, StatusValidator};
