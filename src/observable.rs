//! Lazily started, single-item asynchronous results.
//!
//! An [`Observable`] wraps a producer that runs only once
//! [`observe`](Observable::observe) is called. The producer runs on its own
//! task, optionally under [`retry`](crate::retry::retry), and settles exactly
//! once into an untyped [`Item`]. [`extract`] turns that item back into the
//! caller's type.

use crate::{
    retry::{self, ExponentialBackoff},
    Error, Result,
};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// The settled result of an observable.
pub enum Item {
    /// A produced value of any type.
    Value(Box<dyn Any + Send>),
    /// The producer failed.
    Error(Error),
    /// Nothing was produced.
    Empty,
}

impl Item {
    /// Wraps a value.
    pub fn of<T>(value: T) -> Self
    where
        T: Any + Send,
    {
        Item::Value(Box::new(value))
    }
}

impl<T> From<Result<T>> for Item
where
    T: Any + Send,
{
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Item::of(value),
            Err(err) => Item::Error(err),
        }
    }
}

impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Item::Value(_) => f.write_str("Item::Value(..)"),
            Item::Error(err) => f.debug_tuple("Item::Error").field(err).finish(),
            Item::Empty => f.write_str("Item::Empty"),
        }
    }
}

/// Extracts a value of type `T` from a settled item.
///
/// Nothing is coerced: a value of another type is [`Error::WrongCastType`],
/// a value that is itself an [`Error`] is returned as the error, and an empty
/// item is [`Error::EmptyItem`].
///
/// # Examples
///
/// ```
/// use typed_fetch::{extract, ErrorKind, Item};
///
/// assert_eq!(extract::<u32>(Item::of(7u32)).unwrap(), 7);
/// assert_eq!(extract::<u32>(Item::of("seven")).unwrap_err().kind(), ErrorKind::WrongCastType);
/// assert_eq!(extract::<u32>(Item::Empty).unwrap_err().kind(), ErrorKind::EmptyItem);
/// ```
pub fn extract<T>(item: Item) -> Result<T>
where
    T: Any,
{
    match item {
        Item::Value(value) => match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => match value.downcast::<Error>() {
                Ok(err) => Err(*err),
                Err(_) => Err(Error::WrongCastType),
            },
        },
        Item::Error(err) => Err(err),
        Item::Empty => Err(Error::EmptyItem),
    }
}

type Producer<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// A deferred computation producing a single `T`.
///
/// Nothing runs until [`observe`](Self::observe) is called. With
/// [`backoff_retry`](Self::backoff_retry), each attempt re-runs the producer
/// from scratch.
pub struct Observable<T> {
    producer: Producer<T>,
    retry: Option<(ExponentialBackoff, CancellationToken)>,
}

impl<T> Observable<T>
where
    T: Any + Send,
{
    /// Defers `producer` until the observable is observed.
    pub fn defer<F, Fut>(producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            producer: Arc::new(move || producer().boxed()),
            retry: None,
        }
    }

    /// Retries the producer on any error according to `backoff`.
    ///
    /// Cancelling `ctx` stops scheduling new attempts.
    pub fn backoff_retry(mut self, backoff: ExponentialBackoff, ctx: CancellationToken) -> Self {
        self.retry = Some((backoff, ctx));
        self
    }

    /// Starts the producer on a new task.
    ///
    /// Must be called within a Tokio runtime. The returned future resolves
    /// to the settled item; dropping it does not stop the producer.
    pub fn observe(self) -> Observation<T> {
        let (sender, receiver) = oneshot::channel();
        let Observable { producer, retry } = self;

        tokio::spawn(async move {
            let result = match retry {
                Some((backoff, ctx)) => retry::retry(&backoff, &ctx, || producer()).await,
                None => producer().await,
            };
            // the observer may have gone away
            let _ = sender.send(Item::from(result));
        });

        Observation {
            receiver,
            _marker: PhantomData,
        }
    }

    /// Observes and extracts the value in one step.
    pub async fn get(self) -> Result<T> {
        extract(self.observe().await)
    }
}

impl<T> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("retry", &self.retry.as_ref().map(|(backoff, _)| backoff))
            .finish_non_exhaustive()
    }
}

/// A running observable. Resolves to the single settled [`Item`].
///
/// If the producer task dies without settling, the item is [`Item::Empty`].
#[derive(Debug)]
pub struct Observation<T> {
    receiver: oneshot::Receiver<Item>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Future for Observation<T> {
    type Output = Item;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(item)) => Poll::Ready(item),
            Poll::Ready(Err(_)) => Poll::Ready(Item::Empty),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Observes two observables concurrently and extracts both results.
///
/// The results are independent: a failure of one never hides the other.
pub async fn fetch_both<A, B>(first: Observable<A>, second: Observable<B>) -> (Result<A>, Result<B>)
where
    A: Any + Send,
    B: Any + Send,
{
    let (first, second) = tokio::join!(first.observe(), second.observe());
    (extract(first), extract(second))
}
