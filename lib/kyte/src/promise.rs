//! Deferred response.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

use crate::{Error, Response, Result};

/// The settled outcome of a call: `Ok(None)` when retries were stopped.
pub type Outcome = Result<Option<Response>>;

/// Handle on an in-flight call.
///
/// The call starts as soon as the handle is created; awaiting the handle
/// yields the raw [`Outcome`], while the body accessors wait for it and decode
/// the buffered body. The outcome settles exactly once: clones and repeated
/// accessor calls all observe the same response, so decoding twice replays
/// the same bytes.
///
/// # Example
///
/// ```ignore
/// let promise = kyte::Kyte::new().get("https://api.test/users/1");
/// let user: User = promise.json().await?;
/// let raw = promise.text().await?;
/// ```
#[derive(Clone)]
#[must_use = "a response promise does nothing useful unless awaited or decoded"]
pub struct ResponsePromise {
    inner: Shared<BoxFuture<'static, Outcome>>,
}

impl ResponsePromise {
    /// Run the call on the tokio runtime and track its outcome.
    ///
    /// A panic inside the call is propagated to the awaiter.
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let inner = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(_) => Err(Error::Cancelled),
            }
        };
        Self {
            inner: inner.boxed().shared(),
        }
    }

    /// An already settled promise.
    pub(crate) fn ready(outcome: Outcome) -> Self {
        Self {
            inner: futures_util::future::ready(outcome).boxed().shared(),
        }
    }

    /// The final response.
    ///
    /// # Errors
    ///
    /// Returns the call's error, or [`Error::NoResponse`] if a before-retry
    /// hook stopped the retries.
    pub async fn response(&self) -> Result<Response> {
        self.inner.clone().await?.ok_or(Error::NoResponse)
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the call's error, [`Error::NoResponse`] when stopped, or a
    /// decode error.
    pub async fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        self.response().await?.json()
    }

    /// Decode the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns the call's error, [`Error::NoResponse`] when stopped, or
    /// [`Error::TextDecode`].
    pub async fn text(&self) -> Result<String> {
        self.response().await?.text()
    }

    /// Raw body bytes.
    ///
    /// # Errors
    ///
    /// Returns the call's error or [`Error::NoResponse`] when stopped.
    pub async fn bytes(&self) -> Result<Bytes> {
        Ok(self.response().await?.bytes())
    }

    /// Decode an url-encoded body into `T`.
    ///
    /// # Errors
    ///
    /// Returns the call's error, [`Error::NoResponse`] when stopped, or
    /// [`Error::FormDeserialization`].
    pub async fn form<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        self.response().await?.form()
    }

    /// Url-encoded body as ordered name/value pairs.
    ///
    /// # Errors
    ///
    /// Returns the call's error, [`Error::NoResponse`] when stopped, or
    /// [`Error::FormDeserialization`] when the body is not UTF-8.
    pub async fn form_data(&self) -> Result<Vec<(String, String)>> {
        let response = self.response().await?;
        kyte_core::form_pairs(response.body())
    }
}

impl Future for ResponsePromise {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl fmt::Debug for ResponsePromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.peek() {
            None => "pending",
            Some(Ok(Some(_))) => "responded",
            Some(Ok(None)) => "stopped",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("ResponsePromise")
            .field("state", &state)
            .finish()
    }
}
