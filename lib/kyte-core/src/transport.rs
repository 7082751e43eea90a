//! The transport seam.
//!
//! A [`Transport`] performs one request/response exchange. The client drives
//! retries, hooks, timeouts and cancellation around it, so an implementation
//! only has to send the request and buffer the response body.

use std::future::Future;
use std::sync::Arc;

use crate::{Request, Response, Result};

/// Performs the actual network exchange for a finalized request.
///
/// # Example
///
/// ```ignore
/// use kyte_core::{Request, Response, Result, Transport};
///
/// #[derive(Clone)]
/// struct Canned;
///
/// impl Transport for Canned {
///     async fn send(&self, _request: Request) -> Result<Response> {
///         Ok(Response::with_status(204))
///     }
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Send the request and return the buffered response.
    ///
    /// Any response the server produced, including 4xx/5xx, is `Ok`; status
    /// policy is applied by the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange could not complete:
    /// - Network errors ([`crate::Error::Connection`])
    /// - TLS errors ([`crate::Error::Tls`])
    /// - Requests the transport cannot encode ([`crate::Error::InvalidOptions`])
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).send(request)
    }
}
