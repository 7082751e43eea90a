//! Attempt logging.
//!
//! Every exchange that reaches the transport, retries included, runs inside an
//! `http_request` span and reports its outcome with the elapsed time.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{Error, Request, Response, Result};

/// How much of each exchange is logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Method, URL, status and elapsed time at info level.
    #[default]
    Summary,
    /// Headers and body sizes too, at debug level.
    Detailed,
}

/// Layer logging each transport exchange with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    verbosity: Verbosity,
}

impl LoggingLayer {
    /// Summary logging.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Detailed logging at debug level.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            verbosity: Verbosity::Detailed,
        }
    }

    /// Configured verbosity.
    #[must_use]
    pub const fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            verbosity: self.verbosity,
        }
    }
}

/// Service produced by [`LoggingLayer`].
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    verbosity: Verbosity,
}

impl<S> Service<Request> for Logging<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let span = info_span!("http_request", method = %request.method(), url = %request.url());
        let verbosity = self.verbosity;

        match verbosity {
            Verbosity::Summary => info!(parent: &span, "sending request"),
            Verbosity::Detailed => debug!(
                parent: &span,
                headers = ?request.headers(),
                body_len = request.body().map_or(0, bytes::Bytes::len),
                "sending request"
            ),
        }

        let future = self.inner.call(request);
        Box::pin(
            async move {
                let start = Instant::now();
                let result = future.await;
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match (&result, verbosity) {
                    (Ok(response), Verbosity::Detailed) => debug!(
                        status = response.status(),
                        headers = ?response.headers(),
                        body_len = response.body().len(),
                        elapsed_ms,
                        "response received"
                    ),
                    (Ok(response), Verbosity::Summary) => {
                        info!(status = response.status(), elapsed_ms, "response received");
                    }
                    (Err(err), _) => warn!(error = %err, elapsed_ms, "exchange failed"),
                }

                result
            }
            .instrument(span),
        )
    }
}
