//! Retry controller.
//!
//! Drives one call through its lifecycle:
//!
//! ```text
//! before-request hooks
//!        |
//!   Attempting ----- 2xx / not retryable ------> Succeeded ---> after-response hooks
//!        |                                                         |
//!   retryable status or transport error                     status check
//!        |                                                         |
//!   before-retry hooks --- Stop ---> Stopped (no response)   before-error hooks
//!        |
//!   RetryScheduled: sleep, then Attempting again
//! ```
//!
//! A non-retryable transport error, or a hook error, ends the call as `Failed`.
//! Cancellation is observed at every await point. The timeout is a single
//! deadline from the start of the call, covering hooks, attempts and backoff.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::hooks::{
    RequestFlow, RetryFlow, run_after_response, run_before_error, run_before_request,
    run_before_retry,
};
use crate::{Error, Options, Request, Response, Result, Transport};

/// Run a call to completion. `Ok(None)` means a before-retry hook stopped it.
pub(crate) async fn execute<T: Transport>(
    transport: Arc<T>,
    options: Arc<Options>,
    request: Request,
) -> Result<Option<Response>> {
    let signal = options.signal.clone();
    let timeout = options.effective_timeout();
    cancellable(signal, deadline(timeout, run(transport, options, request))).await
}

async fn deadline<F>(timeout: Option<Duration>, future: F) -> Result<Option<Response>>
where
    F: Future<Output = Result<Option<Response>>>,
{
    let Some(limit) = timeout else {
        return future.await;
    };
    if let Ok(result) = tokio::time::timeout(limit, future).await {
        result
    } else {
        debug!(
            timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            "request timed out"
        );
        Err(Error::Timeout)
    }
}

async fn cancellable<F>(signal: Option<CancellationToken>, future: F) -> Result<Option<Response>>
where
    F: Future<Output = Result<Option<Response>>>,
{
    let Some(token) = signal else {
        return future.await;
    };
    tokio::select! {
        biased;
        () = token.cancelled() => {
            debug!("request cancelled");
            Err(Error::Cancelled)
        }
        result = future => result,
    }
}

async fn run<T: Transport>(
    transport: Arc<T>,
    options: Arc<Options>,
    request: Request,
) -> Result<Option<Response>> {
    let mut request = match run_before_request(&options, request).await? {
        RequestFlow::Respond(request, response) => {
            debug!(status = response.status(), "before-request hook answered");
            return finish(&options, &request, response).await.map(Some);
        }
        RequestFlow::Send(request) => request,
    };

    let policy = options.retry_policy();
    let mut retry_count = 0_u32;

    loop {
        debug!(
            method = %request.method(),
            url = %request.url(),
            attempt = retry_count + 1,
            "sending attempt"
        );
        let outcome = transport.send(request.clone()).await;

        let retries_left = retry_count < policy.retry_limit();
        let method_allowed = policy.allows_method(request.method());
        let next = retry_count + 1;

        let (reason, delay) = match outcome {
            Ok(response) if response.is_success() => {
                return finish(&options, &request, response).await.map(Some);
            }
            Ok(response) => {
                let delay = policy.response_delay(&response, next, SystemTime::now());
                match delay {
                    Some(delay) if retries_left && method_allowed => {
                        let reason = Error::http(request.method(), request.url(), response);
                        (reason, delay)
                    }
                    _ => {
                        if delay.is_some() && method_allowed {
                            warn!(
                                status = response.status(),
                                attempts = next,
                                "retries exhausted"
                            );
                        }
                        return finish(&options, &request, response).await.map(Some);
                    }
                }
            }
            Err(error) => match policy.error_delay(&error, next) {
                Some(delay) if retries_left && method_allowed => (error, delay),
                delay => {
                    if delay.is_some() && method_allowed {
                        warn!(error = %error, attempts = next, "retries exhausted");
                    }
                    return Err(error);
                }
            },
        };

        retry_count = next;
        request = match run_before_retry(&options, request, &reason, retry_count).await? {
            RetryFlow::Retry(request) => request,
            RetryFlow::Stop => {
                debug!(retry_count, "retries stopped by before-retry hook");
                return Ok(None);
            }
        };

        debug!(
            retry_count,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            reason = %reason,
            "retry scheduled"
        );
        tokio::time::sleep(delay).await;
    }
}

/// After-response hooks, then the status check and before-error hooks.
async fn finish(options: &Arc<Options>, request: &Request, response: Response) -> Result<Response> {
    let response = run_after_response(options, request, response).await?;
    if response.is_success() || !options.throws_http_errors() {
        return Ok(response);
    }

    let error = Error::http(request.method(), request.url(), response);
    Err(run_before_error(options, request, error).await)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use assert2::check;

    use super::*;
    use crate::{Method, RetryPolicy};

    /// Replays canned outcomes and records what it was sent.
    #[derive(Default)]
    struct Script {
        outcomes: Mutex<VecDeque<Result<Response>>>,
        sent: Mutex<Vec<Request>>,
    }

    impl Script {
        fn new(outcomes: impl IntoIterator<Item = Result<Response>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                sent: Mutex::default(),
            })
        }

        fn attempts(&self) -> usize {
            self.sent.lock().expect("lock").len()
        }
    }

    impl Transport for Script {
        fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
            self.sent.lock().expect("lock").push(request);
            let outcome = self
                .outcomes
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Err(Error::connection("script exhausted")));
            async move { outcome }
        }
    }

    fn request(method: Method) -> Request {
        let url = url::Url::parse("https://api.test/items").expect("url");
        Request::builder(method, url).build()
    }

    #[tokio::test(start_paused = true)]
    async fn retries_retryable_status_until_success() {
        let script = Script::new([
            Ok(Response::with_status(503)),
            Ok(Response::with_status(502)),
            Ok(Response::with_status(200)),
        ]);
        let options = Arc::new(Options::new());

        let response = execute(Arc::clone(&script), options, request(Method::Get))
            .await
            .expect("call");
        check!(response.map(|r| r.status()) == Some(200));
        check!(script.attempts() == 3);
    }

    #[tokio::test(start_paused = true)]
    async fn post_is_not_retried_by_default() {
        let script = Script::new([Ok(Response::with_status(503))]);
        let options = Arc::new(Options::new());

        let err = execute(Arc::clone(&script), options, request(Method::Post))
            .await
            .expect_err("http error");
        check!(err.status() == Some(503));
        check!(script.attempts() == 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_status_fails_at_once() {
        let script = Script::new([Ok(Response::with_status(404))]);
        let options = Arc::new(Options::new());

        let err = execute(Arc::clone(&script), options, request(Method::Get))
            .await
            .expect_err("http error");
        check!(err.status() == Some(404));
        check!(script.attempts() == 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_not_retried() {
        struct Hang;
        impl Transport for Hang {
            fn send(&self, _request: Request) -> impl Future<Output = Result<Response>> + Send {
                std::future::pending()
            }
        }

        let options = Arc::new(Options::new().timeout(Duration::from_millis(50)));
        let err = execute(Arc::new(Hang), options, request(Method::Get))
            .await
            .expect_err("timeout");
        check!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_covers_hook_time() {
        let script = Script::new([Ok(Response::with_status(200))]);
        let options = Arc::new(
            Options::new()
                .timeout(Duration::from_secs(1))
                .before_request(|_| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Ok(crate::BeforeRequestAction::Continue)
                }),
        );

        let err = execute(Arc::clone(&script), options, request(Method::Get))
            .await
            .expect_err("timeout");
        check!(err.is_timeout());
        check!(script.attempts() == 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cuts_short_a_pending_backoff() {
        let script = Script::new([Ok(Response::with_status(503)), Ok(Response::with_status(200))]);
        let options = Arc::new(
            Options::new()
                .timeout(Duration::from_secs(1))
                .retry(RetryPolicy::default().delay(|_| Duration::from_secs(5))),
        );

        let start = tokio::time::Instant::now();
        let err = execute(Arc::clone(&script), options, request(Method::Get))
            .await
            .expect_err("timeout");
        check!(err.is_timeout());
        check!(start.elapsed() < Duration::from_secs(2));
        check!(script.attempts() == 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_between_attempts() {
        let script = Script::new([
            Err(Error::connection("reset")),
            Err(Error::connection("reset")),
            Ok(Response::with_status(200)),
        ]);
        let options = Arc::new(Options::new());

        let start = tokio::time::Instant::now();
        execute(Arc::clone(&script), options, request(Method::Get))
            .await
            .expect("call");
        // 300 ms then 600 ms
        let elapsed = start.elapsed();
        check!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
        check!(elapsed < Duration::from_millis(1000), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn throw_http_errors_disabled_resolves_final_response() {
        let script = Script::new([Ok(Response::with_status(500)), Ok(Response::with_status(500))]);
        let options = Arc::new(
            Options::new()
                .throw_http_errors(false)
                .retry(RetryPolicy::default().limit(1)),
        );

        let response = execute(Arc::clone(&script), options, request(Method::Get))
            .await
            .expect("call")
            .expect("response");
        check!(response.status() == 500);
        check!(script.attempts() == 2);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let script = Script::new([Ok(Response::with_status(200))]);
        let options = Arc::new(Options::new().signal(token));

        let err = execute(Arc::clone(&script), options, request(Method::Get))
            .await
            .expect_err("cancelled");
        check!(err.is_cancelled());
        check!(script.attempts() == 0);
    }
}
