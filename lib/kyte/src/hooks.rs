//! Lifecycle hooks.
//!
//! Hooks are async callbacks attached to a [`Phase`]. Within a phase they run
//! strictly in order, each one seeing what the previous one produced. A hook
//! aborts the call by returning an error; no later hook of that phase runs.
//!
//! | Phase | Context | May return |
//! |-------|---------|------------|
//! | [`Phase::BeforeRequest`] | [`BeforeRequestContext`] | [`BeforeRequestAction`] |
//! | [`Phase::BeforeRetry`] | [`BeforeRetryContext`] | [`BeforeRetryAction`] |
//! | [`Phase::AfterResponse`] | [`AfterResponseContext`] | [`AfterResponseAction`] |
//! | [`Phase::BeforeError`] | [`BeforeErrorContext`] | the error to surface |
//!
//! # Example
//!
//! ```ignore
//! use kyte::{BeforeRequestAction, BeforeRetryAction, Options};
//!
//! let options = Options::new()
//!     .before_request(|ctx| async move {
//!         let mut request = ctx.request;
//!         request.set_header("x-request-id", "42");
//!         Ok(BeforeRequestAction::Replace(request))
//!     })
//!     .before_retry(|ctx| async move {
//!         if ctx.retry_count > 1 {
//!             return Ok(kyte::STOP);
//!         }
//!         Ok(BeforeRetryAction::Continue)
//!     });
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use derive_more::Display;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::{Error, Options, Request, Response, Result};

/// Lifecycle phase a hook is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Phase {
    /// Once per call, before the first attempt.
    #[display("before-request")]
    BeforeRequest,
    /// Before each retry.
    #[display("before-retry")]
    BeforeRetry,
    /// On the final response.
    #[display("after-response")]
    AfterResponse,
    /// On the terminal HTTP error, before it is surfaced.
    #[display("before-error")]
    BeforeError,
}

/// Input of a before-request hook.
#[derive(Debug, Clone)]
pub struct BeforeRequestContext {
    /// Request as left by the previous hook.
    pub request: Request,
    /// Effective options of the call.
    pub options: Arc<Options>,
}

/// Input of a before-retry hook.
#[derive(Debug, Clone)]
pub struct BeforeRetryContext {
    /// Request that will be sent again.
    pub request: Request,
    /// Effective options of the call.
    pub options: Arc<Options>,
    /// Why the previous attempt failed: a transport error or an HTTP error.
    pub error: Error,
    /// 1-based number of the retry about to happen.
    pub retry_count: u32,
}

/// Input of an after-response hook.
#[derive(Debug, Clone)]
pub struct AfterResponseContext {
    /// Request that produced the response.
    pub request: Request,
    /// Effective options of the call.
    pub options: Arc<Options>,
    /// Response as left by the previous hook.
    pub response: Response,
}

/// Input of a before-error hook.
#[derive(Debug, Clone)]
pub struct BeforeErrorContext {
    /// Request that failed.
    pub request: Request,
    /// Effective options of the call.
    pub options: Arc<Options>,
    /// Error as left by the previous hook.
    pub error: Error,
}

/// Result of a before-request hook.
#[derive(Debug, Clone)]
pub enum BeforeRequestAction {
    /// Keep the current request.
    Continue,
    /// Use this request instead.
    Replace(Request),
    /// Skip the transport and use this response. Later before-request hooks do not run.
    Respond(Response),
}

/// Result of a before-retry hook.
///
/// Compares by value, so `action == STOP` identifies the stop signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeforeRetryAction {
    /// Retry with the current request.
    Continue,
    /// Retry with this request instead.
    Replace(Request),
    /// Abort all further retries. The call resolves with no response, not an error.
    Stop,
}

impl BeforeRetryAction {
    /// Whether this is the stop signal.
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// The stop signal, for before-retry hooks.
///
/// Returning it aborts the retry loop: the call resolves to `Ok(None)` and
/// body accessors fail with [`Error::NoResponse`].
pub const STOP: BeforeRetryAction = BeforeRetryAction::Stop;

/// Result of an after-response hook.
#[derive(Debug, Clone)]
pub enum AfterResponseAction {
    /// Keep the current response.
    Continue,
    /// Use this response instead.
    Replace(Response),
}

/// Stored before-request hook.
pub type BeforeRequestHook =
    Arc<dyn Fn(BeforeRequestContext) -> BoxFuture<'static, Result<BeforeRequestAction>> + Send + Sync>;
/// Stored before-retry hook.
pub type BeforeRetryHook =
    Arc<dyn Fn(BeforeRetryContext) -> BoxFuture<'static, Result<BeforeRetryAction>> + Send + Sync>;
/// Stored after-response hook.
pub type AfterResponseHook =
    Arc<dyn Fn(AfterResponseContext) -> BoxFuture<'static, Result<AfterResponseAction>> + Send + Sync>;
/// Stored before-error hook.
pub type BeforeErrorHook = Arc<dyn Fn(BeforeErrorContext) -> BoxFuture<'static, Error> + Send + Sync>;

/// Ordered hooks of one phase.
///
/// Merging appends the child's hooks after the parent's, unless the child was
/// [cleared](Self::clear), in which case the child's list replaces the parent's.
pub struct HookList<H> {
    reset: bool,
    hooks: Vec<H>,
}

impl<H> HookList<H> {
    /// Appends a hook.
    pub fn push(&mut self, hook: H) {
        self.hooks.push(hook);
    }

    /// Drops every hook, inherited ones included.
    pub fn clear(&mut self) {
        self.reset = true;
        self.hooks.clear();
    }

    /// Number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether there is no hook.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Hooks in execution order.
    #[must_use]
    pub fn as_slice(&self) -> &[H] {
        &self.hooks
    }
}

impl<H: Clone> HookList<H> {
    pub(crate) fn merge(&self, child: Self) -> Self {
        if child.reset {
            return child;
        }
        let mut hooks = self.hooks.clone();
        hooks.extend(child.hooks);
        Self {
            reset: self.reset,
            hooks,
        }
    }
}

impl<H> Default for HookList<H> {
    fn default() -> Self {
        Self {
            reset: false,
            hooks: Vec::new(),
        }
    }
}

impl<H: Clone> Clone for HookList<H> {
    fn clone(&self) -> Self {
        Self {
            reset: self.reset,
            hooks: self.hooks.clone(),
        }
    }
}

impl<H> fmt::Debug for HookList<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookList")
            .field("reset", &self.reset)
            .field("len", &self.hooks.len())
            .finish()
    }
}

/// Hooks of every phase.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    /// Before-request hooks.
    pub before_request: HookList<BeforeRequestHook>,
    /// Before-retry hooks.
    pub before_retry: HookList<BeforeRetryHook>,
    /// After-response hooks.
    pub after_response: HookList<AfterResponseHook>,
    /// Before-error hooks.
    pub before_error: HookList<BeforeErrorHook>,
}

impl Hooks {
    /// Phase-wise concatenation, parent first.
    #[must_use]
    pub fn merge(&self, child: Self) -> Self {
        Self {
            before_request: self.before_request.merge(child.before_request),
            before_retry: self.before_retry.merge(child.before_retry),
            after_response: self.after_response.merge(child.after_response),
            before_error: self.before_error.merge(child.before_error),
        }
    }

    /// Drops every hook of a phase, inherited ones included.
    pub fn clear(&mut self, phase: Phase) {
        match phase {
            Phase::BeforeRequest => self.before_request.clear(),
            Phase::BeforeRetry => self.before_retry.clear(),
            Phase::AfterResponse => self.after_response.clear(),
            Phase::BeforeError => self.before_error.clear(),
        }
    }

    pub(crate) fn add_before_request<F, Fut>(&mut self, hook: F)
    where
        F: Fn(BeforeRequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BeforeRequestAction>> + Send + 'static,
    {
        self.before_request.push(Arc::new(move |ctx| hook(ctx).boxed()));
    }

    pub(crate) fn add_before_retry<F, Fut>(&mut self, hook: F)
    where
        F: Fn(BeforeRetryContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BeforeRetryAction>> + Send + 'static,
    {
        self.before_retry.push(Arc::new(move |ctx| hook(ctx).boxed()));
    }

    pub(crate) fn add_after_response<F, Fut>(&mut self, hook: F)
    where
        F: Fn(AfterResponseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<AfterResponseAction>> + Send + 'static,
    {
        self.after_response.push(Arc::new(move |ctx| hook(ctx).boxed()));
    }

    pub(crate) fn add_before_error<F, Fut>(&mut self, hook: F)
    where
        F: Fn(BeforeErrorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Error> + Send + 'static,
    {
        self.before_error.push(Arc::new(move |ctx| hook(ctx).boxed()));
    }
}

// ============================================================================
// Pipeline Runner
// ============================================================================

/// Where the before-request phase left the call.
#[derive(Debug)]
pub(crate) enum RequestFlow {
    /// Send this request through the transport.
    Send(Request),
    /// A hook answered; skip the transport.
    Respond(Request, Response),
}

/// Where the before-retry phase left the call.
#[derive(Debug)]
pub(crate) enum RetryFlow {
    Retry(Request),
    Stop,
}

pub(crate) async fn run_before_request(
    options: &Arc<Options>,
    mut request: Request,
) -> Result<RequestFlow> {
    for hook in options.hooks.before_request.as_slice() {
        let ctx = BeforeRequestContext {
            request: request.clone(),
            options: Arc::clone(options),
        };
        match hook(ctx).await? {
            BeforeRequestAction::Continue => {}
            BeforeRequestAction::Replace(replacement) => request = replacement,
            BeforeRequestAction::Respond(response) => {
                return Ok(RequestFlow::Respond(request, response));
            }
        }
    }
    Ok(RequestFlow::Send(request))
}

pub(crate) async fn run_before_retry(
    options: &Arc<Options>,
    mut request: Request,
    error: &Error,
    retry_count: u32,
) -> Result<RetryFlow> {
    for hook in options.hooks.before_retry.as_slice() {
        let ctx = BeforeRetryContext {
            request: request.clone(),
            options: Arc::clone(options),
            error: error.clone(),
            retry_count,
        };
        match hook(ctx).await? {
            BeforeRetryAction::Continue => {}
            BeforeRetryAction::Replace(replacement) => request = replacement,
            BeforeRetryAction::Stop => return Ok(RetryFlow::Stop),
        }
    }
    Ok(RetryFlow::Retry(request))
}

pub(crate) async fn run_after_response(
    options: &Arc<Options>,
    request: &Request,
    mut response: Response,
) -> Result<Response> {
    for hook in options.hooks.after_response.as_slice() {
        let ctx = AfterResponseContext {
            request: request.clone(),
            options: Arc::clone(options),
            response: response.clone(),
        };
        if let AfterResponseAction::Replace(replacement) = hook(ctx).await? {
            response = replacement;
        }
    }
    Ok(response)
}

pub(crate) async fn run_before_error(
    options: &Arc<Options>,
    request: &Request,
    mut error: Error,
) -> Error {
    for hook in options.hooks.before_error.as_slice() {
        let ctx = BeforeErrorContext {
            request: request.clone(),
            options: Arc::clone(options),
            error,
        };
        error = hook(ctx).await;
    }
    error
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert2::{check, let_assert};

    use super::*;
    use crate::{Kyte, Method};

    fn request() -> Request {
        let url = url::Url::parse("https://api.test/items").expect("url");
        Request::builder(Method::Get, url).build()
    }

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn before_request_hooks_run_in_order_and_see_replacements() {
        let seen = recorder();
        let (first, second) = (Arc::clone(&seen), Arc::clone(&seen));
        let options = Arc::new(
            Options::new()
                .before_request(move |ctx| {
                    let seen = Arc::clone(&first);
                    async move {
                        seen.lock().expect("lock").push("first");
                        let mut request = ctx.request;
                        request.set_header("x-step", "1");
                        Ok(BeforeRequestAction::Replace(request))
                    }
                })
                .before_request(move |ctx| {
                    let seen = Arc::clone(&second);
                    async move {
                        check!(ctx.request.header("x-step") == Some("1"));
                        seen.lock().expect("lock").push("second");
                        Ok(BeforeRequestAction::Continue)
                    }
                }),
        );

        let flow = run_before_request(&options, request()).await.expect("flow");
        let_assert!(RequestFlow::Send(request) = flow);
        check!(request.header("x-step") == Some("1"));
        check!(*seen.lock().expect("lock") == vec!["first", "second"]);
    }

    #[tokio::test]
    async fn hook_error_stops_the_phase() {
        let seen = recorder();
        let later = Arc::clone(&seen);
        let options = Arc::new(
            Options::new()
                .before_request(|_| async { Err(Error::hook("denied")) })
                .before_request(move |_| {
                    let seen = Arc::clone(&later);
                    async move {
                        seen.lock().expect("lock").push("later");
                        Ok(BeforeRequestAction::Continue)
                    }
                }),
        );

        let err = run_before_request(&options, request())
            .await
            .expect_err("hook error");
        let_assert!(Error::Hook(message) = err);
        check!(message == "denied");
        check!(seen.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn respond_short_circuits_before_request() {
        let seen = recorder();
        let later = Arc::clone(&seen);
        let options = Arc::new(
            Options::new()
                .before_request(|_| async {
                    Ok(BeforeRequestAction::Respond(Response::with_status(201)))
                })
                .before_request(move |_| {
                    let seen = Arc::clone(&later);
                    async move {
                        seen.lock().expect("lock").push("later");
                        Ok(BeforeRequestAction::Continue)
                    }
                }),
        );

        let flow = run_before_request(&options, request()).await.expect("flow");
        let_assert!(RequestFlow::Respond(_, response) = flow);
        check!(response.status() == 201);
        check!(seen.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn stop_short_circuits_before_retry() {
        let seen = recorder();
        let later = Arc::clone(&seen);
        let options = Arc::new(
            Options::new()
                .before_retry(|ctx| async move {
                    check!(ctx.retry_count == 1);
                    Ok(STOP)
                })
                .before_retry(move |_| {
                    let seen = Arc::clone(&later);
                    async move {
                        seen.lock().expect("lock").push("later");
                        Ok(BeforeRetryAction::Continue)
                    }
                }),
        );

        let flow = run_before_retry(&options, request(), &Error::connection("reset"), 1)
            .await
            .expect("flow");
        check!(let RetryFlow::Stop = flow);
        check!(seen.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn before_retry_without_hooks_retries_same_request() {
        let options = Arc::new(Options::new());
        let flow = run_before_retry(&options, request(), &Error::connection("reset"), 1)
            .await
            .expect("flow");
        let_assert!(RetryFlow::Retry(retried) = flow);
        check!(retried == request());
    }

    #[tokio::test]
    async fn after_response_hooks_can_replace() {
        let options = Arc::new(
            Options::new()
                .after_response(|ctx| async move {
                    check!(ctx.response.status() == 500);
                    Ok(AfterResponseAction::Replace(Response::with_status(200)))
                })
                .after_response(|ctx| async move {
                    check!(ctx.response.status() == 200);
                    Ok(AfterResponseAction::Continue)
                }),
        );

        let response = run_after_response(&options, &request(), Response::with_status(500))
            .await
            .expect("response");
        check!(response.status() == 200);
    }

    #[tokio::test]
    async fn before_error_hooks_chain_the_error() {
        let options = Arc::new(
            Options::new()
                .before_error(|ctx| async move { Error::hook(format!("wrapped: {}", ctx.error)) })
                .before_error(|ctx| async move { ctx.error }),
        );

        let error = run_before_error(&options, &request(), Error::Timeout).await;
        check!(error.to_string() == "hook failed: wrapped: request timeout");
    }

    #[test]
    fn hook_lists_concatenate_unless_cleared() {
        let parent = Options::new().before_retry(|_| async { Ok(BeforeRetryAction::Continue) });
        let child = Options::new().before_retry(|_| async { Ok(STOP) });

        let merged = parent.merge(child);
        check!(merged.hooks.before_retry.len() == 2);

        let cleared = merged.merge(Options::new().clear_hooks(Phase::BeforeRetry));
        check!(cleared.hooks.before_retry.is_empty());

        // a cleared list keeps masking the ancestors further down the chain
        let grandchild = cleared.merge(Options::new().before_retry(|_| async { Ok(STOP) }));
        check!(grandchild.hooks.before_retry.len() == 1);
    }

    #[test]
    fn stop_is_identifiable() {
        check!(STOP.is_stop());
        check!(!BeforeRetryAction::Continue.is_stop());
        check!(Kyte::new().stop() == STOP);
        check!(BeforeRetryAction::Continue != STOP);
        check!(BeforeRetryAction::Replace(request()) != STOP);
        check!(Phase::BeforeRetry.to_string() == "before-retry");
    }
}
