//! Fetch-style HTTP client with inheritable defaults, lifecycle hooks and retries.
//!
//! A [`Kyte`] instance holds a transport and a set of [`Options`]. Instances
//! are derived from one another with [`Kyte::extend`], which merges options
//! (headers key by key, hooks concatenated parent first), or reset with
//! [`Kyte::create`]. Every call returns a [`ResponsePromise`] that can be
//! awaited directly or decoded with `json`, `text`, `bytes` or `form`.
//!
//! # Example
//!
//! ```ignore
//! use kyte::{BeforeRetryAction, Kyte, Options, RetryPolicy};
//!
//! #[derive(Debug, serde::Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! let api = Kyte::new().extend(
//!     Options::new()
//!         .prefix_url("https://api.example.com")
//!         .retry(RetryPolicy::default().limit(3))
//!         .before_retry(|ctx| async move {
//!             if ctx.error.status() == Some(503) {
//!                 return Ok(kyte::STOP);
//!             }
//!             Ok(BeforeRetryAction::Continue)
//!         }),
//! );
//!
//! let user: User = api.get("users/42").json().await?;
//! ```
//!
//! # Lifecycle
//!
//! The whole lifecycle runs under one timeout, measured from the start of
//! the call.
//!
//! 1. before-request hooks run once; one of them may answer directly
//! 2. the request is attempted
//! 3. retryable failures run the before-retry hooks, then wait and retry;
//!    a hook returning [`STOP`] resolves the call with no response
//! 4. after-response hooks run on the final response
//! 5. a non-2xx status becomes [`Error::Http`], passed through the
//!    before-error hooks
//!
//! Logging goes through `tracing`; install a subscriber to see it.

mod config;
mod execute;
mod hooks;
mod instance;
pub mod middleware;
mod options;
pub mod prelude;
mod promise;
mod retry;
mod transport;

pub use config::{TransportConfig, TransportConfigBuilder};
pub use hooks::{
    AfterResponseAction, AfterResponseContext, AfterResponseHook, BeforeErrorContext,
    BeforeErrorHook, BeforeRequestAction, BeforeRequestContext, BeforeRequestHook,
    BeforeRetryAction, BeforeRetryContext, BeforeRetryHook, HookList, Hooks, Phase, STOP,
};
pub use instance::{Kyte, create};
pub use options::{DEFAULT_TIMEOUT, IntoOptions, Options};
pub use promise::{Outcome, ResponsePromise};
pub use retry::{DelayFn, RetryPolicy};
pub use transport::{BoxedService, HyperTransport, HyperTransportBuilder, ServiceFuture};

pub use kyte_core::{
    ContentType, Error, ErrorKind, Method, Request, RequestBuilder, Response, Result, Transport,
    form_pairs, from_form, from_json, to_form, to_json, to_query_pairs,
};

pub use tokio_util::sync::CancellationToken;
pub use tower;
pub use url;
