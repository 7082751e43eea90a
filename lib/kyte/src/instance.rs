//! Client instance.

use std::fmt;
use std::sync::Arc;

use crate::execute::execute;
use crate::hooks::{BeforeRetryAction, STOP};
use crate::options::IntoOptions;
use crate::{HyperTransport, Method, Options, ResponsePromise, Transport};

/// A configured client: a transport plus the options every call inherits.
///
/// Instances are immutable. [`extend`](Self::extend) and
/// [`create`](Self::create) return new instances sharing the same transport
/// (and connection pool); the instance they derive from is left untouched.
///
/// Calls spawn onto the current tokio runtime and must be made from within
/// one.
///
/// # Example
///
/// ```ignore
/// use kyte::{Kyte, Options};
///
/// let api = Kyte::new().extend(
///     Options::new()
///         .prefix_url("https://api.test/v1")
///         .header("authorization", "Bearer s3cr3t"),
/// );
/// let users = api.extend(|parent: &Options| {
///     let prefix = parent.prefix_url.clone().unwrap_or_default();
///     Options::new().prefix_url(format!("{prefix}/users"))
/// });
///
/// let user: User = users.get("42").json().await?;
/// ```
pub struct Kyte<T = HyperTransport> {
    transport: Arc<T>,
    options: Arc<Options>,
}

impl Kyte {
    /// Instance over a default [`HyperTransport`] with library defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(HyperTransport::new(), Options::new())
    }
}

impl Default for Kyte {
    fn default() -> Self {
        Self::new()
    }
}

/// Fresh instance over a default [`HyperTransport`], configured with `options`.
#[must_use]
pub fn create(options: Options) -> Kyte {
    Kyte::with_transport(HyperTransport::new(), options)
}

impl<T: Transport> Kyte<T> {
    /// Instance over a custom transport.
    #[must_use]
    pub fn with_transport(transport: T, options: Options) -> Self {
        Self {
            transport: Arc::new(transport),
            options: Arc::new(options),
        }
    }

    /// New instance configured with `options` on top of library defaults
    /// only. Nothing from this instance's options is inherited.
    #[must_use]
    pub fn create(&self, options: Options) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            options: Arc::new(Options::new().merge(options)),
        }
    }

    /// New instance whose options are these options merged with `options`.
    #[must_use]
    pub fn extend(&self, options: impl IntoOptions) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            options: Arc::new(self.options.merge(options)),
        }
    }

    /// Options inherited by every call.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The stop signal, for returning from before-retry hooks.
    #[must_use]
    pub const fn stop(&self) -> BeforeRetryAction {
        STOP
    }

    /// Call with the instance's method (`GET` unless configured).
    pub fn fetch(&self, input: impl AsRef<str>) -> ResponsePromise {
        self.call(input.as_ref(), Options::new(), None)
    }

    /// Call with per-call options.
    pub fn fetch_with(&self, input: impl AsRef<str>, options: impl IntoOptions) -> ResponsePromise {
        self.call(input.as_ref(), options, None)
    }

    /// `GET` request.
    pub fn get(&self, input: impl AsRef<str>) -> ResponsePromise {
        self.call(input.as_ref(), Options::new(), Some(Method::Get))
    }

    /// `GET` request with per-call options.
    pub fn get_with(&self, input: impl AsRef<str>, options: impl IntoOptions) -> ResponsePromise {
        self.call(input.as_ref(), options, Some(Method::Get))
    }

    /// `POST` request.
    pub fn post(&self, input: impl AsRef<str>) -> ResponsePromise {
        self.call(input.as_ref(), Options::new(), Some(Method::Post))
    }

    /// `POST` request with per-call options.
    pub fn post_with(&self, input: impl AsRef<str>, options: impl IntoOptions) -> ResponsePromise {
        self.call(input.as_ref(), options, Some(Method::Post))
    }

    /// `PUT` request.
    pub fn put(&self, input: impl AsRef<str>) -> ResponsePromise {
        self.call(input.as_ref(), Options::new(), Some(Method::Put))
    }

    /// `PUT` request with per-call options.
    pub fn put_with(&self, input: impl AsRef<str>, options: impl IntoOptions) -> ResponsePromise {
        self.call(input.as_ref(), options, Some(Method::Put))
    }

    /// `PATCH` request.
    pub fn patch(&self, input: impl AsRef<str>) -> ResponsePromise {
        self.call(input.as_ref(), Options::new(), Some(Method::Patch))
    }

    /// `PATCH` request with per-call options.
    pub fn patch_with(&self, input: impl AsRef<str>, options: impl IntoOptions) -> ResponsePromise {
        self.call(input.as_ref(), options, Some(Method::Patch))
    }

    /// `DELETE` request.
    pub fn delete(&self, input: impl AsRef<str>) -> ResponsePromise {
        self.call(input.as_ref(), Options::new(), Some(Method::Delete))
    }

    /// `DELETE` request with per-call options.
    pub fn delete_with(&self, input: impl AsRef<str>, options: impl IntoOptions) -> ResponsePromise {
        self.call(input.as_ref(), options, Some(Method::Delete))
    }

    /// `HEAD` request.
    pub fn head(&self, input: impl AsRef<str>) -> ResponsePromise {
        self.call(input.as_ref(), Options::new(), Some(Method::Head))
    }

    /// `HEAD` request with per-call options.
    pub fn head_with(&self, input: impl AsRef<str>, options: impl IntoOptions) -> ResponsePromise {
        self.call(input.as_ref(), options, Some(Method::Head))
    }

    fn call(&self, input: &str, options: impl IntoOptions, method: Option<Method>) -> ResponsePromise {
        let mut options = self.options.merge(options);
        if method.is_some() {
            options.method = method;
        }

        // configuration errors settle before anything touches the network
        let request = match options.build_request(input) {
            Ok(request) => request,
            Err(err) => return ResponsePromise::ready(Err(err)),
        };

        ResponsePromise::spawn(execute(
            Arc::clone(&self.transport),
            Arc::new(options),
            request,
        ))
    }
}

impl<T> Clone for Kyte<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            options: Arc::clone(&self.options),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Kyte<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kyte")
            .field("transport", &self.transport)
            .field("options", &self.options)
            .finish()
    }
}
