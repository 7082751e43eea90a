//! Options and their merge rules.
//!
//! [`Options`] is both the configuration of a client instance and the
//! per-call override record. Every field is optional; unset fields inherit
//! from the parent when two records are [merged](Options::merge):
//!
//! - scalars (`method`, `prefix_url`, `body`, `json`, `timeout`,
//!   `throw_http_errors`, `signal`): the child value wins when present
//! - `headers` and `search_params`: merged key by key, child wins per key
//! - `retry`: a child policy replaces the parent policy as a whole
//! - `hooks`: concatenated per phase, parent first, unless the child cleared
//!   the phase
//!
//! Merging never mutates either side.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::hooks::{
    AfterResponseAction, AfterResponseContext, BeforeErrorContext, BeforeRequestAction,
    BeforeRequestContext, BeforeRetryAction, BeforeRetryContext, Hooks, Phase,
};
use crate::retry::{DEFAULT_POLICY, RetryPolicy};
use crate::{ContentType, Error, Method, Request, Result};

/// Default timeout for a whole call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request options, inheritable through [`Options::merge`].
///
/// # Example
///
/// ```
/// use kyte::Options;
///
/// let base = Options::new()
///     .prefix_url("https://api.test")
///     .header("accept", "application/json");
/// let users = base.merge(|parent: &Options| {
///     Options::new().prefix_url(format!("{}/users", parent.prefix_url.as_deref().unwrap_or_default()))
/// });
///
/// assert_eq!(users.prefix_url.as_deref(), Some("https://api.test/users"));
/// assert_eq!(users.header_value("Accept"), Some("application/json"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// HTTP method (default `GET`).
    pub method: Option<Method>,
    /// Prefix joined in front of relative inputs.
    pub prefix_url: Option<String>,
    /// Headers by lower-case name. `None` unsets an inherited header.
    pub headers: BTreeMap<String, Option<String>>,
    /// Query parameters; they replace any query already in the input.
    pub search_params: Vec<(String, String)>,
    /// Raw request body.
    pub body: Option<Bytes>,
    /// Serialized JSON body.
    pub json: Option<Bytes>,
    /// Deadline for the whole call, hooks and backoff included: `Some(None)`
    /// disables it (default 10 s).
    pub timeout: Option<Option<Duration>>,
    /// Retry policy, replaced as a whole when merged.
    pub retry: Option<RetryPolicy>,
    /// Turn non-2xx final responses into [`Error::Http`] (default `true`).
    pub throw_http_errors: Option<bool>,
    /// Lifecycle hooks.
    pub hooks: Hooks,
    /// Cancellation signal.
    pub signal: Option<CancellationToken>,
}

/// An override applied on top of parent options.
///
/// Implemented by [`Options`] itself and by closures computing the override
/// from the parent, e.g. to extend the parent's prefix URL.
pub trait IntoOptions {
    /// Produce the override record.
    fn into_options(self, parent: &Options) -> Options;
}

impl IntoOptions for Options {
    fn into_options(self, _parent: &Options) -> Options {
        self
    }
}

impl<F> IntoOptions for F
where
    F: FnOnce(&Options) -> Options,
{
    fn into_options(self, parent: &Options) -> Options {
        self(parent)
    }
}

impl Options {
    /// Empty options: everything inherited.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an override on top of these options, producing a new record.
    #[must_use]
    pub fn merge(&self, child: impl IntoOptions) -> Self {
        let child = child.into_options(self);
        Self {
            method: child.method.or(self.method),
            prefix_url: child.prefix_url.or_else(|| self.prefix_url.clone()),
            headers: merge_headers(&self.headers, child.headers),
            search_params: merge_search_params(&self.search_params, child.search_params),
            body: child.body.or_else(|| self.body.clone()),
            json: child.json.or_else(|| self.json.clone()),
            timeout: child.timeout.or(self.timeout),
            retry: child.retry.or_else(|| self.retry.clone()),
            throw_http_errors: child.throw_http_errors.or(self.throw_http_errors),
            hooks: self.hooks.merge(child.hooks),
            signal: child.signal.or_else(|| self.signal.clone()),
        }
    }

    // ========================================================================
    // Setters
    // ========================================================================

    /// Set the HTTP method.
    #[must_use]
    pub const fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the prefix URL.
    #[must_use]
    pub fn prefix_url(mut self, prefix: impl Into<String>) -> Self {
        self.prefix_url = Some(prefix.into());
        self
    }

    /// Set a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), Some(value.into()));
        self
    }

    /// Unset a header, including one inherited from a parent.
    #[must_use]
    pub fn remove_header(mut self, name: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), None);
        self
    }

    /// Add a query parameter. Repeating a name keeps every value.
    #[must_use]
    pub fn search_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.search_params.push((name.into(), value.to_string()));
        self
    }

    /// Set query parameters from a serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be flattened into pairs.
    pub fn search_params<T: serde::Serialize>(mut self, params: &T) -> Result<Self> {
        self.search_params
            .extend(kyte_core::to_query_pairs(params)?);
        Ok(self)
    }

    /// Set a raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body. `content-type: application/json` is sent unless set explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Result<Self> {
        self.json = Some(kyte_core::to_json(value)?);
        Ok(self)
    }

    /// Set a form-urlencoded body and its content type.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn form<T: serde::Serialize>(self, value: &T) -> Result<Self> {
        let body = kyte_core::to_form(value)?;
        Ok(self
            .header("content-type", ContentType::FormUrlEncoded.as_str())
            .body(body))
    }

    /// Set the timeout for the whole call, measured from its start.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(Some(timeout));
        self
    }

    /// Disable the timeout.
    #[must_use]
    pub const fn no_timeout(mut self) -> Self {
        self.timeout = Some(None);
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Shorthand for the default policy with the given number of retries.
    #[must_use]
    pub fn retry_limit(self, limit: u32) -> Self {
        self.retry(RetryPolicy::default().limit(limit))
    }

    /// Choose whether non-2xx final responses become errors.
    #[must_use]
    pub const fn throw_http_errors(mut self, throw: bool) -> Self {
        self.throw_http_errors = Some(throw);
        self
    }

    /// Attach a cancellation signal.
    #[must_use]
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Add a before-request hook.
    #[must_use]
    pub fn before_request<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(BeforeRequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BeforeRequestAction>> + Send + 'static,
    {
        self.hooks.add_before_request(hook);
        self
    }

    /// Add a before-retry hook.
    #[must_use]
    pub fn before_retry<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(BeforeRetryContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BeforeRetryAction>> + Send + 'static,
    {
        self.hooks.add_before_retry(hook);
        self
    }

    /// Add an after-response hook.
    #[must_use]
    pub fn after_response<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(AfterResponseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<AfterResponseAction>> + Send + 'static,
    {
        self.hooks.add_after_response(hook);
        self
    }

    /// Add a before-error hook.
    #[must_use]
    pub fn before_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(BeforeErrorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Error> + Send + 'static,
    {
        self.hooks.add_before_error(hook);
        self
    }

    /// Drop every hook of a phase, inherited ones included.
    #[must_use]
    pub fn clear_hooks(mut self, phase: Phase) -> Self {
        self.hooks.clear(phase);
        self
    }

    // ========================================================================
    // Effective values
    // ========================================================================

    /// Effective method.
    #[must_use]
    pub fn effective_method(&self) -> Method {
        self.method.unwrap_or(Method::Get)
    }

    /// Effective call timeout, `None` when disabled.
    #[must_use]
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.unwrap_or(Some(DEFAULT_TIMEOUT))
    }

    /// Effective retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        self.retry.as_ref().unwrap_or(&DEFAULT_POLICY)
    }

    /// Whether non-2xx final responses become errors.
    #[must_use]
    pub fn throws_http_errors(&self) -> bool {
        self.throw_http_errors.unwrap_or(true)
    }

    /// Effective value of a header (case-insensitive).
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(Option::as_deref)
    }

    /// Resolve an input against these options into a request descriptor.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when:
    /// - the input starts with `/` while a prefix URL is set
    /// - the resulting URL does not parse
    /// - both `body` and `json` are set
    pub fn build_request(&self, input: &str) -> Result<Request> {
        let url = match &self.prefix_url {
            Some(prefix) => {
                if input.starts_with('/') {
                    return Err(Error::invalid_options(
                        "input must not begin with a slash when using prefix_url",
                    ));
                }
                let separator = if prefix.ends_with('/') { "" } else { "/" };
                format!("{prefix}{separator}{input}")
            }
            None => input.to_string(),
        };
        let url = url::Url::parse(&url)?;

        let mut builder = Request::builder(self.effective_method(), url)
            .replace_query(self.search_params.iter().cloned())
            .headers(
                self.headers
                    .iter()
                    .filter_map(|(name, value)| Some((name.clone(), value.clone()?))),
            );

        match (&self.body, &self.json) {
            (Some(_), Some(_)) => {
                return Err(Error::invalid_options(
                    "`body` and `json` cannot both be set",
                ));
            }
            (Some(body), None) => builder = builder.body(body.clone()),
            (None, Some(json)) => {
                if !builder.has_header("content-type") {
                    builder = builder.header("content-type", ContentType::Json.as_str());
                }
                builder = builder.body(json.clone());
            }
            (None, None) => {}
        }

        Ok(builder.build())
    }
}

fn merge_headers(
    parent: &BTreeMap<String, Option<String>>,
    child: BTreeMap<String, Option<String>>,
) -> BTreeMap<String, Option<String>> {
    let mut merged = parent.clone();
    merged.extend(
        child
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value)),
    );
    merged
}

/// Child keys replace every parent entry with the same key.
fn merge_search_params(
    parent: &[(String, String)],
    child: Vec<(String, String)>,
) -> Vec<(String, String)> {
    let mut merged: Vec<_> = parent
        .iter()
        .filter(|(name, _)| !child.iter().any(|(key, _)| key == name))
        .cloned()
        .collect();
    merged.extend(child);
    merged
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;

    #[test]
    fn scalars_child_wins() {
        let parent = Options::new()
            .method(Method::Post)
            .prefix_url("https://a.test")
            .timeout(Duration::from_secs(1));
        let child = Options::new().prefix_url("https://b.test");

        let merged = parent.merge(child);
        check!(merged.method == Some(Method::Post));
        check!(merged.prefix_url.as_deref() == Some("https://b.test"));
        check!(merged.effective_timeout() == Some(Duration::from_secs(1)));
    }

    #[test]
    fn headers_merge_key_wise() {
        let merged = Options::new()
            .header("a", "1")
            .header("c", "parent")
            .merge(Options::new().header("B", "2").header("c", "child"));

        check!(merged.header_value("a") == Some("1"));
        check!(merged.header_value("b") == Some("2"));
        check!(merged.header_value("c") == Some("child"));
    }

    #[test]
    fn header_can_be_unset() {
        let merged = Options::new()
            .header("authorization", "Bearer x")
            .merge(Options::new().remove_header("Authorization"));
        check!(merged.header_value("authorization") == None);

        let request = merged.build_request("https://api.test/").expect("request");
        check!(request.header("authorization") == None);
    }

    #[test]
    fn search_params_merge_key_wise() {
        let merged = Options::new()
            .search_param("page", 1)
            .search_param("tag", "a")
            .search_param("tag", "b")
            .merge(Options::new().search_param("page", 2).search_param("sort", "asc"));

        check!(
            merged.search_params
                == vec![
                    ("tag".to_string(), "a".to_string()),
                    ("tag".to_string(), "b".to_string()),
                    ("page".to_string(), "2".to_string()),
                    ("sort".to_string(), "asc".to_string()),
                ]
        );
    }

    #[test]
    fn retry_policy_is_replaced_whole() {
        let parent = Options::new().retry(
            RetryPolicy::default()
                .limit(5)
                .status_codes([500]),
        );
        let merged = parent.merge(Options::new().retry_limit(1));

        check!(merged.retry_policy().retry_limit() == 1);
        // status codes are back to the defaults, not inherited
        check!(merged.retry_policy().allows_status(503));
    }

    #[test]
    fn merge_does_not_mutate_inputs() {
        let parent = Options::new().header("a", "1");
        let _child = parent.merge(Options::new().header("a", "2").header("b", "3"));

        check!(parent.header_value("a") == Some("1"));
        check!(parent.header_value("b") == None);
    }

    #[test]
    fn disjoint_extensions_are_associative() {
        let base = Options::new().header("x", "0");
        let a = || Options::new().header("a", "1").search_param("q", "rust");
        let b = || Options::new().timeout(Duration::from_secs(3)).method(Method::Put);

        let left = base.merge(a()).merge(b());
        let right = base.merge(a().merge(b()));

        check!(left.headers == right.headers);
        check!(left.search_params == right.search_params);
        check!(left.timeout == right.timeout);
        check!(left.method == right.method);
    }

    #[test]
    fn function_override_sees_parent() {
        let base = Options::new().prefix_url("https://api.test/v1");
        let extended = base.merge(|parent: &Options| {
            let prefix = parent.prefix_url.clone().unwrap_or_default();
            Options::new().prefix_url(format!("{prefix}/users"))
        });
        check!(extended.prefix_url.as_deref() == Some("https://api.test/v1/users"));
    }

    #[test]
    fn defaults() {
        let options = Options::new();
        check!(options.effective_method() == Method::Get);
        check!(options.effective_timeout() == Some(DEFAULT_TIMEOUT));
        check!(options.throws_http_errors());
        check!(options.retry_policy().retry_limit() == 2);
        check!(Options::new().no_timeout().effective_timeout() == None);
    }

    #[test]
    fn build_request_joins_prefix() {
        let options = Options::new().prefix_url("https://api.test/");
        let request = options.build_request("users/1").expect("request");
        check!(request.url().as_str() == "https://api.test/users/1");

        let options = Options::new().prefix_url("https://api.test/v2");
        let request = options.build_request("users").expect("request");
        check!(request.url().as_str() == "https://api.test/v2/users");
    }

    #[test]
    fn build_request_rejects_leading_slash_with_prefix() {
        let options = Options::new().prefix_url("https://api.test/");
        let_assert!(Err(err) = options.build_request("/users"));
        check!(err.kind() == crate::ErrorKind::Configuration);
    }

    #[test]
    fn build_request_requires_absolute_input_without_prefix() {
        let_assert!(Err(Error::InvalidUrl(_)) = Options::new().build_request("users/1"));
    }

    #[test]
    fn build_request_replaces_query() {
        let options = Options::new().search_param("page", 2);
        let request = options
            .build_request("https://api.test/users?page=1&x=y")
            .expect("request");
        check!(request.url().as_str() == "https://api.test/users?page=2");

        let request = Options::new()
            .build_request("https://api.test/users?page=1")
            .expect("request");
        check!(request.url().query() == Some("page=1"));
    }

    #[test]
    fn build_request_json_body() {
        let options = Options::new()
            .method(Method::Post)
            .json(&serde_json::json!({"name": "kyte"}))
            .expect("json");
        let request = options.build_request("https://api.test/items").expect("request");
        check!(request.header("content-type") == Some("application/json"));
        check!(request.body().map(Bytes::as_ref) == Some(&br#"{"name":"kyte"}"#[..]));

        let custom = options
            .header("content-type", "application/vnd.api+json")
            .build_request("https://api.test/items")
            .expect("request");
        check!(custom.header("content-type") == Some("application/vnd.api+json"));
    }

    #[test]
    fn build_request_rejects_conflicting_bodies() {
        let options = Options::new()
            .body("raw")
            .merge(Options::new().json(&1).expect("json"));
        let_assert!(Err(Error::InvalidOptions(message)) = options.build_request("https://api.test/"));
        check!(message.contains("body"));
    }

    #[test]
    fn form_body_sets_content_type() {
        let options = Options::new()
            .form(&[("user", "alice")])
            .expect("form");
        let request = options.build_request("https://api.test/login").expect("request");
        check!(request.header("content-type") == Some("application/x-www-form-urlencoded"));
        check!(request.body().map(Bytes::as_ref) == Some(&b"user=alice"[..]));
    }

    #[test]
    fn search_params_from_struct() {
        #[derive(serde::Serialize)]
        struct Query {
            q: &'static str,
            limit: u8,
        }

        let options = Options::new()
            .search_params(&Query { q: "a b", limit: 5 })
            .expect("query");
        let request = options.build_request("https://api.test/search").expect("request");
        check!(request.url().as_str() == "https://api.test/search?q=a+b&limit=5");
    }
}
