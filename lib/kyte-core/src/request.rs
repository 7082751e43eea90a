//! HTTP request descriptors.
//!
//! A [`Request`] is the fully resolved target of one call: method, URL,
//! headers and an optional body. Header names are stored lower-cased so
//! lookups are case-insensitive.
//!
//! # Example
//!
//! ```
//! use kyte_core::{Request, Method};
//!
//! let request = Request::builder(Method::Get, "https://api.example.com".parse().unwrap())
//!     .header("Accept", "application/json")
//!     .build();
//!
//! assert_eq!(request.header("accept"), Some("application/json"));
//! ```

use std::collections::HashMap;

use bytes::Bytes;

use crate::Method;

/// An HTTP request with method, URL, headers, and optional body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    url: url::Url,
    headers: HashMap<String, String>,
    body: Option<Bytes>,
}

impl Request {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: url::Url) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// Turns this request back into a builder, e.g. to derive a modified copy in a hook.
    #[must_use]
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            method: self.method,
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URL.
    #[must_use]
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Request headers, keyed by lower-case name.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Sets a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Removes a header, returning its value.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(&name.to_ascii_lowercase())
    }

    /// Single header value by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Consume into (method, url, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (Method, url::Url, HashMap<String, String>, Option<Bytes>) {
        (self.method, self.url, self.headers, self.body)
    }
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url: url::Url,
    headers: HashMap<String, String>,
    body: Option<Bytes>,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: url::Url) -> Self {
        Self {
            method,
            url,
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Overrides the method.
    #[must_use]
    pub const fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Overrides the URL.
    #[must_use]
    pub fn url(mut self, url: url::Url) -> Self {
        self.url = url;
        self
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Sets multiple headers.
    #[must_use]
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(
            headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value)),
        );
        self
    }

    /// Replaces the URL query with the given pairs. An empty iterator leaves the URL untouched.
    #[must_use]
    pub fn replace_query(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut pairs = pairs.into_iter().peekable();
        if pairs.peek().is_none() {
            return self;
        }
        self.url.set_query(None);
        {
            let mut query = self.url.query_pairs_mut();
            for (name, value) in pairs {
                query.append_pair(&name, &value);
            }
        }
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether a header is already set (case-insensitive).
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    /// Builds the [`Request`].
    #[must_use]
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::*;

    fn url(raw: &str) -> url::Url {
        url::Url::parse(raw).expect("valid URL")
    }

    #[test]
    fn request_builder_basic() {
        let request = Request::builder(Method::Get, url("https://api.example.com/users"))
            .header("Accept", "application/json")
            .build();

        check!(request.method() == Method::Get);
        check!(request.url().as_str() == "https://api.example.com/users");
        check!(request.header("ACCEPT") == Some("application/json"));
        check!(request.headers().contains_key("accept"));
        check!(request.body().is_none());
    }

    #[test]
    fn replace_query_drops_existing_query() {
        let request = Request::builder(Method::Get, url("https://api.example.com/users?page=9"))
            .replace_query([("page".to_string(), "1".to_string())])
            .build();
        check!(request.url().as_str() == "https://api.example.com/users?page=1");

        let untouched = Request::builder(Method::Get, url("https://api.example.com/users?page=9"))
            .replace_query(Vec::new())
            .build();
        check!(untouched.url().query() == Some("page=9"));
    }

    #[test]
    fn request_builder_body() {
        let request = Request::builder(Method::Post, url("https://api.example.com/users"))
            .headers([("Content-Type".to_string(), "text/plain".to_string())])
            .body("hello")
            .build();

        check!(request.header("content-type") == Some("text/plain"));
        check!(request.body().map(Bytes::as_ref) == Some(&b"hello"[..]));
    }

    #[test]
    fn to_builder_round_trips_and_allows_edits() {
        let mut request = Request::builder(Method::Get, url("https://api.example.com/a"))
            .header("x-one", "1")
            .build();
        request.set_header("X-Two", "2");

        let edited = request.to_builder().method(Method::Put).build();
        check!(edited.method() == Method::Put);
        check!(edited.header("x-one") == Some("1"));
        check!(edited.header("x-two") == Some("2"));

        check!(request.remove_header("X-ONE") == Some("1".to_string()));
        check!(request.header("x-one") == None);
    }
}
