//! HTTP response handling.
//!
//! [`Response`] is fully buffered: the transport collects the body before
//! handing the response over, so decoding never touches the network and can
//! be repeated.

use std::collections::HashMap;

use bytes::Bytes;

/// HTTP response with status, headers, and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl Response {
    /// Creates a new response. Header names are lower-cased.
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value))
                .collect(),
            body: body.into(),
        }
    }

    /// Response with the given status, no headers and an empty body.
    #[must_use]
    pub fn with_status(status: u16) -> Self {
        Self::new(status, HashMap::new(), Bytes::new())
    }

    /// Adds a header.
    #[must_use]
    pub fn header_value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers, keyed by lower-case name.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Raw response body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Deserialize the body as JSON.
    ///
    /// A `204 No Content` status or an empty body decodes as JSON `null`, so
    /// `Option<T>`, `()` and `serde_json::Value` targets succeed on them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::JsonDeserialization`] if the bytes do not match `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        if self.status == 204 || self.body.is_empty() {
            return crate::from_json(b"null");
        }
        crate::from_json(&self.body)
    }

    /// Body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TextDecode`] if the body is not valid UTF-8.
    pub fn text(&self) -> crate::Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| crate::Error::TextDecode(e.to_string()))
    }

    /// Body as raw bytes (cheap, reference counted).
    #[must_use]
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    /// Deserialize an `application/x-www-form-urlencoded` body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FormDeserialization`] if the body is not valid form data for `T`.
    pub fn form<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        crate::from_form(&self.body)
    }
}
