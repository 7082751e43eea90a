//! Core types and traits for the kyte HTTP client.
//!
//! This crate provides the foundational, transport-agnostic types used by kyte:
//! - [`Method`] - HTTP method enum
//! - [`Request`] and [`RequestBuilder`] - resolved request descriptors
//! - [`Response`] - buffered HTTP response with body decoders
//! - [`Error`], [`ErrorKind`] and [`Result`] - Error handling
//! - [`Transport`] - the seam that performs the network exchange
//! - body codecs: [`to_json`], [`to_form`], [`from_json`], [`from_form`]

mod body;
mod error;
mod method;
pub mod prelude;
mod request;
mod response;
mod transport;

pub use body::{
    ContentType, form_pairs, from_form, from_json, to_form, to_json, to_query_pairs,
};
pub use error::{Error, ErrorKind, Result};
pub use method::Method;
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use transport::Transport;
