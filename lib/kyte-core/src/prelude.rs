//! Prelude module for convenient imports.
//!
//! ```ignore
//! use kyte_core::prelude::*;
//! ```

pub use crate::{
    ContentType, Error, ErrorKind, Method, Request, RequestBuilder, Response, Result, Transport,
    from_json, to_form, to_json,
};
