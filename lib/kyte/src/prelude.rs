//! Prelude module for convenient imports.
//!
//! ```ignore
//! use kyte::prelude::*;
//! ```

pub use crate::{
    AfterResponseAction, BeforeRequestAction, BeforeRetryAction, CancellationToken, Error,
    ErrorKind, HyperTransport, Kyte, Method, Options, Phase, Request, Response, ResponsePromise,
    Result, RetryPolicy, STOP, Transport,
};
pub use serde::{Deserialize, Serialize};
