//! Tower layers for [`HyperTransport`](crate::HyperTransport).
//!
//! Layers wrap the transport, so they see each attempt separately: a call
//! retried twice goes through them three times. Hooks, by contrast, see the
//! call as a whole.
//!
//! ```ignore
//! use kyte::HyperTransport;
//! use kyte::middleware::{ConcurrencyLimitLayer, LoggingLayer};
//!
//! let transport = HyperTransport::builder()
//!     .layer(LoggingLayer::debug())
//!     .layer(ConcurrencyLimitLayer::new(8))
//!     .build();
//! ```

mod logging;

pub use logging::{Logging, LoggingLayer, Verbosity};

pub use tower::limit::ConcurrencyLimitLayer;
pub use tower::{Layer, ServiceBuilder};
