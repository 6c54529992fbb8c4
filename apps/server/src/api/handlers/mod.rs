//! Request handlers for API endpoints
//!
//! Handlers extract the request and hand it to the view orchestrator; the
//! orchestrator's errors render themselves as `{"detail": ...}` responses.

pub mod metrics;
pub mod views;

pub use metrics::*;
