//! Ready-made interceptors.
//!
//! [`HeaderInjector`] and [`LoggingInterceptor`] work on both sides of a call;
//! [`RateLimitInterceptor`] is server-only. Metrics collection lives in
//! [`crate::metrics`].

mod headers;
mod logging;
mod rate_limit;

pub use headers::HeaderInjector;
pub use logging::LoggingInterceptor;
pub use rate_limit::RateLimitInterceptor;
