//! Server-side admission control.

use std::time::Duration;

use leaky_bucket::RateLimiter;
use tracing::warn;

use crate::{
    call::{ServerCall, ServerCallHandler, ServerCallListener},
    config::RateLimitConfig,
    error::Result,
    interceptor::ServerInterceptor,
    metadata::Metadata,
    status::Status,
};

/// Admits incoming calls through a token bucket.
///
/// Calls that find the bucket empty are closed with `RESOURCE_EXHAUSTED` and
/// never reach the handler.
pub struct RateLimitInterceptor {
    limiter: RateLimiter,
}

impl RateLimitInterceptor {
    /// Build a limiter that starts full with `config.burst()` permits and
    /// refills `config.rate()` permits each second.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let limiter = RateLimiter::builder()
            .initial(config.burst())
            .refill(config.rate())
            .interval(Duration::from_secs(1))
            .max(config.burst())
            .build();
        Self { limiter }
    }
}

impl Default for RateLimitInterceptor {
    fn default() -> Self { Self::new(RateLimitConfig::default()) }
}

/// Listener installed for rejected calls.
struct Rejected;

impl<Req> ServerCallListener<Req> for Rejected {}

impl<Req, Resp> ServerInterceptor<Req, Resp> for RateLimitInterceptor {
    fn intercept_call(
        &self,
        mut call: Box<dyn ServerCall<Req, Resp>>,
        headers: Metadata,
        next: &dyn ServerCallHandler<Req, Resp>,
    ) -> Result<Box<dyn ServerCallListener<Req>>> {
        if self.limiter.try_acquire(1) {
            return next.start_call(call, headers);
        }
        warn!(method = %call.method_descriptor(), "call rejected by rate limiter");
        call.close(Status::resource_exhausted("rate limit exceeded"), Metadata::new())?;
        Ok(Box::new(Rejected))
    }
}
