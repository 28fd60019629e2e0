//! Configuration for channels and stock interceptors.
//!
//! Both types follow the builder style used across the crate: start from
//! [`Default`] and override individual settings.

use std::time::Duration;

use thiserror::Error;

use crate::method::CallOptions;

/// Default admission rate for [`RateLimitConfig`], in calls per second.
pub const DEFAULT_CALL_RATE: usize = 100;
/// Upper bound accepted for [`RateLimitConfig::rate`].
pub const MAX_CALL_RATE: usize = 100_000;

/// Errors raised when validating configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The rate was zero or exceeded [`MAX_CALL_RATE`].
    #[error("invalid rate {0}; must be between 1 and {max}", max = MAX_CALL_RATE)]
    InvalidRate(usize),
    /// The burst was zero or smaller than the rate.
    #[error("invalid burst {burst}; must be at least the rate {rate}")]
    InvalidBurst {
        /// Configured burst.
        burst: usize,
        /// Configured rate.
        rate: usize,
    },
}

/// Settings for a client channel.
///
/// ```
/// use std::time::Duration;
///
/// use callframe::config::ChannelConfig;
///
/// let config = ChannelConfig::default()
///     .with_authority("orders.internal")
///     .with_default_deadline(Duration::from_secs(2));
/// assert_eq!(config.authority(), "orders.internal");
/// assert_eq!(config.default_options().deadline(), Some(Duration::from_secs(2)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    authority: String,
    default_options: CallOptions,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            authority: "localhost".to_owned(),
            default_options: CallOptions::default(),
        }
    }
}

impl ChannelConfig {
    /// Set the authority reported by the channel.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Options applied to every call unless the caller sets them.
    #[must_use]
    pub fn with_default_options(mut self, options: CallOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Shorthand for a default deadline.
    #[must_use]
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_options = self.default_options.with_deadline(deadline);
        self
    }

    #[must_use]
    pub fn authority(&self) -> &str { &self.authority }

    #[must_use]
    pub fn default_options(&self) -> &CallOptions { &self.default_options }
}

/// Admission settings for [`crate::interceptors::RateLimitInterceptor`].
///
/// The limiter starts full, refills `rate` permits every second and holds at
/// most `burst` permits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    rate: usize,
    burst: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate: DEFAULT_CALL_RATE,
            burst: DEFAULT_CALL_RATE,
        }
    }
}

impl RateLimitConfig {
    /// Admit `rate` calls per second with a burst equal to the rate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRate`] if `rate` is zero or above
    /// [`MAX_CALL_RATE`].
    pub fn per_second(rate: usize) -> Result<Self, ConfigError> {
        if rate == 0 || rate > MAX_CALL_RATE {
            return Err(ConfigError::InvalidRate(rate));
        }
        Ok(Self { rate, burst: rate })
    }

    /// Allow up to `burst` calls at once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBurst`] if `burst` is below the rate.
    pub fn with_burst(self, burst: usize) -> Result<Self, ConfigError> {
        if burst < self.rate {
            return Err(ConfigError::InvalidBurst {
                burst,
                rate: self.rate,
            });
        }
        Ok(Self { burst, ..self })
    }

    #[must_use]
    pub fn rate(&self) -> usize { self.rate }

    #[must_use]
    pub fn burst(&self) -> usize { self.burst }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0)]
    #[case(MAX_CALL_RATE + 1)]
    fn rejects_out_of_range_rates(#[case] rate: usize) {
        assert_eq!(
            RateLimitConfig::per_second(rate),
            Err(ConfigError::InvalidRate(rate))
        );
    }

    #[test]
    fn burst_must_cover_rate() {
        let config = RateLimitConfig::per_second(10).expect("valid rate");
        assert!(config.with_burst(5).is_err());
        let config = config.with_burst(20).expect("valid burst");
        assert_eq!((config.rate(), config.burst()), (10, 20));
    }
}
