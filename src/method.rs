//! Method descriptors and per-call options.

use std::{fmt, time::Duration};

use crate::error::CallError;

/// Streaming shape of a method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodType {
    /// One request, one response.
    Unary,
    /// Many requests, one response.
    ClientStreaming,
    /// One request, many responses.
    ServerStreaming,
    /// Many requests, many responses.
    BidiStreaming,
    /// Shape not known to the runtime.
    Unknown,
}

impl MethodType {
    /// Returns `true` if the client sends exactly one message.
    #[must_use]
    pub fn client_sends_one(self) -> bool { matches!(self, Self::Unary | Self::ServerStreaming) }

    /// Returns `true` if the server sends exactly one message.
    #[must_use]
    pub fn server_sends_one(self) -> bool { matches!(self, Self::Unary | Self::ClientStreaming) }
}

/// Identifies a remote method by its `service/method` full name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    full_name: String,
    method_type: MethodType,
}

impl MethodDescriptor {
    /// Create a descriptor from a full method name.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Delegation`] if `full_name` is not of the form
    /// `service/method` with both halves non-empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use callframe::method::{MethodDescriptor, MethodType};
    ///
    /// let method = MethodDescriptor::new("echo.Echo/Say", MethodType::Unary).expect("valid name");
    /// assert_eq!(method.service_name(), "echo.Echo");
    /// assert_eq!(method.bare_method_name(), "Say");
    /// ```
    pub fn new(full_name: impl Into<String>, method_type: MethodType) -> Result<Self, CallError> {
        let full_name = full_name.into();
        let valid = full_name
            .split_once('/')
            .is_some_and(|(service, method)| {
                !service.is_empty() && !method.is_empty() && !method.contains('/')
            });
        if !valid {
            return Err(CallError::Delegation(format!(
                "malformed method name {full_name:?}"
            )));
        }
        Ok(Self {
            full_name,
            method_type,
        })
    }

    /// The `service/method` full name.
    #[must_use]
    pub fn full_name(&self) -> &str { &self.full_name }

    /// The service half of the full name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.full_name.split_once('/').map_or("", |(service, _)| service)
    }

    /// The method half of the full name.
    #[must_use]
    pub fn bare_method_name(&self) -> &str {
        self.full_name.split_once('/').map_or("", |(_, method)| method)
    }

    /// The streaming shape.
    #[must_use]
    pub fn method_type(&self) -> MethodType { self.method_type }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.full_name) }
}

/// Join a service and method name into a full method name.
#[must_use]
pub fn generate_full_method_name(service: &str, method: &str) -> String {
    format!("{service}/{method}")
}

/// Options carried with a call to the transport.
///
/// The forwarding layer never acts on these; a transport may enforce
/// [`CallOptions::deadline`] and report expiry through `on_close`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallOptions {
    authority: Option<String>,
    compressor: Option<String>,
    wait_for_ready: bool,
    deadline: Option<Duration>,
}

impl CallOptions {
    /// Override the authority sent with the call.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    /// Name the message compressor to use.
    #[must_use]
    pub fn with_compressor(mut self, compressor: impl Into<String>) -> Self {
        self.compressor = Some(compressor.into());
        self
    }

    /// Queue the call until the transport is ready rather than failing fast.
    #[must_use]
    pub fn with_wait_for_ready(mut self, wait: bool) -> Self {
        self.wait_for_ready = wait;
        self
    }

    /// Deadline relative to call start.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The authority override, if any.
    #[must_use]
    pub fn authority(&self) -> Option<&str> { self.authority.as_deref() }

    /// The compressor name, if any.
    #[must_use]
    pub fn compressor(&self) -> Option<&str> { self.compressor.as_deref() }

    /// Whether the call waits for readiness.
    #[must_use]
    pub fn wait_for_ready(&self) -> bool { self.wait_for_ready }

    /// The relative deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> { self.deadline }

    /// Fill every unset option from `defaults`.
    #[must_use]
    pub fn or_defaults(self, defaults: &CallOptions) -> Self {
        Self {
            authority: self.authority.or_else(|| defaults.authority.clone()),
            compressor: self.compressor.or_else(|| defaults.compressor.clone()),
            wait_for_ready: self.wait_for_ready || defaults.wait_for_ready,
            deadline: self.deadline.or(defaults.deadline),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("")]
    #[case("NoSlash")]
    #[case("/Method")]
    #[case("svc/")]
    #[case("a/b/c")]
    fn rejects_malformed_names(#[case] name: &str) {
        assert!(MethodDescriptor::new(name, MethodType::Unary).is_err());
    }

    #[test]
    fn splits_full_name() {
        let full = generate_full_method_name("pkg.Service", "Call");
        let method = MethodDescriptor::new(full, MethodType::BidiStreaming).expect("valid");
        assert_eq!(method.service_name(), "pkg.Service");
        assert_eq!(method.bare_method_name(), "Call");
        assert!(!method.method_type().client_sends_one());
    }

    #[test]
    fn explicit_options_win_over_defaults() {
        let defaults = CallOptions::default()
            .with_authority("default.example")
            .with_deadline(Duration::from_secs(5));
        let options = CallOptions::default()
            .with_deadline(Duration::from_millis(10))
            .or_defaults(&defaults);
        assert_eq!(options.deadline(), Some(Duration::from_millis(10)));
        assert_eq!(options.authority(), Some("default.example"));
        assert_eq!(options.compressor(), None);
    }
}
