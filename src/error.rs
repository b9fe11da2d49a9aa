//! Contract and binding error types.
//!
//! Errors are split by who can act on them:
//!
//! | Type | Variants | Recovery |
//! |------|----------|----------|
//! | [`ContractError`] | `ContractViolation` | Fix input (never retried) |
//! | [`ContractError`] | `CapabilityUnavailable` | Caller policy: retry, fall back, or surface |
//! | [`BindingError`] | `DuplicateBinding`, `UnboundContract`, `AdapterConstruction`, `RootShutDown` | Fix wiring at startup |
//!
//! Low-level failures (timeouts, malformed payloads, I/O) live in
//! [`TransportError`](crate::adapter::TransportError) and are translated into
//! `CapabilityUnavailable` before they leave an adapter.

use thiserror::Error;

/// Errors a Domain Caller may observe when invoking a capability.
///
/// Exactly two kinds exist. Neither variant carries a transport-specific
/// type; the `reason` is rendered text only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ContractError {
    /// Input was outside the declared shape of the capability.
    #[error("Contract violation on {capability}: {reason}")]
    ContractViolation {
        /// Capability whose contract was violated.
        capability: &'static str,
        /// What was wrong with the input.
        reason: String,
    },

    /// The bound adapter could not satisfy the request.
    #[error("Capability unavailable: {capability}: {reason}")]
    CapabilityUnavailable {
        /// Capability that could not be served.
        capability: &'static str,
        /// Rendered low-level cause.
        reason: String,
    },
}

impl ContractError {
    /// Build a `ContractViolation` for `capability`.
    pub fn violation(capability: &'static str, reason: impl Into<String>) -> Self {
        Self::ContractViolation {
            capability,
            reason: reason.into(),
        }
    }

    /// Build a `CapabilityUnavailable` for `capability`.
    pub fn unavailable(capability: &'static str, reason: impl Into<String>) -> Self {
        Self::CapabilityUnavailable {
            capability,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the same call may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CapabilityUnavailable { .. })
    }

    /// Name of the capability this error was raised for.
    pub fn capability(&self) -> &'static str {
        match self {
            Self::ContractViolation { capability, .. }
            | Self::CapabilityUnavailable { capability, .. } => capability,
        }
    }
}

/// Errors raised while wiring or resolving bindings at the composition root.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BindingError {
    /// The capability already has an adapter and no override was requested.
    #[error("Capability already bound: {capability}")]
    DuplicateBinding {
        /// Capability that was bound twice.
        capability: &'static str,
    },

    /// Nothing was registered for the requested capability.
    #[error("No adapter bound for capability: {capability}")]
    UnboundContract {
        /// Capability that was requested.
        capability: &'static str,
    },

    /// The adapter factory failed.
    #[error("Failed to construct adapter for {capability}: {reason}")]
    AdapterConstruction {
        /// Capability the adapter was meant to serve.
        capability: &'static str,
        /// Rendered construction failure.
        reason: String,
    },

    /// The composition root was shut down; its adapters are released.
    #[error("Composition root shut down, cannot resolve {capability}")]
    RootShutDown {
        /// Capability that was requested.
        capability: &'static str,
    },
}

/// Result type for capability invocations.
pub type ContractResult<T> = Result<T, ContractError>;

/// Result type for composition root operations.
pub type BindingResult<T> = Result<T, BindingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ContractError::unavailable("search", "timeout").is_retryable());
        assert!(!ContractError::violation("search", "empty query").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ContractError::violation("search", "query must not be empty");
        assert_eq!(
            err.to_string(),
            "Contract violation on search: query must not be empty"
        );

        let err = BindingError::UnboundContract {
            capability: "search",
        };
        assert_eq!(err.to_string(), "No adapter bound for capability: search");
    }

    #[test]
    fn test_capability_accessor() {
        assert_eq!(ContractError::unavailable("search", "x").capability(), "search");
    }
}
