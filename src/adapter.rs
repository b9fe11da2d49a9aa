//! Adapter trait and the low-level error type adapters translate from.
//!
//! # Adapter lifecycle
//!
//! ```text
//!   construct (owns resources) ──→ invoke()* ──→ shutdown() ──→ drop
//!        at composition root        (async)       (async)
//! ```
//!
//! ## Method table
//!
//! | Method | Kind | Required | Returns |
//! |--------|------|----------|---------|
//! | `name()` | sync | yes | `&str` |
//! | `invoke()` | async | yes | `ContractResult<C::Output>` |
//! | `shutdown()` | async | provided | `()` |
//!
//! Adapters are the only place I/O happens. Whatever goes wrong inside one is
//! expressed as a [`TransportError`] and converted with
//! [`TransportError::into_contract`] before it crosses the boundary.

use async_trait::async_trait;
use thiserror::Error;

use crate::contract::Capability;
use crate::error::{ContractError, ContractResult};

/// A concrete implementation of capability `C` over one low-level mechanism.
///
/// # Contract
///
/// - `invoke()` MUST map every low-level failure to
///   `ContractError::CapabilityUnavailable`.
/// - `invoke()` MUST emit results in the order the mechanism produced them.
/// - `invoke()` MUST NOT return a partially built output.
/// - `shutdown()` releases held resources. It is called once, by the
///   composition root that owns the adapter. Afterwards `invoke()` MUST fail
///   with `CapabilityUnavailable` ([`TransportError::Closed`]).
#[async_trait]
pub trait Adapter<C: Capability>: Send + Sync {
    /// Adapter name, for logs and diagnostics.
    fn name(&self) -> &str;

    /// Serve one request.
    async fn invoke(&self, input: &C::Input) -> ContractResult<C::Output>;

    /// Release resources held by this adapter.
    async fn shutdown(&self) {}
}

/// Low-level failures observed inside an adapter.
///
/// Never returned across the contract boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The mechanism did not answer in time.
    #[error("timed out after {timeout_ms}ms")]
    Timeout {
        /// Elapsed budget.
        timeout_ms: u64,
    },

    /// Could not reach the mechanism.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The mechanism answered with a non-success status.
    #[error("unexpected status {status}: {reason}")]
    Status {
        /// Status code reported by the mechanism.
        status: u16,
        /// Reason phrase or body excerpt.
        reason: String,
    },

    /// The adapter was configured with values the mechanism rejects.
    #[error("invalid adapter configuration: {0}")]
    Config(String),

    /// The adapter was shut down by its composition root.
    #[error("adapter shut down")]
    Closed,

    /// The payload could not be decoded.
    #[error("malformed payload: {0}")]
    Decode(String),

    /// HTTP client failure.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decode failure.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Translate into the contract-level error for capability `C`.
    pub fn into_contract<C: Capability>(self) -> ContractError {
        ContractError::unavailable(C::NAME, self.to_string())
    }

    /// Classify a reqwest failure, preserving timeouts and connect errors.
    pub fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_ms }
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Http(err)
        }
    }
}
