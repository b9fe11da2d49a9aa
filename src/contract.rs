//! Capability contracts and the handle Domain Callers invoke.
//!
//! A [`Capability`] names an operation and fixes its input and output shape.
//! Domain code holds a [`Contract<C>`] and never sees which adapter sits
//! behind it:
//!
//! ```text
//!   Domain Caller ──→ Contract<C>::invoke() ──→ validate() ──→ Adapter<C>::invoke()
//!                          (no I/O)              (no I/O)         (I/O lives here)
//! ```
//!
//! ## Guarantees
//!
//! - Input is validated before the adapter is reached. A `ContractViolation`
//!   means no I/O happened.
//! - Each invocation resolves to the output or error for *its own* input.
//!   No ordering across concurrent invocations is promised.
//! - Dropping an invocation future cancels it. A timed-out invocation yields
//!   `CapabilityUnavailable`, never partial output.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::adapter::Adapter;
use crate::error::{ContractError, ContractResult};

/// An abstract operation the domain depends on.
///
/// Implementors are usually zero-sized marker types. The shape of `Output`
/// must not mention any adapter's wire format, row type, or error type.
pub trait Capability: Send + Sync + 'static {
    /// Stable name used in errors, logs, and binding diagnostics.
    const NAME: &'static str;

    /// Request shape.
    type Input: Send + Sync + fmt::Debug;

    /// Response shape.
    type Output: Send + 'static;

    /// Check `input` against the declared shape.
    ///
    /// MUST be pure: no I/O, no side effects.
    fn validate(input: &Self::Input) -> ContractResult<()>;
}

/// Handle through which Domain Callers invoke capability `C`.
///
/// Obtained from [`CompositionRoot::resolve`](crate::root::CompositionRoot::resolve).
/// Cloning is cheap and shares the bound adapter.
pub struct Contract<C: Capability> {
    adapter: Arc<dyn Adapter<C>>,
}

impl<C: Capability> Contract<C> {
    pub(crate) fn new(adapter: Arc<dyn Adapter<C>>) -> Self {
        Self { adapter }
    }

    /// Name of the capability.
    pub fn name(&self) -> &'static str {
        C::NAME
    }

    /// Name of the adapter currently bound. Diagnostic only.
    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    /// Validate `input`, then forward it to the bound adapter.
    pub async fn invoke(&self, input: &C::Input) -> ContractResult<C::Output> {
        if let Err(err) = C::validate(input) {
            debug!(capability = C::NAME, error = %err, "rejected input");
            return Err(err);
        }

        debug!(
            capability = C::NAME,
            adapter = self.adapter.name(),
            ?input,
            "invoking capability"
        );

        self.adapter.invoke(input).await.inspect_err(|err| {
            warn!(
                capability = C::NAME,
                adapter = self.adapter.name(),
                error = %err,
                "capability invocation failed"
            );
        })
    }

    /// Like [`invoke`](Self::invoke), bounded by `timeout`.
    ///
    /// Expiry surfaces as `CapabilityUnavailable`; the in-flight adapter call
    /// is dropped.
    pub async fn invoke_with_timeout(
        &self,
        input: &C::Input,
        timeout: Duration,
    ) -> ContractResult<C::Output> {
        match tokio::time::timeout(timeout, self.invoke(input)).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(
                    capability = C::NAME,
                    adapter = self.adapter.name(),
                    timeout_ms,
                    "capability invocation timed out"
                );
                Err(ContractError::unavailable(
                    C::NAME,
                    format!("timed out after {timeout_ms}ms"),
                ))
            }
        }
    }
}

impl<C: Capability> Clone for Contract<C> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
        }
    }
}

impl<C: Capability> fmt::Debug for Contract<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("capability", &C::NAME)
            .field("adapter", &self.adapter.name())
            .finish()
    }
}
