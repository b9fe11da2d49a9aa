//! Boundary Contract — dependency-inverted capability boundaries
//!
//! This crate separates business rules from infrastructure. Domain code
//! depends on a [`Capability`] and invokes it through a [`Contract`]. A
//! concrete [`Adapter`] does the I/O, and a [`CompositionRoot`] binds one
//! adapter per capability in a single place.
//!
//! # Overview
//!
//! The crate defines:
//! - The [`Capability`] trait: a named operation with fixed input/output shape
//! - The [`Adapter`] trait: one low-level implementation of a capability
//! - [`CompositionRoot`]: bind once, resolve anywhere, shut down once
//! - [`ContractError`] with exactly two kinds a Domain Caller can observe
//! - [`SearchCapability`], with HTTP and file adapters and a test fake
//! - [`SearchService`]: a Domain Caller with retry and cached fallback
//!
//! # Wiring
//!
//! ```ignore
//! use boundary_contract::{CompositionRoot, SearchCapability, SearchService};
//! use boundary_contract::testing::FakeSearchAdapter;
//! use boundary_contract::search::SearchResult;
//!
//! let mut builder = CompositionRoot::builder();
//! builder.bind::<SearchCapability, _>(|| {
//!     FakeSearchAdapter::new().with_response("sausages", [SearchResult::new("a.com", "A")])
//! })?;
//! let root = builder.build();
//!
//! let service = SearchService::new(root.resolve::<SearchCapability>()?);
//! let results = service.search("sausages").await?;
//! root.shutdown().await;
//! ```
//!
//! # Error flow
//!
//! ```text
//!   reqwest / io / serde_json ──→ TransportError ──→ CapabilityUnavailable
//!        (inside adapter)          (inside adapter)     (crosses boundary)
//!
//!   malformed input ──→ Capability::validate() ──→ ContractViolation (no I/O)
//! ```

pub mod adapter;
pub mod adapters;
pub mod config;
pub mod contract;
pub mod error;
pub mod logging;
pub mod root;
pub mod search;
pub mod service;
pub mod testing;

pub use adapter::{Adapter, TransportError};
pub use config::{SearchAdapterSettings, Settings};
pub use contract::{Capability, Contract};
pub use error::{BindingError, BindingResult, ContractError, ContractResult};
pub use root::{CompositionRoot, CompositionRootBuilder};
pub use search::{ResultSet, SearchCapability, SearchQuery, SearchResult};
pub use service::{RetryPolicy, SearchService};
