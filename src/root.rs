//! Composition root: the one place adapters are chosen and bound.
//!
//! ```text
//!   CompositionRoot::builder()
//!       .bind::<C, A>(factory)      ──→ DuplicateBinding if C already bound
//!       .override_binding::<C, A>() ──→ explicit swap (test doubles)
//!       .build()                    ──→ immutable CompositionRoot
//!   root.resolve::<C>()             ──→ Contract<C> | UnboundContract
//!   root.shutdown().await           ──→ adapters released, reverse bind order
//!   root.resolve::<C>()             ──→ RootShutDown
//! ```
//!
//! Bindings are keyed by the capability's type, so a Domain Caller asks for
//! `resolve::<SearchCapability>()` and never names an adapter.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::adapter::Adapter;
use crate::adapters::{FileSearchAdapter, HttpSearchAdapter};
use crate::config::{SearchAdapterSettings, Settings};
use crate::contract::{Capability, Contract};
use crate::error::{BindingError, BindingResult};
use crate::search::SearchCapability;

#[async_trait]
trait Binding: Send + Sync {
    fn capability(&self) -> &'static str;
    fn adapter_name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
    async fn shutdown(&self);
}

struct Bound<C: Capability> {
    adapter: Arc<dyn Adapter<C>>,
}

#[async_trait]
impl<C: Capability> Binding for Bound<C> {
    fn capability(&self) -> &'static str {
        C::NAME
    }

    fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn shutdown(&self) {
        self.adapter.shutdown().await;
    }
}

/// Collects bindings before they are frozen into a [`CompositionRoot`].
#[derive(Default)]
pub struct CompositionRootBuilder {
    bindings: FxHashMap<TypeId, Box<dyn Binding>>,
    order: Vec<TypeId>,
}

impl CompositionRootBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind capability `C` to the adapter built by `factory`.
    ///
    /// The factory only runs when `C` is not yet bound.
    pub fn bind<C, A>(&mut self, factory: impl FnOnce() -> A) -> BindingResult<&mut Self>
    where
        C: Capability,
        A: Adapter<C> + 'static,
    {
        self.ensure_unbound::<C>()?;
        self.insert::<C>(Arc::new(factory()));
        Ok(self)
    }

    /// Bind capability `C` using a fallible factory.
    ///
    /// A factory error becomes [`BindingError::AdapterConstruction`].
    pub fn try_bind<C, A, E>(
        &mut self,
        factory: impl FnOnce() -> Result<A, E>,
    ) -> BindingResult<&mut Self>
    where
        C: Capability,
        A: Adapter<C> + 'static,
        E: fmt::Display,
    {
        self.ensure_unbound::<C>()?;
        let adapter = factory().map_err(|e| BindingError::AdapterConstruction {
            capability: C::NAME,
            reason: e.to_string(),
        })?;
        self.insert::<C>(Arc::new(adapter));
        Ok(self)
    }

    /// Bind capability `C` to an adapter that is already shared.
    pub fn bind_arc<C: Capability>(
        &mut self,
        adapter: Arc<dyn Adapter<C>>,
    ) -> BindingResult<&mut Self> {
        self.ensure_unbound::<C>()?;
        self.insert::<C>(adapter);
        Ok(self)
    }

    /// Replace whatever `C` is bound to with `adapter`.
    ///
    /// This is the only way to rebind a capability. Binds `C` if it was unbound.
    pub fn override_binding<C, A>(&mut self, adapter: A) -> &mut Self
    where
        C: Capability,
        A: Adapter<C> + 'static,
    {
        if let Some(previous) = self.bindings.remove(&TypeId::of::<C>()) {
            info!(
                capability = C::NAME,
                previous = previous.adapter_name(),
                replacement = adapter.name(),
                "overriding binding"
            );
            self.order.retain(|id| *id != TypeId::of::<C>());
        }
        self.insert::<C>(Arc::new(adapter));
        self
    }

    /// Check if `C` has a binding.
    pub fn is_bound<C: Capability>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<C>())
    }

    /// Freeze the bindings.
    pub fn build(&mut self) -> CompositionRoot {
        let bindings = std::mem::take(&mut self.bindings);
        let order = std::mem::take(&mut self.order);
        let root = CompositionRoot {
            bindings,
            order,
            shut_down: AtomicBool::new(false),
        };
        info!(capabilities = ?root.capabilities(), "composition root built");
        root
    }

    fn ensure_unbound<C: Capability>(&self) -> BindingResult<()> {
        if self.is_bound::<C>() {
            return Err(BindingError::DuplicateBinding {
                capability: C::NAME,
            });
        }
        Ok(())
    }

    fn insert<C: Capability>(&mut self, adapter: Arc<dyn Adapter<C>>) {
        debug!(capability = C::NAME, adapter = adapter.name(), "bound capability");
        self.bindings
            .insert(TypeId::of::<C>(), Box::new(Bound { adapter }));
        self.order.push(TypeId::of::<C>());
    }
}

impl fmt::Debug for CompositionRootBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionRootBuilder")
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

/// Immutable set of capability bindings for one run.
///
/// Owns every bound adapter. Dropping the root drops adapters that no
/// [`Contract`] still references; [`shutdown`](Self::shutdown) releases them
/// explicitly.
pub struct CompositionRoot {
    bindings: FxHashMap<TypeId, Box<dyn Binding>>,
    order: Vec<TypeId>,
    shut_down: AtomicBool,
}

impl CompositionRoot {
    /// Start collecting bindings.
    pub fn builder() -> CompositionRootBuilder {
        CompositionRootBuilder::new()
    }

    /// Wire every capability from configuration.
    pub fn from_settings(settings: &Settings) -> BindingResult<Self> {
        let mut builder = Self::builder();
        match &settings.search {
            SearchAdapterSettings::Http(config) => {
                builder.try_bind::<SearchCapability, _, _>(|| HttpSearchAdapter::new(config.clone()))?;
            }
            SearchAdapterSettings::File(config) => {
                builder.bind::<SearchCapability, _>(|| FileSearchAdapter::new(config.clone()))?;
            }
        }
        Ok(builder.build())
    }

    /// Contract handle for capability `C`.
    ///
    /// Fails with [`BindingError::RootShutDown`] once [`shutdown`](Self::shutdown)
    /// has run.
    pub fn resolve<C: Capability>(&self) -> BindingResult<Contract<C>> {
        if self.is_shut_down() {
            return Err(BindingError::RootShutDown {
                capability: C::NAME,
            });
        }
        let unbound = || BindingError::UnboundContract {
            capability: C::NAME,
        };
        let bound = self
            .bindings
            .get(&TypeId::of::<C>())
            .and_then(|binding| binding.as_any().downcast_ref::<Bound<C>>())
            .ok_or_else(unbound)?;
        Ok(Contract::new(Arc::clone(&bound.adapter)))
    }

    /// Check if `C` has a binding.
    pub fn is_bound<C: Capability>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<C>())
    }

    /// Bound capability names, in bind order.
    pub fn capabilities(&self) -> Vec<&'static str> {
        self.order
            .iter()
            .filter_map(|id| self.bindings.get(id).map(|b| b.capability()))
            .collect()
    }

    /// Check if [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Release every adapter, newest binding first. Runs at most once.
    ///
    /// Contracts resolved earlier keep their handle, but the adapters behind
    /// them answer `CapabilityUnavailable` from then on.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        for id in self.order.iter().rev() {
            if let Some(binding) = self.bindings.get(id) {
                debug!(
                    capability = binding.capability(),
                    adapter = binding.adapter_name(),
                    "shutting down adapter"
                );
                binding.shutdown().await;
            }
        }
        info!("composition root shut down");
    }
}

impl fmt::Debug for CompositionRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionRoot")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
