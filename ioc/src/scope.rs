//! Scopes: nodes of the injector tree and the resolution engine that walks them.

use crate::binding::{Binding, Module, Target};
use crate::core::{Key, ResolutionGuard};
use crate::error::{InjectError, Result};
use crate::future::FutureHandle;
use crate::global::shared_pool;
use crate::locks::{KeyLocks, DEFAULT_LOCK_STRIPES};
use crate::pool::WorkerPool;
use crate::provider::{ErasedProvider, FactoryOutput, Lazy, Provider, ScopedProvider};
use crate::registry::{Factory, FactoryResolver, MemberInjectorResolver, Registry};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// State shared by every scope of one tree.
struct Hierarchy {
  locks: KeyLocks,
  factories: Arc<dyn FactoryResolver>,
  member_injectors: Arc<dyn MemberInjectorResolver>,
  pool: Option<Arc<WorkerPool>>,
}

pub(crate) struct ScopeNode {
  providers: DashMap<Key, Arc<ErasedProvider>>,
  parent: Option<Weak<ScopeNode>>,
  // This scope first, then its parent, up to the root.
  chain: Vec<Weak<ScopeNode>>,
  has_overrides: AtomicBool,
  installing: Mutex<()>,
  hierarchy: Arc<Hierarchy>,
}

impl ScopeNode {
  fn new_in(hierarchy: Arc<Hierarchy>, parent: Option<&Arc<ScopeNode>>) -> Arc<Self> {
    Arc::new_cyclic(|this| {
      let mut chain = vec![this.clone()];
      if let Some(parent) = parent {
        chain.extend(parent.chain.iter().cloned());
      }
      ScopeNode {
        providers: DashMap::new(),
        parent: parent.map(Arc::downgrade),
        chain,
        has_overrides: AtomicBool::new(false),
        installing: Mutex::new(()),
        hierarchy,
      }
    })
  }
}

/// A node of the injector tree.
///
/// A scope owns the providers bound in it and sees the bindings of all its
/// ancestors, with the nearest binding of a key shadowing farther ones.
/// `Scope` is a cheap handle: clones refer to the same node.
///
/// A child only keeps a weak link to its parent. The application must keep
/// every ancestor alive for as long as its descendants are used; resolving
/// through a dropped ancestor fails with `InjectError::ScopeReleased`.
#[derive(Clone)]
pub struct Scope {
  node: Arc<ScopeNode>,
}

impl Scope {
  /// Creates a root scope backed by `registry`, using the shared worker pool.
  pub fn new(registry: Arc<Registry>) -> Self {
    let factories: Arc<dyn FactoryResolver> = registry.clone();
    let member_injectors: Arc<dyn MemberInjectorResolver> = registry;
    let hierarchy = Hierarchy {
      locks: KeyLocks::default(),
      factories,
      member_injectors,
      pool: None,
    };
    Self {
      node: ScopeNode::new_in(Arc::new(hierarchy), None),
    }
  }

  /// Returns a builder for a root scope.
  pub fn builder() -> ScopeBuilder {
    ScopeBuilder::default()
  }

  pub(crate) fn upgrade(node: &Weak<ScopeNode>) -> Result<Self> {
    node
      .upgrade()
      .map(|node| Self { node })
      .ok_or(InjectError::ScopeReleased)
  }

  /// Creates a child scope with `modules` installed in it.
  ///
  /// The child shares this scope's resolvers, worker pool and key locks.
  pub fn open_child(&self, modules: &[Module]) -> Result<Scope> {
    let child = Scope {
      node: ScopeNode::new_in(Arc::clone(&self.node.hierarchy), Some(&self.node)),
    };
    debug!(depth = child.depth(), "opened child scope");
    child.install_modules(modules)?;
    Ok(child)
  }

  // --- Tree ---

  /// The parent scope, if this is not a root and the parent is still alive.
  pub fn parent(&self) -> Option<Scope> {
    self
      .node
      .parent
      .as_ref()
      .and_then(Weak::upgrade)
      .map(|node| Scope { node })
  }

  /// The root of this scope's tree.
  pub fn root(&self) -> Result<Scope> {
    match self.node.chain.last() {
      Some(root) => Scope::upgrade(root),
      None => Ok(self.clone()),
    }
  }

  /// The number of ancestors above this scope. A root has depth zero.
  pub fn depth(&self) -> usize {
    self.node.chain.len() - 1
  }

  /// Returns `true` if both handles refer to the same scope.
  pub fn ptr_eq(&self, other: &Scope) -> bool {
    Arc::ptr_eq(&self.node, &other.node)
  }

  // Address of the node, stable for as long as this handle lives.
  pub(crate) fn id(&self) -> usize {
    Arc::as_ptr(&self.node) as usize
  }

  /// Returns `true` if `T` has a provider stored in this scope itself.
  /// Ancestors are not consulted.
  pub fn is_bound<T: ?Sized + 'static>(&self) -> bool {
    self.node.providers.contains_key(&Key::of::<T>())
  }

  /// The keys with a provider stored in this scope itself.
  pub fn bound_keys(&self) -> Vec<Key> {
    self
      .node
      .providers
      .iter()
      .map(|entry| entry.key().clone())
      .collect()
  }

  /// Returns `true` once override modules were installed in this scope.
  pub fn has_overrides(&self) -> bool {
    self.node.has_overrides.load(Ordering::Acquire)
  }

  // --- Installation ---

  /// Installs the bindings of `modules`, in order.
  ///
  /// Later bindings replace earlier ones for the same key, unless override
  /// modules were installed in this scope before: overridden keys then keep
  /// their override binding.
  pub fn install_modules(&self, modules: &[Module]) -> Result<()> {
    let _installing = self.node.installing.lock();
    self.install_locked(modules)
  }

  /// Installs `modules` so that their bindings replace existing ones.
  ///
  /// Afterwards, plain `install_modules` calls no longer replace keys already
  /// bound in this scope. Repeated override installs keep replacing.
  ///
  /// If a binding fails to install, the bindings before it stay installed but
  /// the override flag keeps its previous value.
  pub fn install_override_modules(&self, modules: &[Module]) -> Result<()> {
    let _installing = self.node.installing.lock();
    let previous = self.node.has_overrides.swap(false, Ordering::AcqRel);
    match self.install_locked(modules) {
      Ok(()) => {
        self.node.has_overrides.store(true, Ordering::Release);
        debug!(modules = modules.len(), "installed override modules");
        Ok(())
      }
      Err(err) => {
        self.node.has_overrides.store(previous, Ordering::Release);
        Err(err)
      }
    }
  }

  fn install_locked(&self, modules: &[Module]) -> Result<()> {
    let keep_existing = self.node.has_overrides.load(Ordering::Acquire);
    for module in modules {
      for binding in module.bindings() {
        let key = binding.key();
        if !key.is_valid() {
          return Err(InjectError::Configuration {
            key: key.clone(),
            reason: "a binding key can't have a blank name".to_owned(),
          });
        }
        let _slot = self.node.hierarchy.locks.lock(key);
        if keep_existing && self.node.providers.contains_key(key) {
          trace!(%key, "kept overridden binding");
          continue;
        }
        let provider = self.to_provider(binding)?;
        self.node.providers.insert(key.clone(), Arc::new(provider));
      }
      debug!(
        module = module.name().unwrap_or("<unnamed>"),
        bindings = module.len(),
        "installed module"
      );
    }
    Ok(())
  }

  fn to_provider(&self, binding: &Binding) -> Result<ErasedProvider> {
    let key = binding.key().clone();
    let provider = match binding.target() {
      Target::Simple => {
        let factory = self.factory_for_binding(&key, &key)?;
        ErasedProvider::factory(key, self.weak(), factory, FactoryOutput::Direct)
      }
      Target::Class {
        implementation,
        coerce,
      } => {
        let factory = self.factory_for_binding(&key, implementation)?;
        ErasedProvider::factory(
          key,
          self.weak(),
          factory,
          FactoryOutput::Coerce(coerce.clone()),
        )
      }
      Target::Instance(instance) => ErasedProvider::instance(key, instance.clone()),
      Target::ProviderInstance(source) => ErasedProvider::delegate(key, source.clone()),
      Target::ProviderClass { provider, unwrap } => {
        let factory = self.factory_for_binding(&key, provider)?;
        ErasedProvider::factory(
          key,
          self.weak(),
          factory,
          FactoryOutput::ProviderFactory(unwrap.clone()),
        )
      }
    };
    Ok(provider)
  }

  fn factory_for_binding(&self, bound: &Key, target: &Key) -> Result<Arc<dyn Factory>> {
    self
      .node
      .hierarchy
      .factories
      .factory(target)
      .ok_or_else(|| InjectError::Configuration {
        key: bound.clone(),
        reason: format!("no factory registered for {target}"),
      })
  }

  fn weak(&self) -> Weak<ScopeNode> {
    Arc::downgrade(&self.node)
  }

  // --- Resolution ---

  /// Finds or creates the provider for `key`.
  ///
  /// The nearest scope with a binding wins. A key bound nowhere in the chain is
  /// built once through its factory: singleton factories have that instance
  /// stored in the root scope, other factories get a provider stored in this
  /// scope. Two threads discovering the same key at once may both build an
  /// instance; only the first provider stored is kept and returned to both.
  pub(crate) fn resolve(&self, key: &Key) -> Result<Arc<ErasedProvider>> {
    if !key.is_valid() {
      return Err(InjectError::InvalidArgument(format!(
        "can't resolve a key with a blank name ({})",
        key.type_name()
      )));
    }

    if let Some(provider) = self.lookup(key)? {
      return Ok(provider);
    }

    // Bound nowhere in the chain: discover it through its factory.
    let factory = self
      .node
      .hierarchy
      .factories
      .factory(key)
      .ok_or_else(|| InjectError::NoFactory(key.clone()))?;
    let instance = {
      let _guard = ResolutionGuard::enter(self.id(), key)?;
      factory.create_instance(self)?
    };

    let _slot = self.node.hierarchy.locks.lock(key);
    let (owner, provider) = if factory.has_singleton_scope() {
      let root = self.root()?;
      debug!(%key, "promoting discovered singleton to the root scope");
      (root.node, ErasedProvider::instance(key.clone(), instance))
    } else {
      debug!(%key, depth = self.depth(), "discovered unbound key");
      let provider =
        ErasedProvider::factory(key.clone(), self.weak(), factory, FactoryOutput::Direct);
      (Arc::clone(&self.node), provider)
    };
    let stored = owner
      .providers
      .entry(key.clone())
      .or_insert_with(|| Arc::new(provider))
      .value()
      .clone();
    Ok(stored)
  }

  fn lookup(&self, key: &Key) -> Result<Option<Arc<ErasedProvider>>> {
    let _slot = self.node.hierarchy.locks.lock(key);
    for link in &self.node.chain {
      let node = link.upgrade().ok_or(InjectError::ScopeReleased)?;
      let found = node.providers.get(key).map(|entry| Arc::clone(entry.value()));
      if found.is_some() {
        trace!(%key, "resolved bound key");
        return Ok(found);
      }
    }
    Ok(None)
  }

  /// Returns the provider for `key`, which must be a key for `T`.
  pub fn get_provider_for<T: ?Sized + Send + Sync + 'static>(
    &self,
    key: &Key,
  ) -> Result<ScopedProvider<T>> {
    if !key.is_type::<T>() {
      return Err(InjectError::InvalidArgument(format!(
        "{key} is not a key for {}",
        std::any::type_name::<T>()
      )));
    }
    self.resolve(key).map(ScopedProvider::new)
  }

  pub fn get_provider<T: ?Sized + Send + Sync + 'static>(&self) -> Result<ScopedProvider<T>> {
    self.get_provider_for(&Key::of::<T>())
  }

  pub fn get_named_provider<T: ?Sized + Send + Sync + 'static>(
    &self,
    name: &str,
  ) -> Result<ScopedProvider<T>> {
    self.get_provider_for(&Key::named::<T>(name))
  }

  pub fn get_instance<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
    self.get_provider::<T>()?.get()
  }

  pub fn get_named_instance<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
    self.get_named_provider::<T>(name)?.get()
  }

  /// Returns a handle that builds `T` on its first `get` and caches it.
  pub fn get_lazy<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Lazy<T>> {
    self.get_provider::<T>().map(Lazy::new)
  }

  pub fn get_named_lazy<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Lazy<T>> {
    self.get_named_provider::<T>(name).map(Lazy::new)
  }

  /// Builds `T` on the worker pool and returns a handle to the pending result.
  pub fn get_future<T: ?Sized + Send + Sync + 'static>(&self) -> Result<FutureHandle<T>> {
    let provider = self.get_provider::<T>()?;
    let pool = self.worker_pool()?;
    FutureHandle::spawn(&pool, provider)
  }

  /// The worker pool serving `get_future` for this tree.
  pub fn worker_pool(&self) -> Result<Arc<WorkerPool>> {
    match &self.node.hierarchy.pool {
      Some(pool) => Ok(Arc::clone(pool)),
      None => shared_pool(),
    }
  }

  /// Populates the injectable members of `target` with this scope as context.
  pub fn inject<T: Any>(&self, target: &mut T) -> Result<()> {
    let injector = self
      .node
      .hierarchy
      .member_injectors
      .member_injector(TypeId::of::<T>())
      .ok_or(InjectError::NoMemberInjector(std::any::type_name::<T>()))?;
    injector.inject(target, self)
  }
}

impl fmt::Debug for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Scope")
      .field("depth", &self.depth())
      .field("bindings", &self.node.providers.len())
      .field("has_overrides", &self.has_overrides())
      .finish()
  }
}

/// A builder for root scopes.
pub struct ScopeBuilder {
  factories: Option<Arc<dyn FactoryResolver>>,
  member_injectors: Option<Arc<dyn MemberInjectorResolver>>,
  pool: Option<Arc<WorkerPool>>,
  modules: Vec<Module>,
  lock_stripes: usize,
}

impl Default for ScopeBuilder {
  fn default() -> Self {
    Self {
      factories: None,
      member_injectors: None,
      pool: None,
      modules: Vec::new(),
      lock_stripes: DEFAULT_LOCK_STRIPES,
    }
  }
}

impl fmt::Debug for ScopeBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ScopeBuilder")
      .field("has_factories", &self.factories.is_some())
      .field("has_member_injectors", &self.member_injectors.is_some())
      .field("has_pool", &self.pool.is_some())
      .field("modules", &self.modules.len())
      .field("lock_stripes", &self.lock_stripes)
      .finish()
  }
}

impl ScopeBuilder {
  /// Uses `registry` for both factory and member-injector lookups.
  pub fn registry(mut self, registry: Arc<Registry>) -> Self {
    let factories: Arc<dyn FactoryResolver> = registry.clone();
    let member_injectors: Arc<dyn MemberInjectorResolver> = registry;
    self.factories = Some(factories);
    self.member_injectors = Some(member_injectors);
    self
  }

  pub fn factories(mut self, factories: Arc<dyn FactoryResolver>) -> Self {
    self.factories = Some(factories);
    self
  }

  pub fn member_injectors(mut self, member_injectors: Arc<dyn MemberInjectorResolver>) -> Self {
    self.member_injectors = Some(member_injectors);
    self
  }

  /// Serves `get_future` from `pool` instead of the process-wide shared pool.
  pub fn worker_pool(mut self, pool: Arc<WorkerPool>) -> Self {
    self.pool = Some(pool);
    self
  }

  pub fn module(mut self, module: Module) -> Self {
    self.modules.push(module);
    self
  }

  pub fn modules(mut self, modules: impl IntoIterator<Item = Module>) -> Self {
    self.modules.extend(modules);
    self
  }

  /// Sets the number of per-key lock stripes, rounded up to a power of two.
  pub fn lock_stripes(mut self, stripes: usize) -> Self {
    self.lock_stripes = stripes;
    self
  }

  /// Creates the root scope and installs the configured modules in it.
  pub fn build(self) -> Result<Scope> {
    let fallback = Arc::new(Registry::new());
    let factories = match self.factories {
      Some(factories) => factories,
      None => fallback.clone() as Arc<dyn FactoryResolver>,
    };
    let member_injectors = match self.member_injectors {
      Some(member_injectors) => member_injectors,
      None => fallback as Arc<dyn MemberInjectorResolver>,
    };
    let hierarchy = Hierarchy {
      locks: KeyLocks::new(self.lock_stripes),
      factories,
      member_injectors,
      pool: self.pool,
    };
    let scope = Scope {
      node: ScopeNode::new_in(Arc::new(hierarchy), None),
    };
    scope.install_modules(&self.modules)?;
    Ok(scope)
  }
}
