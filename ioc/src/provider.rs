//! Providers: deferred producers of one instance for one key.

use crate::core::{Instance, Key, ResolutionGuard};
use crate::error::{InjectError, Result};
use crate::registry::Factory;
use crate::scope::{Scope, ScopeNode};
use once_cell::sync::OnceCell;
use parking_lot::ReentrantMutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

/// Something that can produce an `Arc<T>` on demand.
///
/// This is the handle callers get back from a scope, and also the shape of
/// user-supplied providers bound with `Binding::provider_instance` or
/// `Binding::provider_class`.
pub trait Provider<T: ?Sized>: Send + Sync {
  fn get(&self) -> Result<Arc<T>>;
}

/// Adapts a closure into a `Provider`.
pub struct FnProvider<F> {
  f: F,
}

impl<F> FnProvider<F> {
  pub fn new(f: F) -> Self {
    Self { f }
  }
}

impl<T: ?Sized, F> Provider<T> for FnProvider<F>
where
  F: Fn() -> Result<Arc<T>> + Send + Sync,
{
  fn get(&self) -> Result<Arc<T>> {
    (self.f)()
  }
}

/// A closure turning whatever a factory built into the instance the key promises.
pub(crate) type Adapter = Arc<dyn Fn(Instance) -> Result<Instance> + Send + Sync>;

/// A closure standing in for a caller-supplied provider.
pub(crate) type Source = Arc<dyn Fn() -> Result<Instance> + Send + Sync>;

/// What a factory-backed provider does with the factory's output.
pub(crate) enum FactoryOutput {
  /// The factory builds the instance itself.
  Direct,
  /// The factory builds an implementation that is converted to the bound interface.
  Coerce(Adapter),
  /// The factory builds a provider, which is then asked for the instance.
  ProviderFactory(Adapter),
}

impl FactoryOutput {
  fn apply(&self, produced: Instance) -> Result<Instance> {
    match self {
      FactoryOutput::Direct => Ok(produced),
      FactoryOutput::Coerce(adapter) | FactoryOutput::ProviderFactory(adapter) => adapter(produced),
    }
  }

  fn is_provider_factory(&self) -> bool {
    matches!(self, FactoryOutput::ProviderFactory(_))
  }
}

pub(crate) enum ProviderKind {
  /// Always hands out the same pre-built instance.
  Instance(Instance),
  /// Invokes a factory on every `get`, with the owning scope as injection context.
  Factory {
    scope: Weak<ScopeNode>,
    factory: Arc<dyn Factory>,
    output: FactoryOutput,
  },
  /// Delegates to a caller-supplied provider, one call at a time.
  Delegate {
    source: Source,
    serial: ReentrantMutex<()>,
  },
}

/// The untyped provider stored in a scope's binding map.
///
/// Scopes hand these out behind an `Arc`; the identity of that `Arc` is what
/// makes repeated lookups of a key return "the same provider".
pub(crate) struct ErasedProvider {
  key: Key,
  kind: ProviderKind,
}

impl ErasedProvider {
  pub(crate) fn instance(key: Key, instance: Instance) -> Self {
    Self {
      key,
      kind: ProviderKind::Instance(instance),
    }
  }

  pub(crate) fn factory(
    key: Key,
    scope: Weak<ScopeNode>,
    factory: Arc<dyn Factory>,
    output: FactoryOutput,
  ) -> Self {
    Self {
      key,
      kind: ProviderKind::Factory {
        scope,
        factory,
        output,
      },
    }
  }

  pub(crate) fn delegate(key: Key, source: Source) -> Self {
    Self {
      key,
      kind: ProviderKind::Delegate {
        source,
        serial: ReentrantMutex::new(()),
      },
    }
  }

  pub(crate) fn key(&self) -> &Key {
    &self.key
  }

  pub(crate) fn get(&self) -> Result<Instance> {
    match &self.kind {
      ProviderKind::Instance(instance) => Ok(instance.clone()),
      ProviderKind::Factory {
        scope,
        factory,
        output,
      } => {
        let scope = Scope::upgrade(scope)?;
        let _guard = ResolutionGuard::enter(scope.id(), &self.key)?;
        let produced = factory.create_instance(&scope)?;
        output.apply(produced)
      }
      ProviderKind::Delegate { source, serial } => {
        let _serial = serial.lock();
        source()
      }
    }
  }
}

impl fmt::Debug for ErasedProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match &self.kind {
      ProviderKind::Instance(_) => "instance",
      ProviderKind::Factory { output, .. } if output.is_provider_factory() => "provider-factory",
      ProviderKind::Factory { .. } => "factory",
      ProviderKind::Delegate { .. } => "delegate",
    };
    f.debug_struct("Provider")
      .field("key", &self.key)
      .field("kind", &kind)
      .finish()
  }
}

/// The typed provider handle returned by `Scope::get_provider`.
///
/// Cloning the handle is cheap and keeps pointing at the provider stored in
/// the scope, so `ptr_eq` tells whether two lookups resolved to the same
/// binding.
pub struct ScopedProvider<T: ?Sized> {
  inner: Arc<ErasedProvider>,
  _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> ScopedProvider<T> {
  pub(crate) fn new(inner: Arc<ErasedProvider>) -> Self {
    Self {
      inner,
      _marker: PhantomData,
    }
  }

  pub fn key(&self) -> &Key {
    self.inner.key()
  }

  /// Returns `true` if both handles refer to the same stored provider.
  pub fn ptr_eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl<T: ?Sized + Send + Sync + 'static> Provider<T> for ScopedProvider<T> {
  fn get(&self) -> Result<Arc<T>> {
    self
      .inner
      .get()?
      .downcast::<T>()
      .ok_or_else(|| InjectError::TypeMismatch(self.inner.key().clone()))
  }
}

impl<T: ?Sized> Clone for ScopedProvider<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      _marker: PhantomData,
    }
  }
}

impl<T: ?Sized> fmt::Debug for ScopedProvider<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&self.inner, f)
  }
}

/// A provider that defers construction to the first `get` and then keeps
/// returning that instance.
///
/// A failed `get` is not remembered; the next call asks the inner provider again.
pub struct Lazy<T: ?Sized> {
  provider: ScopedProvider<T>,
  cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Lazy<T> {
  pub(crate) fn new(provider: ScopedProvider<T>) -> Self {
    Self {
      provider,
      cell: OnceCell::new(),
    }
  }

  /// Returns `true` once an instance has been built and cached.
  pub fn is_initialized(&self) -> bool {
    self.cell.get().is_some()
  }

  pub fn get(&self) -> Result<Arc<T>> {
    self.cell.get_or_try_init(|| self.provider.get()).cloned()
  }
}

impl<T: ?Sized + Send + Sync + 'static> Provider<T> for Lazy<T> {
  fn get(&self) -> Result<Arc<T>> {
    Lazy::get(self)
  }
}

impl<T: ?Sized> fmt::Debug for Lazy<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Lazy")
      .field("provider", &self.provider)
      .field("initialized", &self.cell.get().is_some())
      .finish()
  }
}
