//! Factory and member-injector capabilities, and the `Registry` that serves both.

use crate::core::{Instance, Key};
use crate::error::{InjectError, Result};
use crate::scope::Scope;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Builds raw instances of one type, given the scope to resolve dependencies from.
pub trait Factory: Send + Sync {
  fn create_instance(&self, scope: &Scope) -> Result<Instance>;

  /// Singleton factories have their first instance promoted to the root scope
  /// when the type is discovered without a binding.
  fn has_singleton_scope(&self) -> bool {
    false
  }
}

/// Looks up the factory for a key that has no binding in the scope chain.
pub trait FactoryResolver: Send + Sync {
  fn factory(&self, key: &Key) -> Option<Arc<dyn Factory>>;
}

/// Populates the injectable members of an already constructed value.
pub trait MemberInjector: Send + Sync {
  fn inject(&self, target: &mut dyn Any, scope: &Scope) -> Result<()>;
}

/// Looks up the member injector for a concrete type.
pub trait MemberInjectorResolver: Send + Sync {
  fn member_injector(&self, type_id: TypeId) -> Option<Arc<dyn MemberInjector>>;
}

/// A `Factory` backed by a closure.
pub struct FnFactory<T: ?Sized> {
  create: Box<dyn Fn(&Scope) -> Result<Arc<T>> + Send + Sync>,
  singleton: bool,
}

impl<T: ?Sized + Send + Sync + 'static> FnFactory<T> {
  /// A factory whose instances are not shared.
  pub fn transient(create: impl Fn(&Scope) -> Result<Arc<T>> + Send + Sync + 'static) -> Self {
    Self {
      create: Box::new(create),
      singleton: false,
    }
  }

  /// A factory for a type that should only ever have one instance.
  pub fn singleton(create: impl Fn(&Scope) -> Result<Arc<T>> + Send + Sync + 'static) -> Self {
    Self {
      create: Box::new(create),
      singleton: true,
    }
  }
}

impl<T: ?Sized + Send + Sync + 'static> Factory for FnFactory<T> {
  fn create_instance(&self, scope: &Scope) -> Result<Instance> {
    (self.create)(scope).map(Instance::new)
  }

  fn has_singleton_scope(&self) -> bool {
    self.singleton
  }
}

/// A `MemberInjector` backed by a closure.
pub struct FnMemberInjector<T> {
  inject: Box<dyn Fn(&mut T, &Scope) -> Result<()> + Send + Sync>,
}

impl<T: Any> FnMemberInjector<T> {
  pub fn new(inject: impl Fn(&mut T, &Scope) -> Result<()> + Send + Sync + 'static) -> Self {
    Self {
      inject: Box::new(inject),
    }
  }
}

impl<T: Any> MemberInjector for FnMemberInjector<T> {
  fn inject(&self, target: &mut dyn Any, scope: &Scope) -> Result<()> {
    let target = target
      .downcast_mut::<T>()
      .ok_or_else(|| InjectError::TypeMismatch(Key::of::<T>()))?;
    (self.inject)(target, scope)
  }
}

/// A thread-safe table of factories and member injectors, keyed by type.
///
/// Registration may happen at any time, including after scopes using the
/// registry were built. Factories are looked up by the key's type only, so a
/// named key without a binding is built by its type's factory.
#[derive(Default)]
pub struct Registry {
  factories: DashMap<TypeId, Arc<dyn Factory>>,
  member_injectors: DashMap<TypeId, Arc<dyn MemberInjector>>,
}

impl Registry {
  /// Creates a new, empty `Registry`.
  pub fn new() -> Self {
    Self::default()
  }

  // --- Factory Registration ---

  /// Registers `factory` as the way to build `T`, replacing any previous one.
  pub fn add_factory<T: ?Sized + Any>(&self, factory: impl Factory + 'static) {
    self.factories.insert(TypeId::of::<T>(), Arc::new(factory));
  }

  pub fn add_transient<T: Any + Send + Sync>(
    &self,
    create: impl Fn(&Scope) -> Result<T> + Send + Sync + 'static,
  ) {
    self.add_factory::<T>(FnFactory::transient(move |scope| create(scope).map(Arc::new)));
  }

  pub fn add_singleton<T: Any + Send + Sync>(
    &self,
    create: impl Fn(&Scope) -> Result<T> + Send + Sync + 'static,
  ) {
    self.add_factory::<T>(FnFactory::singleton(move |scope| create(scope).map(Arc::new)));
  }

  // --- Trait Registration ---

  pub fn add_transient_trait<I: ?Sized + Any + Send + Sync>(
    &self,
    create: impl Fn(&Scope) -> Result<Arc<I>> + Send + Sync + 'static,
  ) {
    self.add_factory::<I>(FnFactory::transient(create));
  }

  pub fn add_singleton_trait<I: ?Sized + Any + Send + Sync>(
    &self,
    create: impl Fn(&Scope) -> Result<Arc<I>> + Send + Sync + 'static,
  ) {
    self.add_factory::<I>(FnFactory::singleton(create));
  }

  // --- Member Injection ---

  pub fn add_member_injector<T: Any>(
    &self,
    inject: impl Fn(&mut T, &Scope) -> Result<()> + Send + Sync + 'static,
  ) {
    self
      .member_injectors
      .insert(TypeId::of::<T>(), Arc::new(FnMemberInjector::new(inject)));
  }

  // --- Queries ---

  pub fn has_factory<T: ?Sized + Any>(&self) -> bool {
    self.factories.contains_key(&TypeId::of::<T>())
  }

  pub fn has_member_injector<T: Any>(&self) -> bool {
    self.member_injectors.contains_key(&TypeId::of::<T>())
  }
}

impl FactoryResolver for Registry {
  fn factory(&self, key: &Key) -> Option<Arc<dyn Factory>> {
    self
      .factories
      .get(&key.type_id())
      .map(|entry| Arc::clone(entry.value()))
  }
}

impl MemberInjectorResolver for Registry {
  fn member_injector(&self, type_id: TypeId) -> Option<Arc<dyn MemberInjector>> {
    self
      .member_injectors
      .get(&type_id)
      .map(|entry| Arc::clone(entry.value()))
  }
}

impl fmt::Debug for Registry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registry")
      .field("factories", &self.factories.len())
      .field("member_injectors", &self.member_injectors.len())
      .finish()
  }
}
