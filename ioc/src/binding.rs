//! Bindings and modules: the flattened declarations a scope installs.

use crate::core::{Instance, Key};
use crate::error::InjectError;
use crate::provider::{Adapter, Provider, Source};
use std::fmt;
use std::sync::Arc;

/// How a binding satisfies its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
  /// The key's own factory builds it.
  Simple,
  /// The factory of an implementation type builds it.
  Class,
  /// A pre-built instance.
  Instance,
  /// A pre-built provider.
  ProviderInstance,
  /// A provider built by a factory.
  ProviderClass,
}

#[derive(Clone)]
pub(crate) enum Target {
  Simple,
  Class { implementation: Key, coerce: Adapter },
  Instance(Instance),
  ProviderInstance(Source),
  ProviderClass { provider: Key, unwrap: Adapter },
}

/// An immutable declaration of how to satisfy one key.
#[derive(Clone)]
pub struct Binding {
  key: Key,
  target: Target,
}

impl Binding {
  /// Binds `T` to itself: the factory registered for `T` builds it.
  pub fn simple<T: ?Sized + Send + Sync + 'static>() -> Self {
    Self {
      key: Key::of::<T>(),
      target: Target::Simple,
    }
  }

  /// Binds `I` to the implementation `C`, built by the factory registered for `C`.
  ///
  /// `coerce` turns the implementation into the bound type, which for a
  /// trait object is usually just the unsizing coercion:
  ///
  /// ```
  /// use fibre_inject::Binding;
  /// use std::sync::Arc;
  ///
  /// trait Greeter: Send + Sync {}
  /// struct EnglishGreeter;
  /// impl Greeter for EnglishGreeter {}
  ///
  /// let binding = Binding::class::<dyn Greeter, EnglishGreeter>(|greeter| -> Arc<dyn Greeter> { greeter });
  /// ```
  pub fn class<I, C>(coerce: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static) -> Self
  where
    I: ?Sized + Send + Sync + 'static,
    C: ?Sized + Send + Sync + 'static,
  {
    let coerce: Adapter = Arc::new(move |produced: Instance| {
      let implementation = produced
        .downcast::<C>()
        .ok_or_else(|| InjectError::TypeMismatch(Key::of::<C>()))?;
      Ok(Instance::new(coerce(implementation)))
    });
    Self {
      key: Key::of::<I>(),
      target: Target::Class {
        implementation: Key::of::<C>(),
        coerce,
      },
    }
  }

  /// Binds `T` to a value built up front.
  pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
    Self::shared_instance(Arc::new(value))
  }

  /// Binds `T` to an already shared value, which may be a trait object.
  pub fn shared_instance<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
    Self {
      key: Key::of::<T>(),
      target: Target::Instance(Instance::new(value)),
    }
  }

  /// Binds `T` to a provider built up front.
  ///
  /// Calls into the provider are serialized, so it does not have to be
  /// thread-safe on its own.
  pub fn provider_instance<T, P>(provider: P) -> Self
  where
    T: ?Sized + Send + Sync + 'static,
    P: Provider<T> + 'static,
  {
    let provider = Arc::new(provider);
    let source: Source = Arc::new(move || provider.get().map(Instance::new));
    Self {
      key: Key::of::<T>(),
      target: Target::ProviderInstance(source),
    }
  }

  /// Binds `T` to a provider of type `P`, which the factory registered for
  /// `P` builds each time an instance of `T` is requested.
  pub fn provider_class<T, P>() -> Self
  where
    T: ?Sized + Send + Sync + 'static,
    P: Provider<T> + 'static,
  {
    let unwrap: Adapter = Arc::new(|produced: Instance| {
      let provider = produced
        .downcast::<P>()
        .ok_or_else(|| InjectError::TypeMismatch(Key::of::<P>()))?;
      provider.get().map(Instance::new)
    });
    Self {
      key: Key::of::<T>(),
      target: Target::ProviderClass {
        provider: Key::of::<P>(),
        unwrap,
      },
    }
  }

  /// Qualifies the bound key with `name`.
  pub fn named(mut self, name: &str) -> Self {
    self.key = self.key.with_name(name);
    self
  }

  pub fn key(&self) -> &Key {
    &self.key
  }

  pub fn mode(&self) -> Mode {
    match self.target {
      Target::Simple => Mode::Simple,
      Target::Class { .. } => Mode::Class,
      Target::Instance(_) => Mode::Instance,
      Target::ProviderInstance(_) => Mode::ProviderInstance,
      Target::ProviderClass { .. } => Mode::ProviderClass,
    }
  }

  pub(crate) fn target(&self) -> &Target {
    &self.target
  }
}

impl fmt::Debug for Binding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Binding")
      .field("key", &self.key)
      .field("mode", &self.mode())
      .finish()
  }
}

/// An ordered set of bindings installed together.
///
/// When a module binds the same key twice, the later binding wins unless the
/// scope already carries override bindings.
#[derive(Debug, Clone, Default)]
pub struct Module {
  name: Option<String>,
  bindings: Vec<Binding>,
}

impl Module {
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates an empty module with a name used in diagnostics.
  pub fn named(name: &str) -> Self {
    Self {
      name: Some(name.to_owned()),
      bindings: Vec::new(),
    }
  }

  /// Adds a binding, builder style.
  pub fn bind(mut self, binding: Binding) -> Self {
    self.bindings.push(binding);
    self
  }

  pub fn add(&mut self, binding: Binding) {
    self.bindings.push(binding);
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn bindings(&self) -> &[Binding] {
    &self.bindings
  }

  pub fn len(&self) -> usize {
    self.bindings.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bindings.is_empty()
  }
}

impl FromIterator<Binding> for Module {
  fn from_iter<I: IntoIterator<Item = Binding>>(iter: I) -> Self {
    Self {
      name: None,
      bindings: iter.into_iter().collect(),
    }
  }
}

impl Extend<Binding> for Module {
  fn extend<I: IntoIterator<Item = Binding>>(&mut self, iter: I) {
    self.bindings.extend(iter);
  }
}
