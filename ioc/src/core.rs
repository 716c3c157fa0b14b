//! Core data structures shared by the resolution engine: keys, type-erased
//! instances and the per-thread construction guard.

use crate::error::{InjectError, Result};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

thread_local! {
  // (scope, key) pairs being built on this thread. A pair that shows up twice
  // means its construction depends on itself. The same key built by another
  // scope, such as a child decorating its parent's binding, is not a cycle.
  static CONSTRUCTING: RefCell<HashSet<(usize, Key)>> = RefCell::new(HashSet::new());
}

/// An RAII guard that marks a key as under construction by one scope on the
/// current thread.
///
/// Entering a pair that is already marked fails with
/// `InjectError::CircularDependency` instead of recursing until the stack
/// overflows. Dropping the guard clears the mark.
pub(crate) struct ResolutionGuard {
  slot: (usize, Key),
}

impl ResolutionGuard {
  pub(crate) fn enter(scope: usize, key: &Key) -> Result<Self> {
    let slot = (scope, key.clone());
    let inserted = CONSTRUCTING.with(|constructing| constructing.borrow_mut().insert(slot.clone()));
    if !inserted {
      return Err(InjectError::CircularDependency(key.clone()));
    }
    Ok(Self { slot })
  }
}

impl Drop for ResolutionGuard {
  fn drop(&mut self) {
    CONSTRUCTING.with(|constructing| {
      constructing.borrow_mut().remove(&self.slot);
    });
  }
}

/// Identifies what to resolve: a type, optionally qualified by a name.
///
/// Two keys are equal when they were created for the same type and name.
/// Trait objects are valid key types, so `Key::of::<dyn Greeter>()` names an
/// interface.
#[derive(Clone)]
pub struct Key {
  type_id: TypeId,
  type_name: &'static str,
  name: Option<Arc<str>>,
}

impl Key {
  /// The unnamed key for `T`.
  pub fn of<T: ?Sized + 'static>() -> Self {
    Self {
      type_id: TypeId::of::<T>(),
      type_name: std::any::type_name::<T>(),
      name: None,
    }
  }

  /// The key for `T` qualified by `name`.
  pub fn named<T: ?Sized + 'static>(name: &str) -> Self {
    Self {
      type_id: TypeId::of::<T>(),
      type_name: std::any::type_name::<T>(),
      name: Some(Arc::from(name)),
    }
  }

  pub fn type_id(&self) -> TypeId {
    self.type_id
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  /// The key for the same type qualified by `name`.
  pub fn with_name(&self, name: &str) -> Self {
    Self {
      type_id: self.type_id,
      type_name: self.type_name,
      name: Some(Arc::from(name)),
    }
  }

  /// Returns `true` if this key was created for `T`, regardless of its name.
  pub fn is_type<T: ?Sized + 'static>(&self) -> bool {
    self.type_id == TypeId::of::<T>()
  }

  /// A named key must carry a non-blank name.
  pub(crate) fn is_valid(&self) -> bool {
    self.name.as_deref().map_or(true, |name| !name.trim().is_empty())
  }
}

impl PartialEq for Key {
  fn eq(&self, other: &Self) -> bool {
    self.type_id == other.type_id && self.name == other.name
  }
}

impl Eq for Key {}

impl Hash for Key {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.type_id.hash(state);
    self.name.hash(state);
  }
}

impl fmt::Debug for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.name {
      Some(name) => write!(f, "Key({}, Name({}))", self.type_name, name),
      None => write!(f, "Key({})", self.type_name),
    }
  }
}

impl fmt::Display for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.name {
      Some(name) => write!(f, "{} named '{}'", self.type_name, name),
      None => f.write_str(self.type_name),
    }
  }
}

/// A type-erased, shared instance.
///
/// Holds an `Arc<T>` behind `dyn Any` so providers for unrelated types can live
/// in the same map. `downcast` hands back the original `Arc<T>`, which means
/// every clone of an `Instance` points at the same value.
#[derive(Clone)]
pub struct Instance(Arc<dyn Any + Send + Sync>);

impl Instance {
  pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
    Self(Arc::new(value))
  }

  /// Recovers the `Arc<T>` this instance was created from, or `None` if it
  /// holds another type.
  pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
    self.0.downcast_ref::<Arc<T>>().cloned()
  }
}

impl fmt::Debug for Instance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Instance").finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_named_and_unnamed_keys_differ() {
    assert_eq!(Key::of::<String>(), Key::of::<String>());
    assert_ne!(Key::of::<String>(), Key::named::<String>("a"));
    assert_ne!(Key::named::<String>("a"), Key::named::<String>("b"));
    assert_ne!(Key::of::<String>(), Key::of::<u32>());
  }

  #[test]
  fn test_blank_names_are_invalid() {
    assert!(Key::of::<String>().is_valid());
    assert!(Key::named::<String>("db").is_valid());
    assert!(!Key::named::<String>("").is_valid());
    assert!(!Key::named::<String>("  ").is_valid());
  }

  #[test]
  fn test_guard_rejects_reentry_until_dropped() {
    let key = Key::named::<u8>("guard_test");
    let guard = ResolutionGuard::enter(1, &key).unwrap();
    assert!(matches!(
      ResolutionGuard::enter(1, &key),
      Err(InjectError::CircularDependency(_))
    ));
    drop(guard);
    assert!(ResolutionGuard::enter(1, &key).is_ok());
  }

  #[test]
  fn test_guard_allows_same_key_in_another_scope() {
    let key = Key::of::<String>();
    let _outer = ResolutionGuard::enter(1, &key).unwrap();
    let inner = ResolutionGuard::enter(2, &key);
    assert!(inner.is_ok());
  }

  #[test]
  fn test_instance_downcast_keeps_identity() {
    let value = Arc::new(String::from("shared"));
    let instance = Instance::new(value.clone());
    let back = instance.downcast::<String>().unwrap();
    assert!(Arc::ptr_eq(&value, &back));
    assert!(instance.downcast::<u32>().is_none());
  }
}
