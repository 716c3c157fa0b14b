use crate::core::Key;
use thiserror::Error;

/// A boxed error produced by user code inside a factory or provider.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type for every fallible operation of `fibre_inject`.
///
/// Failures are never swallowed or retried by the runtime: whatever a factory,
/// provider or member injector returns reaches the caller unchanged.
#[derive(Debug, Error)]
pub enum InjectError {
  /// A caller handed the runtime an argument it cannot work with, such as a
  /// key with a blank name.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  /// A binding could not be translated into a provider while installing a module.
  #[error("invalid binding for {key}: {reason}")]
  Configuration { key: Key, reason: String },

  /// No factory is registered for a key that has no binding in the scope chain.
  #[error("no factory registered for {0}")]
  NoFactory(Key),

  /// `Scope::inject` was called for a type without a member injector.
  #[error("no member injector registered for {0}")]
  NoMemberInjector(&'static str),

  /// A factory or provider failed while building an instance.
  #[error("failed to construct {type_name}: {source}")]
  Construction {
    type_name: &'static str,
    #[source]
    source: BoxError,
  },

  /// Building a key required building the same key again on the same thread.
  #[error("circular dependency detected while resolving {0}")]
  CircularDependency(Key),

  /// A scope in the ancestor chain was dropped before one of its descendants.
  #[error("scope was dropped while a descendant or provider still referred to it")]
  ScopeReleased,

  /// A stored instance did not have the type its key promised.
  #[error("resolved instance does not have the type requested for {0}")]
  TypeMismatch(Key),

  /// A job was submitted to a worker pool after `shutdown`.
  #[error("worker pool has been shut down")]
  PoolShutdown,

  /// A worker thread could not be started.
  #[error("failed to start worker thread: {0}")]
  WorkerSpawn(#[from] std::io::Error),

  /// A future handle was cancelled before its job ran.
  #[error("future was cancelled before it ran")]
  Cancelled,
}

impl InjectError {
  /// Wraps an error raised while building a `T`.
  pub fn construction<T: ?Sized>(source: impl Into<BoxError>) -> Self {
    InjectError::Construction {
      type_name: std::any::type_name::<T>(),
      source: source.into(),
    }
  }
}

/// A specialized `Result` type for `fibre_inject` operations.
pub type Result<T, E = InjectError> = std::result::Result<T, E>;
