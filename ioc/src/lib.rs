//! # Fibre Inject
//!
//! A scoped, thread-safe dependency injection runtime for Rust.
//!
//! Fibre Inject resolves, caches and hands out instances across a tree of
//! nested scopes. Bindings declare how each key is satisfied; keys nobody bound
//! are discovered through a factory registry at runtime.
//!
//! ## Core Concepts
//!
//! - **Key**: a type, optionally qualified by a name. Trait objects are keys too.
//! - **Binding**: how one key is satisfied: by its own factory, by an
//!   implementation type, by a pre-built instance, or by a provider.
//! - **Module**: an ordered set of bindings installed together.
//! - **Scope**: a node of the injector tree. Children see their ancestors'
//!   bindings unless they bind the key themselves.
//! - **Provider**: a deferred producer of one instance. `Lazy` builds once and
//!   caches, `FutureHandle` builds on a worker pool.
//! - **Registry**: the factories and member injectors used for keys without a
//!   binding. A factory marked singleton has its instance promoted to the root
//!   scope the first time it is discovered.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_inject::{Binding, Module, Provider, Registry, Scope};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct EnglishGreeter {
//!     message: Arc<String>,
//! }
//!
//! impl Greeter for EnglishGreeter {
//!     fn greet(&self) -> String {
//!         self.message.to_string()
//!     }
//! }
//!
//! // Factories know how to build types; they may resolve their own dependencies.
//! let registry = Arc::new(Registry::new());
//! registry.add_transient(|scope| {
//!     Ok(EnglishGreeter { message: scope.get_instance::<String>()? })
//! });
//!
//! // Bindings decide which implementation serves which key.
//! let module = Module::named("app")
//!     .bind(Binding::instance(String::from("Hello, World!")))
//!     .bind(Binding::class::<dyn Greeter, EnglishGreeter>(|greeter| -> Arc<dyn Greeter> { greeter }));
//!
//! let root = Scope::builder().registry(registry).module(module).build().unwrap();
//!
//! // A child scope sees everything bound in the root.
//! let request = root.open_child(&[]).unwrap();
//! let greeter = request.get_instance::<dyn Greeter>().unwrap();
//! assert_eq!(greeter.greet(), "Hello, World!");
//!
//! // Lazy handles build on first use and then keep the instance.
//! let lazy = request.get_lazy::<dyn Greeter>().unwrap();
//! assert!(Arc::ptr_eq(&lazy.get().unwrap(), &lazy.get().unwrap()));
//! ```

mod binding;
mod core;
mod error;
mod future;
mod global;
mod locks;
mod macros;
mod pool;
mod provider;
mod registry;
mod scope;

pub use binding::{Binding, Mode, Module};
pub use crate::core::{Instance, Key};
pub use error::{BoxError, InjectError, Result};
pub use future::FutureHandle;
pub use global::shared_pool;
pub use pool::{WorkerPool, WorkerPoolConfig};
pub use provider::{FnProvider, Lazy, Provider, ScopedProvider};
pub use registry::{
  Factory, FactoryResolver, FnFactory, FnMemberInjector, MemberInjector, MemberInjectorResolver,
  Registry,
};
pub use scope::{Scope, ScopeBuilder};
