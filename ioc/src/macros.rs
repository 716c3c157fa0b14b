//! Public macros for ergonomic resolution from a scope.

/// Resolves a service from a scope, panicking if it cannot be built.
///
/// Meant for factories and application wiring where a missing dependency is a
/// programming error. For a non-panicking version, call
/// `scope.get_instance::<T>()` directly.
///
/// # Panics
///
/// Panics with the resolution error if the service cannot be resolved.
///
/// # Examples
///
/// ```
/// use fibre_inject::{resolve, Binding, Module, Scope};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter { fn greet(&self) -> String { "Hello!".to_string() } }
///
/// let module = Module::new()
///   .bind(Binding::instance(String::from("hello")))
///   .bind(Binding::shared_instance::<dyn Greeter>(Arc::new(EnglishGreeter)));
/// let scope = Scope::builder().module(module).build().unwrap();
///
/// let message = resolve!(scope, String);
/// assert_eq!(*message, "hello");
///
/// let greeter = resolve!(scope, trait Greeter);
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
    // Named trait object: resolve!(scope, trait MyTrait, "name")
    ($scope:expr, trait $trait_ident:ident, $name:expr) => {
        ($scope)
            .get_named_instance::<dyn $trait_ident>($name)
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required trait service with name '{}': {}: {}",
                    $name,
                    std::any::type_name::<dyn $trait_ident>(),
                    err
                )
            })
    };

    // Trait object: resolve!(scope, trait MyTrait)
    ($scope:expr, trait $trait_ident:ident) => {
        ($scope)
            .get_instance::<dyn $trait_ident>()
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required trait service: {}: {}",
                    std::any::type_name::<dyn $trait_ident>(),
                    err
                )
            })
    };

    // Named concrete type: resolve!(scope, MyService, "name")
    ($scope:expr, $type:ty, $name:expr) => {
        ($scope)
            .get_named_instance::<$type>($name)
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required service with name '{}': {}: {}",
                    $name,
                    std::any::type_name::<$type>(),
                    err
                )
            })
    };

    // Concrete type: resolve!(scope, MyService)
    ($scope:expr, $type:ty) => {
        ($scope)
            .get_instance::<$type>()
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required service: {}: {}",
                    std::any::type_name::<$type>(),
                    err
                )
            })
    };
}
