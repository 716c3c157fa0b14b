use fibre_inject::{Binding, InjectError, Key, Module, Registry, Scope};
use std::error::Error as _;
use std::sync::Arc;

// --- Test Fixtures ---

struct Unregistered;

struct Database;

// Two services that need each other.
struct Chicken;
struct Egg;

#[derive(Debug)]
struct ConnectionRefused;

impl std::fmt::Display for ConnectionRefused {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("connection refused")
  }
}

impl std::error::Error for ConnectionRefused {}

// --- Error Tests ---

#[test]
fn test_blank_name_lookup_is_an_invalid_argument() {
  let scope = Scope::builder().build().unwrap();

  assert!(matches!(
    scope.get_named_provider::<String>(""),
    Err(InjectError::InvalidArgument(_))
  ));
  assert!(matches!(
    scope.get_named_instance::<String>("   "),
    Err(InjectError::InvalidArgument(_))
  ));
}

#[test]
fn test_key_of_another_type_is_an_invalid_argument() {
  let scope = Scope::builder()
    .module(Module::new().bind(Binding::instance(String::from("text"))))
    .build()
    .unwrap();

  let result = scope.get_provider_for::<u32>(&Key::of::<String>());

  assert!(matches!(result, Err(InjectError::InvalidArgument(_))));
}

#[test]
fn test_blank_binding_name_fails_installation() {
  let scope = Scope::builder().build().unwrap();
  let module = Module::new().bind(Binding::instance(1u32).named(" "));

  let result = scope.install_modules(&[module]);

  assert!(matches!(result, Err(InjectError::Configuration { .. })));
  assert!(scope.bound_keys().is_empty());
}

#[test]
fn test_binding_without_a_factory_fails_installation() {
  let result = Scope::builder()
    .module(Module::named("broken").bind(Binding::simple::<Database>()))
    .build();

  match result {
    Err(InjectError::Configuration { key, .. }) => assert_eq!(key, Key::of::<Database>()),
    other => panic!("expected a configuration error, got {:?}", other.err()),
  }
}

#[test]
fn test_unbound_key_without_factory() {
  let scope = Scope::builder().build().unwrap();

  let result = scope.get_instance::<Unregistered>();

  match result {
    Err(InjectError::NoFactory(key)) => assert!(key.is_type::<Unregistered>()),
    other => panic!("expected NoFactory, got {:?}", other.err()),
  }
}

#[test]
fn test_inject_without_member_injector() {
  let scope = Scope::builder().build().unwrap();
  let mut target = Unregistered;

  assert!(matches!(
    scope.inject(&mut target),
    Err(InjectError::NoMemberInjector(_))
  ));
}

#[test]
fn test_factory_errors_reach_the_caller() {
  // Arrange
  let registry = Arc::new(Registry::new());
  registry.add_transient::<Database>(|_| Err(InjectError::construction::<Database>(ConnectionRefused)));
  let scope = Scope::builder()
    .registry(registry)
    .module(Module::new().bind(Binding::simple::<Database>()))
    .build()
    .unwrap();

  // Act
  let err = scope.get_instance::<Database>().err().unwrap();

  // Assert
  assert!(matches!(err, InjectError::Construction { .. }));
  assert!(err.to_string().contains("connection refused"));
  assert!(err.source().unwrap().is::<ConnectionRefused>());
}

#[test]
fn test_circular_dependency_is_detected() {
  let registry = Arc::new(Registry::new());
  registry.add_transient(|scope| {
    scope.get_instance::<Egg>()?;
    Ok(Chicken)
  });
  registry.add_transient(|scope| {
    scope.get_instance::<Chicken>()?;
    Ok(Egg)
  });
  let scope = Scope::builder().registry(registry).build().unwrap();

  let result = scope.get_instance::<Chicken>();

  assert!(matches!(result, Err(InjectError::CircularDependency(_))));
  // The failed attempt leaves nothing half-registered behind.
  assert!(!scope.is_bound::<Chicken>());
  assert!(!scope.is_bound::<Egg>());
}
