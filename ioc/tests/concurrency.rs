use fibre_inject::{Binding, Module, Registry, Scope};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

// --- Test Fixtures ---

struct SharedCache;

struct RequestWorker;

const THREADS: usize = 8;

// --- Concurrency Tests ---

#[test]
fn test_concurrent_discovery_stores_one_provider() {
  // Arrange
  let registry = Arc::new(Registry::new());
  registry.add_transient(|_| Ok(RequestWorker));
  let root = Scope::builder().registry(registry).build().unwrap();
  let scope = root.open_child(&[]).unwrap();
  let barrier = Arc::new(Barrier::new(THREADS));

  // Act
  let handles: Vec<_> = (0..THREADS)
    .map(|_| {
      let scope = scope.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        scope.get_provider::<RequestWorker>().unwrap()
      })
    })
    .collect();
  let providers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

  // Assert: every racer got the provider that was stored first.
  let first = &providers[0];
  assert!(providers.iter().all(|provider| provider.ptr_eq(first)));
  assert!(first.ptr_eq(&scope.get_provider::<RequestWorker>().unwrap()));
}

#[test]
fn test_concurrent_singleton_discovery_yields_one_instance() {
  // Arrange
  let built = Arc::new(AtomicUsize::new(0));
  let counter = built.clone();
  let registry = Arc::new(Registry::new());
  registry.add_singleton(move |_| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(SharedCache)
  });
  let root = Scope::builder().registry(registry).build().unwrap();
  let barrier = Arc::new(Barrier::new(THREADS));

  // Act: each thread resolves through its own child scope.
  let handles: Vec<_> = (0..THREADS)
    .map(|_| {
      let child = root.open_child(&[]).unwrap();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        child.get_instance::<SharedCache>().unwrap()
      })
    })
    .collect();
  let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

  // Assert
  let first = &instances[0];
  assert!(instances.iter().all(|instance| Arc::ptr_eq(instance, first)));
  assert!(Arc::ptr_eq(first, &root.get_instance::<SharedCache>().unwrap()));
  // Racing threads may each try the factory, but never more than once apiece.
  let built = built.load(Ordering::SeqCst);
  assert!((1..=THREADS).contains(&built));
}

#[test]
fn test_concurrent_installs_into_one_scope() {
  // Arrange
  let scope = Scope::builder().build().unwrap();
  let barrier = Arc::new(Barrier::new(THREADS));

  // Act
  let handles: Vec<_> = (0..THREADS)
    .map(|i| {
      let scope = scope.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        let module =
          Module::new().bind(Binding::instance(format!("value-{i}")).named(&format!("slot-{i}")));
        barrier.wait();
        scope.install_modules(&[module]).unwrap();
      })
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }

  // Assert
  assert_eq!(scope.bound_keys().len(), THREADS);
  for i in 0..THREADS {
    let value = scope.get_named_instance::<String>(&format!("slot-{i}")).unwrap();
    assert_eq!(*value, format!("value-{i}"));
  }
}

#[test]
fn test_resolution_while_installing() {
  // Readers of one key must never block on installs of another.
  let registry = Arc::new(Registry::new());
  registry.add_transient(|_| Ok(RequestWorker));
  let scope = Scope::builder()
    .registry(registry)
    .module(Module::new().bind(Binding::simple::<RequestWorker>()))
    .build()
    .unwrap();
  let barrier = Arc::new(Barrier::new(2));

  let installer = {
    let scope = scope.clone();
    let barrier = barrier.clone();
    thread::spawn(move || {
      barrier.wait();
      for i in 0..100u32 {
        scope
          .install_modules(&[Module::new().bind(Binding::instance(i))])
          .unwrap();
      }
    })
  };
  let reader = {
    let scope = scope.clone();
    thread::spawn(move || {
      barrier.wait();
      for _ in 0..100 {
        scope.get_instance::<RequestWorker>().unwrap();
      }
    })
  };

  installer.join().unwrap();
  reader.join().unwrap();
  assert_eq!(*scope.get_instance::<u32>().unwrap(), 99);
}
