use fibre_inject::{
  shared_pool, Binding, InjectError, Module, Registry, Scope, WorkerPool, WorkerPoolConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

// --- Test Fixtures ---

struct Report {
  worker: String,
}

struct Blocker;

struct Queued;

struct Flaky;

fn pool(threads: usize) -> Arc<WorkerPool> {
  let config = WorkerPoolConfig::default()
    .threads(threads)
    .thread_name("test-worker");
  Arc::new(WorkerPool::new(config).unwrap())
}

// --- Lazy Tests ---

#[test]
fn test_lazy_defers_construction_until_first_get() {
  // Arrange
  let built = Arc::new(AtomicUsize::new(0));
  let counter = built.clone();
  let registry = Arc::new(Registry::new());
  registry.add_transient(move |_| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(Report {
      worker: "main".to_string(),
    })
  });
  let scope = Scope::builder()
    .registry(registry)
    .module(Module::new().bind(Binding::simple::<Report>()))
    .build()
    .unwrap();

  // Act
  let lazy = scope.get_lazy::<Report>().unwrap();
  assert_eq!(built.load(Ordering::SeqCst), 0);
  assert!(!lazy.is_initialized());

  let r1 = lazy.get().unwrap();
  let r2 = lazy.get().unwrap();

  // Assert
  assert_eq!(built.load(Ordering::SeqCst), 1);
  assert!(Arc::ptr_eq(&r1, &r2));
  assert!(lazy.is_initialized());
}

#[test]
fn test_lazy_does_not_cache_failures() {
  let attempts = Arc::new(AtomicUsize::new(0));
  let counter = attempts.clone();
  let registry = Arc::new(Registry::new());
  registry.add_transient(move |_| {
    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
      return Err(InjectError::construction::<Flaky>("not ready yet"));
    }
    Ok(Flaky)
  });
  let scope = Scope::builder()
    .registry(registry)
    .module(Module::new().bind(Binding::simple::<Flaky>()))
    .build()
    .unwrap();

  let lazy = scope.get_lazy::<Flaky>().unwrap();

  assert!(matches!(lazy.get(), Err(InjectError::Construction { .. })));
  assert!(!lazy.is_initialized());
  assert!(lazy.get().is_ok());
  assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

// --- Future Tests ---

#[test]
fn test_future_builds_on_a_worker_thread() {
  // Arrange
  let registry = Arc::new(Registry::new());
  registry.add_transient(|_| {
    Ok(Report {
      worker: thread::current().name().unwrap_or_default().to_string(),
    })
  });
  let scope = Scope::builder()
    .registry(registry)
    .worker_pool(pool(2))
    .module(Module::new().bind(Binding::simple::<Report>()))
    .build()
    .unwrap();

  // Act
  let report = scope.get_future::<Report>().unwrap().wait().unwrap();

  // Assert
  assert!(report.worker.starts_with("test-worker-"));
}

#[test]
fn test_future_can_be_awaited() {
  let scope = Scope::builder()
    .worker_pool(pool(1))
    .module(Module::new().bind(Binding::instance(String::from("async hello"))))
    .build()
    .unwrap();

  let handle = scope.get_future::<String>().unwrap();
  let value = futures_executor::block_on(handle).unwrap();

  assert_eq!(*value, "async hello");
}

#[test]
fn test_wait_timeout_accepts_an_unbounded_timeout() {
  let scope = Scope::builder()
    .worker_pool(pool(1))
    .module(Module::new().bind(Binding::instance(11u16)))
    .build()
    .unwrap();

  let handle = scope.get_future::<u16>().unwrap();

  assert!(handle.wait_timeout(Duration::MAX));
  assert!(handle.is_done());
  assert_eq!(*handle.wait().unwrap(), 11);
}

#[test]
fn test_cancel_a_queued_future() {
  // Arrange: a single worker kept busy by a job waiting on the gate.
  let gate = Arc::new(Barrier::new(2));
  let worker_gate = gate.clone();
  let registry = Arc::new(Registry::new());
  registry.add_transient(move |_| {
    worker_gate.wait();
    Ok(Blocker)
  });
  registry.add_transient(|_| Ok(Queued));
  let scope = Scope::builder()
    .registry(registry)
    .worker_pool(pool(1))
    .module(
      Module::new()
        .bind(Binding::simple::<Blocker>())
        .bind(Binding::simple::<Queued>()),
    )
    .build()
    .unwrap();

  let busy = scope.get_future::<Blocker>().unwrap();
  let queued = scope.get_future::<Queued>().unwrap();

  // Act
  assert!(queued.cancel());
  gate.wait();

  // Assert
  assert!(busy.wait_timeout(Duration::from_secs(5)));
  assert!(busy.is_done());
  assert!(!busy.cancel());
  assert!(busy.wait().is_ok());

  assert!(queued.is_cancelled());
  assert!(queued.is_done());
  assert!(matches!(queued.wait(), Err(InjectError::Cancelled)));
}

#[test]
fn test_future_reports_construction_errors() {
  let registry = Arc::new(Registry::new());
  registry.add_transient::<Flaky>(|_| Err(InjectError::construction::<Flaky>("database is down")));
  let scope = Scope::builder()
    .registry(registry)
    .worker_pool(pool(1))
    .module(Module::new().bind(Binding::simple::<Flaky>()))
    .build()
    .unwrap();

  let result = scope.get_future::<Flaky>().unwrap().wait();

  let err = result.err().unwrap();
  assert!(matches!(err, InjectError::Construction { .. }));
  assert!(err.to_string().contains("database is down"));
}

#[test]
fn test_future_reports_worker_panics() {
  let registry = Arc::new(Registry::new());
  registry.add_transient::<Flaky>(|_| panic!("factory exploded"));
  let scope = Scope::builder()
    .registry(registry)
    .worker_pool(pool(1))
    .module(Module::new().bind(Binding::simple::<Flaky>()))
    .build()
    .unwrap();

  let result = scope.get_future::<Flaky>().unwrap().wait();

  assert!(matches!(result, Err(InjectError::Construction { .. })));
  // The worker survives the panic and keeps serving jobs.
  scope.install_modules(&[Module::new().bind(Binding::instance(1u8))]).unwrap();
  assert_eq!(*scope.get_future::<u8>().unwrap().wait().unwrap(), 1);
}

#[test]
fn test_future_after_pool_shutdown_fails() {
  let workers = pool(1);
  let scope = Scope::builder()
    .worker_pool(workers.clone())
    .module(Module::new().bind(Binding::instance(7u64)))
    .build()
    .unwrap();

  workers.shutdown();

  assert!(workers.is_shutdown());
  assert!(matches!(scope.get_future::<u64>(), Err(InjectError::PoolShutdown)));
}

#[test]
fn test_scopes_fall_back_to_the_shared_pool() {
  let scope = Scope::new(Arc::new(Registry::new()));
  scope
    .install_modules(&[Module::new().bind(Binding::instance(3i32))])
    .unwrap();

  assert!(Arc::ptr_eq(&scope.worker_pool().unwrap(), &shared_pool().unwrap()));
  assert_eq!(*scope.get_future::<i32>().unwrap().wait().unwrap(), 3);
}
