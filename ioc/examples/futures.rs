use fibre_inject::{Binding, Module, Registry, Scope, WorkerPool, WorkerPoolConfig};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct Report {
  built_on: String,
}

fn main() {
  let registry = Arc::new(Registry::new());
  registry.add_transient(|_| {
    // Pretend this takes a while.
    thread::sleep(Duration::from_millis(50));
    Ok(Report {
      built_on: thread::current().name().unwrap_or("unnamed").to_string(),
    })
  });

  let pool = WorkerPool::new(WorkerPoolConfig::default().threads(2).thread_name("report"))
    .expect("failed to start the worker pool");
  let scope = Scope::builder()
    .registry(registry)
    .worker_pool(Arc::new(pool))
    .module(Module::new().bind(Binding::simple::<Report>()))
    .build()
    .expect("failed to build the root scope");

  // Construction is deferred until the first `get`.
  let lazy = scope.get_lazy::<Report>().unwrap();
  println!("lazy initialized before get: {}", lazy.is_initialized());
  println!("lazy report built on {}", lazy.get().unwrap().built_on);

  // Construction happens on the pool; block for it or poll it later.
  let pending: Vec<_> = (0..4).map(|_| scope.get_future::<Report>().unwrap()).collect();
  for handle in pending {
    let report = handle.wait().unwrap();
    println!("future report built on {}", report.built_on);
  }

  let cancelled = scope.get_future::<Report>().unwrap();
  if cancelled.cancel() {
    println!("cancelled before it started");
  }
}
