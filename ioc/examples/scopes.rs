use fibre_inject::{Binding, Module, Registry, Scope};
use std::sync::Arc;

struct RequestContext {
  user: Arc<String>,
}

struct ConnectionPool {
  size: usize,
}

fn main() {
  let registry = Arc::new(Registry::new());
  // Discovered once, then shared by every scope of the tree.
  registry.add_singleton(|_| Ok(ConnectionPool { size: 16 }));
  registry.add_transient(|scope| {
    Ok(RequestContext {
      user: scope.get_instance::<String>()?,
    })
  });

  let root = Scope::builder()
    .registry(registry)
    .module(Module::new().bind(Binding::instance(String::from("anonymous"))))
    .build()
    .expect("failed to build the root scope");

  for user in ["alice", "bob"] {
    // Each request gets its own child scope with its own user binding.
    let request = root
      .open_child(&[Module::new().bind(Binding::instance(user.to_string()))])
      .expect("failed to open a request scope");

    let context = request.get_instance::<RequestContext>().unwrap();
    let pool = request.get_instance::<ConnectionPool>().unwrap();
    println!(
      "request for {} at depth {} uses a pool of {} connections",
      context.user,
      request.depth(),
      pool.size
    );
  }

  // The root never bound a user of its own beyond the default.
  let context = root.get_instance::<RequestContext>().unwrap();
  println!("root context user: {}", context.user);
  println!("root scope now holds: {:?}", root.bound_keys());
}
