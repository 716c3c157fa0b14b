use fibre_inject::{resolve, Binding, Module, Registry, Scope};
use std::sync::Arc;

// 1. Define the abstraction (the trait)
trait Logger: Send + Sync {
  fn log(&self, message: &str);
}

// 2. Define a concrete implementation
struct ConsoleLogger;
impl Logger for ConsoleLogger {
  fn log(&self, message: &str) {
    println!("[CONSOLE LOG]: {}", message);
  }
}

// 3. Define a service that depends on the abstraction
struct ReportService {
  logger: Arc<dyn Logger>,
}

impl ReportService {
  fn generate_report(&self) {
    self.logger.log("Starting report generation.");
    self.logger.log("Finished report generation.");
  }
}

fn main() {
  // --- Registration ---

  // Factories know how to build concrete types. ReportService resolves its own
  // logger from whichever scope builds it.
  let registry = Arc::new(Registry::new());
  registry.add_transient(|_| Ok(ConsoleLogger));
  registry.add_singleton(|scope| {
    Ok(ReportService {
      logger: resolve!(scope, trait Logger),
    })
  });

  // The binding decides that `dyn Logger` is served by ConsoleLogger.
  let module = Module::named("logging").bind(Binding::class::<dyn Logger, ConsoleLogger>(
    |logger| -> Arc<dyn Logger> { logger },
  ));
  let root = Scope::builder()
    .registry(registry)
    .module(module)
    .build()
    .expect("failed to build the root scope");

  // --- Resolution and Usage ---
  println!("Resolving the high-level service...");
  let report_service = resolve!(root, ReportService);

  println!("Using the service...");
  report_service.generate_report();
}
