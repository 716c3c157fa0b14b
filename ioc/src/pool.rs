//! The fixed-size worker pool behind `Scope::get_future`.

use crate::error::{InjectError, Result};
use fibre::mpmc;
use parking_lot::Mutex;
use std::fmt;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Settings for a `WorkerPool`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorkerPoolConfig {
  /// Number of worker threads. Defaults to the available parallelism.
  pub threads: usize,
  /// Name given to every worker thread.
  pub thread_name: String,
}

impl Default for WorkerPoolConfig {
  fn default() -> Self {
    Self {
      threads: num_cpus::get().max(1),
      thread_name: "fibre-inject-worker".to_owned(),
    }
  }
}

impl WorkerPoolConfig {
  pub fn threads(mut self, threads: usize) -> Self {
    self.threads = threads;
    self
  }

  pub fn thread_name(mut self, name: impl Into<String>) -> Self {
    self.thread_name = name.into();
    self
  }
}

/// A fixed set of threads running submitted jobs in submission order.
///
/// The pool never grows or shrinks. `shutdown` stops accepting jobs, lets the
/// queued ones finish and joins the threads; dropping the pool does the same.
pub struct WorkerPool {
  sender: Mutex<Option<mpmc::Sender<Job>>>,
  workers: Mutex<Vec<JoinHandle<()>>>,
  threads: usize,
}

impl WorkerPool {
  pub fn new(config: WorkerPoolConfig) -> Result<Self> {
    if config.threads == 0 {
      return Err(InjectError::InvalidArgument(
        "a worker pool needs at least one thread".to_owned(),
      ));
    }

    let (sender, receiver) = mpmc::unbounded::<Job>();
    let mut workers = Vec::with_capacity(config.threads);
    for index in 0..config.threads {
      let receiver = receiver.clone();
      let spawned = thread::Builder::new()
        .name(format!("{}-{}", config.thread_name, index))
        .spawn(move || {
          // Ends once every sender is gone and the queue is drained.
          while let Ok(job) = receiver.recv() {
            job();
          }
        });
      match spawned {
        Ok(handle) => workers.push(handle),
        Err(err) => {
          // Disconnect the threads already started before bailing out.
          drop(sender);
          for worker in workers {
            let _ = worker.join();
          }
          return Err(InjectError::WorkerSpawn(err));
        }
      }
    }

    debug!(threads = config.threads, name = %config.thread_name, "started worker pool");
    Ok(Self {
      sender: Mutex::new(Some(sender)),
      workers: Mutex::new(workers),
      threads: config.threads,
    })
  }

  pub fn threads(&self) -> usize {
    self.threads
  }

  pub fn is_shutdown(&self) -> bool {
    self.sender.lock().is_none()
  }

  pub(crate) fn execute(&self, job: Job) -> Result<()> {
    let sender = self.sender.lock();
    match sender.as_ref() {
      Some(sender) => sender.send(job).map_err(|_| InjectError::PoolShutdown),
      None => {
        warn!("rejected job submitted after worker pool shutdown");
        Err(InjectError::PoolShutdown)
      }
    }
  }

  /// Stops accepting jobs, runs the ones already queued and joins the threads.
  ///
  /// Calling it again is a no-op. When called from one of the pool's own
  /// threads, that thread is left to exit on its own.
  pub fn shutdown(&self) {
    let Some(sender) = self.sender.lock().take() else {
      return;
    };
    drop(sender);

    let workers = std::mem::take(&mut *self.workers.lock());
    let current = thread::current().id();
    for worker in workers {
      if worker.thread().id() == current {
        continue;
      }
      let _ = worker.join();
    }
    debug!(threads = self.threads, "worker pool shut down");
  }
}

impl Drop for WorkerPool {
  fn drop(&mut self) {
    self.shutdown();
  }
}

impl fmt::Debug for WorkerPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerPool")
      .field("threads", &self.threads)
      .field("shutdown", &self.is_shutdown())
      .finish()
  }
}
