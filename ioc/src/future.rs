//! Handles to instances being built on a worker pool.

use crate::error::{InjectError, Result};
use crate::pool::WorkerPool;
use crate::provider::{Provider, ScopedProvider};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

/// Where the job behind a handle currently is.
enum Slot<T: ?Sized> {
  Queued,
  Running,
  Done(Result<Arc<T>>),
  Cancelled,
  Taken,
}

impl<T: ?Sized> Slot<T> {
  fn is_finished(&self) -> bool {
    matches!(self, Slot::Done(_) | Slot::Cancelled | Slot::Taken)
  }
}

struct Inner<T: ?Sized> {
  slot: Slot<T>,
  wakers: Vec<Waker>,
}

/// State shared by the handle and the job running on the pool.
struct Shared<T: ?Sized> {
  inner: Mutex<Inner<T>>,
  finished: Condvar,
}

impl<T: ?Sized> Shared<T> {
  fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        slot: Slot::Queued,
        wakers: Vec::new(),
      }),
      finished: Condvar::new(),
    }
  }

  /// Moves a queued job to running. Returns `false` if it was cancelled.
  fn start(&self) -> bool {
    let mut inner = self.inner.lock();
    match inner.slot {
      Slot::Queued => {
        inner.slot = Slot::Running;
        true
      }
      _ => false,
    }
  }

  fn finish(&self, slot: Slot<T>) {
    let wakers = {
      let mut inner = self.inner.lock();
      inner.slot = slot;
      std::mem::take(&mut inner.wakers)
    };
    self.wake_all(wakers);
  }

  fn wake_all(&self, wakers: Vec<Waker>) {
    self.finished.notify_all();
    for waker in wakers {
      waker.wake();
    }
  }

  /// Takes the outcome out of a finished slot.
  fn take(inner: &mut Inner<T>) -> Option<Result<Arc<T>>> {
    match std::mem::replace(&mut inner.slot, Slot::Taken) {
      Slot::Done(result) => Some(result),
      Slot::Cancelled | Slot::Taken => {
        inner.slot = Slot::Cancelled;
        Some(Err(InjectError::Cancelled))
      }
      pending => {
        inner.slot = pending;
        None
      }
    }
  }
}

/// The pending result of `Scope::get_future`.
///
/// Block on it with `wait`, or `.await` it from any async runtime.
pub struct FutureHandle<T: ?Sized> {
  shared: Arc<Shared<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> FutureHandle<T> {
  pub(crate) fn spawn(pool: &WorkerPool, provider: ScopedProvider<T>) -> Result<Self> {
    let shared = Arc::new(Shared::new());
    let job_state = Arc::clone(&shared);
    pool.execute(Box::new(move || {
      if !job_state.start() {
        return;
      }
      let result = panic::catch_unwind(AssertUnwindSafe(|| provider.get())).unwrap_or_else(|_| {
        Err(InjectError::construction::<T>(
          "provider panicked on a worker thread",
        ))
      });
      job_state.finish(Slot::Done(result));
    }))?;
    Ok(Self { shared })
  }
}

impl<T: ?Sized> FutureHandle<T> {
  /// Cancels the job if it has not started yet.
  ///
  /// Returns `true` if the job will not run. A job already running is not
  /// interrupted and `false` is returned.
  pub fn cancel(&self) -> bool {
    let wakers = {
      let mut inner = self.shared.inner.lock();
      match inner.slot {
        Slot::Queued => inner.slot = Slot::Cancelled,
        Slot::Cancelled => return true,
        _ => return false,
      }
      std::mem::take(&mut inner.wakers)
    };
    self.shared.wake_all(wakers);
    true
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self.shared.inner.lock().slot, Slot::Cancelled)
  }

  /// Returns `true` once the job finished or was cancelled.
  pub fn is_done(&self) -> bool {
    self.shared.inner.lock().slot.is_finished()
  }

  /// Blocks for at most `timeout`. Returns `true` if the handle is done.
  ///
  /// A timeout too large to be represented as a deadline waits without limit.
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let deadline = Instant::now().checked_add(timeout);
    let mut inner = self.shared.inner.lock();
    while !inner.slot.is_finished() {
      match deadline {
        Some(deadline) => {
          if self.shared.finished.wait_until(&mut inner, deadline).timed_out() {
            return inner.slot.is_finished();
          }
        }
        None => self.shared.finished.wait(&mut inner),
      }
    }
    true
  }

  /// Blocks until the job finishes and returns its outcome.
  ///
  /// A cancelled handle yields `InjectError::Cancelled`.
  pub fn wait(self) -> Result<Arc<T>> {
    let mut inner = self.shared.inner.lock();
    loop {
      if let Some(result) = Shared::take(&mut inner) {
        return result;
      }
      self.shared.finished.wait(&mut inner);
    }
  }
}

impl<T: ?Sized> Future for FutureHandle<T> {
  type Output = Result<Arc<T>>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut inner = self.shared.inner.lock();
    if let Some(result) = Shared::take(&mut inner) {
      return Poll::Ready(result);
    }
    if !inner.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
      inner.wakers.push(cx.waker().clone());
    }
    Poll::Pending
  }
}

impl<T: ?Sized> fmt::Debug for FutureHandle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match self.shared.inner.lock().slot {
      Slot::Queued => "queued",
      Slot::Running => "running",
      Slot::Done(_) | Slot::Taken => "done",
      Slot::Cancelled => "cancelled",
    };
    f.debug_struct("FutureHandle").field("state", &state).finish()
  }
}
