//! Per-key critical sections shared by every scope of one hierarchy.

use crate::core::Key;
use parking_lot::{Mutex, MutexGuard};

/// The default number of lock stripes.
pub(crate) const DEFAULT_LOCK_STRIPES: usize = 64;

/// A fixed table of mutexes indexed by the hash of a key.
///
/// Operations on the same key always take the same stripe, so installs and
/// lookups of one key are serialized across all scopes of a hierarchy while
/// unrelated keys rarely contend. Callers must not build instances while
/// holding a stripe.
pub(crate) struct KeyLocks {
  stripes: Box<[Mutex<()>]>,
  mask: usize,
  hasher: ahash::RandomState,
}

impl KeyLocks {
  pub(crate) fn new(stripes: usize) -> Self {
    // Power of two so the stripe index is a mask instead of a modulo.
    let stripes = stripes.max(1).next_power_of_two();
    Self {
      stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
      mask: stripes - 1,
      hasher: ahash::RandomState::new(),
    }
  }

  pub(crate) fn lock(&self, key: &Key) -> MutexGuard<'_, ()> {
    self.stripes[self.stripe_index(key)].lock()
  }

  #[cfg(test)]
  fn stripe_count(&self) -> usize {
    self.stripes.len()
  }

  fn stripe_index(&self, key: &Key) -> usize {
    (self.hasher.hash_one(key) as usize) & self.mask
  }
}

impl Default for KeyLocks {
  fn default() -> Self {
    Self::new(DEFAULT_LOCK_STRIPES)
  }
}
