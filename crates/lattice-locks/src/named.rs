use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Entries = Arc<Mutex<HashMap<String, Entry>>>;

/// Lock acquisition was abandoned because the caller's token fired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cancelled while waiting for lock `{key}`")]
pub struct Cancelled {
  pub key: String,
}

#[derive(Debug)]
struct Entry {
  mutex: Arc<AsyncMutex<()>>,
  /// Guards plus waiters currently registered for this key.
  holders: usize,
}

/// Registry of named mutexes.
///
/// A mutex is created the first time its name is requested and dropped once
/// nobody holds or waits for it, so the registry only grows with the number
/// of names in use at the same time. Waiters are served in FIFO order.
#[derive(Debug, Default)]
pub struct NamedLocks {
  entries: Entries,
}

impl NamedLocks {
  pub fn new() -> Self {
    Self::default()
  }

  /// The registry shared by the whole process.
  pub fn shared() -> Arc<NamedLocks> {
    static SHARED: OnceLock<Arc<NamedLocks>> = OnceLock::new();
    SHARED.get_or_init(|| Arc::new(NamedLocks::new())).clone()
  }

  /// Wait until the lock for `key` is free and take it.
  ///
  /// There is no timeout. The lock is released when the guard is dropped.
  pub async fn acquire(&self, key: &str) -> NamedLockGuard {
    let (registration, mutex) = self.register(key);
    debug!(key, "waiting for lock");

    let guard = mutex.lock_owned().await;
    debug!(key, "lock acquired");

    NamedLockGuard {
      _guard: guard,
      registration,
    }
  }

  /// Like [`acquire`](Self::acquire), but gives up when `cancel` fires.
  ///
  /// A token that is already cancelled never takes the lock, even if it is
  /// free.
  pub async fn acquire_with_cancel(
    &self,
    key: &str,
    cancel: &CancellationToken,
  ) -> Result<NamedLockGuard, Cancelled> {
    let (registration, mutex) = self.register(key);
    debug!(key, "waiting for lock");

    tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        debug!(key, "lock wait cancelled");
        Err(Cancelled { key: key.to_string() })
      }
      guard = mutex.lock_owned() => {
        debug!(key, "lock acquired");
        Ok(NamedLockGuard { _guard: guard, registration })
      }
    }
  }

  /// Number of names currently held or waited on.
  pub fn len(&self) -> usize {
    self.entries.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.lock().is_empty()
  }

  fn register(&self, key: &str) -> (Registration, Arc<AsyncMutex<()>>) {
    let mut entries = self.entries.lock();
    let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
      mutex: Arc::new(AsyncMutex::new(())),
      holders: 0,
    });
    entry.holders += 1;
    let mutex = entry.mutex.clone();

    let registration = Registration {
      key: key.to_string(),
      entries: self.entries.clone(),
    };
    (registration, mutex)
  }
}

/// Counts one holder or waiter of a key until dropped.
#[derive(Debug)]
struct Registration {
  key: String,
  entries: Entries,
}

impl Drop for Registration {
  fn drop(&mut self) {
    let mut entries = self.entries.lock();
    if let Some(entry) = entries.get_mut(&self.key) {
      entry.holders = entry.holders.saturating_sub(1);
      if entry.holders == 0 {
        entries.remove(&self.key);
      }
    }
  }
}

/// Holds a named lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct NamedLockGuard {
  // Field order matters: the mutex is unlocked before the registration is
  // released, so the entry is never removed while still locked.
  _guard: OwnedMutexGuard<()>,
  registration: Registration,
}

impl NamedLockGuard {
  pub fn key(&self) -> &str {
    &self.registration.key
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use super::*;

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_same_key_is_serialized() {
    let locks = Arc::new(NamedLocks::new());
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
      .map(|_| {
        let locks = locks.clone();
        let active = active.clone();
        let max_active = max_active.clone();
        tokio::spawn(async move {
          let _guard = locks.acquire("wf1").await;
          let now = active.fetch_add(1, Ordering::SeqCst) + 1;
          max_active.fetch_max(now, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(5)).await;
          active.fetch_sub(1, Ordering::SeqCst);
        })
      })
      .collect();

    for handle in handles {
      handle.await.expect("task panicked");
    }

    assert_eq!(max_active.load(Ordering::SeqCst), 1);
    assert!(locks.is_empty());
  }

  #[tokio::test]
  async fn test_different_keys_do_not_contend() {
    let locks = NamedLocks::new();
    let _a = locks.acquire("wf-a").await;

    let b = tokio::time::timeout(Duration::from_secs(1), locks.acquire("wf-b")).await;

    assert!(b.is_ok(), "unrelated key should be free");
    assert_eq!(locks.len(), 2);
  }

  #[tokio::test]
  async fn test_entry_removed_after_release() {
    let locks = NamedLocks::new();

    let guard = locks.acquire("wf1").await;
    assert_eq!(guard.key(), "wf1");
    assert_eq!(locks.len(), 1);

    drop(guard);
    assert!(locks.is_empty());
  }

  #[tokio::test]
  async fn test_cancel_while_waiting() {
    let locks = Arc::new(NamedLocks::new());
    let held = locks.acquire("wf1").await;

    let cancel = CancellationToken::new();
    let waiter = {
      let locks = locks.clone();
      let cancel = cancel.clone();
      tokio::spawn(async move { locks.acquire_with_cancel("wf1", &cancel).await.map(|_| ()) })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let result = waiter.await.expect("task panicked");
    assert_eq!(
      result,
      Err(Cancelled {
        key: "wf1".to_string()
      })
    );

    drop(held);
    assert!(locks.is_empty());
  }

  #[tokio::test]
  async fn test_cancelled_token_never_acquires() {
    let locks = NamedLocks::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = locks.acquire_with_cancel("wf1", &cancel).await;

    assert!(result.is_err());
    assert!(locks.is_empty());
  }

  #[tokio::test]
  async fn test_waiters_served_in_order() {
    let locks = Arc::new(NamedLocks::new());
    let order = Arc::new(Mutex::new(Vec::new()));
    let held = locks.acquire("wf1").await;

    let mut handles = Vec::new();
    for i in 0..3 {
      let locks = locks.clone();
      let order = order.clone();
      handles.push(tokio::spawn(async move {
        let _guard = locks.acquire("wf1").await;
        order.lock().push(i);
      }));
      // Let each waiter enqueue before the next one is spawned.
      tokio::time::sleep(Duration::from_millis(10)).await;
    }

    drop(held);
    for handle in handles {
      handle.await.expect("task panicked");
    }

    assert_eq!(*order.lock(), vec![0, 1, 2]);
  }
}
