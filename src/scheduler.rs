use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread::Scope;

/// One-shot completion rendezvous: a flag under a mutex plus a condvar. The
/// last worker out fires it exactly once; only the entry task ever waits.
pub(crate) struct DoneSignal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl DoneSignal {
    pub(crate) fn new() -> Self {
        Self {
            flag: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn notify(&self) {
        *self.flag.lock().unwrap() = true;
        self.cond.notify_one();
    }

    /// Blocks until [`DoneSignal::notify`].
    pub(crate) fn wait(&self) {
        let mut done = self.flag.lock().unwrap();
        while !*done {
            done = self.cond.wait(done).unwrap();
        }
    }
}

/// Shared handle for one top-level sort call: the spawn scope, the live-worker
/// counter (entry task included) and the completion rendezvous.
///
/// The handle is `Copy` and travels by value into every spawned worker; it
/// only holds references to `Sync` state, so the spawn closures stay `Send`.
pub(crate) struct Workers<'scope, 'env> {
    pub(crate) scope: &'scope Scope<'scope, 'env>,
    live: &'scope AtomicU32,
    done: &'scope DoneSignal,
}

impl<'scope, 'env> Clone for Workers<'scope, 'env> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'scope, 'env> Copy for Workers<'scope, 'env> {}

impl<'scope, 'env> Workers<'scope, 'env> {
    pub(crate) fn new(
        scope: &'scope Scope<'scope, 'env>,
        live: &'scope AtomicU32,
        done: &'scope DoneSignal,
    ) -> Self {
        Self { scope, live, done }
    }

    /// Admission check for spawning another worker. The relaxed load may race
    /// concurrent registrations; the resulting overshoot is at most one per
    /// racing task and accepted.
    pub(crate) fn is_full(&self, max_workers: u32) -> bool {
        self.live.load(Ordering::Relaxed) >= max_workers
    }

    /// Registers a worker about to be spawned.
    pub(crate) fn add(&self) {
        if self.live.fetch_add(1, Ordering::AcqRel) == u32::MAX {
            panic!("parasort: worker counter overflow");
        }
    }

    /// Deregisters a worker; returns how many remain live.
    pub(crate) fn remove(&self) -> u32 {
        let prev = self.live.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            panic!("parasort: worker counter underflow");
        }
        prev - 1
    }

    /// Worker epilogue: the task that drives the counter to zero signals the
    /// entry task. At most one task can ever take that branch.
    pub(crate) fn leave(&self) {
        if self.remove() == 0 {
            self.done.notify();
        }
    }

    /// Epilogue as a drop guard, so a worker unwinding out of its sort still
    /// releases its slot and the entry task cannot wait forever.
    pub(crate) fn leave_guard(self) -> LeaveGuard<'scope, 'env> {
        LeaveGuard { workers: self }
    }
}

pub(crate) struct LeaveGuard<'scope, 'env> {
    workers: Workers<'scope, 'env>,
}

impl Drop for LeaveGuard<'_, '_> {
    fn drop(&mut self) {
        self.workers.leave();
    }
}
