//! The event the driver thread sleeps on.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A settable flag with a blocking wait, shared between the driver thread and anything that may
/// need it to wake up sooner: GPIO edge callbacks and timer changes.
///
/// Setting is sticky until [Interrupt::clear], so a signal raised while the driver is busy
/// sampling just makes its next wait return at once.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        let (flag, condvar) = &*self.inner;
        *lock(flag) = true;
        condvar.notify_all();
    }

    pub fn clear(&self) {
        *lock(&self.inner.0) = false;
    }

    pub fn is_set(&self) -> bool {
        *lock(&self.inner.0)
    }

    /// Blocks until the interrupt is set or `timeout` elapses, returning whether it was set.
    ///
    /// `None` waits indefinitely; a zero timeout returns immediately.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let (flag, condvar) = &*self.inner;
        let guard = lock(flag);
        match timeout {
            None => *condvar
                .wait_while(guard, |set| !*set)
                .unwrap_or_else(PoisonError::into_inner),
            Some(timeout) if timeout.is_zero() => *guard,
            Some(timeout) => {
                let (guard, _) = condvar
                    .wait_timeout_while(guard, timeout, |set| !*set)
                    .unwrap_or_else(PoisonError::into_inner);
                *guard
            }
        }
    }
}

fn lock(flag: &Mutex<bool>) -> MutexGuard<'_, bool> {
    flag.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_wait_times_out_when_not_set() {
        let interrupt = Interrupt::new();
        let start = Instant::now();

        assert!(!interrupt.wait(Some(Duration::from_millis(20))));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_zero_timeout_returns_immediately() {
        let interrupt = Interrupt::new();
        assert!(!interrupt.wait(Some(Duration::ZERO)));

        interrupt.set();
        assert!(interrupt.wait(Some(Duration::ZERO)));
    }

    #[test]
    fn test_set_is_sticky_until_cleared() {
        let interrupt = Interrupt::new();
        interrupt.set();

        assert!(interrupt.wait(None));
        assert!(interrupt.wait(None));

        interrupt.clear();
        assert!(!interrupt.is_set());
    }

    #[test]
    fn test_set_from_another_thread_wakes_waiter() {
        let interrupt = Interrupt::new();
        let setter = interrupt.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            setter.set();
        });

        assert!(interrupt.wait(Some(Duration::from_secs(5))));
        handle.join().unwrap();
    }
}
