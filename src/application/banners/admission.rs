//! Live count of in-flight foreground operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Default)]
pub struct AdmissionCounter {
    in_flight: Arc<AtomicUsize>,
}

impl AdmissionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one operation until the returned guard is dropped.
    pub fn enter(&self) -> AdmissionGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        AdmissionGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub fn current(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

pub struct AdmissionGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn guard_releases_on_drop() {
        let counter = AdmissionCounter::new();
        let first = counter.enter();
        let second = counter.enter();
        assert_eq!(counter.current(), 2);
        drop(first);
        assert_eq!(counter.current(), 1);
        drop(second);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn guard_releases_when_holder_panics() {
        let counter = AdmissionCounter::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = counter.enter();
            panic!("operation failed");
        }));
        assert!(result.is_err());
        assert_eq!(counter.current(), 0);
    }
}
