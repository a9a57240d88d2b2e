//! FIFO task admission queue
//!
//! Gates entry into the bounded concurrency region. A task proceeds
//! immediately while fewer than the governor's bound are in flight;
//! otherwise it joins a FIFO wait list and resumes only when a running
//! task releases its slot. Slots are released through an RAII guard, so
//! a task that fails still frees its slot and wakes the next waiter.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::trace;

use crate::engine::governor::ConcurrencyGovernor;

struct QueueState {
    in_flight: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Admission queue over the governor's current bound.
pub struct TaskQueue {
    governor: Arc<ConcurrencyGovernor>,
    state: Mutex<QueueState>,
}

impl TaskQueue {
    pub fn new(governor: Arc<ConcurrencyGovernor>) -> Self {
        Self {
            governor,
            state: Mutex::new(QueueState {
                in_flight: 0,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Acquire a slot, waiting in FIFO order when the bound is reached.
    /// The returned guard releases the slot on drop.
    pub async fn acquire(self: &Arc<Self>) -> SlotGuard {
        let waiter = {
            let mut state = self.lock_state();
            if state.in_flight < self.governor.current_bound() {
                state.in_flight += 1;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some(rx)
            }
        };

        if let Some(rx) = waiter {
            trace!("task queued behind concurrency bound");
            // The releasing side already counted this task as in flight
            // when it signalled. A dropped sender only happens when the
            // queue itself is torn down.
            let _ = rx.await;
        }

        SlotGuard {
            queue: Arc::clone(self),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.lock_state().in_flight
    }

    pub fn waiting(&self) -> usize {
        self.lock_state().waiters.len()
    }

    fn release(&self) {
        let mut state = self.lock_state();
        state.in_flight = state.in_flight.saturating_sub(1);
        // Admit from the head while the current bound allows it, so a
        // lowered bound drains and a raised bound refills. Waiters that
        // were dropped while queued are skipped.
        while state.in_flight < self.governor.current_bound() {
            match state.waiters.pop_front() {
                Some(tx) => {
                    if tx.send(()).is_ok() {
                        state.in_flight += 1;
                    }
                }
                None => break,
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// RAII slot handle; dropping it releases the slot and wakes the next
/// waiter, including on error and panic paths.
pub struct SlotGuard {
    queue: Arc<TaskQueue>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.queue.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::governor::{ResourcePressure, ResourceProbe};
    use crate::infrastructure::config::GovernorConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CalmProbe;

    impl ResourceProbe for CalmProbe {
        fn snapshot(&self) -> ResourcePressure {
            ResourcePressure::default()
        }
    }

    fn queue_with_bound(bound: usize) -> Arc<TaskQueue> {
        let config = GovernorConfig {
            initial_bound: bound,
            min_bound: bound.min(2),
            ..Default::default()
        };
        let governor = Arc::new(ConcurrencyGovernor::new(config, Box::new(CalmProbe)));
        Arc::new(TaskQueue::new(governor))
    }

    #[tokio::test]
    async fn tasks_below_bound_proceed_immediately() {
        let queue = queue_with_bound(2);
        let first = queue.acquire().await;
        let second = queue.acquire().await;
        assert_eq!(queue.in_flight(), 2);
        drop(first);
        drop(second);
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn waiters_resume_in_fifo_order() {
        let queue = queue_with_bound(2);
        let order = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..6 {
            let queue = Arc::clone(&queue);
            let order = Arc::clone(&order);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _slot = queue.acquire().await;
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                order.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
            // Stagger spawns so queue arrival order is deterministic.
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn failing_task_still_releases_its_slot() {
        let queue = queue_with_bound(2);

        for _ in 0..2 {
            let queue = Arc::clone(&queue);
            let handle = tokio::spawn(async move {
                let _slot = queue.acquire().await;
                panic!("task blew up");
            });
            assert!(handle.await.is_err());
        }

        // Both slots must be free again.
        let _a = queue.acquire().await;
        let _b = queue.acquire().await;
        assert_eq!(queue.in_flight(), 2);
        assert_eq!(queue.waiting(), 0);
    }
}
