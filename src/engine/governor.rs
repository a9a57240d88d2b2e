//! Adaptive concurrency governor
//!
//! Bounds simultaneous extraction work and re-tunes the bound from
//! recent success/error counts and host resource pressure. The governor
//! is an explicit value threaded into the scheduler; there is no ambient
//! singleton. Its counters are the only mutable state shared across
//! domains, serialized through one mutex.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use sysinfo::System;
use tracing::{debug, info};

use crate::infrastructure::config::GovernorConfig;

/// Host pressure snapshot, in percentages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourcePressure {
    pub memory_used_pct: f64,
    /// 1-minute load average relative to core count.
    pub load_avg_pct: f64,
}

/// Source of host pressure readings. Production uses `sysinfo`; tests
/// script the readings.
pub trait ResourceProbe: Send + Sync {
    fn snapshot(&self) -> ResourcePressure;
}

/// `sysinfo`-backed probe.
pub struct SystemProbe {
    system: Mutex<System>,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SystemProbe {
    fn snapshot(&self) -> ResourcePressure {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_memory();
        let total = system.total_memory();
        let memory_used_pct = if total == 0 {
            0.0
        } else {
            system.used_memory() as f64 / total as f64 * 100.0
        };
        let cores = system.cpus().len().max(1);
        let load_avg_pct = System::load_average().one / cores as f64 * 100.0;
        ResourcePressure {
            memory_used_pct,
            load_avg_pct,
        }
    }
}

struct GovernorState {
    bound: usize,
    successes: u32,
    errors: u32,
    last_adjustment: Instant,
}

/// Self-tuning cap on simultaneous extraction work.
pub struct ConcurrencyGovernor {
    config: GovernorConfig,
    probe: Box<dyn ResourceProbe>,
    state: Mutex<GovernorState>,
}

impl ConcurrencyGovernor {
    pub fn new(config: GovernorConfig, probe: Box<dyn ResourceProbe>) -> Self {
        let bound = config
            .initial_bound
            .clamp(config.min_bound, config.max_bound);
        Self {
            config,
            probe,
            state: Mutex::new(GovernorState {
                bound,
                successes: 0,
                errors: 0,
                last_adjustment: Instant::now(),
            }),
        }
    }

    pub fn current_bound(&self) -> usize {
        self.lock_state().bound
    }

    /// Record one successful task completion and run the windowed
    /// evaluation check.
    pub fn record_success(&self) {
        self.record(true);
    }

    /// Record one failed task completion and run the windowed evaluation
    /// check.
    pub fn record_error(&self) {
        self.record(false);
    }

    fn record(&self, success: bool) {
        let mut state = self.lock_state();
        if success {
            state.successes += 1;
        } else {
            state.errors += 1;
        }
        if state.last_adjustment.elapsed() >= Duration::from_secs(self.config.window_secs) {
            self.evaluate(&mut state);
        }
    }

    /// Run one evaluation immediately, ignoring the window. Both
    /// counters reset afterwards.
    pub fn evaluate_now(&self) {
        let mut state = self.lock_state();
        self.evaluate(&mut state);
    }

    fn evaluate(&self, state: &mut GovernorState) {
        let pressure = self.probe.snapshot();
        let pressured = pressure.memory_used_pct > self.config.memory_pressure_pct
            || pressure.load_avg_pct > self.config.load_pressure_pct;

        if pressured || state.errors > self.config.error_threshold {
            if state.bound > self.config.min_bound {
                state.bound -= 1;
                info!(
                    bound = state.bound,
                    errors = state.errors,
                    pressured,
                    "concurrency bound lowered"
                );
            }
        } else if state.errors == 0 && state.successes > self.config.success_threshold {
            if state.bound < self.config.max_bound {
                state.bound += 1;
                info!(
                    bound = state.bound,
                    successes = state.successes,
                    "concurrency bound raised"
                );
            }
        } else {
            debug!(
                successes = state.successes,
                errors = state.errors,
                "concurrency bound unchanged"
            );
        }

        state.successes = 0;
        state.errors = 0;
        state.last_adjustment = Instant::now();
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, GovernorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Probe with scripted readings.
    struct FixedProbe(ResourcePressure);

    impl ResourceProbe for FixedProbe {
        fn snapshot(&self) -> ResourcePressure {
            self.0
        }
    }

    fn calm_probe() -> Box<dyn ResourceProbe> {
        Box::new(FixedProbe(ResourcePressure {
            memory_used_pct: 30.0,
            load_avg_pct: 20.0,
        }))
    }

    fn governor_with(probe: Box<dyn ResourceProbe>) -> ConcurrencyGovernor {
        ConcurrencyGovernor::new(GovernorConfig::default(), probe)
    }

    #[test]
    fn eleven_successes_raise_bound_by_one() {
        let governor = governor_with(calm_probe());
        for _ in 0..11 {
            governor.record_success();
        }
        governor.evaluate_now();
        assert_eq!(governor.current_bound(), 5);
    }

    #[test]
    fn six_errors_lower_bound_by_one() {
        let governor = governor_with(calm_probe());
        for _ in 0..6 {
            governor.record_error();
        }
        governor.evaluate_now();
        assert_eq!(governor.current_bound(), 3);
    }

    #[test]
    fn bound_never_leaves_configured_range() {
        let governor = governor_with(calm_probe());
        for _ in 0..10 {
            for _ in 0..11 {
                governor.record_success();
            }
            governor.evaluate_now();
            assert!(governor.current_bound() <= 8);
        }
        assert_eq!(governor.current_bound(), 8);

        for _ in 0..10 {
            for _ in 0..6 {
                governor.record_error();
            }
            governor.evaluate_now();
            assert!(governor.current_bound() >= 2);
        }
        assert_eq!(governor.current_bound(), 2);
    }

    #[test]
    fn host_pressure_lowers_bound_even_without_errors() {
        let governor = governor_with(Box::new(FixedProbe(ResourcePressure {
            memory_used_pct: 92.0,
            load_avg_pct: 10.0,
        })));
        governor.record_success();
        governor.evaluate_now();
        assert_eq!(governor.current_bound(), 3);
    }

    #[test]
    fn mixed_window_changes_nothing_and_resets_counters() {
        let governor = governor_with(calm_probe());
        for _ in 0..20 {
            governor.record_success();
        }
        governor.record_error();
        governor.evaluate_now();
        assert_eq!(governor.current_bound(), 4);

        // Counters were reset: two more successes are not enough to raise.
        governor.record_success();
        governor.record_success();
        governor.evaluate_now();
        assert_eq!(governor.current_bound(), 4);
    }
}
