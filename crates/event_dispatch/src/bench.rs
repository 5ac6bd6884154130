//! Timing collaborator used while dispatch logging is active.
//!
//! The manager asks its [`BenchManager`] for one [`Benchmark`] per fire and
//! one per listener invocation. Inject a custom manager with
//! [`EventManager::set_bench_manager`](crate::EventManager::set_bench_manager)
//! to route timings elsewhere or to make them deterministic in tests.

use std::fmt::Debug;
use std::time::{Duration, Instant};

/// A single start/stop timer
pub trait Benchmark: Send {
    fn start(&mut self);
    fn stop(&mut self);
    /// Time between `start` and `stop`, zero if never completed
    fn elapsed(&self) -> Duration;
}

/// Factory of timers
pub trait BenchManager: Send + Sync + Debug {
    fn benchmark(&self) -> Box<dyn Benchmark>;
}

/// Wall-clock timer on [`Instant`]
#[derive(Debug, Default)]
pub struct InstantBench {
    started: Option<Instant>,
    elapsed: Duration,
}

impl Benchmark for InstantBench {
    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed = started.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Default [`BenchManager`] handing out [`InstantBench`] timers
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantBenchManager;

impl BenchManager for InstantBenchManager {
    fn benchmark(&self) -> Box<dyn Benchmark> {
        Box::new(InstantBench::default())
    }
}

/// Starts a timer from `manager` and returns it running
pub(crate) fn start(manager: &dyn BenchManager) -> Box<dyn Benchmark> {
    let mut bench = manager.benchmark();
    bench.start();
    bench
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_bench() {
        let mut bench = InstantBench::default();
        assert_eq!(bench.elapsed(), Duration::ZERO);

        bench.start();
        std::thread::sleep(Duration::from_millis(2));
        bench.stop();
        assert!(bench.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn test_stop_without_start_keeps_zero() {
        let mut bench = InstantBench::default();
        bench.stop();
        assert_eq!(bench.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_start_helper_runs_timer() {
        let mut bench = start(&InstantBenchManager);
        bench.stop();
        assert!(bench.elapsed() < Duration::from_secs(1));
    }
}
