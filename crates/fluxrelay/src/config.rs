use crate::error::RelayError;
use fluxrelay_core::sys::affinity;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static NEXT_WORKER_CORE: AtomicUsize = AtomicUsize::new(0);

/// How the dispatcher and the worker wait for each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Both sides poll the slot state with a relax hint. Lowest latency,
    /// burns both cores while idle.
    Spin,
    /// Both sides block on a condition variable. Syscall-class wake latency.
    Condvar,
    /// Worker blocks on a counting semaphore posted once per cycle; the
    /// dispatcher spins for completion so it is never descheduled.
    Semaphore,
    /// Worker owns receive, transform and transmit after a one-time launch.
    /// No per-cycle handoff.
    RunLoop,
}

impl WaitStrategy {
    pub const ALL: [WaitStrategy; 4] = [
        WaitStrategy::Spin,
        WaitStrategy::Condvar,
        WaitStrategy::Semaphore,
        WaitStrategy::RunLoop,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WaitStrategy::Spin => "spin",
            WaitStrategy::Condvar => "condvar",
            WaitStrategy::Semaphore => "semaphore",
            WaitStrategy::RunLoop => "runloop",
        }
    }

    /// Whether the strategy hands each burst to the worker.
    pub fn is_per_cycle(&self) -> bool {
        !matches!(self, WaitStrategy::RunLoop)
    }
}

impl std::str::FromStr for WaitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WaitStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown wait strategy '{}'", s))
    }
}

/// Bounded retry of partial transmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Busy-wait between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_TX_RETRIES,
            delay: Duration::from_micros(DEFAULT_TX_DELAY_US),
        }
    }
}

pub const MAX_PKT_BURST: usize = 512;
pub const DEFAULT_BURST_SIZE: usize = 32;
pub const DEFAULT_TX_RETRIES: u32 = 64;
pub const DEFAULT_TX_DELAY_US: u64 = 1;

/// Validated forwarding-mode configuration. Built by [`crate::builder::RelayBuilder`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub strategy: WaitStrategy,
    pub burst_size: usize,
    pub worker_core: Option<usize>,
    pub dispatcher_core: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            strategy: WaitStrategy::Spin,
            burst_size: DEFAULT_BURST_SIZE,
            worker_core: None,
            dispatcher_core: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.burst_size == 0 || self.burst_size > MAX_PKT_BURST {
            return Err(RelayError::InvalidConfiguration(format!(
                "burst size {} outside 1..={}",
                self.burst_size, MAX_PKT_BURST
            )));
        }
        if let (Some(worker), Some(dispatcher)) = (self.worker_core, self.dispatcher_core) {
            if worker == dispatcher {
                return Err(RelayError::InvalidConfiguration(format!(
                    "worker and dispatcher both on core {}",
                    worker
                )));
            }
        }
        Ok(())
    }

    /// Core the worker gets pinned to.
    ///
    /// Without an explicit `worker_core` this is an allowed core that is not
    /// the dispatcher's. Successive modes rotate through the candidates. An
    /// unpinned dispatcher has no fixed core, so the core it is running on
    /// now is avoided when another one exists.
    pub fn resolve_worker_core(&self) -> Result<usize, RelayError> {
        if let Some(core) = self.worker_core {
            return Ok(core);
        }

        let mut candidates: Vec<usize> = affinity::allowed_cores()
            .iter()
            .copied()
            .filter(|&core| Some(core) != self.dispatcher_core)
            .collect();

        if self.dispatcher_core.is_none() && candidates.len() > 1 {
            if let Some(current) = affinity::current_core() {
                candidates.retain(|&core| core != current);
            }
        }

        if candidates.is_empty() {
            return Err(RelayError::Affinity {
                core: self.dispatcher_core.unwrap_or_default(),
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    "no allowed core left for the worker",
                ),
            });
        }

        let turn = NEXT_WORKER_CORE.fetch_add(1, Ordering::Relaxed);
        Ok(candidates[turn % candidates.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!("spin".parse::<WaitStrategy>(), Ok(WaitStrategy::Spin));
        assert_eq!("CondVar".parse::<WaitStrategy>(), Ok(WaitStrategy::Condvar));
        assert_eq!("runloop".parse::<WaitStrategy>(), Ok(WaitStrategy::RunLoop));
        assert!("futex".parse::<WaitStrategy>().is_err());
    }

    #[test]
    fn test_defaults_match_forwarding_defaults() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.max_retries, 64);
        assert_eq!(retry.delay, Duration::from_micros(1));
        assert_eq!(RelayConfig::default().burst_size, 32);
    }

    #[test]
    fn test_validate_rejects_bad_burst_and_shared_core() {
        assert!(RelayConfig::default().validate().is_ok());

        let zero = RelayConfig {
            burst_size: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(RelayError::InvalidConfiguration(_))));

        let shared = RelayConfig {
            worker_core: Some(1),
            dispatcher_core: Some(1),
            ..Default::default()
        };
        assert!(matches!(shared.validate(), Err(RelayError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_worker_core_defaults_to_an_allowed_core() {
        let core = RelayConfig::default().resolve_worker_core().unwrap();
        assert!(affinity::is_allowed(core));

        let explicit = RelayConfig {
            worker_core: Some(7),
            ..Default::default()
        };
        assert_eq!(explicit.resolve_worker_core().unwrap(), 7);
    }

    #[test]
    fn test_worker_core_avoids_dispatcher_core() {
        let cores = affinity::allowed_cores();
        let config = RelayConfig {
            dispatcher_core: Some(cores[0]),
            ..Default::default()
        };

        match config.resolve_worker_core() {
            Ok(core) => {
                assert_ne!(core, cores[0]);
                assert!(affinity::is_allowed(core));
            }
            Err(err) => {
                assert_eq!(cores.len(), 1);
                assert!(matches!(err, RelayError::Affinity { .. }));
                assert!(err.is_fatal());
            }
        }
    }
}
