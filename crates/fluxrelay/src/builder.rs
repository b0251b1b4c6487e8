use crate::config::{
    RelayConfig, RetryPolicy, WaitStrategy, DEFAULT_BURST_SIZE, DEFAULT_TX_DELAY_US,
    DEFAULT_TX_RETRIES,
};
use crate::error::RelayError;
use crate::io::PacketIo;
use crate::mode::ForwardMode;
use crate::transform::{MacSwap, Transform};
use std::time::Duration;

pub struct RelayBuilder {
    strategy: WaitStrategy,
    burst_size: usize,
    worker_core: Option<usize>,
    dispatcher_core: Option<usize>,
    tx_retries: u32,
    tx_delay: Duration,
}

impl RelayBuilder {
    pub fn new(strategy: WaitStrategy) -> Self {
        Self {
            strategy,
            burst_size: DEFAULT_BURST_SIZE,
            worker_core: None,
            dispatcher_core: None,
            tx_retries: DEFAULT_TX_RETRIES,
            tx_delay: Duration::from_micros(DEFAULT_TX_DELAY_US),
        }
    }

    pub fn strategy(mut self, strategy: WaitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn burst_size(mut self, size: usize) -> Self {
        self.burst_size = size;
        self
    }

    pub fn worker_core(mut self, core: usize) -> Self {
        self.worker_core = Some(core);
        self
    }

    /// Pin the thread that calls `on_start` to this core.
    pub fn dispatcher_core(mut self, core: usize) -> Self {
        self.dispatcher_core = Some(core);
        self
    }

    pub fn tx_retries(mut self, retries: u32) -> Self {
        self.tx_retries = retries;
        self
    }

    pub fn tx_delay(mut self, delay: Duration) -> Self {
        self.tx_delay = delay;
        self
    }

    pub fn build_config(self) -> Result<RelayConfig, RelayError> {
        let config = RelayConfig {
            strategy: self.strategy,
            burst_size: self.burst_size,
            worker_core: self.worker_core,
            dispatcher_core: self.dispatcher_core,
            retry: RetryPolicy {
                max_retries: self.tx_retries,
                delay: self.tx_delay,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a mac-swap forwarding mode over `io`.
    pub fn build_mode<Io: PacketIo>(self, io: Io) -> Result<ForwardMode<Io>, RelayError> {
        self.build_mode_with(io, MacSwap)
    }

    pub fn build_mode_with<Io: PacketIo, X: Transform>(
        self,
        io: Io,
        transform: X,
    ) -> Result<ForwardMode<Io, X>, RelayError> {
        ForwardMode::new(self.build_config()?, io, transform)
    }
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self::new(WaitStrategy::Spin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayBuilder::default().build_config().unwrap();
        assert_eq!(config.strategy, WaitStrategy::Spin);
        assert_eq!(config.burst_size, 32);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.worker_core, None);
    }

    #[test]
    fn test_burst_size_bounds() {
        assert!(RelayBuilder::default().burst_size(1).build_config().is_ok());
        assert!(RelayBuilder::default().burst_size(512).build_config().is_ok());
        for bad in [0, 513] {
            assert!(matches!(
                RelayBuilder::default().burst_size(bad).build_config(),
                Err(RelayError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_shared_core_rejected() {
        let result = RelayBuilder::new(WaitStrategy::Condvar)
            .worker_core(2)
            .dispatcher_core(2)
            .build_config();
        assert!(matches!(result, Err(RelayError::InvalidConfiguration(_))));

        let config = RelayBuilder::new(WaitStrategy::Condvar)
            .worker_core(2)
            .dispatcher_core(3)
            .tx_retries(8)
            .tx_delay(Duration::ZERO)
            .build_config()
            .unwrap();
        assert_eq!(config.retry.max_retries, 8);
        assert_eq!(config.dispatcher_core, Some(3));
    }
}
