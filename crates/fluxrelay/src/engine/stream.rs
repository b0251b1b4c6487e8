use crate::packet::{PortId, QueueId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One forwarding stream: where bursts come from and where they go.
#[derive(Debug, Clone)]
pub struct FwdStream {
    pub rx_port: PortId,
    pub rx_queue: QueueId,
    pub tx_port: PortId,
    pub tx_queue: QueueId,
    /// Retry partial transmits instead of dropping the remainder at once.
    pub retry_enabled: bool,
    stats: Arc<StreamStats>,
}

impl FwdStream {
    pub fn new(rx_port: PortId, tx_port: PortId) -> Self {
        Self {
            rx_port,
            rx_queue: 0,
            tx_port,
            tx_queue: 0,
            retry_enabled: true,
            stats: Arc::new(StreamStats::default()),
        }
    }

    pub fn with_queues(mut self, rx_queue: QueueId, tx_queue: QueueId) -> Self {
        self.rx_queue = rx_queue;
        self.tx_queue = tx_queue;
        self
    }

    pub fn with_retry(mut self, enabled: bool) -> Self {
        self.retry_enabled = enabled;
        self
    }

    /// Counters shared by every clone of this stream.
    pub fn stats(&self) -> &Arc<StreamStats> {
        &self.stats
    }
}

/// Stream counters, updated by whichever thread drives the stream.
#[derive(Debug, Default)]
pub struct StreamStats {
    pub rx_packets: AtomicU64,
    pub tx_packets: AtomicU64,
    pub fwd_dropped: AtomicU64,
    pub rx_bursts: AtomicU64,
    pub empty_polls: AtomicU64,
    pub tx_bursts: AtomicU64,
    pub tx_retries: AtomicU64,
    pub handoffs: AtomicU64,
    pub busy_ns: AtomicU64,
    pub max_burst_ns: AtomicU64,
}

impl StreamStats {
    pub fn record_empty_poll(&self) {
        self.empty_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handoff(&self) {
        self.handoffs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_burst(&self, report: &BurstReport) {
        self.rx_bursts.fetch_add(1, Ordering::Relaxed);
        self.rx_packets.fetch_add(report.received as u64, Ordering::Relaxed);
        self.tx_packets.fetch_add(report.transmitted as u64, Ordering::Relaxed);
        self.fwd_dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
        self.tx_retries.fetch_add(report.retries as u64, Ordering::Relaxed);

        let ns = report.elapsed.as_nanos().min(u64::MAX as u128) as u64;
        self.busy_ns.fetch_add(ns, Ordering::Relaxed);
        self.max_burst_ns.fetch_max(ns, Ordering::Relaxed);
    }

    pub fn record_tx_burst(&self) {
        self.tx_bursts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            fwd_dropped: self.fwd_dropped.load(Ordering::Relaxed),
            rx_bursts: self.rx_bursts.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            tx_bursts: self.tx_bursts.load(Ordering::Relaxed),
            tx_retries: self.tx_retries.load(Ordering::Relaxed),
            handoffs: self.handoffs.load(Ordering::Relaxed),
            busy_ns: self.busy_ns.load(Ordering::Relaxed),
            max_burst_ns: self.max_burst_ns.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStatsSnapshot {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub fwd_dropped: u64,
    pub rx_bursts: u64,
    pub empty_polls: u64,
    pub tx_bursts: u64,
    pub tx_retries: u64,
    pub handoffs: u64,
    pub busy_ns: u64,
    pub max_burst_ns: u64,
}

impl StreamStatsSnapshot {
    /// Every received packet is either sent or dropped.
    pub fn is_balanced(&self) -> bool {
        self.rx_packets == self.tx_packets + self.fwd_dropped
    }
}

/// Outcome of one forwarding iteration. `transmitted + dropped == received`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstReport {
    pub received: usize,
    pub transmitted: usize,
    pub dropped: usize,
    pub retries: u32,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_shared_across_clones() {
        let stream = FwdStream::new(0, 1);
        let clone = stream.clone();

        clone.stats().record_burst(&BurstReport {
            received: 32,
            transmitted: 30,
            dropped: 2,
            retries: 3,
            elapsed: Duration::from_nanos(500),
        });
        stream.stats().record_burst(&BurstReport {
            received: 4,
            transmitted: 4,
            elapsed: Duration::from_nanos(200),
            ..Default::default()
        });

        let snap = stream.stats().snapshot();
        assert_eq!(snap.rx_bursts, 2);
        assert_eq!(snap.rx_packets, 36);
        assert_eq!(snap.tx_packets, 34);
        assert_eq!(snap.fwd_dropped, 2);
        assert_eq!(snap.tx_retries, 3);
        assert_eq!(snap.busy_ns, 700);
        assert_eq!(snap.max_burst_ns, 500);
        assert!(snap.is_balanced());
    }
}
