use crate::config::RetryPolicy;
use crate::engine::dispatch::forward_burst;
use crate::engine::stream::FwdStream;
use crate::io::PacketIo;
use crate::transform::Transform;
use fluxrelay_core::cpu;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Worker that owns receive, transform and transmit for one stream.
///
/// Launched once; the dispatcher only flips `running` off to stop it.
pub struct RunLoop<Io, X> {
    pub io: Io,
    pub transform: X,
    pub stream: FwdStream,
    pub burst: usize,
    pub retry: RetryPolicy,
    pub running: Arc<AtomicBool>,
}

impl<Io: PacketIo, X: Transform> RunLoop<Io, X> {
    /// Poll until stopped, then hand the I/O and transform back.
    pub fn run(mut self) -> (Io, X) {
        tracing::info!(
            rx_port = self.stream.rx_port,
            tx_port = self.stream.tx_port,
            burst = self.burst,
            "run-loop worker started"
        );

        let mut pkts = Vec::with_capacity(self.burst);
        while self.running.load(Ordering::Acquire) {
            let transform = &mut self.transform;
            let result = forward_burst(
                &mut self.io,
                &self.stream,
                &mut pkts,
                self.burst,
                &self.retry,
                |mut batch, dest| {
                    transform.apply(&mut batch, &dest);
                    Ok(batch)
                },
            );

            match result {
                Ok(report) if report.received == 0 => cpu::relax(),
                Ok(_) => {}
                Err(err) => tracing::error!(error = %err, "run-loop burst failed"),
            }
        }

        tracing::info!("run-loop worker stopped");
        (self.io, self.transform)
    }
}
