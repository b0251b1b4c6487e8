use crate::config::{RelayConfig, WaitStrategy};
use crate::engine::{forward_burst, BurstReport, FwdStream, RunLoop, WorkerState, WorkerThread};
use crate::error::RelayError;
use crate::handoff::{self, HandoffProducer, Signaler, SlotState, Work};
use crate::io::PacketIo;
use crate::packet::{Mbuf, TxPortConf};
use crate::transform::{MacSwap, Transform};
use fluxrelay_core::sys::affinity;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

enum Worker<Io, X> {
    /// Per-burst handoff. The thread returns the transform when it exits.
    Handoff {
        producer: HandoffProducer<Mbuf, TxPortConf>,
        thread: WorkerThread<X>,
    },
    /// Worker owns the whole stream. The thread returns I/O and transform.
    RunLoop {
        running: Arc<AtomicBool>,
        thread: WorkerThread<(Io, X)>,
    },
}

/// A forwarding mode: packet I/O on the calling (dispatcher) thread, the
/// transform on a pinned worker.
///
/// Drive it with [`on_start`](Self::on_start), then
/// [`forward_one_iteration`](Self::forward_one_iteration) once per poll, then
/// [`on_stop`](Self::on_stop). A mode can be started again after it stops.
/// A startup failure aborts it for good.
pub struct ForwardMode<Io: PacketIo, X: Transform = MacSwap> {
    config: RelayConfig,
    state: WorkerState,
    io: Option<Io>,
    transform: Option<X>,
    pkts: Vec<Mbuf>,
    worker: Option<Worker<Io, X>>,
    aborted: bool,
    retired_cycles: u64,
}

impl<Io: PacketIo, X: Transform> ForwardMode<Io, X> {
    pub fn new(config: RelayConfig, io: Io, transform: X) -> Result<Self, RelayError> {
        config.validate()?;
        let pkts = Vec::with_capacity(config.burst_size);
        Ok(Self {
            config,
            state: WorkerState::NotStarted,
            io: Some(io),
            transform: Some(transform),
            pkts,
            worker: None,
            aborted: false,
            retired_cycles: 0,
        })
    }

    /// Start the worker. For the run-loop strategy this only arms the mode;
    /// the worker launches on the first iteration, once it knows the stream.
    pub fn on_start(&mut self) -> Result<(), RelayError> {
        if self.aborted {
            return Err(RelayError::Aborted);
        }
        if matches!(self.state, WorkerState::Running | WorkerState::Stopping) {
            return Err(RelayError::AlreadyRunning);
        }

        if let Some(core) = self.config.dispatcher_core {
            if let Err(source) = affinity::pin_current(core) {
                return Err(self.abort(RelayError::Affinity { core, source }));
            }
            tracing::debug!(core, "dispatcher pinned");
        }

        if self.config.strategy.is_per_cycle() {
            if let Err(err) = self.spawn_handoff_worker() {
                return Err(self.abort(err));
            }
        }

        self.state = WorkerState::Running;
        tracing::info!(
            strategy = self.config.strategy.name(),
            burst = self.config.burst_size,
            worker_core = ?self.worker_core(),
            "forwarding mode started"
        );
        Ok(())
    }

    fn spawn_handoff_worker(&mut self) -> Result<(), RelayError> {
        let signal = Signaler::new(self.config.strategy)?;
        let core = self.config.resolve_worker_core()?;
        let mut transform = self.transform.take().ok_or(RelayError::WorkerLost)?;
        let (producer, consumer) = handoff::pair(signal);

        let thread = WorkerThread::spawn(Some(core), move || {
            tracing::info!("handoff worker started");
            let served = consumer.serve(|pkts, dest| transform.apply(pkts, dest));
            tracing::info!(served, "handoff worker stopped");
            transform
        })?;

        self.worker = Some(Worker::Handoff { producer, thread });
        Ok(())
    }

    fn spawn_run_loop(&mut self, stream: &FwdStream) -> Result<(), RelayError> {
        let core = self.config.resolve_worker_core()?;
        let io = self.io.take().ok_or(RelayError::WorkerLost)?;
        let transform = self.transform.take().ok_or(RelayError::WorkerLost)?;
        let running = Arc::new(AtomicBool::new(true));

        let run_loop = RunLoop {
            io,
            transform,
            stream: stream.clone(),
            burst: self.config.burst_size,
            retry: self.config.retry,
            running: running.clone(),
        };
        let thread = WorkerThread::spawn(Some(core), move || run_loop.run())?;

        self.worker = Some(Worker::RunLoop { running, thread });
        Ok(())
    }

    fn abort(&mut self, err: RelayError) -> RelayError {
        tracing::error!(error = %err, "fatal startup failure, aborting forwarding mode");
        self.aborted = true;
        self.state = WorkerState::Joined;
        err
    }

    /// Stop and join the worker. Stopping a mode that is not running is a no-op.
    ///
    /// Fails with `WorkerLost` if the worker died without handing its
    /// state back; the mode is stopped either way.
    pub fn on_stop(&mut self) -> Result<(), RelayError> {
        if self.state != WorkerState::Running {
            if self.state == WorkerState::NotStarted {
                self.state = WorkerState::Joined;
            }
            return Ok(());
        }

        self.state = WorkerState::Stopping;
        let mut result = Ok(());

        match self.worker.take() {
            Some(Worker::Handoff { producer, mut thread }) => {
                producer.shutdown();
                self.retired_cycles += producer.cycles();
                drop(producer);
                match thread.join() {
                    Some(transform) => self.transform = Some(transform),
                    None => result = Err(RelayError::WorkerLost),
                }
            }
            Some(Worker::RunLoop { running, mut thread }) => {
                running.store(false, Ordering::Release);
                match thread.join() {
                    Some((io, transform)) => {
                        self.io = Some(io);
                        self.transform = Some(transform);
                    }
                    None => result = Err(RelayError::WorkerLost),
                }
            }
            None => {}
        }

        self.state = WorkerState::Joined;
        match &result {
            Ok(()) => tracing::info!(cycles = self.cycles(), "forwarding mode stopped"),
            Err(err) => tracing::error!(error = %err, "forwarding mode stopped without its worker"),
        }
        result
    }

    /// One dispatcher poll: receive a burst, hand it to the worker, transmit.
    ///
    /// Starts the mode on the very first call if `on_start` was never called,
    /// but never restarts a stopped one. With the run-loop strategy the first
    /// call launches the worker and every call returns an empty report; the
    /// worker's own counters land in `stream.stats()`.
    pub fn forward_one_iteration(&mut self, stream: &FwdStream) -> Result<BurstReport, RelayError> {
        if self.aborted {
            return Err(RelayError::Aborted);
        }
        if self.state == WorkerState::NotStarted {
            self.on_start()?;
        }
        if self.state != WorkerState::Running {
            return Err(RelayError::NotRunning);
        }

        if self.worker.is_none() {
            if self.config.strategy != WaitStrategy::RunLoop {
                return Err(RelayError::NotRunning);
            }
            if let Err(err) = self.spawn_run_loop(stream) {
                return Err(self.abort(err));
            }
            return Ok(BurstReport::default());
        }

        let burst = self.config.burst_size;
        let retry = self.config.retry;

        let producer = match &mut self.worker {
            Some(Worker::Handoff { producer, .. }) => producer,
            _ => return Ok(BurstReport::default()),
        };
        let io = self.io.as_mut().ok_or(RelayError::NotRunning)?;

        forward_burst(io, stream, &mut self.pkts, burst, &retry, |items, dest| {
            stream.stats().record_handoff();
            Ok(producer.run(Work::new(items, dest))?.items)
        })
        .map_err(|err| {
            tracing::error!(error = %err, "handoff cycle failed");
            err
        })
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn strategy(&self) -> WaitStrategy {
        self.config.strategy
    }

    /// The packet I/O, unless a run-loop worker currently owns it.
    pub fn io(&self) -> Option<&Io> {
        self.io.as_ref()
    }

    /// Bursts handed to a worker over the life of the mode.
    pub fn cycles(&self) -> u64 {
        let live = match &self.worker {
            Some(Worker::Handoff { producer, .. }) => producer.cycles(),
            _ => 0,
        };
        self.retired_cycles + live
    }

    /// Core the live worker is pinned to.
    pub fn worker_core(&self) -> Option<usize> {
        match &self.worker {
            Some(Worker::Handoff { thread, .. }) => thread.core(),
            Some(Worker::RunLoop { thread, .. }) => thread.core(),
            None => None,
        }
    }

    pub fn handoff_state(&self) -> Option<SlotState> {
        match &self.worker {
            Some(Worker::Handoff { producer, .. }) => Some(producer.state()),
            _ => None,
        }
    }
}

impl<Io: PacketIo, X: Transform> Drop for ForwardMode<Io, X> {
    fn drop(&mut self) {
        let _ = self.on_stop();
    }
}
