//! In-memory NIC for tests and the demo binary.
//!
//! Every port has a bounded RX ring the test fills with [`SimNic::inject`]
//! and a bounded TX ring the test empties with [`SimNic::drain_tx`]. Clones
//! share the same ports, so one clone can be handed to a forwarding mode
//! while another drives traffic.

use crate::io::PacketIo;
use crate::packet::{Mbuf, PortId, QueueId, TxPortConf};
use crossbeam_queue::ArrayQueue;
use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_RING_SIZE: usize = 1024;

struct SimPort {
    rx: ArrayQueue<Mbuf>,
    tx: ArrayQueue<Mbuf>,
    conf: Mutex<TxPortConf>,
    /// Per-call send limits, consumed front to back.
    tx_script: Mutex<VecDeque<usize>>,
    tx_calls: AtomicU64,
}

#[derive(Clone)]
pub struct SimNic {
    ports: Arc<Vec<SimPort>>,
}

impl SimNic {
    pub fn new(ports: usize) -> Self {
        Self::with_ring_size(ports, DEFAULT_RING_SIZE)
    }

    pub fn with_ring_size(ports: usize, ring_size: usize) -> Self {
        let ring_size = ring_size.max(1);
        let ports = (0..ports)
            .map(|id| SimPort {
                rx: ArrayQueue::new(ring_size),
                tx: ArrayQueue::new(ring_size),
                conf: Mutex::new(TxPortConf::new(id as PortId)),
                tx_script: Mutex::new(VecDeque::new()),
                tx_calls: AtomicU64::new(0),
            })
            .collect();
        Self {
            ports: Arc::new(ports),
        }
    }

    fn port(&self, port: PortId) -> Option<&SimPort> {
        self.ports.get(port as usize)
    }

    pub fn configure_port(&self, conf: TxPortConf) {
        if let Some(port) = self.port(conf.port_id) {
            *port.conf.lock().unwrap_or_else(PoisonError::into_inner) = conf;
        }
    }

    /// Deliver a frame to `port` as if it arrived from the wire.
    pub fn inject(&self, port: PortId, data: &[u8]) -> Result<(), String> {
        self.inject_mbuf(port, Mbuf::from_slice(data))
    }

    pub fn inject_mbuf(&self, port: PortId, pkt: Mbuf) -> Result<(), String> {
        let sim = self.port(port).ok_or("Port not found")?;
        sim.rx
            .push(pkt)
            .map_err(|_| "RX Dropped: ring full".to_string())
    }

    /// Take every frame transmitted on `port` so far.
    pub fn drain_tx(&self, port: PortId) -> Vec<Mbuf> {
        let mut out = Vec::new();
        if let Some(sim) = self.port(port) {
            while let Some(pkt) = sim.tx.pop() {
                out.push(pkt);
            }
        }
        out
    }

    /// Limit how many packets each upcoming `tx_burst` on `port` accepts.
    /// Calls past the end of the script are limited by ring space only.
    pub fn script_tx(&self, port: PortId, limits: &[usize]) {
        if let Some(sim) = self.port(port) {
            let mut script = sim.tx_script.lock().unwrap_or_else(PoisonError::into_inner);
            script.clear();
            script.extend(limits.iter().copied());
        }
    }

    pub fn tx_calls(&self, port: PortId) -> u64 {
        self.port(port)
            .map_or(0, |sim| sim.tx_calls.load(Ordering::Relaxed))
    }

    pub fn rx_pending(&self, port: PortId) -> usize {
        self.port(port).map_or(0, |sim| sim.rx.len())
    }

    pub fn tx_pending(&self, port: PortId) -> usize {
        self.port(port).map_or(0, |sim| sim.tx.len())
    }
}

impl PacketIo for SimNic {
    fn rx_burst(&mut self, port: PortId, _queue: QueueId, pkts: &mut Vec<Mbuf>, max: usize) -> usize {
        let Some(sim) = self.port(port) else {
            return 0;
        };
        let mut received = 0;
        while received < max {
            match sim.rx.pop() {
                Some(pkt) => {
                    pkts.push(pkt);
                    received += 1;
                }
                None => break,
            }
        }
        received
    }

    fn tx_burst(&mut self, port: PortId, _queue: QueueId, pkts: &mut Vec<Mbuf>) -> usize {
        let Some(sim) = self.port(port) else {
            return 0;
        };
        sim.tx_calls.fetch_add(1, Ordering::Relaxed);

        let limit = sim
            .tx_script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(usize::MAX);

        let mut pending = mem::take(pkts).into_iter();
        let mut sent = 0;
        while sent < limit {
            let Some(pkt) = pending.next() else {
                break;
            };
            if let Err(pkt) = sim.tx.push(pkt) {
                pkts.push(pkt);
                break;
            }
            sent += 1;
        }
        // Unsent packets stay with the caller, in order.
        pkts.extend(pending);
        sent
    }

    fn tx_port_conf(&self, port: PortId) -> TxPortConf {
        self.port(port)
            .map(|sim| *sim.conf.lock().unwrap_or_else(PoisonError::into_inner))
            .unwrap_or_else(|| TxPortConf::new(port))
    }
}
