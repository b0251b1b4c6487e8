use crate::packet::{Mbuf, PortId, QueueId, TxPortConf};

/// Poll-mode packet I/O used by the dispatcher.
///
/// Neither call may block. Implementations are moved to the worker thread
/// by the run-loop strategy, hence `Send + 'static`.
pub trait PacketIo: Send + 'static {
    /// Append up to `max` received packets to `pkts`. Returns how many were appended.
    fn rx_burst(&mut self, port: PortId, queue: QueueId, pkts: &mut Vec<Mbuf>, max: usize) -> usize;

    /// Send packets from the front of `pkts`.
    ///
    /// Sent packets are removed from `pkts`; unsent ones stay, in order, for
    /// the caller to retry or drop. Returns the number sent.
    fn tx_burst(&mut self, port: PortId, queue: QueueId, pkts: &mut Vec<Mbuf>) -> usize;

    /// TX configuration of `port`, handed to the transform alongside each burst.
    fn tx_port_conf(&self, port: PortId) -> TxPortConf;
}
