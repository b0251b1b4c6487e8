use crate::config::RetryPolicy;
use crate::engine::stream::{BurstReport, FwdStream};
use crate::error::RelayError;
use crate::io::PacketIo;
use crate::packet::{Mbuf, TxPortConf};
use fluxrelay_core::cpu;
use std::mem;
use std::time::Instant;

/// Send `pkts`, retrying the unsent tail if the stream allows it.
///
/// Whatever is still unsent after the last retry is dropped. `pkts` is
/// empty on return. Returns `(transmitted, dropped, retries)`.
pub fn transmit<Io: PacketIo>(
    io: &mut Io,
    stream: &FwdStream,
    pkts: &mut Vec<Mbuf>,
    retry: &RetryPolicy,
) -> (usize, usize, u32) {
    let total = pkts.len();
    if total == 0 {
        return (0, 0, 0);
    }

    io.tx_burst(stream.tx_port, stream.tx_queue, pkts);
    stream.stats().record_tx_burst();

    let mut retries = 0;
    if stream.retry_enabled {
        while !pkts.is_empty() && retries < retry.max_retries {
            cpu::delay(retry.delay);
            retries += 1;
            io.tx_burst(stream.tx_port, stream.tx_queue, pkts);
            stream.stats().record_tx_burst();
        }
    }

    let dropped = pkts.len();
    if dropped > 0 {
        tracing::trace!(
            port = stream.tx_port,
            dropped,
            retries,
            "tx ring full, dropping unsent packets"
        );
        pkts.clear();
    }

    (total - dropped, dropped, retries)
}

/// One dispatcher iteration: receive a burst, run `process` over it, transmit.
///
/// An empty receive returns straight away without calling `process`. `pkts`
/// is the caller's reusable burst buffer; it goes through `process` by value
/// and comes back empty. If `process` fails the burst is lost and counted
/// as dropped.
pub fn forward_burst<Io, F>(
    io: &mut Io,
    stream: &FwdStream,
    pkts: &mut Vec<Mbuf>,
    burst: usize,
    retry: &RetryPolicy,
    process: F,
) -> Result<BurstReport, RelayError>
where
    Io: PacketIo,
    F: FnOnce(Vec<Mbuf>, TxPortConf) -> Result<Vec<Mbuf>, RelayError>,
{
    pkts.clear();
    io.rx_burst(stream.rx_port, stream.rx_queue, pkts, burst);
    let received = pkts.len();
    if received == 0 {
        stream.stats().record_empty_poll();
        return Ok(BurstReport::default());
    }

    let start = Instant::now();
    let dest = io.tx_port_conf(stream.tx_port);

    let mut batch = match process(mem::take(pkts), dest) {
        Ok(batch) => batch,
        Err(err) => {
            stream.stats().record_burst(&BurstReport {
                received,
                dropped: received,
                elapsed: start.elapsed(),
                ..Default::default()
            });
            return Err(err);
        }
    };

    let (transmitted, dropped, retries) = transmit(io, stream, &mut batch, retry);
    // Hand the (now empty) allocation back for the next burst.
    *pkts = batch;

    let report = BurstReport {
        received,
        transmitted,
        dropped,
        retries,
        elapsed: start.elapsed(),
    };
    stream.stats().record_burst(&report);
    Ok(report)
}
