use crate::packet::{Mbuf, TxPortConf};
use fluxrelay_proto::{swap_eth_addrs, IPV4_HDR_LEN, ETH_HDR_LEN};

/// In-place per-burst packet rewrite run on the worker.
///
/// Must not fail and must finish in time proportional to the burst.
pub trait Transform: Send + 'static {
    fn apply(&mut self, pkts: &mut [Mbuf], dest: &TxPortConf);
}

impl<F> Transform for F
where
    F: FnMut(&mut [Mbuf], &TxPortConf) + Send + 'static,
{
    #[inline]
    fn apply(&mut self, pkts: &mut [Mbuf], dest: &TxPortConf) {
        self(pkts, dest)
    }
}

/// Swap Ethernet source and destination and tag each packet for the TX port.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacSwap;

impl Transform for MacSwap {
    fn apply(&mut self, pkts: &mut [Mbuf], dest: &TxPortConf) {
        macswap(pkts, dest);
    }
}

pub fn macswap(pkts: &mut [Mbuf], dest: &TxPortConf) {
    let ol_flags = dest.offloads.mbuf_flags();
    for pkt in pkts.iter_mut() {
        swap_eth_addrs(pkt.data_mut());
        pkt.ol_flags = ol_flags;
        pkt.l2_len = ETH_HDR_LEN as u8;
        pkt.l3_len = IPV4_HDR_LEN as u16;
        pkt.vlan_tci = dest.vlan_id;
        pkt.vlan_tci_outer = dest.vlan_id_outer;
    }
}
