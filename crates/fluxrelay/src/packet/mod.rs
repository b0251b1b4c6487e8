pub mod port;

pub use port::{PortId, QueueId, TxOffloads, TxPortConf};

use bitflags::bitflags;

bitflags! {
    /// Per-packet TX offload requests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MbufFlags: u64 {
        const TX_VLAN = 1 << 57;
        const TX_QINQ = 1 << 49;
        const TX_MACSEC = 1 << 44;
    }
}

/// An owned packet buffer moved through one forwarding cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mbuf {
    data: Vec<u8>,
    pub ol_flags: MbufFlags,
    pub vlan_tci: u16,
    pub vlan_tci_outer: u16,
    pub l2_len: u8,
    pub l3_len: u16,
}

impl Mbuf {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }

    #[inline(always)]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline(always)]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn ethernet(&self) -> Option<&fluxrelay_proto::EthHeader> {
        fluxrelay_proto::parse_eth(self.data()).map(|(h, _)| h)
    }
}
