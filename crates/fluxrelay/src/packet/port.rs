use bitflags::bitflags;

use super::MbufFlags;

pub type PortId = u16;
pub type QueueId = u16;

bitflags! {
    /// TX offloads enabled on a port.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TxOffloads: u64 {
        const VLAN_INSERT = 1 << 0;
        const IPV4_CKSUM = 1 << 1;
        const UDP_CKSUM = 1 << 2;
        const TCP_CKSUM = 1 << 3;
        const QINQ_INSERT = 1 << 8;
        const MACSEC_INSERT = 1 << 13;
    }
}

impl TxOffloads {
    /// Packet flags every frame sent through a port with these offloads carries.
    pub fn mbuf_flags(self) -> MbufFlags {
        let mut flags = MbufFlags::empty();
        if self.contains(TxOffloads::VLAN_INSERT) {
            flags |= MbufFlags::TX_VLAN;
        }
        if self.contains(TxOffloads::QINQ_INSERT) {
            flags |= MbufFlags::TX_QINQ;
        }
        if self.contains(TxOffloads::MACSEC_INSERT) {
            flags |= MbufFlags::TX_MACSEC;
        }
        flags
    }
}

/// Destination descriptor handed to the transform with each burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxPortConf {
    pub port_id: PortId,
    pub offloads: TxOffloads,
    pub vlan_id: u16,
    pub vlan_id_outer: u16,
}

impl TxPortConf {
    pub fn new(port_id: PortId) -> Self {
        Self {
            port_id,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offloads_to_mbuf_flags() {
        assert_eq!(TxOffloads::empty().mbuf_flags(), MbufFlags::empty());
        assert_eq!(TxOffloads::IPV4_CKSUM.mbuf_flags(), MbufFlags::empty());

        let offloads = TxOffloads::VLAN_INSERT | TxOffloads::QINQ_INSERT | TxOffloads::MACSEC_INSERT;
        assert_eq!(
            offloads.mbuf_flags(),
            MbufFlags::TX_VLAN | MbufFlags::TX_QINQ | MbufFlags::TX_MACSEC
        );
    }
}
