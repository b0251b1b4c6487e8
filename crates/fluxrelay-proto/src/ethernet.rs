
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct EthHeader {
    pub dst: [u8; 6],
    pub src: [u8; 6],
    pub eth_type: u16,
}

pub const ETH_P_IP: u16 = 0x0800;
pub const ETH_P_IPV6: u16 = 0x86DD;
pub const ETH_P_ARP: u16 = 0x0806;

pub const ETH_ADDR_LEN: usize = 6;
pub const ETH_HDR_LEN: usize = std::mem::size_of::<EthHeader>();

impl EthHeader {
    pub fn eth_type(&self) -> u16 {
        u16::from_be(self.eth_type)
    }
}

pub fn parse_eth(data: &[u8]) -> Option<(&EthHeader, &[u8])> {
    if data.len() < ETH_HDR_LEN {
        return None;
    }

    let ptr = data.as_ptr() as *const EthHeader;
    let header = unsafe { &*ptr };
    let payload = &data[ETH_HDR_LEN..];

    Some((header, payload))
}

/// Swap destination and source addresses in place.
///
/// Returns `false` and leaves the frame untouched when it is shorter than
/// an Ethernet header.
#[inline]
pub fn swap_eth_addrs(frame: &mut [u8]) -> bool {
    if frame.len() < ETH_HDR_LEN {
        return false;
    }
    let (dst, rest) = frame.split_at_mut(ETH_ADDR_LEN);
    dst.swap_with_slice(&mut rest[..ETH_ADDR_LEN]);
    true
}
