pub mod ethernet;

pub use ethernet::{EthHeader, parse_eth, swap_eth_addrs, ETH_ADDR_LEN, ETH_HDR_LEN};

/// IPv4 header length without options.
pub const IPV4_HDR_LEN: usize = 20;
