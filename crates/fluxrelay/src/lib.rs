pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod handoff;
pub mod io;
pub mod mode;
pub mod packet;
pub mod transform;

#[cfg(feature = "simulator")]
pub mod simulator;

pub use builder::RelayBuilder;
pub use config::{RelayConfig, RetryPolicy, WaitStrategy};
pub use engine::{BurstReport, FwdStream, StreamStats, StreamStatsSnapshot, WorkerState};
pub use error::RelayError;
pub use io::PacketIo;
pub use mode::ForwardMode;
pub use packet::{Mbuf, MbufFlags, TxOffloads, TxPortConf};
pub use transform::{MacSwap, Transform};
