pub mod dispatch;
pub mod runloop;
pub mod stream;
pub mod worker;

pub use dispatch::{forward_burst, transmit};
pub use runloop::RunLoop;
pub use stream::{BurstReport, FwdStream, StreamStats, StreamStatsSnapshot};
pub use worker::{WorkerState, WorkerThread};
