// Parallel fan-out/fan-in over the scanned file list

pub mod orchestrator;
pub mod partition;
pub mod pool;

pub use orchestrator::*;
pub use partition::*;
pub use pool::*;
