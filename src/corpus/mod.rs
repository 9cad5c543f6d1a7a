// Composer corpus: directory scan, merged index and persistence

pub mod index;
pub mod scanner;
pub mod storage;

pub use index::*;
pub use scanner::*;
pub use storage::*;
