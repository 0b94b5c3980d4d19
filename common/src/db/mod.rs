// Database layer module

pub mod pool;

pub use pool::DbPool;
