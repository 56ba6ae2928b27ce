//! Durable sinks for finalized posts.

pub mod libsql;
pub mod memory;

pub use libsql::LibSqlSink;
pub use memory::MemorySink;
