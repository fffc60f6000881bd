//! Persistence layer: local answer mirror plus the remote draft adapter.

pub mod adapter;
pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use adapter::PersistenceAdapter;
pub use libsql_backend::LibSqlMirror;
pub use memory::MemoryMirror;
pub use traits::{LocalMirror, LocalSnapshot};
