//! Connection pool managing read/write connections.

pub mod pragmas;
pub mod read_pool;
pub mod write_connection;

use std::path::PathBuf;
use std::sync::Arc;

pub use read_pool::ReadPool;
pub use write_connection::WriteConnection;

/// The single write connection plus, for file-backed databases, the
/// read connection pool.
///
/// In-memory databases have no readers: a second in-memory connection
/// would be a separate database, so reads go through the writer.
pub struct ConnectionPool {
    pub writer: Arc<WriteConnection>,
    pub readers: Option<Arc<ReadPool>>,
    pub db_path: Option<PathBuf>,
}

impl ConnectionPool {
    pub fn new(writer: WriteConnection, readers: Option<ReadPool>, db_path: Option<PathBuf>) -> Self {
        Self {
            writer: Arc::new(writer),
            readers: readers.map(Arc::new),
            db_path,
        }
    }
}
