// SQLite backend - the connection layer the legacy facade forwards to.
//
// - config: bb8 manager, connection options and pool setup
// - connection: worker-hop execution on a pooled connection
// - params: parameter conversion between middleware and SQLite types
// - query: result extraction and building

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{SqliteManager, SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use params::Params;
pub use query::build_result_set;
