pub mod config;
pub mod db;
pub mod errors;
pub mod settings;

pub use db::{initialize, Database};
pub use errors::{DbError, NoMatch, ERR_NO_MATCH};
pub use settings::{ConnectionSettings, SslMode, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};
