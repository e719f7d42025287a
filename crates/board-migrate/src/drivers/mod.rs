//! Database driver implementations of the store traits.
//!
//! Both ends of a migration are MySQL-family servers; [`mysql`] holds the
//! source reader and the destination writer.

pub mod mysql;

pub use mysql::{MysqlSource, MysqlTarget};
