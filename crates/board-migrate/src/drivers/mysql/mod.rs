//! MySQL/MariaDB driver.
//!
//! - [`MysqlSource`]: legacy board schema reader (SQLx)
//! - [`MysqlTarget`]: destination forum schema writer (mysql_async)
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod source;
mod target;

pub use source::MysqlSource;
pub use target::MysqlTarget;
