//! Replication position sets (GTID).
//!
//! A GTID set identifies a replay position in the server's change log.
//! Two flavors exist with different textual and binary encodings; later
//! replication phases only need the shared [`GtidSet`] contract and the
//! flavor-keyed factory below. The carriers here implement the contract
//! at the interval/triplet level; richer GTID algebra lives outside this
//! crate.

pub mod mariadb;
pub mod mysql;

pub use mariadb::{MariadbGtid, MariadbGtidSet};
pub use mysql::MysqlGtidSet;

use std::any::Any;
use std::fmt;

use crate::error::{ConnError, Result};

/// Flavor identifier for MySQL-style GTID sets.
pub const MYSQL_FLAVOR: &str = "mysql";
/// Flavor identifier for MariaDB-style GTID sets.
pub const MARIADB_FLAVOR: &str = "mariadb";

/// A replay position in the server's change-event stream.
pub trait GtidSet: fmt::Display + fmt::Debug + Send + Sync {
    /// Binary encoding used by binlog dump commands.
    fn encode(&self) -> Vec<u8>;

    /// Structural equality across `dyn` boundaries.
    fn equal(&self, other: &dyn GtidSet) -> bool;

    /// Whether `other` is a subset of this position.
    fn contain(&self, other: &dyn GtidSet) -> bool;

    /// Merge a textual delta into this position.
    fn update(&mut self, gtid: &str) -> Result<()>;

    /// Clone behind the trait object.
    fn clone_box(&self) -> Box<dyn GtidSet>;

    /// True when the position holds nothing.
    fn is_empty(&self) -> bool;

    /// Downcasting hook for `equal`/`contain` implementations.
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn GtidSet> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Parse a GTID set of the given flavor.
///
/// Simple dispatch: `"mysql"` and `"mariadb"` are the only valid flavors.
pub fn parse_gtid_set(flavor: &str, s: &str) -> Result<Box<dyn GtidSet>> {
    match flavor {
        MYSQL_FLAVOR => Ok(Box::new(MysqlGtidSet::parse(s)?)),
        MARIADB_FLAVOR => Ok(Box::new(MariadbGtidSet::parse(s)?)),
        other => Err(ConnError::InvalidFlavor(other.to_string())),
    }
}
