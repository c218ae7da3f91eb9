//! MariaDB-flavor GTID sets.
//!
//! A MariaDB GTID is a `domain-server-sequence` triplet; a set holds at
//! most one triplet per replication domain. The binary encoding used by
//! binlog dump is the textual form itself.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConnError, Result};
use crate::replication::GtidSet;

/// One `domain-server-sequence` triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MariadbGtid {
    /// Replication domain.
    pub domain_id: u32,
    /// Server that produced the event.
    pub server_id: u32,
    /// Sequence number within the domain.
    pub sequence_number: u64,
}

impl FromStr for MariadbGtid {
    type Err = ConnError;

    fn from_str(s: &str) -> Result<Self> {
        let mut fields = s.split('-');
        let (Some(domain), Some(server), Some(sequence), None) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            return Err(ConnError::InvalidGtid(format!(
                "expected domain-server-sequence, got {s:?}"
            )));
        };
        Ok(Self {
            domain_id: domain
                .parse()
                .map_err(|_| ConnError::InvalidGtid(format!("bad domain id {domain:?}")))?,
            server_id: server
                .parse()
                .map_err(|_| ConnError::InvalidGtid(format!("bad server id {server:?}")))?,
            sequence_number: sequence
                .parse()
                .map_err(|_| ConnError::InvalidGtid(format!("bad sequence number {sequence:?}")))?,
        })
    }
}

impl fmt::Display for MariadbGtid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.domain_id, self.server_id, self.sequence_number
        )
    }
}

/// At most one GTID per domain, keyed and rendered in domain order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MariadbGtidSet {
    sets: BTreeMap<u32, MariadbGtid>,
}

impl MariadbGtidSet {
    /// Parse the textual form; the empty string is the empty set.
    pub fn parse(s: &str) -> Result<Self> {
        let mut set = Self::default();
        let s = s.trim();
        if s.is_empty() {
            return Ok(set);
        }
        for part in s.split(',') {
            let gtid: MariadbGtid = part.trim().parse()?;
            set.add(gtid);
        }
        Ok(set)
    }

    /// Insert a triplet, replacing the domain's previous position.
    pub fn add(&mut self, gtid: MariadbGtid) {
        self.sets.insert(gtid.domain_id, gtid);
    }

    /// Current position for a domain.
    pub fn get(&self, domain_id: u32) -> Option<MariadbGtid> {
        self.sets.get(&domain_id).copied()
    }
}

impl fmt::Display for MariadbGtidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for gtid in self.sets.values() {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            write!(f, "{gtid}")?;
        }
        Ok(())
    }
}

impl GtidSet for MariadbGtidSet {
    fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    fn equal(&self, other: &dyn GtidSet) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self == other)
    }

    fn contain(&self, other: &dyn GtidSet) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        other.sets.values().all(|theirs| {
            self.sets
                .get(&theirs.domain_id)
                .is_some_and(|ours| ours.sequence_number >= theirs.sequence_number)
        })
    }

    fn update(&mut self, gtid: &str) -> Result<()> {
        let gtid = gtid.trim();
        if gtid.is_empty() {
            return Ok(());
        }
        for part in gtid.split(',') {
            let gtid: MariadbGtid = part.trim().parse()?;
            self.add(gtid);
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn GtidSet> {
        Box::new(self.clone())
    }

    fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
