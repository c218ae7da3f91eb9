//! MySQL-flavor GTID sets.
//!
//! Textual form: `sid:interval[:interval...][,sid:...]` where an interval
//! is `start-stop` (inclusive) or a single sequence number. Internally
//! intervals are half-open and kept sorted and merged, so equal positions
//! always render and encode identically.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

use crate::error::{ConnError, Result};
use crate::replication::GtidSet;

/// Sorted, merged set of half-open `[start, stop)` intervals per source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MysqlGtidSet {
    sets: BTreeMap<Uuid, Vec<(u64, u64)>>,
}

fn parse_interval(part: &str) -> Result<(u64, u64)> {
    let parse_seq = |s: &str| -> Result<u64> {
        let n: u64 = s
            .parse()
            .map_err(|_| ConnError::InvalidGtid(format!("bad sequence number {s:?}")))?;
        if n == 0 {
            return Err(ConnError::InvalidGtid(
                "sequence numbers start at 1".to_string(),
            ));
        }
        Ok(n)
    };

    match part.split_once('-') {
        Some((start, stop)) => {
            let start = parse_seq(start)?;
            let stop = parse_seq(stop)?;
            if stop < start {
                return Err(ConnError::InvalidGtid(format!(
                    "interval {part:?} runs backwards"
                )));
            }
            Ok((start, stop + 1))
        }
        None => {
            let seq = parse_seq(part)?;
            Ok((seq, seq + 1))
        }
    }
}

/// Merge overlapping and adjacent intervals in place.
fn normalize(intervals: &mut Vec<(u64, u64)>) {
    intervals.sort_unstable();
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(intervals.len());
    for &(start, stop) in intervals.iter() {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(stop),
            _ => merged.push((start, stop)),
        }
    }
    *intervals = merged;
}

fn covers(intervals: &[(u64, u64)], needle: (u64, u64)) -> bool {
    intervals
        .iter()
        .any(|&(start, stop)| start <= needle.0 && needle.1 <= stop)
}

impl MysqlGtidSet {
    /// Parse the textual form; the empty string is the empty set.
    pub fn parse(s: &str) -> Result<Self> {
        let mut set = Self::default();
        let s = s.trim();
        if s.is_empty() {
            return Ok(set);
        }
        for uuid_set in s.split(',') {
            set.add_uuid_set(uuid_set.trim())?;
        }
        Ok(set)
    }

    fn add_uuid_set(&mut self, part: &str) -> Result<()> {
        let mut fields = part.split(':');
        let sid = fields
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConnError::InvalidGtid(format!("empty source id in {part:?}")))?;
        let sid = Uuid::parse_str(sid)
            .map_err(|e| ConnError::InvalidGtid(format!("bad source id {sid:?}: {e}")))?;

        let intervals = self.sets.entry(sid).or_default();
        let mut added = false;
        for field in fields {
            intervals.push(parse_interval(field)?);
            added = true;
        }
        if !added {
            return Err(ConnError::InvalidGtid(format!(
                "source id without intervals in {part:?}"
            )));
        }
        normalize(intervals);
        Ok(())
    }
}

impl fmt::Display for MysqlGtidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (sid, intervals) in &self.sets {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            write!(f, "{sid}")?;
            for &(start, stop) in intervals {
                if stop == start + 1 {
                    write!(f, ":{start}")?;
                } else {
                    write!(f, ":{start}-{}", stop - 1)?;
                }
            }
        }
        Ok(())
    }
}

impl GtidSet for MysqlGtidSet {
    /// Binary form used by binlog dump: source count, then per source the
    /// raw 16-byte sid, interval count and `[start, stop)` pairs, all
    /// little-endian u64.
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.sets.len() as u64).to_le_bytes());
        for (sid, intervals) in &self.sets {
            buf.extend_from_slice(sid.as_bytes());
            buf.extend_from_slice(&(intervals.len() as u64).to_le_bytes());
            for &(start, stop) in intervals {
                buf.extend_from_slice(&start.to_le_bytes());
                buf.extend_from_slice(&stop.to_le_bytes());
            }
        }
        buf
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
        other.sets.iter().all(|(sid, intervals)| {
            self.sets.get(sid).is_some_and(|ours| {
                intervals.iter().all(|&needle| covers(ours, needle))
            })
        })
    }

    fn update(&mut self, gtid: &str) -> Result<()> {
        let gtid = gtid.trim();
        if gtid.is_empty() {
            return Ok(());
        }
        for uuid_set in gtid.split(',') {
            self.add_uuid_set(uuid_set.trim())?;
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

#[cfg(test)]
mod tests {
    use super::*;

    const SID: &str = "de278ad0-2106-11e4-9f8e-6edd0ca20947";
    const SID2: &str = "11111111-2222-3333-4444-555555555555";

    #[test]
    fn test_parse_and_display() {
        let text = format!("{SID}:1-4:6");
        let set = MysqlGtidSet::parse(&text).unwrap();
        assert_eq!(set.to_string(), text);
    }

    #[test]
    fn test_empty_set() {
        let set = MysqlGtidSet::parse("").unwrap();
        assert!(set.is_empty());
        assert_eq!(set.to_string(), "");
        assert_eq!(set.encode(), 0u64.to_le_bytes());
    }

    #[test]
    fn test_adjacent_intervals_merge() {
        let set = MysqlGtidSet::parse(&format!("{SID}:1-4:5-10")).unwrap();
        assert_eq!(set.to_string(), format!("{SID}:1-10"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(MysqlGtidSet::parse("not-a-uuid:1-4").is_err());
        assert!(MysqlGtidSet::parse(SID).is_err()); // no interval
        assert!(MysqlGtidSet::parse(&format!("{SID}:4-1")).is_err());
        assert!(MysqlGtidSet::parse(&format!("{SID}:0")).is_err());
        assert!(MysqlGtidSet::parse(&format!("{SID}:x")).is_err());
    }

    #[test]
    fn test_encode_layout() {
        let set = MysqlGtidSet::parse(&format!("{SID}:1-2")).unwrap();
        let encoded = set.encode();
        // count + sid + interval count + one [start, stop) pair
        assert_eq!(encoded.len(), 8 + 16 + 8 + 16);
        assert_eq!(&encoded[..8], &1u64.to_le_bytes());
        assert_eq!(&encoded[8..24], Uuid::parse_str(SID).unwrap().as_bytes());
        assert_eq!(&encoded[24..32], &1u64.to_le_bytes());
        assert_eq!(&encoded[32..40], &1u64.to_le_bytes());
        assert_eq!(&encoded[40..48], &3u64.to_le_bytes()); // stop is exclusive
    }

    #[test]
    fn test_contain() {
        let big = MysqlGtidSet::parse(&format!("{SID}:1-10,{SID2}:1-5")).unwrap();
        let small = MysqlGtidSet::parse(&format!("{SID}:2-4")).unwrap();
        let outside = MysqlGtidSet::parse(&format!("{SID}:8-12")).unwrap();

        assert!(big.contain(&small));
        assert!(!small.contain(&big));
        assert!(!big.contain(&outside));
    }

    #[test]
    fn test_update_merges() {
        let mut set = MysqlGtidSet::parse(&format!("{SID}:1-4")).unwrap();
        set.update(&format!("{SID}:5-8")).unwrap();
        assert_eq!(set.to_string(), format!("{SID}:1-8"));

        set.update(&format!("{SID2}:1")).unwrap();
        let rendered = set.to_string();
        assert!(rendered.contains(SID2));
    }

    #[test]
    fn test_equal_ignores_interval_spelling() {
        let a = MysqlGtidSet::parse(&format!("{SID}:1-3:4-6")).unwrap();
        let b = MysqlGtidSet::parse(&format!("{SID}:1-6")).unwrap();
        assert!(a.equal(&b));
    }
}
