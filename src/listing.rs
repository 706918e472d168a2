//! Object-storage listing resolution.
//!
//! Repeated upstream processing leaves several copies of one logical object in
//! the bucket, told apart by a two-digit reprocessing counter just before the
//! extension:
//!
//! `.../SWOT_L2_HR_RiverSP_Reach_010_222_AF_20231101T000000_20231101T000010_PIC0_01.zip`
//!
//! Only the highest counter of each group survives, and the survivors are
//! ordered by the start timestamp embedded in the file name.

use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Trailing characters stripped to form the grouping key (counter + extension).
pub const SUFFIX_WIDTH: usize = 6;
pub const COUNTER_WIDTH: usize = 2;
pub const LISTING_EXTENSION: &str = ".zip";
pub const FIELD_DELIMITER: char = '_';
/// Index of the start-time field in the delimiter-split file name.
pub const TIMESTAMP_FIELD: usize = 8;
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    TooShort,
    MalformedCounter(String),
    MissingTimestamp,
    BadTimestamp(String),
}

impl fmt::Display for ListingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingError::TooShort => write!(f, "shorter than {} characters", SUFFIX_WIDTH),
            ListingError::MalformedCounter(s) => write!(f, "malformed counter suffix '{}'", s),
            ListingError::MissingTimestamp => {
                write!(f, "no field {} in file name", TIMESTAMP_FIELD)
            }
            ListingError::BadTimestamp(s) => write!(f, "unparseable timestamp '{}'", s),
        }
    }
}

impl std::error::Error for ListingError {}

/// The entry with its counter and extension removed.
pub fn group_key(entry: &str) -> Result<&str, ListingError> {
    let cut = entry
        .len()
        .checked_sub(SUFFIX_WIDTH)
        .ok_or(ListingError::TooShort)?;
    entry.get(..cut).ok_or(ListingError::TooShort)
}

pub fn counter(entry: &str) -> Result<u32, ListingError> {
    let key = group_key(entry)?;
    let suffix = &entry[key.len()..];
    let digits = suffix
        .strip_suffix(LISTING_EXTENSION)
        .filter(|d| d.len() == COUNTER_WIDTH && d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| ListingError::MalformedCounter(suffix.to_string()))?;
    digits
        .parse()
        .map_err(|_| ListingError::MalformedCounter(suffix.to_string()))
}

pub fn timestamp(entry: &str) -> Result<NaiveDateTime, ListingError> {
    let file_name = entry.rsplit('/').next().unwrap_or(entry);
    let field = file_name
        .split(FIELD_DELIMITER)
        .nth(TIMESTAMP_FIELD)
        .ok_or(ListingError::MissingTimestamp)?;
    NaiveDateTime::parse_from_str(field, TIMESTAMP_FORMAT)
        .map_err(|_| ListingError::BadTimestamp(field.to_string()))
}

/// Keep one entry per group: the highest counter where a group has several
/// members, the lone member otherwise. Exact duplicates are removed. Output
/// follows the order in which groups first appear.
pub fn collapse_reprocessed(entries: &[String]) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&String>> = HashMap::new();

    for entry in entries {
        match group_key(entry) {
            Ok(key) => {
                let members = groups.entry(key).or_default();
                if members.is_empty() {
                    order.push(key);
                }
                members.push(entry);
            }
            Err(e) => warn!(entry = %entry, error = %e, "dropping listing entry"),
        }
    }

    let mut kept = Vec::with_capacity(order.len());
    for key in order {
        let members = &groups[key];
        if members.len() == 1 {
            kept.push(members[0].clone());
            continue;
        }

        let mut best: Option<(u32, &String)> = None;
        for member in members {
            match counter(member) {
                Ok(n) => {
                    if best.map(|(top, _)| n > top).unwrap_or(true) {
                        best = Some((n, member));
                    }
                }
                Err(e) => warn!(entry = %member, error = %e, "dropping listing entry"),
            }
        }

        match best {
            Some((n, member)) => {
                debug!(group = key, members = members.len(), counter = n, "reprocessed object collapsed");
                kept.push(member.clone());
            }
            None => warn!(group = key, "no valid counter in reprocessed group, dropping"),
        }
    }

    let mut seen = HashSet::new();
    kept.retain(|e| seen.insert(e.clone()));
    kept
}

/// Stable sort by embedded timestamp. Entries with an unparseable timestamp
/// are dropped; entries with no timestamp field follow the stamped ones in
/// input order.
pub fn order_by_timestamp(entries: Vec<String>) -> Vec<String> {
    let mut stamped = Vec::with_capacity(entries.len());
    let mut unstamped = Vec::new();
    for entry in entries {
        match timestamp(&entry) {
            Ok(ts) => stamped.push((ts, entry)),
            Err(ListingError::MissingTimestamp) => {
                debug!(entry = %entry, "listing entry has no timestamp field");
                unstamped.push(entry);
            }
            Err(e) => warn!(entry = %entry, error = %e, "dropping listing entry"),
        }
    }
    stamped.sort_by_key(|(ts, _)| *ts);
    stamped
        .into_iter()
        .map(|(_, e)| e)
        .chain(unstamped)
        .collect()
}

/// Collapse reprocessing duplicates, then order by timestamp.
pub fn resolve(entries: &[String]) -> Vec<String> {
    order_by_timestamp(collapse_reprocessed(entries))
}
