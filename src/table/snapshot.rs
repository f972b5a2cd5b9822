/*!
 * Mount Table Snapshot
 * Immutable, target-indexed materialization of one table load
 */

use super::source::MountTableSource;
use crate::core::errors::ReloadResult;
use crate::core::types::MountRecord;
use ahash::RandomState;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

/// Point-in-time copy of the mount table
///
/// Built once and never mutated. Holds at most one record per target; when
/// the source reports a target twice the later record wins and takes the
/// position of its last occurrence.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: Vec<MountRecord>,
    index: HashMap<String, usize, RandomState>,
    loaded_at: Instant,
}

impl Snapshot {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = MountRecord>,
    {
        let all: Vec<MountRecord> = records.into_iter().collect();
        let mut index: HashMap<String, usize, RandomState> =
            HashMap::with_capacity_and_hasher(all.len(), RandomState::new());
        let mut kept = Vec::with_capacity(all.len());

        // Walk backwards so the first record seen per target is the last one reported
        for record in all.into_iter().rev() {
            if index.contains_key(&record.target) {
                continue;
            }
            index.insert(record.target.clone(), kept.len());
            kept.push(record);
        }

        kept.reverse();
        let last = kept.len().saturating_sub(1);
        for position in index.values_mut() {
            *position = last - *position;
        }

        Self {
            records: kept,
            index,
            loaded_at: Instant::now(),
        }
    }

    /// Load a fresh snapshot from a table source
    pub fn load<S>(source: &mut S) -> ReloadResult<Self>
    where
        S: MountTableSource + ?Sized,
    {
        Ok(Self::from_records(source.load()?))
    }

    pub fn empty() -> Self {
        Self::from_records(Vec::new())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn contains(&self, target: &str) -> bool {
        self.index.contains_key(target)
    }

    #[inline]
    pub fn get(&self, target: &str) -> Option<&MountRecord> {
        self.index.get(target).map(|&i| &self.records[i])
    }

    /// Records in table order
    pub fn records(&self) -> &[MountRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MountRecord> {
        self.records.iter()
    }

    /// Targets in table order
    pub fn targets(&self) -> impl Iterator<Item = &str> + '_ {
        self.records.iter().map(|r| r.target.as_str())
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    /// Full-table dump formatter
    pub fn dump(&self) -> TableDump<'_> {
        TableDump { snapshot: self }
    }
}

/// Two snapshots are equal when they hold the same records in the same order
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl Eq for Snapshot {}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a MountRecord;
    type IntoIter = std::slice::Iter<'a, MountRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Renders the `Current mounts:` listing
pub struct TableDump<'a> {
    snapshot: &'a Snapshot,
}

impl fmt::Display for TableDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current mounts:")?;
        for record in self.snapshot {
            writeln!(f, "  {}", record)?;
        }
        Ok(())
    }
}
