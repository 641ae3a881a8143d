//! Multi-version row store shared by every session of a connection.
//!
//! Each key holds a chain of versions tagged with the commit sequence that
//! produced them. Readers pick the newest version at or below their
//! snapshot; transactions stage their writes privately and hold a per-key
//! write lock until they finish.

use crate::codes::{EBUSY, EEXIST, EINVAL, ENOENT, WT_CACHE_FULL, WT_ROLLBACK};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ffi::c_int;
use std::ops::Bound;

/// Pending writes of one transaction on one table. `None` is a removal.
pub(crate) type WriteSet = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Table settings fixed at create time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TableConfig {
    pub key_format: String,
    pub value_format: String,
    pub block_compressor: Option<String>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            key_format: "u".to_string(),
            value_format: "u".to_string(),
            block_compressor: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Version {
    seq: u64,
    value: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
pub(crate) struct Table {
    pub config: TableConfig,
    rows: BTreeMap<Vec<u8>, Vec<Version>>,
    locks: HashMap<Vec<u8>, u64>,
    cursors: usize,
}

impl Table {
    fn new(config: TableConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Number of cursors open on the table.
    pub fn cursor_count(&self) -> usize {
        self.cursors
    }

    /// Returns true if a running transaction has written to the table.
    pub fn has_pending_writes(&self) -> bool {
        !self.locks.is_empty()
    }

    /// Returns true if no committed row is visible at `snapshot`.
    pub fn is_empty_at(&self, snapshot: u64) -> bool {
        !self
            .rows
            .values()
            .any(|chain| visible_at(chain, snapshot).is_some())
    }
}

/// A running transaction, owned by its session.
#[derive(Debug)]
pub(crate) struct Txn {
    pub id: u64,
    pub snapshot: u64,
    /// Set once a write has failed with a conflict; commit must then fail.
    pub poisoned: bool,
    pub writes: BTreeMap<String, WriteSet>,
}

/// What one operation is allowed to see.
#[derive(Clone, Copy)]
pub(crate) struct ReadView<'a> {
    pub snapshot: u64,
    pub writes: Option<&'a WriteSet>,
}

/// Committed rows of one table, as written to a checkpoint.
pub(crate) type TableRows = Vec<(Vec<u8>, Vec<u8>)>;

#[derive(Debug, Default)]
pub(crate) struct Store {
    tables: BTreeMap<String, Table>,
    committed: u64,
    next_txn: u64,
    /// Open snapshots and how many transactions share each.
    snapshots: BTreeMap<u64, usize>,
    /// Keys whose chains still hold more than one version.
    stale: BTreeSet<(String, Vec<u8>)>,
    resident_bytes: usize,
    cache_limit: Option<usize>,
}

fn visible_at(chain: &[Version], snapshot: u64) -> Option<&[u8]> {
    chain
        .iter()
        .rev()
        .find(|v| v.seq <= snapshot)
        .and_then(|v| v.value.as_deref())
}

/// Keeps everything newer than `horizon` plus the newest version at or
/// below it; older versions are unreachable.
fn trim(chain: &mut Vec<Version>, horizon: u64) {
    if let Some(keep_from) = chain.iter().rposition(|v| v.seq <= horizon) {
        chain.drain(..keep_from);
    }
}

impl Store {
    pub fn new(cache_limit: Option<usize>) -> Self {
        Self {
            next_txn: 1,
            cache_limit,
            ..Self::default()
        }
    }

    /// Rebuilds a store from checkpointed tables.
    pub fn restore(
        cache_limit: Option<usize>,
        tables: impl IntoIterator<Item = (String, TableConfig, TableRows)>,
    ) -> Self {
        let mut store = Self::new(cache_limit);
        for (name, config, rows) in tables {
            let mut table = Table::new(config);
            for (key, value) in rows {
                store.resident_bytes += key.len() + value.len();
                table.rows.insert(
                    key,
                    vec![Version {
                        seq: 0,
                        value: Some(value),
                    }],
                );
            }
            store.tables.insert(name, table);
        }
        store
    }

    /// Latest committed rows of every table.
    pub fn checkpoint(&self) -> Vec<(String, TableConfig, TableRows)> {
        self.tables
            .iter()
            .map(|(name, table)| {
                let rows = table
                    .rows
                    .iter()
                    .filter_map(|(k, chain)| {
                        visible_at(chain, self.committed).map(|v| (k.clone(), v.to_vec()))
                    })
                    .collect();
                (name.clone(), table.config.clone(), rows)
            })
            .collect()
    }

    pub fn committed(&self) -> u64 {
        self.committed
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn create_table(&mut self, name: &str, config: TableConfig, exclusive: bool) -> c_int {
        match self.tables.get(name) {
            Some(_) if exclusive => EEXIST,
            Some(existing) if existing.config != config => EINVAL,
            Some(_) => 0,
            None => {
                self.tables.insert(name.to_string(), Table::new(config));
                0
            }
        }
    }

    pub fn drop_table(&mut self, name: &str, force: bool) -> c_int {
        let Some(table) = self.tables.get(name) else {
            return if force { 0 } else { ENOENT };
        };
        if table.cursors > 0 || !table.locks.is_empty() {
            return EBUSY;
        }
        if let Some(table) = self.tables.remove(name) {
            let freed: usize = table
                .rows
                .iter()
                .filter_map(|(k, chain)| visible_at(chain, self.committed).map(|v| k.len() + v.len()))
                .sum();
            self.resident_bytes = self.resident_bytes.saturating_sub(freed);
        }
        0
    }

    pub fn attach_cursor(&mut self, name: &str) -> c_int {
        match self.tables.get_mut(name) {
            Some(table) => {
                table.cursors += 1;
                0
            }
            None => ENOENT,
        }
    }

    pub fn detach_cursor(&mut self, name: &str) {
        if let Some(table) = self.tables.get_mut(name) {
            table.cursors = table.cursors.saturating_sub(1);
        }
    }

    pub fn begin(&mut self) -> Txn {
        let id = self.next_txn;
        self.next_txn += 1;
        let snapshot = self.committed;
        *self.snapshots.entry(snapshot).or_insert(0) += 1;
        Txn {
            id,
            snapshot,
            poisoned: false,
            writes: BTreeMap::new(),
        }
    }

    /// Finishes a transaction, publishing its writes when `commit` is set.
    pub fn finish(&mut self, txn: Txn, commit: bool) {
        let oldest = self.oldest_snapshot();
        if let Some(count) = self.snapshots.get_mut(&txn.snapshot) {
            *count -= 1;
            if *count == 0 {
                self.snapshots.remove(&txn.snapshot);
            }
        }

        let seq = self.committed + 1;
        let mut published = false;
        for (name, writes) in txn.writes {
            for (key, value) in writes {
                if !self.tables.contains_key(&name) {
                    continue;
                }
                self.release_lock(&name, &key, txn.id);
                if commit {
                    self.publish(&name, key, value, seq);
                    published = true;
                }
            }
        }
        if published {
            self.committed = seq;
        }
        if self.oldest_snapshot() != oldest {
            self.prune();
        }
    }

    fn oldest_snapshot(&self) -> Option<u64> {
        self.snapshots.keys().next().copied()
    }

    /// Trims stale chains to what open snapshots can still see, dropping
    /// keys left with nothing but a removal.
    fn prune(&mut self) {
        let horizon = self
            .oldest_snapshot()
            .map_or(self.committed, |oldest| oldest.min(self.committed));
        for (name, key) in std::mem::take(&mut self.stale) {
            let Some(t) = self.tables.get_mut(&name) else {
                continue;
            };
            let Some(chain) = t.rows.get_mut(key.as_slice()) else {
                continue;
            };
            trim(chain, horizon);
            if chain.len() == 1 && chain[0].value.is_none() {
                t.rows.remove(key.as_slice());
            } else if chain.len() > 1 {
                self.stale.insert((name, key));
            }
        }
    }

    /// Returns the value `view` sees for `key`.
    pub fn read<'a>(&'a self, table: &str, key: &[u8], view: ReadView<'a>) -> Option<&'a [u8]> {
        if let Some(pending) = view.writes.and_then(|w| w.get(key)) {
            return pending.as_deref();
        }
        self.tables
            .get(table)?
            .rows
            .get(key)
            .and_then(|chain| visible_at(chain, view.snapshot))
    }

    /// Finds the first visible record strictly after (`forward`) or before
    /// `from`. `None` starts from the respective end of the table.
    pub fn step<'a>(
        &'a self,
        table: &str,
        from: Option<&[u8]>,
        forward: bool,
        view: ReadView<'a>,
    ) -> Option<(&'a [u8], &'a [u8])> {
        let t = self.tables.get(table)?;
        let (lo, hi) = match (from, forward) {
            (None, _) => (Bound::Unbounded, Bound::Unbounded),
            (Some(k), true) => (Bound::Excluded(k), Bound::Unbounded),
            (Some(k), false) => (Bound::Unbounded, Bound::Excluded(k)),
        };

        let committed = t.rows.range::<[u8], _>((lo, hi)).map(|(k, _)| k.as_slice());
        let pending = view
            .writes
            .into_iter()
            .flat_map(move |w| w.range::<[u8], _>((lo, hi)).map(|(k, _)| k.as_slice()));

        let (mut a, mut b): (
            Box<dyn Iterator<Item = &'a [u8]> + '_>,
            Box<dyn Iterator<Item = &'a [u8]> + '_>,
        ) = if forward {
            (Box::new(committed), Box::new(pending))
        } else {
            (Box::new(committed.rev()), Box::new(pending.rev()))
        };

        let mut next_a = a.next();
        let mut next_b = b.next();
        loop {
            let key = match (next_a, next_b) {
                (None, None) => return None,
                (Some(x), None) => {
                    next_a = a.next();
                    x
                }
                (None, Some(y)) => {
                    next_b = b.next();
                    y
                }
                (Some(x), Some(y)) => {
                    let take_a = if forward { x <= y } else { x >= y };
                    if x == y {
                        next_a = a.next();
                        next_b = b.next();
                        x
                    } else if take_a {
                        next_a = a.next();
                        x
                    } else {
                        next_b = b.next();
                        y
                    }
                }
            };
            if let Some(value) = self.read(table, key, view) {
                return Some((key, value));
            }
        }
    }

    /// Applies a write. With a transaction the write is staged and the key
    /// locked; without one it commits immediately.
    pub fn write(
        &mut self,
        table: &str,
        key: &[u8],
        value: Option<&[u8]>,
        txn: Option<&mut Txn>,
        conflict_snapshot: u64,
    ) -> c_int {
        let Some(t) = self.tables.get(table) else {
            return ENOENT;
        };
        let owner = txn.as_ref().map(|running| running.id);
        if let Some(&holder) = t.locks.get(key) {
            if Some(holder) != owner {
                return WT_ROLLBACK;
            }
        }
        let latest = t.rows.get(key).and_then(|c| c.last());
        if owner.is_some() && latest.is_some_and(|v| v.seq > conflict_snapshot) {
            return WT_ROLLBACK;
        }

        if let (Some(limit), Some(value)) = (self.cache_limit, value) {
            let current = latest
                .and_then(|v| v.value.as_ref())
                .map_or(0, |old| key.len() + old.len());
            let grown = (key.len() + value.len()).saturating_sub(current);
            if self.resident_bytes + grown > limit {
                return WT_CACHE_FULL;
            }
        }

        match txn {
            Some(txn) => {
                if let Some(t) = self.tables.get_mut(table) {
                    t.locks.insert(key.to_vec(), txn.id);
                }
                txn.writes
                    .entry(table.to_string())
                    .or_default()
                    .insert(key.to_vec(), value.map(<[u8]>::to_vec));
            }
            None => {
                let seq = self.committed + 1;
                self.publish(table, key.to_vec(), value.map(<[u8]>::to_vec), seq);
                self.committed = seq;
            }
        }
        0
    }

    fn release_lock(&mut self, table: &str, key: &[u8], id: u64) {
        if let Some(t) = self.tables.get_mut(table) {
            if t.locks.get(key) == Some(&id) {
                t.locks.remove(key);
            }
        }
    }

    fn publish(&mut self, table: &str, key: Vec<u8>, value: Option<Vec<u8>>, seq: u64) {
        let horizon = self
            .oldest_snapshot()
            .map_or(seq, |oldest| oldest.min(seq));
        let Some(t) = self.tables.get_mut(table) else {
            return;
        };
        let new_len = value.as_ref().map_or(0, |v| key.len() + v.len());

        let Some(chain) = t.rows.get_mut(key.as_slice()) else {
            if value.is_some() {
                t.rows.insert(key, vec![Version { seq, value }]);
                self.resident_bytes += new_len;
            }
            return;
        };
        let old_len = chain
            .last()
            .and_then(|v| v.value.as_ref())
            .map_or(0, |v| key.len() + v.len());
        chain.push(Version { seq, value });

        trim(chain, horizon);
        if chain.len() == 1 && chain[0].value.is_none() {
            t.rows.remove(key.as_slice());
        } else if chain.len() > 1 {
            self.stale.insert((table.to_string(), key));
        }
        self.resident_bytes = (self.resident_bytes + new_len).saturating_sub(old_len);
    }
}
