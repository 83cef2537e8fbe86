//! Per-site data manager
//!
//! Owns one site's version chains. The `TransactionManager` never reaches
//! into a chain directly; it goes through `read`, `write`, or the
//! `last_visible_commit_time` query.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, SimError};
use crate::transaction::Timestamp;
use crate::variable::INITIAL_COMMIT_TIME;

/// `(value, commit_time)`, appended to a variable's chain in commit-time order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub value: i64,
    pub commit_time: Timestamp,
}

/// Site up/down status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    Up,
    Down,
}

/// Owns the version chains for every variable stored at this site.
pub struct DataManager {
    pub site_id: u32,
    status: SiteStatus,
    history: BTreeMap<u32, Vec<Version>>,
    current: BTreeMap<u32, i64>,
    post_recovery_ok: BTreeSet<u32>,
}

impl DataManager {
    pub fn new(site_id: u32) -> Self {
        Self {
            site_id,
            status: SiteStatus::Up,
            history: BTreeMap::new(),
            current: BTreeMap::new(),
            post_recovery_ok: BTreeSet::new(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == SiteStatus::Up
    }

    pub fn current_value(&self, variable_index: u32) -> Option<i64> {
        self.current.get(&variable_index).copied()
    }

    pub fn holds(&self, variable_index: u32) -> bool {
        self.history.contains_key(&variable_index)
    }

    /// Set of variables this site considers safely readable post-recovery.
    /// Maintained here but not consulted by the transaction manager's read
    /// routing, which gates on `failure_history` instead (see DESIGN.md).
    pub fn post_recovery_ok(&self) -> &BTreeSet<u32> {
        &self.post_recovery_ok
    }

    /// Variables stored at this site paired with their current committed
    /// value, in ascending variable-index order (used by `dump`).
    pub fn current_values(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        self.current.iter().map(|(&v, &val)| (v, val))
    }

    /// The commit time of the newest version of `variable_index` with
    /// `commit_time <= start_time`, without requiring the site to be up.
    /// Used by the transaction manager to reason about snapshot validity
    /// without mutating or exposing the chain itself.
    pub fn last_visible_commit_time(&self, variable_index: u32, start_time: Timestamp) -> Option<Timestamp> {
        self.history
            .get(&variable_index)?
            .iter()
            .rev()
            .find(|v| v.commit_time <= start_time)
            .map(|v| v.commit_time)
    }

    /// The commit time of the newest version overall, regardless of `start_time`.
    pub fn latest_commit_time(&self, variable_index: u32) -> Option<Timestamp> {
        self.history.get(&variable_index)?.last().map(|v| v.commit_time)
    }

    /// Snapshot read: the newest version with `commit_time <= start_time`.
    pub fn read(&self, variable_index: u32, start_time: Timestamp) -> Result<i64> {
        if !self.is_up() {
            return Err(SimError::SiteDown(self.site_id));
        }
        let chain = self
            .history
            .get(&variable_index)
            .ok_or(SimError::UnknownVariable { site: self.site_id, variable: variable_index })?;

        chain
            .iter()
            .rev()
            .find(|v| v.commit_time <= start_time)
            .map(|v| v.value)
            .ok_or(SimError::NoVisibleVersion { site: self.site_id, variable: variable_index, start_time })
    }

    /// Appends a new version, updates the current-value cache, and marks
    /// the variable readable post-recovery.
    pub fn write(&mut self, variable_index: u32, value: i64, commit_time: Timestamp) -> Result<()> {
        if !self.is_up() {
            return Err(SimError::SiteDown(self.site_id));
        }
        self.history.entry(variable_index).or_default().push(Version { value, commit_time });
        self.current.insert(variable_index, value);
        self.post_recovery_ok.insert(variable_index);
        Ok(())
    }

    /// Used only at startup to seed the initial `(10*i, 0)` version without
    /// requiring the site to already be up (it always is at startup, but this
    /// keeps seeding independent of status semantics).
    pub fn seed_initial_version(&mut self, variable_index: u32, value: i64) {
        self.history.entry(variable_index).or_default().push(Version { value, commit_time: INITIAL_COMMIT_TIME });
        self.current.insert(variable_index, value);
        self.post_recovery_ok.insert(variable_index);
    }

    /// Marks the site down. Truncates every chain to its single most recent
    /// record and clears post-recovery tracking.
    pub fn fail(&mut self) {
        self.status = SiteStatus::Down;
        self.post_recovery_ok.clear();
        for chain in self.history.values_mut() {
            if let Some(last) = chain.last().copied() {
                chain.clear();
                chain.push(last);
            }
        }
    }

    /// Marks the site up. Non-replicated variables become immediately
    /// readable again; replicated variables wait for a fresh write.
    pub fn recover(&mut self, is_replicated: impl Fn(u32) -> bool) {
        self.status = SiteStatus::Up;
        let variables: Vec<u32> = self.history.keys().copied().collect();
        for variable_index in variables {
            if !is_replicated(variable_index) {
                self.post_recovery_ok.insert(variable_index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site_with_initial(site_id: u32, variable_index: u32, value: i64) -> DataManager {
        let mut dm = DataManager::new(site_id);
        dm.seed_initial_version(variable_index, value);
        dm
    }

    #[test]
    fn read_returns_newest_version_not_after_start_time() {
        let mut dm = site_with_initial(2, 1, 10);
        dm.write(1, 101, 5).unwrap();
        dm.write(1, 102, 9).unwrap();

        assert_eq!(dm.read(1, 0).unwrap(), 10);
        assert_eq!(dm.read(1, 6).unwrap(), 101);
        assert_eq!(dm.read(1, 9).unwrap(), 102);
        assert_eq!(dm.read(1, 100).unwrap(), 102);
    }

    #[test]
    fn read_rejects_down_site() {
        let mut dm = site_with_initial(2, 1, 10);
        dm.fail();
        assert_eq!(dm.read(1, 0), Err(SimError::SiteDown(2)));
    }

    #[test]
    fn read_rejects_unknown_variable() {
        let dm = DataManager::new(2);
        assert_eq!(
            dm.read(1, 0),
            Err(SimError::UnknownVariable { site: 2, variable: 1 })
        );
    }

    #[test]
    fn read_rejects_start_time_before_any_version() {
        let mut dm = DataManager::new(2);
        dm.write(1, 10, 5).unwrap();
        assert_eq!(
            dm.read(1, 3),
            Err(SimError::NoVisibleVersion { site: 2, variable: 1, start_time: 3 })
        );
    }

    #[test]
    fn fail_truncates_chain_to_single_latest_record() {
        let mut dm = site_with_initial(2, 1, 10);
        dm.write(1, 101, 5).unwrap();
        dm.write(1, 102, 9).unwrap();
        dm.fail();
        assert_eq!(dm.read(1, 9), Err(SimError::SiteDown(2)));
        dm.recover(|_| false);
        assert_eq!(dm.last_visible_commit_time(1, 100), Some(9));
        assert_eq!(dm.last_visible_commit_time(1, 8), None);
    }

    #[test]
    fn recover_marks_non_replicated_variables_readable_immediately() {
        let mut dm = site_with_initial(2, 1, 10);
        dm.fail();
        dm.recover(|v| v % 2 == 0);
        assert!(dm.post_recovery_ok().contains(&1));
    }

    #[test]
    fn recover_does_not_mark_replicated_variables_readable() {
        let mut dm = site_with_initial(1, 2, 20);
        dm.fail();
        dm.recover(|v| v % 2 == 0);
        assert!(!dm.post_recovery_ok().contains(&2));
    }
}
