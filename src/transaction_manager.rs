//! The transaction manager
//!
//! Owns the cluster topology, active/terminated transactions, per-site
//! status, failure history, and the deferred read queue. Routes reads to
//! whichever candidate site can serve them, validates commits with
//! first-committer-wins plus the write-before-failure rule, and drains
//! parked reads when a site recovers.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::data_manager::{DataManager, SiteStatus};
use crate::error::{Result, SimError};
use crate::events::SimEvent;
use crate::transaction::{Transaction, TxnId, TxnState, Timestamp, WriteIntent};
use crate::variable::{self, NUM_SITES, NUM_VARIABLES};

/// A `(timestamp, status)` transition recorded for a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FailureEvent {
    timestamp: Timestamp,
    status: SiteStatus,
}

/// A read parked against a specific site until it recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParkedRead {
    transaction_id: TxnId,
    variable: u32,
    site: u32,
}

/// Outcome of trying a single candidate site for a read.
enum SiteAttempt {
    Served(i64),
    /// A failure interval falsifies the snapshot at this site — try the
    /// next candidate.
    Disqualified,
    /// Up but without a visible version (or some other read error) — try
    /// the next candidate.
    TryNext,
    /// Down and not disqualified — park the read here and stop scanning.
    Park,
}

pub struct TransactionManager {
    sites: HashMap<u32, DataManager>,
    site_status: HashMap<u32, SiteStatus>,
    failure_history: HashMap<u32, Vec<FailureEvent>>,
    transactions: HashMap<TxnId, Transaction>,
    waiting_reads: VecDeque<ParkedRead>,
}

impl TransactionManager {
    /// Builds a fresh cluster: 10 up sites, 20 variables seeded with
    /// `(10 * i, 0)` on every site that hosts them.
    pub fn new() -> Self {
        let mut sites = HashMap::new();
        let mut site_status = HashMap::new();
        let mut failure_history = HashMap::new();
        for site_id in 1..=NUM_SITES {
            sites.insert(site_id, DataManager::new(site_id));
            site_status.insert(site_id, SiteStatus::Up);
            failure_history.insert(site_id, Vec::new());
        }

        let mut tm = Self {
            sites,
            site_status,
            failure_history,
            transactions: HashMap::new(),
            waiting_reads: VecDeque::new(),
        };
        tm.seed_initial_data();
        tm
    }

    fn seed_initial_data(&mut self) {
        for variable_index in 1..=NUM_VARIABLES {
            let value = variable::initial_value(variable_index);
            for site_id in variable::sites_for(variable_index) {
                self.sites.get_mut(&site_id).unwrap().seed_initial_version(variable_index, value);
            }
        }
    }

    fn site_status(&self, site: u32) -> SiteStatus {
        self.site_status[&site]
    }

    fn last_recovery_time(&self, site: u32) -> Option<Timestamp> {
        self.failure_history[&site]
            .iter()
            .filter(|ev| ev.status == SiteStatus::Up)
            .map(|ev| ev.timestamp)
            .max()
    }

    /// True if a failure interval at `site` falsifies a snapshot whose
    /// newest visible version has commit time `last` and whose start time
    /// is `start_time`: some `(f, down)` with `last < f < start_time`.
    fn is_disqualified(&self, site: u32, last: Timestamp, start_time: Timestamp) -> bool {
        self.failure_history[&site]
            .iter()
            .any(|ev| ev.status == SiteStatus::Down && last < ev.timestamp && ev.timestamp < start_time)
    }

    fn attempt_site_read(&self, site: u32, variable_index: u32, start_time: Timestamp) -> SiteAttempt {
        let dm = &self.sites[&site];
        let last = dm.last_visible_commit_time(variable_index, start_time);
        if let Some(last) = last {
            if self.is_disqualified(site, last, start_time) {
                return SiteAttempt::Disqualified;
            }
        }

        if self.site_status(site) == SiteStatus::Up {
            match dm.read(variable_index, start_time) {
                Ok(value) => SiteAttempt::Served(value),
                Err(_) => SiteAttempt::TryNext,
            }
        } else {
            SiteAttempt::Park
        }
    }

    /// Starts a new transaction at the given logical timestamp.
    pub fn begin(&mut self, id: TxnId, start_time: Timestamp) -> SimEvent {
        self.transactions.insert(id, Transaction::new(id, start_time));
        SimEvent::TransactionStarted { id, start_time }
    }

    /// Attempts to read `x{variable_index}` on behalf of transaction `id`.
    /// Tries every candidate site in topology order; serves the first
    /// visible snapshot, parks on the first down-but-not-disqualified site,
    /// or aborts the transaction if every candidate is exhausted — with the
    /// abort reason naming the first disqualified candidate when one was
    /// seen, falling back to a generic "no valid site" otherwise.
    pub fn read_intention(&mut self, id: TxnId, variable_index: u32) -> Result<SimEvent> {
        let start_time = {
            let txn = self.transactions.get_mut(&id).ok_or(SimError::UnknownTransaction(id))?;
            txn.add_read(variable_index);
            txn.start_time
        };

        // A down-but-not-disqualified site is a parkable fallback, not an
        // immediate stop: we keep scanning later candidates for a site that
        // can serve the value directly (this is what makes replicated reads
        // fail over to the next live replica rather than parking against
        // the first one that happens to be down — see SPEC_FULL.md §9).
        let mut park_candidate: Option<u32> = None;
        let mut disqualified_candidate: Option<u32> = None;
        for site in variable::sites_for(variable_index) {
            match self.attempt_site_read(site, variable_index, start_time) {
                SiteAttempt::Served(value) => {
                    return Ok(SimEvent::ReadServed { id, variable: variable_index, value, site, recovered: false });
                }
                SiteAttempt::Park => {
                    if park_candidate.is_none() {
                        park_candidate = Some(site);
                    }
                }
                SiteAttempt::Disqualified => {
                    if disqualified_candidate.is_none() {
                        disqualified_candidate = Some(site);
                    }
                }
                SiteAttempt::TryNext => {}
            }
        }

        if let Some(site) = park_candidate {
            self.waiting_reads.push_back(ParkedRead { transaction_id: id, variable: variable_index, site });
            return Ok(SimEvent::ReadParked { id, variable: variable_index, site });
        }

        self.transactions.get_mut(&id).unwrap().state = TxnState::Aborted;
        let reason = match disqualified_candidate {
            Some(site) => SimError::SiteDisqualified { site, variable: variable_index },
            None => SimError::NoValidSite { variable: variable_index },
        };
        Ok(SimEvent::TransactionAborted { id, reason: reason.to_string() })
    }

    /// Stages a write intention. The actual write happens at `commit`.
    pub fn write_intention(&mut self, id: TxnId, variable_index: u32, value: i64, write_time: Timestamp) -> Result<()> {
        let txn = self.transactions.get_mut(&id).ok_or(SimError::UnknownTransaction(id))?;
        txn.add_write(variable_index, value, write_time);
        Ok(())
    }

    /// First-committer-wins plus write-before-failure validation, scanned
    /// for every variable in the write set before anything is applied.
    fn validate_commit(&self, write_set: &BTreeMap<u32, WriteIntent>, start_time: Timestamp) -> std::result::Result<(), SimError> {
        for (&variable_index, intent) in write_set {
            for site in 1..=NUM_SITES {
                let dm = &self.sites[&site];
                if self.site_status(site) == SiteStatus::Up && dm.holds(variable_index) {
                    if let Some(latest) = dm.latest_commit_time(variable_index) {
                        if latest > start_time {
                            return Err(SimError::AbortFirstCommitter {
                                variable: variable_index,
                                commit_time: latest,
                                start_time,
                            });
                        }
                    }
                }
            }

            // Write-before-failure: scanned across every site, not just
            // sites hosting the variable. Preserved as specified; see
            // SPEC_FULL.md §9 point 2.
            for site in 1..=NUM_SITES {
                for ev in &self.failure_history[&site] {
                    if ev.status == SiteStatus::Down && intent.write_time < ev.timestamp {
                        return Err(SimError::AbortWriteBeforeFailure {
                            variable: variable_index,
                            write_time: intent.write_time,
                            failure_time: ev.timestamp,
                            site,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Validates and, if valid, applies every write in the transaction's
    /// write set. Abort is all-or-nothing: no partial writes on abort.
    pub fn commit(&mut self, id: TxnId, _time: Timestamp) -> Result<Vec<SimEvent>> {
        let (start_time, write_set) = {
            let txn = self.transactions.get(&id).ok_or(SimError::UnknownTransaction(id))?;
            (txn.start_time, txn.write_set.clone())
        };

        if let Err(reason) = self.validate_commit(&write_set, start_time) {
            self.transactions.get_mut(&id).unwrap().state = TxnState::Aborted;
            return Ok(vec![SimEvent::TransactionAborted { id, reason: reason.to_string() }]);
        }

        let mut events = Vec::new();
        for (&variable_index, intent) in &write_set {
            let mut written = Vec::new();
            for site in variable::sites_for(variable_index) {
                if self.site_status(site) != SiteStatus::Up {
                    continue;
                }
                if !self.sites[&site].holds(variable_index) {
                    continue;
                }
                if let Some(last_recovery) = self.last_recovery_time(site) {
                    if intent.write_time < last_recovery {
                        continue;
                    }
                }
                self.sites.get_mut(&site).unwrap().write(variable_index, intent.value, intent.write_time).expect("site checked up");
                written.push(site);
            }
            if !written.is_empty() {
                written.sort_unstable();
                events.push(SimEvent::WroteToSites { id, variable: variable_index, sites: written });
            }
        }

        self.transactions.get_mut(&id).unwrap().state = TxnState::Committed;
        events.push(SimEvent::TransactionCommitted { id });
        Ok(events)
    }

    /// Edge-triggered site status transition. Going down calls `fail()` on
    /// the site; coming up calls `recover()` and drains any parked reads
    /// waiting on this site.
    pub fn update_site_status(&mut self, site: u32, new_status: SiteStatus, timestamp: Timestamp) -> Result<Vec<SimEvent>> {
        if !self.sites.contains_key(&site) {
            return Err(SimError::UnknownSite(site));
        }
        if self.site_status(site) == new_status {
            return Ok(Vec::new());
        }

        match new_status {
            SiteStatus::Down => {
                self.sites.get_mut(&site).unwrap().fail();
                self.failure_history.get_mut(&site).unwrap().push(FailureEvent { timestamp, status: SiteStatus::Down });
                self.site_status.insert(site, SiteStatus::Down);
                Ok(Vec::new())
            }
            SiteStatus::Up => {
                self.sites.get_mut(&site).unwrap().recover(variable::is_replicated);
                self.failure_history.get_mut(&site).unwrap().push(FailureEvent { timestamp, status: SiteStatus::Up });
                self.site_status.insert(site, SiteStatus::Up);

                let mut events = vec![SimEvent::SiteRecovered { site }];
                events.extend(self.drain_waiting_reads(site));
                Ok(events)
            }
        }
    }

    /// Retries every parked read waiting on `site`. A read that still
    /// fails stays parked (retain-and-wait; see SPEC_FULL.md §9 point 3).
    fn drain_waiting_reads(&mut self, site: u32) -> Vec<SimEvent> {
        let mut events = Vec::new();
        let mut remaining = VecDeque::new();

        while let Some(parked) = self.waiting_reads.pop_front() {
            if parked.site != site {
                remaining.push_back(parked);
                continue;
            }
            let Some(start_time) = self.transactions.get(&parked.transaction_id).map(|t| t.start_time) else {
                continue;
            };
            match self.sites[&site].read(parked.variable, start_time) {
                Ok(value) => events.push(SimEvent::ReadServed {
                    id: parked.transaction_id,
                    variable: parked.variable,
                    value,
                    site,
                    recovered: true,
                }),
                Err(_) => remaining.push_back(parked),
            }
        }

        self.waiting_reads = remaining;
        events
    }

    /// Human-readable snapshot of every site's status and current values,
    /// bounded by the `--- Dump State ---` / `--------------------` markers.
    pub fn dump(&self) -> String {
        let mut lines = Vec::new();
        lines.push("--- Dump State ---".to_string());
        for site in 1..=NUM_SITES {
            let dm = &self.sites[&site];
            let values = dm
                .current_values()
                .map(|(v, val)| format!("x{v}: {val}"))
                .collect::<Vec<_>>()
                .join(", ");
            if self.site_status(site) == SiteStatus::Down {
                lines.push(format!("site {site} (down) \u{2013} {values}"));
            } else {
                lines.push(format!("site {site} \u{2013} {values}"));
            }
        }
        lines.push("--------------------".to_string());
        lines.join("\n")
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
