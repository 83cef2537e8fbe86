//! Transaction state
//!
//! A transaction tracks the snapshot it reads against, the variables it
//! has touched, and its write intentions. Write intentions are staged here
//! and only applied to sites during `commit`.

use std::collections::{BTreeMap, HashSet};

/// Transaction id, assigned by the driver from the `begin(T<id>)` token.
pub type TxnId = u64;
/// Logical timestamp assigned by the driver, one per command line.
pub type Timestamp = u64;

/// Transaction lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Committed,
    Aborted,
}

/// A staged write intention: the value to write and the timestamp at which
/// the intention was recorded (not the eventual commit time of the site).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteIntent {
    pub value: i64,
    pub write_time: Timestamp,
}

/// In-memory transaction context.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TxnId,
    pub start_time: Timestamp,
    pub read_set: HashSet<u32>,
    pub write_set: BTreeMap<u32, WriteIntent>,
    pub state: TxnState,
}

impl Transaction {
    pub fn new(id: TxnId, start_time: Timestamp) -> Self {
        Self {
            id,
            start_time,
            read_set: HashSet::new(),
            write_set: BTreeMap::new(),
            state: TxnState::Active,
        }
    }

    pub fn add_read(&mut self, variable_index: u32) {
        self.read_set.insert(variable_index);
    }

    pub fn add_write(&mut self, variable_index: u32, value: i64, write_time: Timestamp) {
        self.write_set.insert(variable_index, WriteIntent { value, write_time });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_is_active_with_empty_sets() {
        let txn = Transaction::new(1, 5);
        assert_eq!(txn.state, TxnState::Active);
        assert!(txn.read_set.is_empty());
        assert!(txn.write_set.is_empty());
    }

    #[test]
    fn add_write_overwrites_previous_intent_for_same_variable() {
        let mut txn = Transaction::new(1, 5);
        txn.add_write(2, 100, 6);
        txn.add_write(2, 200, 7);
        assert_eq!(txn.write_set.len(), 1);
        let intent = txn.write_set[&2];
        assert_eq!(intent.value, 200);
        assert_eq!(intent.write_time, 7);
    }

    #[test]
    fn add_read_is_idempotent() {
        let mut txn = Transaction::new(1, 5);
        txn.add_read(3);
        txn.add_read(3);
        assert_eq!(txn.read_set.len(), 1);
    }
}
