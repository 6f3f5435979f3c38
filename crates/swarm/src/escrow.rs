//! Escrow ledger (spec.md §4.14): bonded escrow per peer, persisted as
//! JSON-lines with write-temp-then-rename, the same durability shape as the
//! scheduler's `ScheduleStore` (`crates/scheduler/src/store.rs`). Each
//! account's transaction log is capped at 500 entries, oldest dropped first.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fulcrum_common::{PeerId, TaskId};

use crate::error::SwarmError;
use crate::types::{EscrowAccount, EscrowTransaction, EscrowTransactionKind};

pub const MAX_TRANSACTIONS_PER_ACCOUNT: usize = 500;

pub struct EscrowLedger {
    path: PathBuf,
    accounts: HashMap<PeerId, EscrowAccount>,
}

impl EscrowLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), accounts: HashMap::new() }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SwarmError> {
        let path = path.as_ref().to_path_buf();
        let mut accounts = HashMap::new();
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            for (lineno, line) in contents.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<EscrowAccount>(line) {
                    Ok(account) => {
                        accounts.insert(account.node_id, account);
                    }
                    Err(err) => {
                        tracing::warn!(line = lineno, error = %err, "skipping malformed escrow record");
                    }
                }
            }
        }
        Ok(Self { path, accounts })
    }

    fn save(&self) -> Result<(), SwarmError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut buf = String::new();
        for account in self.accounts.values() {
            buf.push_str(&serde_json::to_string(account)?);
            buf.push('\n');
        }
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, buf.as_bytes())?;
        {
            let tmp_file = fs::File::open(&tmp_path)?;
            tmp_file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn account(&self, node_id: PeerId) -> Option<&EscrowAccount> {
        self.accounts.get(&node_id)
    }

    fn push_transaction(account: &mut EscrowAccount, tx: EscrowTransaction) {
        account.transactions.push_back(tx);
        while account.transactions.len() > MAX_TRANSACTIONS_PER_ACCOUNT {
            account.transactions.pop_front();
        }
    }

    pub fn deposit(&mut self, node_id: PeerId, amount: f64, now: DateTime<Utc>) -> Result<(), SwarmError> {
        let account = self.accounts.entry(node_id).or_insert_with(|| EscrowAccount::new(node_id));
        account.balance += amount;
        Self::push_transaction(account, EscrowTransaction { at: now, kind: EscrowTransactionKind::Deposit, amount, task_id: None });
        self.save()
    }

    /// Moves `amount` from free balance into held, failing if the account
    /// lacks sufficient free balance (spec.md §4.14's "escrow invariant":
    /// `held <= balance` at all times).
    pub fn hold_bond(&mut self, node_id: PeerId, amount: f64, task_id: TaskId, now: DateTime<Utc>) -> Result<(), SwarmError> {
        let account = self.accounts.get_mut(&node_id).ok_or(SwarmError::UnknownPeer(node_id))?;
        if account.free_balance() < amount {
            return Err(SwarmError::InsufficientBalance(node_id, amount));
        }
        account.held += amount;
        Self::push_transaction(account, EscrowTransaction { at: now, kind: EscrowTransactionKind::HoldBond, amount, task_id: Some(task_id) });
        self.save()
    }

    /// Releases a held bond back to free balance on successful completion.
    pub fn release_bond(&mut self, node_id: PeerId, amount: f64, task_id: TaskId, now: DateTime<Utc>) -> Result<(), SwarmError> {
        let account = self.accounts.get_mut(&node_id).ok_or(SwarmError::UnknownPeer(node_id))?;
        if account.held < amount {
            return Err(SwarmError::EscrowInvariantViolated(node_id));
        }
        account.held -= amount;
        Self::push_transaction(account, EscrowTransaction { at: now, kind: EscrowTransactionKind::ReleaseBond, amount, task_id: Some(task_id) });
        self.save()
    }

    /// Slashes a held bond on a contract violation, removing it from both
    /// `held` and `balance`.
    pub fn slash_bond(&mut self, node_id: PeerId, amount: f64, task_id: TaskId, now: DateTime<Utc>) -> Result<(), SwarmError> {
        let account = self.accounts.get_mut(&node_id).ok_or(SwarmError::UnknownPeer(node_id))?;
        if account.held < amount {
            return Err(SwarmError::EscrowInvariantViolated(node_id));
        }
        account.held -= amount;
        account.balance -= amount;
        Self::push_transaction(account, EscrowTransaction { at: now, kind: EscrowTransactionKind::SlashBond, amount, task_id: Some(task_id) });
        self.save()
    }
}
