//! Watch/multi/exec transaction
//!
//! A `Transaction` records the version of every watched key, lets the caller
//! read through the store, queues commands, and hands everything to
//! `KeyValueStore::exec`. If any watched key changed in the meantime the
//! store applies nothing and the transaction surfaces `TransactionConflict`.
//!
//! ## Lifecycle
//!
//! ```text
//! begin() -> watch()* -> reads -> incr_by()/set_add()* -> exec()
//!                                                      \-> discard()
//! ```
//!
//! `exec` and `discard` are terminal; queuing or committing afterwards is an
//! `Internal` error.

use stockguard_core::error::{Error, Result};
use stockguard_core::traits::{Command, CommandBatch, KeyValueStore, WatchSet};

/// Transaction state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting watches and commands
    Active,
    /// `exec` applied every queued command
    Committed,
    /// Discarded or lost a conflict
    Aborted {
        /// Why the transaction ended
        reason: String,
    },
}

/// An optimistic transaction against one store
pub struct Transaction<'a> {
    store: &'a dyn KeyValueStore,
    watched: WatchSet,
    commands: CommandBatch,
    status: TransactionStatus,
}

impl<'a> Transaction<'a> {
    /// Start an empty transaction
    pub fn begin(store: &'a dyn KeyValueStore) -> Self {
        Self {
            store,
            watched: WatchSet::new(),
            commands: CommandBatch::new(),
            status: TransactionStatus::Active,
        }
    }

    fn ensure_active(&self) -> Result<()> {
        match &self.status {
            TransactionStatus::Active => Ok(()),
            other => Err(Error::Internal(format!(
                "transaction is no longer active: {other:?}"
            ))),
        }
    }

    /// Record the current version of `key`
    pub fn watch(&mut self, key: &str) -> Result<()> {
        self.ensure_active()?;
        let version = self.store.watch(key)?;
        self.watched.push((key.to_owned(), version));
        Ok(())
    }

    /// Read a counter through the store (not through the queue)
    pub fn get_counter(&self, key: &str) -> Result<Option<i64>> {
        self.store.get_counter(key)
    }

    /// Queue an increment
    pub fn incr_by(&mut self, key: &str, delta: i64) -> Result<()> {
        self.ensure_active()?;
        self.commands.push(Command::IncrBy {
            key: key.to_owned(),
            delta,
        });
        Ok(())
    }

    /// Queue a set insertion
    pub fn set_add(&mut self, key: &str, member: &str) -> Result<()> {
        self.ensure_active()?;
        self.commands.push(Command::SetAdd {
            key: key.to_owned(),
            member: member.to_owned(),
        });
        Ok(())
    }

    /// Number of queued commands
    pub fn pending(&self) -> usize {
        self.commands.len()
    }

    /// Drop the queue without touching the store
    pub fn discard(&mut self, reason: impl Into<String>) {
        self.commands.clear();
        self.watched.clear();
        self.status = TransactionStatus::Aborted {
            reason: reason.into(),
        };
    }

    /// Current state
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// Commit the queue if no watched key changed.
    ///
    /// Returns one result per queued command: the new value for `IncrBy`,
    /// 1 or 0 for `SetAdd`.
    pub fn exec(&mut self) -> Result<Vec<i64>> {
        self.ensure_active()?;
        match self.store.exec(&self.watched, &self.commands)? {
            Some(results) => {
                self.status = TransactionStatus::Committed;
                Ok(results)
            }
            None => {
                let key = self
                    .watched
                    .iter()
                    .map(|(key, _)| key.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                self.status = TransactionStatus::Aborted {
                    reason: format!("watched key changed: {key}"),
                };
                self.commands.clear();
                Err(Error::TransactionConflict { key })
            }
        }
    }
}
