//! # Documents
//!
//! A [`Document`] owns its [`DocState`] (the sprite, the open transaction slot and the undo history)
//! behind a reader/writer lock. The lock is the one synchronization point between the thread editing
//! a document and background readers. All access goes through the guards in [`access`].

pub mod access;
pub mod lock;

use std::sync::Arc;
use std::time::Duration;

pub use access::{DocAccessError, DocReader, DocWriter, WeakDocReader};

use crate::commands::{Cmd, CommandError};
use crate::history::{HistoryConfig, UndoHistory, UndoStep};
use crate::range::DocRange;
use crate::sprite::Sprite;
use crate::transaction::{Modification, Transaction};

pub type DocumentID = crate::id::UniqueID<Document>;

/// How long to wait for a document lock when nothing better is configured.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct DocFlags : u8 {
        /// Saved to, or opened from, a file at least once.
        const ASSOCIATED_TO_FILE = 0b0001;
        /// Skipped by backup passes. Set when a document is destroyed with unsaved changes.
        const INHIBIT_BACKUP     = 0b0010;
        /// The latest backup reflects the current state.
        const FULLY_BACKED_UP    = 0b0100;
        /// Refuses new transactions.
        const READ_ONLY          = 0b1000;
    }
}

#[derive(Debug)]
pub struct DocState {
    sprite: Sprite,
    transaction: Option<Transaction>,
    history: UndoHistory,
    version: u64,
    name: String,
    flags: DocFlags,
}
impl DocState {
    #[must_use]
    pub fn sprite(&self) -> &Sprite {
        &self.sprite
    }
    /// The transaction currently open on this document, if any.
    #[must_use]
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }
    #[must_use]
    pub fn history(&self) -> &UndoHistory {
        &self.history
    }
    pub fn set_history_config(&mut self, config: HistoryConfig) {
        self.history.set_config(config);
    }
    /// Bumped by every committed, undone or redone modifying change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
    #[must_use]
    pub fn flags(&self) -> DocFlags {
        self.flags
    }
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
    #[must_use]
    pub fn is_modified(&self) -> bool {
        !self.history.is_saved()
    }
    #[must_use]
    pub fn is_associated_to_file(&self) -> bool {
        self.flags.contains(DocFlags::ASSOCIATED_TO_FILE)
    }
    pub fn mark_as_saved(&mut self) {
        self.flags |= DocFlags::ASSOCIATED_TO_FILE;
        self.history.mark_saved();
    }
    #[must_use]
    pub fn needs_backup(&self) -> bool {
        self.can_undo() || self.can_redo()
    }
    #[must_use]
    pub fn inhibit_backup(&self) -> bool {
        self.flags.contains(DocFlags::INHIBIT_BACKUP)
    }
    pub fn set_inhibit_backup(&mut self, inhibit: bool) {
        self.flags.set(DocFlags::INHIBIT_BACKUP, inhibit);
    }
    #[must_use]
    pub fn is_fully_backed_up(&self) -> bool {
        self.flags.contains(DocFlags::FULLY_BACKED_UP)
    }
    pub fn mark_as_backed_up(&mut self) {
        self.flags |= DocFlags::FULLY_BACKED_UP;
    }
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.flags.contains(DocFlags::READ_ONLY)
    }
    pub fn mark_as_read_only(&mut self) {
        self.flags |= DocFlags::READ_ONLY;
    }
    pub fn remove_read_only_mark(&mut self) {
        self.flags.remove(DocFlags::READ_ONLY);
    }
    fn changed(&mut self, modification: Modification) {
        if modification == Modification::ModifyDocument {
            self.version += 1;
        }
        self.flags.remove(DocFlags::FULLY_BACKED_UP);
    }

    /// Revert the newest committed transaction.
    ///
    /// Refused while a transaction is open, as its commands were built on top of the current state.
    pub fn undo(&mut self) -> Option<Result<UndoStep, CommandError>> {
        if self.transaction.is_some() {
            log::warn!("Undo refused while a transaction is open");
            return Some(Err(CommandError::MismatchedState));
        }
        let result = self.history.undo(&mut self.sprite)?;
        if let Ok(step) = &result {
            self.changed(step.modification);
        }
        Some(result)
    }
    /// Re-apply the most recently undone transaction.
    pub fn redo(&mut self) -> Option<Result<UndoStep, CommandError>> {
        if self.transaction.is_some() {
            log::warn!("Redo refused while a transaction is open");
            return Some(Err(CommandError::MismatchedState));
        }
        let result = self.history.redo(&mut self.sprite)?;
        if let Ok(step) = &result {
            self.changed(step.modification);
        }
        Some(result)
    }

    /// Join the open transaction, or open one. Returns whether a new one was opened.
    pub(crate) fn begin_transaction(
        &mut self,
        label: &str,
        modification: Modification,
    ) -> Result<bool, DocAccessError> {
        if self.transaction.is_some() {
            log::trace!("{label:?} joins the open transaction");
            return Ok(false);
        }
        if self.is_read_only() {
            return Err(DocAccessError::ReadOnly);
        }
        self.transaction = Some(Transaction::new(label.to_owned(), modification));
        Ok(true)
    }
    pub(crate) fn execute(&mut self, cmd: Box<dyn Cmd>) -> Result<(), CommandError> {
        match &mut self.transaction {
            Some(transaction) => transaction.execute(cmd, &mut self.sprite),
            None => Err(CommandError::MismatchedState),
        }
    }
    pub(crate) fn set_old_doc_range(&mut self, range: DocRange) {
        if let Some(transaction) = &mut self.transaction {
            transaction.set_old_doc_range(range);
        }
    }
    pub(crate) fn set_new_doc_range(&mut self, range: DocRange) {
        if let Some(transaction) = &mut self.transaction {
            transaction.set_new_doc_range(range);
        }
    }
    pub(crate) fn commit_transaction(&mut self) {
        if let Some(transaction) = self.transaction.take() {
            let modification = transaction.modification();
            if transaction.commit(&mut self.history) {
                self.changed(modification);
            }
        }
    }
    pub(crate) fn rollback_transaction(&mut self) {
        if let Some(transaction) = self.transaction.take() {
            transaction.rollback(&mut self.sprite);
        }
    }
    pub(crate) fn rollback_and_start_again(&mut self) {
        if let Some(transaction) = &mut self.transaction {
            transaction.rollback_and_start_again(&mut self.sprite);
        }
    }
}

pub struct Document {
    id: DocumentID,
    state: Arc<parking_lot::RwLock<DocState>>,
    weak: Arc<lock::WeakLock>,
}
impl Document {
    #[must_use]
    pub fn new(name: impl Into<String>, sprite: Sprite) -> Self {
        Self::with_history(name, sprite, HistoryConfig::default())
    }
    #[must_use]
    pub fn with_history(name: impl Into<String>, sprite: Sprite, config: HistoryConfig) -> Self {
        Self {
            id: DocumentID::default(),
            state: Arc::new(parking_lot::RwLock::new(DocState {
                sprite,
                transaction: None,
                history: UndoHistory::new(config),
                version: 0,
                name: name.into(),
                flags: DocFlags::empty(),
            })),
            weak: Arc::new(lock::WeakLock::default()),
        }
    }
    #[must_use]
    pub fn id(&self) -> DocumentID {
        self.id
    }
    /// Take a shared read lock.
    pub fn read(&self, timeout: Duration) -> Result<DocReader, DocAccessError> {
        DocReader::new(self, timeout)
    }
    pub fn write(&self, timeout: Duration) -> Result<DocWriter, DocAccessError> {
        DocWriter::new(self, timeout)
    }
    /// Opportunistic, non-blocking read. Check [`WeakDocReader::is_locked`] before use.
    #[must_use]
    pub fn weak_read(&self) -> WeakDocReader {
        WeakDocReader::new(self)
    }
    /// Is any lock, shared or exclusive, currently held?
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }
    #[must_use]
    pub fn is_write_locked(&self) -> bool {
        self.state.is_locked_exclusive()
    }
}
impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}
